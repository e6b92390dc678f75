// Loadbench CLI
//
// Design Decision: Use clap derive with env fallbacks so runs can be configured from a container.
// Design Decision: Text output for humans, JSON for scripting.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use loadbench_cli::{run_probe, Client, LoadConfig, LoadRunner, OutputFormat, TaskSet, ThinkTime};
use loadbench_core::telemetry::{init_telemetry, TelemetryConfig};
use loadbench_core::Endpoint;

#[derive(Parser)]
#[command(name = "loadbench")]
#[command(about = "Drive simulated users against the loadbench service")]
#[command(version)]
pub struct Cli {
    /// Service root URL, including any API prefix
    #[arg(long, env = "LOADBENCH_HOST", default_value = "http://localhost:8000")]
    pub host: String,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a load test until Ctrl-C or --run-time
    Run(RunArgs),

    /// Call one endpoint a number of times and print each result
    Call {
        /// compute, io, status or crash
        endpoint: Endpoint,

        /// Number of sequential calls
        #[arg(long, short = 'n', default_value = "1")]
        times: u32,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Number of simulated users
    #[arg(long, short, env = "LOADBENCH_USERS", default_value = "10")]
    pub users: usize,

    /// Users started per second
    #[arg(long, env = "LOADBENCH_SPAWN_RATE", default_value = "1.0")]
    pub spawn_rate: f64,

    /// Minimum think time in seconds
    #[arg(long, env = "LOADBENCH_MIN_WAIT", default_value = "1.0")]
    pub min_wait: f64,

    /// Maximum think time in seconds
    #[arg(long, env = "LOADBENCH_MAX_WAIT", default_value = "3.0")]
    pub max_wait: f64,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long, env = "LOADBENCH_RUN_TIME")]
    pub run_time: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, env = "LOADBENCH_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Weighted task mix, e.g. "compute:1,io:1,status:1"
    #[arg(long, env = "LOADBENCH_TASKS", default_value = loadbench_cli::DEFAULT_TASKS)]
    pub tasks: String,

    /// Seconds between progress log lines
    #[arg(long, env = "LOADBENCH_REPORT_INTERVAL", default_value = "5")]
    pub report_interval: u64,
}

impl RunArgs {
    fn into_config(self, host: String) -> Result<LoadConfig> {
        Ok(LoadConfig {
            host,
            users: self.users,
            spawn_rate: self.spawn_rate,
            think: ThinkTime::new(self.min_wait, self.max_wait)?,
            run_time: self.run_time.map(Duration::from_secs),
            request_timeout: Duration::from_secs(self.request_timeout),
            tasks: TaskSet::parse(&self.tasks)?,
            report_interval: Duration::from_secs(self.report_interval.max(1)),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_telemetry(
        TelemetryConfig::from_env()
            .with_service_name("loadbench")
            .with_default_filter("loadbench_cli=info"),
    );

    let cli = Cli::parse();
    let output_format = OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Run(args) => {
            let config = args
                .into_config(cli.host)
                .context("Invalid load configuration")?;
            let runner = LoadRunner::new(config).context("Failed to start load run")?;

            let cancel = runner.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C, stopping users");
                }
                cancel.cancel();
            });

            let snapshot = runner.run().await;
            output_format.print_summary(&snapshot);
            Ok(())
        }
        Commands::Call {
            endpoint,
            times,
            timeout,
        } => {
            let client = Client::new(&cli.host, Duration::from_secs(timeout))
                .context("Failed to build HTTP client")?;
            run_probe(&client, endpoint, times, |result| {
                output_format.print_probe(result)
            })
            .await;
            Ok(())
        }
    }
}
