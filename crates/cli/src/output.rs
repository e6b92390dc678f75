// Output formatting for CLI

use crate::client::RequestFailure;
use crate::probe::ProbeResult;
use crate::stats::{millis, StatsSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    pub fn print_summary(&self, snapshot: &StatsSnapshot) {
        match self {
            OutputFormat::Json => println!("{:#}", snapshot.to_json()),
            OutputFormat::Text => print!("{}", render_summary(snapshot)),
        }
    }

    pub fn print_probe(&self, result: &ProbeResult) {
        match self {
            OutputFormat::Json => println!("{}", result.to_json()),
            OutputFormat::Text => println!("{}", render_probe(result)),
        }
    }
}

const COLUMNS: [(&str, usize); 10] = [
    ("Endpoint", 10),
    ("Requests", 9),
    ("Fails", 7),
    ("Mean ms", 9),
    ("Min ms", 9),
    ("p50 ms", 9),
    ("p95 ms", 9),
    ("p99 ms", 9),
    ("Max ms", 9),
    ("Req/s", 8),
];

/// Final summary table; latency columns cover successful requests
pub fn render_summary(snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();
    let secs = snapshot.elapsed.as_secs_f64();

    out.push_str(&table_row(&COLUMNS.map(|(name, width)| (name.to_string(), width))));
    out.push('\n');

    for row in &snapshot.rows {
        let l = &row.latency;
        let rps = if secs > 0.0 {
            row.requests as f64 / secs
        } else {
            0.0
        };
        let values = [
            row.endpoint.as_str().to_string(),
            row.requests.to_string(),
            row.total_failures().to_string(),
            format!("{:.1}", millis(l.mean)),
            format!("{:.1}", millis(l.min)),
            format!("{:.1}", millis(l.p50)),
            format!("{:.1}", millis(l.p95)),
            format!("{:.1}", millis(l.p99)),
            format!("{:.1}", millis(l.max)),
            format!("{:.2}", rps),
        ];
        out.push_str(&table_row(&with_widths(values)));
        out.push('\n');
    }

    out.push_str(&format!(
        "\nTotal: {} requests, {} failures in {:.1}s ({:.2} req/s)\n",
        snapshot.total_requests(),
        snapshot.total_failures(),
        secs,
        snapshot.throughput()
    ));

    let failures: Vec<String> = snapshot
        .rows
        .iter()
        .flat_map(|row| {
            row.failures
                .iter()
                .map(move |(kind, n)| {
                    format!("  {:<10} {:<20} {}", row.endpoint.as_str(), kind.as_str(), n)
                })
        })
        .collect();
    if !failures.is_empty() {
        out.push_str("\nFailures:\n");
        for line in failures {
            out.push_str(&line);
            out.push('\n');
        }
    }

    out
}

/// One line per probe call
pub fn render_probe(result: &ProbeResult) -> String {
    let outcome = match &result.outcome {
        Ok(ok) => format!("{} {}", ok.status, ok.body),
        Err(RequestFailure::ConnectionReset) => {
            "connection dropped (process terminated?)".to_string()
        }
        Err(failure) => format!("FAILED {} ({})", failure, failure.kind()),
    };
    format!(
        "#{} GET {} [{:.1} ms] {}",
        result.attempt,
        result.url,
        millis(result.elapsed),
        outcome
    )
}

fn with_widths(values: [String; 10]) -> Vec<(String, usize)> {
    values
        .into_iter()
        .zip(COLUMNS.iter().map(|(_, width)| *width))
        .collect()
}

fn table_row(values: &[(String, usize)]) -> String {
    values
        .iter()
        .map(|(val, width)| {
            let s = if val.len() > *width {
                format!("{}...", &val[..(width - 3)])
            } else {
                val.to_string()
            };
            format!("{:<width$}", s, width = width)
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CallOutcome;
    use crate::stats::LoadStats;
    use loadbench_core::Endpoint;
    use std::time::Duration;

    #[test]
    fn test_summary_lists_endpoints_and_failures() {
        let stats = LoadStats::new();
        stats.record_success(Endpoint::Compute, Duration::from_millis(120));
        stats.record_success(Endpoint::Io, Duration::from_millis(8));
        stats.record_failure(
            Endpoint::Io,
            &RequestFailure::Status {
                code: 503,
                body: String::new(),
            },
        );

        let text = render_summary(&stats.snapshot());
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("Endpoint"));
        assert!(lines[1].starts_with("compute"));
        assert!(lines[1].contains("120.0"));
        assert!(lines[2].starts_with("io"));
        assert!(text.contains("Total: 3 requests, 1 failures"));
        assert!(text.contains("Failures:"));
        assert!(text.contains("io         status"));
    }

    #[test]
    fn test_summary_without_failures_has_no_failure_section() {
        let stats = LoadStats::new();
        stats.record_success(Endpoint::Status, Duration::from_millis(1));

        let text = render_summary(&stats.snapshot());
        assert!(!text.contains("Failures:"));
    }

    #[test]
    fn test_probe_line_for_dropped_connection() {
        let result = ProbeResult {
            attempt: 1,
            endpoint: Endpoint::Crash,
            url: "http://localhost:8000/crash".into(),
            elapsed: Duration::from_millis(3),
            outcome: Err(RequestFailure::ConnectionReset),
        };
        let line = render_probe(&result);
        assert!(line.starts_with("#1 GET http://localhost:8000/crash"));
        assert!(line.ends_with("connection dropped (process terminated?)"));

        let result = ProbeResult {
            outcome: Ok(CallOutcome {
                status: 200,
                elapsed: Duration::from_millis(3),
                body: r#"{"status":"ok"}"#.into(),
            }),
            ..result
        };
        assert!(render_probe(&result).ends_with(r#"200 {"status":"ok"}"#));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("text"), OutputFormat::Text);
    }
}
