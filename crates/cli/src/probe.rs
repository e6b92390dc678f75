// Single-endpoint probe: N sequential calls, one result per call

use std::time::{Duration, Instant};

use loadbench_core::Endpoint;

use crate::client::{CallOutcome, Client, RequestFailure};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// 1-based call number
    pub attempt: u32,
    pub endpoint: Endpoint,
    pub url: String,
    /// Client-side time, including failed calls
    pub elapsed: Duration,
    pub outcome: Result<CallOutcome, RequestFailure>,
}

impl ProbeResult {
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "attempt": self.attempt,
            "endpoint": self.endpoint,
            "url": self.url,
            "elapsed_ms": crate::stats::millis(self.elapsed),
        });

        match &self.outcome {
            Ok(ok) => {
                value["status"] = ok.status.into();
                value["body"] = serde_json::from_str(&ok.body)
                    .unwrap_or_else(|_| serde_json::Value::String(ok.body.clone()));
            }
            Err(failure) => {
                value["failure"] = failure.kind().as_str().into();
                value["error"] = failure.to_string().into();
            }
        }
        value
    }
}

/// Call `endpoint` `times` times in sequence, handing each result to `on_result`
pub async fn run_probe<F>(
    client: &Client,
    endpoint: Endpoint,
    times: u32,
    mut on_result: F,
) -> Vec<ProbeResult>
where
    F: FnMut(&ProbeResult),
{
    let mut results = Vec::with_capacity(times as usize);

    for attempt in 1..=times {
        let started = Instant::now();
        let outcome = client.call(endpoint).await;
        let result = ProbeResult {
            attempt,
            endpoint,
            url: client.url(endpoint),
            elapsed: started.elapsed(),
            outcome,
        };

        if let Err(failure) = &result.outcome {
            tracing::debug!(attempt, endpoint = %endpoint, error = %failure, "Probe call failed");
        }
        on_result(&result);
        results.push(result);
    }

    results
}
