// HTTP client wrapper for the benchmark service

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use loadbench_core::Endpoint;
use thiserror::Error;

/// Why a request did not produce a successful response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("request timed out")]
    Timeout,

    /// The connection dropped before a response arrived (the crash signature)
    #[error("connection dropped before a response")]
    ConnectionReset,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("{0}")]
    Other(String),
}

impl RequestFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            RequestFailure::Status { .. } => FailureKind::Status,
            RequestFailure::Timeout => FailureKind::Timeout,
            RequestFailure::ConnectionReset => FailureKind::ConnectionReset,
            RequestFailure::ConnectionRefused => FailureKind::ConnectionRefused,
            RequestFailure::Other(_) => FailureKind::Other,
        }
    }

    /// Classify a transport-level error
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return RequestFailure::Timeout;
        }

        let kinds = io_error_kinds(err);
        if kinds.contains(&io::ErrorKind::ConnectionRefused) {
            return RequestFailure::ConnectionRefused;
        }
        if kinds.iter().any(|k| {
            matches!(
                k,
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        }) {
            return RequestFailure::ConnectionReset;
        }

        let message = error_chain(err);
        // hyper reports a peer that hung up mid-exchange as an incomplete message
        if message.contains("connection closed before message completed")
            || message.contains("connection reset")
        {
            return RequestFailure::ConnectionReset;
        }

        RequestFailure::Other(message)
    }
}

/// Failure categories counted by the load generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    Status,
    Timeout,
    ConnectionReset,
    ConnectionRefused,
    Other,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Status,
        FailureKind::Timeout,
        FailureKind::ConnectionReset,
        FailureKind::ConnectionRefused,
        FailureKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Status => "status",
            FailureKind::Timeout => "timeout",
            FailureKind::ConnectionReset => "connection_reset",
            FailureKind::ConnectionRefused => "connection_refused",
            FailureKind::Other => "other",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn io_error_kinds(err: &(dyn StdError + 'static)) -> Vec<io::ErrorKind> {
    let mut kinds = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            kinds.push(io_err.kind());
        }
        current = e.source();
    }
    kinds
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub status: u16,
    pub elapsed: Duration,
    pub body: String,
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// `base_url` is the service root including any API prefix
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// GET one endpoint. Non-2xx responses are failures.
    pub async fn call(&self, endpoint: Endpoint) -> Result<CallOutcome, RequestFailure> {
        let started = Instant::now();

        let response = self
            .http
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|e| RequestFailure::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RequestFailure::from_transport(&e))?;
        let elapsed = started.elapsed();

        if !status.is_success() {
            return Err(RequestFailure::Status {
                code: status.as_u16(),
                body,
            });
        }

        Ok(CallOutcome {
            status: status.as_u16(),
            elapsed,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let base = serve(Router::new().route("/status", get(|| async { r#"{"status":"ok"}"# }))).await;
        let client = Client::new(&base, Duration::from_secs(5)).unwrap();

        let outcome = client.call(Endpoint::Status).await.unwrap();
        assert_eq!(outcome.status, 200);
        assert!(outcome.body.contains("ok"));
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let base = serve(Router::new().route(
            "/io",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "pool exhausted") }),
        ))
        .await;
        let client = Client::new(&base, Duration::from_secs(5)).unwrap();

        let failure = client.call(Endpoint::Io).await.unwrap_err();
        assert_eq!(
            failure,
            RequestFailure::Status {
                code: 503,
                body: "pool exhausted".into()
            }
        );
        assert_eq!(failure.kind(), FailureKind::Status);
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let base = serve(Router::new().route(
            "/compute",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;
        let client = Client::new(&base, Duration::from_millis(100)).unwrap();

        let failure = client.call(Endpoint::Compute).await.unwrap_err();
        assert_eq!(failure, RequestFailure::Timeout);
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let failure = client.call(Endpoint::Status).await.unwrap_err();
        assert_eq!(failure, RequestFailure::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_dropped_connection_is_connection_reset() {
        // Accepts the request, then hangs up without answering
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                drop(socket);
            }
        });

        let client = Client::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let failure = client.call(Endpoint::Crash).await.unwrap_err();
        assert_eq!(failure, RequestFailure::ConnectionReset);
    }

    #[test]
    fn test_url_joins_prefix_and_path() {
        let client = Client::new("http://localhost:8000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(Endpoint::Io), "http://localhost:8000/api/io");
    }

    #[test]
    fn test_failure_kind_indices_match_all() {
        for (i, kind) in FailureKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
