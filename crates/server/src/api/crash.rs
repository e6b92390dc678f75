// Crash endpoint
//
// Terminates the process on the spot: no pool shutdown, no response flush.
// Recovery is the job of whatever supervises the process (compose, k8s,
// systemd). Do not make this graceful.

use std::fmt;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};

use crate::AppState;

/// Exit status of an intentional crash
pub const CRASH_EXIT_CODE: i32 = 1;

/// Marker logged before exiting, so log-based monitoring can tell an
/// intentional crash from a genuine one
pub const CRASH_REASON: &str = "crash_endpoint";

type ExitHook = dyn Fn(i32) + Send + Sync;

/// Terminates the process when triggered
#[derive(Clone)]
pub struct CrashTrigger {
    hook: Arc<ExitHook>,
}

impl CrashTrigger {
    /// Exit the real process
    pub fn process_exit() -> Self {
        Self {
            hook: Arc::new(|code: i32| {
                std::process::exit(code);
            }),
        }
    }

    /// Replace process exit with `hook` (tests)
    pub fn with_hook(hook: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self {
            hook: Arc::new(hook),
        }
    }

    pub fn trigger(&self) {
        tracing::error!(
            reason = CRASH_REASON,
            exit_code = CRASH_EXIT_CODE,
            pid = std::process::id(),
            "Crash requested, terminating process without cleanup"
        );
        (self.hook)(CRASH_EXIT_CODE);
    }
}

impl fmt::Debug for CrashTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrashTrigger").finish_non_exhaustive()
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new().route("/crash", get(crash)).with_state(state)
}

/// GET /crash - never returns with the default trigger
pub async fn crash(State(state): State<AppState>) -> StatusCode {
    state.crash.trigger();

    // Only reached when the trigger is a non-exiting hook
    StatusCode::SERVICE_UNAVAILABLE
}
