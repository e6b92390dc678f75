// Real process exit of the crash trigger
// Run with: cargo test -p loadbench-server --test crash_exit_test
//
// The test re-runs this binary with CRASH_CHILD_ENV set; the child installs a
// stderr logger and fires the real trigger, the parent inspects what it left.

use std::process::Command;

use loadbench_server::api::crash::{CRASH_EXIT_CODE, CRASH_REASON};
use loadbench_server::CrashTrigger;

const CRASH_CHILD_ENV: &str = "LOADBENCH_CRASH_CHILD";

#[test]
fn crash_child() {
    if std::env::var_os(CRASH_CHILD_ENV).is_none() {
        return;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    CrashTrigger::process_exit().trigger();
    unreachable!("process_exit trigger returned");
}

#[test]
fn test_process_exit_terminates_with_crash_code() {
    let exe = std::env::current_exe().expect("Failed to locate test binary");
    let output = Command::new(exe)
        .args(["--exact", "crash_child", "--nocapture", "--test-threads=1"])
        .env(CRASH_CHILD_ENV, "1")
        .output()
        .expect("Failed to run child process");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(CRASH_EXIT_CODE), "stderr: {stderr}");
    assert!(stderr.contains("ERROR"), "stderr: {stderr}");
    assert!(stderr.contains("reason"), "stderr: {stderr}");
    assert!(stderr.contains(CRASH_REASON), "stderr: {stderr}");

    // The harness never got to report the child test as finished
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("test result"), "stdout: {stdout}");
}
