//! End-to-end tests with real child processes.

#![cfg(unix)]

use std::time::{Duration, Instant};

use chainrun_core::config::ManagerConfig;
use chainrun_core::jobs::{CommandLine, JobContext, JobStatus};
use chainrun_core::manager::Manager;
use chainrun_core::runner::{CommandRunner, ProcessRunner, RunOutcome};

fn manager(time_unit_ms: u64) -> Manager {
    Manager::new(
        ManagerConfig::default()
            .with_poll_interval_ms(10)
            .with_time_unit_ms(time_unit_ms),
    )
}

#[tokio::test]
async fn test_diamond_wall_time() {
    let contexts = vec![
        JobContext::new("a", "sleep 0.1"),
        JobContext::new("b", "sleep 0.3").waits(["a"]),
        JobContext::new("c", "sleep 0.1").waits(["a"]),
        JobContext::new("d", "sleep 0.2").waits(["b", "c"]),
    ];
    let mut manager = manager(100);
    manager.submit(&contexts).await.unwrap();

    let started = Instant::now();
    let report = manager.run().await;
    let elapsed = started.elapsed();

    assert!(report.completed, "{:?}", report);
    assert!(!report.error_occurred);
    for entry in &report.results {
        assert_eq!(entry.report.status, JobStatus::Completed);
        assert_eq!(entry.report.exit_code, Some(0));
    }
    // 0.1 + 0.3 + 0.2 along the critical path
    assert!(elapsed >= Duration::from_millis(600), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_timeout_kills_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let contexts = vec![JobContext::new("hang", "echo started; sleep 5")
        .with_timeout(1.0)
        .with_retry(2)
        .with_delay(0.0)
        .with_log_output_directory(dir.path())];
    let mut manager = manager(100);
    manager.submit(&contexts).await.unwrap();

    let started = Instant::now();
    let report = manager.run().await;

    assert!(started.elapsed() < Duration::from_secs(4));
    let hang = report.get("hang").unwrap();
    assert_eq!(hang.status, JobStatus::RetryOut);
    assert_eq!(hang.exit_code, None);
    assert_eq!(hang.retried, Some(1));
    assert!(report.error_occurred);

    let log = std::fs::read_to_string(dir.path().join("hang.log")).unwrap();
    assert!(log.contains("started"), "{log}");
    assert!(log.contains("Error: Timed out(1/2)"), "{log}");
    assert!(log.contains("Error: Timed out(2/2)"), "{log}");
}

#[tokio::test]
async fn test_non_zero_exit_blocks_dependents() {
    let contexts = vec![
        JobContext::new("fail", "exit 7"),
        JobContext::new("after", "true").waits(["fail"]),
    ];
    let mut manager = manager(100);
    manager.submit(&contexts).await.unwrap();

    let report = manager.run().await;

    assert_eq!(report.get("fail").unwrap().exit_code, Some(7));
    assert_eq!(report.get("after").unwrap().status, JobStatus::Ready);
    assert_eq!(manager.stuck_jobs(), vec!["after"]);
}

#[tokio::test]
async fn test_launch_failure_is_reported() {
    let contexts = vec![JobContext::new("ghost", CommandLine::args(["/nonexistent/chainrun-binary"]))];
    let mut manager = manager(100);
    manager.submit(&contexts).await.unwrap();

    let report = manager.run().await;
    let ghost = report.get("ghost").unwrap();

    assert_eq!(ghost.status, JobStatus::Completed);
    assert_eq!(ghost.exit_code, Some(-1));
    assert!(ghost.error.is_some());
    assert!(report.error_occurred);
}

#[tokio::test]
async fn test_argument_vector_is_not_shell_expanded() {
    let runner = ProcessRunner::new();
    let outcome = runner
        .run(&CommandLine::args(["echo", "$HOME"]), Some(Duration::from_secs(5)))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Exited { exit_code, stdout, .. } => {
            assert_eq!(exit_code, 0);
            assert_eq!(stdout, "$HOME\n");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_partial_output_survives_timeout() {
    let runner = ProcessRunner::new();
    let outcome = runner
        .run(
            &CommandLine::shell("echo one; echo two 1>&2; sleep 5"),
            Some(Duration::from_millis(300)),
        )
        .await
        .unwrap();

    match outcome {
        RunOutcome::TimedOut { partial_output } => {
            assert!(partial_output.contains("one"));
            assert!(partial_output.contains("two"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}
