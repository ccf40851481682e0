//! Integration tests for the sampler process manager
//!
//! Each test drives a real child process: a small shell script that speaks
//! the sampler protocol.
#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::{
    FRAME, FakeSampler, LOG_COMMANDS, SILENT, STREAM_FRAMES, STUBBORN, process_alive,
    wait_for_exit,
};
use hue_hunter::SamplerError;
use hue_hunter::sampler::{ErrorFrame, SamplerConfig, SamplerManager, SamplerMessage};
use serde_json::json;
use tokio::sync::mpsc;

const CONFIG: SamplerConfig = SamplerConfig {
    grid_size: 9,
    sample_rate: 15,
};

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_ensure_started_waits_for_first_frame() {
    let fake = FakeSampler::new(STREAM_FRAMES);
    let mut manager = SamplerManager::new(fake.settings.clone());

    manager
        .ensure_started(CONFIG, Duration::from_secs(5))
        .await
        .expect("ensure_started failed");

    assert!(manager.is_running());
    assert!(manager.pid().is_some());

    manager.stop().await;
    assert!(!manager.is_running());
    assert_eq!(
        fake.commands(),
        vec![
            json!({"command": "start", "grid_size": 9, "sample_rate": 15}),
            json!({"command": "stop"}),
        ]
    );
}

#[tokio::test]
async fn test_ensure_started_times_out_on_silent_sampler() {
    let fake = FakeSampler::new(SILENT);
    let mut manager = SamplerManager::new(fake.settings.clone());
    let timeout = Duration::from_millis(300);

    let started = Instant::now();
    let result = manager.ensure_started(CONFIG, timeout).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(SamplerError::StartupTimeout(t)) if t == timeout));
    assert!(elapsed >= timeout, "rejected early after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "rejected late after {elapsed:?}");

    // The silent sampler exits as soon as its stdin closes
    let stopping = Instant::now();
    manager.stop().await;
    assert!(stopping.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_ensure_started_fails_on_error_frame() {
    let fake = FakeSampler::new(
        r#"printf '%s\n' '{"error":"screen capture permission denied"}'
cat > /dev/null
"#,
    );
    let mut manager = SamplerManager::new(fake.settings.clone());

    let result = manager.ensure_started(CONFIG, Duration::from_secs(5)).await;

    match result {
        Err(SamplerError::Sampler(message)) => {
            assert_eq!(message, "screen capture permission denied")
        }
        other => panic!("Expected sampler error, got {other:?}"),
    }
    manager.stop().await;
}

#[tokio::test]
async fn test_ensure_started_fails_fast_on_structured_error() {
    let fake = FakeSampler::new(
        r#"printf '%s\n' '{"error":{"code":5,"reason":"no display"}}'
cat > /dev/null
"#,
    );
    let mut manager = SamplerManager::new(fake.settings.clone());

    let started = Instant::now();
    let result = manager.ensure_started(CONFIG, Duration::from_secs(5)).await;

    match result {
        Err(SamplerError::Sampler(message)) => assert!(message.contains("no display")),
        other => panic!("Expected sampler error, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    manager.stop().await;
}

#[tokio::test]
async fn test_ensure_started_fails_when_sampler_exits() {
    let fake = FakeSampler::new("exit 0\n");
    let mut manager = SamplerManager::new(fake.settings.clone());

    let started = Instant::now();
    let result = manager.ensure_started(CONFIG, Duration::from_secs(5)).await;

    assert!(matches!(result, Err(SamplerError::Closed)));
    assert!(started.elapsed() < Duration::from_secs(2));

    manager.stop().await;
    assert!(!manager.is_running());
}

#[tokio::test]
async fn test_malformed_output_and_stderr_are_not_fatal() {
    let fake = FakeSampler::new(
        r#"echo "warming up" >&2
printf '%s\n' 'not json at all'
printf '%s\n' '{"cursor":'
printf '%s\n' '__FRAME__'
cat > /dev/null
"#,
    );
    let mut manager = SamplerManager::new(fake.settings.clone());

    manager
        .ensure_started(CONFIG, Duration::from_secs(5))
        .await
        .expect("malformed lines should be skipped");
    assert!(manager.is_running());
    manager.stop().await;
}

// ============================================================================
// Framing
// ============================================================================

#[tokio::test]
async fn test_frame_split_across_chunks() {
    let fake = FakeSampler::new(
        r#"printf '%s\n{"err' '__FRAME__'
sleep 0.2
printf '%s\n' 'or":"x"}'
cat > /dev/null
"#,
    );
    let mut manager = SamplerManager::new(fake.settings.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager.start(CONFIG, tx).await.expect("start failed");

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no first message");
    let expected: SamplerMessage = serde_json::from_str(FRAME).unwrap();
    assert_eq!(first, Some(expected));

    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no second message");
    assert_eq!(second, Some(SamplerMessage::Error(ErrorFrame::new("x"))));

    manager.stop().await;
    assert!(rx.recv().await.is_none(), "no frame may be duplicated");
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_commands_written_in_order() {
    let fake = FakeSampler::new(LOG_COMMANDS);
    let mut manager = SamplerManager::new(fake.settings.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    manager.start(CONFIG, tx).await.expect("start failed");
    manager.update_grid_size(11).await;
    manager.update_grid_size(13).await;
    manager.stop().await;

    assert_eq!(
        fake.commands(),
        vec![
            json!({"command": "start", "grid_size": 9, "sample_rate": 15}),
            json!({"command": "update_grid", "grid_size": 11}),
            json!({"command": "update_grid", "grid_size": 13}),
            json!({"command": "stop"}),
        ]
    );

    // Not running any more: dropped, not queued
    manager.update_grid_size(15).await;
    assert_eq!(fake.commands().len(), 4);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_restart_replaces_process() {
    let fake = FakeSampler::new(SILENT);
    let mut manager = SamplerManager::new(fake.settings.clone());

    let (tx, _rx) = mpsc::unbounded_channel();
    manager.start(CONFIG, tx).await.expect("first start failed");
    let first_pid = manager.pid().expect("no pid");

    let (tx, _rx2) = mpsc::unbounded_channel();
    manager.start(CONFIG, tx).await.expect("second start failed");
    let second_pid = manager.pid().expect("no pid");

    assert_ne!(first_pid, second_pid);
    assert!(!process_alive(first_pid), "previous sampler leaked");
    assert!(process_alive(second_pid));

    manager.stop().await;
    assert!(!process_alive(second_pid));
}

#[tokio::test]
async fn test_stop_kills_unresponsive_sampler() {
    let fake = FakeSampler::new(STUBBORN);
    let mut manager = SamplerManager::new(fake.settings.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    manager.start(CONFIG, tx).await.expect("start failed");
    let pid = manager.pid().expect("no pid");

    let started = Instant::now();
    manager.stop().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "killed early after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "stop hung for {elapsed:?}");
    assert!(!manager.is_running());
    assert!(!process_alive(pid));
}

#[tokio::test]
async fn test_abort_kills_without_waiting() {
    let fake = FakeSampler::new(STUBBORN);
    let mut manager = SamplerManager::new(fake.settings.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager.start(CONFIG, tx).await.expect("start failed");
    let pid = manager.pid().expect("no pid");

    let started = Instant::now();
    manager.abort();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(!manager.is_running());

    assert!(wait_for_exit(pid, Duration::from_secs(2)).await, "aborted sampler survived");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_unexpected_exit_clears_handle() {
    let fake = FakeSampler::new("read -r line\nexit 3\n");
    let mut manager = SamplerManager::new(fake.settings.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    manager.start(CONFIG, tx).await.expect("start failed");

    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.is_running() {
        assert!(Instant::now() < deadline, "sampler never exited");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(manager.pid().is_none());
    manager.stop().await;
}
