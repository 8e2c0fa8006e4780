//! Upload watcher lifecycle: markers, progress, cancellation and supersession
//!
//! Run with: cargo test --test upload_watch_test

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{test_summary, RecordingTransport, TestEnvironment};
use pretty_assertions::assert_eq;
use teloxide::types::{ChatId, MessageId};
use tubestash::telegram::StatusMessage;
use tubestash::upload::watcher::current_log_offset;
use tubestash::upload::{UnknownReason, UploadOutcome, UploadWatchConfig, UploadWatchRegistry, UploadWatchTarget};

const CHAT: ChatId = ChatId(42);

fn long_config(env: &TestEnvironment) -> UploadWatchConfig {
    UploadWatchConfig {
        timeout: Duration::from_secs(30),
        ..env.upload_config()
    }
}

async fn target(env: &TestEnvironment, file_name: &str) -> UploadWatchTarget {
    UploadWatchTarget {
        summary: test_summary(file_name, "gdrive", &env.data_root.join("gdrive")),
        origin_message_id: Some(MessageId(7)),
        log_offset: current_log_offset(&env.log_path).await,
    }
}

fn status(transport: &Arc<RecordingTransport>, message_id: i32) -> StatusMessage {
    StatusMessage::existing(transport.clone(), CHAT, MessageId(message_id))
}

#[tokio::test]
async fn test_progress_then_completion() {
    let env = TestEnvironment::new();
    env.append_log("boot");
    let transport = Arc::new(RecordingTransport::new());
    let registry = UploadWatchRegistry::new();

    let ticket = registry
        .start(long_config(&env), target(&env, "song.mp3").await, status(&transport, 10))
        .await;
    env.append_log("📤 Uploading: song.mp3");
    env.append_log("song.mp3: Transferred: 1 MiB / 10 MiB, 50%, 1 MiB/s, ETA 9s");
    env.append_log("✅ Upload completed: other.mp3");
    env.append_log("✅ Upload completed: song.mp3");

    let outcome = tokio::time::timeout(Duration::from_secs(5), ticket.outcome())
        .await
        .unwrap();
    assert_eq!(outcome, Some(UploadOutcome::Uploaded));

    let edits = transport.edits_of(MessageId(10));
    assert!(edits.iter().any(|t| t.starts_with("☁️ Starting upload to gdrive")));
    assert!(edits
        .iter()
        .any(|t| t == "☁️ Uploading to gdrive... 50%\n📊 1 MiB / 10 MiB • 1 MiB/s • ETA 9s"));
    assert!(edits.last().unwrap().contains("Uploaded to gdrive successfully"));
    assert_eq!(transport.deleted(), vec![MessageId(7)]);
}

#[tokio::test]
async fn test_stop_is_prompt_and_silent() {
    let env = TestEnvironment::new();
    env.append_log("boot");
    let transport = Arc::new(RecordingTransport::new());
    let registry = UploadWatchRegistry::new();

    let ticket = registry
        .start(long_config(&env), target(&env, "song.mp3").await, status(&transport, 10))
        .await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(registry.active_count(), 1);

    let started = Instant::now();
    assert!(registry.stop(CHAT, MessageId(10)).await);
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(ticket.try_outcome(), Some(UploadOutcome::Cancelled));
    assert_eq!(registry.active_count(), 0);
    assert!(transport.edits_of(MessageId(10)).is_empty());
    assert!(transport.deleted().is_empty());
    assert!(!registry.stop(CHAT, MessageId(10)).await);
}

#[tokio::test]
async fn test_new_watch_supersedes_old_one() {
    let env = TestEnvironment::new();
    env.append_log("boot");
    let transport = Arc::new(RecordingTransport::new());
    let registry = UploadWatchRegistry::new();

    let first = registry
        .start(long_config(&env), target(&env, "a.mp3").await, status(&transport, 10))
        .await;
    let second = registry
        .start(long_config(&env), target(&env, "b.mp3").await, status(&transport, 10))
        .await;

    assert_eq!(first.try_outcome(), Some(UploadOutcome::Cancelled));
    assert_eq!(registry.active_count(), 1);

    env.append_log("✅ Upload completed: b.mp3");
    let outcome = tokio::time::timeout(Duration::from_secs(5), second.outcome())
        .await
        .unwrap();
    assert_eq!(outcome, Some(UploadOutcome::Uploaded));
}

#[tokio::test]
async fn test_stop_all_leaves_a_terminal_message() {
    let env = TestEnvironment::new();
    env.append_log("boot");
    let transport = Arc::new(RecordingTransport::new());
    let registry = UploadWatchRegistry::new();

    let a = registry
        .start(long_config(&env), target(&env, "a.mp3").await, status(&transport, 10))
        .await;
    let b = registry
        .start(long_config(&env), target(&env, "b.mp3").await, status(&transport, 11))
        .await;
    assert_eq!(registry.active_count(), 2);

    registry.stop_all().await;

    assert_eq!(registry.active_count(), 0);
    let stopped = Some(UploadOutcome::Unknown(UnknownReason::Stopped));
    assert_eq!(a.try_outcome(), stopped);
    assert_eq!(b.try_outcome(), stopped);
    for id in [10, 11] {
        let last = transport.last_edit_of(MessageId(id)).unwrap();
        assert!(last.starts_with("⏹️ Upload monitoring stopped"));
        assert!(!last.contains("failed"));
    }
    assert_eq!(transport.deleted(), vec![MessageId(7), MessageId(7)]);
}

#[tokio::test]
async fn test_stop_is_prompt_while_edits_are_rate_limited() {
    let env = TestEnvironment::new();
    env.append_log("boot");
    let transport = Arc::new(RecordingTransport::rate_limited(6));
    let registry = UploadWatchRegistry::new();

    let ticket = registry
        .start(long_config(&env), target(&env, "song.mp3").await, status(&transport, 10))
        .await;
    env.append_log("📤 Uploading: song.mp3");
    // Let the watcher pick up the marker and block on the rate-limited edit
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    assert!(registry.stop(CHAT, MessageId(10)).await);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(ticket.try_outcome(), Some(UploadOutcome::Cancelled));
    assert!(transport.deleted().is_empty());
}

#[tokio::test]
async fn test_timeout_is_reported_as_unknown() {
    let env = TestEnvironment::new();
    env.append_log("boot");
    let transport = Arc::new(RecordingTransport::new());
    let registry = UploadWatchRegistry::new();
    let config = UploadWatchConfig {
        timeout: Duration::from_millis(100),
        ..env.upload_config()
    };

    let ticket = registry
        .start(config, target(&env, "song.mp3").await, status(&transport, 10))
        .await;
    let outcome = tokio::time::timeout(Duration::from_secs(5), ticket.outcome())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Some(UploadOutcome::Unknown(UnknownReason::Timeout))
    );
    let last = transport.last_edit_of(MessageId(10)).unwrap();
    assert!(last.starts_with("⏰ Upload monitoring timeout"));
}
