use bytes::Bytes;
use drivesync_sync::transfer::{Activity, TransferGuard, partial_path, read_file, write_file};
use drivesync_sync::{ByteStream, SyncError, SyncResult};
use futures::StreamExt;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const IDLE: Duration = Duration::from_secs(5);

fn guard() -> (TransferGuard, CancellationToken) {
    let cancel = CancellationToken::new();
    (TransferGuard::new(IDLE, cancel.clone()), cancel)
}

// ── Idle timeout ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stalled_transfer_times_out() {
    let (guard, _cancel) = guard();
    let activity = Activity::new();

    let result: SyncResult<()> = guard
        .run(&activity, futures::future::pending())
        .await;
    match result {
        Err(SyncError::IdleTimeout(idle)) => assert_eq!(idle, IDLE),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn slow_but_progressing_transfer_completes() {
    let (guard, _cancel) = guard();
    let activity = Activity::new();

    // 30 seconds in total, never more than 3 seconds between chunks.
    let transfer = async {
        let mut chunks = 0;
        for _ in 0..10 {
            sleep(Duration::from_secs(3)).await;
            activity.touch();
            chunks += 1;
        }
        Ok::<_, SyncError>(chunks)
    };

    assert_eq!(guard.run(&activity, transfer).await.unwrap(), 10);
}

#[tokio::test(start_paused = true)]
async fn progress_then_stall_times_out() {
    let (guard, _cancel) = guard();
    let activity = Activity::new();

    let transfer = async {
        for _ in 0..3 {
            sleep(Duration::from_secs(2)).await;
            activity.touch();
        }
        futures::future::pending::<SyncResult<()>>().await
    };

    let started = tokio::time::Instant::now();
    let err = guard.run(&activity, transfer).await.unwrap_err();
    assert!(matches!(err, SyncError::IdleTimeout(_)));
    assert!(started.elapsed() >= Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn tracked_stream_records_progress() {
    let (guard, _cancel) = guard();
    let activity = Activity::new();
    let before = activity.last_progress();

    let stream: ByteStream = futures::stream::iter(vec![Ok(Bytes::from_static(b"abc"))]).boxed();
    let mut tracked = guard.track(stream, &activity);

    sleep(Duration::from_secs(4)).await;
    let chunk = tracked.next().await.unwrap().unwrap();
    assert_eq!(&chunk[..], b"abc");
    assert!(activity.last_progress() >= before + Duration::from_secs(4));
}

// ── Cancellation ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_transfer() {
    let (guard, cancel) = guard();
    let activity = Activity::new();

    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    // Keeps making progress for far longer than the cancellation delay.
    let transfer = async {
        for _ in 0..1000 {
            sleep(Duration::from_millis(100)).await;
            activity.touch();
        }
        Ok::<_, SyncError>(())
    };
    let result = guard.run(&activity, transfer).await;
    assert!(matches!(result, Err(SyncError::Cancelled)));
}

#[tokio::test]
async fn check_reflects_token() {
    let (guard, cancel) = guard();
    guard.check().unwrap();
    cancel.cancel();
    let err = guard.check().unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(guard.idle_timeout(), IDLE);
}

// ── File streams ────────────────────────────────────────────────

#[tokio::test]
async fn read_file_streams_in_chunks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &content).unwrap();

    let mut stream = read_file(&path, 4096).await.unwrap();
    let mut collected = Vec::new();
    let mut chunks = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 4096);
        collected.extend_from_slice(&chunk);
        chunks += 1;
    }
    assert_eq!(collected, content);
    assert!(chunks >= 3);
}

#[tokio::test]
async fn read_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let err = read_file(&dir.path().join("missing"), 1024).await.err().unwrap();
    assert!(matches!(err, SyncError::Io { .. }));
}

#[tokio::test]
async fn write_file_replaces_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, b"old content that is longer").unwrap();

    let stream: ByteStream = futures::stream::iter(vec![
        Ok(Bytes::from_static(b"new ")),
        Ok(Bytes::from_static(b"data")),
    ])
    .boxed();
    let written = write_file(stream, &path, &Activity::new()).await.unwrap();

    assert_eq!(written, 8);
    assert_eq!(std::fs::read(&path).unwrap(), b"new data");
    assert!(!partial_path(&path).exists());
}

#[tokio::test]
async fn write_file_propagates_stream_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.txt");

    let stream: ByteStream = futures::stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(SyncError::Network("connection reset".into())),
    ])
    .boxed();
    let err = write_file(stream, &path, &Activity::new()).await.unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
    assert!(!path.exists());
}

#[tokio::test]
async fn failed_write_keeps_previous_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, b"previous content").unwrap();

    let stream: ByteStream = futures::stream::iter(vec![
        Ok(Bytes::from_static(b"half of the new")),
        Err(SyncError::Network("connection reset".into())),
    ])
    .boxed();
    write_file(stream, &path, &Activity::new()).await.unwrap_err();

    assert_eq!(std::fs::read(&path).unwrap(), b"previous content");
    assert!(!partial_path(&path).exists());
}

#[test]
fn partial_path_is_a_sibling() {
    let path = std::path::Path::new("/data/docs/a.txt");
    assert_eq!(partial_path(path), std::path::PathBuf::from("/data/docs/a.txt.incomplete"));
}
