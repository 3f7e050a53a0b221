//! End-to-end gate scenarios over in-memory pipes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stream_gate::gate::{predicate_fn, OutcomeKind, SharedPredicate};
use stream_gate::{GateConfig, GateReport, GateVerdict, GatedStream};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct Harness {
    before: DuplexStream,
    after: DuplexStream,
    task: JoinHandle<anyhow::Result<GateReport>>,
}

fn create_streams(required_bytes: usize, predicate: SharedPredicate) -> Harness {
    let (before, mut gate_in) = duplex(1024);
    let (mut gate_out, after) = duplex(1024);
    let stream = GatedStream::new(GateConfig::new(required_bytes), Some(predicate));

    let task = tokio::spawn(async move { stream.run(&mut gate_in, &mut gate_out).await });

    Harness {
        before,
        after,
        task,
    }
}

fn always(result: bool) -> SharedPredicate {
    predicate_fn(move |_head| Ok(result))
}

#[tokio::test]
async fn test_validation_passes() {
    let mut h = create_streams(1, always(true));

    h.before.write_all(b"test1").await.unwrap();

    let mut buf = [0u8; 5];
    timeout(Duration::from_secs(5), h.after.read_exact(&mut buf))
        .await
        .expect("downstream should receive data")
        .unwrap();
    assert_eq!(&buf, b"test1");
}

#[tokio::test]
async fn test_nothing_forwarded_below_threshold() {
    let mut h = create_streams(100, always(true));

    h.before.write_all(b"test1").await.unwrap();

    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_millis(100), h.after.read(&mut buf)).await;
    assert!(read.is_err(), "no data should reach downstream");
}

#[tokio::test]
async fn test_nothing_forwarded_when_validation_fails() {
    let mut h = create_streams(1, always(false));

    h.before.write_all(b"test1").await.unwrap();
    h.before.shutdown().await.unwrap();

    let report = h.task.await.unwrap().unwrap();
    let mut received = Vec::new();
    h.after.read_to_end(&mut received).await.unwrap();

    assert!(received.is_empty());
    assert_eq!(report.verdict(), GateVerdict::Failed);
    assert_eq!(
        report.outcome_kinds(),
        vec![OutcomeKind::ValidationFailed, OutcomeKind::Disposed]
    );
    assert!(!report.completed);
}

#[tokio::test]
async fn test_nothing_forwarded_when_validation_throws() {
    let mut h = create_streams(1, predicate_fn(|_head| anyhow::bail!("e")));

    h.before.write_all(b"test1").await.unwrap();
    h.before.shutdown().await.unwrap();

    let report = h.task.await.unwrap().unwrap();
    let mut received = Vec::new();
    h.after.read_to_end(&mut received).await.unwrap();

    assert!(received.is_empty());
    assert_eq!(report.verdict(), GateVerdict::Errored);
    assert_eq!(report.error().unwrap().to_string(), "e");
    assert_eq!(
        report.outcome_kinds(),
        vec![OutcomeKind::ValidationError, OutcomeKind::Disposed]
    );
    // Upstream ended after the error; its completion still goes through
    assert!(report.completed);
}

#[tokio::test]
async fn test_end_during_erroring_validation_still_completes() {
    let predicate = stream_gate::gate::async_predicate_fn(|_head| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err::<bool, _>(anyhow::anyhow!("checksum service down"))
    });
    let mut h = create_streams(2, predicate);

    h.before.write_all(b"abcd").await.unwrap();
    h.before.shutdown().await.unwrap();

    let report = h.task.await.unwrap().unwrap();
    let mut received = Vec::new();
    h.after.read_to_end(&mut received).await.unwrap();

    assert!(received.is_empty());
    assert!(report.completed);
    assert_eq!(report.verdict(), GateVerdict::Errored);
    assert_eq!(report.state, stream_gate::GateState::Completed { failed: false });
    assert_eq!(
        report.outcome_kinds(),
        vec![OutcomeKind::ValidationError, OutcomeKind::Disposed]
    );
}

#[tokio::test]
async fn test_dispose_after_validation_passes_and_input_ends() {
    let mut h = create_streams(1, always(true));

    h.before.write_all(b"test1").await.unwrap();
    h.before.shutdown().await.unwrap();

    let report = h.task.await.unwrap().unwrap();
    let mut received = Vec::new();
    h.after.read_to_end(&mut received).await.unwrap();

    assert_eq!(received, b"test1");
    assert!(report.completed);
    assert!(report.disposed);
    assert_eq!(report.outcome_kinds(), vec![OutcomeKind::Disposed]);
}

#[tokio::test]
async fn test_chunks_after_threshold_keep_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let predicate = predicate_fn(move |head| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(head == b"HEAD")
    });
    let mut h = create_streams(4, predicate);

    for part in [&b"HE"[..], b"AD", b"-one", b"-two", b"-three"] {
        h.before.write_all(part).await.unwrap();
    }
    h.before.shutdown().await.unwrap();

    let report = h.task.await.unwrap().unwrap();
    let mut received = Vec::new();
    h.after.read_to_end(&mut received).await.unwrap();

    assert_eq!(received, b"HEAD-one-two-three");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.bytes_forwarded, received.len() as u64);
}

#[tokio::test]
async fn test_slow_predicate_holds_back_end_of_input() {
    let predicate = stream_gate::gate::async_predicate_fn(|_head| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, anyhow::Error>(true)
    });
    let mut h = create_streams(2, predicate);

    h.before.write_all(b"ab").await.unwrap();
    h.before.write_all(b"cd").await.unwrap();
    h.before.shutdown().await.unwrap();

    let report = h.task.await.unwrap().unwrap();
    let mut received = Vec::new();
    h.after.read_to_end(&mut received).await.unwrap();

    assert_eq!(received, b"abcd");
    assert!(report.completed);
    assert_eq!(report.verdict(), GateVerdict::Passed);
}
