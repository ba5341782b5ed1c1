//! End-to-end relay cycles against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use outbox_core::app::{
    BusinessError, BusinessWrite, CycleOutcome, RelayConfig, RelayError, RelayHandle, RelayWorker,
};
use outbox_core::domain::{Message, OutboxId};
use outbox_core::impls::{InMemoryOutboxStore, InMemoryTx, RecordingProducer};
use outbox_core::ports::{ManualClock, OutboxStore, ProduceError};

fn store() -> Arc<InMemoryOutboxStore> {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start, chrono::Duration::seconds(1));
    Arc::new(InMemoryOutboxStore::with_clock(Arc::new(clock)))
}

async fn insert(store: &InMemoryOutboxStore, value: &str) -> OutboxId {
    let mut tx = store.begin().await.unwrap();
    let id = store
        .enqueue(&mut tx, &Message::new("orders", "order-1", value))
        .await
        .unwrap();
    store.commit(tx).await.unwrap();
    id
}

#[tokio::test]
async fn scenario_a_batches_advance_in_order() {
    let store = store();
    let r1 = insert(&store, "r1").await;
    let r2 = insert(&store, "r2").await;
    let r3 = insert(&store, "r3").await;

    let producer = Arc::new(RecordingProducer::new());
    let worker = RelayWorker::new(
        Arc::clone(&store),
        Arc::clone(&producer),
        RelayConfig::default().with_batch_size(2),
    )
    .unwrap();

    assert_eq!(
        worker.run_cycle().await.unwrap(),
        CycleOutcome::Delivered { count: 2 }
    );
    assert!(store.get(r1).await.unwrap().is_delivered());
    assert!(store.get(r2).await.unwrap().is_delivered());

    let next = store.fetch_batch(2).await.unwrap();
    assert_eq!(next.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r3]);

    assert_eq!(
        worker.run_cycle().await.unwrap(),
        CycleOutcome::Delivered { count: 1 }
    );
    assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Idle);

    let published: Vec<Vec<u8>> = producer.published().into_iter().map(|m| m.value).collect();
    assert_eq!(published, vec![b"r1".to_vec(), b"r2".to_vec(), b"r3".to_vec()]);
}

#[tokio::test]
async fn scenario_b_failed_publish_is_retried_with_new_records() {
    let store = store();
    let first = vec![insert(&store, "a").await, insert(&store, "b").await];

    let producer = Arc::new(RecordingProducer::new());
    producer.fail_next(ProduceError::Transport("connection refused".into()));
    let worker = RelayWorker::new(
        Arc::clone(&store),
        Arc::clone(&producer),
        RelayConfig::default(),
    )
    .unwrap();

    let err = worker.run_cycle().await.unwrap_err();
    assert!(matches!(err, RelayError::Produce { count: 2, .. }));
    for id in &first {
        assert!(!store.get(*id).await.unwrap().is_delivered());
    }

    let late = insert(&store, "c").await;
    let pending: Vec<OutboxId> = store
        .fetch_batch(10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(pending, vec![first[0], first[1], late]);

    assert_eq!(
        worker.run_cycle().await.unwrap(),
        CycleOutcome::Delivered { count: 3 }
    );
    assert_eq!(store.counts().await.unwrap().undelivered, 0);
    assert_eq!(producer.calls(), 2);
}

/// Stages its `message_infos` row, then fails like a constraint violation.
struct FailingInfoInsert;

#[async_trait]
impl BusinessWrite<InMemoryTx> for FailingInfoInsert {
    async fn apply(&self, tx: &mut InMemoryTx, messages: &[Message]) -> Result<(), BusinessError> {
        for message in messages {
            tx.insert_business_row(
                "message_infos",
                serde_json::json!({ "value_length": message.value.len() }),
            );
        }
        Err("null value in column \"value_length\"".into())
    }
}

#[tokio::test]
async fn scenario_c_business_failure_after_outbox_insert_leaves_nothing() {
    let store = store();
    let message = Message::new("orders", "k", "v");

    let mut tx = store.begin().await.unwrap();
    store.enqueue(&mut tx, &message).await.unwrap();
    assert_eq!(tx.staged_len(), 1);

    let business = FailingInfoInsert
        .apply(&mut tx, std::slice::from_ref(&message))
        .await;
    assert!(business.is_err());
    drop(tx);

    assert!(store.business_rows("message_infos").await.is_empty());
    assert_eq!(store.counts().await.unwrap().total(), 0);
    assert!(store.fetch_batch(10).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timed_out_cycle_is_retried_on_next_tick() {
    let store = store();
    insert(&store, "slow").await;

    let producer = Arc::new(RecordingProducer::new().with_latency(Duration::from_millis(1500)));
    let worker = RelayWorker::new(
        Arc::clone(&store),
        Arc::clone(&producer),
        RelayConfig::default().with_timeout(Duration::from_secs(1)),
    )
    .unwrap();
    let handle = RelayHandle::spawn(worker);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let report = handle.shutdown_and_join().await.unwrap();

    assert!(report.timed_out_cycles >= 2);
    assert_eq!(report.delivered, 0);
    assert_eq!(store.counts().await.unwrap().undelivered, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_lets_in_flight_cycle_finish() {
    let store = store();
    insert(&store, "x").await;

    let producer = Arc::new(RecordingProducer::new().with_latency(Duration::from_secs(3)));
    let worker = RelayWorker::new(
        Arc::clone(&store),
        Arc::clone(&producer),
        RelayConfig::default(),
    )
    .unwrap();
    let handle = RelayHandle::spawn(worker);

    // first tick fires at once; the publish is now sleeping
    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = handle.shutdown_and_join().await.unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(store.counts().await.unwrap().delivered, 1);
}

#[tokio::test(start_paused = true)]
async fn backlog_drains_across_ticks() {
    let store = store();
    for i in 0..25 {
        insert(&store, &format!("m{i}")).await;
    }

    let producer = Arc::new(RecordingProducer::new());
    let worker = RelayWorker::new(
        Arc::clone(&store),
        Arc::clone(&producer),
        RelayConfig::default()
            .with_batch_size(10)
            .with_interval(Duration::from_millis(200)),
    )
    .unwrap();
    let handle = RelayHandle::spawn(worker);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = handle.shutdown_and_join().await.unwrap();

    assert_eq!(report.delivered, 25);
    let sizes: Vec<usize> = producer.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
}
