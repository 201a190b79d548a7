use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::minutes_ago;
use super::report;
use super::stub_ledger::StubLedger;
use super::stub_store::StubStore;
use crate::database::TrustStore;
use crate::ledger::CallResponse;
use crate::models::AbuseReport;
use crate::sync::scheduler::run_loop;
use crate::sync::AbuseReportHarvester;
use crate::sync::Direction;
use crate::sync::ItemResult;
use crate::sync::LoopSettings;
use crate::sync::SyncStats;
use crate::sync::WatermarkPolicy;
use crate::sync::WatermarkTracker;
use crate::TrustSyncError;

fn ledger_with_reports(reports: Vec<AbuseReport>) -> StubLedger {
    let payload = serde_json::to_value(&reports).unwrap();
    StubLedger::new(move |_, _| CallResponse::success(payload.clone()))
}

fn harvester(store: &Arc<StubStore>, stub: &StubLedger, stats: &Arc<SyncStats>) -> AbuseReportHarvester {
    AbuseReportHarvester::new(store.clone(), Arc::new(stub.gateway()), stats.clone())
}

#[tokio::test]
async fn test_reports_are_persisted() {
    let store = Arc::new(StubStore::default());
    let stub = ledger_with_reports(vec![
        report("did:key:s1", "uhCkk1", minutes_ago(10)),
        report("did:key:s2", "uhCkk2", minutes_ago(20)),
    ]);
    let stats = Arc::new(SyncStats::new().unwrap());

    let cycle = harvester(&store, &stub, &stats)
        .run_cycle(minutes_ago(60))
        .await
        .unwrap();

    assert_eq!(cycle.succeeded(), 2);
    assert_eq!(store.stored_reports().len(), 2);
    assert_eq!(stats.snapshot().spam_reports_synced, 2);
    assert_eq!(stats.snapshot().harvest_cycles, 1);
    // Harvest cycles do not count as publish syncs
    assert_eq!(stats.snapshot().total_syncs, 0);
}

#[tokio::test]
async fn test_persisting_same_report_twice_stores_two_rows() {
    let store = StubStore::default();
    let item = report("did:key:s1", "uhCkk1", minutes_ago(10));

    store.persist_abuse_report(&item).await.unwrap();
    store.persist_abuse_report(&item).await.unwrap();

    assert_eq!(store.stored_reports(), vec![item.clone(), item]);
}

#[tokio::test]
async fn test_overlapping_cycles_duplicate_reports() {
    let store = Arc::new(StubStore::default());
    let stub = ledger_with_reports(vec![report("did:key:s1", "uhCkk1", minutes_ago(10))]);
    let stats = Arc::new(SyncStats::new().unwrap());
    let job = harvester(&store, &stub, &stats);

    job.run_cycle(minutes_ago(60)).await.unwrap();
    job.run_cycle(minutes_ago(60)).await.unwrap();

    assert_eq!(store.stored_reports().len(), 2);
}

#[tokio::test]
async fn test_unique_constraint_is_per_item_failure() {
    let store = Arc::new(StubStore::with_unique_reports());
    let stub = ledger_with_reports(vec![
        report("did:key:s1", "uhCkk1", minutes_ago(10)),
        report("did:key:s1", "uhCkk1", minutes_ago(10)),
        report("did:key:s2", "uhCkk2", minutes_ago(5)),
    ]);
    let stats = Arc::new(SyncStats::new().unwrap());

    let cycle = harvester(&store, &stub, &stats)
        .run_cycle(minutes_ago(60))
        .await
        .unwrap();

    assert_eq!(cycle.succeeded(), 2);
    assert_eq!(cycle.failed(), 1);
    match &cycle.outcomes[1].result {
        ItemResult::Failed(reason) => assert!(reason.contains("Duplicate"), "{reason}"),
        ItemResult::Synced => panic!("duplicate should fail"),
    }
    assert_eq!(store.stored_reports().len(), 2);
    assert_eq!(stats.snapshot().spam_reports_failed, 1);
}

#[tokio::test]
async fn test_invalid_report_is_not_persisted() {
    let store = Arc::new(StubStore::default());
    let stub = ledger_with_reports(vec![
        report("did:key:s1", "", minutes_ago(10)),
        report("did:key:s2", "uhCkk2", minutes_ago(5)),
    ]);
    let stats = Arc::new(SyncStats::new().unwrap());

    let cycle = harvester(&store, &stub, &stats)
        .run_cycle(minutes_ago(60))
        .await
        .unwrap();

    assert_eq!(cycle.succeeded(), 1);
    assert_eq!(store.stored_reports().len(), 1);
    assert_eq!(store.stored_reports()[0].message_hash, "uhCkk2");
}

#[tokio::test]
async fn test_error_envelope_fails_cycle() {
    let store = Arc::new(StubStore::default());
    let stub = StubLedger::new(|_, _| CallResponse::error(json!("source chain unavailable")));
    let stats = Arc::new(SyncStats::new().unwrap());

    let err = harvester(&store, &stub, &stats)
        .run_cycle(minutes_ago(60))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            TrustSyncError::CycleFailed {
                direction: Direction::Harvest,
                ..
            }
        ),
        "{err}"
    );
    assert!(err.to_string().contains("get_spam_reports"));
    assert_eq!(stats.snapshot().harvest_cycles, 0);
}

#[tokio::test]
async fn test_malformed_payload_fails_cycle() {
    let store = Arc::new(StubStore::default());
    let stub = StubLedger::new(|_, _| CallResponse::success(Value::String("not a list".into())));
    let stats = Arc::new(SyncStats::new().unwrap());

    let result = harvester(&store, &stub, &stats)
        .run_cycle(minutes_ago(60))
        .await;

    assert!(result.is_err());
    assert!(store.stored_reports().is_empty());
}

#[tokio::test]
async fn test_malformed_report_does_not_block_batch() {
    let store = Arc::new(StubStore::default());
    let mut payload = serde_json::to_value(vec![
        report("did:key:s1", "uhCkk1", minutes_ago(30)),
        report("did:key:s2", "uhCkk2", minutes_ago(20)),
        report("did:key:s3", "uhCkk3", minutes_ago(10)),
    ])
    .unwrap();
    payload[1]["reported_at"] = json!("yesterday");
    let stub = StubLedger::new(move |_, _| CallResponse::success(payload.clone()));
    let stats = Arc::new(SyncStats::new().unwrap());
    let job = harvester(&store, &stub, &stats);

    // The bad entry stays in the window; later cycles must not stall on it
    for cycle_number in 1..=2 {
        let cycle = job.run_cycle(minutes_ago(60)).await.unwrap();

        assert_eq!(cycle.succeeded(), 2);
        assert_eq!(cycle.failed(), 1);
        assert_eq!(cycle.outcomes[1].key, "uhCkk2");
        match &cycle.outcomes[1].result {
            ItemResult::Failed(reason) => {
                assert!(reason.contains("Item rejected"), "{reason}");
                assert!(reason.contains("yesterday"), "{reason}");
            }
            ItemResult::Synced => panic!("malformed report should fail"),
        }
        assert_eq!(store.stored_reports().len(), 2 * cycle_number);
    }

    let hashes: Vec<String> = store
        .stored_reports()
        .into_iter()
        .map(|r| r.message_hash)
        .collect();
    assert_eq!(hashes, vec!["uhCkk1", "uhCkk3", "uhCkk1", "uhCkk3"]);
    assert_eq!(stats.snapshot().spam_reports_failed, 2);
}

#[tokio::test]
async fn test_unreachable_store_fails_cycle() {
    let store = Arc::new(StubStore::default());
    store.fail_next_persists(1);
    let stub = ledger_with_reports(vec![
        report("did:key:s1", "uhCkk1", minutes_ago(10)),
        report("did:key:s2", "uhCkk2", minutes_ago(5)),
    ]);
    let stats = Arc::new(SyncStats::new().unwrap());

    let err = harvester(&store, &stub, &stats)
        .run_cycle(minutes_ago(60))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            TrustSyncError::CycleFailed {
                direction: Direction::Harvest,
                ..
            }
        ),
        "{err}"
    );
    assert!(err.to_string().contains("connection refused"), "{err}");
    assert!(store.stored_reports().is_empty());
    assert_eq!(stats.snapshot().harvest_cycles, 0);
    assert_eq!(stats.snapshot().spam_reports_failed, 0);
}

#[tokio::test]
async fn test_store_outage_holds_harvest_watermark() {
    let store = Arc::new(StubStore::default());
    store.fail_next_persists(usize::MAX);
    let stub = ledger_with_reports(vec![report("did:key:s1", "uhCkk1", minutes_ago(10))]);
    let stats = Arc::new(SyncStats::new().unwrap());
    let watermarks = Arc::new(WatermarkTracker::with_default_lookback());
    let initial = watermarks.current(Direction::Harvest).await;
    let cancel = CancellationToken::new();
    let settings = LoopSettings {
        interval: Duration::from_secs(3600),
        error_backoff: Duration::from_secs(3600),
        policy: WatermarkPolicy::CompletionTime,
    };

    let handle = tokio::spawn(run_loop(
        Arc::new(harvester(&store, &stub, &stats)),
        watermarks.clone(),
        stats.clone(),
        settings,
        cancel.clone(),
    ));

    while stats.snapshot().errors == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop did not stop on cancellation")
        .unwrap();

    assert_eq!(stats.snapshot().errors, 1);
    assert_eq!(watermarks.peek(Direction::Harvest).await, Some(initial));
    assert!(store.stored_reports().is_empty());
}
