use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::smtp::tests::ScriptedProbe;
use crate::smtp::{MailboxProbe, Rejection, SmtpOutcome};

const ADDRESS: &str = "user@example.com";
const MX: &str = "mx1.example.com";
const T0: i64 = 1_700_000_000;
const GREYLIST_DELAY: Duration = Duration::from_secs(600);

async fn store() -> GreylistStore {
    GreylistStore::open_in_memory().await.unwrap()
}

fn scheduler(store: &GreylistStore, probe: Arc<dyn MailboxProbe>) -> RetryScheduler {
    RetryScheduler::new(store.clone(), probe, RetryPolicy::default())
}

struct PanickingProbe;

#[async_trait]
impl MailboxProbe for PanickingProbe {
    async fn probe(&self, _mx_host: &str, _address: &str) -> SmtpOutcome {
        panic!("exchanger exploded");
    }
}

#[derive(Default)]
struct StuckProbe {
    calls: AtomicUsize,
}

#[async_trait]
impl MailboxProbe for StuckProbe {
    async fn probe(&self, _mx_host: &str, _address: &str) -> SmtpOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        SmtpOutcome::Accepted
    }
}

#[tokio::test]
async fn first_upsert_creates_single_attempt() {
    let store = store().await;
    let record = store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.last_attempt, T0);
    assert_eq!(record.next_attempt, T0 + 600);
    assert_eq!(store.get(ADDRESS).await.unwrap(), Some(record));
}

#[tokio::test]
async fn repeated_upsert_keeps_one_row() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let record = store
        .upsert_at(ADDRESS, "mx2.example.com", GREYLIST_DELAY, T0 + 10)
        .await
        .unwrap();
    assert_eq!(record.attempt_count, 2);
    assert_eq!(record.mx_host, "mx2.example.com");
    assert_eq!(record.next_attempt, T0 + 610);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn zero_delay_still_moves_next_attempt_forward() {
    let store = store().await;
    let record = store.upsert_at(ADDRESS, MX, Duration::ZERO, T0).await.unwrap();
    assert!(record.next_attempt > record.last_attempt);
}

#[tokio::test]
async fn fetch_due_honours_time_and_limit() {
    let store = store().await;
    store.upsert_at("a@example.com", MX, Duration::from_secs(60), T0).await.unwrap();
    store.upsert_at("b@example.com", MX, Duration::from_secs(120), T0).await.unwrap();
    store.upsert_at("c@example.com", MX, Duration::from_secs(900), T0).await.unwrap();

    assert!(store.fetch_due_at(T0, 50).await.unwrap().is_empty());

    let due = store.fetch_due_at(T0 + 120, 50).await.unwrap();
    let addresses: Vec<_> = due.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addresses, ["a@example.com", "b@example.com"]);

    assert_eq!(store.fetch_due_at(T0 + 1_000, 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    store.delete(ADDRESS).await.unwrap();
    store.delete(ADDRESS).await.unwrap();
    assert_eq!(store.get(ADDRESS).await.unwrap(), None);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state").join("greylist.db");

    let store = GreylistStore::open(&path).await.unwrap();
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    store.close().await;

    let reopened = GreylistStore::open(&path).await.unwrap();
    let record = reopened.get(ADDRESS).await.unwrap().unwrap();
    assert_eq!(record.mx_host, MX);
    assert_eq!(record.attempt_count, 1);
}

#[test]
fn backoff_doubles_per_attempt() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff(0), Duration::from_secs(600));
    assert_eq!(policy.backoff(1), Duration::from_secs(1200));
    assert_eq!(policy.backoff(2), Duration::from_secs(2400));
    assert_eq!(policy.backoff(40), Duration::from_secs(600).saturating_mul(u32::MAX));
}

#[tokio::test]
async fn deferred_again_is_rescheduled_with_backoff() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let probe = Arc::new(ScriptedProbe::new().on(MX, &[SmtpOutcome::TemporaryFailure { code: 450 }]));

    let now = T0 + 600;
    let summary = scheduler(&store, probe.clone()).run_pass_at(now).await;
    assert_eq!(summary.rescheduled, 1);

    let record = store.get(ADDRESS).await.unwrap().unwrap();
    assert_eq!(record.attempt_count, 2);
    assert_eq!(record.next_attempt, now + 1200);
    assert_eq!(probe.calls(), vec![(MX.to_string(), ADDRESS.to_string())]);
}

#[tokio::test]
async fn entries_not_yet_due_are_left_alone() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let probe = Arc::new(ScriptedProbe::new());

    let summary = scheduler(&store, probe.clone()).run_pass_at(T0 + 599).await;
    assert_eq!(summary, PassSummary::default());
    assert!(probe.calls().is_empty());
}

#[tokio::test]
async fn acceptance_resolves_and_removes() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let probe = Arc::new(ScriptedProbe::new().on(MX, &[SmtpOutcome::Accepted]));

    let summary = scheduler(&store, probe).run_pass_at(T0 + 600).await;
    assert_eq!(summary.resolved, 1);
    assert_eq!(store.get(ADDRESS).await.unwrap(), None);
}

#[tokio::test]
async fn coded_rejection_resolves_and_removes() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let probe = Arc::new(
        ScriptedProbe::new().on(MX, &[SmtpOutcome::Rejected(Rejection::Code(550))]),
    );

    let summary = scheduler(&store, probe).run_pass_at(T0 + 600).await;
    assert_eq!(summary.resolved, 1);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn unreachable_exchanger_is_retried() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let probe = Arc::new(ScriptedProbe::new());

    let summary = scheduler(&store, probe).run_pass_at(T0 + 600).await;
    assert_eq!(summary.rescheduled, 1);
    assert_eq!(store.get(ADDRESS).await.unwrap().unwrap().attempt_count, 2);
}

#[tokio::test]
async fn gives_up_after_three_attempts() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let deferred = SmtpOutcome::TemporaryFailure { code: 451 };
    let probe = Arc::new(ScriptedProbe::new().on(MX, &[deferred, deferred, deferred]));
    let scheduler = scheduler(&store, probe.clone());

    let mut now = T0;
    let mut passes = Vec::new();
    while let Some(record) = store.get(ADDRESS).await.unwrap() {
        now = record.next_attempt;
        passes.push(scheduler.run_pass_at(now).await);
        assert!(passes.len() <= 3, "entry never dropped");
    }

    assert_eq!(passes.len(), 3);
    assert_eq!(passes[0].rescheduled, 1);
    assert_eq!(passes[1].rescheduled, 1);
    assert_eq!(passes[2].exhausted, 1);
    assert_eq!(probe.calls().len(), 3);
    assert!(now > T0);
}

#[tokio::test]
async fn panicking_probe_counts_as_temporary_failure() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();

    let summary = scheduler(&store, Arc::new(PanickingProbe))
        .run_pass_at(T0 + 600)
        .await;
    assert_eq!(summary.rescheduled, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(store.get(ADDRESS).await.unwrap().unwrap().attempt_count, 2);
}

#[tokio::test]
async fn stuck_probe_is_cut_off_at_deadline() {
    let store = store().await;
    store.upsert_at(ADDRESS, MX, GREYLIST_DELAY, T0).await.unwrap();
    let probe = Arc::new(StuckProbe::default());
    let policy = RetryPolicy {
        probe_deadline: Duration::from_millis(50),
        ..RetryPolicy::default()
    };

    let summary = RetryScheduler::new(store.clone(), probe.clone(), policy)
        .run_pass_at(T0 + 600)
        .await;
    assert_eq!(summary.rescheduled, 1);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn one_pass_takes_one_batch() {
    let store = store().await;
    for i in 0..5 {
        store
            .upsert_at(&format!("user{i}@example.com"), MX, GREYLIST_DELAY, T0)
            .await
            .unwrap();
    }
    let policy = RetryPolicy {
        batch_size: 2,
        ..RetryPolicy::default()
    };
    let probe = Arc::new(ScriptedProbe::new().on(MX, &[SmtpOutcome::Accepted; 5]));

    let summary = RetryScheduler::new(store.clone(), probe, policy)
        .run_pass_at(T0 + 600)
        .await;
    assert_eq!(summary.resolved, 2);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn spawned_loop_drains_queue_and_stops_on_cancel() {
    let store = store().await;
    store.upsert(ADDRESS, MX, Duration::ZERO).await.unwrap();
    let policy = RetryPolicy {
        poll_interval: Duration::from_millis(20),
        ..RetryPolicy::default()
    };
    let probe = Arc::new(ScriptedProbe::new().on(MX, &[SmtpOutcome::Accepted]));

    let cancel = CancellationToken::new();
    let handle = RetryScheduler::new(store.clone(), probe, policy).spawn(cancel.clone());

    let mut drained = false;
    for _ in 0..200 {
        if store.count().await.unwrap() == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(drained);
}
