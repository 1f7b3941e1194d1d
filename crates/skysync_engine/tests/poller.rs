//! Remote poller scheduling and snapshot behavior.

use skysync_engine::{LifecycleEvent, PollerConfig, RemotePoller, SyncError};
use skysync_feed::DeliveryQueue;
use skysync_remote::Predicate;
use skysync_testkit::prelude::*;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(60);

fn poller(harness: &Harness, interval: Duration) -> RemotePoller<Note> {
    RemotePoller::new(
        harness.gateway.clone(),
        PollerConfig::new().with_pull_interval(interval),
        harness.lifecycle_source(),
    )
    .unwrap()
}

fn probe(poller: &RemotePoller<Note>) -> SnapshotProbe<Note> {
    let probe = SnapshotProbe::new();
    poller.subscribe_to_changes_on(DeliveryQueue::immediate(), probe.callback());
    probe
}

#[tokio::test(start_paused = true)]
async fn start_refreshes_immediately_then_on_the_timer() {
    init_tracing();
    let harness = Harness::new();
    harness.seed(&Note::dated("n1", "a", at(1)));
    let poller = poller(&harness, INTERVAL);
    let mut probe = probe(&poller);

    poller.start().unwrap();
    assert!(poller.is_running());
    assert_eq!(probe.next().await.unwrap().len(), 1);

    harness.seed(&Note::dated("n2", "b", at(1)));
    assert!(probe.next_within(Duration::from_secs(30)).await.is_none());
    assert_eq!(probe.next_within(INTERVAL).await.unwrap().len(), 2);
    assert_eq!(poller.entities().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_scheduled_refreshes() {
    let harness = Harness::new();
    let poller = poller(&harness, INTERVAL);
    let mut probe = probe(&poller);

    poller.start().unwrap();
    probe.next().await.unwrap();
    poller.stop();
    assert!(!poller.is_running());

    harness.seed(&Note::dated("n1", "a", at(1)));
    assert!(probe.next_within(INTERVAL * 3).await.is_none());
    assert!(poller.entities().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_releases_gateway_and_lifecycle_subscriptions() {
    let harness = Harness::new();
    let poller = poller(&harness, INTERVAL);

    poller.start().unwrap();
    poller.start().unwrap();
    assert_eq!(harness.gateway.change_subscriber_count(), 1);
    assert_eq!(harness.lifecycle.listener_count(), 1);

    poller.stop();
    assert_eq!(harness.gateway.change_subscriber_count(), 0);
    assert_eq!(harness.lifecycle.listener_count(), 0);

    poller.start().unwrap();
    assert_eq!(harness.gateway.change_subscriber_count(), 1);
    drop(poller);
    assert_eq!(harness.gateway.change_subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn foreground_event_triggers_refresh() {
    let harness = Harness::new();
    let poller = poller(&harness, Duration::from_secs(3600));
    let mut probe = probe(&poller);

    poller.start().unwrap();
    probe.next().await.unwrap();
    harness.seed(&Note::dated("n1", "a", at(1)));

    harness.lifecycle.emit(LifecycleEvent::DidEnterBackground);
    assert!(probe.next_within(Duration::from_secs(1)).await.is_none());

    harness.lifecycle.emit(LifecycleEvent::WillEnterForeground);
    assert_eq!(probe.next().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn gateway_mutation_triggers_refresh() {
    let harness = Harness::new();
    let poller = poller(&harness, Duration::from_secs(3600));
    let mut probe = probe(&poller);

    poller.start().unwrap();
    probe.next().await.unwrap();

    harness.gateway.create(&Note::new("created")).await.unwrap();
    let snapshot = probe.next().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].title(), "created");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let harness = Harness::new();
    harness.seed(&Note::dated("n1", "a", at(1)));
    let poller = poller(&harness, INTERVAL);
    let mut probe = probe(&poller);

    poller.refresh().await.unwrap();
    assert_eq!(probe.try_next().unwrap().len(), 1);

    harness.store.set_unreachable(true);
    assert!(poller.refresh().await.is_err());
    assert_eq!(poller.entities().len(), 1);
    assert!(probe.try_next().is_none());
}

#[tokio::test]
async fn unparseable_records_fail_the_refresh() {
    let harness = Harness::new();
    harness.seed(&Note::dated("n1", "a", at(1)));
    harness
        .store
        .seed(skysync_remote::Record::new("Note", skysync_remote::RecordId::new("broken")));
    let poller = poller(&harness, INTERVAL);

    assert!(poller.refresh().await.is_err());
    assert!(poller.entities().is_empty());
}

#[tokio::test]
async fn set_predicate_refreshes_with_the_new_filter() {
    let harness = Harness::new();
    harness.seed(&Note::dated("n1", "keep", at(1)));
    harness.seed(&Note::dated("n2", "drop", at(1)));
    let poller = poller(&harness, INTERVAL);

    poller.refresh().await.unwrap();
    assert_eq!(poller.entities().len(), 2);

    poller.set_predicate(Predicate::eq("title", "keep")).await.unwrap();
    assert_eq!(poller.predicate(), Predicate::eq("title", "keep"));
    let snapshot = poller.entities();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].title(), "keep");
}

#[tokio::test]
async fn serial_subscribers_each_receive_every_snapshot() {
    let harness = Harness::new();
    harness.seed(&Note::dated("n1", "a", at(1)));
    let poller = poller(&harness, INTERVAL);

    let mut probes: Vec<SnapshotProbe<Note>> = (0..4).map(|_| SnapshotProbe::new()).collect();
    for probe in &probes {
        poller.subscribe_to_changes(probe.callback());
    }

    poller.refresh().await.unwrap();
    poller.refresh().await.unwrap();
    for probe in &mut probes {
        assert_eq!(probe.next().await.unwrap().len(), 1);
        assert_eq!(probe.next().await.unwrap().len(), 1);
    }
}

#[test]
fn zero_interval_is_rejected() {
    let harness = Harness::new();
    let result = RemotePoller::<Note>::new(
        harness.gateway.clone(),
        PollerConfig::new().with_pull_interval(Duration::ZERO),
        harness.lifecycle_source(),
    );
    assert!(matches!(result, Err(SyncError::Config(_))));
}

#[test]
fn start_outside_runtime_fails() {
    let harness = Harness::new();
    let poller = poller(&harness, INTERVAL);
    assert!(matches!(poller.start(), Err(SyncError::NoRuntime)));
    assert!(!poller.is_running());
    assert_eq!(harness.gateway.change_subscriber_count(), 0);
}
