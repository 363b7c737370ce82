use super::*;
use crate::SyncError;
use gateway_controller_core::{owner_labels, owner_selector, OWNER_LABEL_KEY, OWNER_LABEL_VALUE};
use gateway_controller_memory::{ProxyStore, ResourceReport};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

#[tokio::test]
async fn rejects_invalid_snapshots_without_reconciling() {
    let store = ProxyStore::new();
    let mut deployed = Proxy::new(WRITE_NAMESPACE, "jerry-proxy");
    deployed.metadata.labels = owner_labels();
    let deployed = store.write(deployed);

    let reconciler = Recorded::new(store.clone());
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        reconciler.clone(),
        store.clone(),
        Arc::new(reporter),
    );

    // "tom" is bound to a gateway that does not exist.
    let mut snapshot = jerry_snapshot();
    snapshot
        .virtual_services
        .push(virtual_service("ns1", "tom", &[("ns1", "missing")]));

    let error = syncer
        .sync(&CancellationToken::new(), &snapshot)
        .await
        .expect_err("snapshot must be rejected");
    let invalid = error
        .validation()
        .expect("must be a validation error")
        .resources()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(invalid, vec![ResourceKey::virtual_service("ns1", "tom")]);

    assert!(reconciler.calls().is_empty());
    assert_eq!(store.get(WRITE_NAMESPACE, "jerry-proxy"), Some(deployed));
    assert!(syncer.propagations().is_empty());

    let write = next_write(&mut writes).await;
    assert!(write.statuses.is_empty());
    assert_eq!(
        write.errors,
        GatewayTranslator.translate(WRITE_NAMESPACE, &snapshot).errors
    );
    assert_no_write(&mut writes).await;
}

#[tokio::test]
async fn rejected_snapshots_survive_report_failures() {
    let store = ProxyStore::new();
    let reconciler = Recorded::new(store.clone());
    let (reporter, mut writes) = FlakyReporter::new(1);
    let mut syncer = syncer(
        GatewayTranslator,
        reconciler.clone(),
        store.clone(),
        Arc::new(reporter),
    );

    let mut snapshot = jerry_snapshot();
    snapshot.gateways[0].bind_port = 0;
    let error = syncer
        .sync(&CancellationToken::new(), &snapshot)
        .await
        .expect_err("snapshot must be rejected");
    assert!(matches!(error, SyncError::Rejected(_)), "{error}");

    assert!(reconciler.calls().is_empty());
    assert!(syncer.propagations().is_empty());
    assert!(store.list(WRITE_NAMESPACE, &owner_selector()).is_empty());
    assert_no_write(&mut writes).await;
}

#[tokio::test]
async fn cancelled_rejection_reports_do_not_block() {
    let (reporter, _started) = HangingReporter::new();
    let store = ProxyStore::new();
    let mut syncer = syncer(
        GatewayTranslator,
        store.clone(),
        store.clone(),
        Arc::new(reporter),
    );

    let mut snapshot = jerry_snapshot();
    snapshot.gateways[0].bind_port = 0;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let error = time::timeout(time::Duration::from_secs(1), syncer.sync(&cancel, &snapshot))
        .await
        .expect("sync must not wait on a cancelled write")
        .expect_err("snapshot must be rejected");
    assert!(matches!(error, SyncError::Rejected(_)), "{error}");
}

#[tokio::test]
async fn reconcile_failures_start_no_propagation() {
    let store = ProxyStore::new();
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        FailingReconciler,
        store.clone(),
        Arc::new(reporter),
    );

    let error = syncer
        .sync(&CancellationToken::new(), &jerry_snapshot())
        .await
        .expect_err("reconcile must fail");
    assert!(matches!(error, SyncError::Reconcile(_)), "{error}");
    assert!(error.validation().is_none());
    assert!(syncer.propagations().is_empty());
    assert_no_write(&mut writes).await;
}

#[tokio::test]
async fn propagates_proxy_status_to_virtual_service() {
    let store = ProxyStore::new();
    let reconciler = Recorded::new(store.clone());
    let (reporter, mut writes) = Reporter::new();
    let reporter = Arc::new(reporter);
    let mut syncer = syncer(
        GatewayTranslator,
        reconciler.clone(),
        store.clone(),
        reporter.clone(),
    );
    let cancel = CancellationToken::new();

    syncer
        .sync(&cancel, &jerry_snapshot())
        .await
        .expect("sync must succeed");

    let calls = reconciler.calls();
    assert_eq!(calls.len(), 1);
    let (namespace, desired) = &calls[0];
    assert_eq!(namespace, WRITE_NAMESPACE);
    assert_eq!(desired.len(), 1);
    assert_eq!(desired[0].metadata.name, "jerry-proxy");
    assert_eq!(
        desired[0].metadata.labels.get(OWNER_LABEL_KEY),
        Some(OWNER_LABEL_VALUE)
    );

    let proxy = proxy_key("jerry-proxy");
    let vs = ResourceKey::virtual_service("ns1", "jerry");

    let write = next_write(&mut writes).await;
    assert_eq!(write.statuses.get(&proxy), Some(&Status::pending()));
    assert!(write.errors.get(&vs).is_some_and(|errors| errors.is_empty()));

    store
        .set_status(WRITE_NAMESPACE, "jerry-proxy", Status::accepted())
        .expect("proxy must be deployed");
    let write = next_write(&mut writes).await;
    assert_eq!(write.statuses.get(&proxy), Some(&Status::accepted()));
    assert_no_write(&mut writes).await;

    assert_eq!(
        reporter.report(&vs),
        Some(ResourceReport {
            status: Status::accepted(),
            subresource_statuses: Some((proxy, Status::accepted())).into_iter().collect(),
        })
    );

    cancel.cancel();
    syncer.shutdown().await;
}

#[tokio::test]
async fn failed_watches_do_not_affect_other_proxies() {
    let store = ProxyStore::new();
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        store.clone(),
        FailNthWatch::new(store.clone(), 2),
        Arc::new(reporter),
    );

    let snapshot = Snapshot {
        gateways: vec![
            gateway("ns1", "a", 8080),
            gateway("ns1", "b", 8081),
            gateway("ns1", "c", 8082),
        ],
        virtual_services: vec![],
    };
    let error = syncer
        .sync(&CancellationToken::new(), &snapshot)
        .await
        .expect_err("one watch must fail");
    let failures = match error {
        SyncError::Watch(failures) => failures,
        error => panic!("expected a watch error: {error}"),
    };
    assert_eq!(
        failures.iter().map(|f| f.proxy.clone()).collect::<Vec<_>>(),
        vec![proxy_key("b-proxy")]
    );

    // The store was reconciled before any watch was started.
    for name in ["a-proxy", "b-proxy", "c-proxy"] {
        assert!(store.get(WRITE_NAMESPACE, name).is_some(), "{name}");
    }
    assert!(syncer.propagations().is_running(&proxy_key("a-proxy")));
    assert!(!syncer.propagations().contains(&proxy_key("b-proxy")));
    assert!(syncer.propagations().is_running(&proxy_key("c-proxy")));

    let mut reported = BTreeSet::new();
    for _ in 0..2 {
        let write = next_write(&mut writes).await;
        reported.extend(write.statuses.keys().cloned());
    }
    assert_eq!(
        reported,
        [proxy_key("a-proxy"), proxy_key("c-proxy")]
            .into_iter()
            .collect()
    );
    assert_no_write(&mut writes).await;

    syncer.shutdown().await;
}

#[tokio::test]
async fn cancellation_stops_reporting() {
    let store = ProxyStore::new();
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        store.clone(),
        store.clone(),
        Arc::new(reporter),
    );
    let cancel = CancellationToken::new();

    syncer
        .sync(&cancel, &jerry_snapshot())
        .await
        .expect("sync must succeed");
    next_write(&mut writes).await;

    cancel.cancel();
    until_stopped(&syncer, &proxy_key("jerry-proxy")).await;

    store
        .set_status(WRITE_NAMESPACE, "jerry-proxy", Status::accepted())
        .expect("proxy must be deployed");
    assert_no_write(&mut writes).await;
}

#[tokio::test]
async fn resyncing_a_snapshot_changes_nothing() {
    let store = ProxyStore::new();
    let reconciler = Recorded::new(store.clone());
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        reconciler.clone(),
        store.clone(),
        Arc::new(reporter),
    );
    let cancel = CancellationToken::new();

    syncer
        .sync(&cancel, &jerry_snapshot())
        .await
        .expect("sync must succeed");
    next_write(&mut writes).await;
    let deployed = store.list(WRITE_NAMESPACE, &owner_selector());

    syncer
        .sync(&cancel, &jerry_snapshot())
        .await
        .expect("sync must succeed");
    assert_eq!(store.list(WRITE_NAMESPACE, &owner_selector()), deployed);

    let calls = reconciler.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);

    // The replacement task reports the current status once.
    assert_eq!(syncer.propagations().len(), 1);
    let write = next_write(&mut writes).await;
    assert_eq!(
        write.statuses.get(&proxy_key("jerry-proxy")),
        Some(&Status::pending())
    );
    assert_no_write(&mut writes).await;

    syncer.shutdown().await;
}

#[tokio::test]
async fn removed_proxies_stop_propagating() {
    let store = ProxyStore::new();
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        store.clone(),
        store.clone(),
        Arc::new(reporter),
    );
    let cancel = CancellationToken::new();

    let mut snapshot = jerry_snapshot();
    snapshot.gateways.push(gateway("ns1", "tom", 8081));
    syncer
        .sync(&cancel, &snapshot)
        .await
        .expect("sync must succeed");
    next_write(&mut writes).await;
    next_write(&mut writes).await;
    assert_eq!(syncer.propagations().len(), 2);

    syncer
        .sync(&cancel, &jerry_snapshot())
        .await
        .expect("sync must succeed");
    assert_eq!(store.get(WRITE_NAMESPACE, "tom-proxy"), None);
    assert_eq!(syncer.propagations().len(), 1);
    assert!(!syncer.propagations().contains(&proxy_key("tom-proxy")));

    let write = next_write(&mut writes).await;
    assert_eq!(
        write.statuses.keys().cloned().collect::<Vec<_>>(),
        vec![proxy_key("jerry-proxy")]
    );
    assert_no_write(&mut writes).await;

    syncer.shutdown().await;
    assert!(syncer.propagations().is_empty());
}

#[tokio::test]
async fn unowned_proxies_are_untouched() {
    let store = ProxyStore::new();
    let manual = store.write(Proxy::new(WRITE_NAMESPACE, "manual"));
    let (reporter, _writes) = Reporter::new();
    let mut syncer = syncer(
        GatewayTranslator,
        store.clone(),
        store.clone(),
        Arc::new(reporter),
    );

    syncer
        .sync(&CancellationToken::new(), &jerry_snapshot())
        .await
        .expect("sync must succeed");
    syncer
        .sync(&CancellationToken::new(), &Snapshot::default())
        .await
        .expect("sync must succeed");

    assert_eq!(store.get(WRITE_NAMESPACE, "manual"), Some(manual));
    assert_eq!(store.get(WRITE_NAMESPACE, "jerry-proxy"), None);
    assert!(syncer.propagations().is_empty());
}

#[tokio::test]
async fn records_sync_metrics() {
    let mut registry = Registry::default();
    let store = ProxyStore::new();
    let (reporter, mut writes) = Reporter::new();
    let mut syncer = Syncer::new(
        WRITE_NAMESPACE,
        GatewayTranslator,
        store.clone(),
        store.clone(),
        Arc::new(reporter),
        SyncMetrics::register(&mut registry),
    );
    let cancel = CancellationToken::new();

    syncer
        .sync(&cancel, &jerry_snapshot())
        .await
        .expect("sync must succeed");
    next_write(&mut writes).await;

    let mut invalid = jerry_snapshot();
    invalid.gateways[0].bind_port = 0;
    syncer
        .sync(&cancel, &invalid)
        .await
        .expect_err("snapshot must be rejected");

    let mut text = String::new();
    prometheus_client::encoding::text::encode(&mut text, &registry)
        .expect("metrics must encode");
    for line in [
        "syncs_total{result=\"ok\"} 1",
        "syncs_total{result=\"rejected\"} 1",
        "reports_total{result=\"ok\"} 1",
        "propagations 1",
    ] {
        assert!(text.contains(line), "missing {line:?} in:\n{text}");
    }

    syncer.shutdown().await;
}
