use crate::{
    metrics::SyncMetrics,
    propagate::{self, Propagations},
    SyncError, WatchErrors,
};
use ahash::AHashSet as HashSet;
use gateway_controller_core::{
    owner_labels, owner_selector, DesiredProxy, Proxy, Reconcile, Report, Resource,
    ResourceErrors, Snapshot, Statuses, Translate, Translation, WatchProxies,
};
use std::sync::Arc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Applies snapshots to the proxy store and propagates the resulting proxy
/// statuses back to the resources that produced them.
///
/// Syncs are triggered only by new snapshots: a proxy that changes in the
/// store without a new snapshot is not re-synced.
pub struct Syncer<T, R, W, P> {
    write_namespace: String,
    translator: T,
    reconciler: R,
    watches: W,
    reporter: Arc<P>,
    propagations: Propagations,
    metrics: SyncMetrics,
}

/// Preserves the store-managed fields of the existing proxy.
pub fn transition(existing: &Proxy, mut desired: Proxy) -> Proxy {
    desired.metadata.resource_version = existing.metadata.resource_version;
    desired.status = existing.status.clone();
    desired
}

// === impl Syncer ===

impl<T, R, W, P> Syncer<T, R, W, P>
where
    T: Translate,
    R: Reconcile,
    W: WatchProxies,
    P: Report + Send + Sync + 'static,
{
    pub fn new(
        write_namespace: impl ToString,
        translator: T,
        reconciler: R,
        watches: W,
        reporter: Arc<P>,
        metrics: SyncMetrics,
    ) -> Self {
        Self {
            write_namespace: write_namespace.to_string(),
            translator,
            reconciler,
            watches,
            reporter,
            propagations: Propagations::default(),
            metrics,
        }
    }

    pub fn propagations(&self) -> &Propagations {
        &self.propagations
    }

    /// Translates and applies a snapshot, then starts propagating the status
    /// of every resulting proxy.
    ///
    /// Invalid snapshots are reported and never applied. Propagation runs in
    /// the background until `cancel` fires or a later sync replaces it; this
    /// returns as soon as all propagations have started.
    pub async fn sync(
        &mut self,
        cancel: &CancellationToken,
        snapshot: &Snapshot,
    ) -> Result<(), SyncError> {
        let span = info_span!("sync", snapshot = %snapshot.hash());
        async move {
            let start = time::Instant::now();
            info!(
                virtual_services = snapshot.virtual_services.len(),
                gateways = snapshot.gateways.len(),
                "Begin sync"
            );
            debug!(?snapshot);

            let res = self.apply(cancel, snapshot).await;

            self.metrics.sync_finished(&res, start);
            info!("End sync");
            res
        }
        .instrument(span)
        .await
    }

    /// Stops all status propagation.
    pub async fn shutdown(&mut self) {
        self.propagations.shutdown().await;
    }

    async fn apply(
        &mut self,
        cancel: &CancellationToken,
        snapshot: &Snapshot,
    ) -> Result<(), SyncError> {
        let Translation { proxies, errors } =
            self.translator.translate(&self.write_namespace, snapshot);
        if let Err(error) = errors.validate() {
            let statuses = Statuses::default();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!("Cancelled while reporting"),
                res = self.reporter.write_reports(&errors, &statuses) => {
                    if let Err(error) = res {
                        error!(%error, "Failed to write reports");
                    }
                }
            }
            warn!(%error, "Snapshot rejected due to invalid config; proxies will not be updated");
            return Err(error.into());
        }

        let labels = owner_labels();
        let proxies = proxies
            .into_iter()
            .map(|DesiredProxy { mut proxy, errors }| {
                info!(proxy = %proxy.id(), "Reconciling proxy");
                proxy.metadata.labels = labels.clone();
                DesiredProxy { proxy, errors }
            })
            .collect::<Vec<_>>();

        let desired = proxies.iter().map(|p| p.proxy.clone()).collect();
        self.reconciler
            .reconcile(
                &self.write_namespace,
                desired,
                transition,
                &owner_selector(),
            )
            .await
            .map_err(SyncError::Reconcile)?;

        self.propagate(cancel, proxies).await
    }

    /// Replaces the propagation task of every desired proxy and stops those
    /// of proxies that are no longer desired.
    async fn propagate(
        &mut self,
        cancel: &CancellationToken,
        proxies: Vec<DesiredProxy>,
    ) -> Result<(), SyncError> {
        let keys = proxies
            .iter()
            .map(|p| p.proxy.key())
            .collect::<HashSet<_>>();
        self.propagations.retain(&keys).await;

        let mut failures = WatchErrors::default();
        for DesiredProxy { proxy, errors } in proxies {
            let key = proxy.key();
            self.propagations.stop(&key).await;

            match self.start(cancel, &proxy, errors).await {
                Ok(handle) => self.propagations.insert(key, handle),
                Err(error) => {
                    warn!(%error, "Failed to propagate proxy status");
                    failures.push(error);
                }
            }
        }

        failures.into_result().map_err(Into::into)
    }

    async fn start(
        &self,
        cancel: &CancellationToken,
        proxy: &Proxy,
        errors: ResourceErrors,
    ) -> Result<propagate::Handle, crate::WatchSetupError> {
        propagate::start(
            &self.watches,
            proxy,
            errors,
            self.reporter.clone(),
            self.metrics.clone(),
            cancel.child_token(),
        )
        .await
    }
}
