use crate::{metrics::SyncMetrics, WatchSetupError};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use futures::prelude::*;
use gateway_controller_core::{
    owner_selector, Proxy, Report, Resource, ResourceErrors, ResourceId, ResourceKey, Statuses,
    Status, Subscription, WatchProxies,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument};

/// Tracks the status propagation task of each proxy.
///
/// At most one task runs per proxy: a new task for a proxy replaces the
/// previous one only after it has stopped.
#[derive(Debug, Default)]
pub struct Propagations {
    tasks: HashMap<ResourceKey, Handle>,
}

#[derive(Debug)]
pub(crate) struct Handle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Watches a proxy's status and writes a report each time it changes.
struct Propagate<P> {
    proxy: ResourceKey,
    errors: ResourceErrors,
    reporter: Arc<P>,
    metrics: SyncMetrics,
}

// === impl Propagations ===

impl Propagations {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, proxy: &ResourceKey) -> bool {
        self.tasks.contains_key(proxy)
    }

    /// Returns true if the proxy's task is still running.
    pub fn is_running(&self, proxy: &ResourceKey) -> bool {
        self.tasks
            .get(proxy)
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }

    pub(crate) fn insert(&mut self, proxy: ResourceKey, handle: Handle) {
        debug_assert!(!self.tasks.contains_key(&proxy));
        self.tasks.insert(proxy, handle);
    }

    /// Stops the proxy's task, if any, and waits for it to complete.
    pub(crate) async fn stop(&mut self, proxy: &ResourceKey) {
        if let Some(handle) = self.tasks.remove(proxy) {
            handle.stop().await;
        }
    }

    /// Stops the tasks of all proxies not in `keep`.
    pub(crate) async fn retain(&mut self, keep: &HashSet<ResourceKey>) {
        let stale = self
            .tasks
            .keys()
            .filter(|proxy| !keep.contains(*proxy))
            .cloned()
            .collect::<Vec<_>>();
        for proxy in stale {
            debug!(%proxy, "Stopping propagation for removed proxy");
            self.stop(&proxy).await;
        }
    }

    /// Stops all tasks.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.stop().await;
        }
    }
}

// === impl Handle ===

impl Handle {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            if error.is_panic() {
                error!(%error, "Propagation task panicked");
            }
        }
    }
}

/// Subscribes to the proxy's status and spawns a task that reports each
/// change until `cancel` fires or the subscription ends.
///
/// Only the subscription can fail; it is never retried.
pub(crate) async fn start<W, P>(
    watches: &W,
    proxy: &Proxy,
    errors: ResourceErrors,
    reporter: Arc<P>,
    metrics: SyncMetrics,
    cancel: CancellationToken,
) -> Result<Handle, WatchSetupError>
where
    W: WatchProxies,
    P: Report + Send + Sync + 'static,
{
    let key = proxy.key();
    let subscription = watches
        .watch(&proxy.metadata.namespace, &owner_selector(), cancel.clone())
        .await
        .map_err(|error| WatchSetupError::new(key.clone(), error))?;

    let span = info_span!("propagate", proxy = %key);
    let propagate = Propagate {
        proxy: key,
        errors,
        reporter,
        metrics,
    };
    let task = tokio::spawn(
        propagate
            .run(subscription, cancel.clone())
            .instrument(span),
    );
    Ok(Handle { cancel, task })
}

// === impl Propagate ===

impl<P: Report + Send + Sync + 'static> Propagate<P> {
    async fn run(self, subscription: Subscription, cancel: CancellationToken) {
        let _running = self.metrics.propagation_started();
        let Subscription {
            mut proxies,
            errors: mut watch_errors,
        } = subscription;

        // Unset until the first status is observed, so that it is always
        // reported.
        let mut last_reported = None::<Status>;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Cancelled");
                    return;
                }

                list = proxies.next() => {
                    let Some(list) = list else {
                        debug!("Watch closed");
                        return;
                    };
                    let Some(status) = self.find_status(list) else {
                        debug!("Proxy not found");
                        continue;
                    };
                    if last_reported.as_ref() == Some(&status) {
                        continue;
                    }
                    last_reported = Some(status.clone());

                    // A write in flight must not delay cancellation.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!("Cancelled while reporting");
                            return;
                        }
                        _ = self.report(status) => {}
                    }
                }

                error = watch_errors.next() => match error {
                    Some(error) => warn!(%error, "Proxy watch failed"),
                    None => {
                        debug!("Watch errors closed");
                        return;
                    }
                },
            }
        }
    }

    fn find_status(&self, list: Vec<Proxy>) -> Option<Status> {
        let ResourceId { namespace, name } = &self.proxy.id;
        list.into_iter()
            .find(|p| p.metadata.namespace == *namespace && p.metadata.name == *name)
            .map(|p| p.status)
    }

    async fn report(&self, status: Status) {
        debug!(state = %status.state, "Proxy status changed");
        let statuses = Some((self.proxy.clone(), status))
            .into_iter()
            .collect::<Statuses>();
        match self.reporter.write_reports(&self.errors, &statuses).await {
            Ok(()) => self.metrics.report_written(true),
            Err(error) => {
                self.metrics.report_written(false);
                error!(%error, "Failed to update dependent statuses");
            }
        }
    }
}
