use futures::prelude::*;
use gateway_controller_core::{Reconcile, Report, Snapshot, SnapshotHash, Translate, WatchProxies};
use gateway_controller_syncer::{SyncError, Syncer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives a [`Syncer`] from a stream of snapshots.
///
/// Snapshots are synced one at a time, in order. A snapshot identical to the
/// last one synced is skipped, unless that sync failed to reconcile.
pub struct EventLoop<T, R, W, P> {
    syncer: Syncer<T, R, W, P>,
    cancel: CancellationToken,
    last_synced: Option<SnapshotHash>,
}

// === impl EventLoop ===

impl<T, R, W, P> EventLoop<T, R, W, P>
where
    T: Translate,
    R: Reconcile,
    W: WatchProxies,
    P: Report + Send + Sync + 'static,
{
    pub fn new(syncer: Syncer<T, R, W, P>) -> Self {
        Self {
            syncer,
            cancel: CancellationToken::new(),
            last_synced: None,
        }
    }

    /// Syncs snapshots until the stream ends or shutdown is signaled, then
    /// stops all status propagation.
    pub async fn run<S>(mut self, snapshots: S, drain: drain::Watch)
    where
        S: Stream<Item = Snapshot>,
    {
        tokio::pin!(snapshots);
        let shutdown = drain.signaled();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                handle = &mut shutdown => {
                    info!("Shutdown signaled");
                    handle.release_after(self.shutdown()).await;
                    return;
                }

                snapshot = snapshots.next() => match snapshot {
                    Some(snapshot) => self.sync(&snapshot).await,
                    None => {
                        info!("Snapshot stream ended");
                        self.shutdown().await;
                        return;
                    }
                },
            }
        }
    }

    async fn sync(&mut self, snapshot: &Snapshot) {
        let hash = snapshot.hash();
        if self.last_synced == Some(hash) {
            debug!(snapshot = %hash, "Snapshot unchanged");
            return;
        }

        match self.syncer.sync(&self.cancel, snapshot).await {
            Ok(()) => self.last_synced = Some(hash),
            // Retried when the same snapshot is seen again.
            Err(error @ SyncError::Reconcile(_)) => {
                self.last_synced = None;
                error!(snapshot = %hash, %error, "Sync failed");
            }
            Err(error @ SyncError::Rejected(_)) => {
                self.last_synced = Some(hash);
                debug!(snapshot = %hash, %error);
            }
            Err(error) => {
                self.last_synced = Some(hash);
                warn!(snapshot = %hash, %error, "Sync incomplete");
            }
        }
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.syncer.shutdown().await;
        debug!("Propagation stopped");
    }
}
