use ahash::AHashMap as HashMap;
use anyhow::Result;
use gateway_controller_core::{Report, ResourceErrors, ResourceKey, Statuses, Status};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// The arguments of one `write_reports` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenReport {
    pub errors: ResourceErrors,
    pub statuses: Statuses,
}

/// The report persisted onto a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceReport {
    pub status: Status,

    /// The latest status of each proxy produced by the resource.
    pub subresource_statuses: BTreeMap<ResourceKey, Status>,
}

/// Keeps the latest report of every resource and publishes each write, in
/// order, on a channel.
#[derive(Debug)]
pub struct Reporter {
    reports: RwLock<HashMap<ResourceKey, ResourceReport>>,
    writes: mpsc::UnboundedSender<WrittenReport>,
}

impl Reporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WrittenReport>) {
        let (writes, rx) = mpsc::unbounded_channel();
        let reporter = Self {
            reports: Default::default(),
            writes,
        };
        (reporter, rx)
    }

    pub fn report(&self, resource: &ResourceKey) -> Option<ResourceReport> {
        self.reports.read().get(resource).cloned()
    }
}

#[async_trait::async_trait]
impl Report for Reporter {
    async fn write_reports(&self, errors: &ResourceErrors, statuses: &Statuses) -> Result<()> {
        {
            let mut reports = self.reports.write();
            for (resource, errs) in errors.iter() {
                let report = reports.entry(resource.clone()).or_default();
                report.status = if errs.is_empty() {
                    Status::accepted()
                } else {
                    Status::rejected(errs.join("\n"))
                };
                // Each propagation reports only its own proxy, so statuses are
                // merged rather than replaced.
                report.subresource_statuses.extend(
                    statuses
                        .iter()
                        .map(|(proxy, status)| (proxy.clone(), status.clone())),
                );
            }
        }

        let write = WrittenReport {
            errors: errors.clone(),
            statuses: statuses.clone(),
        };
        if self.writes.send(write).is_err() {
            tracing::trace!("Report receiver dropped");
        }
        Ok(())
    }
}
