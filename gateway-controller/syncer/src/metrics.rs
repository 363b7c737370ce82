use crate::SyncError;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        gauge::Gauge,
        histogram::{exponential_buckets, Histogram},
    },
    registry::{Registry, Unit},
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct SyncMetrics {
    syncs: Family<ResultLabels, Counter>,
    sync_duration: Histogram,
    reports: Family<ResultLabels, Counter>,
    propagations: Gauge,
}

/// Decrements the running propagations gauge when dropped.
#[derive(Debug)]
pub(crate) struct PropagationGuard(Gauge);

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: &'static str,
}

// === impl SyncMetrics ===

impl SyncMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let syncs = Family::<ResultLabels, Counter>::default();
        reg.register("syncs", "Count of snapshot syncs by result", syncs.clone());

        // Syncs are dominated by the reconcile call, which ranges from
        // in-memory writes to store round trips.
        let sync_duration = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        reg.register_with_unit(
            "sync_duration",
            "Histogram of the time taken to sync a snapshot",
            Unit::Seconds,
            sync_duration.clone(),
        );

        let reports = Family::<ResultLabels, Counter>::default();
        reg.register(
            "reports",
            "Count of status reports written by propagation tasks",
            reports.clone(),
        );

        let propagations = Gauge::default();
        reg.register(
            "propagations",
            "Number of running status propagation tasks",
            propagations.clone(),
        );

        Self {
            syncs,
            sync_duration,
            reports,
            propagations,
        }
    }

    pub(crate) fn sync_finished(&self, res: &Result<(), SyncError>, start: time::Instant) {
        let result = match res {
            Ok(()) => "ok",
            Err(error) => error.as_label(),
        };
        self.syncs.get_or_create(&ResultLabels { result }).inc();
        self.sync_duration.observe(start.elapsed().as_secs_f64());
    }

    pub(crate) fn report_written(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.reports.get_or_create(&ResultLabels { result }).inc();
    }

    pub(crate) fn propagation_started(&self) -> PropagationGuard {
        self.propagations.inc();
        PropagationGuard(self.propagations.clone())
    }
}

impl Drop for PropagationGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}
