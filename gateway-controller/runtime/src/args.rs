use crate::{LogFilter, LogFormat};
use anyhow::Result;
use clap::Parser;
use gateway_controller_core::{Reconcile, Report, Translate, WatchProxies};
use gateway_controller_syncer::{SyncMetrics, Syncer};
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Parser)]
#[clap(name = "gateway", about = "A gateway proxy controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway=info,warn",
        env = "GATEWAY_CONTROLLER_LOG"
    )]
    pub log_level: LogFilter,

    #[clap(long, default_value = "plain")]
    pub log_format: LogFormat,

    /// The namespace that proxies are written to and watched in.
    #[clap(
        long,
        default_value = "gateway-system",
        env = "GATEWAY_CONTROLLER_WRITE_NAMESPACE"
    )]
    pub write_namespace: String,
}

impl Args {
    pub fn init_log(&self) -> Result<()> {
        self.log_format.try_init(&self.log_level)
    }

    /// Builds a syncer for the configured namespace, registering its metrics
    /// under the `gateway_sync` prefix.
    pub fn syncer<T, R, W, P>(
        &self,
        translator: T,
        reconciler: R,
        watches: W,
        reporter: Arc<P>,
        prom: &mut Registry,
    ) -> Syncer<T, R, W, P>
    where
        T: Translate,
        R: Reconcile,
        W: WatchProxies,
        P: Report + Send + Sync + 'static,
    {
        let metrics = SyncMetrics::register(prom.sub_registry_with_prefix("gateway_sync"));
        Syncer::new(
            &self.write_namespace,
            translator,
            reconciler,
            watches,
            reporter,
            metrics,
        )
    }
}
