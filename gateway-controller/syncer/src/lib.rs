#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod error;
mod metrics;
mod propagate;
mod syncer;


pub use self::{
    error::{SyncError, WatchErrors, WatchSetupError},
    metrics::SyncMetrics,
    propagate::Propagations,
    syncer::{transition, Syncer},
};
