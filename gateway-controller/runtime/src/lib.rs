#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod event_loop;
mod log;

pub use self::{
    args::Args,
    event_loop::EventLoop,
    log::{LogFilter, LogFormat},
};
pub use gateway_controller_syncer::{SyncError, SyncMetrics, Syncer};
