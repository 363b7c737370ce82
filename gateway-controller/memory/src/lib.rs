#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! An in-memory proxy store and report sink.

mod report;
mod store;

pub use self::{
    report::{ResourceReport, Reporter, WrittenReport},
    store::ProxyStore,
};
