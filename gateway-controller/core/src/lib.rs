#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
mod proxy;
mod report;
mod resource;
mod snapshot;
mod status;
mod store;
mod translate;

pub use self::{
    labels::{Labels, Selector},
    proxy::{Listener, Proxy},
    report::{Report, ResourceErrors, Statuses, ValidationError},
    resource::{Kind, Metadata, Resource, ResourceId, ResourceKey},
    snapshot::{Gateway, Snapshot, SnapshotHash, VirtualService},
    status::{State, Status},
    store::{ProxyListStream, Reconcile, Subscription, Transition, WatchErrorStream, WatchProxies},
    translate::{DesiredProxy, Translate, Translation},
};

/// Marks the proxies owned by the gateway controller.
pub const OWNER_LABEL_KEY: &str = "created_by";
pub const OWNER_LABEL_VALUE: &str = "gateway";

pub fn owner_labels() -> Labels {
    Some((OWNER_LABEL_KEY, OWNER_LABEL_VALUE)).into_iter().collect()
}

pub fn owner_selector() -> Selector {
    Some((OWNER_LABEL_KEY, OWNER_LABEL_VALUE)).into_iter().collect()
}
