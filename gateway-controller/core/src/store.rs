use crate::{labels::Selector, proxy::Proxy};
use anyhow::Result;
use futures::prelude::*;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Merges a desired proxy into the stored one, returning the proxy to write.
pub type Transition = fn(&Proxy, Proxy) -> Proxy;

pub type ProxyListStream = Pin<Box<dyn Stream<Item = Vec<Proxy>> + Send + 'static>>;

pub type WatchErrorStream = Pin<Box<dyn Stream<Item = anyhow::Error> + Send + 'static>>;

/// A live view of the proxies matching a watch.
///
/// Each item on `proxies` is the full list of matching proxies after a
/// change. Both streams end when the watch is cancelled.
pub struct Subscription {
    pub proxies: ProxyListStream,
    pub errors: WatchErrorStream,
}

/// Makes the stored proxies that match `selector` in `namespace` equal to
/// `desired`. Proxies that do not match the selector are never modified.
#[async_trait::async_trait]
pub trait Reconcile {
    async fn reconcile(
        &self,
        namespace: &str,
        desired: Vec<Proxy>,
        transition: Transition,
        selector: &Selector,
    ) -> Result<()>;
}

#[async_trait::async_trait]
pub trait WatchProxies {
    /// Fails if the watch cannot be established.
    async fn watch(
        &self,
        namespace: &str,
        selector: &Selector,
        cancel: CancellationToken,
    ) -> Result<Subscription>;
}
