use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use anyhow::{bail, ensure, Result};
use gateway_controller_core::{
    Proxy, Reconcile, Selector, Status, Subscription, Transition, WatchProxies,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

// Lists are sent whole, so a slow subscriber only ever needs the latest few.
const WATCH_BUFFER: usize = 16;

/// Stores proxies by namespace and name.
///
/// Every write assigns the proxy a new resource version and notifies all
/// watches.
#[derive(Clone, Debug)]
pub struct ProxyStore {
    index: Arc<RwLock<Index>>,
    changes: Arc<watch::Sender<u64>>,
}

#[derive(Debug, Default)]
struct Index {
    namespaces: HashMap<String, HashMap<String, Proxy>>,
    version: u64,
}

// === impl ProxyStore ===

impl Default for ProxyStore {
    fn default() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            index: Default::default(),
            changes: Arc::new(changes),
        }
    }
}

impl ProxyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Proxy> {
        self.index.read().get(namespace, name).cloned()
    }

    /// Lists the proxies in `namespace` that match `selector`, ordered by name.
    pub fn list(&self, namespace: &str, selector: &Selector) -> Vec<Proxy> {
        self.index.read().list(namespace, selector)
    }

    /// Creates or replaces a proxy, returning it as stored.
    pub fn write(&self, proxy: Proxy) -> Proxy {
        let proxy = self.index.write().write(proxy);
        self.notify();
        proxy
    }

    pub fn delete(&self, namespace: &str, name: &str) -> Option<Proxy> {
        let proxy = self.index.write().delete(namespace, name);
        if proxy.is_some() {
            self.notify();
        }
        proxy
    }

    /// Records the data plane's view of a proxy.
    pub fn set_status(&self, namespace: &str, name: &str, status: Status) -> Result<Proxy> {
        let proxy = {
            let mut index = self.index.write();
            let Some(mut proxy) = index.get(namespace, name).cloned() else {
                bail!("proxy {namespace}.{name} not found");
            };
            proxy.status = status;
            index.write(proxy)
        };
        self.notify();
        Ok(proxy)
    }

    fn notify(&self) {
        let version = self.index.read().version;
        self.changes.send_replace(version);
    }

    /// Validates the whole desired set before writing any of it, returning
    /// the number of proxies changed.
    fn apply(
        &self,
        namespace: &str,
        desired: Vec<Proxy>,
        transition: Transition,
        selector: &Selector,
    ) -> Result<usize> {
        let mut index = self.index.write();
        let owned = index
            .list(namespace, selector)
            .into_iter()
            .map(|p| (p.metadata.name.clone(), p))
            .collect::<HashMap<_, _>>();

        let mut names = HashSet::default();
        let mut writes = Vec::with_capacity(desired.len());
        for mut proxy in desired {
            if proxy.metadata.namespace.is_empty() {
                proxy.metadata.namespace = namespace.to_string();
            }
            let id = proxy.metadata.id();
            ensure!(
                id.namespace == namespace,
                "proxy {id} is not in namespace {namespace}"
            );
            ensure!(
                selector.matches(&proxy.metadata.labels),
                "proxy {id} does not match the reconcile selector"
            );
            ensure!(
                names.insert(id.name.clone()),
                "proxy {id} is desired more than once"
            );

            match owned.get(&id.name) {
                Some(current) => {
                    let next = transition(current, proxy);
                    if next != *current {
                        writes.push(next);
                    }
                }
                None => {
                    ensure!(
                        index.get(namespace, &id.name).is_none(),
                        "proxy {id} already exists and is not owned"
                    );
                    writes.push(proxy);
                }
            }
        }

        let deletes = owned
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| !names.contains(name))
            .collect::<Vec<_>>();

        let changes = writes.len() + deletes.len();
        for proxy in writes {
            index.write(proxy);
        }
        for name in deletes {
            index.delete(namespace, &name);
        }
        Ok(changes)
    }
}

#[async_trait::async_trait]
impl Reconcile for ProxyStore {
    async fn reconcile(
        &self,
        namespace: &str,
        desired: Vec<Proxy>,
        transition: Transition,
        selector: &Selector,
    ) -> Result<()> {
        let changes = self.apply(namespace, desired, transition, selector)?;
        debug!(%namespace, changes, "Reconciled proxies");
        if changes > 0 {
            self.notify();
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl WatchProxies for ProxyStore {
    async fn watch(
        &self,
        namespace: &str,
        selector: &Selector,
        cancel: CancellationToken,
    ) -> Result<Subscription> {
        ensure!(!namespace.is_empty(), "a watch requires a namespace");

        let (proxies_tx, proxies_rx) = mpsc::channel(WATCH_BUFFER);
        // The store never fails once a watch is established, but the error
        // stream must stay open for as long as the watch runs.
        let (errors_tx, errors_rx) = mpsc::channel::<anyhow::Error>(1);

        let mut changes = self.changes.subscribe();
        changes.borrow_and_update();
        let store = self.clone();
        let namespace = namespace.to_string();
        let selector = selector.clone();
        let span = info_span!("watch", %namespace);
        tokio::spawn(
            async move {
                let _errors_tx = errors_tx;
                loop {
                    let proxies = store.list(&namespace, &selector);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        res = proxies_tx.send(proxies) => if res.is_err() {
                            break;
                        },
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = proxies_tx.closed() => break,
                        res = changes.changed() => if res.is_err() {
                            break;
                        },
                    }
                }
                debug!("Watch ended");
            }
            .instrument(span),
        );

        Ok(Subscription {
            proxies: Box::pin(ReceiverStream::new(proxies_rx)),
            errors: Box::pin(ReceiverStream::new(errors_rx)),
        })
    }
}

// === impl Index ===

impl Index {
    fn get(&self, namespace: &str, name: &str) -> Option<&Proxy> {
        self.namespaces.get(namespace)?.get(name)
    }

    fn list(&self, namespace: &str, selector: &Selector) -> Vec<Proxy> {
        let mut proxies = self
            .namespaces
            .get(namespace)
            .into_iter()
            .flat_map(|proxies| proxies.values())
            .filter(|p| selector.matches(&p.metadata.labels))
            .cloned()
            .collect::<Vec<_>>();
        proxies.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        proxies
    }

    fn write(&mut self, mut proxy: Proxy) -> Proxy {
        self.version += 1;
        proxy.metadata.resource_version = Some(self.version);
        self.namespaces
            .entry(proxy.metadata.namespace.clone())
            .or_default()
            .insert(proxy.metadata.name.clone(), proxy.clone());
        proxy
    }

    fn delete(&mut self, namespace: &str, name: &str) -> Option<Proxy> {
        let proxies = self.namespaces.get_mut(namespace)?;
        let proxy = proxies.remove(name);
        if proxies.is_empty() {
            self.namespaces.remove(namespace);
        }
        if proxy.is_some() {
            self.version += 1;
        }
        proxy
    }
}
