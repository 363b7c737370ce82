use crate::{proxy::Proxy, report::ResourceErrors, snapshot::Snapshot};

/// A proxy paired with the errors of the configuration that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredProxy {
    pub proxy: Proxy,
    pub errors: ResourceErrors,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Translation {
    pub proxies: Vec<DesiredProxy>,

    /// Errors for every resource in the snapshot.
    pub errors: ResourceErrors,
}

/// Maps a snapshot to the proxies that should be deployed in `namespace`.
///
/// Must be deterministic: the same snapshot always yields the same proxies.
pub trait Translate {
    fn translate(&self, namespace: &str, snapshot: &Snapshot) -> Translation;
}
