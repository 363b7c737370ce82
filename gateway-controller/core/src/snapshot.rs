use crate::resource::{Kind, Metadata, Resource, ResourceId};
use serde::{Deserialize, Serialize};
use std::{
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{Hash, Hasher},
};

/// An immutable view of the routing configuration consumed by translation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    #[serde(default)]
    pub virtual_services: Vec<VirtualService>,
}

/// Identifies a snapshot by its content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotHash(u64);

/// A listener definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub metadata: Metadata,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub bind_port: u16,
}

/// A routing intent: a set of domains served through one or more gateways.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    pub metadata: Metadata,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub gateways: Vec<ResourceId>,
}

fn default_bind_address() -> String {
    "::".to_string()
}

// === impl Snapshot ===

impl Snapshot {
    /// Hashes the snapshot's content. Equal snapshots always hash equally.
    pub fn hash(&self) -> SnapshotHash {
        let mut hasher = DefaultHasher::new();
        Hash::hash(self, &mut hasher);
        SnapshotHash(hasher.finish())
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty() && self.virtual_services.is_empty()
    }
}

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// === impl Gateway ===

impl Resource for Gateway {
    const KIND: Kind = Kind::Gateway;

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

// === impl VirtualService ===

impl Resource for VirtualService {
    const KIND: Kind = Kind::VirtualService;

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
