use crate::labels::Labels;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Kind {
    Gateway,
    VirtualService,
    Proxy,
}

/// Identifies a resource of any kind, e.g. the target of a report.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: Kind,
    pub id: ResourceId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    /// Set by the store on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<u64>,
}

pub trait Resource {
    const KIND: Kind;

    fn metadata(&self) -> &Metadata;

    fn id(&self) -> ResourceId {
        self.metadata().id()
    }

    fn key(&self) -> ResourceKey {
        ResourceKey::new(Self::KIND, self.id())
    }
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

// === impl Kind ===

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::VirtualService => "virtualservice",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl ResourceKey ===

impl ResourceKey {
    pub fn new(kind: Kind, id: ResourceId) -> Self {
        Self { kind, id }
    }

    pub fn gateway(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(Kind::Gateway, ResourceId::new(namespace, name))
    }

    pub fn virtual_service(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(Kind::VirtualService, ResourceId::new(namespace, name))
    }

    pub fn proxy(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(Kind::Proxy, ResourceId::new(namespace, name))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.id.namespace, self.id.name)
    }
}

// === impl Metadata ===

impl Metadata {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.namespace, &self.name)
    }
}
