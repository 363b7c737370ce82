use crate::{
    resource::{Kind, Metadata, Resource},
    status::Status,
};
use serde::{Deserialize, Serialize};

/// Proxy configuration produced by translation and applied to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    pub metadata: Metadata,
    #[serde(default)]
    pub listeners: Vec<Listener>,

    /// Written by the data plane once it has processed the proxy.
    #[serde(default)]
    pub status: Status,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub name: String,
    pub bind_address: String,
    pub bind_port: u16,
    #[serde(default)]
    pub virtual_hosts: Vec<String>,
}

impl Proxy {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            metadata: Metadata::new(namespace, name),
            ..Default::default()
        }
    }
}

impl Resource for Proxy {
    const KIND: Kind = Kind::Proxy;

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
