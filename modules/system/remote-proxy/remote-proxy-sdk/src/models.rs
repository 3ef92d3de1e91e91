use serde::{Deserialize, Serialize};

/// Registry property: `true` on every proxy published for a remote service.
pub const SERVICE_IMPORTED: &str = "service.imported";

/// Registry property: the name the remote object is looked up under.
pub const REMOTE_NAME: &str = "remote_proxy.remote_name";

/// Registry property: symbolic name of the module that declared the service.
pub const SOURCE_MODULE: &str = "remote_proxy.module";

/// Interface name the [`crate::ProxyFlusher`] capability is published under.
pub const PROXY_FLUSHER_INTERFACE: &str = "remote_proxy_sdk::ProxyFlusher";

/// A single call forwarded through a proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub method: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Invocation {
    pub fn new(method: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}
