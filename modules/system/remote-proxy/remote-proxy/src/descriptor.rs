//! Service declarations and the resources they are read from.
//!
//! A module declares remote services in descriptor resources placed under the location named
//! by its descriptor header (or the default location). Each resource lists
//! `(interface, remote_name)` pairs:
//!
//! ```json
//! { "services": [ { "interface": "com.acme.OrderService", "remote_name": "ejb:orders/OrderBean" } ] }
//! ```

use modkit_host::{Module, ResourceHandle};
use serde::Deserialize;

use crate::config::RemoteProxyConfig;
use crate::error::DescriptorError;

/// One remote service a module wants published locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeclaration {
    pub interface_name: String,
    pub remote_name: String,
}

impl ServiceDeclaration {
    pub fn new(interface_name: impl Into<String>, remote_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            remote_name: remote_name.into(),
        }
    }
}

/// Turns one descriptor resource into declarations.
pub trait DescriptorParser: Send + Sync {
    /// # Errors
    /// Returns `DescriptorError` if the resource cannot be used; callers skip it.
    fn parse(&self, resource: &ResourceHandle) -> Result<Vec<ServiceDeclaration>, DescriptorError>;
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorDoc {
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceEntry {
    interface: String,
    remote_name: String,
}

/// Parser for JSON descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDescriptorParser;

impl DescriptorParser for JsonDescriptorParser {
    fn parse(&self, resource: &ResourceHandle) -> Result<Vec<ServiceDeclaration>, DescriptorError> {
        let doc: DescriptorDoc =
            serde_json::from_slice(&resource.contents).map_err(|source| {
                DescriptorError::Malformed {
                    path: resource.path.clone(),
                    source,
                }
            })?;

        doc.services
            .into_iter()
            .map(|entry| {
                let interface = entry.interface.trim();
                let remote_name = entry.remote_name.trim();
                if interface.is_empty() || remote_name.is_empty() {
                    return Err(DescriptorError::Invalid {
                        path: resource.path.clone(),
                        reason: "service entry with empty interface or remote_name".to_owned(),
                    });
                }
                Ok(ServiceDeclaration::new(interface, remote_name))
            })
            .collect()
    }
}

/// Locates descriptor resources inside a module.
#[derive(Debug, Clone)]
pub struct DescriptorScanner {
    header: String,
    default_location: String,
    suffix: String,
}

impl DescriptorScanner {
    pub fn new(
        header: impl Into<String>,
        default_location: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            header: header.into(),
            default_location: default_location.into(),
            suffix: suffix.into(),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &RemoteProxyConfig) -> Self {
        Self::new(
            cfg.descriptor_header.clone(),
            cfg.default_descriptor_location.clone(),
            cfg.descriptor_suffix.clone(),
        )
    }

    /// Descriptor location for `module`: its header value, else the default.
    #[must_use]
    pub fn resource_location(&self, module: &dyn Module) -> String {
        module
            .header(&self.header)
            .map(|h| h.trim().to_owned())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| self.default_location.clone())
    }

    /// Descriptor resources of `module`. Never fails; empty when there are none.
    #[must_use]
    pub fn scan(&self, module: &dyn Module) -> Vec<ResourceHandle> {
        let location = self.resource_location(module);
        module
            .find_resources(&location, &self.suffix)
            .into_iter()
            .filter(|res| res.file_name().ends_with(&self.suffix))
            .collect()
    }

    /// All declarations of `module`, in resource order. Unusable resources are logged and
    /// skipped; the remaining resources still apply.
    pub fn declarations(
        &self,
        module: &dyn Module,
        parser: &dyn DescriptorParser,
    ) -> Vec<ServiceDeclaration> {
        let mut out = Vec::new();
        for resource in self.scan(module) {
            match parser.parse(&resource) {
                Ok(decls) => out.extend(decls),
                Err(e) => tracing::warn!(
                    module = %module.symbolic_name(),
                    resource = %resource.path,
                    error = %e,
                    "Skipping unreadable service descriptor"
                ),
            }
        }
        out
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use modkit_host::{LocalModule, ModuleId};
    use tracing_test::traced_test;

    const ORDERS: &str = r#"{"services":[
        {"interface":"com.acme.OrderService","remote_name":"ejb:orders/OrderBean"},
        {"interface":"com.acme.Billing","remote_name":"ejb:bill/BillBean"}
    ]}"#;

    fn scanner() -> DescriptorScanner {
        DescriptorScanner::from_config(&RemoteProxyConfig::default())
    }

    #[test]
    fn json_parser_reads_services_in_order() {
        let res = ResourceHandle::new(ModuleId(1), "MODULE-INF/remote-service/o.json", ORDERS.as_bytes());
        let decls = JsonDescriptorParser.parse(&res).unwrap();
        assert_eq!(
            decls,
            vec![
                ServiceDeclaration::new("com.acme.OrderService", "ejb:orders/OrderBean"),
                ServiceDeclaration::new("com.acme.Billing", "ejb:bill/BillBean"),
            ]
        );
    }

    #[test]
    fn json_parser_rejects_garbage_and_empty_names() {
        let garbage = ResourceHandle::new(ModuleId(1), "x.json", b"<services/>".to_vec());
        assert!(matches!(
            JsonDescriptorParser.parse(&garbage),
            Err(DescriptorError::Malformed { .. })
        ));

        let empty = ResourceHandle::new(
            ModuleId(1),
            "y.json",
            br#"{"services":[{"interface":" ","remote_name":"ejb:a"}]}"#.to_vec(),
        );
        assert!(matches!(
            JsonDescriptorParser.parse(&empty),
            Err(DescriptorError::Invalid { .. })
        ));
    }

    #[test]
    fn scan_uses_header_location_when_present() {
        let module = LocalModule::new(ModuleId(1), "custom")
            .with_header("Remote-Service", "META/remote/")
            .with_resource("META/remote/a.json", ORDERS.as_bytes())
            .with_resource("MODULE-INF/remote-service/b.json", ORDERS.as_bytes());

        let found = scanner().scan(&module);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "META/remote/a.json");
    }

    #[test]
    fn scan_falls_back_to_default_location_and_filters_suffix() {
        let module = LocalModule::new(ModuleId(1), "plain")
            .with_resource("MODULE-INF/remote-service/a.json", ORDERS.as_bytes())
            .with_resource("MODULE-INF/remote-service/readme.txt", b"hi".to_vec());

        let found = scanner().scan(&module);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name(), "a.json");

        let none = LocalModule::new(ModuleId(2), "empty");
        assert!(scanner().scan(&none).is_empty());
    }

    #[test]
    #[traced_test]
    fn declarations_skip_bad_resources_and_keep_siblings() {
        let module = LocalModule::new(ModuleId(1), "mixed")
            .with_resource("MODULE-INF/remote-service/a.json", ORDERS.as_bytes())
            .with_resource("MODULE-INF/remote-service/b.json", b"{not json".to_vec());

        let decls = scanner().declarations(&module, &JsonDescriptorParser);
        assert_eq!(decls.len(), 2);
        assert!(logs_contain("Skipping unreadable service descriptor"));
        assert!(logs_contain("MODULE-INF/remote-service/b.json"));
    }
}
