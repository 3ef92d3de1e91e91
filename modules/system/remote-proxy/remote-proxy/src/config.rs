//! Configuration of the remote proxy module.
//!
//! Read from the `remote_proxy` section of the host configuration, or layered from defaults,
//! an optional YAML file and `REMOTE_PROXY_*` environment variables.

use std::collections::BTreeMap;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Section of the host configuration this module reads.
pub const CONFIG_SECTION: &str = "remote_proxy";

/// Prefix of environment overrides, e.g. `REMOTE_PROXY_RECONNECT_ON_FLUSH=false`.
pub const ENV_PREFIX: &str = "REMOTE_PROXY_";

pub const DEFAULT_DESCRIPTOR_HEADER: &str = "Remote-Service";
pub const DEFAULT_DESCRIPTOR_LOCATION: &str = "MODULE-INF/remote-service";
pub const DEFAULT_DESCRIPTOR_SUFFIX: &str = ".json";

/// What to do when a required parent module name matches more than one module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateParentPolicy {
    /// Warn and keep the module with the lowest id.
    #[default]
    FirstWins,
    /// Refuse to start.
    Reject,
}

/// Configuration for the remote proxy module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteProxyConfig {
    /// Module header naming the descriptor location.
    pub descriptor_header: String,
    /// Location used when a module does not carry the header.
    pub default_descriptor_location: String,
    /// Only resources with this suffix are parsed.
    pub descriptor_suffix: String,
    /// Symbolic names of modules whose types every resolution chain falls back to, in order.
    pub parent_modules: Vec<String>,
    pub duplicate_parents: DuplicateParentPolicy,
    /// Reopen the directory connection before invalidating handles on flush.
    pub reconnect_on_flush: bool,
    /// Passed verbatim to the remote directory when connecting.
    pub directory_environment: BTreeMap<String, String>,
}

impl Default for RemoteProxyConfig {
    fn default() -> Self {
        Self {
            descriptor_header: DEFAULT_DESCRIPTOR_HEADER.to_owned(),
            default_descriptor_location: DEFAULT_DESCRIPTOR_LOCATION.to_owned(),
            descriptor_suffix: DEFAULT_DESCRIPTOR_SUFFIX.to_owned(),
            parent_modules: Vec::new(),
            duplicate_parents: DuplicateParentPolicy::default(),
            reconnect_on_flush: true,
            directory_environment: BTreeMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid remote_proxy configuration: {0}")]
    Invalid(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Invalid(Box::new(e))
    }
}

impl RemoteProxyConfig {
    /// Read the `remote_proxy` section of a host configuration, over defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the section does not deserialize.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(figment.focus(CONFIG_SECTION))
            .extract()?;
        Ok(config)
    }

    /// Layer defaults, an optional YAML file and `REMOTE_PROXY_*` environment variables.
    ///
    /// Nested keys use `__` in variable names, e.g.
    /// `REMOTE_PROXY_DIRECTORY_ENVIRONMENT__PROVIDER_URL`.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if any layer fails to parse or deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        tracing::debug!(?config, "Loaded remote proxy configuration");
        Ok(config)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn defaults_match_descriptor_conventions() {
        let cfg = RemoteProxyConfig::default();
        assert_eq!(cfg.descriptor_header, "Remote-Service");
        assert_eq!(cfg.default_descriptor_location, "MODULE-INF/remote-service");
        assert_eq!(cfg.descriptor_suffix, ".json");
        assert!(cfg.parent_modules.is_empty());
        assert_eq!(cfg.duplicate_parents, DuplicateParentPolicy::FirstWins);
        assert!(cfg.reconnect_on_flush);
    }

    #[test]
    fn from_figment_reads_module_section() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "remote_proxy": {
                "parent_modules": ["ecosystem.api", "ecosystem.model"],
                "duplicate_parents": "reject",
                "directory_environment": { "provider_url": "remote://dir:4447" }
            },
            "other_module": { "ignored": true }
        })));

        let cfg = RemoteProxyConfig::from_figment(&figment).unwrap();
        assert_eq!(cfg.parent_modules, vec!["ecosystem.api", "ecosystem.model"]);
        assert_eq!(cfg.duplicate_parents, DuplicateParentPolicy::Reject);
        assert_eq!(
            cfg.directory_environment.get("provider_url").map(String::as_str),
            Some("remote://dir:4447")
        );
        assert_eq!(cfg.descriptor_suffix, ".json");
    }

    #[test]
    fn from_figment_without_section_yields_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(json!({ "other": 1 })));
        let cfg = RemoteProxyConfig::from_figment(&figment).unwrap();
        assert_eq!(cfg, RemoteProxyConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "remote_proxy": { "descriptor_sufix": ".xml" }
        })));

        assert!(matches!(
            RemoteProxyConfig::from_figment(&figment),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn load_layers_yaml_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "descriptor_suffix: .xml\nreconnect_on_flush: true\nparent_modules:\n  - shared.types"
        )
        .unwrap();

        temp_env::with_var("REMOTE_PROXY_RECONNECT_ON_FLUSH", Some("false"), || {
            let cfg = RemoteProxyConfig::load(Some(file.path())).unwrap();
            assert_eq!(cfg.descriptor_suffix, ".xml");
            assert_eq!(cfg.parent_modules, vec!["shared.types"]);
            assert!(!cfg.reconnect_on_flush);
            assert_eq!(cfg.descriptor_header, "Remote-Service");
        });
    }

    #[test]
    fn load_without_file_uses_defaults() {
        temp_env::with_var_unset("REMOTE_PROXY_RECONNECT_ON_FLUSH", || {
            let cfg = RemoteProxyConfig::load(None).unwrap();
            assert!(cfg.reconnect_on_flush);
        });
    }
}
