//! Resource plugin contract and registry.
//!
//! Grounded on `KiSC.Resource.resource.KiscResource` (the Python base
//! class) and its `kiscResourceClass`/`kiscResource` factory functions.
//! The dynamic-module-import factory becomes a `HashMap` of constructor
//! function pointers keyed by type name.

pub mod cluster_copy;
pub mod cluster_host;
pub mod cluster_hostgroup;
pub mod health_ping6;
pub mod health_stonith;
pub mod network_bond;
pub mod network_bridge;
pub mod network_ipv4;
pub mod network_vlan;
pub mod service_dummy;
pub mod service_libvirt;
pub mod service_pacemaker;
pub mod service_sysvinit;
pub mod service_systemctl;
pub mod storage_mount;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::constants::{
    RESERVED_HOSTS_KEY, RESERVED_ID_KEY, RESERVED_TYPE_KEY, RUNTIME_HOSTS_KEY, RUNTIME_STATUS_KEY,
};
use crate::error::KiscError;
use crate::runtime;
use crate::status::Status;

/// Case-preserving, sorted configuration/runtime map: a resource's static
/// settings and its `$`-prefixed runtime fields live side by side in the
/// same map, matching the original's "configuration mutation is the
/// single source of truth" design (see DESIGN.md).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap(BTreeMap<String, String>);

impl ConfigMap {
    /// An empty map.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or overwrite a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Look up a key, returning `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// True if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove a key, returning its previous value if present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterate all entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render this map's non-`$` entries (plus, optionally, its `$`
    /// entries) as `key=value` lines, sorted, matching the original's
    /// round-trip serialization rule: `TYPE` first, `ID` implicit (it is
    /// the section header, not a body line), non-`$` keys sorted, then
    /// (if `include_runtime`) `$`-keys sorted.
    pub fn render(&self, include_runtime: bool) -> String {
        let mut out = String::new();
        if let Some(kind) = self.get(RESERVED_TYPE_KEY) {
            out.push_str(&format!("TYPE={kind}\n"));
        }
        for (key, value) in self.iter() {
            if key == RESERVED_TYPE_KEY || key == RESERVED_ID_KEY || key.starts_with('$') {
                continue;
            }
            out.push_str(&format!("{key}={value}\n"));
        }
        if include_runtime {
            for (key, value) in self.iter() {
                if key.starts_with('$') {
                    out.push_str(&format!("{key}={value}\n"));
                }
            }
        }
        out
    }

    /// Parse `key=value` lines (as produced by [`ConfigMap::render`] or by
    /// a configuration file section body) into a map.
    pub fn parse(body: &str) -> Self {
        let mut map = BTreeMap::new();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self(map)
    }
}

/// One file to be cached (resolved + written) as part of a resource's
/// `start()`, as returned by [`ResourcePlugin::cache`]: `(source,
/// destination)`.
#[derive(Debug, Clone)]
pub struct CacheFile {
    /// Source path (relative to the resource's declaring file, or
    /// absolute), to be read and variable-substituted.
    pub source: PathBuf,
    /// Destination path the resolved content is written to.
    pub destination: PathBuf,
}

/// Shared state every resource plugin embeds: its id, its type name, and
/// its configuration/runtime map. Plugins implement [`ResourcePlugin`] by
/// exposing accessors to their `ResourceBase`; most other trait methods
/// then come from the trait's default implementations.
#[derive(Debug, Clone)]
pub struct ResourceBase {
    id: String,
    kind: &'static str,
    config: ConfigMap,
}

impl ResourceBase {
    /// Construct a new base, auto-injecting `TYPE`/`ID` into the
    /// configuration map and restoring `$STATUS` from a prior load (or
    /// defaulting to `Unknown`), matching `KiscResource.__init__`.
    pub fn new(kind: &'static str, id: String, mut config: ConfigMap) -> Self {
        config.insert(RESERVED_TYPE_KEY, kind);
        config.insert(RESERVED_ID_KEY, id.clone());
        if !config.contains_key(RUNTIME_STATUS_KEY) {
            config.insert(RUNTIME_STATUS_KEY, Status::Unknown.to_string());
        }
        Self { id, kind, config }
    }

    /// Mutable access to the underlying configuration/runtime map, for
    /// plugins (like `cluster_host`) that need to hand it to a free
    /// function rather than go through the `ResourcePlugin` trait.
    pub fn config_mut(&mut self) -> &mut ConfigMap {
        &mut self.config
    }
}

/// The resource plugin contract. Required methods are the per-type
/// lifecycle/verification logic; the rest (`$HOSTS` bookkeeping, cached
/// status storage, the "not implemented" fatals for `suspend`/`resume`/
/// `migrate`) are default-implemented atop `base`/`base_mut`.
pub trait ResourcePlugin: std::fmt::Debug {
    /// Access to this plugin's shared base state.
    fn base(&self) -> &ResourceBase;
    /// Mutable access to this plugin's shared base state.
    fn base_mut(&mut self) -> &mut ResourceBase;

    /// The resource's type name, e.g. `cluster_host`.
    fn kind(&self) -> &'static str {
        self.base().kind
    }

    /// The resource's id.
    fn id(&self) -> &str {
        &self.base().id
    }

    /// Read-only access to the resource's configuration/runtime map.
    fn config(&self) -> &ConfigMap {
        &self.base().config
    }

    /// Mutable access to the resource's configuration/runtime map.
    fn config_mut(&mut self) -> &mut ConfigMap {
        &mut self.base_mut().config
    }

    /// Validate the resource's static configuration, returning zero or
    /// more human-readable error messages.
    fn verify(&self) -> Vec<String>;

    /// Enumerate files this resource wants cached (resolved + written)
    /// before `start()` runs. Empty by default.
    fn cache(&self, _cache_dir: &Path) -> Result<Vec<CacheFile>, Vec<String>> {
        Ok(Vec::new())
    }

    /// Start the resource. Idempotent: a plugin already in `Started`
    /// status should return immediately with no errors.
    fn start(&mut self) -> Vec<String>;

    /// Suspend a running resource. Most plugins do not implement this.
    fn suspend(&mut self) -> Vec<String> {
        vec![format!("{}.suspend() not implemented", self.kind())]
    }

    /// Resume a suspended resource. Most plugins do not implement this.
    fn resume(&mut self) -> Vec<String> {
        vec![format!("{}.resume() not implemented", self.kind())]
    }

    /// Stop the resource. Idempotent.
    fn stop(&mut self) -> Vec<String>;

    /// Migrate the resource to another host. Only a handful of plugins
    /// (notably `service_libvirt`) implement this.
    fn migrate(&mut self, _target_host: &str) -> Vec<String> {
        vec![format!("{}.migrate() not implemented", self.kind())]
    }

    /// Report the resource's status. When `stateful`, the plugin should
    /// perform an external probe; otherwise it returns its cached value.
    /// `intent`, when given, hints how deep a stateful probe should go
    /// (e.g. "merely exists" vs. "is actually up").
    fn status(&mut self, stateful: bool, intent: Option<Status>) -> Status;

    /// The hosts this resource is currently registered against
    /// (the `$HOSTS` runtime key).
    fn hosts_ids(&self) -> Vec<String> {
        runtime::parse_list(self.config().get_or(RUNTIME_HOSTS_KEY, ""))
    }

    /// Register a host against this resource's `$HOSTS` list. Not
    /// idempotent: registering an already-registered host is an error,
    /// matching the original's `registerHost`.
    fn register_host(&mut self, host_id: &str) -> Result<(), KiscError> {
        let mut ids = self.hosts_ids();
        if ids.iter().any(|id| id == host_id) {
            return Err(KiscError::Precondition(format!(
                "Host already registered ({host_id})"
            )));
        }
        ids.push(host_id.to_string());
        self.config_mut().insert(RUNTIME_HOSTS_KEY, ids.join(","));
        Ok(())
    }

    /// Unregister a host from this resource's `$HOSTS` list. Idempotent:
    /// unregistering an absent host is a silent no-op.
    fn unregister_host(&mut self, host_id: &str) {
        let mut ids = self.hosts_ids();
        let Some(position) = ids.iter().position(|id| id == host_id) else {
            return;
        };
        ids.remove(position);
        if ids.is_empty() {
            self.config_mut().remove(RUNTIME_HOSTS_KEY);
        } else {
            self.config_mut().insert(RUNTIME_HOSTS_KEY, ids.join(","));
        }
    }

    /// Read the cached status (the `$STATUS` runtime key) without probing.
    fn cached_status(&self) -> Status {
        self.config()
            .get(RUNTIME_STATUS_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or(Status::Unknown)
    }

    /// Persist `status` into the `$STATUS` runtime key.
    fn set_cached_status(&mut self, status: Status) {
        self.config_mut().insert(RUNTIME_STATUS_KEY, status.to_string());
    }

    /// Render this resource for persistence (the same format used for
    /// both cached configuration display and runtime files).
    fn to_section(&self, include_runtime: bool) -> String {
        format!(
            "[{}]\n{}",
            self.id(),
            self.config().render(include_runtime)
        )
    }
}

/// Constructor signature every registered plugin type provides.
pub type PluginFactory = fn(String, ConfigMap) -> Box<dyn ResourcePlugin>;

/// Build the type-name → constructor registry, the Rust analogue of the
/// original's `kiscResourceClass(type)` dynamic import.
pub fn registry() -> HashMap<&'static str, PluginFactory> {
    let mut map: HashMap<&'static str, PluginFactory> = HashMap::new();
    map.insert(crate::constants::TYPE_CLUSTER_HOST, |id, config| {
        Box::new(cluster_host::ClusterHost::new(id, config))
    });
    map.insert(crate::constants::TYPE_CLUSTER_HOSTGROUP, |id, config| {
        Box::new(cluster_hostgroup::ClusterHostgroup::new(id, config))
    });
    map.insert("cluster_copy", |id, config| {
        Box::new(cluster_copy::ClusterCopy::new(id, config))
    });
    map.insert("network_bond", |id, config| {
        Box::new(network_bond::NetworkBond::new(id, config))
    });
    map.insert("network_bridge", |id, config| {
        Box::new(network_bridge::NetworkBridge::new(id, config))
    });
    map.insert("network_vlan", |id, config| {
        Box::new(network_vlan::NetworkVlan::new(id, config))
    });
    map.insert("network_ipv4", |id, config| {
        Box::new(network_ipv4::NetworkIpv4::new(id, config))
    });
    map.insert("storage_mount", |id, config| {
        Box::new(storage_mount::StorageMount::new(id, config))
    });
    map.insert("service_systemctl", |id, config| {
        Box::new(service_systemctl::ServiceSystemctl::new(id, config))
    });
    map.insert("service_sysvinit", |id, config| {
        Box::new(service_sysvinit::ServiceSysvinit::new(id, config))
    });
    map.insert("service_libvirt", |id, config| {
        Box::new(service_libvirt::ServiceLibvirt::new(id, config))
    });
    map.insert("service_pacemaker", |id, config| {
        Box::new(service_pacemaker::ServicePacemaker::new(id, config))
    });
    map.insert("health_ping6", |id, config| {
        Box::new(health_ping6::HealthPing6::new(id, config))
    });
    map.insert("health_stonith", |id, config| {
        Box::new(health_stonith::HealthStonith::new(id, config))
    });
    map.insert("service_dummy", |id, config| {
        Box::new(service_dummy::ServiceDummy::new(id, config))
    });
    map
}

/// Instantiate a resource plugin by type name, failing if the type is
/// unknown. Mirrors `kiscResource(type, id, config)`.
pub fn create(kind: &str, id: String, config: ConfigMap) -> Result<Box<dyn ResourcePlugin>, KiscError> {
    registry()
        .get(kind)
        .map(|factory| factory(id, config))
        .ok_or_else(|| KiscError::Configuration(format!("Unknown resource type ({kind})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_map_render_sorts_keys_and_groups_runtime_last() {
        let mut config = ConfigMap::new();
        config.insert("TYPE", "cluster_copy");
        config.insert("ID", "cp1");
        config.insert("destination", "/etc/foo");
        config.insert("source", "/tmp/foo");
        config.insert("$STATUS", "Started");

        let rendered = config.render(true);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "TYPE=cluster_copy",
                "destination=/etc/foo",
                "source=/tmp/foo",
                "$STATUS=Started",
            ]
        );
    }

    #[test]
    fn config_map_round_trips_through_render_and_parse() {
        let mut config = ConfigMap::new();
        config.insert("TYPE", "service_dummy");
        config.insert("ID", "d1");
        config.insert("$STATUS", "Stopped");

        let rendered = config.render(true);
        let reparsed = ConfigMap::parse(&rendered);
        assert_eq!(reparsed.get("TYPE"), Some("service_dummy"));
        assert_eq!(reparsed.get("$STATUS"), Some("Stopped"));
    }

    #[test]
    fn unknown_resource_type_is_a_configuration_error() {
        let result = create("nonexistent", "x".into(), ConfigMap::new());
        assert!(matches!(result, Err(KiscError::Configuration(_))));
    }
}
