//! `cluster_host`: a physical or virtual cluster host, and the consumables
//! admission-control ledger for resources registered against it.
//!
//! Grounded on `KiSC.Resource.cluster_host`. Unlike the original, which
//! lazily caches hostname/aliases/consumables on first access, this plugin
//! reads straight from its `ConfigMap` on every call: the config map is
//! already the single source of truth, so a separate cache would only
//! risk drifting from it.
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] hostname` (STRING; preferably FQDN)
/// - `[OPTIONAL] aliases` (STRING; comma-separated)
/// - `[OPTIONAL] virtual` (`*no|yes`)
/// - `[OPTIONAL] CONSUMABLES` (STRING; comma-separated `id:quantity` pairs;
///   negative quantity means unlimited)
/// - `[OPTIONAL] register_to` (STRING; host ID): delegate resource
///   registration to the named (virtual) host
#[derive(Debug)]
pub struct ClusterHost {
    base: ResourceBase,
}

impl ClusterHost {
    /// Construct a new cluster-host resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("cluster_host", id, config),
        }
    }

    /// Configured host name.
    pub fn hostname(&self) -> String {
        self.config().get_or("hostname", "").to_string()
    }

    /// Configured host aliases.
    pub fn aliases(&self) -> Vec<String> {
        runtime::parse_list(self.config().get_or("aliases", ""))
    }

    /// Whether this is a virtual host (used alongside `register_to`).
    pub fn is_virtual(&self) -> bool {
        runtime::parse_bool(self.config().get_or("virtual", "no"))
    }

    /// Host ID resource registration is delegated to, if any.
    pub fn register_to(&self) -> Option<String> {
        self.config().get("register_to").map(str::to_string)
    }

    /// Provided consumables and their quantity (negative means unlimited).
    pub fn consumables(&self) -> Result<Vec<(String, i64)>, crate::error::KiscError> {
        runtime::parse_dictionary(self.config().get_or("CONSUMABLES", ""), Some(-1))
    }

    /// Consumables currently booked against this host.
    pub fn consumables_used(&self) -> Result<Vec<(String, i64)>, crate::error::KiscError> {
        runtime::parse_dictionary(self.config().get_or("$CONSUMABLES_USED", ""), Some(1))
    }

    /// Consumables still available on this host.
    pub fn consumables_free(&self) -> Result<Vec<(String, i64)>, crate::error::KiscError> {
        let available = self.consumables()?;
        let used = self.consumables_used()?;
        Ok(available
            .into_iter()
            .map(|(id, quantity)| {
                let booked = used.iter().find(|(u, _)| *u == id).map(|(_, q)| *q).unwrap_or(0);
                (id, quantity - booked)
            })
            .collect())
    }

    /// Resources registered against this host (bootstrap or regular set).
    pub fn resources_ids(&self, bootstrap: bool) -> Vec<String> {
        let key = if bootstrap { "$BOOTSTRAP" } else { "$RESOURCES" };
        runtime::parse_list(self.config().get_or(key, ""))
    }

    fn localhost_matches(&self) -> Result<bool, String> {
        let local = runtime::local_hostname().map_err(|e| e.to_string())?;
        Ok(local == self.hostname() || self.aliases().iter().any(|alias| *alias == local))
    }

    /// Register `resource_id` (consuming `wants`) as running on this host.
    ///
    /// `check` performs admission control only, without mutating state;
    /// `oversubscribe` downgrades an exhausted consumable from a hard
    /// failure to a warning (folded into the returned error list as an
    /// informational entry, never aborting the registration).
    pub fn register_resource(
        &mut self,
        resource_id: &str,
        wants: &[(String, i64)],
        bootstrap: bool,
        check: bool,
        oversubscribe: bool,
    ) -> Vec<String> {
        if self.is_virtual() && bootstrap {
            return vec!["Virtual host may not register bootstrap resource".to_string()];
        }

        let key = if bootstrap { "$BOOTSTRAP" } else { "$RESOURCES" };
        let mut resources = self.resources_ids(bootstrap);
        if resources.iter().any(|r| r == resource_id) {
            return Vec::new();
        }

        let available: std::collections::BTreeMap<String, i64> = match self.consumables() {
            Ok(list) => list.into_iter().collect(),
            Err(e) => return vec![e.to_string()],
        };
        let mut used: std::collections::BTreeMap<String, i64> = match self.consumables_used() {
            Ok(list) => list.into_iter().collect(),
            Err(e) => return vec![e.to_string()],
        };

        let mut to_book = Vec::new();
        for (consumable_id, wanted) in wants {
            let Some(&provided) = available.get(consumable_id) else {
                continue;
            };
            if provided >= 0 {
                let currently_used = used.get(consumable_id).copied().unwrap_or(0);
                let remaining = provided - currently_used;
                if *wanted > remaining && !oversubscribe {
                    return vec![format!("Consumable exhausted ({consumable_id})")];
                }
            }
            to_book.push((consumable_id.clone(), *wanted));
        }

        if check {
            return Vec::new();
        }

        for (consumable_id, wanted) in &to_book {
            *used.entry(consumable_id.clone()).or_insert(0) += wanted;
        }
        resources.push(resource_id.to_string());
        self.config_mut().insert(key, &resources.join(","));
        write_consumables(self.base_mut().config_mut(), &available, &used);
        Vec::new()
    }

    /// Unregister `resource_id` (releasing `wants`) from this host.
    pub fn unregister_resource(&mut self, resource_id: &str, wants: &[(String, i64)], bootstrap: bool) -> Vec<String> {
        if self.is_virtual() && bootstrap {
            return vec!["Virtual host may not unregister bootstrap resource".to_string()];
        }

        let key = if bootstrap { "$BOOTSTRAP" } else { "$RESOURCES" };
        let mut resources = self.resources_ids(bootstrap);
        if !resources.iter().any(|r| r == resource_id) {
            return Vec::new();
        }

        let available: std::collections::BTreeMap<String, i64> = match self.consumables() {
            Ok(list) => list.into_iter().collect(),
            Err(e) => return vec![e.to_string()],
        };
        let mut used: std::collections::BTreeMap<String, i64> = match self.consumables_used() {
            Ok(list) => list.into_iter().collect(),
            Err(e) => return vec![e.to_string()],
        };

        for (consumable_id, wanted) in wants {
            if let Some(current) = used.get_mut(consumable_id) {
                *current -= wanted;
                if *current == 0 {
                    used.remove(consumable_id);
                }
            }
        }

        resources.retain(|r| r != resource_id);
        if resources.is_empty() {
            self.config_mut().remove(key);
        } else {
            self.config_mut().insert(key, &resources.join(","));
        }
        write_consumables(self.base_mut().config_mut(), &available, &used);
        Vec::new()
    }
}

fn write_consumables(config: &mut ConfigMap, available: &std::collections::BTreeMap<String, i64>, used: &std::collections::BTreeMap<String, i64>) {
    if used.is_empty() {
        config.remove("$CONSUMABLES_USED");
    } else {
        let rendered = used.iter().map(|(k, v)| format!("{k}:{v}")).collect::<Vec<_>>().join(",");
        config.insert("$CONSUMABLES_USED", &rendered);
    }
    let free = available
        .iter()
        .map(|(k, quantity)| format!("{k}:{}", quantity - used.get(k).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(",");
    config.insert("$CONSUMABLES_FREE", &free);
}

impl ResourcePlugin for ClusterHost {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        if self.hostname().is_empty() {
            vec!["Invalid resource configuration; missing \"hostname\" setting".to_string()]
        } else {
            Vec::new()
        }
    }

    fn start(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Started)) == Status::Started {
            return Vec::new();
        }

        if !self.is_virtual() {
            match self.localhost_matches() {
                Ok(true) => {}
                Ok(false) => {
                    self.set_cached_status(Status::Error);
                    return vec!["Cannot start remote host".to_string()];
                }
                Err(message) => {
                    self.set_cached_status(Status::Error);
                    return vec![message];
                }
            }
        }

        self.set_cached_status(Status::Started);
        Vec::new()
    }

    fn stop(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Stopped)) == Status::Stopped {
            return Vec::new();
        }

        if !self.is_virtual() {
            match self.localhost_matches() {
                Ok(true) => {}
                Ok(false) => {
                    self.set_cached_status(Status::Error);
                    return vec!["Cannot stop remote host".to_string()];
                }
                Err(message) => {
                    self.set_cached_status(Status::Error);
                    return vec![message];
                }
            }
        }

        if !self.config().get_or("$RESOURCES", "").is_empty() {
            self.set_cached_status(Status::Error);
            return vec!["Resources are running".to_string()];
        }

        self.set_cached_status(Status::Stopped);
        Vec::new()
    }

    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let mut status = self.cached_status();
        if self.is_virtual() {
            if status == Status::Unknown {
                status = Status::Stopped;
            }
        } else {
            match self.localhost_matches() {
                Ok(true) => {
                    if status == Status::Unknown {
                        status = Status::Stopped;
                    }
                }
                Ok(false) => status = Status::Unknown,
                Err(_) => status = Status::Error,
            }
        }

        self.set_cached_status(status);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with(hostname: &str, consumables: &str, used: &str) -> ClusterHost {
        let mut config = ConfigMap::new();
        config.insert("hostname", hostname);
        if !consumables.is_empty() {
            config.insert("CONSUMABLES", consumables);
        }
        if !used.is_empty() {
            config.insert("$CONSUMABLES_USED", used);
        }
        ClusterHost::new(hostname.to_string(), config)
    }

    #[test]
    fn verify_requires_hostname() {
        let host = ClusterHost::new("h1".into(), ConfigMap::new());
        assert_eq!(host.verify().len(), 1);
    }

    #[test]
    fn register_resource_books_consumables() {
        let mut host = host_with("h1", "gpu:2", "");
        let errors = host.register_resource("job1", &[("gpu".to_string(), 1)], false, false, false);
        assert!(errors.is_empty());
        assert_eq!(host.consumables_used().unwrap(), vec![("gpu".to_string(), 1)]);
        assert_eq!(host.resources_ids(false), vec!["job1".to_string()]);
    }

    #[test]
    fn register_resource_rejects_exhausted_consumable_without_force() {
        let mut host = host_with("h1", "gpu:1", "gpu:1");
        let errors = host.register_resource("job2", &[("gpu".to_string(), 1)], false, false, false);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("exhausted"));
    }

    #[test]
    fn register_resource_allows_oversubscription_when_forced() {
        let mut host = host_with("h1", "gpu:1", "gpu:1");
        let errors = host.register_resource("job2", &[("gpu".to_string(), 1)], false, false, true);
        assert!(errors.is_empty());
        assert_eq!(host.consumables_used().unwrap(), vec![("gpu".to_string(), 2)]);
    }

    #[test]
    fn unregister_resource_releases_consumables() {
        let mut host = host_with("h1", "gpu:2", "");
        host.register_resource("job1", &[("gpu".to_string(), 1)], false, false, false);
        let errors = host.unregister_resource("job1", &[("gpu".to_string(), 1)], false);
        assert!(errors.is_empty());
        assert!(host.consumables_used().unwrap().is_empty());
        assert!(host.resources_ids(false).is_empty());
    }

    #[test]
    fn stop_refuses_while_resources_registered() {
        let mut host = host_with("h1", "", "");
        host.config_mut().insert("$RESOURCES", "job1");
        host.config_mut().insert("virtual", "yes");
        let errors = host.stop();
        assert_eq!(errors, vec!["Resources are running".to_string()]);
    }
}
