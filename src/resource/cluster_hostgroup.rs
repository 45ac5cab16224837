//! `cluster_hostgroup`: a named list of host ids, used as a single token
//! in HOSTS expressions (`@groupname`).
//!
//! Grounded on `KiSC.Resource.cluster_hostgroup`.
use crate::constants::{RESERVED_HOSTS_KEY, TYPE_CLUSTER_HOSTGROUP};
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// A hostgroup resource: lifecycle methods are no-ops, and `hosts_ids()`
/// is repurposed to return the group's *member* hosts (parsed from the
/// `HOSTS` config key) rather than a registration list — hostgroups are
/// never registered against anything.
#[derive(Debug)]
pub struct ClusterHostgroup {
    base: ResourceBase,
}

impl ClusterHostgroup {
    /// Construct a new hostgroup resource from its id and configuration.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new(TYPE_CLUSTER_HOSTGROUP, id, config),
        }
    }
}

impl ResourcePlugin for ClusterHostgroup {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config().get_or(RESERVED_HOSTS_KEY, "").is_empty() {
            errors.push("Invalid resource configuration; missing \"HOSTS\" parameter".to_string());
        }
        errors
    }

    fn start(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Started);
        Vec::new()
    }

    fn stop(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Stopped);
        Vec::new()
    }

    fn status(&mut self, _stateful: bool, _intent: Option<Status>) -> Status {
        self.cached_status()
    }

    /// Member hosts, not a registration list.
    fn hosts_ids(&self) -> Vec<String> {
        runtime::parse_list(self.config().get_or(RESERVED_HOSTS_KEY, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_requires_hosts() {
        let group = ClusterHostgroup::new("web".into(), ConfigMap::new());
        assert!(!group.verify().is_empty());
    }

    #[test]
    fn hosts_ids_returns_member_list() {
        let mut config = ConfigMap::new();
        config.insert("HOSTS", "h1,h2");
        let group = ClusterHostgroup::new("web".into(), config);
        assert_eq!(group.hosts_ids(), vec!["h1".to_string(), "h2".to_string()]);
    }
}
