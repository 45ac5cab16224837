//! `network_vlan`: a VLAN network device stacked on a physical interface.
//!
//! Grounded on `KiSC.Resource.network_vlan`.
use std::path::Path;

use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

const DEVICE_PARAMETERS: &[&str] = &["address", "mtu", "txqueuelen", "numtxqueues", "numrxqueues"];
const VLAN_OPTIONS: &[&str] = &["reorder_hdr", "gvrp", "mvrp", "loose_binding"];

/// Configuration parameters:
/// - `[REQUIRED] name`/`vlan`/`device`
/// - `[OPTIONAL] protocol`, `reorder_hdr`/`gvrp`/`mvrp`/`loose_binding`,
///   `ingress_qos_map`/`egress_qos_map` (comma-separated `FROM:TO` mappings)
/// - `[OPTIONAL]` device parameters: `address`/`mtu`/`txqueuelen`/
///   `numtxqueues`/`numrxqueues`
#[derive(Debug)]
pub struct NetworkVlan {
    base: ResourceBase,
}

impl NetworkVlan {
    /// Construct a new VLAN resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("network_vlan", id, config),
        }
    }

    fn name(&self) -> String {
        self.config().get_or("name", "").to_string()
    }
}

impl ResourcePlugin for NetworkVlan {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for key in ["name", "vlan", "device"] {
            if self.config().get_or(key, "").is_empty() {
                errors.push(format!("Invalid resource configuration; missing \"{key}\" parameter"));
            }
        }
        errors
    }

    fn start(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Started)) == Status::Started {
            return Vec::new();
        }

        let name = self.name();
        let result = (|| -> Result<(), String> {
            let mut command = vec![
                "ip".to_string(),
                "link".to_string(),
                "add".to_string(),
                "link".to_string(),
                self.config().get_or("device", "").to_string(),
                "name".to_string(),
                name.clone(),
            ];
            for setting in DEVICE_PARAMETERS {
                if let Some(value) = self.config().get(setting) {
                    command.push((*setting).to_string());
                    command.push(value.to_string());
                }
            }
            command.push("type".to_string());
            command.push("vlan".to_string());
            if let Some(value) = self.config().get("protocol") {
                command.push("protocol".to_string());
                command.push(value.to_string());
            }
            command.push("id".to_string());
            command.push(self.config().get_or("vlan", "").to_string());
            for setting in VLAN_OPTIONS {
                if let Some(value) = self.config().get(setting) {
                    command.push((*setting).to_string());
                    command.push(value.to_string());
                }
            }
            for setting in ["ingress_qos_map", "egress_qos_map"] {
                if let Some(value) = self.config().get(setting) {
                    command.push(setting.replace('_', "-"));
                    for mapping in value.split(',') {
                        command.push(mapping.to_string());
                    }
                }
            }
            let argv: Vec<&str> = command.iter().map(String::as_str).collect();
            runtime::shell(&argv).map_err(|e| e.to_string())?;
            runtime::shell(&["ip", "link", "set", &name, "up"]).map_err(|e| e.to_string())?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.set_cached_status(Status::Started);
                Vec::new()
            }
            Err(message) => {
                self.set_cached_status(Status::Error);
                vec![message]
            }
        }
    }

    fn stop(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Stopped)) == Status::Stopped {
            return Vec::new();
        }

        let name = self.name();
        let mut errors = Vec::new();
        if let Err(e) = runtime::shell(&["ip", "link", "set", &name, "down"]) {
            errors.push(e.to_string());
        }
        match runtime::shell(&["ip", "link", "delete", &name]) {
            Ok(_) => self.set_cached_status(Status::Stopped),
            Err(e) => {
                self.set_cached_status(Status::Error);
                errors.push(e.to_string());
            }
        }
        errors
    }

    fn status(&mut self, stateful: bool, intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let name = self.name();
        let mut status = Status::Started;
        if !Path::new(&format!("/sys/class/net/{name}")).exists() {
            status = Status::Stopped;
        } else if status == Status::Started && intent == Some(Status::Started) {
            let up = std::fs::read_to_string(format!("/sys/class/net/{name}/operstate"))
                .map(|contents| contents.trim() == "up")
                .unwrap_or(false);
            if !up {
                status = Status::Error;
            }
        }
        self.set_cached_status(status);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_requires_name_vlan_device() {
        let vlan = NetworkVlan::new("vlan100".into(), ConfigMap::new());
        assert_eq!(vlan.verify().len(), 3);
    }
}
