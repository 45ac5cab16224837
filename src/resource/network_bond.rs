//! `network_bond`: a Linux bonding (trunk) network device.
//!
//! Grounded on `KiSC.Resource.network_bond`.
use std::path::Path;

use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

const BOND_OPTIONS: &[&str] = &[
    "miimon",
    "updelay",
    "downdelay",
    "use_carrier",
    "arp_interval",
    "arp_ip_target",
    "arp_all_targets",
    "arp_validate",
    "primary_reselect",
    "all_slaves_active",
    "fail_over_mac",
    "xmit_hash_policy",
    "packets_per_slave",
    "tlb_dynamic_lb",
    "lacp_rate",
    "ad_select",
    "num_grat_arp",
    "num_unsol_na",
    "lp_interval",
    "resend_igmp",
];

const DEVICE_PARAMETERS: &[&str] = &["address", "mtu", "txqueuelen", "numtxqueues", "numrxqueues"];

/// Configuration parameters (see the original module docstring for the
/// full per-option reference): `name`, `mode`, `devices` are required;
/// the remaining bonding/device parameters are all optional and map
/// directly onto `ip link` flags or `/sys/class/net/<name>/bonding/*`
/// sysfs writes.
#[derive(Debug)]
pub struct NetworkBond {
    base: ResourceBase,
}

impl NetworkBond {
    /// Construct a new bond resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("network_bond", id, config),
        }
    }

    fn name(&self) -> String {
        self.config().get_or("name", "").to_string()
    }
}

impl ResourcePlugin for NetworkBond {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for key in ["name", "mode", "devices"] {
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
            runtime::shell(&["modprobe", "bonding", "max_bonds=0"]).map_err(|e| e.to_string())?;

            let mut add_command = vec!["ip".to_string(), "link".to_string(), "add".to_string(), "name".to_string(), name.clone()];
            for setting in DEVICE_PARAMETERS {
                if let Some(value) = self.config().get(setting) {
                    add_command.push((*setting).to_string());
                    add_command.push(value.to_string());
                }
            }
            add_command.push("type".to_string());
            add_command.push("bond".to_string());
            add_command.push("mode".to_string());
            add_command.push(self.config().get_or("mode", "").to_string());
            let argv: Vec<&str> = add_command.iter().map(String::as_str).collect();
            runtime::shell(&argv).map_err(|e| e.to_string())?;

            for setting in BOND_OPTIONS {
                if let Some(value) = self.config().get(setting) {
                    let path = format!("/sys/class/net/{name}/bonding/{setting}");
                    runtime::echo(value, &path).map_err(|e| e.to_string())?;
                }
            }

            for device in runtime::parse_list(self.config().get_or("devices", "")) {
                runtime::shell(&["ip", "link", "set", &device, "master", &name, "up"])
                    .map_err(|e| e.to_string())?;
            }

            for setting in ["active_slave", "primary"] {
                if let Some(value) = self.config().get(setting) {
                    let path = format!("/sys/class/net/{name}/bonding/{setting}");
                    runtime::echo(value, &path).map_err(|e| e.to_string())?;
                }
            }

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

        for device in runtime::parse_list(self.config().get_or("devices", "")) {
            if let Err(e) = runtime::shell(&["ip", "link", "set", &device, "nomaster", "down"]) {
                errors.push(e.to_string());
            }
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
    fn verify_requires_name_mode_devices() {
        let bond = NetworkBond::new("bond0".into(), ConfigMap::new());
        assert_eq!(bond.verify().len(), 3);
    }
}
