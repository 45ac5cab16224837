//! `network_bridge`: a Linux bridge network device.
//!
//! Grounded on `KiSC.Resource.network_bridge`, following the same shape
//! as `network_bond` (device creation via `ip link`, options via sysfs,
//! member attachment, existence+UP status probing).
use std::path::Path;

use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

const BRIDGE_OPTIONS: &[&str] = &["stp_state", "forward_delay", "hello_time", "max_age", "priority"];

/// Configuration parameters:
/// - `[REQUIRED] name` (STRING): bridge name
/// - `[OPTIONAL] devices` (STRING; comma-separated): bridged interfaces
/// - `[OPTIONAL] stp_state`/`forward_delay`/`hello_time`/`max_age`/`priority`:
///   bridge parameters written to `/sys/class/net/<name>/bridge/*`
#[derive(Debug)]
pub struct NetworkBridge {
    base: ResourceBase,
}

impl NetworkBridge {
    /// Construct a new bridge resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("network_bridge", id, config),
        }
    }

    fn name(&self) -> String {
        self.config().get_or("name", "").to_string()
    }
}

impl ResourcePlugin for NetworkBridge {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config().get_or("name", "").is_empty() {
            errors.push("Invalid resource configuration; missing \"name\" parameter".to_string());
        }
        errors
    }

    fn start(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Started)) == Status::Started {
            return Vec::new();
        }

        let name = self.name();
        let result = (|| -> Result<(), String> {
            runtime::shell(&["ip", "link", "add", "name", &name, "type", "bridge"])
                .map_err(|e| e.to_string())?;

            for setting in BRIDGE_OPTIONS {
                if let Some(value) = self.config().get(setting) {
                    let path = format!("/sys/class/net/{name}/bridge/{setting}");
                    runtime::echo(value, &path).map_err(|e| e.to_string())?;
                }
            }

            for device in runtime::parse_list(self.config().get_or("devices", "")) {
                runtime::shell(&["ip", "link", "set", &device, "master", &name, "up"])
                    .map_err(|e| e.to_string())?;
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
    fn verify_requires_name() {
        let bridge = NetworkBridge::new("br0".into(), ConfigMap::new());
        assert_eq!(bridge.verify().len(), 1);
    }
}
