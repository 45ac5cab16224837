//! `network_ipv4`: an IPv4 address assigned to a network device.
//!
//! Grounded on `KiSC.Resource.network_ipv4`.
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] address` (dotted-decimal IPv4), `mask` (CIDR prefix length), `device`
/// - `[OPTIONAL] broadcast`/`anycast`/`label`/`scope`
#[derive(Debug)]
pub struct NetworkIpv4 {
    base: ResourceBase,
}

impl NetworkIpv4 {
    /// Construct a new IPv4 address resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("network_ipv4", id, config),
        }
    }

    fn cidr(&self) -> String {
        format!(
            "{}/{}",
            self.config().get_or("address", ""),
            self.config().get_or("mask", "")
        )
    }
}

impl ResourcePlugin for NetworkIpv4 {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for key in ["address", "mask", "device"] {
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

        let cidr = self.cidr();
        let device = self.config().get_or("device", "").to_string();
        let result = (|| -> Result<(), String> {
            let mut command = vec!["ip".to_string(), "-4".to_string(), "address".to_string(), "add".to_string(), cidr];
            for setting in ["broadcast", "anycast", "label", "scope"] {
                if let Some(value) = self.config().get(setting) {
                    command.push(setting.to_string());
                    command.push(value.to_string());
                }
            }
            command.push("dev".to_string());
            command.push(device);
            let argv: Vec<&str> = command.iter().map(String::as_str).collect();
            runtime::shell(&argv).map_err(|e| e.to_string())
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

        let cidr = self.cidr();
        let device = self.config().get_or("device", "").to_string();
        match runtime::shell(&["ip", "-4", "address", "delete", &cidr, "dev", &device]) {
            Ok(_) => {
                self.set_cached_status(Status::Stopped);
                Vec::new()
            }
            Err(e) => {
                self.set_cached_status(Status::Error);
                vec![e.to_string()]
            }
        }
    }

    /// Matches only the address, ignoring a potentially mismatching mask,
    /// device or options, as the original does.
    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let needle = format!("inet {}/", self.config().get_or("address", ""));
        let status = match runtime::shell(&["ip", "-4", "address", "show"]) {
            Ok(output) => {
                if output.lines().any(|line| line.contains(&needle)) {
                    Status::Started
                } else {
                    Status::Stopped
                }
            }
            Err(_) => Status::Error,
        };
        self.set_cached_status(status);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_requires_address_mask_device() {
        let addr = NetworkIpv4::new("ip1".into(), ConfigMap::new());
        assert_eq!(addr.verify().len(), 3);
    }
}
