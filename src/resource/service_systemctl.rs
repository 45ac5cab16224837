//! `service_systemctl`: a systemd unit managed via `systemctl`.
//!
//! Grounded on `KiSC.Resource.service_systemctl`.
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] name` (STRING): unit name
/// - `[OPTIONAL] restart` (`*no|yes`): restart the unit if already started
#[derive(Debug)]
pub struct ServiceSystemctl {
    base: ResourceBase,
}

impl ServiceSystemctl {
    /// Construct a new systemd-unit resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("service_systemctl", id, config),
        }
    }

    fn name(&self) -> String {
        self.config().get_or("name", "").to_string()
    }
}

impl ResourcePlugin for ServiceSystemctl {
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
        let mut restart = runtime::parse_bool(self.config().get_or("restart", "no"));

        if self.status(true, Some(Status::Started)) == Status::Started {
            if !restart {
                return Vec::new();
            }
        } else {
            restart = false;
        }

        let name = self.name();
        let verb = if restart { "restart" } else { "start" };
        match runtime::shell(&["systemctl", "-q", verb, &name]) {
            Ok(_) => {
                self.set_cached_status(Status::Started);
                Vec::new()
            }
            Err(e) => {
                self.set_cached_status(Status::Error);
                vec![e.to_string()]
            }
        }
    }

    fn stop(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Stopped)) == Status::Stopped {
            return Vec::new();
        }

        let name = self.name();
        match runtime::shell(&["systemctl", "-q", "stop", &name]) {
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

    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let name = self.name();
        let status = match runtime::shell(&["systemctl", "-q", "is-active", &name]) {
            Ok(_) => Status::Started,
            Err(_) => Status::Stopped,
        };
        self.set_cached_status(status);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_requires_name() {
        let unit = ServiceSystemctl::new("nginx".into(), ConfigMap::new());
        assert!(!unit.verify().is_empty());
    }
}
