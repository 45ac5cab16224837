//! `health_stonith`: a health-check resource that exercises a fencing
//! (STONITH) device's "status" query without actually fencing anything.
//!
//! Grounded on `KiSC.Resource.health_stonith`.
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] device` (STRING): fencing device/agent name, passed to
///   `fence_<device> -o status ...`
/// - `[OPTIONAL] options` (STRING; space-separated): extra agent options
#[derive(Debug)]
pub struct HealthStonith {
    base: ResourceBase,
}

impl HealthStonith {
    /// Construct a new STONITH health-check resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("health_stonith", id, config),
        }
    }

    fn probe(&self) -> bool {
        let device = self.config().get_or("device", "");
        let agent = format!("fence_{device}");
        let options = self.config().get_or("options", "");
        let mut argv: Vec<&str> = vec![&agent, "-o", "status"];
        argv.extend(options.split_whitespace());
        runtime::shell(&argv).is_ok()
    }
}

impl ResourcePlugin for HealthStonith {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config().get_or("device", "").is_empty() {
            errors.push("Invalid resource configuration; missing \"device\" parameter".to_string());
        }
        errors
    }

    fn start(&mut self) -> Vec<String> {
        if self.probe() {
            self.set_cached_status(Status::Started);
            Vec::new()
        } else {
            self.set_cached_status(Status::Error);
            vec![format!(
                "Health check failed (fencing device not reachable: {})",
                self.config().get_or("device", "")
            )]
        }
    }

    fn stop(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Stopped);
        Vec::new()
    }

    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if stateful {
            let status = if self.probe() { Status::Started } else { Status::Error };
            self.set_cached_status(status);
            status
        } else {
            self.cached_status()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_requires_device() {
        let check = HealthStonith::new("fence1".into(), ConfigMap::new());
        assert!(!check.verify().is_empty());
    }
}
