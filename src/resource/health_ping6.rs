//! `health_ping6`: a health-check resource that probes IPv6 reachability
//! of a target address/hostname via `ping6` (or `ping -6`).
//!
//! Grounded on `KiSC.Resource.health_ping6`.
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] target` (STRING; hostname or IPv6 address)
/// - `[OPTIONAL] count` (NUMBER; default 1): number of probe packets
#[derive(Debug)]
pub struct HealthPing6 {
    base: ResourceBase,
}

impl HealthPing6 {
    /// Construct a new ping6 health-check resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("health_ping6", id, config),
        }
    }

    fn probe(&self) -> bool {
        let target = self.config().get_or("target", "");
        let count = self.config().get_or("count", "1");
        runtime::shell(&["ping6", "-c", count, target])
            .or_else(|_| runtime::shell(&["ping", "-6", "-c", count, target]))
            .is_ok()
    }
}

impl ResourcePlugin for HealthPing6 {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config().get_or("target", "").is_empty() {
            errors.push("Invalid resource configuration; missing \"target\" parameter".to_string());
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
                "Health check failed (target unreachable: {})",
                self.config().get_or("target", "")
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
    fn verify_requires_target() {
        let check = HealthPing6::new("ping1".into(), ConfigMap::new());
        assert!(!check.verify().is_empty());
    }
}
