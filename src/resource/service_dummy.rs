//! `service_dummy`: a tool-exercise resource with no external state —
//! starting it makes it running/healthy and nothing else.
//!
//! Grounded on `KiSC.Resource.service_dummy`.
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::status::Status;

/// A resource with no external effect, useful for exercising the
/// controllers/consumables machinery without touching the host.
#[derive(Debug)]
pub struct ServiceDummy {
    base: ResourceBase,
}

impl ServiceDummy {
    /// Construct a new dummy resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("service_dummy", id, config),
        }
    }
}

impl ResourcePlugin for ServiceDummy {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        Vec::new()
    }

    fn start(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Started);
        Vec::new()
    }

    fn suspend(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Suspended);
        Vec::new()
    }

    fn resume(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Started);
        Vec::new()
    }

    fn stop(&mut self) -> Vec<String> {
        self.set_cached_status(Status::Stopped);
        Vec::new()
    }

    fn status(&mut self, _stateful: bool, _intent: Option<Status>) -> Status {
        if self.cached_status() == Status::Unknown {
            self.set_cached_status(Status::Stopped);
        }
        self.cached_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_stop_round_trips_status() {
        let mut dummy = ServiceDummy::new("d1".into(), ConfigMap::new());
        assert!(dummy.start().is_empty());
        assert_eq!(dummy.status(false, None), Status::Started);
        assert!(dummy.stop().is_empty());
        assert_eq!(dummy.status(false, None), Status::Stopped);
    }

    #[test]
    fn suspend_then_resume_round_trips_status() {
        let mut dummy = ServiceDummy::new("d1".into(), ConfigMap::new());
        assert!(dummy.start().is_empty());
        assert!(dummy.suspend().is_empty());
        assert_eq!(dummy.status(false, None), Status::Suspended);
        assert!(dummy.resume().is_empty());
        assert_eq!(dummy.status(false, None), Status::Started);
    }

    #[test]
    fn unknown_status_resolves_to_stopped() {
        let mut dummy = ServiceDummy::new("d1".into(), ConfigMap::new());
        assert_eq!(dummy.status(false, None), Status::Stopped);
    }
}
