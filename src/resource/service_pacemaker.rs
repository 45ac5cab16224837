//! `service_pacemaker`: a Pacemaker-managed cluster resource.
//!
//! Grounded on `KiSC.Resource.service_pacemaker`. As with
//! `service_libvirt`, cached-file paths are recomputed from the
//! `$CACHE_DIR` runtime key rather than stashed on an instance field.
use std::path::{Path, PathBuf};
use std::thread::sleep;

use crate::constants::RUNTIME_CACHE_DIR_KEY;
use crate::resource::{CacheFile, ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

const DEFAULT_TIMEOUT_START: u64 = 15;
const DEFAULT_TIMEOUT_STOP: u64 = 60;
const CLEANUP_SETTLE: std::time::Duration = std::time::Duration::from_secs(3);

/// Configuration parameters:
/// - `[REQUIRED] name` (STRING): Pacemaker resource name
/// - `[OPTIONAL] resource_file`/`constraint_file` (STRING; path to
///   `*.xml`): CIB fragments pushed via `cibadmin` when the resource starts
/// - `[OPTIONAL] timeout_start`/`timeout_stop` (NUMBER; seconds)
/// - `[OPTIONAL] cleanup` (`*no|yes`): remove the CIB fragments on stop
#[derive(Debug)]
pub struct ServicePacemaker {
    base: ResourceBase,
}

impl ServicePacemaker {
    /// Construct a new Pacemaker-resource plugin.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("service_pacemaker", id, config),
        }
    }

    fn name(&self) -> String {
        self.config().get_or("name", "").to_string()
    }

    fn cached_file(&self, key: &str, suffix: &str) -> Option<PathBuf> {
        if !self.config().contains_key(key) {
            return None;
        }
        let cache_dir = self.config().get_or(RUNTIME_CACHE_DIR_KEY, "");
        Some(Path::new(cache_dir).join(format!("service_pacemaker#{}.{suffix}.xml", self.id())))
    }

    fn timeout(&self, key: &str, default: u64) -> u64 {
        self.config().get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn locate(&self) -> Result<String, String> {
        runtime::shell(&["crm_resource", "-Q", "-r", &self.name(), "-W"])
            .map(|out| out.trim().to_string())
            .map_err(|e| e.to_string())
    }

    fn cleanup(&self) -> Result<(), String> {
        if !runtime::parse_bool(self.config().get_or("cleanup", "no")) {
            return Ok(());
        }
        let name = self.name();
        if self.config().contains_key("constraint_file") {
            let xpath = format!("//rsc_location[@rsc='{name}']");
            runtime::shell(&["cibadmin", "-o", "constraints", "-d", "-f", "-A", &xpath]).map_err(|e| e.to_string())?;
            sleep(CLEANUP_SETTLE);
        }
        if self.config().contains_key("resource_file") {
            let xpath = format!("//primitive[@id='{name}'] | //group[@id='{name}']");
            runtime::shell(&["cibadmin", "-o", "resources", "-D", "-A", &xpath]).map_err(|e| e.to_string())?;
            sleep(CLEANUP_SETTLE);
        }
        Ok(())
    }
}

impl ResourcePlugin for ServicePacemaker {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        if self.name().is_empty() {
            vec!["Invalid resource configuration; missing \"name\" parameter".to_string()]
        } else {
            Vec::new()
        }
    }

    fn cache(&self, cache_dir: &Path) -> Result<Vec<CacheFile>, Vec<String>> {
        let mut files = Vec::new();
        if let Some(source) = self.config().get("resource_file") {
            files.push(CacheFile {
                source: PathBuf::from(source),
                destination: cache_dir.join(format!("service_pacemaker#{}.resource_file.xml", self.id())),
            });
        }
        if let Some(source) = self.config().get("constraint_file") {
            files.push(CacheFile {
                source: PathBuf::from(source),
                destination: cache_dir.join(format!("service_pacemaker#{}.constraint_file.xml", self.id())),
            });
        }
        Ok(files)
    }

    fn start(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Started)) == Status::Started {
            return Vec::new();
        }

        let result = (|| -> Result<(), String> {
            let timeout = self.timeout("timeout_start", DEFAULT_TIMEOUT_START);
            let name = self.name();

            if let Some(path) = self.cached_file("resource_file", "resource_file") {
                let path = path.to_string_lossy().into_owned();
                runtime::shell(&["cibadmin", "-o", "resources", "-M", "-c", "-x", &path]).map_err(|e| e.to_string())?;
                sleep(CLEANUP_SETTLE);
            }
            if let Some(path) = self.cached_file("constraint_file", "constraint_file") {
                let path = path.to_string_lossy().into_owned();
                runtime::shell(&["cibadmin", "-o", "constraints", "-M", "-c", "-x", &path]).map_err(|e| e.to_string())?;
                sleep(CLEANUP_SETTLE);
            }

            runtime::shell(&["crm_resource", "-Q", "-r", &name, "-m", "-p", "target-role", "-v", "Started"])
                .map_err(|e| e.to_string())?;

            let mut remaining = timeout as i64;
            loop {
                if !self.locate()?.is_empty() {
                    break;
                }
                remaining -= 1;
                if remaining < 0 {
                    return Err("Resource did not start".to_string());
                }
                sleep(crate::constants::POLL_INTERVAL);
            }
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
            return match self.cleanup() {
                Ok(()) => Vec::new(),
                Err(message) => {
                    self.set_cached_status(Status::Error);
                    vec![message]
                }
            };
        }

        let result = (|| -> Result<(), String> {
            let timeout = self.timeout("timeout_stop", DEFAULT_TIMEOUT_STOP);
            let name = self.name();
            runtime::shell(&["crm_resource", "-Q", "-r", &name, "-m", "-p", "target-role", "-v", "Stopped"])
                .map_err(|e| e.to_string())?;

            let mut remaining = timeout as i64;
            loop {
                if self.locate()?.is_empty() {
                    break;
                }
                remaining -= 1;
                if remaining < 0 {
                    return Err("Resource did not stop".to_string());
                }
                sleep(crate::constants::POLL_INTERVAL);
            }
            self.cleanup()
        })();

        match result {
            Ok(()) => {
                self.set_cached_status(Status::Stopped);
                Vec::new()
            }
            Err(message) => {
                self.set_cached_status(Status::Error);
                vec![message]
            }
        }
    }

    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let status = match self.locate() {
            Ok(nodes) if nodes.is_empty() => {
                self.config_mut().remove("$PACEMAKER_NODES");
                Status::Stopped
            }
            Ok(nodes) => {
                self.config_mut().insert("$PACEMAKER_NODES", &nodes);
                Status::Started
            }
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
        let resource = ServicePacemaker::new("vip1".into(), ConfigMap::new());
        assert_eq!(resource.verify().len(), 1);
    }

    #[test]
    fn cache_declares_resource_and_constraint_files() {
        let mut config = ConfigMap::new();
        config.insert("name", "vip1");
        config.insert("resource_file", "/etc/kisc/vip1.rsc.xml");
        config.insert("constraint_file", "/etc/kisc/vip1.con.xml");
        let resource = ServicePacemaker::new("vip1".into(), config);
        let files = resource.cache(Path::new("/var/cache/kisc")).unwrap();
        assert_eq!(files.len(), 2);
    }
}
