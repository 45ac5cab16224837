//! `service_libvirt`: a libvirt-managed virtual machine domain.
//!
//! Grounded on `KiSC.Resource.service_libvirt`. The original lazily
//! caches the resolved domain XML's path on its instance during `cache()`;
//! here the cluster-resource controller instead records the cache
//! directory under the reserved `$CACHE_DIR` runtime key right after
//! calling `cache()`, and this plugin recomputes the same deterministic
//! destination path from it whenever it needs it.
use std::path::{Path, PathBuf};
use std::thread::sleep;

use crate::constants::RUNTIME_CACHE_DIR_KEY;
use crate::resource::{CacheFile, ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

const DEFAULT_TIMEOUT_START: u64 = 5;
const DEFAULT_TIMEOUT_SUSPEND: u64 = 5;
const DEFAULT_TIMEOUT_RESUME: u64 = 5;
const DEFAULT_TIMEOUT_STOP: u64 = 15;
const DEFAULT_TIMEOUT_MIGRATE: u64 = 60;

/// Configuration parameters:
/// - `[REQUIRED] name` (STRING): domain name
/// - `[OPTIONAL] config_file` (STRING; path to `*.xml`): if given, the
///   domain is `virsh create`d from the cached, resolved file; otherwise
///   it is `virsh start`ed (assuming it was `virsh define`d beforehand)
/// - `[OPTIONAL] remote_uri` (STRING; default `qemu://%{host}/system`):
///   migration target URI, with `%{host}`/`%{hostname}` substituted
/// - `[OPTIONAL] timeout_start`/`timeout_suspend`/`timeout_resume`/
///   `timeout_stop`/`timeout_migrate` (NUMBER; seconds)
#[derive(Debug)]
pub struct ServiceLibvirt {
    base: ResourceBase,
}

impl ServiceLibvirt {
    /// Construct a new libvirt-domain resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("service_libvirt", id, config),
        }
    }

    fn name(&self) -> String {
        self.config().get_or("name", "").to_string()
    }

    fn cached_config_file(&self) -> Option<PathBuf> {
        if !self.config().contains_key("config_file") {
            return None;
        }
        let cache_dir = self.config().get_or(RUNTIME_CACHE_DIR_KEY, "");
        Some(Path::new(cache_dir).join(format!("service_libvirt#{}.config_file.xml", self.id())))
    }

    fn timeout(&self, key: &str, default: u64) -> Result<u64, String> {
        match self.config().get(key) {
            Some(value) => value.parse().map_err(|_| format!("Invalid timeout value ({value})")),
            None => Ok(default),
        }
    }

    fn domain_state(&self) -> Result<String, String> {
        runtime::shell(&["virsh", "domstate", &self.name()])
            .map(|output| output.trim().to_string())
            .map_err(|e| e.to_string())
    }

    fn wait_for_state(&self, target: &str, timeout: u64) -> Result<bool, String> {
        let mut remaining = timeout as i64;
        loop {
            if self.domain_state().as_deref() == Ok(target) {
                return Ok(true);
            }
            remaining -= 1;
            if remaining < 0 {
                return Ok(false);
            }
            sleep(crate::constants::POLL_INTERVAL);
        }
    }
}

impl ResourcePlugin for ServiceLibvirt {
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
        if let Some(source) = self.config().get("config_file") {
            files.push(CacheFile {
                source: PathBuf::from(source),
                destination: cache_dir.join(format!("service_libvirt#{}.config_file.xml", self.id())),
            });
        }
        Ok(files)
    }

    fn start(&mut self) -> Vec<String> {
        if self.status(true, Some(Status::Started)) == Status::Started {
            return Vec::new();
        }

        let result = (|| -> Result<(), String> {
            let timeout = self.timeout("timeout_start", DEFAULT_TIMEOUT_START)?;

            match self.cached_config_file() {
                Some(path) => {
                    let path = path.to_string_lossy().into_owned();
                    runtime::shell(&["virsh", "-q", "create", &path]).map_err(|e| e.to_string())?;
                }
                None => {
                    runtime::shell(&["virsh", "-q", "start", &self.name()]).map_err(|e| e.to_string())?;
                }
            }

            if !self.wait_for_state("running", timeout)? {
                runtime::shell(&["virsh", "-q", "destroy", &self.name()]).ok();
                return Err("Domain did not start".to_string());
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

    fn suspend(&mut self) -> Vec<String> {
        let status = self.status(true, Some(Status::Suspended));
        if status == Status::Suspended {
            return Vec::new();
        }
        if status != Status::Started {
            return vec!["Domain not started".to_string()];
        }

        let result = (|| -> Result<(), String> {
            let timeout = self.timeout("timeout_suspend", DEFAULT_TIMEOUT_SUSPEND)?;
            runtime::shell(&["virsh", "-q", "suspend", &self.name()]).map_err(|e| e.to_string())?;
            if !self.wait_for_state("paused", timeout)? {
                return Err("Domain did not suspend".to_string());
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.set_cached_status(Status::Suspended);
                Vec::new()
            }
            Err(message) => {
                self.set_cached_status(Status::Error);
                vec![message]
            }
        }
    }

    fn resume(&mut self) -> Vec<String> {
        let status = self.status(true, Some(Status::Started));
        if status == Status::Started {
            return Vec::new();
        }
        if status != Status::Suspended {
            return vec!["Domain not suspended".to_string()];
        }

        let result = (|| -> Result<(), String> {
            let timeout = self.timeout("timeout_resume", DEFAULT_TIMEOUT_RESUME)?;
            runtime::shell(&["virsh", "-q", "resume", &self.name()]).map_err(|e| e.to_string())?;
            if !self.wait_for_state("running", timeout)? {
                return Err("Domain did not resume".to_string());
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
            return Vec::new();
        }

        let result = (|| -> Result<(), String> {
            let timeout = self.timeout("timeout_stop", DEFAULT_TIMEOUT_STOP)?;
            runtime::shell(&["virsh", "-q", "shutdown", &self.name()]).map_err(|e| e.to_string())?;
            if !self.wait_for_state("shut off", timeout)? {
                runtime::shell(&["virsh", "-q", "destroy", &self.name()]).ok();
                return Err("Domain did not stop".to_string());
            }
            Ok(())
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

    fn migrate(&mut self, target_host: &str) -> Vec<String> {
        if self.status(true, Some(Status::Started)) != Status::Started {
            return Vec::new();
        }

        let result = (|| -> Result<(), String> {
            let uri = self
                .config()
                .get_or("remote_uri", "qemu://%{host}/system")
                .replace("%{host}", target_host)
                .replace("%{hostname}", target_host);
            let timeout = self.timeout("timeout_migrate", DEFAULT_TIMEOUT_MIGRATE)?;

            let mut command = vec!["virsh".to_string(), "-q".to_string(), "migrate".to_string(), "--live".to_string()];
            if timeout > 0 {
                command.push("--timeout".to_string());
                command.push(timeout.to_string());
                command.push("--timeout-suspend".to_string());
            }
            command.push(self.name());
            command.push(uri);
            let argv: Vec<&str> = command.iter().map(String::as_str).collect();
            runtime::shell(&argv).map_err(|e| e.to_string())
        })();

        match result {
            Ok(()) => {
                self.set_cached_status(Status::Started);
                Vec::new()
            }
            Err(message) => {
                self.status(true, Some(Status::Suspended));
                vec![message]
            }
        }
    }

    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let status = match self.domain_state() {
            Ok(state) if state.is_empty() => Status::Error,
            Ok(state) if state == "shut off" => Status::Stopped,
            Ok(state) if state == "paused" => Status::Suspended,
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
        let domain = ServiceLibvirt::new("vm1".into(), ConfigMap::new());
        assert_eq!(domain.verify().len(), 1);
    }

    #[test]
    fn cache_is_empty_without_config_file() {
        let domain = ServiceLibvirt::new("vm1".into(), ConfigMap::new());
        assert!(domain.cache(Path::new("/tmp")).unwrap().is_empty());
    }

    #[test]
    fn cache_declares_the_config_file_when_present() {
        let mut config = ConfigMap::new();
        config.insert("name", "vm1");
        config.insert("config_file", "/etc/kisc/vm1.xml");
        let domain = ServiceLibvirt::new("vm1".into(), config);
        let files = domain.cache(Path::new("/var/cache/kisc")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source, PathBuf::from("/etc/kisc/vm1.xml"));
    }
}
