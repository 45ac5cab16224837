//! `storage_mount`: a mounted filesystem.
//!
//! Grounded on `KiSC.Resource.storage_mount`.
use std::fs;

use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] fstype`/`device`/`mountpoint`
/// - `[OPTIONAL] options` (comma-separated mount options)
/// - `[OPTIONAL] mkdir` (`*yes|no`): create the mountpoint directory
#[derive(Debug)]
pub struct StorageMount {
    base: ResourceBase,
}

impl StorageMount {
    /// Construct a new mount resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("storage_mount", id, config),
        }
    }
}

impl ResourcePlugin for StorageMount {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for key in ["fstype", "device", "mountpoint"] {
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

        let mountpoint = self.config().get_or("mountpoint", "").to_string();
        let result = (|| -> Result<(), String> {
            if runtime::parse_bool(self.config().get_or("mkdir", "yes")) {
                fs::create_dir_all(&mountpoint).map_err(|e| e.to_string())?;
            }

            let mut command = vec!["mount".to_string(), "-t".to_string(), self.config().get_or("fstype", "").to_string()];
            if let Some(options) = self.config().get("options") {
                command.push("-o".to_string());
                command.push(options.to_string());
            }
            command.push(self.config().get_or("device", "").to_string());
            command.push(mountpoint);
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

        let mountpoint = self.config().get_or("mountpoint", "").to_string();
        match runtime::shell(&["umount", &mountpoint]) {
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

    /// Matches only the mountpoint, ignoring a potentially mismatching
    /// fstype, device or options, as the original does.
    fn status(&mut self, stateful: bool, _intent: Option<Status>) -> Status {
        if !stateful {
            return self.cached_status();
        }

        let mountpoint = self.config().get_or("mountpoint", "").to_string();
        let status = match fs::read_to_string("/proc/mounts") {
            Ok(contents) => {
                let mounted = contents
                    .lines()
                    .any(|line| line.split_whitespace().nth(1) == Some(mountpoint.as_str()));
                if mounted {
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
    fn verify_requires_fstype_device_mountpoint() {
        let mount = StorageMount::new("mnt1".into(), ConfigMap::new());
        assert_eq!(mount.verify().len(), 3);
    }
}
