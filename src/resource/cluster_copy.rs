//! `cluster_copy`: copy a file into place, optionally substituting
//! cluster variables and running pre/post commands.
//!
//! Grounded on `KiSC.Resource.cluster_copy`.
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::constants::RESTRICTIVE_UMASK;
use crate::resource::{ConfigMap, ResourceBase, ResourcePlugin};
use crate::runtime;
use crate::status::Status;

/// Configuration parameters:
/// - `[REQUIRED] source` (STRING; path)
/// - `[REQUIRED] destination` (STRING; path)
/// - `[OPTIONAL] mkdir` (`*yes|no`): create the destination directory
/// - `[OPTIONAL] user`/`group`/`mode`: destination ownership
/// - `[OPTIONAL] command_pre`/`command_post`: commands run around the copy
///
/// Variable substitution of the copied content (via `config_file`) is
/// performed by the cluster-resource controller before `start()` runs
/// (the controller's "cache declared files" step), not by this plugin —
/// see `cluster::resource::CacheFile` handling.
#[derive(Debug)]
pub struct ClusterCopy {
    base: ResourceBase,
}

impl ClusterCopy {
    /// Construct a new file-copy resource.
    pub fn new(id: String, config: ConfigMap) -> Self {
        Self {
            base: ResourceBase::new("cluster_copy", id, config),
        }
    }
}

impl ResourcePlugin for ClusterCopy {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn verify(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config().get_or("source", "").is_empty() {
            errors.push("Invalid resource configuration; missing \"source\" setting".to_string());
        }
        if self.config().get_or("destination", "").is_empty() {
            errors.push("Invalid resource configuration; missing \"destination\" setting".to_string());
        }
        errors
    }

    fn start(&mut self) -> Vec<String> {
        if self.cached_status() == Status::Started {
            return Vec::new();
        }

        let result = (|| -> Result<(), String> {
            let source = self.config().get_or("source", "").to_string();
            let destination = self.config().get_or("destination", "").to_string();
            let mkdir = runtime::parse_bool(self.config().get_or("mkdir", "yes"));

            if mkdir
                && let Some(parent) = Path::new(&destination).parent()
            {
                fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }

            if let Some(command) = self.config().get("command_pre") {
                let argv: Vec<&str> = command.split(' ').collect();
                runtime::shell(&argv).map_err(|e| e.to_string())?;
            }

            let content = fs::read_to_string(&source).map_err(|e| e.to_string())?;
            let mode = self
                .config()
                .get("mode")
                .map(|m| u32::from_str_radix(m, 8))
                .transpose()
                .map_err(|e| e.to_string())?;

            let previous_umask = unsafe { libc::umask(RESTRICTIVE_UMASK as libc::mode_t) };
            let write_result = fs::write(&destination, &content);
            unsafe {
                libc::umask(previous_umask);
            }
            write_result.map_err(|e| e.to_string())?;

            if let Some(mode) = mode {
                fs::set_permissions(&destination, fs::Permissions::from_mode(mode))
                    .map_err(|e| e.to_string())?;
            }
            runtime::perms(
                Path::new(&destination),
                self.config().get("user"),
                self.config().get("group"),
                None,
            )
            .map_err(|e| e.to_string())?;

            if let Some(command) = self.config().get("command_post") {
                let argv: Vec<&str> = command.split(' ').collect();
                runtime::shell(&argv).map_err(|e| e.to_string())?;
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
        self.set_cached_status(Status::Stopped);
        Vec::new()
    }

    fn status(&mut self, _stateful: bool, _intent: Option<Status>) -> Status {
        self.cached_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn verify_requires_source_and_destination() {
        let copy = ClusterCopy::new("cp1".into(), ConfigMap::new());
        assert_eq!(copy.verify().len(), 2);
    }

    #[test]
    fn start_copies_file_contents() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let destination = dir.path().join("nested").join("destination.txt");
        fs::write(&source, "hello world").unwrap();

        let mut config = ConfigMap::new();
        config.insert("source", source.to_str().unwrap());
        config.insert("destination", destination.to_str().unwrap());
        let mut copy = ClusterCopy::new("cp1".into(), config);

        let errors = copy.start();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(fs::read_to_string(&destination).unwrap(), "hello world");
        assert_eq!(copy.status(false, None), Status::Started);
    }

    #[test]
    fn start_is_idempotent() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let destination = dir.path().join("destination.txt");
        fs::write(&source, "v1").unwrap();

        let mut config = ConfigMap::new();
        config.insert("source", source.to_str().unwrap());
        config.insert("destination", destination.to_str().unwrap());
        let mut copy = ClusterCopy::new("cp1".into(), config);
        assert!(copy.start().is_empty());

        fs::write(&source, "v2").unwrap();
        assert!(copy.start().is_empty());
        // Second start is a no-op because status is already Started.
        assert_eq!(fs::read_to_string(&destination).unwrap(), "v1");
    }
}
