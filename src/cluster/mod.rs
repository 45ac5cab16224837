//! Cluster-level controllers: orchestrate host/resource lifecycle calls
//! across [`crate::config::Configuration`] and their on-disk runtime
//! files.
//!
//! Grounded on `KiSC.Cluster.host.KiscCluster_host` and
//! `KiSC.Cluster.resource.KiscCluster_resource`. Both become free
//! functions taking `&mut Configuration` rather than per-call wrapper
//! objects: Rust's borrow checker already enforces the "one mutable
//! view of the cluster state at a time" discipline the original got
//! from always constructing a fresh wrapper object around a shared
//! `_oClusterConfig`.

pub mod host;
pub mod resource;

use std::path::{Path, PathBuf};

use crate::constants::{RESTRICTIVE_UMASK, RUNTIME_FILE_EXTENSION};
use crate::error::KiscError;
use crate::resource::ConfigMap;

/// The runtime-state file path for a `(kind, id)` resource under `dir`:
/// `<dir>/<kind>:<id>.run`.
pub(crate) fn runtime_path(dir: &Path, kind: &str, id: &str) -> PathBuf {
    dir.join(format!("{kind}:{id}.{RUNTIME_FILE_EXTENSION}"))
}

/// Write `body` to `path` under a restrictive umask, creating parent
/// directories first.
pub(crate) fn write_runtime_file(path: &Path, body: &str) -> Result<(), KiscError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| KiscError::io(format!("creating {}", parent.display()), e))?;
    }
    #[cfg(unix)]
    let previous_umask = unsafe { libc::umask(RESTRICTIVE_UMASK as libc::mode_t) };
    let result = std::fs::write(path, body).map_err(|e| KiscError::io(format!("writing {}", path.display()), e));
    #[cfg(unix)]
    unsafe {
        libc::umask(previous_umask);
    }
    result
}

/// Read `path` as a single-section runtime file, returning its parsed
/// configuration/runtime map.
pub(crate) fn read_runtime_file(path: &Path) -> Result<ConfigMap, KiscError> {
    let body = std::fs::read_to_string(path).map_err(|e| KiscError::io(format!("reading {}", path.display()), e))?;
    let (_id, map) = crate::config::parse_single_section(&body)?;
    Ok(map)
}

/// Delete a runtime file if it exists; a no-op otherwise.
pub(crate) fn delete_runtime_file(path: &Path) -> Result<(), KiscError> {
    if path.is_file() {
        std::fs::remove_file(path).map_err(|e| KiscError::io(format!("removing {}", path.display()), e))?;
    }
    Ok(())
}
