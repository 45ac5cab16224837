//! Cluster-resource controller: start/suspend/resume/stop/migrate/status
//! orchestration for bootstrap and regular resources, backed by a runtime
//! file in the local (bootstrap) or global (regular) runtime directory.
//!
//! Grounded on `KiSC.Cluster.resource.KiscCluster_resource`.
use std::path::PathBuf;

use tracing::info;

use crate::config::Configuration;
use crate::constants::RUNTIME_CACHE_DIR_KEY;
use crate::resource::ResourcePlugin;
use crate::runtime;
use crate::status::Status;
use crate::variable;

use super::host;
use super::{delete_runtime_file, read_runtime_file, runtime_path, write_runtime_file};

fn runtime_dir(config: &Configuration, bootstrap: bool) -> PathBuf {
    if bootstrap {
        config.local_runtime_dir().to_path_buf()
    } else {
        config.global_runtime_dir().to_path_buf()
    }
}

fn runtime_file(config: &Configuration, resource_id: &str, bootstrap: bool) -> Result<PathBuf, String> {
    let kind = config.resource(resource_id, bootstrap).map_err(|e| e.to_string())?.kind().to_string();
    Ok(runtime_path(&runtime_dir(config, bootstrap), &kind, resource_id))
}

/// Whether the resource's runtime/status file exists.
pub fn exists_runtime(config: &Configuration, resource_id: &str, bootstrap: bool) -> bool {
    runtime_file(config, resource_id, bootstrap).map(|p| p.is_file()).unwrap_or(false)
}

/// Persist the resource's current configuration/runtime map to file.
pub fn save_runtime(config: &mut Configuration, resource_id: &str, bootstrap: bool) -> Result<(), String> {
    let path = runtime_file(config, resource_id, bootstrap)?;
    let body = config.resource(resource_id, bootstrap).map_err(|e| e.to_string())?.to_section(true);
    write_runtime_file(&path, &body).map_err(|e| e.to_string())
}

/// Restore the resource's configuration/runtime map from its runtime file.
pub fn load_runtime(config: &mut Configuration, resource_id: &str, bootstrap: bool) -> Result<(), String> {
    let path = runtime_file(config, resource_id, bootstrap)?;
    let mut map = read_runtime_file(&path).map_err(|e| e.to_string())?;
    let kind = config.resource(resource_id, bootstrap).map_err(|e| e.to_string())?.kind().to_string();
    map.insert("TYPE", kind);
    map.insert("ID", resource_id);
    let resource = config.resource_mut(resource_id, bootstrap).map_err(|e| e.to_string())?;
    *resource.config_mut() = map;
    Ok(())
}

/// Delete the resource's runtime file.
pub fn delete_runtime(config: &Configuration, resource_id: &str, bootstrap: bool) -> Result<(), String> {
    delete_runtime_file(&runtime_file(config, resource_id, bootstrap)?).map_err(|e| e.to_string())
}

fn consumes(config: &Configuration, resource_id: &str, bootstrap: bool) -> Vec<(String, i64)> {
    config
        .resource(resource_id, bootstrap)
        .ok()
        .map(|r| runtime::parse_dictionary(r.config().get_or("CONSUMES", ""), Some(1)).unwrap_or_default())
        .unwrap_or_default()
}

/// Registration host for `resource_id`: `host_id` itself, unless the host
/// delegates registration to a virtual host, which must itself be
/// started.
fn registration_host(config: &mut Configuration, host_id: &str, bootstrap: bool) -> Result<String, String> {
    if bootstrap {
        return Ok(host_id.to_string());
    }
    let register_to = config.host(host_id).map_err(|e| e.to_string())?.register_to();
    match register_to {
        None => Ok(host_id.to_string()),
        Some(target) => {
            let is_virtual = config.host(&target).map_err(|e| e.to_string())?.is_virtual();
            if !is_virtual {
                return Err("Host may not delegate registration to a non-virtual host".to_string());
            }
            if host::status(config, &target, true, Some(Status::Started)) != Status::Started {
                return Err("Registration host not started".to_string());
            }
            Ok(target)
        }
    }
}

/// Query the resource's status. `local` additionally probes the
/// resource directly, falling back to the runtime file's recorded
/// status otherwise. Re-saves the runtime file on a status change
/// unless `intent` is [`Status::Stopped`].
pub fn status(config: &mut Configuration, resource_id: &str, bootstrap: bool, local: bool, intent: Option<Status>) -> Status {
    let has_runtime = exists_runtime(config, resource_id, bootstrap);
    if has_runtime && load_runtime(config, resource_id, bootstrap).is_err() {
        return Status::Error;
    }

    if local {
        let resource_status = match config.resource_mut(resource_id, bootstrap) {
            Ok(resource) => resource.status(true, intent),
            Err(_) => return Status::Error,
        };
        if matches!(resource_status, Status::Unknown | Status::Error) {
            return Status::Error;
        }
        if resource_status == Status::Stopped {
            return Status::Stopped;
        }
        if !has_runtime {
            return Status::Error;
        }
        if intent != Some(Status::Stopped) {
            let _ = save_runtime(config, resource_id, bootstrap);
        }
        resource_status
    } else if has_runtime {
        match config.resource_mut(resource_id, bootstrap) {
            Ok(resource) => resource.status(false, intent),
            Err(_) => Status::Error,
        }
    } else {
        Status::Stopped
    }
}

/// Start the resource on `host_id`: checks admission (host started,
/// resource allowed on host, consumables available), caches and resolves
/// its variable-templated files, runs the plugin's `start()`, then books
/// its registration against the (possibly delegated) registration host.
/// Rolls back via a forced [`stop`] past the caching step.
pub fn start(config: &mut Configuration, host_id: &str, resource_id: &str, bootstrap: bool, force: bool) -> Vec<String> {
    info!(resource_id, host_id, bootstrap, "starting resource");
    let mut errors = Vec::new();

    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };
    if host_id != local_id {
        return vec!["Cannot start resource on remote host".to_string()];
    }

    if !bootstrap && host::status(config, host_id, true, Some(Status::Started)) != Status::Started {
        return vec!["Host not started".to_string()];
    }

    if !bootstrap {
        let current = status(config, resource_id, false, false, Some(Status::Started));
        if current == Status::Started {
            return Vec::new();
        }
        if current != Status::Stopped {
            return vec!["Resource not stopped".to_string()];
        }
    }

    match config.is_host_resource(host_id, resource_id, bootstrap) {
        Ok(true) => {}
        Ok(false) => return vec!["Resource is not allowed to run on host".to_string()],
        Err(e) => return vec![e.to_string()],
    }

    let registration_host_id = match registration_host(config, host_id, bootstrap) {
        Ok(id) => id,
        Err(e) => return vec![e],
    };

    let wants = consumes(config, resource_id, bootstrap);
    if !wants.is_empty() {
        let check_errors = host::register_resource(config, &registration_host_id, resource_id, &wants, bootstrap, true, force);
        if !check_errors.is_empty() {
            errors.extend(check_errors);
            errors.push("Host's resources registration check failed".to_string());
            return errors;
        }
    }

    let cache_dir = config.cache_dir().to_path_buf();
    let cache_files = match config.resource(resource_id, bootstrap) {
        Ok(resource) => match resource.cache(&cache_dir) {
            Ok(files) => files,
            Err(sub_errors) => {
                errors.extend(sub_errors);
                errors.push("Failed to cache resource internals".to_string());
                return errors;
            }
        },
        Err(e) => return vec![e.to_string()],
    };

    for file in &cache_files {
        let host_config = config.host(&registration_host_id).ok().map(|h| h.config().clone());
        let resource_config = config.resource(resource_id, bootstrap).ok().map(|r| r.config().clone());
        let resolved = variable::resolve_file(&file.source, &file.destination, &*config, host_config.as_ref(), resource_config.as_ref(), None);
        if let Err(e) = resolved {
            errors.push(e.to_string());
            errors.push("Failed to cache resource internals".to_string());
            return errors;
        }
    }

    if let Ok(resource) = config.resource_mut(resource_id, bootstrap) {
        resource.config_mut().insert(RUNTIME_CACHE_DIR_KEY, cache_dir.display().to_string());
    }

    // Past this point a failure unwinds via a forced stop.
    let start_errors = match config.resource_mut(resource_id, bootstrap) {
        Ok(resource) => resource.start(),
        Err(e) => return vec![e.to_string()],
    };
    if !start_errors.is_empty() {
        errors.extend(start_errors);
        errors.push("Failed to start resource".to_string());
        stop(config, host_id, resource_id, bootstrap, true);
        return errors;
    }

    let register_errors = host::register_resource(config, &registration_host_id, resource_id, &wants, bootstrap, false, force);
    if !register_errors.is_empty() {
        errors.extend(register_errors);
        errors.push("Failed to register to the host's resources".to_string());
        stop(config, host_id, resource_id, bootstrap, true);
        return errors;
    }

    let register_host_result = config.resource_mut(resource_id, bootstrap).and_then(|r| r.register_host(&registration_host_id));
    if let Err(e) = register_host_result {
        errors.push(e.to_string());
        errors.push("Failed to register the resource's host".to_string());
        stop(config, host_id, resource_id, bootstrap, true);
        return errors;
    }

    if let Err(e) = save_runtime(config, resource_id, bootstrap) {
        errors.push(e);
        stop(config, host_id, resource_id, bootstrap, true);
        return errors;
    }

    info!(resource_id, "resource started");
    Vec::new()
}

/// Suspend a started, non-bootstrap resource in place.
pub fn suspend(config: &mut Configuration, host_id: &str, resource_id: &str) -> Vec<String> {
    info!(resource_id, host_id, "suspending resource");
    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };
    if host_id != local_id {
        return vec!["Cannot suspend resource on remote host".to_string()];
    }
    if host::status(config, host_id, true, Some(Status::Started)) != Status::Started {
        return vec!["Host not started".to_string()];
    }
    let current = status(config, resource_id, false, true, Some(Status::Suspended));
    if current == Status::Suspended {
        return Vec::new();
    }
    if current != Status::Started {
        return vec!["Resource not started (locally)".to_string()];
    }

    let suspend_errors = match config.resource_mut(resource_id, false) {
        Ok(resource) => resource.suspend(),
        Err(e) => return vec![e.to_string()],
    };
    if !suspend_errors.is_empty() {
        let mut errors = suspend_errors;
        errors.push("Failed to suspend resource".to_string());
        return errors;
    }

    if let Err(e) = save_runtime(config, resource_id, false) {
        return vec![e];
    }
    Vec::new()
}

/// Resume a suspended resource.
pub fn resume(config: &mut Configuration, host_id: &str, resource_id: &str) -> Vec<String> {
    info!(resource_id, host_id, "resuming resource");
    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };
    if host_id != local_id {
        return vec!["Cannot resume resource on remote host".to_string()];
    }
    if host::status(config, host_id, true, Some(Status::Started)) != Status::Started {
        return vec!["Host not started".to_string()];
    }
    let current = status(config, resource_id, false, true, Some(Status::Started));
    if current == Status::Started {
        return Vec::new();
    }
    if current != Status::Suspended {
        return vec!["Resource not suspended (locally)".to_string()];
    }

    let resume_errors = match config.resource_mut(resource_id, false) {
        Ok(resource) => resource.resume(),
        Err(e) => return vec![e.to_string()],
    };
    if !resume_errors.is_empty() {
        let mut errors = resume_errors;
        errors.push("Failed to resume resource".to_string());
        return errors;
    }

    if let Err(e) = save_runtime(config, resource_id, false) {
        return vec![e];
    }
    Vec::new()
}

/// Stop the resource: runs the plugin's `stop()` (errors swallowed under
/// `force`), unregisters it from its registration host, then deletes its
/// runtime file.
pub fn stop(config: &mut Configuration, host_id: &str, resource_id: &str, bootstrap: bool, force: bool) -> Vec<String> {
    info!(resource_id, host_id, bootstrap, force, "stopping resource");
    let mut errors = Vec::new();

    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };
    if host_id != local_id {
        return vec!["Cannot stop resource on remote host".to_string()];
    }

    if !bootstrap && host::status(config, host_id, true, Some(Status::Started)) != Status::Started && !force {
        return vec!["Host not started".to_string()];
    }

    let current = status(config, resource_id, bootstrap, true, Some(Status::Stopped));
    if current == Status::Stopped && !force {
        return Vec::new();
    }

    let registration_host_id = match registration_host(config, host_id, bootstrap) {
        Ok(id) => id,
        Err(e) if force => {
            errors.push(e);
            host_id.to_string()
        }
        Err(e) => return vec![e],
    };

    let stop_errors = match config.resource_mut(resource_id, bootstrap) {
        Ok(resource) => resource.stop(),
        Err(e) if force => {
            errors.push(e.to_string());
            Vec::new()
        }
        Err(e) => return vec![e.to_string()],
    };
    if !stop_errors.is_empty() {
        if !force {
            errors.extend(stop_errors);
            errors.push("Failed to stop resource".to_string());
            return errors;
        }
        errors.extend(stop_errors);
    }

    if let Ok(resource) = config.resource_mut(resource_id, bootstrap) {
        resource.unregister_host(&registration_host_id);
    }

    let wants = consumes(config, resource_id, bootstrap);
    let unregister_errors = host::unregister_resource(config, &registration_host_id, resource_id, &wants, bootstrap);
    if !unregister_errors.is_empty() {
        if !force {
            errors.extend(unregister_errors);
            errors.push("Failed to unregister from the host's resources".to_string());
            return errors;
        }
        errors.extend(unregister_errors);
    }

    if exists_runtime(config, resource_id, bootstrap) {
        let _ = delete_runtime(config, resource_id, bootstrap);
    }

    info!(resource_id, "resource stopped");
    errors
}

/// Migrate a started, non-bootstrap resource from `host_id` to
/// `target_host_id`. Switches consumables registration from the local
/// (possibly delegated) registration host to the remote one only if they
/// differ. Rolls back via a forced [`stop`] on the local host on failure.
pub fn migrate(config: &mut Configuration, host_id: &str, target_host_id: &str, resource_id: &str, force: bool) -> Vec<String> {
    info!(resource_id, host_id, target_host_id, "migrating resource");
    let mut errors = Vec::new();

    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };
    if host_id != local_id {
        return vec!["Cannot migrate resource from remote host".to_string()];
    }
    if host_id == target_host_id {
        return vec!["Cannot migrate resource from/to same host".to_string()];
    }
    if host::status(config, host_id, true, Some(Status::Started)) != Status::Started {
        return vec!["Local host not started".to_string()];
    }

    let current = status(config, resource_id, false, true, Some(Status::Started));
    if current != Status::Started {
        return vec!["Resource not started (locally)".to_string()];
    }

    match config.is_host_resource(target_host_id, resource_id, false) {
        Ok(true) => {}
        Ok(false) => return vec!["Resource is not allowed to run on remote host".to_string()],
        Err(e) => return vec![e.to_string()],
    }
    if host::status(config, target_host_id, false, Some(Status::Started)) != Status::Started {
        return vec!["Remote host not started".to_string()];
    }

    let local_registration_id = match registration_host(config, host_id, false) {
        Ok(id) => id,
        Err(e) => return vec![e],
    };
    let remote_registration_id = match registration_host(config, target_host_id, false) {
        Ok(id) => id,
        Err(e) => return vec![e],
    };
    let switch_registration = remote_registration_id != local_registration_id;

    let wants = consumes(config, resource_id, false);
    if switch_registration && !wants.is_empty() {
        let check_errors = host::register_resource(config, &remote_registration_id, resource_id, &wants, false, true, force);
        if !check_errors.is_empty() {
            errors.extend(check_errors);
            errors.push("Remote host's resources registration check failed".to_string());
            return errors;
        }
    }

    let migrate_errors = match config.resource_mut(resource_id, false) {
        Ok(resource) => resource.migrate(target_host_id),
        Err(e) => return vec![e.to_string()],
    };
    if !migrate_errors.is_empty() {
        errors.extend(migrate_errors);
        errors.push("Failed to migrate resource".to_string());
        stop(config, host_id, resource_id, false, true);
        return errors;
    }

    if switch_registration {
        if let Ok(resource) = config.resource_mut(resource_id, false) {
            resource.unregister_host(&local_registration_id);
        }
        let unregister_errors = host::unregister_resource(config, &local_registration_id, resource_id, &wants, false);
        if !unregister_errors.is_empty() {
            errors.extend(unregister_errors);
            errors.push("Failed to unregister from the local host's resources".to_string());
            stop(config, host_id, resource_id, false, true);
            return errors;
        }
        let register_errors = host::register_resource(config, &remote_registration_id, resource_id, &wants, false, false, force);
        if !register_errors.is_empty() {
            errors.extend(register_errors);
            errors.push("Failed to register to the remote host's resources".to_string());
            stop(config, host_id, resource_id, false, true);
            return errors;
        }
        let register_host_result = config.resource_mut(resource_id, false).and_then(|r| r.register_host(&remote_registration_id));
        if let Err(e) = register_host_result {
            errors.push(e.to_string());
            errors.push("Failed to register the resource's remote host".to_string());
            stop(config, host_id, resource_id, false, true);
            return errors;
        }
    }

    if let Err(e) = save_runtime(config, resource_id, false) {
        errors.push(e);
        return errors;
    }

    info!(resource_id, target_host_id, "resource migrated");
    Vec::new()
}
