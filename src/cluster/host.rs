//! Cluster-host controller: start/stop/status/registration orchestration
//! for a `cluster_host` resource, backed by a runtime file in the global
//! runtime directory.
//!
//! Grounded on `KiSC.Cluster.host.KiscCluster_host`.
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Configuration;
use crate::constants::TYPE_CLUSTER_HOST;
use crate::resource::ResourcePlugin;
use crate::status::Status;

use super::{delete_runtime_file, read_runtime_file, runtime_path, write_runtime_file};

fn runtime_file(config: &Configuration, host_id: &str) -> PathBuf {
    runtime_path(config.global_runtime_dir(), TYPE_CLUSTER_HOST, host_id)
}

/// Whether the host's runtime/status file exists.
pub fn exists_runtime(config: &Configuration, host_id: &str) -> bool {
    runtime_file(config, host_id).is_file()
}

/// Persist the host's current configuration/runtime map to file.
pub fn save_runtime(config: &mut Configuration, host_id: &str) -> Result<(), String> {
    let path = runtime_file(config, host_id);
    let body = config.host(host_id).map_err(|e| e.to_string())?.to_section(true);
    write_runtime_file(&path, &body).map_err(|e| e.to_string())
}

/// Restore the host's configuration/runtime map from its runtime file.
pub fn load_runtime(config: &mut Configuration, host_id: &str) -> Result<(), String> {
    let path = runtime_file(config, host_id);
    let mut map = read_runtime_file(&path).map_err(|e| e.to_string())?;
    map.insert("TYPE", TYPE_CLUSTER_HOST);
    map.insert("ID", host_id);
    let host = config.host_mut(host_id).map_err(|e| e.to_string())?;
    *host.config_mut() = map;
    Ok(())
}

/// Delete the host's runtime file.
pub fn delete_runtime(config: &Configuration, host_id: &str) -> Result<(), String> {
    delete_runtime_file(&runtime_file(config, host_id)).map_err(|e| e.to_string())
}

/// Start the host: validates it targets this machine (unless virtual),
/// starts its bootstrap resources in configuration order, then starts
/// the host resource itself. Rolls back via a forced [`stop`] on
/// failure.
pub fn start(config: &mut Configuration, host_id: &str) -> Vec<String> {
    info!(host_id, "starting host");
    let mut errors = Vec::new();

    let is_virtual = match config.host(host_id) {
        Ok(h) => h.is_virtual(),
        Err(e) => return vec![e.to_string()],
    };
    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };

    if !is_virtual {
        if host_id != local_id {
            return vec!["Cannot start remote host".to_string()];
        }
    } else {
        let hosts_expr = config.host(host_id).ok().and_then(|h| h.config().get("HOSTS").map(str::to_string));
        if let Some(expr) = hosts_expr
            && !config.is_host_allowed(&expr, &local_id)
        {
            return vec![format!("Local host ({local_id}) not allowed to handle this (virtual) host")];
        }
    }

    if exists_runtime(config, host_id) {
        if let Err(e) = load_runtime(config, host_id) {
            return vec![e];
        }
    } else if let Err(e) = save_runtime(config, host_id) {
        return vec![e];
    }

    if !is_virtual {
        for resource_id in config.resources_ids(true) {
            match config.is_host_resource(host_id, &resource_id, true) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    errors.push(e.to_string());
                    stop(config, host_id, true);
                    return errors;
                }
            }
            let sub_errors = super::resource::start(config, host_id, &resource_id, true, false);
            if !sub_errors.is_empty() {
                errors.extend(sub_errors);
                errors.push(format!("Failed to start host's bootstrap resource ({resource_id})"));
                stop(config, host_id, true);
                return errors;
            }
        }
        if let Err(e) = load_runtime(config, host_id) {
            errors.push(e);
            stop(config, host_id, true);
            return errors;
        }
    }

    let start_errors = match config.host_mut(host_id) {
        Ok(host) => host.start(),
        Err(e) => return vec![e.to_string()],
    };
    if !start_errors.is_empty() {
        errors.extend(start_errors);
        errors.push("Failed to start host resource".to_string());
        stop(config, host_id, true);
        return errors;
    }

    if let Err(e) = save_runtime(config, host_id) {
        errors.push(e);
        stop(config, host_id, true);
        return errors;
    }

    info!(host_id, "host started");
    Vec::new()
}

/// Stop the host: stops its registered regular resources (only under
/// `force`, otherwise refusing if any are running), stops the host
/// resource, then stops non-`PERSISTENT` bootstrap resources in reverse
/// configuration order.
pub fn stop(config: &mut Configuration, host_id: &str, force: bool) -> Vec<String> {
    info!(host_id, force, "stopping host");
    let mut errors = Vec::new();

    let is_virtual = match config.host(host_id) {
        Ok(h) => h.is_virtual(),
        Err(e) => return vec![e.to_string()],
    };
    let local_id = match config.host_by_hostname(None) {
        Ok(h) => h.id().to_string(),
        Err(e) => return vec![e.to_string()],
    };

    if !is_virtual {
        if host_id != local_id {
            return vec!["Cannot stop remote host".to_string()];
        }
    } else {
        let hosts_expr = config.host(host_id).ok().and_then(|h| h.config().get("HOSTS").map(str::to_string));
        if let Some(expr) = hosts_expr
            && !config.is_host_allowed(&expr, &local_id)
        {
            return vec![format!("Local host ({local_id}) not allowed to handle this (virtual) host")];
        }
    }

    let has_runtime = exists_runtime(config, host_id);
    if !has_runtime && !force {
        return vec!["Host not started".to_string()];
    }
    if has_runtime && let Err(e) = load_runtime(config, host_id) {
        return vec![e];
    }

    let registered = config.host(host_id).map(|h| h.resources_ids(false)).unwrap_or_default();
    if !registered.is_empty() {
        if !force {
            return vec!["Resources are running on host".to_string()];
        }
        for resource_id in registered.into_iter().rev() {
            if !matches!(config.is_host_resource(host_id, &resource_id, false), Ok(true)) {
                continue;
            }
            let sub_errors = super::resource::stop(config, host_id, &resource_id, false, force);
            if !sub_errors.is_empty() {
                errors.extend(sub_errors);
                errors.push(format!("Failed to stop host's resource ({resource_id})"));
                return errors;
            }
        }
    }

    let stop_errors = match config.host_mut(host_id) {
        Ok(host) => host.stop(),
        Err(e) => return vec![e.to_string()],
    };
    if !stop_errors.is_empty() {
        if !force {
            errors.extend(stop_errors);
            errors.push("Failed to stop host resource".to_string());
            return errors;
        }
        warn!(host_id, "host resource failed to stop; continuing (forced)");
    }

    if has_runtime && let Err(e) = save_runtime(config, host_id) {
        errors.push(e);
        return errors;
    }

    if !is_virtual {
        let bootstrap_ids = config.host(host_id).map(|h| h.resources_ids(true)).unwrap_or_default();
        for resource_id in bootstrap_ids.into_iter().rev() {
            if !matches!(config.is_host_resource(host_id, &resource_id, true), Ok(true)) {
                continue;
            }
            let persistent = config
                .resource(&resource_id, true)
                .map(|r| crate::runtime::parse_bool(r.config().get_or("PERSISTENT", "no")))
                .unwrap_or(false);
            if persistent {
                continue;
            }
            let sub_errors = super::resource::stop(config, host_id, &resource_id, true, force);
            if !sub_errors.is_empty() {
                errors.extend(sub_errors);
                errors.push(format!("Failed to stop host's bootstrap resource ({resource_id})"));
                return errors;
            }
        }
    }

    if has_runtime {
        let _ = delete_runtime(config, host_id);
    }

    info!(host_id, "host stopped");
    Vec::new()
}

/// Query the host's status. `local` additionally probes the host
/// resource directly (rather than trusting only the runtime file).
pub fn status(config: &mut Configuration, host_id: &str, local: bool, intent: Option<Status>) -> Status {
    let has_runtime = exists_runtime(config, host_id);
    if has_runtime && load_runtime(config, host_id).is_err() {
        return Status::Error;
    }

    if local {
        let host_status = match config.host_mut(host_id) {
            Ok(host) => host.status(true, intent),
            Err(_) => return Status::Error,
        };
        if matches!(host_status, Status::Unknown | Status::Error) {
            return Status::Error;
        }
        if host_status == Status::Stopped {
            Status::Stopped
        } else if has_runtime {
            host_status
        } else {
            Status::Error
        }
    } else if has_runtime {
        match config.host_mut(host_id) {
            Ok(host) => host.status(false, intent),
            Err(_) => Status::Error,
        }
    } else {
        Status::Stopped
    }
}

/// Register `resource_id` as running on `host_id`: books its declared
/// consumables against the host and appends it to `$RESOURCES`/
/// `$BOOTSTRAP`. `check` performs the admission check without mutating
/// anything.
pub fn register_resource(
    config: &mut Configuration,
    host_id: &str,
    resource_id: &str,
    wants: &[(String, i64)],
    bootstrap: bool,
    check: bool,
    oversubscribe: bool,
) -> Vec<String> {
    info!(host_id, resource_id, check, "registering resource");
    if !bootstrap {
        match config.host(host_id) {
            Ok(h) if h.register_to().is_some() => return vec!["Resource registration delegated to other host".to_string()],
            Err(e) => return vec![e.to_string()],
            _ => {}
        }
    }
    if !exists_runtime(config, host_id) {
        return vec!["Host not started".to_string()];
    }
    if let Err(e) = load_runtime(config, host_id) {
        return vec![e];
    }

    let errors = match config.host_mut(host_id) {
        Ok(host) => host.register_resource(resource_id, wants, bootstrap, check, oversubscribe),
        Err(e) => return vec![e.to_string()],
    };
    if !errors.is_empty() || check {
        return errors;
    }

    if let Err(e) = save_runtime(config, host_id) {
        return vec![e];
    }
    Vec::new()
}

/// Unregister `resource_id` from `host_id`, releasing its booked
/// consumables. Idempotent.
pub fn unregister_resource(config: &mut Configuration, host_id: &str, resource_id: &str, wants: &[(String, i64)], bootstrap: bool) -> Vec<String> {
    info!(host_id, resource_id, "unregistering resource");
    if !bootstrap {
        match config.host(host_id) {
            Ok(h) if h.register_to().is_some() => return vec!["Resource registration delegated to other host".to_string()],
            Err(e) => return vec![e.to_string()],
            _ => {}
        }
    }
    if !exists_runtime(config, host_id) {
        return vec!["Host not started".to_string()];
    }
    if let Err(e) = load_runtime(config, host_id) {
        return vec![e];
    }

    let errors = match config.host_mut(host_id) {
        Ok(host) => host.unregister_resource(resource_id, wants, bootstrap),
        Err(e) => return vec![e.to_string()],
    };
    if !errors.is_empty() {
        return errors;
    }

    if let Err(e) = save_runtime(config, host_id) {
        return vec![e];
    }
    Vec::new()
}
