//! Small runtime utilities shared by the configuration loader, the
//! variable resolver and the resource plugins: shell invocation, file
//! permission application, and the handful of value parsers
//! (`bool`, comma-separated list, `key:value` dictionary) used
//! throughout configuration values.
//!
//! These are free functions rather than a process-global context: per the
//! design notes, cluster state lives on `Configuration`/`Host`/`Resource`
//! objects, not behind a module-level singleton.
use std::io;
use std::process::Command;

use crate::error::KiscError;

/// Parse a boolean-ish configuration value. Recognizes `true`/`yes`/`on`/`1`
/// (case-insensitively) as true; everything else, including unrecognized
/// strings, is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

/// Parse a comma-separated list, trimming whitespace and skipping empty
/// entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a `key:value,key:value` dictionary. An entry with no `:` uses the
/// whole entry as the key and `default_value` as its value, when given.
pub fn parse_dictionary(
    value: &str,
    default_value: Option<i64>,
) -> Result<Vec<(String, i64)>, KiscError> {
    let mut entries = Vec::new();
    for raw_entry in value.split(',') {
        let entry = raw_entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((key, raw_value)) => {
                let key = key.trim().to_string();
                let parsed: i64 = raw_value.trim().parse().map_err(|_| {
                    KiscError::Configuration(format!(
                        "Invalid dictionary entry value ({entry})"
                    ))
                })?;
                entries.push((key, parsed));
            }
            None => match default_value {
                Some(default) => entries.push((entry.to_string(), default)),
                None => {
                    return Err(KiscError::Configuration(format!(
                        "Invalid dictionary entry; missing ':' ({entry})"
                    )));
                }
            },
        }
    }
    Ok(entries)
}

/// Run a shell command, failing if it exits non-zero.
///
/// Unlike the original Python `shell()` helper (which overloads an
/// `OSError`'s `errno`/`filename` fields to carry the return code and
/// pipe-stage index), failures are reported through a proper
/// [`KiscError::Plugin`] variant carrying the command, its exit code and
/// captured stderr.
pub fn shell(argv: &[&str]) -> Result<String, KiscError> {
    if argv.is_empty() {
        return Err(KiscError::Fatal("shell() called with no command".into()));
    }
    let output = Command::new(argv[0])
        .args(&argv[1..])
        .output()
        .map_err(|source| KiscError::io(format!("Failed to execute '{}'", argv[0]), source))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KiscError::Plugin(format!(
            "Command failed ({}): {} ({})",
            argv.join(" "),
            output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signalled".into()),
            stderr.trim(),
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `content` to a sysfs-style file (used by the bond/bridge network
/// plugins to set device parameters).
pub fn echo(content: &str, path: &str) -> Result<(), KiscError> {
    std::fs::write(path, content).map_err(|source| KiscError::io(format!("Failed to write {path}"), source))
}

/// Resolve a user name or numeric uid string to a uid.
#[cfg(unix)]
pub fn resolve_user(user: &str) -> Result<nix::unistd::Uid, KiscError> {
    if let Ok(uid) = user.parse::<u32>() {
        return Ok(nix::unistd::Uid::from_raw(uid));
    }
    nix::unistd::User::from_name(user)
        .map_err(|source| KiscError::io(format!("Failed to look up user '{user}'"), source.into()))?
        .map(|u| u.uid)
        .ok_or_else(|| KiscError::Configuration(format!("Unknown user '{user}'")))
}

/// Apply ownership and/or mode to a path, mirroring the original `perms()`
/// helper. `user`/`group` accept either a name or a numeric id string.
pub fn perms(
    path: &std::path::Path,
    user: Option<&str>,
    group: Option<&str>,
    mode: Option<u32>,
) -> Result<(), KiscError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if user.is_some() || group.is_some() {
            let uid = user.map(resolve_user).transpose()?;
            let gid = group
                .map(|g| {
                    if let Ok(gid) = g.parse::<u32>() {
                        Ok(nix::unistd::Gid::from_raw(gid))
                    } else {
                        nix::unistd::Group::from_name(g)
                            .map_err(|source| {
                                KiscError::io(format!("Failed to look up group '{g}'"), source.into())
                            })?
                            .map(|g| g.gid)
                            .ok_or_else(|| KiscError::Configuration(format!("Unknown group '{g}'")))
                    }
                })
                .transpose()?;
            nix::unistd::chown(path, uid, gid)
                .map_err(|errno| KiscError::io(format!("Failed to chown {}", path.display()), io::Error::from(errno)))?;
        }

        if let Some(mode) = mode {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .map_err(|source| KiscError::io(format!("Failed to chmod {}", path.display()), source))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, user, group, mode);
    }
    Ok(())
}

/// The local machine's hostname, as matched against `cluster_host`
/// `hostname`/`aliases` configuration to decide whether a lifecycle
/// operation targets this machine.
#[cfg(unix)]
pub fn local_hostname() -> Result<String, KiscError> {
    let name = nix::unistd::gethostname().map_err(|errno| KiscError::io("Failed to read local hostname", io::Error::from(errno)))?;
    Ok(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_truthy_spellings() {
        for value in ["true", "YES", "On", "1"] {
            assert!(parse_bool(value), "{value} should be truthy");
        }
        for value in ["false", "no", "0", "garbage", ""] {
            assert!(!parse_bool(value), "{value} should be falsy");
        }
    }

    #[test]
    fn parse_list_trims_and_skips_empty_entries() {
        assert_eq!(
            parse_list(" a, b ,,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(parse_list(""), Vec::<String>::new());
    }

    #[test]
    fn parse_dictionary_parses_key_value_pairs() {
        let entries = parse_dictionary("gpu:2, cpu:4", None).unwrap();
        assert_eq!(entries, vec![("gpu".to_string(), 2), ("cpu".to_string(), 4)]);
    }

    #[test]
    fn parse_dictionary_uses_default_value_for_bare_keys() {
        let entries = parse_dictionary("gpu", Some(1)).unwrap();
        assert_eq!(entries, vec![("gpu".to_string(), 1)]);
    }

    #[test]
    fn parse_dictionary_without_default_rejects_bare_keys() {
        assert!(parse_dictionary("gpu", None).is_err());
    }

    #[test]
    fn shell_reports_nonzero_exit_as_plugin_error() {
        let result = shell(&["sh", "-c", "exit 3"]);
        assert!(matches!(result, Err(KiscError::Plugin(_))));
    }

    #[test]
    fn shell_captures_stdout_on_success() {
        let output = shell(&["sh", "-c", "echo hello"]).unwrap();
        assert_eq!(output.trim(), "hello");
    }
}
