//! Cluster configuration: the `[KiSC]` root section plus the host,
//! hostgroup and resource (bootstrap and regular) trees loaded from it.
//!
//! Grounded on `KiSC.Cluster.config.KiscCluster_config`. The dynamic
//! `configparser`-based loader becomes a small hand-rolled INI parser:
//! no crate in the ecosystem preserves option-name case and supports
//! transitive `TYPE=include` sections the way this dialect requires.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::{
    CLUSTER_TYPE_PREFIX, DEFAULT_CACHE_DIR, DEFAULT_GLOBAL_RUNTIME_DIR, DEFAULT_INCLUDE_GLOB,
    DEFAULT_LOCAL_RUNTIME_DIR, INCLUDE_TYPE, RESERVED_HOSTS_KEY, RESERVED_TYPE_KEY, ROOT_SECTION,
    TYPE_CLUSTER_HOST, TYPE_CLUSTER_HOSTGROUP,
};
use crate::error::KiscError;
use crate::resource::cluster_host::ClusterHost;
use crate::resource::cluster_hostgroup::ClusterHostgroup;
use crate::resource::{self, ConfigMap, ResourcePlugin};
use crate::runtime;
use crate::variable::VariableLookup;

/// One `key=value` INI section, with its raw option order preserved
/// (case-preserving, matching `RawConfigParser` with a no-op
/// `optionxform`).
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn to_config_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// Parse an INI-style file body into ordered sections. Blank lines, `#`/
/// `;` comments and leading/trailing whitespace are ignored; `[name]`
/// starts a new section; `key=value` (or `key: value`) adds an option to
/// the current section.
fn parse_ini(body: &str) -> Result<Vec<Section>, KiscError> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for (lineno, raw_line) in body.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('[') {
            let Some(name) = stripped.strip_suffix(']') else {
                return Err(KiscError::Configuration(format!("Invalid section header (line {})", lineno + 1)));
            };
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(Section {
                name: name.to_string(),
                entries: Vec::new(),
            });
            continue;
        }
        let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
            return Err(KiscError::Configuration(format!("Invalid configuration line (line {})", lineno + 1)));
        };
        let Some(section) = current.as_mut() else {
            return Err(KiscError::Configuration(format!(
                "Configuration option outside any section (line {})",
                lineno + 1
            )));
        };
        section.entries.push((key.trim().to_string(), value.trim().to_string()));
    }
    if let Some(section) = current.take() {
        sections.push(section);
    }
    Ok(sections)
}

/// Parse a runtime file's body, which holds exactly one `[id]` section,
/// into its id and configuration/runtime map. Used by the cluster-host
/// and cluster-resource controllers when loading a `.run` file.
pub(crate) fn parse_single_section(body: &str) -> Result<(String, ConfigMap), KiscError> {
    let mut sections = parse_ini(body)?;
    let section = sections
        .pop()
        .ok_or_else(|| KiscError::Configuration("Runtime file has no section".to_string()))?;
    Ok((section.name.clone(), section.to_config_map()))
}

/// The in-memory cluster configuration tree: directories, hosts,
/// hostgroups, and the ordered/indexed bootstrap and regular resource
/// lists.
///
/// Mirrors `KiscCluster_config`'s dual list+dict pattern for resources:
/// a `Vec` preserves load order (lifecycle operations apply resources in
/// configuration order) while a parallel `HashMap` gives O(1) id lookup.
pub struct Configuration {
    config_file: PathBuf,
    cache_dir: PathBuf,
    local_runtime_dir: PathBuf,
    global_runtime_dir: PathBuf,
    kisc: ConfigMap,

    hosts: HashMap<String, ClusterHost>,
    host_order: Vec<String>,
    hostgroups: HashMap<String, ClusterHostgroup>,

    bootstrap_resources: Vec<Box<dyn ResourcePlugin>>,
    bootstrap_index: HashMap<String, usize>,
    resources: Vec<Box<dyn ResourcePlugin>>,
    resource_index: HashMap<String, usize>,
}

impl Configuration {
    /// Load the cluster configuration rooted at `config_file`.
    ///
    /// Errors accumulate rather than abort the load: a malformed section
    /// is skipped (with its error recorded) and loading continues with
    /// the next section or file, matching the original's
    /// `__loadResources` error policy.
    pub fn load(config_file: &Path) -> (Self, Vec<KiscError>) {
        let root_body = match std::fs::read_to_string(config_file) {
            Ok(body) => body,
            Err(source) => {
                let error = KiscError::io(format!("reading {}", config_file.display()), source);
                return (Self::empty(config_file), vec![error]);
            }
        };

        let root_sections = match parse_ini(&root_body) {
            Ok(sections) => sections,
            Err(error) => return (Self::empty(config_file), vec![error]),
        };

        let mut kisc = ConfigMap::new();
        if let Some(root) = root_sections.iter().find(|s| s.name == ROOT_SECTION) {
            kisc = root.to_config_map();
        }

        let cache_dir = PathBuf::from(kisc.get_or("cache_dir", DEFAULT_CACHE_DIR));
        let local_runtime_dir = PathBuf::from(kisc.get_or("local_runtime_dir", DEFAULT_LOCAL_RUNTIME_DIR));
        let global_runtime_dir = PathBuf::from(kisc.get_or("global_runtime_dir", DEFAULT_GLOBAL_RUNTIME_DIR));
        kisc.insert("config_file", config_file.to_string_lossy().into_owned());
        kisc.insert("cache_dir", cache_dir.to_string_lossy().into_owned());
        kisc.insert("local_runtime_dir", local_runtime_dir.to_string_lossy().into_owned());
        kisc.insert("global_runtime_dir", global_runtime_dir.to_string_lossy().into_owned());

        let mut errors = Vec::new();
        if let Err(source) = std::fs::create_dir_all(&cache_dir) {
            errors.push(KiscError::io(format!("creating {}", cache_dir.display()), source));
        }
        if let Err(source) = std::fs::create_dir_all(&local_runtime_dir) {
            errors.push(KiscError::io(format!("creating {}", local_runtime_dir.display()), source));
        }

        let mut config = Self {
            config_file: config_file.to_path_buf(),
            cache_dir,
            local_runtime_dir,
            global_runtime_dir,
            kisc,
            hosts: HashMap::new(),
            host_order: Vec::new(),
            hostgroups: HashMap::new(),
            bootstrap_resources: Vec::new(),
            bootstrap_index: HashMap::new(),
            resources: Vec::new(),
            resource_index: HashMap::new(),
        };

        let load_errors = config.load_resources(config_file, true, true);
        errors.extend(load_errors);
        (config, errors)
    }

    fn empty(config_file: &Path) -> Self {
        Self {
            config_file: config_file.to_path_buf(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            local_runtime_dir: PathBuf::from(DEFAULT_LOCAL_RUNTIME_DIR),
            global_runtime_dir: PathBuf::from(DEFAULT_GLOBAL_RUNTIME_DIR),
            kisc: ConfigMap::new(),
            hosts: HashMap::new(),
            host_order: Vec::new(),
            hostgroups: HashMap::new(),
            bootstrap_resources: Vec::new(),
            bootstrap_index: HashMap::new(),
            resources: Vec::new(),
            resource_index: HashMap::new(),
        }
    }

    /// Recursively load every section of `file`, dispatching `TYPE=include`
    /// sections to nested files/directories and everything else to
    /// resource creation. Every returned error is prefixed with `<file>`.
    fn load_resources(&mut self, file: &Path, bootstrap: bool, autostart: bool) -> Vec<KiscError> {
        debug!(file = %file.display(), bootstrap, autostart, "loading configuration file");
        let mut errors = Vec::new();

        let body = match std::fs::read_to_string(file) {
            Ok(body) => body,
            Err(source) => {
                errors.push(KiscError::io(format!("reading {}", file.display()), source));
                return errors;
            }
        };
        let sections = match parse_ini(&body) {
            Ok(sections) => sections,
            Err(error) => {
                errors.push(error.with_context(&format!("{}", file.display())));
                return errors;
            }
        };

        for section in &sections {
            if section.name == ROOT_SECTION {
                continue;
            }
            let Some(kind) = section.get(RESERVED_TYPE_KEY) else {
                errors.push(KiscError::Configuration(format!(
                    "{} [{}] Invalid configuration section; missing \"TYPE\" parameter",
                    file.display(),
                    section.name
                )));
                continue;
            };

            if kind == INCLUDE_TYPE {
                let sub_bootstrap = section.get("BOOTSTRAP").map(runtime::parse_bool).unwrap_or(bootstrap);
                let sub_autostart = section.get("AUTOSTART").map(runtime::parse_bool).unwrap_or(autostart);
                for included in self.include_targets(file, section) {
                    match included {
                        Ok(path) => {
                            let sub_errors = self.load_resources(&path, sub_bootstrap, sub_autostart);
                            errors.extend(sub_errors);
                        }
                        Err(error) => errors.push(error.with_context(&format!("{}", file.display()))),
                    }
                }
                continue;
            }

            let config = section.to_config_map();
            let result = if bootstrap {
                self.create_resource_bootstrap(kind, &section.name, config, autostart)
            } else {
                self.create_resource(kind, &section.name, config)
            };
            if let Err(error) = result {
                errors.push(error.with_context(&format!("{}", file.display())));
            }
        }
        errors
    }

    /// Resolve a `TYPE=include` section into the file(s) it refers to:
    /// either a single `file=`, or every `glob=` (default `*.cfg`) match
    /// under `directory=`.
    fn include_targets(&self, file: &Path, section: &Section) -> Vec<Result<PathBuf, KiscError>> {
        let base = file.parent().unwrap_or_else(|| Path::new("."));

        if let Some(included) = section.get("file") {
            let path = base.join(included);
            return vec![Ok(path)];
        }

        if let Some(directory) = section.get("directory") {
            let glob_pattern = section.get("glob").unwrap_or(DEFAULT_INCLUDE_GLOB);
            let dir = base.join(directory);
            return match glob_dir(&dir, glob_pattern) {
                Ok(paths) => paths.into_iter().map(Ok).collect(),
                Err(error) => vec![Err(error)],
            };
        }

        vec![Err(KiscError::Configuration(format!(
            "[{}] Invalid include section; missing \"file\" or \"directory\" parameter",
            section.name
        )))]
    }

    fn create_resource_bootstrap(&mut self, kind: &str, id: &str, config: ConfigMap, autostart: bool) -> Result<(), KiscError> {
        debug!(kind, id, "creating bootstrap resource");

        if kind == TYPE_CLUSTER_HOST {
            if self.hosts.contains_key(id) {
                return Err(KiscError::Configuration(format!("[{id}] Host with same ID already exists")));
            }
            let host = ClusterHost::new(id.to_string(), config);
            let errors = host.verify();
            if !errors.is_empty() {
                return Err(KiscError::Configuration(format!("[{id}] Invalid resource configuration: {}", errors.join("; "))));
            }
            self.host_order.push(id.to_string());
            self.hosts.insert(id.to_string(), host);
            return Ok(());
        }

        if kind == TYPE_CLUSTER_HOSTGROUP {
            if self.hostgroups.contains_key(id) {
                return Err(KiscError::Configuration(format!("[{id}] Hosts group with same ID already exists")));
            }
            let group = ClusterHostgroup::new(id.to_string(), config);
            let errors = group.verify();
            if !errors.is_empty() {
                return Err(KiscError::Configuration(format!("[{id}] Invalid resource configuration: {}", errors.join("; "))));
            }
            self.hostgroups.insert(id.to_string(), group);
            return Ok(());
        }

        if self.bootstrap_index.contains_key(id) {
            return Err(KiscError::Configuration(format!("[{id}] Resource with same ID already exists")));
        }
        let mut plugin = resource::create(kind, id.to_string(), config)?;
        let verify_errors = plugin.verify();
        if !verify_errors.is_empty() {
            return Err(KiscError::Configuration(format!("[{id}] Invalid resource configuration: {}", verify_errors.join("; "))));
        }
        self.bootstrap_index.insert(id.to_string(), self.bootstrap_resources.len());
        self.bootstrap_resources.push(plugin);

        if autostart {
            let start_errors = self.bootstrap_resources.last_mut().expect("just pushed").start();
            if !start_errors.is_empty() {
                warn!(kind, id, errors = ?start_errors, "bootstrap resource failed to autostart");
                return Err(KiscError::Precondition(format!("[{id}] Failed to start resource: {}", start_errors.join("; "))));
            }
        }
        Ok(())
    }

    fn create_resource(&mut self, kind: &str, id: &str, config: ConfigMap) -> Result<(), KiscError> {
        debug!(kind, id, "creating resource");
        if kind.starts_with(CLUSTER_TYPE_PREFIX) {
            return Err(KiscError::Configuration(format!(
                "[{id}] Invalid resource type ({kind}); \"cluster\" resources can only be defined in bootstrap configuration"
            )));
        }
        if self.resource_index.contains_key(id) {
            return Err(KiscError::Configuration(format!("[{id}] Resource with same ID already exists")));
        }
        let mut plugin = resource::create(kind, id.to_string(), config)?;
        let verify_errors = plugin.verify();
        if !verify_errors.is_empty() {
            return Err(KiscError::Configuration(format!("[{id}] Invalid resource configuration: {}", verify_errors.join("; "))));
        }
        self.resource_index.insert(id.to_string(), self.resources.len());
        self.resources.push(plugin);
        Ok(())
    }

    /// Whether `host_id` is allowed by a `HOSTS=` configuration string:
    /// a comma-separated list of host ids, `@hostgroup` ids, or `@ALL`,
    /// each optionally `!`-negated. Last match wins, with early exit as
    /// soon as a negative match is found (matching the original's
    /// short-circuit on `!`).
    pub fn is_host_allowed(&self, config_hosts: &str, host_id: &str) -> bool {
        let mut allowed = config_hosts.trim_start().starts_with('!');
        for raw_token in config_hosts.split(',') {
            let token = raw_token.trim();
            if token.is_empty() {
                continue;
            }
            let (negate, token) = match token.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            let if_match = !negate;

            if token == "@ALL" {
                allowed = if_match;
                if !if_match {
                    break;
                }
            } else if let Some(group_id) = token.strip_prefix('@') {
                if let Some(group) = self.hostgroups.get(group_id) {
                    if group.hosts_ids().iter().any(|id| id == host_id) {
                        allowed = if_match;
                        if !if_match {
                            break;
                        }
                    }
                }
            } else if token == host_id {
                allowed = if_match;
                if !if_match {
                    break;
                }
            }
        }
        allowed
    }

    /// Whether the given resource (bootstrap or regular) is scoped to
    /// `host_id`: unscoped (no `HOSTS` key) resources match every host.
    pub fn is_host_resource(&self, host_id: &str, resource_id: &str, bootstrap: bool) -> Result<bool, KiscError> {
        let config = self.resource(resource_id, bootstrap)?.config();
        match config.get(RESERVED_HOSTS_KEY) {
            Some(hosts) => Ok(self.is_host_allowed(hosts, host_id)),
            None => Ok(true),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn local_runtime_dir(&self) -> &Path {
        &self.local_runtime_dir
    }

    pub fn global_runtime_dir(&self) -> &Path {
        &self.global_runtime_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn kisc(&self) -> &ConfigMap {
        &self.kisc
    }

    pub fn hosts(&self) -> impl Iterator<Item = &ClusterHost> {
        self.host_order.iter().filter_map(move |id| self.hosts.get(id))
    }

    pub fn hosts_ids(&self) -> &[String] {
        &self.host_order
    }

    pub fn host(&self, host_id: &str) -> Result<&ClusterHost, KiscError> {
        self.hosts.get(host_id).ok_or_else(|| KiscError::Precondition(format!("Host not found ({host_id})")))
    }

    pub fn host_mut(&mut self, host_id: &str) -> Result<&mut ClusterHost, KiscError> {
        self.hosts.get_mut(host_id).ok_or_else(|| KiscError::Precondition(format!("Host not found ({host_id})")))
    }

    /// Find a host by name (hostname or alias); the local hostname when
    /// `hostname` is `None`.
    pub fn host_by_hostname(&self, hostname: Option<&str>) -> Result<&ClusterHost, KiscError> {
        let local;
        let hostname = match hostname {
            Some(name) => name,
            None => {
                local = runtime::local_hostname()?;
                &local
            }
        };
        self.host_order
            .iter()
            .filter_map(|id| self.hosts.get(id))
            .find(|host| host.hostname() == hostname || host.aliases().iter().any(|alias| alias == hostname))
            .ok_or_else(|| KiscError::Precondition(format!("Host (name) not found ({hostname})")))
    }

    pub fn hostgroup(&self, hostgroup_id: &str) -> Result<&ClusterHostgroup, KiscError> {
        self.hostgroups
            .get(hostgroup_id)
            .ok_or_else(|| KiscError::Precondition(format!("Host group not found ({hostgroup_id})")))
    }

    /// All resources, ordered as per the configuration file(s). Resource
    /// ids are not guaranteed unique across scopes.
    pub fn resources(&self, bootstrap: bool) -> &[Box<dyn ResourcePlugin>] {
        if bootstrap {
            &self.bootstrap_resources
        } else {
            &self.resources
        }
    }

    pub fn resources_ids(&self, bootstrap: bool) -> Vec<String> {
        self.resources(bootstrap).iter().map(|r| r.id().to_string()).collect()
    }

    pub fn resource(&self, resource_id: &str, bootstrap: bool) -> Result<&dyn ResourcePlugin, KiscError> {
        let (list, index) = if bootstrap {
            (&self.bootstrap_resources, &self.bootstrap_index)
        } else {
            (&self.resources, &self.resource_index)
        };
        let position = index
            .get(resource_id)
            .ok_or_else(|| KiscError::Precondition(format!("Resource{} not found ({resource_id})", if bootstrap { " (bootstrap)" } else { "" })))?;
        Ok(list[*position].as_ref())
    }

    pub fn resource_mut(&mut self, resource_id: &str, bootstrap: bool) -> Result<&mut dyn ResourcePlugin, KiscError> {
        let (list, index) = if bootstrap {
            (&mut self.bootstrap_resources, &self.bootstrap_index)
        } else {
            (&mut self.resources, &self.resource_index)
        };
        let position = *index
            .get(resource_id)
            .ok_or_else(|| KiscError::Precondition(format!("Resource{} not found ({resource_id})", if bootstrap { " (bootstrap)" } else { "" })))?;
        Ok(list[position].as_mut())
    }

    /// Render the whole tree the way the original's `toString()` does:
    /// `[KiSC]` config, then hosts, hostgroups, bootstrap resources,
    /// regular resources, each as `[id]` + rendered config.
    pub fn to_string_tree(&self, include_runtime: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!("[{ROOT_SECTION}]\n"));
        out.push_str(&self.kisc.render(false));
        for host_id in &self.host_order {
            if let Some(host) = self.hosts.get(host_id) {
                out.push('\n');
                out.push_str(&host.to_section(include_runtime));
            }
        }
        let mut group_ids: Vec<&String> = self.hostgroups.keys().collect();
        group_ids.sort();
        for id in group_ids {
            out.push('\n');
            out.push_str(&self.hostgroups[id].to_section(include_runtime));
        }
        for resource in &self.bootstrap_resources {
            out.push('\n');
            out.push_str(&resource.to_section(include_runtime));
        }
        for resource in &self.resources {
            out.push('\n');
            out.push_str(&resource.to_section(include_runtime));
        }
        out
    }
}

impl VariableLookup for Configuration {
    fn kisc(&self) -> &ConfigMap {
        &self.kisc
    }

    fn resource(&self, id: &str) -> Option<&ConfigMap> {
        if let Some(host) = self.hosts.get(id) {
            return Some(host.config());
        }
        if let Some(group) = self.hostgroups.get(id) {
            return Some(group.config());
        }
        if let Some(position) = self.resource_index.get(id) {
            return Some(self.resources[*position].config());
        }
        if let Some(position) = self.bootstrap_index.get(id) {
            return Some(self.bootstrap_resources[*position].config());
        }
        None
    }
}

/// Match `pattern` (a single-level glob: `*`/`?`/literal) against every
/// file directly inside `dir`, sorted for deterministic load order.
fn glob_dir(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, KiscError> {
    let regex = glob_to_regex(pattern);
    let mut matches = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|source| KiscError::io(format!("reading {}", dir.display()), source))?;
    for entry in entries {
        let entry = entry.map_err(|source| KiscError::io(format!("reading {}", dir.display()), source))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if regex.is_match(&name) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

fn glob_to_regex(pattern: &str) -> regex::Regex {
    let mut out = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    regex::Regex::new(&out).expect("valid generated regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_host_and_bootstrap_resource() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(
            dir.path(),
            "kisc.cfg",
            "[KiSC]\n\
             cache_dir=/tmp/kisc-cache\n\
             \n\
             [host1]\n\
             TYPE=cluster_host\n\
             hostname=host1.example.com\n\
             \n\
             [disk1]\n\
             TYPE=storage_mount\n\
             fstype=ext4\n\
             device=/dev/sda1\n\
             mountpoint=/mnt/disk1\n",
        );

        let (config, errors) = Configuration::load(&config_path);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(config.hosts_ids(), &["host1".to_string()]);
        assert!(config.host("host1").is_ok());
        assert_eq!(config.resources_ids(true), vec!["disk1".to_string()]);
    }

    #[test]
    fn missing_type_is_a_recorded_error_not_a_fatal_one() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(dir.path(), "kisc.cfg", "[KiSC]\n\n[broken]\nfoo=bar\n");

        let (config, errors) = Configuration::load(&config_path);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("missing \"TYPE\" parameter"));
        assert!(config.hosts_ids().is_empty());
    }

    #[test]
    fn duplicate_host_id_via_include_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let included = write_file(dir.path(), "extra.cfg", "[host1]\nTYPE=cluster_host\nhostname=h2\n");
        let config_path = write_file(
            dir.path(),
            "kisc.cfg",
            &format!(
                "[KiSC]\n\n[host1]\nTYPE=cluster_host\nhostname=h1\n\n[inc]\nTYPE=include\nfile={}\n",
                included.file_name().unwrap().to_string_lossy()
            ),
        );

        let (_config, errors) = Configuration::load(&config_path);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Host with same ID already exists"));
    }

    #[test]
    fn hosts_expression_honors_negation_and_hostgroups() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_file(
            dir.path(),
            "kisc.cfg",
            "[KiSC]\n\n\
             [web]\nTYPE=cluster_hostgroup\nHOSTS=h1,h2\n\n\
             [h1]\nTYPE=cluster_host\nhostname=h1.example.com\n\n\
             [h2]\nTYPE=cluster_host\nhostname=h2.example.com\n",
        );
        let (config, errors) = Configuration::load(&config_path);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");

        assert!(config.is_host_allowed("@web,!h2", "h1"));
        assert!(!config.is_host_allowed("@web,!h2", "h2"));
        assert!(config.is_host_allowed("@ALL", "anything"));
    }

    #[test]
    fn cluster_resource_outside_bootstrap_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let included = write_file(dir.path(), "regular.cfg", "[bad]\nTYPE=cluster_host\nhostname=x\n");
        let config_path = write_file(
            dir.path(),
            "kisc.cfg",
            &format!(
                "[KiSC]\n\n[inc]\nTYPE=include\nBOOTSTRAP=no\nfile={}\n",
                included.file_name().unwrap().to_string_lossy()
            ),
        );
        let (_config, errors) = Configuration::load(&config_path);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("can only be defined in bootstrap configuration"));
    }
}
