//! Constants shared across the configuration loader, controllers and
//! resource plugins.

/// Default cluster configuration file, used when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/kisc/kisc.conf";

/// Name of the root section of a configuration file.
pub const ROOT_SECTION: &str = "KiSC";

/// `TYPE` value that marks a section as a file-inclusion directive rather
/// than a resource declaration.
pub const INCLUDE_TYPE: &str = "include";

/// Prefix that reserves a `TYPE` for bootstrap-only cluster infrastructure
/// resources (`cluster_host`, `cluster_hostgroup`, ...).
pub const CLUSTER_TYPE_PREFIX: &str = "cluster_";

/// The `cluster_host` resource type.
pub const TYPE_CLUSTER_HOST: &str = "cluster_host";

/// The `cluster_hostgroup` resource type.
pub const TYPE_CLUSTER_HOSTGROUP: &str = "cluster_hostgroup";

/// Default glob used by `TYPE=include directory=...` sections when no
/// `glob=` option is given.
pub const DEFAULT_INCLUDE_GLOB: &str = "*.cfg";

/// Default cache directory, used when `[KiSC] cache_dir` is absent.
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/kisc";

/// Default local (host-local, ideally tmpfs) runtime directory.
pub const DEFAULT_LOCAL_RUNTIME_DIR: &str = "/run/kisc";

/// Default global (cluster-shared) runtime directory.
pub const DEFAULT_GLOBAL_RUNTIME_DIR: &str = "/var/lib/kisc/runtime";

/// Extension used for runtime-state files: `<type>:<id>.run`.
pub const RUNTIME_FILE_EXTENSION: &str = "run";

/// Umask applied while creating cache directories and runtime files.
pub const RESTRICTIVE_UMASK: u32 = 0o077;

/// Reserved config keys that are never part of a resource's own settings.
pub const RESERVED_TYPE_KEY: &str = "TYPE";
/// See [`RESERVED_TYPE_KEY`].
pub const RESERVED_ID_KEY: &str = "ID";
/// HOSTS expression key (distinct from the runtime `$HOSTS` registration list).
pub const RESERVED_HOSTS_KEY: &str = "HOSTS";
/// Declared consumable wants, e.g. `CONSUMES=gpu:1`.
pub const RESERVED_CONSUMES_KEY: &str = "CONSUMES";
/// Declared consumable provision (hosts only), e.g. `CONSUMABLES=gpu:2`.
pub const RESERVED_CONSUMABLES_KEY: &str = "CONSUMABLES";
/// Marks a bootstrap resource as surviving a host stop.
pub const RESERVED_PERSISTENT_KEY: &str = "PERSISTENT";

/// Runtime (`$`-prefixed) status key.
pub const RUNTIME_STATUS_KEY: &str = "$STATUS";
/// Runtime key: hosts a resource is registered against.
pub const RUNTIME_HOSTS_KEY: &str = "$HOSTS";
/// Runtime key: regular resources registered against a host.
pub const RUNTIME_RESOURCES_KEY: &str = "$RESOURCES";
/// Runtime key: bootstrap resources registered against a host.
pub const RUNTIME_BOOTSTRAP_KEY: &str = "$BOOTSTRAP";
/// Runtime key: consumables currently booked against a host.
pub const RUNTIME_CONSUMABLES_USED_KEY: &str = "$CONSUMABLES_USED";
/// Runtime key: consumables still available on a host.
pub const RUNTIME_CONSUMABLES_FREE_KEY: &str = "$CONSUMABLES_FREE";
/// Runtime key: cache directory a resource's cached files were written
/// under, set by the cluster-resource controller right after it calls
/// [`crate::resource::ResourcePlugin::cache`], so the plugin's `start()`
/// can recompute the same deterministic cached-file path independently.
pub const RUNTIME_CACHE_DIR_KEY: &str = "$CACHE_DIR";

/// Value meaning "unlimited" for a provided consumable.
pub const UNLIMITED_CONSUMABLE: i64 = -1;

/// Polling interval used by the libvirt/Pacemaker state-polling loops.
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Default number of poll attempts before a libvirt domain-state wait
/// gives up and force-destroys the domain.
pub const DEFAULT_LIBVIRT_TIMEOUT_SECS: u64 = 60;

/// Default number of poll attempts before a Pacemaker node-ownership wait
/// gives up.
pub const DEFAULT_PACEMAKER_TIMEOUT_SECS: u64 = 60;
