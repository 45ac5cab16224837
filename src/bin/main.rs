use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use kisc::cli::{self, ClusterCommand, Command, ConfigCommand, HostCommand, ResourceCommand, Scope};
use kisc::cluster::{host, resource};
use kisc::config::Configuration;
use kisc::constants::DEFAULT_CONFIG_FILE;
use kisc::status::EXIT_OPERATIONAL_FAILURE;
use kisc::variable;

fn main() -> ExitCode {
    let args = cli::parse_args();
    init_logging(args.verbose);

    let config_file = args.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let (mut config, load_errors) = Configuration::load(&config_file);
    if !load_errors.is_empty() {
        if args.verbose >= 4 {
            for error in &load_errors {
                eprintln!("{error}");
            }
        } else {
            eprintln!("{}", load_errors.last().unwrap());
        }
        return ExitCode::from(255);
    }

    let code = match run(&mut config, &args) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{message}");
            EXIT_OPERATIONAL_FAILURE
        }
    };
    ExitCode::from(code as u8)
}

/// Map `-V/--verbose 0..5` onto a `tracing` filter, per the
/// `VERBOSE_NONE..VERBOSE_TRACE` scale `Cli/host_status.py` documents.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn run(config: &mut Configuration, args: &cli::Cli) -> Result<i32, String> {
    match &args.command {
        Command::Config(command) => run_config(config, args, command),
        Command::Host(command) => run_host(config, args, command),
        Command::Resource(command) => run_resource(config, args, command),
        Command::Cluster(command) => run_cluster(config, args, command),
    }
}

fn run_config(config: &Configuration, args: &cli::Cli, command: &ConfigCommand) -> Result<i32, String> {
    match command {
        ConfigCommand::List { scope, include, exclude } => {
            let include = parse_filters(include);
            let exclude = parse_filters(exclude);
            let has_filters = !include.is_empty() || !exclude.is_empty();
            match scope {
                Scope::Hosts => {
                    let mut ids: Vec<String> = config.hosts_ids().to_vec();
                    ids.sort();
                    for id in ids {
                        let host = config.host(&id).map_err(|e| e.to_string())?;
                        if (!has_filters || matches_filters(host.config(), &include, &exclude)) && !args.silent {
                            println!("{id}");
                        }
                    }
                }
                Scope::Resources => {
                    let mut ids = config.resources_ids(false);
                    ids.sort();
                    for id in ids {
                        let resource = config.resource(&id, false).map_err(|e| e.to_string())?;
                        if (!has_filters || matches_filters(resource.config(), &include, &exclude)) && !args.silent {
                            println!("{id}");
                        }
                    }
                }
            }
            Ok(0)
        }
        ConfigCommand::Show => {
            if !args.silent {
                print!("{}", config.to_string_tree(false));
            }
            Ok(0)
        }
        ConfigCommand::Resolve { input, output } => {
            let host_id = config.host_by_hostname(None).map_err(|e| e.to_string())?.id().to_string();
            resolve(config, input.as_deref(), output.as_deref(), &host_id)?;
            Ok(0)
        }
    }
}

/// Parse a `config list --include/--exclude KEY[=VALUE|~=REGEXP]` filter
/// list into `(key, Option<value-or-regex>)` pairs, per
/// `Cli/config_list.py`'s `_match()`.
fn parse_filters(filters: &[String]) -> Vec<(String, Option<FilterMatch>)> {
    filters
        .iter()
        .map(|filter| match filter.split_once('=') {
            Some((key, value)) if key.ends_with('~') => {
                let key = key.trim_end_matches('~').to_string();
                match regex::Regex::new(value) {
                    Ok(regex) => (key, Some(FilterMatch::Regex(regex))),
                    Err(_) => (key, Some(FilterMatch::Exact(value.to_string()))),
                }
            }
            Some((key, value)) => (key.to_string(), Some(FilterMatch::Exact(value.to_string()))),
            None => (filter.clone(), None),
        })
        .collect()
}

enum FilterMatch {
    Exact(String),
    Regex(regex::Regex),
}

fn matches_filters(config: &kisc::resource::ConfigMap, include: &[(String, Option<FilterMatch>)], exclude: &[(String, Option<FilterMatch>)]) -> bool {
    for (key, filter) in exclude {
        if let Some(value) = config.get(key) {
            match filter {
                None => return false,
                Some(FilterMatch::Exact(expected)) if expected == value => return false,
                Some(FilterMatch::Regex(regex)) if regex.is_match(value) => return false,
                _ => {}
            }
        }
    }
    if include.is_empty() {
        return true;
    }
    for (key, filter) in include {
        let Some(value) = config.get(key) else { continue };
        match filter {
            None => return true,
            Some(FilterMatch::Exact(expected)) if expected == value => return true,
            Some(FilterMatch::Regex(regex)) if regex.is_match(value) => return true,
            _ => {}
        }
    }
    false
}

fn resolve(config: &Configuration, input: Option<&std::path::Path>, output: Option<&std::path::Path>, host_id: &str) -> Result<(), String> {
    let host = config.host(host_id).map_err(|e| e.to_string())?;
    let host_config = host.config().clone();

    let content = match input {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin()).map_err(|e| format!("reading stdin: {e}"))?,
    };
    let resolved = variable::resolve_string(&content, config, Some(&host_config), None).map_err(|e| e.to_string())?;

    match output {
        Some(path) => std::fs::write(path, &resolved).map_err(|e| format!("writing {}: {e}", path.display())),
        None => {
            print!("{resolved}");
            Ok(())
        }
    }
}

fn run_host(config: &mut Configuration, args: &cli::Cli, command: &HostCommand) -> Result<i32, String> {
    match command {
        HostCommand::Start { host } => {
            let host_id = resolve_host_id(config, host.as_deref())?;
            let errors = host::start(config, &host_id);
            report(args, &host_id, host::status(config, &host_id, false, None), "-", &errors)
        }
        HostCommand::Stop { host, force } => {
            let host_id = resolve_host_id(config, host.as_deref())?;
            let errors = host::stop(config, &host_id, *force);
            report(args, &host_id, host::status(config, &host_id, false, None), "-", &errors)
        }
        HostCommand::Status { host, local } => {
            let host_id = resolve_host_id(config, host.as_deref())?;
            let status = host::status(config, &host_id, *local, None);
            let resources = config.host(&host_id).map_err(|e| e.to_string())?.resources_ids(false);
            let register_to = config.host(&host_id).map_err(|e| e.to_string())?.register_to();
            let extra = registration_or_list(register_to, &resources);
            report(args, &host_id, status, &extra, &[])
        }
        HostCommand::List => {
            let host_id = config.host_by_hostname(None).map_err(|e| e.to_string())?.id().to_string();
            if !args.silent {
                println!("{host_id}");
            }
            Ok(0)
        }
    }
}

fn run_resource(config: &mut Configuration, args: &cli::Cli, command: &ResourceCommand) -> Result<i32, String> {
    let host_id = config.host_by_hostname(None).map_err(|e| e.to_string())?.id().to_string();
    match command {
        ResourceCommand::Start { resource, bootstrap, force } => {
            let errors = resource::start(config, &host_id, resource, *bootstrap, *force);
            report(args, resource, resource::status(config, resource, *bootstrap, false, None), "-", &errors)
        }
        ResourceCommand::Suspend { resource } => {
            let errors = resource::suspend(config, &host_id, resource);
            report(args, resource, resource::status(config, resource, false, false, None), "-", &errors)
        }
        ResourceCommand::Resume { resource } => {
            let errors = resource::resume(config, &host_id, resource);
            report(args, resource, resource::status(config, resource, false, false, None), "-", &errors)
        }
        ResourceCommand::Stop { resource, bootstrap, force } => {
            let errors = resource::stop(config, &host_id, resource, *bootstrap, *force);
            report(args, resource, resource::status(config, resource, *bootstrap, false, None), "-", &errors)
        }
        ResourceCommand::Migrate { resource, host, force } => {
            let errors = resource::migrate(config, &host_id, host, resource, *force);
            report(args, resource, resource::status(config, resource, false, false, None), "-", &errors)
        }
        ResourceCommand::Status { resource, bootstrap, local } => {
            let status = resource::status(config, resource, *bootstrap, *local, None);
            let hosts = config.resource(resource, *bootstrap).map_err(|e| e.to_string())?.hosts_ids();
            let extra = if hosts.is_empty() { "-".to_string() } else { hosts.join(",") };
            report(args, resource, status, &extra, &[])
        }
        ResourceCommand::Runtime { resource, bootstrap } => {
            let plugin = config.resource(resource, *bootstrap).map_err(|e| e.to_string())?;
            if !args.silent {
                print!("{}", plugin.to_section(true));
            }
            Ok(0)
        }
        ResourceCommand::List { host, bootstrap } => {
            let target_host_id = match host {
                Some(id) => id.clone(),
                None => host_id,
            };
            let target_host = config.host(&target_host_id).map_err(|e| e.to_string())?;
            let mut ids = target_host.resources_ids(*bootstrap);
            ids.sort();
            if !args.silent {
                for id in ids {
                    println!("{id}");
                }
            }
            Ok(0)
        }
        ResourceCommand::Help { kind } => {
            let plugin = kisc::resource::create(kind, "help".to_string(), kisc::resource::ConfigMap::new()).map_err(|e| e.to_string())?;
            if !args.silent {
                println!("{kind}");
                println!("{:#?}", plugin.config());
            }
            Ok(0)
        }
    }
}

fn run_cluster(config: &mut Configuration, args: &cli::Cli, command: &ClusterCommand) -> Result<i32, String> {
    match command {
        ClusterCommand::Status { scope } => {
            match scope {
                Scope::Hosts => {
                    let mut ids: Vec<String> = config.hosts_ids().to_vec();
                    ids.sort();
                    for id in ids {
                        let status = host::status(config, &id, false, None);
                        let host = config.host(&id).map_err(|e| e.to_string())?;
                        let resources = host.resources_ids(false);
                        let extra = registration_or_list(host.register_to(), &resources);
                        if !args.silent {
                            println!("{id} {status} {extra}");
                        }
                    }
                }
                Scope::Resources => {
                    let mut ids = config.resources_ids(false);
                    ids.sort();
                    for id in ids {
                        let status = resource::status(config, &id, false, false, None);
                        let hosts = config.resource(&id, false).map_err(|e| e.to_string())?.hosts_ids();
                        let extra = if hosts.is_empty() { "-".to_string() } else { hosts.join(",") };
                        if !args.silent {
                            println!("{id} {status} {extra}");
                        }
                    }
                }
            }
            Ok(0)
        }
    }
}

/// `> <delegated-host>` when the host delegates its registration
/// elsewhere, else the comma-joined resource list (or `-` if empty),
/// per `Cli/cluster_status.py`.
fn registration_or_list(register_to: Option<String>, ids: &[String]) -> String {
    match register_to {
        Some(host_id) => format!("> {host_id}"),
        None if ids.is_empty() => "-".to_string(),
        None => ids.join(","),
    }
}

fn resolve_host_id(config: &Configuration, host: Option<&str>) -> Result<String, String> {
    match host {
        Some(id) => Ok(id.to_string()),
        None => config.host_by_hostname(None).map(|h| h.id().to_string()).map_err(|e| e.to_string()),
    }
}

/// Print `"{id} {STATUS} {extra}"` unless `--silent`, and resolve the
/// command's exit code: the last accumulated error if anything failed
/// (printed, exit 255), else the status's own exit code, per
/// `Cli/resource_status.py`.
fn report(args: &cli::Cli, id: &str, status: kisc::status::Status, extra: &str, errors: &[String]) -> Result<i32, String> {
    if !args.silent {
        println!("{id} {status} {extra}");
    }
    if !errors.is_empty() {
        if args.verbose >= 4 {
            for error in errors {
                eprintln!("{error}");
            }
        } else {
            eprintln!("{}", errors.last().unwrap());
        }
        return Ok(EXIT_OPERATIONAL_FAILURE);
    }
    Ok(status.exit_code())
}
