//! Command-line interface for `kisc`.
//!
//! Grounded on `original_source/kisc.py` (`KiscCli_kisc`) and its
//! `Cli/*.py` sub-commands: `-C/--config`, `-S/--silent`,
//! `-V/--verbose <0..5>`, `--bootstrap`, `--force`, `--local`, and the
//! positional/optional host and resource id arguments.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// KiSC — daemonless cluster resource manager.
#[derive(Parser)]
#[command(name = "kisc", version, author)]
#[command(about = "K.I.S.S. Cluster resource manager", long_about = None)]
pub struct Cli {
    /// Cluster configuration file (default: [`crate::constants::DEFAULT_CONFIG_FILE`]).
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Standard error verbosity, 0 (silent) through 5 (trace).
    #[arg(short = 'V', long, global = true, default_value_t = 0)]
    pub verbose: u8,

    /// Mute all standard output messages.
    #[arg(short = 'S', long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Which half of the configuration tree a listing/status query covers.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Scope {
    Hosts,
    Resources,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configuration inspection.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Host lifecycle management.
    #[command(subcommand)]
    Host(HostCommand),
    /// Resource lifecycle management.
    #[command(subcommand)]
    Resource(ResourceCommand),
    /// Cluster-wide status overview.
    #[command(subcommand)]
    Cluster(ClusterCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// List host or resource ids, optionally filtered by configuration key.
    List {
        scope: Scope,
        /// Keep only entries matching `KEY=VALUE` (or `KEY~=REGEX`).
        #[arg(long = "include")]
        include: Vec<String>,
        /// Drop entries matching `KEY=VALUE` (or `KEY~=REGEX`).
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Print the whole configuration tree, as loaded.
    Show,
    /// Resolve `%{...}` cluster variables in a file.
    Resolve {
        /// Input file (stdin if omitted).
        input: Option<PathBuf>,
        /// Output file (stdout if omitted).
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum HostCommand {
    /// Start the host (and, if not virtual, its bootstrap resources).
    Start {
        /// Host id (defaults to the local host).
        host: Option<String>,
    },
    /// Stop the host.
    Stop {
        host: Option<String>,
        /// Force, ignoring running resources and plugin errors.
        #[arg(long)]
        force: bool,
    },
    /// Query the host status.
    Status {
        host: Option<String>,
        /// Also probe the host resource directly, not just its runtime file.
        #[arg(long)]
        local: bool,
    },
    /// Print the locally-detected host id.
    List,
}

#[derive(Subcommand)]
pub enum ResourceCommand {
    /// Start the resource.
    Start {
        resource: String,
        #[arg(long)]
        bootstrap: bool,
        #[arg(long)]
        force: bool,
    },
    /// Suspend the (started) resource.
    Suspend { resource: String },
    /// Resume the (suspended) resource.
    Resume { resource: String },
    /// Stop the resource.
    Stop {
        resource: String,
        #[arg(long)]
        bootstrap: bool,
        #[arg(long)]
        force: bool,
    },
    /// Migrate the resource to another host.
    Migrate {
        resource: String,
        /// Target host id.
        host: String,
        #[arg(long)]
        force: bool,
    },
    /// Query the resource status.
    Status {
        resource: String,
        #[arg(long)]
        bootstrap: bool,
        /// Also probe the resource directly, not just its runtime file.
        #[arg(long)]
        local: bool,
    },
    /// Show the resource's configuration and runtime status.
    Runtime {
        resource: String,
        #[arg(long)]
        bootstrap: bool,
    },
    /// List resource ids allowed to run on the given (or local) host.
    List {
        host: Option<String>,
        #[arg(long)]
        bootstrap: bool,
    },
    /// Display help on a resource type's configuration.
    Help {
        /// Resource type (e.g. `storage_mount`).
        kind: String,
    },
}

#[derive(Subcommand)]
pub enum ClusterCommand {
    /// Aggregate status of every host or resource.
    Status { scope: Scope },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
