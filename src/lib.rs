//! KiSC: a daemonless cluster resource manager coordinating over a shared
//! filesystem rather than RPC or a consensus protocol.

#![warn(unused_crate_dependencies)]
// Test dependencies are only used in test code.
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;
#[cfg(test)]
use tempfile as _;
// Pulled in for strum_macros' derive expansion, not referenced by path directly.
use strum as _;
// Only used by the binary target (src/bin/main.rs), not the library itself.
use tracing_subscriber as _;

/// CLI parsing.
pub mod cli;

/// Config loading.
pub mod config;

/// Constants.
pub mod constants;

/// Errors.
pub mod error;

/// Status tracking.
pub mod status;

/// Runtime paths, modes, and on-disk state-file encoding.
pub mod runtime;

/// Resource plugin contract and registry.
pub mod resource;

/// Cluster variable resolution (`%{...}` templates).
pub mod variable;

/// Cluster-host and cluster-resource lifecycle controllers.
pub mod cluster;
