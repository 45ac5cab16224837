//! Resource/host status: the five-valued lifecycle status shared by every
//! resource plugin, the cluster-host controller and the cluster-resource
//! controller.
use strum_macros::{AsRefStr, EnumString};

/// Lifecycle status of a resource or host.
///
/// Stored in runtime files as its human-readable word (`Started`, not an
/// integer) and converted to/from this enum only at the object boundary,
/// per the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
pub enum Status {
    /// No status has been established yet (never probed, never started).
    Unknown,
    /// The resource/host is running.
    Started,
    /// The resource is suspended (paused, not stopped).
    Suspended,
    /// The resource/host is stopped.
    Stopped,
    /// The last lifecycle operation failed.
    Error,
}

impl Status {
    /// The process exit code a `status` CLI query reports for this value.
    /// `Unknown` has no CLI-facing exit code of its own; callers treat it
    /// as an operational failure (255) instead.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Started => 0,
            Status::Suspended => 1,
            Status::Stopped => 2,
            Status::Error => 3,
            Status::Unknown => EXIT_OPERATIONAL_FAILURE,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Exit code used by the CLI dispatcher when the command itself fails,
/// independent of any resource's status (e.g. the configuration could
/// not be loaded).
pub const EXIT_OPERATIONAL_FAILURE: i32 = 255;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for status in [
            Status::Unknown,
            Status::Started,
            Status::Suspended,
            Status::Stopped,
            Status::Error,
        ] {
            let rendered = status.to_string();
            let parsed = Status::from_str(&rendered).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn exit_codes_match_the_cli_contract() {
        assert_eq!(Status::Started.exit_code(), 0);
        assert_eq!(Status::Suspended.exit_code(), 1);
        assert_eq!(Status::Stopped.exit_code(), 2);
        assert_eq!(Status::Error.exit_code(), 3);
        assert_eq!(Status::Unknown.exit_code(), EXIT_OPERATIONAL_FAILURE);
    }
}
