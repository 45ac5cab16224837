//! Error handling for KiSC.
use thiserror::Error;

/// The kinds of failure the cluster manager distinguishes, per the error
/// handling design: configuration errors, precondition failures,
/// admission control, plugin failures, I/O, and "not implemented" fatals.
#[derive(Debug, Error)]
pub enum KiscError {
    /// A configuration file could not be read, or was malformed.
    #[error("{0}")]
    Configuration(String),

    /// A precondition for a lifecycle operation was not met
    /// (e.g. wrong host, wrong current status, HOSTS expression mismatch).
    #[error("{0}")]
    Precondition(String),

    /// A consumables admission check failed. Downgradeable to a warning
    /// under `--force` by the caller, rather than by this type itself.
    #[error("{0}")]
    Admission(String),

    /// A resource plugin's lifecycle method reported failure.
    #[error("{0}")]
    Plugin(String),

    /// An I/O error while reading/writing configuration or runtime files.
    #[error("{0}: {source}")]
    Io {
        /// Context for where the I/O error occurred.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A variable could not be resolved (unknown id/setting, bad filter).
    #[error("{0}")]
    InvalidVariable(String),

    /// A lifecycle method has no implementation for this plugin type.
    #[error("{0}")]
    Fatal(String),
}

impl KiscError {
    /// Wrap an I/O error with a short human-readable context string.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        KiscError::Io {
            context: context.into(),
            source,
        }
    }

    /// Prefix the error's rendered message with `<file> [id]`-style
    /// context, matching the original's deepest-first accumulation.
    pub fn with_context(self, prefix: &str) -> Self {
        let message = format!("{prefix} {self}");
        match self {
            KiscError::Configuration(_) => KiscError::Configuration(message),
            KiscError::Precondition(_) => KiscError::Precondition(message),
            KiscError::Admission(_) => KiscError::Admission(message),
            KiscError::Plugin(_) => KiscError::Plugin(message),
            KiscError::Io { source, .. } => KiscError::Io {
                context: message,
                source,
            },
            KiscError::InvalidVariable(_) => KiscError::InvalidVariable(message),
            KiscError::Fatal(_) => KiscError::Fatal(message),
        }
    }
}

/// An ordered collection of errors, as produced by the configuration
/// loader and the lifecycle controllers: one bad section or one failed
/// step does not abort the whole operation.
#[derive(Debug, Default)]
pub struct ErrorList(pub Vec<KiscError>);

impl ErrorList {
    /// A fresh, empty error list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// True if no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record an error.
    pub fn push(&mut self, error: KiscError) {
        self.0.push(error);
    }

    /// Append another list's errors onto this one.
    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    /// The last recorded error, as shown by the CLI at default verbosity.
    pub fn last(&self) -> Option<&KiscError> {
        self.0.last()
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl<T> From<std::sync::PoisonError<T>> for KiscError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        KiscError::Fatal(format!("Mutex is poisoned: {err}"))
    }
}
