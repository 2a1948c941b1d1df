//! Crate-wide error type.
//!
//! Contention on the reseed gate and the refusal path in the seed-buffer
//! fill are expected conditions, not errors; they are reported through
//! return values and log lines instead of this type.

use thiserror::Error;

/// Errors surfaced by the entropy manager.
#[derive(Debug, Error)]
pub enum Error {
    /// A live component was initialized a second time.
    #[error("already initialized")]
    AlreadyInitialized,

    /// An entropy source failed its `init` hook. Fatal for manager
    /// initialization; remaining sources are not initialized.
    #[error("entropy source '{name}' failed to initialize: {reason}")]
    SourceInit {
        /// Name of the failing source.
        name: &'static str,
        /// Source-supplied failure description.
        reason: String,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// An operation timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The manager is shutting down.
    #[error("manager is terminating")]
    Shutdown,

    /// An I/O failure (config loading, thread spawn).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
