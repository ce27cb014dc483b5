//! Error types for test server lifecycle and client operations.
//!
//! Environment preconditions (missing home directory, missing `vault`
//! binary, broken client configuration) are returned as errors instead of
//! terminating the process, so a test suite can choose between aborting
//! and skipping.

use std::time::Duration;

/// Result type for vaulttest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while launching, reading, or talking to a test server.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The user's home directory could not be determined.
    #[error("unable to determine the user's home directory")]
    HomeDirUnavailable,

    /// The server executable is not installed or not on `PATH`.
    #[error("'{name}' is not installed and available on the path")]
    ExecutableNotFound { name: String },

    /// A start operation was called on an instance that was already started.
    #[error("server on {address} was already started")]
    AlreadyStarted { address: String },

    /// The server process could not be spawned.
    #[error("failed to spawn server process: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// The server's stdout was not captured.
    #[error("unable to connect to the test server's stdout")]
    StdoutUnavailable,

    /// Server output ended before all startup credentials were printed.
    #[error("server output closed before {} was printed", .missing.join(" and "))]
    StartupOutputClosed { missing: Vec<&'static str> },

    /// Startup credentials did not appear within the allowed time.
    #[error("timed out after {timeout:?} waiting for {}", .missing.join(" and "))]
    StartupTimeout {
        timeout: Duration,
        missing: Vec<&'static str>,
    },

    /// Reading server output failed.
    #[error("failed to read server output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    /// The generated server configuration could not be written.
    #[error("failed to write server config file: {source}")]
    ConfigFile {
        #[source]
        source: std::io::Error,
    },

    /// The environment holds a malformed client setting.
    #[error("invalid client configuration: {0}")]
    ClientConfig(String),

    /// HTTP transport or client build failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {}", .errors.join("; "))]
    Api { status: u16, errors: Vec<String> },

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an executable not found error.
    pub fn executable_not_found(name: impl Into<String>) -> Self {
        Self::ExecutableNotFound { name: name.into() }
    }

    /// Whether this error means the host is missing something the tests
    /// need, as opposed to a misbehaving server.
    pub const fn is_environment(&self) -> bool {
        matches!(
            self,
            Self::HomeDirUnavailable | Self::ExecutableNotFound { .. } | Self::ClientConfig(_)
        )
    }
}
