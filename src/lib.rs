// =============================================================================
// Lint Configuration
// =============================================================================

#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::module_name_repetitions)] // e.g., server::ServerConfig is clearer
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! Ephemeral Vault servers for integration tests.
//!
//! `vaulttest` launches a real `vault` binary for the duration of a test
//! run, so client code can be tested against the actual server instead of a
//! mock.
//!
//! - **Dev mode** ([`VaultServer::start_dev`]) starts unsealed with in-memory
//!   storage; the unseal key and root token are read from the server output.
//! - **Normal mode** ([`VaultServer::start_normal`]) starts sealed and
//!   uninitialized from a generated minimal config.
//!
//! Dev servers overwrite `~/.vault-token`. Its previous contents are saved
//! on start and written back by [`VaultServer::shutdown`].
//!
//! # Example
//!
//! ```rust,no_run
//! use vaulttest::{free_loopback_address, VaultServer};
//!
//! # async fn example() -> vaulttest::Result<()> {
//! let mut server = VaultServer::new(free_loopback_address()?);
//! server.start_dev().await?;
//!
//! let client = server.client()?;
//! assert_eq!(client.token(), server.root_token());
//! let secret = client.read("sys/mounts").await?;
//! assert!(secret.is_some());
//!
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

/// Minimal HTTP client bound to a test server.
pub mod client;

/// Defaults and fixed strings: listen address, token file, output prefixes.
pub mod constants;

/// Error type shared by server and client operations.
pub mod error;

/// Tracing subscriber setup for test binaries.
pub mod logging;

/// Server lifecycle: launch, credential parsing, shutdown.
pub mod server;

pub use client::{ClientConfig, SealStatus, Secret, VaultClient};
pub use error::{Error, Result};
pub use server::{
    ServerConfig, ServerMode, ServerState, StartupCredentials, VaultServer, VaultServerBuilder,
    free_address, free_loopback_address,
};
