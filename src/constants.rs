//! Centralized constants for test server defaults.
//!
//! Everything a test server instance assumes about the host or about the
//! `vault` binary's output lives here.

use std::time::Duration;

// =============================================================================
// Server Defaults
// =============================================================================

/// Listen address used when a server is constructed with an empty address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8200";

/// Name of the server executable looked up on `PATH`.
pub const VAULT_BINARY: &str = "vault";

/// How long `start_dev` waits for both credentials before giving up.
/// A dev server prints them well under a second after launch.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Host Files
// =============================================================================

/// Token helper file in the user's home directory. Dev servers overwrite it.
pub const TOKEN_FILE_NAME: &str = ".vault-token";

/// Permission bits for a restored token file (owner read/write).
pub const TOKEN_FILE_MODE: u32 = 0o600;

// =============================================================================
// Startup Output
// =============================================================================

/// Prefix of the dev-mode line carrying the unseal key.
pub const UNSEAL_KEY_PREFIX: &str = "Unseal Key:";

/// Prefix of the dev-mode line carrying the root token.
pub const ROOT_TOKEN_PREFIX: &str = "Root Token:";

/// Separator between a credential label and its value.
pub const CREDENTIAL_SEPARATOR: &str = ": ";

// =============================================================================
// Client
// =============================================================================

/// Header carrying the client token.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Header carrying the namespace, when one is configured.
pub const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Default client request timeout (60 seconds, matching the Vault CLI).
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);
