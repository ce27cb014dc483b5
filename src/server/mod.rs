//! Test server lifecycle.
//!
//! A [`VaultServer`] owns one external `vault` process from launch to
//! shutdown. It captures the user's token file before launch, recovers the
//! dev-mode credentials from the process output, hands out authenticated
//! clients, and on shutdown kills the process and puts the token file back.
//!
//! ## Module Structure
//!
//! - [`config`]: Normal-mode configuration file
//! - [`launcher`]: Executable lookup and process spawning
//! - [`startup`]: Dev-mode output parsing
//! - [`token_file`]: Token file capture and restore

pub mod config;
pub mod launcher;
pub mod startup;
pub mod token_file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::process::Child;

use crate::client::{ClientConfig, VaultClient};
use crate::constants::{DEFAULT_ADDRESS, DEFAULT_STARTUP_TIMEOUT};
use crate::error::{Error, Result};

pub use config::ServerConfig;
pub use startup::StartupCredentials;
pub use token_file::SavedToken;

/// Mode a server was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Unsealed, in-memory, prints an unseal key and root token.
    Dev,
    /// Sealed and uninitialized, started from a generated config file.
    Normal,
}

/// Lifecycle state of a [`VaultServer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, no process yet.
    #[default]
    Unstarted,
    /// Process running and ready for requests.
    Running,
    /// Shut down, or failed to start. Not restartable.
    Stopped,
}

/// An ephemeral server for integration tests.
///
/// Construct one per test run, start it in dev or normal mode, and shut it
/// down when the tests are done.
///
/// # Example
///
/// ```rust,no_run
/// use vaulttest::VaultServer;
///
/// # async fn example() -> vaulttest::Result<()> {
/// let mut server = VaultServer::new("127.0.0.1:8210");
/// server.start_dev().await?;
///
/// let client = server.client()?;
/// let status = client.seal_status().await?;
/// assert!(!status.sealed);
///
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct VaultServer {
    address: String,
    executable: Option<PathBuf>,
    token_file: Option<PathBuf>,
    startup_timeout: Duration,
    state: ServerState,
    mode: Option<ServerMode>,
    child: Option<Child>,
    credentials: StartupCredentials,
    saved_token: Option<SavedToken>,
    config_file: Option<TempPath>,
}

/// Builder for configuring a [`VaultServer`].
#[derive(Debug, Clone)]
pub struct VaultServerBuilder {
    address: String,
    executable: Option<PathBuf>,
    token_file: Option<PathBuf>,
    startup_timeout: Duration,
}

impl Default for VaultServerBuilder {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            executable: None,
            token_file: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl VaultServerBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address. An empty address keeps the default.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        if !address.is_empty() {
            self.address = address;
        }
        self
    }

    /// Launch this executable instead of looking up `vault` on `PATH`.
    #[must_use]
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Guard this token file instead of `~/.vault-token`.
    #[must_use]
    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// How long to wait for dev-mode credentials.
    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Build the (unstarted) server.
    pub fn build(self) -> VaultServer {
        VaultServer {
            address: self.address,
            executable: self.executable,
            token_file: self.token_file,
            startup_timeout: self.startup_timeout,
            state: ServerState::Unstarted,
            mode: None,
            child: None,
            credentials: StartupCredentials::default(),
            saved_token: None,
            config_file: None,
        }
    }
}

impl VaultServer {
    /// Create a server for `address`, or for `127.0.0.1:8200` if it's empty.
    pub fn new(address: impl Into<String>) -> Self {
        Self::builder().address(address).build()
    }

    /// Create a builder for configuring a server.
    #[must_use]
    pub fn builder() -> VaultServerBuilder {
        VaultServerBuilder::new()
    }

    /// Listen address (`host:port`).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Base URL clients use.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Whether the process is running and ready.
    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Mode the server was started in, if it was started.
    pub const fn mode(&self) -> Option<ServerMode> {
        self.mode
    }

    /// Unseal key printed by a dev server. Empty in normal mode.
    pub fn unseal_key(&self) -> &str {
        &self.credentials.unseal_key
    }

    /// Root token printed by a dev server. Empty in normal mode.
    pub fn root_token(&self) -> &str {
        &self.credentials.root_token
    }

    /// Both dev-mode credentials.
    pub const fn credentials(&self) -> &StartupCredentials {
        &self.credentials
    }

    /// Token file captured at start, if one existed.
    pub const fn saved_token(&self) -> Option<&SavedToken> {
        self.saved_token.as_ref()
    }

    /// Process ID of the running server.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Start an unsealed dev server and wait for its credentials.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if this instance was started before
    /// - [`Error::HomeDirUnavailable`] / [`Error::ExecutableNotFound`] for a
    ///   broken test environment
    /// - [`Error::Spawn`] if the process can't be launched
    /// - [`Error::StartupOutputClosed`] / [`Error::StartupTimeout`] if the
    ///   credentials never show up; the process is killed in that case
    ///
    /// Any error other than `AlreadyStarted` leaves the instance `Stopped`.
    pub async fn start_dev(&mut self) -> Result<()> {
        self.ensure_unstarted()?;
        let started = self.launch_dev().await;
        self.settle_start(started)
    }

    async fn launch_dev(&mut self) -> Result<()> {
        let executable = self.prepare_launch()?;

        tracing::info!(address = %self.address, "Starting dev server");
        let (mut child, stdout) = launcher::spawn_dev(&executable, &self.address)?;
        self.mode = Some(ServerMode::Dev);

        match startup::scan_startup_output(BufReader::new(stdout), self.startup_timeout).await {
            Ok((credentials, rest)) => {
                self.credentials = credentials;
                drain_output(rest, self.address.clone());
            },
            Err(e) => {
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!(error = %kill_err, "Failed to kill dev server after failed start");
                }
                return Err(e);
            },
        }

        self.child = Some(child);
        self.state = ServerState::Running;
        tracing::info!(address = %self.address, pid = self.pid(), "Dev server ready");
        Ok(())
    }

    /// Start a sealed server from a generated minimal config.
    ///
    /// The instance is running as soon as the process is spawned; no output
    /// is read and no credentials are recorded.
    ///
    /// # Errors
    ///
    /// Same environment and spawn errors as [`start_dev`](Self::start_dev),
    /// plus [`Error::ConfigFile`] if the config can't be written.
    pub async fn start_normal(&mut self) -> Result<()> {
        self.ensure_unstarted()?;
        let started = self.launch_normal();
        self.settle_start(started)
    }

    fn launch_normal(&mut self) -> Result<()> {
        let executable = self.prepare_launch()?;

        tracing::info!(address = %self.address, "Starting server");
        let config_file = ServerConfig::for_address(&self.address)
            .write_temp()?
            .into_temp_path();

        let child = launcher::spawn_normal(&executable, &config_file)?;

        self.mode = Some(ServerMode::Normal);
        self.config_file = Some(config_file);
        self.child = Some(child);
        self.state = ServerState::Running;
        Ok(())
    }

    /// Kill the server and restore the user's token file.
    ///
    /// Safe to call on an instance that isn't running: the kill is skipped,
    /// the token restore still happens. Failures are logged, not returned.
    /// Afterwards the instance is `Stopped` and can't be started again.
    pub async fn shutdown(&mut self) {
        if self.is_running()
            && let Some(mut child) = self.child.take()
        {
            let pid = child.id();
            match child.kill().await {
                Ok(()) => tracing::info!(address = %self.address, pid = pid, "Killed server"),
                Err(e) => tracing::warn!(
                    address = %self.address,
                    pid = pid,
                    error = %e,
                    "Failed to kill server"
                ),
            }
        }
        self.state = ServerState::Stopped;

        if let Some(config_file) = self.config_file.take()
            && let Err(e) = config_file.close()
        {
            tracing::debug!(error = %e, "Failed to remove server config file");
        }

        if let Some(saved) = &self.saved_token {
            match saved.restore() {
                Ok(()) => tracing::debug!(path = %saved.path().display(), "Restored token file"),
                Err(e) => tracing::warn!(
                    path = %saved.path().display(),
                    error = %e,
                    "Failed to restore token file"
                ),
            }
        }
    }

    /// Client for this server, authenticated with the root token.
    ///
    /// Environment client settings (`VAULT_*`) are applied, except that the
    /// address always points at this server. In normal mode the token is
    /// empty; authenticate separately.
    pub fn client(&self) -> Result<VaultClient> {
        let mut config = ClientConfig::from_env()?;
        config.address = self.url();

        let mut client = VaultClient::new(config)?;
        client.set_token(self.root_token());
        Ok(client)
    }

    fn ensure_unstarted(&self) -> Result<()> {
        if self.state != ServerState::Unstarted {
            return Err(Error::AlreadyStarted {
                address: self.address.clone(),
            });
        }
        Ok(())
    }

    /// Token capture and executable lookup, shared by both modes.
    fn prepare_launch(&mut self) -> Result<PathBuf> {
        let token_path = match &self.token_file {
            Some(path) => path.clone(),
            None => token_file::default_token_path()?,
        };
        self.saved_token = SavedToken::capture(&token_path);
        self.token_file = Some(token_path);

        launcher::resolve_executable(self.executable.as_deref())
    }

    /// A failed start is final: the instance becomes `Stopped`, so the token
    /// file is never captured a second time.
    fn settle_start(&mut self, started: Result<()>) -> Result<()> {
        if started.is_err() {
            self.state = ServerState::Stopped;
        }
        started
    }

    /// Path of the guarded token file, once resolved.
    pub fn token_file(&self) -> Option<&Path> {
        self.token_file.as_deref()
    }
}

/// Forward the rest of a dev server's stdout to the log so the pipe never
/// fills up.
///
/// The reader is held until end of stream. Dropping it early would close the
/// pipe and kill the server on its next write.
fn drain_output<R>(mut reader: R, address: String)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        loop {
            match startup::read_lossy_line(&mut reader, &mut buf).await {
                Ok(Some(line)) => tracing::debug!(address = %address, "{line}"),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(address = %address, error = %e, "Discarding unreadable server output");
                    if let Err(e) = tokio::io::copy_buf(&mut reader, &mut tokio::io::sink()).await {
                        tracing::warn!(address = %address, error = %e, "Stopped draining server output");
                    }
                    break;
                },
            }
        }
    });
}

/// A loopback `host:port` that was free a moment ago.
///
/// The port is released before returning, so another process can grab it
/// in between; good enough for tests.
pub fn free_loopback_address() -> Result<String> {
    free_address("127.0.0.1")
}

/// A `host:port` on `host` whose port was free a moment ago.
///
/// `host` is anything `TcpListener::bind` accepts before `:0`, including a
/// bracketed IPv6 address. The result carries the bound IP, not the name.
pub fn free_address(host: &str) -> Result<String> {
    let listener = std::net::TcpListener::bind(format!("{host}:0"))
        .map_err(|e| Error::io(format!("binding an ephemeral port on {host}"), e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| Error::io("reading ephemeral port", e))?;
    Ok(addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_keeps_address() {
        let server = VaultServer::new("127.0.0.1:9999");
        assert_eq!(server.address(), "127.0.0.1:9999");
        assert_eq!(server.url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_new_empty_address_uses_default() {
        let server = VaultServer::new("");
        assert_eq!(server.address(), DEFAULT_ADDRESS);
    }

    #[test]
    fn test_new_is_unstarted() {
        let server = VaultServer::new("");
        assert_eq!(server.state(), ServerState::Unstarted);
        assert!(!server.is_running());
        assert!(server.mode().is_none());
        assert!(server.pid().is_none());
        assert!(server.root_token().is_empty());
        assert!(server.unseal_key().is_empty());
        assert!(server.token_file().is_none());
    }

    #[test]
    fn test_builder_settings() {
        let server = VaultServer::builder()
            .address("127.0.0.1:8211")
            .executable("/opt/vault/bin/vault")
            .token_file("/tmp/token")
            .startup_timeout(Duration::from_secs(3))
            .build();
        assert_eq!(server.address(), "127.0.0.1:8211");
        assert_eq!(server.executable.as_deref(), Some(Path::new("/opt/vault/bin/vault")));
        assert_eq!(server.token_file(), Some(Path::new("/tmp/token")));
        assert_eq!(server.startup_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_start_missing_executable_is_environment_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut server = VaultServer::builder()
            .executable(temp_dir.path().join("missing-vault"))
            .token_file(temp_dir.path().join(".vault-token"))
            .build();

        let err = server.start_dev().await.unwrap_err();
        assert!(err.is_environment());
        assert!(!server.is_running());
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_failed_start_is_final_and_captures_once() {
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join(".vault-token");
        std::fs::write(&token_path, b"s.original").unwrap();

        let mut server = VaultServer::builder()
            .executable(temp_dir.path().join("missing-vault"))
            .token_file(&token_path)
            .build();
        assert!(server.start_dev().await.is_err());

        // A retry must not re-capture whatever is in the file now.
        std::fs::write(&token_path, b"s.from-a-stray-server").unwrap();
        assert!(matches!(
            server.start_normal().await.unwrap_err(),
            Error::AlreadyStarted { .. }
        ));
        assert_eq!(server.saved_token().unwrap().contents(), b"s.original");

        server.shutdown().await;
        assert_eq!(std::fs::read(&token_path).unwrap(), b"s.original");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_failure_stops_instance() {
        let temp_dir = TempDir::new().unwrap();
        // Exists, but isn't executable.
        let executable = temp_dir.path().join("vault");
        std::fs::write(&executable, b"not a program").unwrap();

        let mut server = VaultServer::builder()
            .executable(&executable)
            .token_file(temp_dir.path().join(".vault-token"))
            .build();

        let err = server.start_normal().await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }), "unexpected error: {err}");
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.mode().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_unstarted_restores_token() {
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join(".vault-token");
        std::fs::write(&token_path, b"s.mine").unwrap();

        let mut server = VaultServer::builder()
            .executable(temp_dir.path().join("missing-vault"))
            .token_file(&token_path)
            .build();

        // The failed start still captured the token.
        assert!(server.start_normal().await.is_err());
        std::fs::write(&token_path, b"clobbered").unwrap();

        server.shutdown().await;
        assert_eq!(std::fs::read(&token_path).unwrap(), b"s.mine");
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn test_free_loopback_address() {
        let address = free_loopback_address().unwrap();
        assert!(address.starts_with("127.0.0.1:"));
        let port: u16 = address.rsplit(':').next().unwrap().parse().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_free_address_keeps_host() {
        let address = free_address("127.0.0.1").unwrap();
        assert!(address.starts_with("127.0.0.1:"));
        assert!(!address.ends_with(":0"));

        // TEST-NET-1, not assigned to any local interface.
        let err = free_address("192.0.2.1").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
