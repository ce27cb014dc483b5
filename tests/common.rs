//! Common test utilities for integration tests.
//!
//! Provides `FakeVault`, a shell script standing in for the `vault` binary.
//! It records its arguments, optionally writes the token file the way a dev
//! server does, prints whatever startup output the test asks for, then
//! sleeps until killed.
//!
//! # Example
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_dev_start() {
//!     let fake = FakeVault::dev();
//!     let mut server = fake.server("127.0.0.1:8200");
//!     server.start_dev().await.unwrap();
//!     assert_eq!(server.root_token(), FAKE_ROOT_TOKEN);
//!     server.shutdown().await;
//! }
//! ```

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use vaulttest::VaultServer;

/// Unseal key printed by [`FakeVault::dev`].
pub const FAKE_UNSEAL_KEY: &str = "aGVsbG8tdW5zZWFsLWtleQ==";

/// Root token printed (and written to the token file) by [`FakeVault::dev`].
pub const FAKE_ROOT_TOKEN: &str = "hvs.fake-root-token";

/// A fake `vault` executable in its own temporary directory.
pub struct FakeVault {
    dir: TempDir,
    executable: PathBuf,
}

impl FakeVault {
    /// Script that runs `body` after recording its arguments.
    ///
    /// `@DIR@` in `body` is replaced with the script's directory.
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let executable = dir.path().join("vault");

        let dir_str = dir.path().display().to_string();
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{dir_str}/args'\n{}\n",
            body.replace("@DIR@", &dir_str)
        );

        // Written and closed before anything executes it.
        fs::write(&executable, script).expect("Failed to write fake vault");
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod fake vault");

        Self { dir, executable }
    }

    /// Well-behaved dev server: writes the token file, prints both
    /// credentials (the unseal key twice), keeps running.
    pub fn dev() -> Self {
        Self::new(&format!(
            "printf '{FAKE_ROOT_TOKEN}' > '@DIR@/.vault-token'\n\
             echo '==> Vault server configuration:'\n\
             echo ''\n\
             echo 'Unseal Key: {FAKE_UNSEAL_KEY}'\n\
             echo 'Unseal Key: second-key-is-ignored'\n\
             echo 'Root Token: {FAKE_ROOT_TOKEN}'\n\
             echo ''\n\
             echo 'Development mode should NOT be used in production installations!'\n\
             exec sleep 60"
        ))
    }

    /// Dev server that prints its credentials without writing a token file.
    pub fn dev_without_token_write() -> Self {
        Self::new(&format!(
            "echo 'Unseal Key: {FAKE_UNSEAL_KEY}'\n\
             echo 'Root Token: {FAKE_ROOT_TOKEN}'\n\
             exec sleep 60"
        ))
    }

    /// Dev server that prints a line of invalid UTF-8 after its credentials,
    /// then far more output than a pipe buffer holds, then writes `alive`.
    ///
    /// If nobody reads its stdout to the end, a write fails and the script
    /// dies before the marker.
    pub fn dev_noisy() -> Self {
        Self::new(&format!(
            "echo 'Unseal Key: {FAKE_UNSEAL_KEY}'\n\
             echo 'Root Token: {FAKE_ROOT_TOKEN}'\n\
             printf '\\377\\376\\n'\n\
             i=0\n\
             while [ $i -lt 2000 ]; do\n\
               echo \"log line $i: the quick brown fox jumps over the lazy dog\"\n\
               i=$((i + 1))\n\
             done\n\
             echo ok > '@DIR@/alive'\n\
             exec sleep 60"
        ))
    }

    /// Dev server that dies after printing only the unseal key.
    pub fn dev_exits_early() -> Self {
        Self::new(&format!("echo 'Unseal Key: {FAKE_UNSEAL_KEY}'\nexit 1"))
    }

    /// Server that never prints anything.
    pub fn silent() -> Self {
        Self::new("exec sleep 60")
    }

    /// Normal-mode server: copies the config file it was given, keeps running.
    pub fn normal() -> Self {
        Self::new("cp \"${2#-config=}\" '@DIR@/config.hcl'\nexec sleep 60")
    }

    /// Path to the fake executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Token file the fake (and the server under test) use.
    pub fn token_file(&self) -> PathBuf {
        self.dir.path().join(".vault-token")
    }

    /// A file in the fake's directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Server wired to this fake and its token file.
    pub fn server(&self, address: &str) -> VaultServer {
        VaultServer::builder()
            .address(address)
            .executable(&self.executable)
            .token_file(self.token_file())
            .startup_timeout(Duration::from_secs(10))
            .build()
    }

    /// Arguments the fake was last invoked with.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.path("args"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Wait until `path` exists and is non-empty.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if fs::metadata(path).is_ok_and(|m| m.len() > 0) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Whether a process with this PID still exists.
#[cfg(target_os = "linux")]
pub fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}
