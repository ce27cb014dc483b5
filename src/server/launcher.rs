//! Server process launching.
//!
//! Resolves the `vault` executable and starts it in dev or normal mode with
//! its standard streams wired for the mode. No retries and no launch
//! timeout; a failed spawn is returned to the caller as is.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStdout, Command};

use crate::constants::VAULT_BINARY;
use crate::error::{Error, Result};

/// Find `binary` in the directories listed in `PATH`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for segment in std::env::split_paths(&path_var) {
        let candidate = segment.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}

/// Pick the executable to launch: the explicit override if given, else
/// `vault` on `PATH`.
pub fn resolve_executable(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(Error::executable_not_found(path.display().to_string())),
        None => find_in_path(VAULT_BINARY).ok_or_else(|| Error::executable_not_found(VAULT_BINARY)),
    }
}

/// Arguments for an unsealed in-memory dev server on `address`.
///
/// `-dev-no-store-token` is passed, but some server versions write the token
/// helper file regardless.
pub fn dev_args(address: &str) -> Vec<OsString> {
    ["server", "-dev", "-dev-no-store-token", "-dev-listen-address", address]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// Arguments for a normal (sealed) server reading `config_path`.
pub fn normal_args(config_path: &Path) -> Vec<OsString> {
    let mut config_arg = OsString::from("-config=");
    config_arg.push(config_path);
    vec![OsString::from("server"), config_arg]
}

/// Spawn a dev server.
///
/// stderr goes to the test runner's stderr; stdout is piped and returned for
/// credential scanning.
pub fn spawn_dev(executable: &Path, address: &str) -> Result<(Child, ChildStdout)> {
    let mut cmd = Command::new(executable);
    cmd.args(dev_args(address))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| Error::Spawn { source })?;

    let Some(stdout) = child.stdout.take() else {
        // Never leave an unreachable process behind.
        let _ = child.start_kill();
        return Err(Error::StdoutUnavailable);
    };

    tracing::info!(
        executable = %executable.display(),
        address = %address,
        pid = child.id(),
        "Spawned dev server"
    );

    Ok((child, stdout))
}

/// Spawn a normal-mode server with both streams inherited.
pub fn spawn_normal(executable: &Path, config_path: &Path) -> Result<Child> {
    let mut cmd = Command::new(executable);
    cmd.args(normal_args(config_path))
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| Error::Spawn { source })?;

    tracing::info!(
        executable = %executable.display(),
        config = %config_path.display(),
        pid = child.id(),
        "Spawned server"
    );

    Ok(child)
}
