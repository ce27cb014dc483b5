//! Dev-mode startup output parsing.
//!
//! A dev server prints its unseal key and root token to stdout once, right
//! after it unseals itself. This module scans that output line by line and
//! stops as soon as both values are known. Lines are decoded lossily, since
//! the server may print bytes that aren't valid UTF-8.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::constants::{CREDENTIAL_SEPARATOR, ROOT_TOKEN_PREFIX, UNSEAL_KEY_PREFIX};
use crate::error::{Error, Result};

/// Credentials printed by a dev server at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupCredentials {
    /// Unseal key for the single key share.
    pub unseal_key: String,
    /// Root token for the instance.
    pub root_token: String,
}

impl StartupCredentials {
    /// Both credentials have been seen.
    pub fn is_complete(&self) -> bool {
        !self.unseal_key.is_empty() && !self.root_token.is_empty()
    }

    /// Names of the credentials not seen yet.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.unseal_key.is_empty() {
            missing.push("unseal key");
        }
        if self.root_token.is_empty() {
            missing.push("root token");
        }
        missing
    }

    /// Feed one output line. Returns `true` if it set a credential.
    ///
    /// Each credential is taken from the first line that carries a value;
    /// later lines with the same label are ignored.
    pub fn observe_line(&mut self, line: &str) -> bool {
        if self.unseal_key.is_empty()
            && let Some(value) = parse_credential_line(line, UNSEAL_KEY_PREFIX)
        {
            self.unseal_key = value.to_string();
            return true;
        }

        if self.root_token.is_empty()
            && let Some(value) = parse_credential_line(line, ROOT_TOKEN_PREFIX)
        {
            self.root_token = value.to_string();
            return true;
        }

        false
    }
}

/// Extract the value from a `<prefix> <value>` line.
///
/// The line must start with `prefix`. The value is everything after the first
/// `": "`, trimmed. Returns `None` when the line doesn't match or the value is
/// empty.
pub fn parse_credential_line<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if !line.starts_with(prefix) {
        return None;
    }

    let (_, value) = line.split_once(CREDENTIAL_SEPARATOR)?;
    let value = value.trim();

    (!value.is_empty()).then_some(value)
}

/// Read one `\n`-terminated line into `buf`, decoded lossily and without
/// the line ending. Returns `None` at end of stream.
pub async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    let line = String::from_utf8_lossy(buf.as_slice());
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Read lines until both credentials are found.
///
/// Returns the credentials together with the reader, positioned after the
/// line that completed them, so the caller can keep draining the output.
///
/// # Errors
///
/// - [`Error::StartupOutputClosed`] if the stream ends first
/// - [`Error::StartupTimeout`] if `timeout` elapses first
/// - [`Error::Output`] if reading fails
pub async fn scan_startup_output<R>(mut reader: R, timeout: Duration) -> Result<(StartupCredentials, R)>
where
    R: AsyncBufRead + Unpin,
{
    let mut credentials = StartupCredentials::default();

    let scan = async {
        let mut buf = Vec::new();
        while !credentials.is_complete() {
            let Some(line) = read_lossy_line(&mut reader, &mut buf)
                .await
                .map_err(|source| Error::Output { source })?
            else {
                return Err(Error::StartupOutputClosed {
                    missing: credentials.missing(),
                });
            };

            if credentials.observe_line(&line) {
                tracing::debug!("Captured dev server credential");
            }
        }
        Ok(())
    };

    let outcome = tokio::time::timeout(timeout, scan).await;
    match outcome {
        Ok(Ok(())) => Ok((credentials, reader)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::StartupTimeout {
            timeout,
            missing: credentials.missing(),
        }),
    }
}
