//! Minimal server configuration for normal-mode instances.
//!
//! Normal mode needs a config file. The one generated here enables the UI,
//! disables mlock, binds a single plaintext TCP listener and keeps all
//! storage in memory, so the server starts sealed and uninitialized.

use std::io::Write;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Storage backend stanza.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage, discarded on exit.
    #[default]
    Inmem,
}

impl StorageBackend {
    /// Backend name as written in the config file.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inmem => "inmem",
        }
    }
}

/// Server configuration rendered into the file passed via `-config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Enable the web UI.
    pub ui: bool,
    /// Skip `mlock`; required in most containers and CI runners.
    pub disable_mlock: bool,
    /// Address for the TCP listener.
    pub listener_address: String,
    /// Serve plain HTTP.
    pub tls_disable: bool,
    /// Storage backend.
    pub storage: StorageBackend,
}

impl ServerConfig {
    /// The minimal configuration for a listener on `address`.
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            ui: true,
            disable_mlock: true,
            listener_address: address.into(),
            tls_disable: true,
            storage: StorageBackend::Inmem,
        }
    }

    /// Render as HCL.
    pub fn render(&self) -> String {
        format!(
            "ui = {ui}\n\
             disable_mlock = {mlock}\n\
             \n\
             listener \"tcp\" {{\n    \
                 address     = {address:?}\n    \
                 tls_disable = \"{tls}\"\n\
             }}\n\
             \n\
             storage \"{storage}\" {{}}\n",
            ui = self.ui,
            mlock = self.disable_mlock,
            address = self.listener_address,
            tls = self.tls_disable,
            storage = self.storage.as_str(),
        )
    }

    /// Write the rendered config to a new temporary file.
    ///
    /// The file is deleted when the returned handle (or its `TempPath`) is
    /// dropped.
    pub fn write_temp(&self) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("vaulttest-")
            .suffix(".hcl")
            .tempfile()
            .map_err(|source| Error::ConfigFile { source })?;

        file.write_all(self.render().as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| Error::ConfigFile { source })?;

        Ok(file)
    }
}
