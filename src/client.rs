//! Minimal HTTP client for a test server.
//!
//! Only what the tests need: base address and token wiring, environment
//! configuration the way the Vault CLI reads it, and a couple of read calls.
//! Everything else about the server's API is out of scope.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{DEFAULT_ADDRESS, DEFAULT_CLIENT_TIMEOUT, NAMESPACE_HEADER, TOKEN_HEADER};
use crate::error::{Error, Result};

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://127.0.0.1:8200`.
    pub address: String,
    /// Token sent with every request.
    pub token: Option<String>,
    /// Namespace sent with every request.
    pub namespace: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept any TLS certificate.
    pub skip_verify: bool,
    /// Extra PEM CA certificate to trust.
    pub ca_cert: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("http://{DEFAULT_ADDRESS}"),
            token: None,
            namespace: None,
            timeout: DEFAULT_CLIENT_TIMEOUT,
            skip_verify: false,
            ca_cert: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `VAULT_*` environment variables.
    ///
    /// Reads `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`,
    /// `VAULT_CLIENT_TIMEOUT`, `VAULT_SKIP_VERIFY` and `VAULT_CACERT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(address) = get("VAULT_ADDR") {
            config.address = address.trim_end_matches('/').to_string();
        }
        config.token = get("VAULT_TOKEN");
        config.namespace = get("VAULT_NAMESPACE");

        if let Some(raw) = get("VAULT_CLIENT_TIMEOUT") {
            config.timeout = parse_timeout(&raw)?;
        }
        if let Some(raw) = get("VAULT_SKIP_VERIFY") {
            config.skip_verify = parse_bool(&raw).ok_or_else(|| {
                Error::ClientConfig(format!("VAULT_SKIP_VERIFY is not a boolean: {raw:?}"))
            })?;
        }
        config.ca_cert = get("VAULT_CACERT").map(PathBuf::from);

        Ok(config)
    }
}

/// Timeout in whole seconds, optionally suffixed with `s`.
fn parse_timeout(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix('s')
        .unwrap_or(trimmed)
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::ClientConfig(format!("VAULT_CLIENT_TIMEOUT is not a duration: {raw:?}")))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

/// A secret or other data returned by a read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub request_id: String,
    pub lease_id: String,
    pub lease_duration: u64,
    pub renewable: bool,
    pub data: Option<serde_json::Value>,
    pub warnings: Option<Vec<String>>,
}

/// Response of `sys/seal-status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SealStatus {
    /// Whether the server is sealed.
    pub sealed: bool,
    /// Whether the server has been initialized.
    pub initialized: bool,
    /// Unseal threshold.
    #[serde(rename = "t")]
    pub threshold: u32,
    /// Number of key shares.
    #[serde(rename = "n")]
    pub shares: u32,
    /// Unseal keys provided so far.
    pub progress: u32,
    /// Server version.
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Authenticated HTTP client bound to one server.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    address: String,
    token: String,
    namespace: Option<String>,
}

impl VaultClient {
    /// Build a client from `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.skip_verify);

        if let Some(ca_path) = &config.ca_cert {
            let pem = std::fs::read(ca_path)
                .map_err(|e| Error::io(format!("reading CA certificate {}", ca_path.display()), e))?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::ClientConfig(format!("invalid CA certificate {}: {e}", ca_path.display()))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            http: builder.build()?,
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.unwrap_or_default(),
            namespace: config.namespace,
        })
    }

    /// Base URL requests go to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Token attached to requests. Empty means none.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Replace the token.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Namespace attached to requests.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    /// Read `path`. A 404 is `Ok(None)`.
    pub async fn read(&self, path: &str) -> Result<Option<Secret>> {
        let resp = self.get(path).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        Ok(Some(resp.json().await?))
    }

    /// Current seal status.
    pub async fn seal_status(&self) -> Result<SealStatus> {
        let resp = check_status(self.get("sys/seal-status").send().await?).await?;
        Ok(resp.json().await?)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(self.url(path));
        if !self.token.is_empty() {
            req = req.header(TOKEN_HEADER, &self.token);
        }
        if let Some(ns) = &self.namespace {
            req = req.header(NAMESPACE_HEADER, ns);
        }
        req
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: ErrorBody = resp.json().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        errors: body.errors,
    })
}
