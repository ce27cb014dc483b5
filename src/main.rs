//! vaulttest - run a throwaway Vault server from the shell.
//!
//! Starts a dev or normal-mode server the same way the test fixtures do,
//! prints the environment needed to talk to it, and tears it down on Ctrl-C.
//!
//! See `vaulttest --help` for full usage information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use vaulttest::logging::{LogConfig, init_logging};
use vaulttest::{ServerMode, VaultServer};

const AFTER_HELP: &str = "\
EXAMPLES:
  vaulttest dev                       Dev server on 127.0.0.1:8200
  vaulttest dev --address 127.0.0.1:0 Dev server on a free port
  vaulttest server                    Sealed server from a minimal config

The server runs until Ctrl-C, so capture the exports from a background run:
  vaulttest dev > vault.env &
  sleep 2 && . ./vault.env";

#[derive(Parser)]
#[command(name = "vaulttest")]
#[command(version)]
#[command(about = "Run an ephemeral Vault server for integration tests")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct ServerArgs {
    /// Listen address; port 0 picks a free port on the same host
    #[arg(short, long, default_value = vaulttest::constants::DEFAULT_ADDRESS)]
    address: String,
    /// Path to the vault binary (default: found on PATH)
    #[arg(long)]
    vault: Option<PathBuf>,
    /// Seconds to wait for dev-mode credentials
    #[arg(long, default_value = "30")]
    startup_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an unsealed in-memory dev server
    Dev(ServerArgs),
    /// Start a sealed server from a generated config
    Server(ServerArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::default().level(tracing::Level::DEBUG)
    } else {
        LogConfig::default().level(tracing::Level::WARN)
    };
    init_logging(&log_config);

    let (mode, args) = match cli.command {
        Commands::Dev(args) => (ServerMode::Dev, args),
        Commands::Server(args) => (ServerMode::Normal, args),
    };

    let address = listen_address(args.address)?;

    let mut builder = VaultServer::builder()
        .address(address)
        .startup_timeout(Duration::from_secs(args.startup_timeout));
    if let Some(vault) = args.vault {
        builder = builder.executable(vault);
    }
    let mut server = builder.build();

    let started = match mode {
        ServerMode::Dev => server.start_dev().await,
        ServerMode::Normal => server.start_normal().await,
    };
    if let Err(e) = started {
        server.shutdown().await;
        return Err(e).context("Failed to start server");
    }

    println!("export VAULT_ADDR={}", server.url());
    if mode == ServerMode::Dev {
        println!("export VAULT_TOKEN={}", server.root_token());
        println!("# unseal key: {}", server.unseal_key());
    }
    println!("# pid {}; press Ctrl-C to stop", server.pid().unwrap_or_default());

    let waited = tokio::signal::ctrl_c().await;
    server.shutdown().await;
    waited.context("Failed to listen for Ctrl-C")?;

    Ok(())
}

/// Replace a `:0` port with a free one on the same host.
fn listen_address(raw: String) -> Result<String> {
    match raw.strip_suffix(":0") {
        Some(host) => vaulttest::free_address(host)
            .with_context(|| format!("Failed to find a free port on {host}")),
        None => Ok(raw),
    }
}
