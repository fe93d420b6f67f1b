//! LDP-CoAP server
//!
//! Loads the configuration, builds the resource tree, creates the bootstrap
//! containers and serves CoAP requests until interrupted.

use anyhow::Context;
use clap::Parser;
use ldp_coap::{CoapServer, ResourceManager, ResourceTree, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ldp-coap", version, about = "Linked Data Platform server over CoAP")]
struct Args {
    /// YAML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Bind address, overrides the configuration file
    #[arg(long)]
    address: Option<String>,

    /// UDP port, overrides the configuration file
    #[arg(long)]
    port: Option<u16>,

    /// Base URI of the root container
    #[arg(long)]
    base_uri: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(base_uri) = args.base_uri {
        config.base_uri = Some(base_uri);
    }
    config.validate().context("invalid configuration")?;

    info!("LDP-CoAP v{}", ldp_coap::version());

    let mng = Arc::new(ResourceManager::new(config.effective_base_uri()));
    let tree = ResourceTree::new(mng, config.accepted_non_rdf.clone())
        .await
        .context("creating the root container")?;
    config
        .bootstrap(&tree)
        .await
        .context("creating bootstrap containers")?;

    let server = CoapServer::new(&config, Arc::new(tree));
    tokio::select! {
        result = server.start() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
