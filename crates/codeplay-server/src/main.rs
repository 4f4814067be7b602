//! Playground server: the execute API plus the C++ compile-and-run service.

use anyhow::Result;
use clap::Parser;
use codeplay_core::{ConfigLoader, ExecutionDispatcher};
use codeplay_server::{shutdown_signal, CompileService, PlaygroundServer, ServerConfig};
use log::LevelFilter;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Codeplay Server - run lesson code over HTTP")]
struct Cli {
    #[clap(long, short, default_value = "codeplay.yaml", help = "Configuration source: file path or http(s) URL")]
    config: String,

    #[clap(long, default_value = "127.0.0.1:3001")]
    bind_addr: String,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Allowed CORS origin (repeatable); any origin when omitted")]
    cors_origin: Vec<String>,

    #[clap(long, help = "Acquire the Python runtime before accepting requests")]
    preload_python: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    log::info!("Loading configuration from: {}", cli.config);
    let config = ConfigLoader::from_source_or_default(&cli.config).await?;

    let dispatcher = Arc::new(ExecutionDispatcher::from_config(&config)?);
    let compile_service = CompileService::from_config(&config.compile_service);

    if cli.preload_python {
        if let Some(loader) = dispatcher.runtime_loader() {
            log::info!("Preloading the Python runtime...");
            match loader.preload().await {
                Ok(()) => log::info!("Python runtime ready"),
                Err(e) => log::warn!("Python runtime preload failed, will use the simulator: {}", e),
            }
        }
    }

    let bind_socket_addr: SocketAddr = cli
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", cli.bind_addr, e))?;

    let mut server_config = ServerConfig::default()
        .with_bind_addr(bind_socket_addr)
        .with_logging(true);
    if !cli.cors_origin.is_empty() {
        server_config = server_config.with_cors_origins(cli.cors_origin);
    }

    let server = PlaygroundServer::with_config(dispatcher, compile_service, server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
