/// MCP Server Entry Point
///
/// Loads configuration from the environment, starts the host loop thread,
/// registers the demo catalog and serves JSON-RPC over HTTP until the
/// process is signalled to stop. See `core::config` for the variables read.
///
/// Logging goes to stderr; RUST_LOG selects the filter (default "info") and
/// LOG_FORMAT=json switches to structured output.
use std::io;

use host_bridge_mcp::core::config::{LogFormat, ServerConfig};
use host_bridge_mcp::core::dispatcher::{Dispatcher, ServerInfo};
use host_bridge_mcp::core::host::HostLoop;
use host_bridge_mcp::core::registry::Registry;
use host_bridge_mcp::core::server;
use host_bridge_mcp::tools;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServerConfig::from_env().map_err(|e| {
        eprintln!("Error: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    init_tracing(config.log_format);

    let mut registry = Registry::new();
    tools::register_all(&mut registry, &config).map_err(|e| {
        error!(error = %e, "handler registration failed");
        io::Error::other(e)
    })?;
    info!(handlers = registry.len(), "registry ready");

    let (bridge, host) = HostLoop::spawn(config.poll_interval)?;
    let dispatcher = Dispatcher::new(
        registry,
        bridge,
        ServerInfo {
            name: config.name.clone(),
            version: config.version.clone(),
        },
        config.task_timeout,
    );

    let result = server::run_server_http(&config, dispatcher).await;
    if let Err(e) = &result {
        error!(error = %e, "listener failed");
    }
    host.stop();
    result
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(io::stderr).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
