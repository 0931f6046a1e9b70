/// Server resources: `server://status` and `server://config`.
use std::time::Instant;

use serde_json::{Value, json};

use crate::core::config::ServerConfig;
use crate::core::error::RegistryError;
use crate::core::registry::{HandlerDescriptor, Registry};

/// Register both server resources.
///
/// # Arguments
/// * `registry` - Registry the resources are added to
/// * `config` - Settings reported by `server://config`; uptime counts from this call
pub fn register(registry: &mut Registry, config: &ServerConfig) -> Result<(), RegistryError> {
    let started = Instant::now();
    let version = config.version.clone();
    registry.register(
        HandlerDescriptor::resource(
            "server_status",
            "server://status",
            "Get server status information",
            move |_| {
                Ok(json!({
                    "status": "running",
                    "uptime_secs": started.elapsed().as_secs(),
                    "version": version
                }))
            },
        )
        .direct(),
    )?;

    let snapshot = config_snapshot(config);
    registry.register(
        HandlerDescriptor::resource(
            "server_config",
            "server://config",
            "Get server configuration",
            move |_| Ok(snapshot.clone()),
        )
        .direct(),
    )
}

fn config_snapshot(config: &ServerConfig) -> Value {
    json!({
        "host": config.host,
        "port": config.port,
        "workers": config.workers,
        "task_timeout_secs": config.task_timeout.as_secs(),
        "host_poll_interval_ms": config.poll_interval.as_millis() as u64,
        "max_body_bytes": config.max_body_bytes
    })
}
