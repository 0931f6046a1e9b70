/// get_system_info tool
///
/// Reads nothing from the host application, so it is registered as direct
/// and answers without queueing behind host work.
use serde_json::{Value, json};

use crate::core::error::{HandlerError, RegistryError};
use crate::core::registry::{HandlerDescriptor, Registry};
use crate::core::schema::ParameterSchema;

/// Register the get_system_info tool as a direct handler.
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        HandlerDescriptor::tool(
            "get_system_info",
            "Get basic system information",
            ParameterSchema::new().strict(),
            system_info,
        )
        .direct(),
    )
}

fn system_info(_args: Value) -> Result<Value, HandlerError> {
    Ok(json!({
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpus": num_cpus::get(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
