/// hello_world tool
use serde_json::Value;

use crate::core::error::{HandlerError, RegistryError};
use crate::core::registry::{HandlerDescriptor, Registry};
use crate::core::schema::{ParameterSchema, Property};

/// Register the hello_world tool.
///
/// # Arguments
/// * `registry` - Registry the tool is added to
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    let schema = ParameterSchema::new().property("name", Property::string("Name to say hello to"));
    registry.register(HandlerDescriptor::tool(
        "hello_world",
        "Say hello to someone",
        schema,
        hello,
    ))
}

fn hello(args: Value) -> Result<Value, HandlerError> {
    let name = args.get("name").and_then(Value::as_str).unwrap_or("World");
    Ok(Value::String(format!("Hello, {name}!")))
}
