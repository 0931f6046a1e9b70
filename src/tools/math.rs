/// add_numbers tool
use serde_json::{Value, json};

use crate::core::error::{HandlerError, RegistryError};
use crate::core::registry::{HandlerDescriptor, Registry};
use crate::core::schema::{ParameterSchema, Property};

/// Register the add_numbers tool. Both operands are required and nothing
/// else is accepted.
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    let schema = ParameterSchema::new()
        .property("a", Property::integer("First number to add"))
        .property("b", Property::integer("Second number to add"))
        .require("a")
        .require("b")
        .strict();
    registry.register(HandlerDescriptor::tool(
        "add_numbers",
        "Add two numbers together",
        schema,
        add,
    ))
}

fn add(args: Value) -> Result<Value, HandlerError> {
    let operand = |key: &str| {
        args.get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| HandlerError::new(format!("'{key}' must be a 64-bit integer")))
    };
    let (a, b) = (operand("a")?, operand("b")?);
    a.checked_add(b)
        .map(|sum| json!(sum))
        .ok_or_else(|| HandlerError::new(format!("{a} + {b} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds() {
        assert_eq!(add(json!({"a": 2, "b": 3})).unwrap(), json!(5));
        assert_eq!(add(json!({"a": -7, "b": 3})).unwrap(), json!(-4));
    }

    #[test]
    fn overflow_is_a_handler_error() {
        let err = add(json!({"a": i64::MAX, "b": 1})).unwrap_err();
        assert!(err.message().contains("overflows"));
    }
}
