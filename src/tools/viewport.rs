/// Viewport snapshot resource: `host://snapshot{?view,width,height}`.
///
/// Stands in for the host application's camera. The viewport lives in a
/// thread local, so each thread sees its own copy and only the host thread's
/// copy is the real one. The handler must stay host-bound.
use std::cell::RefCell;

use serde_json::{Value, json};

use crate::core::error::{HandlerError, RegistryError};
use crate::core::registry::{HandlerDescriptor, Registry};
use crate::core::schema::{ParameterSchema, Property};

/// Accepted values of the `view` parameter.
pub const ORIENTATIONS: [&str; 11] = [
    "current",
    "top",
    "bottom",
    "front",
    "back",
    "left",
    "right",
    "iso-top-left",
    "iso-top-right",
    "iso-bottom-left",
    "iso-bottom-right",
];

#[derive(Debug, Clone, PartialEq)]
struct Viewport {
    orientation: String,
    refreshes: u64,
}

thread_local! {
    static VIEWPORT: RefCell<Viewport> = RefCell::new(Viewport {
        orientation: "iso-top-left".to_string(),
        refreshes: 0,
    });
}

/// Register the snapshot template. The handler is host-bound.
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    let schema = ParameterSchema::new()
        .property(
            "view",
            Property::string("Camera orientation; 'current' keeps the camera as is")
                .one_of(ORIENTATIONS),
        )
        .property("width", Property::integer("Image width in pixels").range(16.0, 4096.0))
        .property("height", Property::integer("Image height in pixels").range(16.0, 4096.0))
        .strict();

    let descriptor = HandlerDescriptor::resource_template(
        "viewport_snapshot",
        "host://snapshot{?view,width,height}",
        "Orient the active viewport and describe what would be captured",
        snapshot,
    )?
    .with_schema(schema);
    registry.register(descriptor)
}

fn snapshot(args: Value) -> Result<Value, HandlerError> {
    // Arguments are already validated; absent ones fall back to defaults
    let view = args.get("view").and_then(Value::as_str).unwrap_or("current");
    let width = args.get("width").and_then(Value::as_u64).unwrap_or(512);
    let height = args.get("height").and_then(Value::as_u64).unwrap_or(512);

    VIEWPORT.with(|cell| {
        let mut viewport = cell
            .try_borrow_mut()
            .map_err(|_| HandlerError::new("viewport is busy"))?;
        // "current" keeps whatever orientation the viewport has
        if view != "current" {
            viewport.orientation = view.to_string();
        }
        viewport.refreshes += 1;

        Ok(json!({
            "view": viewport.orientation,
            "width": width,
            "height": height,
            "refreshes": viewport.refreshes,
            "thread": std::thread::current().name().unwrap_or("unnamed")
        }))
    })
}
