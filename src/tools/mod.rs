/// Tools Module
///
/// The demo catalog. Each module exports a `register` function that adds its
/// handlers to the registry during server initialization.

pub mod greeting;
pub mod math;
pub mod status;
pub mod system;
pub mod viewport;

use crate::core::config::ServerConfig;
use crate::core::error::RegistryError;
use crate::core::registry::Registry;

/// Register every demo handler, tools first.
///
/// Add new registrations here following this pattern:
/// `your_module::register(registry)?;`
pub fn register_all(registry: &mut Registry, config: &ServerConfig) -> Result<(), RegistryError> {
    greeting::register(registry)?;
    math::register(registry)?;
    system::register(registry)?;
    status::register(registry, config)?;
    viewport::register(registry)?;
    Ok(())
}
