/// Core Server Framework Module
///
/// - bridge.rs / host.rs: hand work to the host thread and drain it there
/// - registry.rs, schema.rs, uri.rs: handler catalog and argument checking
/// - protocol.rs, dispatcher.rs: JSON-RPC envelope and MCP method routing
/// - server.rs: HTTP listener
/// - config.rs, error.rs: settings and error types

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod uri;
