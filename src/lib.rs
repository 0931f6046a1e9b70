//! MCP server that runs its handlers on a single host thread.
//!
//! HTTP workers decode JSON-RPC requests and hand host-bound work to
//! [`core::bridge::TaskBridge`]; the host application's event loop runs it
//! through [`core::host::HostPump::drain`], one task at a time.

pub mod core;
pub mod tools;
