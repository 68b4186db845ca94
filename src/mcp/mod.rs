//! MCP server: JSON-RPC 2.0 over stdio exposing conversation tools and
//! read-only resources to AI assistants.

mod handlers;
mod resources;
mod server;
mod tools;

pub use server::Server;

/// MCP protocol revision implemented here.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "jobtrail";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
