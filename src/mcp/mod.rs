//! MCP (Model Context Protocol) Server Implementation
//!
//! JSON-RPC 2.0 over line-delimited stdio, exposing the vector database
//! operations as MCP tools.


pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;

pub use errors::{McpError, McpResult};
pub use server::{ConnectionState, McpServer, MessageHandler, ToolHandler};
pub use tools::register_vec_db_tools;

use std::sync::Arc;

use anyhow::Result;

use crate::indexer::VecDbService;

pub const SERVER_NAME: &str = "md-vec-mcp";

/// Server with every vector database tool registered
#[inline]
pub async fn build_server(service: Arc<VecDbService>) -> Result<McpServer> {
    let server = McpServer::new(SERVER_NAME.to_string(), env!("CARGO_PKG_VERSION").to_string())?
        .with_instructions(
            "Search markdown documents by meaning. Ingest with build_vec_db, then query a \
             document with search_vec_db.",
        );
    register_vec_db_tools(&server, service).await?;
    Ok(server)
}
