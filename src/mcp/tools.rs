//! MCP Tools Implementation
//!
//! The vector database tools: build, search, clear and status. Each handler
//! delegates straight to [`VecDbService`].

use crate::indexer::{DEFAULT_TOP_K, VecDbService};
use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Default docs root for `build_vec_db`
pub const DEFAULT_DOCS_ROOT: &str = "docs";

/// Deserialize the tool arguments into `T`
fn parse_arguments<T: DeserializeOwned>(params: CallToolParams) -> Result<T> {
    let arguments = Value::Object(params.arguments.unwrap_or_default());
    serde_json::from_value(arguments).map_err(|e| {
        McpError::InvalidToolParameters {
            tool: params.name,
            message: e.to_string(),
        }
        .into()
    })
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize tool result")
}

fn default_docs_root() -> PathBuf {
    PathBuf::from(DEFAULT_DOCS_ROOT)
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize)]
struct BuildArgs {
    #[serde(default = "default_docs_root")]
    root: PathBuf,
    save_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query_text: String,
    md_file_path: PathBuf,
    #[serde(default = "default_top_k")]
    top_k: usize,
    save_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct StoreArgs {
    md_file_path: PathBuf,
    save_path: Option<PathBuf>,
}

/// Schema shared by the tools addressing one document's storage unit
fn store_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "md_file_path": {
                "type": "string",
                "description": "Markdown file whose vector database is used"
            },
            "save_path": {
                "type": "string",
                "description": "Optional: directory holding the database (default: the file's directory)"
            }
        },
        "required": ["md_file_path"],
        "additionalProperties": false
    })
}

/// Ingests every markdown file under a root directory
pub struct BuildVecDbHandler {
    service: Arc<VecDbService>,
}

impl BuildVecDbHandler {
    #[inline]
    pub fn new(service: Arc<VecDbService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "build_vec_db".to_string(),
            description: Some(
                "Chunk, embed and store every markdown file under a directory".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "root": {
                        "type": "string",
                        "description": "Directory walked recursively for markdown files (default: docs)"
                    },
                    "save_path": {
                        "type": "string",
                        "description": "Optional: directory for the vector databases (default: beside each file)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for BuildVecDbHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: BuildArgs = parse_arguments(params)?;
        debug!("build_vec_db: root={}", args.root.display());

        let report = self
            .service
            .build_vec_db(&args.root, args.save_path.as_deref())
            .await?;
        Ok(CallToolResult::text(pretty(&report)?))
    }
}

/// Similarity search over one document's vector database
pub struct SearchVecDbHandler {
    service: Arc<VecDbService>,
}

impl SearchVecDbHandler {
    #[inline]
    pub fn new(service: Arc<VecDbService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "search_vec_db".to_string(),
            description: Some(
                "Find the chunks of a markdown file closest to a query (lower score is more similar)"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query_text": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "md_file_path": {
                        "type": "string",
                        "description": "Markdown file whose vector database is searched"
                    },
                    "top_k": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Maximum number of results (default: 5)"
                    },
                    "save_path": {
                        "type": "string",
                        "description": "Optional: directory holding the database (default: the file's directory)"
                    }
                },
                "required": ["query_text", "md_file_path"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchVecDbHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: SearchArgs = parse_arguments(params)?;
        debug!(
            "search_vec_db: query='{}', file={}, top_k={}",
            args.query_text,
            args.md_file_path.display(),
            args.top_k
        );

        let hits = self
            .service
            .search_vec_db(
                &args.query_text,
                &args.md_file_path,
                args.top_k,
                args.save_path.as_deref(),
            )
            .await?;
        Ok(CallToolResult::text(pretty(&hits)?))
    }
}

/// Empties one document's vector database
pub struct ClearVecDbHandler {
    service: Arc<VecDbService>,
}

impl ClearVecDbHandler {
    #[inline]
    pub fn new(service: Arc<VecDbService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "clear_vec_db".to_string(),
            description: Some("Delete every chunk and vector of a markdown file".to_string()),
            input_schema: store_schema(),
        }
    }
}

#[async_trait]
impl ToolHandler for ClearVecDbHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: StoreArgs = parse_arguments(params)?;

        let db_path = self
            .service
            .clear_vec_db(&args.md_file_path, args.save_path.as_deref())
            .await?;
        Ok(CallToolResult::text(format!(
            "Cleared vector database {}",
            db_path.display()
        )))
    }
}

/// Counts and consistency of one document's vector database
pub struct VecDbStatusHandler {
    service: Arc<VecDbService>,
}

impl VecDbStatusHandler {
    #[inline]
    pub fn new(service: Arc<VecDbService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "vec_db_status".to_string(),
            description: Some(
                "Report chunk and vector counts of a markdown file's vector database".to_string(),
            ),
            input_schema: store_schema(),
        }
    }
}

#[async_trait]
impl ToolHandler for VecDbStatusHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: StoreArgs = parse_arguments(params)?;

        let status = self
            .service
            .status(&args.md_file_path, args.save_path.as_deref())
            .await?;
        Ok(CallToolResult::text(pretty(&status)?))
    }
}

/// Register all vector database tools on `server`
#[inline]
pub async fn register_vec_db_tools(server: &McpServer, service: Arc<VecDbService>) -> Result<()> {
    server
        .register_tool(
            BuildVecDbHandler::tool_definition(),
            BuildVecDbHandler::new(Arc::clone(&service)),
        )
        .await
        .context("Failed to register build_vec_db tool")?;

    server
        .register_tool(
            SearchVecDbHandler::tool_definition(),
            SearchVecDbHandler::new(Arc::clone(&service)),
        )
        .await
        .context("Failed to register search_vec_db tool")?;

    server
        .register_tool(
            ClearVecDbHandler::tool_definition(),
            ClearVecDbHandler::new(Arc::clone(&service)),
        )
        .await
        .context("Failed to register clear_vec_db tool")?;

    server
        .register_tool(
            VecDbStatusHandler::tool_definition(),
            VecDbStatusHandler::new(service),
        )
        .await
        .context("Failed to register vec_db_status tool")?;

    Ok(())
}
