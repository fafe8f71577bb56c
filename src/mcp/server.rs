//! MCP Server Implementation
//!
//! Tool registration, message routing and the line-delimited stdio loop.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use crate::mcp::validation::McpValidator;
use anyhow::Result;
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Tool handler trait for implementing tool execution.
///
/// An `Err` carrying an [`McpError`] becomes a JSON-RPC error; any other
/// error is reported to the client as a tool result with `isError: true`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

struct RegisteredTool {
    tool: Tool,
    schema: JSONSchema,
    handler: Box<dyn ToolHandler>,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// MCP Server state and configuration
pub struct McpServer {
    pub server_info: Implementation,
    pub capabilities: ServerCapabilities,
    instructions: Option<String>,
    tools: RwLock<HashMap<String, RegisteredTool>>,
    connection_state: RwLock<ConnectionState>,
    validator: McpValidator,
}

impl McpServer {
    #[inline]
    pub fn new(name: String, version: String) -> Result<Self> {
        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        Ok(Self {
            server_info: Implementation { name, version },
            capabilities,
            instructions: None,
            tools: RwLock::new(HashMap::new()),
            connection_state: RwLock::new(ConnectionState::Uninitialized),
            validator: McpValidator::new()?,
        })
    }

    /// Text returned to clients in the initialize result
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool; its input schema is compiled once here
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        let schema = McpValidator::compile(&tool.input_schema)?;
        let tool_name = tool.name.clone();

        self.tools.write().await.insert(
            tool_name.clone(),
            RegisteredTool {
                tool,
                schema,
                handler: Box::new(handler),
            },
        );

        debug!("Registered tool: {}", tool_name);
        Ok(())
    }

    /// Names of the registered tools, sorted
    #[inline]
    pub async fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Answer one message per line read from `reader` until EOF.
    ///
    /// Lines that are not UTF-8 get a parse error; only EOF or a read failure ends the loop.
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let handler = MessageHandler::new(Arc::clone(&self));
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let response = match std::str::from_utf8(&buffer) {
                        Ok(line) => {
                            let message = line.trim();
                            if message.is_empty() {
                                continue;
                            }
                            handler.handle_line(message).await
                        }
                        Err(e) => {
                            let error = McpError::ParseError {
                                message: format!("input is not valid UTF-8: {}", e),
                            };
                            error.log();
                            Some(error.to_error_response(None))
                        }
                    };

                    if let Some(response) = response {
                        send_message(&mut writer, &response).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading from input: {}", e);
                    break;
                }
            }
        }

        *self.connection_state.write().await = ConnectionState::Closed;
        info!("MCP server stopped");
        Ok(())
    }

    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }
}

async fn send_message<W>(writer: &mut W, message: &JsonRpcMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(message)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Routes parsed messages to the server's handlers
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl MessageHandler {
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Process one raw line; notifications and client responses yield `None`
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcMessage> {
        let raw_value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                let error = McpError::ParseError {
                    message: e.to_string(),
                };
                error.log();
                return Some(error.to_error_response(None));
            }
        };

        match self.server.validator.validate_raw_message(&raw_value) {
            Ok(message) => self.process_message(message).await,
            Err(e) => {
                let id = raw_value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
                let error = McpError::InvalidRequest {
                    message: e.to_string(),
                };
                error.log();
                Some(error.to_error_response(id))
            }
        }
    }

    #[inline]
    pub async fn process_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!("Handling request {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            _ => Err(McpError::MethodNotFound {
                method: request.method.clone(),
            }),
        };

        match result {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, request.id)),
            Err(error) => {
                error.log();
                error.to_error_response(Some(request.id))
            }
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                *self.server.connection_state.write().await = ConnectionState::Ready;
                info!("Server ready to handle requests");
            }
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    fn method_params(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let params = params.ok_or_else(|| McpError::InvalidParameters {
            message: format!("{} request missing parameters", method),
        })?;

        self.server
            .validator
            .validate_method_params(method, &params)
            .map_err(|e| McpError::InvalidParameters {
                message: e.to_string(),
            })?;
        Ok(params)
    }

    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params = self.method_params("initialize", params)?;
        let params: InitializeParams =
            serde_json::from_value(params).map_err(|e| McpError::InvalidParameters {
                message: e.to_string(),
            })?;

        if !self
            .server
            .validator
            .is_protocol_version_supported(&params.protocol_version)
        {
            return Err(McpError::UnsupportedProtocolVersion {
                version: params.protocol_version,
                supported: self
                    .server
                    .validator
                    .supported_protocol_versions()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        *self.server.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {}",
            params.client_info.name, params.client_info.version
        );
        to_value(&result)
    }

    #[inline]
    pub async fn handle_list_tools(&self) -> McpResult<Value> {
        let tools = self.server.tools.read().await;
        let mut tools_vec: Vec<Tool> = tools.values().map(|t| t.tool.clone()).collect();
        tools_vec.sort_by(|a, b| a.name.cmp(&b.name));

        to_value(&ListToolsResult { tools: tools_vec })
    }

    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> McpResult<Value> {
        let params = self.method_params("tools/call", params)?;
        let params: CallToolParams =
            serde_json::from_value(params).map_err(|e| McpError::InvalidParameters {
                message: e.to_string(),
            })?;

        let tools = self.server.tools.read().await;
        let registered = tools.get(&params.name).ok_or_else(|| McpError::ToolNotFound {
            name: params.name.clone(),
        })?;

        let arguments = Value::Object(params.arguments.clone().unwrap_or_default());
        McpValidator::check(&registered.schema, &arguments).map_err(|message| {
            McpError::InvalidToolParameters {
                tool: params.name.clone(),
                message,
            }
        })?;

        let tool_name = params.name.clone();
        let result = match registered.handler.handle(params).await {
            Ok(result) => result,
            Err(e) => match e.downcast::<McpError>() {
                Ok(protocol_error) => return Err(protocol_error),
                Err(e) => {
                    warn!("Tool {} failed: {:#}", tool_name, e);
                    CallToolResult::error(format!("{:#}", e))
                }
            },
        };

        to_value(&result)
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError {
        message: e.to_string(),
    })
}
