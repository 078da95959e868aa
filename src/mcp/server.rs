//! MCP request dispatch
//!
//! Maps each JSON-RPC method onto the shared [`Toolbox`]. Tool failures,
//! unknown tools and bad arguments are reported inside the tool result;
//! only malformed protocol traffic produces JSON-RPC errors.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::protocol::{
    CallToolResult, InitializeResult, McpError, McpMethod, McpRequest, McpResponse,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability, ToolsListResult,
    JSONRPC_VERSION, PROTOCOL_VERSION,
};
use super::schema;
use crate::tools::{ToolInvocation, ToolKind, Toolbox};

/// Name reported in the `initialize` handshake
pub const SERVER_NAME: &str = "kalidocker-security";

/// MCP tool server
#[derive(Debug, Clone)]
pub struct McpServer {
    toolbox: Arc<Toolbox>,
}

impl McpServer {
    pub fn new(toolbox: Arc<Toolbox>) -> Self {
        Self { toolbox }
    }

    /// Handle one request; notifications yield `None`
    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let method = McpMethod::from(request.method.as_str());

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }
        let id = request.id.clone();

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(McpResponse::err(
                id,
                McpError::invalid_request(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
            ));
        }

        let outcome = match method {
            McpMethod::Initialize => Ok(self.initialize()),
            McpMethod::Ping => Ok(json!({})),
            McpMethod::ToolsList => Ok(self.list_tools()),
            McpMethod::ToolsCall => self.call_tool(request.params).await,
            McpMethod::Initialized | McpMethod::Custom(_) => {
                Err(McpError::method_not_found(method.as_str()))
            }
        };

        Some(match outcome {
            Ok(result) => McpResponse::ok(id, result),
            Err(error) => {
                warn!(method = %request.method, error = %error, "Request failed");
                McpResponse::err(id, error)
            }
        })
    }

    fn initialize(&self) -> Value {
        info!("MCP client initialized");
        to_value(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        })
    }

    fn list_tools(&self) -> Value {
        to_value(&ToolsListResult {
            tools: schema::tool_definitions(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| McpError::invalid_params(format!("Invalid tools/call params: {}", e)))?;
        info!(tool = %params.name, "Tool call");

        let Some(kind) = ToolKind::mcp_tools().find(|k| k.mcp_name() == Some(params.name.as_str()))
        else {
            return Ok(tool_error(&params.name, format!("Unknown tool: {}", params.name)));
        };

        let invocation = match ToolInvocation::from_arguments(kind, params.arguments) {
            Ok(invocation) => invocation,
            Err(e) => {
                return Ok(tool_error(&params.name, format!("Invalid arguments: {}", e)));
            }
        };

        let result = self.toolbox.run(invocation).await;
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(format!("Failed to encode result: {}", e)))?;
        Ok(to_value(&CallToolResult::text(text)))
    }
}

/// Tool result describing a call that never reached a tool
fn tool_error(name: &str, error: String) -> Value {
    let payload = json!({
        "success": false,
        "error": error,
        "tool": name,
    });
    let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    to_value(&CallToolResult::error_text(text))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    // Protocol types contain only strings, numbers and maps
    serde_json::to_value(value).unwrap_or(Value::Null)
}
