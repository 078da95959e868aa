//! MCP (Model Context Protocol) server
//!
//! Exposes the security tools to an MCP client over stdio.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Schema** (`schema`): input schemas advertised by `tools/list`
//! 3. **Server** (`server`): method dispatch onto the [`Toolbox`](crate::tools::Toolbox)
//! 4. **Transport Layer** (`transport`): newline-delimited framing over stdio
//!
//! stdout carries protocol messages only; all logging goes to stderr.

pub mod protocol;
pub mod schema;
pub mod server;
pub mod transport;

pub use protocol::{
    CallToolResult, McpError, McpMethod, McpRequest, McpResponse, RequestId, Tool, ToolCallParams,
    PROTOCOL_VERSION,
};
pub use server::{McpServer, SERVER_NAME};
pub use transport::serve;

/// Serve MCP on the process's stdin and stdout until stdin closes or `shutdown` fires
pub async fn serve_stdio(
    server: McpServer,
    shutdown: tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(server, stdin, tokio::io::stdout(), shutdown).await
}
