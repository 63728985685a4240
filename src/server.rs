//! MCP server over stdio.
//!
//! Reads line-delimited JSON-RPC from stdin and writes responses to
//! stdout; logs go to stderr. The server exposes the tools of a
//! [`ToolRegistry`] through the [`McpBridge`].
//!
//! # Client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "docval": {
//!       "command": "docval",
//!       "args": ["--config", "/path/to/docval.toml", "serve", "mcp"]
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;

use crate::engine::Engine;
use crate::mcp::McpBridge;
use crate::traits::{ToolContext, ToolRegistry};

/// Serve the built-in tools on stdio until the client disconnects.
pub async fn run_stdio(engine: Arc<Engine>) -> Result<()> {
    let tools = ToolRegistry::with_builtins(engine.validators());
    run_stdio_with_tools(engine, tools).await
}

/// Serve a custom tool set on stdio.
pub async fn run_stdio_with_tools(engine: Arc<Engine>, tools: ToolRegistry) -> Result<()> {
    let names: Vec<&str> = tools.tools().iter().map(|t| t.name()).collect();
    tracing::info!(tools = ?names, "serving MCP on stdio");

    let bridge = McpBridge::new(Arc::new(tools), ToolContext::new(engine));
    let service = bridge
        .serve(stdio())
        .await
        .inspect_err(|error| tracing::error!("serving error: {:?}", error))?;
    service.waiting().await?;

    tracing::info!("MCP client disconnected");
    Ok(())
}
