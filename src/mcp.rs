//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to the MCP tool protocol served over
//! stdio. `tools/list` advertises every registered tool with its input
//! schema; `tools/call` checks the arguments, runs the tool and returns
//! the structured result alongside a JSON and a text content part.
//!
//! Failures are JSON-RPC errors: unknown tools map to `-32601`, bad
//! parameters to `-32602`, and anything else to `-32603`. Calls are
//! handled one at a time.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};
use tokio::sync::Mutex;

use crate::error::ToolError;
use crate::traits::{ToolContext, ToolRegistry};

/// Bridges the tool registry to the MCP JSON-RPC protocol.
#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
    in_flight: Arc<Mutex<()>>,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self {
            tools,
            ctx,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Convert a docval tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match tool.parameters_schema() {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    fn to_mcp_error(err: ToolError) -> McpError {
        McpError::new(ErrorCode(err.code()), err.to_string(), None)
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "docval".to_string(),
                title: Some("docval".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Documentation validation for software projects. Use check_docs to see whether a \
                 project has documentation, and validate_docs to run the freshness, consistency, \
                 best-practice, coverage and code-style validators."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let _guard = self.in_flight.lock().await;
        tracing::info!(tool = %request.name, "tool call");
        let output = self
            .tools
            .call(&request.name, args, &self.ctx)
            .await
            .map_err(|e| {
                tracing::warn!(tool = %request.name, code = e.code(), error = %e, "tool call failed");
                Self::to_mcp_error(e)
            })?;

        let mut result = CallToolResult::success(vec![
            Content::json(&output.structured)?,
            Content::text(output.text),
        ]);
        result.structured_content = Some(output.structured);
        Ok(result)
    }
}
