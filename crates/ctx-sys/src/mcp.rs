//! MCP `ServerHandler` bridge exposing a single `context_query` tool.
//!
//! Grounded on the teacher's `McpBridge` (same `ServerHandler` shape,
//! same "tool errors become `CallToolResult::error`, never a protocol
//! error" rule) simplified from a general tool/agent registry down to one
//! fixed tool, since ctx-sys has exactly one externally useful operation.

use std::borrow::Cow;
use std::sync::Arc;

use ctx_sys_core::api::QueryContextOptions;
use ctx_sys_core::project::ProjectHandle;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::engine::ContextEngine;

const TOOL_NAME: &str = "context_query";

#[derive(Clone)]
pub struct McpBridge {
    engine: Arc<ContextEngine>,
    project: ProjectHandle,
}

impl McpBridge {
    pub fn new(engine: Arc<ContextEngine>, project: ProjectHandle) -> Self {
        Self { engine, project }
    }

    fn tool_descriptor() -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "max_tokens": { "type": "integer" },
                "strategies": { "type": "array", "items": { "type": "string" } },
                "include_types": { "type": "array", "items": { "type": "string" } },
                "min_score": { "type": "number" },
                "expand": { "type": "boolean" },
                "decompose": { "type": "boolean" },
                "gate": { "type": "boolean" },
                "hyde": { "type": "boolean" }
            },
            "required": ["query"]
        });
        let input_schema = match schema {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Borrowed(TOOL_NAME),
            title: Some("Query project context".to_string()),
            description: Some(Cow::Borrowed(
                "Retrieve token-budgeted, relevance-ranked context for a natural-language query \
                 against the indexed project.",
            )),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "ctx-sys".to_string(),
                title: Some("ctx-sys".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "ctx-sys — project-scoped context retrieval. Call context_query with a natural \
                 language query to get back a token-budgeted context block plus its sources."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(vec![Self::tool_descriptor()])))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        (name == TOOL_NAME).then(Self::tool_descriptor)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if request.name != TOOL_NAME {
            return Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            ));
        }

        let mut args = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
        if let serde_json::Value::Object(map) = &mut args {
            map.entry("project").or_insert_with(|| serde_json::Value::String(self.project.id().to_string()));
        }

        let opts: QueryContextOptions = match serde_json::from_value(args) {
            Ok(opts) => opts,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(format!("invalid arguments: {e}"))])),
        };

        match self.engine.query_context(&self.project, opts, CancellationToken::new()).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => {
                error!(error = %e, "context_query failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}
