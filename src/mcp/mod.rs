// src/mcp/mod.rs
// MCP server exposing generate_image and refine_image

pub mod requests;
pub mod responses;

use std::sync::Arc;

use rmcp::{
    ErrorData, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::ToolCallContext, wrapper::Parameters},
    model::{
        CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tracing::debug;

use crate::tools::ImageTools;
use requests::{GenerateImageRequest, RefineImageRequest};

/// MCP server state for one connection
#[derive(Clone)]
pub struct DiagramServer {
    tools: Arc<dyn ImageTools>,
    tool_router: ToolRouter<Self>,
}

impl DiagramServer {
    pub fn new(tools: Arc<dyn ImageTools>) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl DiagramServer {
    #[tool(
        description = "Generate a diagram or image from a text description. The diagram type, aspect ratio and resolution are inferred from the prompt unless given. If the prompt is ambiguous, a question is returned instead; call again with an explicit type."
    )]
    async fn generate_image(
        &self,
        Parameters(req): Parameters<GenerateImageRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.generate_image(req).await)
    }

    #[tool(
        description = "Refine the most recently generated image in this session. Keeps the layout and style and applies only the requested change."
    )]
    async fn refine_image(
        &self,
        Parameters(req): Parameters<RefineImageRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.refine_image(req).await)
    }
}

impl ServerHandler for DiagramServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "diagram-mcp".into(),
                title: Some("Diagram MCP - prompt-to-diagram image generation".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use generate_image to create technical diagrams and visuals from a description, then refine_image to adjust the latest result.".into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            debug!(tool = %request.name, "Tool call");
            let ctx = ToolCallContext::new(self, request, context);
            self.tool_router.call(ctx).await
        }
    }
}
