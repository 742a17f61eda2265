//! MCP (Model Context Protocol) server implementation.
//!
//! This module provides an MCP server that exposes the goal, ledger, task and AI helper
//! operations as tools for AI agent integration. The server communicates via JSON-RPC over stdio.

/// Checks if the server has been initialized and returns an error if not.
macro_rules! require_init {
    ($self:expr) => {
        if !$self.check_initialized().await {
            return Self::uninitialized();
        }
    };
}

mod mcp_utils;
mod tools;

use crate::error::{ErrorType, IntoResult};
use crate::{AppContext, Config, Mode};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{
    CallToolResult, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::ErrorData as McpError;
use rmcp::{tool_handler, ServerHandler, ServiceExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The pocketplan MCP server.
#[derive(Clone)]
pub struct PocketplanServer {
    initialized: Arc<Mutex<bool>>,
    ctx: AppContext,
    tool_router: ToolRouter<PocketplanServer>,
}

impl PocketplanServer {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            initialized: Arc::new(Mutex::new(false)),
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    async fn check_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    fn uninitialized() -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::error(vec![rmcp::model::Content::text(
            "You have not yet initialized the service. Please call initialize_service first.",
        )]))
    }
}

#[tool_handler]
impl ServerHandler for PocketplanServer {
    /// Returns server information sent to the MCP client during initialization.
    ///
    /// Agents tend to treat `instructions` as optional reading, so the full usage instructions
    /// are returned by the `initialize_service` tool, which must be called before anything else.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pocketplan".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(include_str!("docs/INTRO.md").into()),
        }
    }
}

/// Transport type for the MCP server.
#[derive(Debug, Default)]
pub(crate) enum Io {
    #[default]
    Stdio,
    /// Mock transport for testing - holds one end of a duplex channel.
    #[cfg(test)]
    Mock(tokio::io::DuplexStream),
}

/// Opens the app context for `config` and serves MCP over `io` until the client disconnects or
/// an error occurs.
pub(crate) async fn run_server(config: Config, mode: Mode, io: Io) -> crate::Result<()> {
    let ctx = AppContext::open(&config, mode).await?;
    let server = PocketplanServer::new(ctx.clone());
    info!("Starting MCP server...");

    let service = match io {
        Io::Stdio => server
            .serve(stdio())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))
            .pub_result(ErrorType::Service)?,
        #[cfg(test)]
        Io::Mock(stream) => server
            .serve(stream)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))
            .pub_result(ErrorType::Service)?,
    };

    info!("MCP server running, waiting for requests...");

    let result = service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))
        .pub_result(ErrorType::Service);
    ctx.close().await;

    info!("MCP server shut down");
    result.map(|_| ())
}
