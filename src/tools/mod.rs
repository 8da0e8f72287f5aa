pub mod attitude_context;
pub mod update_group_attitude;
pub mod update_user_attitude;

use attitude_context::AttitudeContextParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;
use update_group_attitude::UpdateGroupAttitudeParams;
use update_user_attitude::UpdateUserAttitudeParams;

use crate::attitude::manage::{AttitudeService, GroupPatch, UserPatch};
use crate::attitude::types::ChatKey;
use crate::config::RapportConfig;

/// The rapport MCP tool handler. Holds the attitude service and config and
/// exposes the tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct RapportTools {
    tool_router: ToolRouter<Self>,
    service: Arc<AttitudeService>,
    config: Arc<RapportConfig>,
}

#[tool_router]
impl RapportTools {
    pub fn new(service: Arc<AttitudeService>, config: Arc<RapportConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
            config,
        }
    }

    /// Update the agent's attitude toward one user.
    #[tool(description = "Update your attitude toward a user. Only the fields you pass are changed; the record is created if it does not exist yet.")]
    async fn update_user_attitude(
        &self,
        Parameters(params): Parameters<UpdateUserAttitudeParams>,
    ) -> Result<String, String> {
        let patch = UserPatch {
            nickname: params.nickname,
            attitude: params.attitude,
            relationship: params.relationship,
            other: params.other,
        };

        let record = self
            .service
            .update_user(&params.user_key, &patch)
            .await
            .map_err(|e| format!("update_user_attitude failed: {e}"))?;

        serde_json::to_string(&record).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Update the agent's attitude in a group chat.
    #[tool(description = "Update your general attitude in a group chat, identified by its chat key. Only the fields you pass are changed.")]
    async fn update_group_attitude(
        &self,
        Parameters(params): Parameters<UpdateGroupAttitudeParams>,
    ) -> Result<String, String> {
        let chat_key = ChatKey::parse(&params.chat_key)?;
        let patch = GroupPatch {
            attitude: params.attitude,
            other: params.other,
        };

        let record = self
            .service
            .update_group(&chat_key.channel_id, &patch)
            .await
            .map_err(|e| format!("update_group_attitude failed: {e}"))?;

        serde_json::to_string(&record).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Build the attitude prompt block for a conversation.
    #[tool(description = "Get the attitude context for a chat: update instructions plus the current attitude toward recent speakers and the group.")]
    async fn attitude_context(
        &self,
        Parameters(params): Parameters<AttitudeContextParams>,
    ) -> Result<String, String> {
        tracing::info!(chat_key = %params.chat_key, "attitude_context called");
        Ok(crate::prompt::inject(&self.service, &self.config.prompt, &params.chat_key).await)
    }
}

#[tool_handler]
impl ServerHandler for RapportTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Rapport keeps the agent's attitude toward users and groups. Call attitude_context \
                 before replying, and update_user_attitude or update_group_attitude when an \
                 attitude changes."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
