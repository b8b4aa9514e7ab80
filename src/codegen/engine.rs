use std::sync::Arc;

use async_trait::async_trait;

use crate::codegen::tools::{ToolOutput, ToolRegistry};
use crate::error::{AppError, Result};
use crate::services::completion::{
    ClaudeClient, ContentBlock, Message, MessagesRequest, MessagesResponse,
};
use crate::services::CompletionService;
use crate::workspace::Workspace;

/// Model endpoint that understands tool-use turns.
#[async_trait]
pub trait ToolUseModel: Send + Sync {
    fn model(&self) -> &str;
    fn max_tokens(&self) -> u32;
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse>;
}

#[async_trait]
impl ToolUseModel for ClaudeClient {
    fn model(&self) -> &str {
        CompletionService::model(self)
    }

    fn max_tokens(&self) -> u32 {
        ClaudeClient::max_tokens(self)
    }

    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        self.send_message(request).await
    }
}

#[async_trait]
impl<T: ToolUseModel + ?Sized> ToolUseModel for Arc<T> {
    fn model(&self) -> &str {
        (**self).model()
    }

    fn max_tokens(&self) -> u32 {
        (**self).max_tokens()
    }

    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        (**self).send(request).await
    }
}

pub struct AgentEngine<M> {
    model: M,
    tools: ToolRegistry,
    max_turns: u32,
}

impl<M: ToolUseModel> AgentEngine<M> {
    pub fn new(model: M, tools: ToolRegistry, max_turns: u32) -> Self {
        Self {
            model,
            tools,
            max_turns,
        }
    }

    #[cfg(test)]
    pub(crate) fn model(&self) -> &M {
        &self.model
    }

    /// Run the tool loop until the model ends its turn; returns its final text.
    ///
    /// API failures and the turn limit are errors. Tool failures are fed back
    /// to the model so it can recover.
    pub async fn run(
        &self,
        system_prompt: &str,
        workspace: &Workspace,
        initial_message: &str,
    ) -> Result<String> {
        let tool_definitions = self.tools.definitions();
        let mut messages = vec![Message::user_text(initial_message)];
        let mut total_input_tokens = 0u32;
        let mut total_output_tokens = 0u32;

        for turn in 0..self.max_turns {
            tracing::info!(turn, "Codegen turn");

            let request = MessagesRequest {
                model: self.model.model().to_string(),
                max_tokens: self.model.max_tokens(),
                system: system_prompt.to_string(),
                messages: messages.clone(),
                tools: tool_definitions.clone(),
            };
            let response = self.model.send(&request).await?;

            total_input_tokens += response.usage.input_tokens;
            total_output_tokens += response.usage.output_tokens;

            match response.stop_reason.as_deref().unwrap_or("unknown") {
                "end_turn" => {
                    tracing::info!(
                        total_input_tokens,
                        total_output_tokens,
                        turns = turn + 1,
                        "Codegen completed"
                    );
                    return Ok(response.text());
                }
                "tool_use" => {
                    let mut results = Vec::new();
                    for block in &response.content {
                        if let ContentBlock::ToolUse { id, name, input } = block {
                            results.push(self.execute_tool(workspace, id, name, input).await);
                        }
                    }
                    messages.push(Message::blocks("assistant", response.content));
                    messages.push(Message::blocks("user", results));
                }
                "max_tokens" => {
                    tracing::warn!("Codegen response hit max_tokens limit");
                    messages.push(Message::blocks("assistant", response.content));
                    messages.push(Message::user_text("Please continue."));
                }
                other => {
                    return Err(AppError::Agent(format!("Unexpected stop reason: {other}")));
                }
            }
        }

        tracing::warn!(max_turns = self.max_turns, "Codegen hit turn limit");
        Err(AppError::Agent(format!(
            "Turn limit of {} reached before code generation finished",
            self.max_turns
        )))
    }

    async fn execute_tool(
        &self,
        workspace: &Workspace,
        id: &str,
        name: &str,
        input: &serde_json::Value,
    ) -> ContentBlock {
        let (content, is_error) = match self.tools.get(name) {
            None => (format!("Unknown tool: {name}"), true),
            Some(tool) => match tool.execute(workspace, input).await {
                Ok(ToolOutput::Success(content)) => {
                    tracing::debug!(tool = %name, "Tool succeeded");
                    (content, false)
                }
                Ok(ToolOutput::Error(error)) => {
                    tracing::warn!(tool = %name, error = %error, "Tool error");
                    (error, true)
                }
                Err(e) => {
                    tracing::error!(tool = %name, error = %e, "Tool execution error");
                    (format!("Internal error: {e}"), true)
                }
            },
        };

        ContentBlock::ToolResult {
            tool_use_id: id.to_string(),
            content,
            is_error: is_error.then_some(true),
        }
    }
}
