use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::services::{ChainService, CompletionService};

/// Single-step chain: one instruction prompt, one completion.
pub struct PromptChain {
    completions: Arc<dyn CompletionService>,
}

impl PromptChain {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self { completions }
    }
}

#[async_trait]
impl ChainService for PromptChain {
    async fn run(&self, system: &str, instructions: &str) -> Result<String> {
        tracing::debug!(model = %self.completions.model(), "Running chain step");
        self.completions.complete(system, instructions).await
    }
}

/// Parse a JSON reply, tolerating a surrounding markdown code fence.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| {
        AppError::MalformedOutput(format!("Expected JSON reply ({e}): {}", truncate(body, 200)))
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
