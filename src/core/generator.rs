use async_trait::async_trait;

use crate::core::error::LlmError;

/// Seam to the language-model collaborator. Returns the raw completion for a
/// natural-language question; the text may wrap the SQL statement in prose or
/// markdown fences, or contain no SQL at all.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn complete(&self, question: &str) -> Result<String, LlmError>;
}
