use anyhow::Result;
use async_trait::async_trait;

/// Completion seam used by tools that need free-form generation. Kept as a
/// single-method trait so tests can substitute a canned client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
