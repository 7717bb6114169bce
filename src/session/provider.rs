//! Generation provider trait

use anyhow::Result;
use async_trait::async_trait;

/// Remote text-generation backend holding per-session conversations
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Start a conversation, optionally primed with a system prompt
    async fn create_session(&self, system_prompt: Option<String>) -> Result<SessionHandle>;

    /// Send one turn and return the raw response text
    async fn send_message(&self, session_id: &str, message: &str) -> Result<String>;

    /// Forget a conversation
    async fn end_session(&self, session_id: &str) -> Result<()>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Handle to a created session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Our internal session ID
    pub internal_id: String,
    /// The provider's session ID
    pub provider_id: String,
}
