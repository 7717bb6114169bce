//! Gemini session provider implementation

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::gemini::GeminiClient;
use super::provider::{GenerationProvider, SessionHandle};
use crate::config::GeminiConfig;

pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &GeminiConfig) -> Self {
        Self::new(GeminiClient::new(config))
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn create_session(&self, system_prompt: Option<String>) -> Result<SessionHandle> {
        let provider_id = self.client.create_session(system_prompt).await?;

        Ok(SessionHandle {
            internal_id: Uuid::new_v4().to_string(),
            provider_id,
        })
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<String> {
        self.client.send_message(session_id, message).await
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        self.client.end_session(session_id).await;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }
}
