//! Conversational gateway in front of a generation provider
//!
//! Holds at most one session handle. The handle is created lazily on the
//! first request after construction or `reset`, and `reset` must be called
//! whenever the active project changes so one conversation never spans two
//! projects.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::prompts::{self, PageContext};
use super::provider::{GenerationProvider, SessionHandle};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No API key configured for the generation backend")]
    MissingCredential,

    #[error("Generation backend returned an empty response")]
    EmptyResponse,

    #[error("Generation request failed: {0}")]
    Remote(anyhow::Error),
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<GatewayError>() {
            Ok(e) => e,
            Err(other) => GatewayError::Remote(other),
        }
    }
}

/// Classified model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub content: String,
    /// True when the content is a full HTML document
    pub is_code: bool,
}

/// True iff the trimmed text starts with a doctype or `<html` root tag
pub fn is_html_document(text: &str) -> bool {
    let trimmed = text.trim_start().as_bytes();
    ["<!doctype html", "<html"].iter().any(|marker| {
        trimmed.len() >= marker.len() && trimmed[..marker.len()].eq_ignore_ascii_case(marker.as_bytes())
    })
}

pub struct AiGateway {
    provider: Arc<dyn GenerationProvider>,
    session: Mutex<Option<SessionHandle>>,
}

impl AiGateway {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            session: Mutex::new(None),
        }
    }

    /// Discard the current conversation
    pub async fn reset(&self) {
        let handle = self.session.lock().await.take();
        if let Some(handle) = handle {
            debug!("Resetting generation session {}", handle.internal_id);
            if let Err(e) = self.provider.end_session(&handle.provider_id).await {
                warn!("Failed to end session {}: {}", handle.provider_id, e);
            }
        }
    }

    /// Whether a conversation is currently open
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn session_id(&self) -> Result<String, GatewayError> {
        let mut slot = self.session.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.provider_id.clone());
        }

        let handle = self
            .provider
            .create_session(Some(prompts::SYSTEM_INSTRUCTION.to_string()))
            .await?;
        debug!("Opened generation session {}", handle.internal_id);
        let id = handle.provider_id.clone();
        *slot = Some(handle);
        Ok(id)
    }

    /// Send one request, prefixed with the project context when given
    pub async fn send(
        &self,
        prompt: &str,
        context: Option<&PageContext>,
    ) -> Result<GenerationResponse, GatewayError> {
        let session_id = self.session_id().await?;

        let message = match context {
            Some(context) => prompts::with_context(prompt, context),
            None => prompt.to_string(),
        };

        let content = self.provider.send_message(&session_id, &message).await?;
        if content.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        let is_code = is_html_document(&content);
        Ok(GenerationResponse { content, is_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_strict_prefix() {
        assert!(is_html_document("<!DOCTYPE html><html></html>"));
        assert!(is_html_document("  \n<!doctype html>"));
        assert!(is_html_document("<html lang=\"en\">"));
        assert!(!is_html_document("Here is your page:\n<!DOCTYPE html>"));
        assert!(!is_html_document("```html\n<!DOCTYPE html>```"));
        assert!(!is_html_document("<div>fragment</div>"));
        assert!(!is_html_document(""));
    }

    #[test]
    fn provider_errors_keep_their_kind() {
        let err: GatewayError = anyhow::Error::from(GatewayError::MissingCredential).into();
        assert!(matches!(err, GatewayError::MissingCredential));

        let err: GatewayError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, GatewayError::Remote(_)));
    }
}
