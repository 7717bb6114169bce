//! Gemini generateContent HTTP client
//!
//! The REST endpoint is stateless, so each conversation's turns are kept here
//! and replayed with every request.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::GeminiConfig;
use crate::session::gateway::GatewayError;

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    /// Conversations: session id -> system prompt and turns so far
    sessions: Arc<RwLock<HashMap<String, Conversation>>>,
}

#[derive(Debug, Clone, Default)]
struct Conversation {
    system_prompt: Option<String>,
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: &'a [Content],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    /// Create a new Gemini client with timeouts
    pub fn new(config: &GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            temperature: config.temperature,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => {
                error!("Gemini API key is missing");
                Err(GatewayError::MissingCredential.into())
            }
        }
    }

    /// Start a conversation
    pub async fn create_session(&self, system_prompt: Option<String>) -> Result<String> {
        self.api_key()?;

        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(
            id.clone(),
            Conversation {
                system_prompt,
                contents: Vec::new(),
            },
        );

        info!("Created Gemini conversation: {}", id);
        Ok(id)
    }

    /// Send a user turn and return the model's text
    ///
    /// The turn pair is recorded only when the call succeeds.
    pub async fn send_message(&self, session_id: &str, message: impl Into<String>) -> Result<String> {
        let api_key = self.api_key()?;

        let mut conversation = self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .with_context(|| format!("Unknown Gemini conversation: {}", session_id))?;

        let user_turn = Content::text("user", message);
        conversation.contents.push(user_turn.clone());

        let request = GenerateRequest {
            system_instruction: conversation
                .system_prompt
                .as_ref()
                .map(|prompt| Content {
                    role: None,
                    parts: vec![Part {
                        text: Some(prompt.clone()),
                    }],
                }),
            contents: &conversation.contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(
            "Sending turn {} to Gemini conversation {}",
            conversation.contents.len(),
            session_id
        );

        let response = match self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("Gemini HTTP error: {}", e);
                return Err(e).context("Failed to connect to Gemini");
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error: {} - {}", status, body);
        }

        let result: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = result.text();
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyResponse.into());
        }

        // The conversation may have been ended while the request was out
        if let Some(stored) = self.sessions.write().await.get_mut(session_id) {
            stored.contents.push(user_turn);
            stored.contents.push(Content::text("model", text.clone()));
        }

        Ok(text)
    }

    /// Drop a conversation's history
    pub async fn end_session(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            info!("Ended Gemini conversation: {}", session_id);
        }
    }

    /// Number of turns recorded for a conversation
    pub async fn turn_count(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|c| c.contents.len())
    }

    /// Check that the model endpoint answers
    pub async fn health_check(&self) -> Result<bool> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}", self.base_url, self.model);

        match self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new(&GeminiConfig::default())
    }
}
