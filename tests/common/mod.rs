// Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sitesmith::core::Workspace;
use sitesmith::db::{Database, ProjectStore};
use sitesmith::session::{GenerationProvider, SessionHandle};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const PAGE_HTML: &str = "<!DOCTYPE html><html><body><main>v2</main></body></html>";

/// One scripted reply
pub enum Reply {
    Text(String),
    Fail(String),
    /// Signal `received`, then hold the reply until `release` fires
    Gated {
        content: String,
        received: Arc<Notify>,
        release: Arc<Notify>,
    },
}

/// In-process provider answering from a queue
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<(String, String)>>,
    created: AtomicUsize,
    ended: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_text(&self, text: &str) {
        self.push(Reply::Text(text.to_string()));
    }

    /// Queue a reply that waits for the returned `release` handle
    pub fn push_gated(&self, content: &str) -> (Arc<Notify>, Arc<Notify>) {
        let received = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.push(Reply::Gated {
            content: content.to_string(),
            received: Arc::clone(&received),
            release: Arc::clone(&release),
        });
        (received, release)
    }

    /// Messages sent so far as (session id, text)
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn create_session(&self, _system_prompt: Option<String>) -> Result<SessionHandle> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle {
            internal_id: format!("internal-{}", n),
            provider_id: format!("session-{}", n),
        })
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<String> {
        self.sent
            .lock()
            .unwrap()
            .push((session_id.to_string(), message.to_string()));

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(error)) => anyhow::bail!(error),
            Some(Reply::Gated {
                content,
                received,
                release,
            }) => {
                received.notify_one();
                release.notified().await;
                Ok(content)
            }
            None => anyhow::bail!("no scripted reply left"),
        }
    }

    async fn end_session(&self, _session_id: &str) -> Result<()> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

pub fn create_test_store() -> (Arc<ProjectStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(db_path).unwrap();
    (Arc::new(ProjectStore::new(db)), temp_dir)
}

/// Workspace over a fresh database with a long debounce so tests control
/// when writes happen through `flush`
pub async fn create_workspace(provider: Arc<ScriptedProvider>) -> (Workspace, Arc<ProjectStore>, TempDir) {
    let (store, temp) = create_test_store();
    let workspace = Workspace::open(Arc::clone(&store), provider, Duration::from_secs(60))
        .await
        .unwrap();
    (workspace, store, temp)
}
