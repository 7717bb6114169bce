//! Project/page reconciler
//!
//! The workspace owns the open project, the generation gateway and the
//! auto-save scheduler. Operations that reach the gateway capture the target
//! project and page ids up front, release the state lock for the duration of
//! the request, and merge the result into whatever the latest state is by id.
//! If the user switched projects in the meantime the result is merged into
//! the stored copy instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::autosave::AutoSave;
use super::links::{normalize_href, rewrite_links, strip_code_fences};
use super::model::{Message, Page, Project};
use super::splice::{self, splice_navigation};
use super::state::WorkspaceState;
use super::templates;
use crate::db::ProjectStore;
use crate::session::prompts::{self, PageContext};
use crate::session::{AiGateway, GatewayError, GenerationProvider, GenerationResponse};

/// Transcript entry recorded when a generation request fails
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("A page with filename {0} already exists")]
    DuplicatePath(String),

    #[error("Cannot delete the last page")]
    LastPage,

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Invalid page filename: {0:?}")]
    InvalidPath(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("A generation request is already in progress")]
    Busy,

    #[error(transparent)]
    Generation(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Page to create as part of a prompt
#[derive(Debug, Clone)]
pub struct NewPage {
    pub name: String,
    pub path: String,
    /// Starting document; the blank template when absent
    pub seed_html: Option<String>,
}

/// How a new project gets its first page
#[derive(Debug, Clone)]
pub enum NewProject {
    Blank,
    Template(String),
    /// Blank project followed by a first generation request
    Ai(String),
}

/// How a generation request settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The target page's html was replaced
    CodeApplied { page_id: String, path: String },
    /// Commentary recorded in the transcript only
    Text(String),
    /// The request failed; an apology was recorded
    Failed(String),
    /// Code arrived for a page or project that no longer exists
    Discarded { page_id: String },
}

/// Everything captured when a request is issued
struct Turn {
    project_id: String,
    page_id: String,
    page_path: String,
    request: String,
    context: PageContext,
}

/// Clears the in-flight flag when the request settles
struct RequestGuard<'a>(&'a AtomicBool);

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn validate_path(path: &str) -> Result<()> {
    let invalid = path.trim().is_empty()
        || path.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\')
        || path.starts_with('.');
    if invalid {
        return Err(WorkspaceError::InvalidPath(path.to_string()));
    }
    Ok(())
}

pub struct Workspace {
    store: Arc<ProjectStore>,
    gateway: AiGateway,
    state: Arc<Mutex<WorkspaceState>>,
    autosave: AutoSave,
    in_flight: AtomicBool,
}

impl Workspace {
    /// Restore the last active project, else the first stored one, else a
    /// fresh blank project
    pub async fn open(
        store: Arc<ProjectStore>,
        provider: Arc<dyn GenerationProvider>,
        debounce: Duration,
    ) -> Result<Self> {
        let projects = store.list().await?;
        let last_id = store.last_active_id().await?;

        let last = last_id.and_then(|id| projects.iter().find(|p| p.id == id).cloned());
        let project = match last.or_else(|| projects.first().cloned()) {
            Some(project) => {
                store.set_last_active_id(&project.id).await?;
                project
            }
            None => {
                let project = Project::new(templates::BLANK.html);
                store.save(&project).await?;
                info!("Created initial project {}", project.id);
                project
            }
        };

        Ok(Self::with_project(store, provider, project, debounce))
    }

    /// Wrap an already loaded project
    pub fn with_project(
        store: Arc<ProjectStore>,
        provider: Arc<dyn GenerationProvider>,
        project: Project,
        debounce: Duration,
    ) -> Self {
        let state = Arc::new(Mutex::new(WorkspaceState::new(project)));
        let autosave = AutoSave::new(Arc::clone(&store), Arc::clone(&state), debounce);

        Self {
            store,
            gateway: AiGateway::new(provider),
            state,
            autosave,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn gateway(&self) -> &AiGateway {
        &self.gateway
    }

    /// Snapshot of the open project
    pub async fn project(&self) -> Project {
        self.state.lock().await.project.clone()
    }

    pub async fn active_page(&self) -> Option<Page> {
        self.state.lock().await.active_page().cloned()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_saving(&self) -> bool {
        self.autosave.is_saving()
    }

    /// Write pending changes; call before exiting
    pub async fn flush(&self) -> Result<()> {
        self.autosave.flush().await?;
        Ok(())
    }

    fn begin_request(&self) -> Result<RequestGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WorkspaceError::Busy);
        }
        Ok(RequestGuard(&self.in_flight))
    }

    // ----- page edits -----

    pub async fn set_active_page(&self, page_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.project.page(page_id).is_none() {
            return Err(WorkspaceError::PageNotFound(page_id.to_string()));
        }
        state.active_page_id = page_id.to_string();
        Ok(())
    }

    /// Replace the active page's source with hand-edited html
    pub async fn update_code(&self, html: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let active = state.active_page_id.clone();
        let page = state
            .project
            .page_mut(&active)
            .ok_or(WorkspaceError::PageNotFound(active))?;
        page.html = html.to_string();
        drop(state);

        self.autosave.schedule();
        Ok(())
    }

    /// Change a page's display name and path
    ///
    /// A path change rewrites `href="old"` / `href='old'` in every page.
    pub async fn update_page(&self, page_id: &str, name: &str, path: &str) -> Result<Page> {
        validate_path(path)?;

        let mut state = self.state.lock().await;
        if state.project.path_taken(path, Some(page_id)) {
            return Err(WorkspaceError::DuplicatePath(path.to_string()));
        }

        let page = state
            .project
            .page_mut(page_id)
            .ok_or_else(|| WorkspaceError::PageNotFound(page_id.to_string()))?;
        page.name = name.to_string();
        let old_path = std::mem::replace(&mut page.path, path.to_string());
        let updated = page.clone();

        if old_path != path {
            for page in state.project.pages.iter_mut() {
                page.html = rewrite_links(&page.html, &old_path, path);
            }
            debug!("Rewrote links {} -> {}", old_path, path);
        }
        drop(state);

        self.autosave.schedule();
        Ok(updated)
    }

    pub async fn delete_page(&self, page_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.project.pages.len() <= 1 {
            return Err(WorkspaceError::LastPage);
        }

        let index = state
            .project
            .pages
            .iter()
            .position(|p| p.id == page_id)
            .ok_or_else(|| WorkspaceError::PageNotFound(page_id.to_string()))?;
        let removed = state.project.pages.remove(index);
        state.ensure_active_page();
        drop(state);

        debug!("Deleted page {}", removed.path);
        self.autosave.schedule();
        Ok(())
    }

    /// Follow a link clicked in the preview
    ///
    /// Returns the page that became active, or `None` when the link does not
    /// name a page of this project.
    pub async fn navigate(&self, raw_href: &str) -> Option<Page> {
        let target = normalize_href(raw_href);
        let mut state = self.state.lock().await;

        match state.project.page_by_path(&target).cloned() {
            Some(page) => {
                state.active_page_id = page.id.clone();
                Some(page)
            }
            None => {
                warn!("Ignoring navigation to {:?}, not a project page", raw_href);
                None
            }
        }
    }

    // ----- generation -----

    /// Send a prompt about the active page, optionally creating it first
    pub async fn send_prompt(&self, text: &str, new_page: Option<NewPage>) -> Result<PromptOutcome> {
        let _guard = self.begin_request()?;

        let turn = {
            let mut state = self.state.lock().await;

            if let Some(spec) = new_page {
                validate_path(&spec.path)?;
                if state.project.path_taken(&spec.path, None) {
                    return Err(WorkspaceError::DuplicatePath(spec.path));
                }
                let html = spec
                    .seed_html
                    .unwrap_or_else(|| templates::BLANK.html.to_string());
                let page = Page::new(spec.name, spec.path, html);
                state.active_page_id = page.id.clone();
                state.project.pages.push(page);
            }

            let page_id = state.active_page_id.clone();
            begin_turn(&mut state, text, &page_id)?
        };
        self.autosave.schedule();

        self.complete_turn(turn).await
    }

    /// Ask the model to rework the active page's navigation
    pub async fn sync_links(&self) -> Result<PromptOutcome> {
        self.send_prompt(prompts::SYNC_LINKS_PROMPT, None).await
    }

    /// Clone the home page into a new page and let the model adapt it
    ///
    /// When `refresh_navigation` is set, a project-wide navigation refresh
    /// runs after the first request settles.
    pub async fn add_page(
        &self,
        name: &str,
        path: &str,
        refresh_navigation: bool,
    ) -> Result<(Page, PromptOutcome)> {
        let _guard = self.begin_request()?;
        validate_path(path)?;

        let (page, turn) = {
            let mut state = self.state.lock().await;
            if state.project.path_taken(path, None) {
                return Err(WorkspaceError::DuplicatePath(path.to_string()));
            }

            let source = state
                .project
                .home_page()
                .map(|p| p.html.clone())
                .unwrap_or_else(|| templates::BLANK.html.to_string());
            let page = Page::new(name, path, source);
            state.active_page_id = page.id.clone();
            state.project.pages.push(page.clone());

            let turn = begin_turn(&mut state, &prompts::cleanup_prompt(name, path), &page.id)?;
            (page, turn)
        };
        self.autosave.schedule();

        let outcome = self.complete_turn(turn).await?;

        if refresh_navigation {
            if let Err(e) = self.refresh_navigation_inner().await {
                warn!("Navigation refresh after adding {} failed: {}", path, e);
            }
        }

        Ok((page, outcome))
    }

    /// Generate one shared header/footer and splice it into every page
    ///
    /// Returns the number of pages whose html changed.
    pub async fn refresh_navigation(&self) -> Result<usize> {
        let _guard = self.begin_request()?;
        self.refresh_navigation_inner().await
    }

    async fn refresh_navigation_inner(&self) -> Result<usize> {
        let (project_id, pages) = {
            let state = self.state.lock().await;
            (state.project.id.clone(), state.project.page_refs())
        };

        let response = self
            .gateway
            .send(&prompts::navigation_prompt(&pages), None)
            .await?;
        let fragment = strip_code_fences(&response.content);

        let mut state = self.state.lock().await;
        if state.project.id == project_id {
            let changed = splice_all(&mut state.project, &fragment);
            drop(state);
            self.autosave.schedule();
            info!("Refreshed navigation on {} pages", changed);
            return Ok(changed);
        }
        drop(state);

        let mut changed = 0;
        self.store
            .update(&project_id, |project| changed = splice_all(project, &fragment))
            .await?;
        info!("Refreshed navigation on {} pages of stored project {}", changed, project_id);
        Ok(changed)
    }

    async fn complete_turn(&self, turn: Turn) -> Result<PromptOutcome> {
        let result = self.gateway.send(&turn.request, Some(&turn.context)).await;
        self.settle(&turn, result).await
    }

    /// Merge a settled request into the latest state by id
    async fn settle(
        &self,
        turn: &Turn,
        result: std::result::Result<GenerationResponse, GatewayError>,
    ) -> Result<PromptOutcome> {
        let (message, new_html, outcome) = match result {
            Ok(response) if response.is_code => (
                Message::code_update(&turn.page_path),
                Some(strip_code_fences(&response.content)),
                PromptOutcome::CodeApplied {
                    page_id: turn.page_id.clone(),
                    path: turn.page_path.clone(),
                },
            ),
            Ok(response) => (
                Message::model(response.content.clone()),
                None,
                PromptOutcome::Text(response.content),
            ),
            Err(e) => {
                error!("Generation for {} failed: {}", turn.page_path, e);
                (Message::model(ERROR_REPLY), None, PromptOutcome::Failed(e.to_string()))
            }
        };

        let discarded = PromptOutcome::Discarded {
            page_id: turn.page_id.clone(),
        };

        // Returns false when code arrived for a page that is gone
        let apply = |project: &mut Project| -> bool {
            project.messages.push(message.clone());
            match (&new_html, project.page_mut(&turn.page_id)) {
                (Some(html), Some(page)) => {
                    page.html = html.clone();
                    true
                }
                (Some(_), None) => false,
                (None, _) => true,
            }
        };

        let mut state = self.state.lock().await;
        if state.project.id == turn.project_id {
            let applied = apply(&mut state.project);
            drop(state);
            self.autosave.schedule();
            if !applied {
                warn!("Page {} was removed before its update arrived", turn.page_id);
                return Ok(discarded);
            }
            return Ok(outcome);
        }
        drop(state);

        let mut applied = false;
        let stored = self
            .store
            .update(&turn.project_id, |project| applied = apply(project))
            .await?;
        if stored.is_none() || !applied {
            warn!(
                "Discarding response for page {} of project {}",
                turn.page_id, turn.project_id
            );
            return Ok(discarded);
        }
        Ok(outcome)
    }

    // ----- projects -----

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.store.list().await?)
    }

    /// Create a project and switch to it
    ///
    /// For `NewProject::Ai` the first request runs before this returns.
    pub async fn create_project(&self, kind: NewProject) -> Result<(Project, Option<PromptOutcome>)> {
        let (html, first_prompt) = match &kind {
            NewProject::Blank => (templates::BLANK.html, None),
            NewProject::Template(id) => {
                let template = templates::find(id)
                    .ok_or_else(|| WorkspaceError::UnknownTemplate(id.clone()))?;
                (template.html, None)
            }
            NewProject::Ai(prompt) => (templates::BLANK.html, Some(prompt.clone())),
        };

        let project = Project::new(html);
        self.store.save(&project).await?;
        self.switch_to(project.clone()).await?;
        info!("Created project {}", project.id);

        let outcome = match first_prompt {
            Some(prompt) => Some(self.send_prompt(&prompt, None).await?),
            None => None,
        };
        Ok((project, outcome))
    }

    /// Switch to a stored project
    pub async fn select_project(&self, id: &str) -> Result<Project> {
        // The stored copy must include edits still waiting on the timer
        self.autosave.flush().await?;

        let project = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| WorkspaceError::ProjectNotFound(id.to_string()))?;
        self.switch_to(project.clone()).await?;
        self.store.set_last_active_id(id).await?;
        Ok(project)
    }

    /// Delete a project; if it was open, switch to the first remaining one
    /// or a new blank project
    ///
    /// The open project is swapped out before the stored copy is removed, so
    /// a response still in flight for it resolves against storage and finds
    /// nothing.
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let is_current = self.state.lock().await.project.id == id;
        if !is_current {
            self.store.delete(id).await?;
            return Ok(());
        }

        let next = self.store.list().await?.into_iter().find(|p| p.id != id);
        let next_id = match next {
            Some(next) => {
                let next_id = next.id.clone();
                self.switch_to(next).await?;
                Some(next_id)
            }
            None => {
                self.create_project(NewProject::Blank).await?;
                None
            }
        };

        self.store.delete(id).await?;
        if let Some(next_id) = next_id {
            self.store.set_last_active_id(&next_id).await?;
        }
        info!("Deleted open project {}", id);
        Ok(())
    }

    pub async fn rename_project(&self, id: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.project.id == id {
            state.project.name = name.to_string();
            drop(state);
            self.autosave.schedule();
            return Ok(());
        }
        drop(state);

        self.store
            .rename(id, name)
            .await?
            .ok_or_else(|| WorkspaceError::ProjectNotFound(id.to_string()))?;
        Ok(())
    }

    /// Persist the open project, make `project` current and start a fresh
    /// conversation
    async fn switch_to(&self, project: Project) -> Result<()> {
        self.autosave.flush().await?;
        self.gateway.reset().await;

        let mut state = self.state.lock().await;
        debug!("Switching from project {} to {}", state.project.id, project.id);
        *state = WorkspaceState::new(project);
        Ok(())
    }
}

/// Record the user message and capture the request for `page_id`
fn begin_turn(state: &mut WorkspaceState, text: &str, page_id: &str) -> Result<Turn> {
    let page = state
        .project
        .page(page_id)
        .cloned()
        .ok_or_else(|| WorkspaceError::PageNotFound(page_id.to_string()))?;

    state.project.messages.push(Message::user(text));

    Ok(Turn {
        project_id: state.project.id.clone(),
        page_id: page.id.clone(),
        page_path: page.path.clone(),
        request: prompts::page_request(&page.path, &page.html, text),
        context: PageContext {
            current_page: page.path,
            available_pages: state.project.page_refs(),
        },
    })
}

/// Splice `fragment` into every page; returns how many pages changed beyond
/// re-serialization
fn splice_all(project: &mut Project, fragment: &str) -> usize {
    let mut changed = 0;
    for page in project.pages.iter_mut() {
        let spliced = splice_navigation(&page.html, fragment);
        if spliced == page.html || spliced == splice::normalize(&page.html) {
            continue;
        }
        page.html = spliced;
        changed += 1;
    }
    changed
}
