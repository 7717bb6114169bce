//! In-memory workspace state

use crate::core::model::{Page, Project};

/// The open project and the page edits are aimed at
#[derive(Debug, Clone)]
pub struct WorkspaceState {
    pub project: Project,
    pub active_page_id: String,
}

impl WorkspaceState {
    /// Open a project on its home page
    pub fn new(project: Project) -> Self {
        let active_page_id = project
            .home_page()
            .map(|p| p.id.clone())
            .unwrap_or_default();
        Self {
            project,
            active_page_id,
        }
    }

    pub fn active_page(&self) -> Option<&Page> {
        self.project.page(&self.active_page_id)
    }

    /// Point the active page back at an existing page if it went stale
    pub fn ensure_active_page(&mut self) {
        if self.active_page().is_none() {
            if let Some(first) = self.project.pages.first() {
                self.active_page_id = first.id.clone();
            }
        }
    }
}
