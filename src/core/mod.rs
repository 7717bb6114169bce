//! Project model and reconciliation

pub mod autosave;
pub mod export;
pub mod links;
pub mod model;
pub mod splice;
pub mod state;
pub mod templates;
pub mod workspace;

pub use model::{Message, MessageKind, Page, PageRef, Project, Role};
pub use state::WorkspaceState;
pub use workspace::{NewPage, NewProject, PromptOutcome, Workspace, WorkspaceError};
