//! Project, page and transcript types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Path of the page treated as the site's home page
pub const HOME_PATH: &str = "index.html";

/// Fresh opaque identifier for projects, pages and messages
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Filename for a page created from a display name
///
/// Lower-cased, every run of characters other than `a-z0-9` becomes `-`,
/// and `.html` is appended. A trailing `.html` in the name is kept as the
/// extension rather than slugged.
pub fn page_filename(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let stem = lower.strip_suffix(".html").unwrap_or(&lower);

    let mut slug = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        "page.html".to_string()
    } else {
        format!("{}.html", slug)
    }
}

/// Page display name suggested by an attached file, e.g. "our_team.md" -> "our team"
pub fn page_name_from_file(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    };
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ' ' { c } else { ' ' })
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    /// Display name, e.g. "About Us"
    pub name: String,
    /// Filename-like path, e.g. "about.html"
    pub path: String,
    pub html: String,
}

impl Page {
    pub fn new(name: impl Into<String>, path: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            path: path.into(),
            html: html.into(),
        }
    }

    /// Case-insensitive path comparison
    pub fn has_path(&self, path: &str) -> bool {
        self.path.eq_ignore_ascii_case(path)
    }

    pub fn is_home(&self) -> bool {
        self.has_path(HOME_PATH)
    }
}

/// Reference to a page used when giving the model project context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRef {
    pub name: String,
    pub path: String,
}

impl From<&Page> for PageRef {
    fn from(page: &Page) -> Self {
        Self {
            name: page.name.clone(),
            path: page.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    CodeUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: i64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, MessageKind::Text)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content, MessageKind::Text)
    }

    /// Placeholder recording that the model rewrote a page
    pub fn code_update(path: &str) -> Self {
        Self::new(
            Role::Model,
            format!("Updated code for {}.", path),
            MessageKind::CodeUpdate,
        )
    }

    fn new(role: Role, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            kind,
            timestamp: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Legacy single-document field, only ever read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Project {
    /// New project holding a single home page
    pub fn new(home_html: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name: "Untitled Project".to_string(),
            html: None,
            pages: vec![Page::new("Home", HOME_PATH, home_html)],
            messages: Vec::new(),
            created_at: now,
            last_updated: now,
            thumbnail: None,
        }
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_mut(&mut self, id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    /// Page whose path matches exactly
    pub fn page_by_path(&self, path: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.path == path)
    }

    /// True if some page other than `except` already uses `path`
    pub fn path_taken(&self, path: &str, except: Option<&str>) -> bool {
        self.pages
            .iter()
            .any(|p| p.has_path(path) && Some(p.id.as_str()) != except)
    }

    /// The home page, or the first page when no `index.html` exists
    pub fn home_page(&self) -> Option<&Page> {
        self.pages.iter().find(|p| p.is_home()).or_else(|| self.pages.first())
    }

    pub fn page_refs(&self) -> Vec<PageRef> {
        self.pages.iter().map(PageRef::from).collect()
    }
}
