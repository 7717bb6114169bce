//! SQL schema definitions

pub const SCHEMA: &str = r#"
-- Key-value entries, one JSON or scalar value per key
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Full project collection as a JSON array
pub const PROJECTS_KEY: &str = "sitesmith.projects";

/// Id of the last active project
pub const ACTIVE_ID_KEY: &str = "sitesmith.active_id";
