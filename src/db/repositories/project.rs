//! Project repository
//!
//! Projects live as one JSON array under a single key. Every mutation reads
//! the latest stored collection and writes the whole collection back while
//! holding the connection lock. Records that cannot be read as a `Project`
//! are kept verbatim and written back untouched.

use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use super::kv;
use crate::core::model::{now_millis, Project, HOME_PATH};
use crate::core::templates::PLACEHOLDER_HTML;
use crate::db::schema::{ACTIVE_ID_KEY, PROJECTS_KEY};
use crate::db::Database;

pub struct ProjectStore {
    db: Database,
}

impl ProjectStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the database reference
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// List all projects, repairing legacy records in memory
    pub async fn list(&self) -> Result<Vec<Project>> {
        let conn = self.db.lock().await;
        Ok(read_collection(&conn)?.projects)
    }

    /// Get a project by ID
    pub async fn get(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.list().await?.into_iter().find(|p| p.id == id))
    }

    /// Insert or replace a project and mark it as last active
    ///
    /// Returns `false` without touching the store when the project has no
    /// pages.
    pub async fn save(&self, project: &Project) -> Result<bool> {
        if project.pages.is_empty() {
            warn!(
                "Refusing to save project {} with no pages",
                project.id
            );
            return Ok(false);
        }

        let conn = self.db.lock().await;
        let mut collection = read_collection(&conn)?;

        let mut stored = project.clone();
        stored.last_updated = now_millis();
        stored.html = None;

        collection.unreadable.retain(|raw| record_id(raw) != Some(stored.id.as_str()));
        match collection.projects.iter().position(|p| p.id == stored.id) {
            Some(index) => collection.projects[index] = stored,
            None => collection.projects.push(stored),
        }

        write_collection(&conn, &collection)?;
        kv::put(&conn, ACTIVE_ID_KEY, &project.id)?;

        debug!("Saved project: {}", project.id);
        Ok(true)
    }

    /// Apply `f` to the latest stored copy of a project and write it back
    ///
    /// Returns the updated project, or `None` when no project has that id or
    /// the update would leave it without pages.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Option<Project>>
    where
        F: FnOnce(&mut Project),
    {
        let conn = self.db.lock().await;
        let mut collection = read_collection(&conn)?;

        let Some(project) = collection.projects.iter_mut().find(|p| p.id == id) else {
            debug!("Update skipped, project {} not stored", id);
            return Ok(None);
        };

        let mut updated = project.clone();
        f(&mut updated);
        if updated.pages.is_empty() {
            warn!("Refusing update that would leave project {} with no pages", id);
            return Ok(None);
        }
        updated.last_updated = now_millis();
        updated.html = None;
        *project = updated.clone();

        write_collection(&conn, &collection)?;
        debug!("Updated project: {}", id);
        Ok(Some(updated))
    }

    /// Rename a stored project
    pub async fn rename(&self, id: &str, name: &str) -> Result<Option<Project>> {
        let name = name.to_string();
        self.update(id, move |p| p.name = name).await
    }

    /// Delete a project and return the remaining collection
    pub async fn delete(&self, id: &str) -> Result<Vec<Project>> {
        let conn = self.db.lock().await;
        let mut collection = read_collection(&conn)?;
        collection.projects.retain(|p| p.id != id);
        collection.unreadable.retain(|raw| record_id(raw) != Some(id));
        write_collection(&conn, &collection)?;

        if kv::get(&conn, ACTIVE_ID_KEY)?.as_deref() == Some(id) {
            kv::remove(&conn, ACTIVE_ID_KEY)?;
        }

        debug!("Deleted project: {}", id);
        Ok(collection.projects)
    }

    pub async fn last_active_id(&self) -> Result<Option<String>> {
        let conn = self.db.lock().await;
        kv::get(&conn, ACTIVE_ID_KEY)
    }

    pub async fn set_last_active_id(&self, id: &str) -> Result<()> {
        let conn = self.db.lock().await;
        kv::put(&conn, ACTIVE_ID_KEY, id)
    }

    /// Serialized project collection exactly as stored
    pub async fn export_all(&self) -> Result<String> {
        let conn = self.db.lock().await;
        Ok(kv::get(&conn, PROJECTS_KEY)?.unwrap_or_else(|| "[]".to_string()))
    }

    /// Replace the whole collection from a backup
    ///
    /// Accepts a single project object or an array. Every record needs a
    /// non-empty `id` and `name`; if any check fails the store is untouched
    /// and `false` is returned.
    pub async fn import(&self, json: &str) -> Result<bool> {
        let parsed: Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => {
                warn!("Import failed, not valid JSON: {}", e);
                return Ok(false);
            }
        };

        let records = match parsed {
            Value::Array(items) => items,
            Value::Object(_) => vec![parsed],
            _ => {
                warn!("Import failed, expected a project or a list of projects");
                return Ok(false);
            }
        };

        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            if !has_text(&record, "id") || !has_text(&record, "name") {
                warn!("Import failed, record without id or name");
                return Ok(false);
            }
            match repair(record) {
                Some(project) => projects.push(project),
                None => {
                    warn!("Import failed, malformed project record");
                    return Ok(false);
                }
            }
        }

        let count = projects.len();
        let conn = self.db.lock().await;
        write_collection(
            &conn,
            &Collection {
                projects,
                unreadable: Vec::new(),
            },
        )?;
        info!("Imported {} projects", count);
        Ok(true)
    }

    /// Salvage project-shaped JSON stored under unrelated keys
    ///
    /// Returns the number of projects merged into the collection.
    pub async fn recover(&self) -> Result<usize> {
        let conn = self.db.lock().await;
        let mut collection = read_collection(&conn)?;
        let mut known: HashSet<String> = collection
            .projects
            .iter()
            .map(|p| p.id.clone())
            .chain(collection.unreadable.iter().filter_map(record_id).map(str::to_string))
            .collect();
        let mut recovered = 0;

        for (key, value) in kv::entries(&conn)? {
            if key == PROJECTS_KEY || key == ACTIVE_ID_KEY {
                continue;
            }
            let Ok(parsed) = serde_json::from_str::<Value>(&value) else {
                continue;
            };
            let candidates = match parsed {
                Value::Array(items) => items,
                other => vec![other],
            };

            for mut candidate in candidates {
                if !looks_like_project(&candidate) {
                    continue;
                }
                let id = candidate["id"].as_str().unwrap_or_default().to_string();
                if known.contains(&id) {
                    continue;
                }
                if let Some(obj) = candidate.as_object_mut() {
                    if !obj.get("name").map(Value::is_string).unwrap_or(false) {
                        obj.insert("name".to_string(), json!("Recovered Project"));
                    }
                }
                if let Some(project) = repair(candidate) {
                    debug!("Recovered project {} from key {}", id, key);
                    known.insert(id);
                    collection.projects.push(project);
                    recovered += 1;
                }
            }
        }

        if recovered > 0 {
            write_collection(&conn, &collection)?;
            info!("Recovered {} projects", recovered);
        }
        Ok(recovered)
    }
}

fn has_text(value: &Value, field: &str) -> bool {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}

fn looks_like_project(value: &Value) -> bool {
    value.is_object()
        && has_text(value, "id")
        && (value.get("name").is_some() || value.get("html").is_some())
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

/// Display name for a page stored without one, e.g. "about-us.html" -> "about-us"
fn name_from_path(path: &str) -> String {
    let stem = path.strip_suffix(".html").unwrap_or(path);
    if stem.is_empty() {
        path.to_string()
    } else {
        stem.to_string()
    }
}

/// Fill fields older records may lack on a page
///
/// Generated ids depend only on the page's position so repeated reads agree.
fn repair_page(index: usize, page: &mut Value) {
    let Some(obj) = page.as_object_mut() else {
        return;
    };
    if !obj.get("id").map(Value::is_string).unwrap_or(false) {
        obj.insert("id".to_string(), json!(format!("page-{}", index)));
    }
    if !obj.get("name").map(Value::is_string).unwrap_or(false) {
        if let Some(path) = obj.get("path").and_then(Value::as_str) {
            let name = name_from_path(path);
            obj.insert("name".to_string(), json!(name));
        }
    }
    if !obj.get("html").map(Value::is_string).unwrap_or(false) {
        obj.insert("html".to_string(), json!(""));
    }
}

/// Give a stored record a valid page list and deserialize it
///
/// A record whose `pages` is missing, not an array, or empty gets a single
/// home page built from its legacy `html` field or the placeholder document.
/// Pages lacking an id, name or html get defaults.
fn repair(mut record: Value) -> Option<Project> {
    let obj: &mut Map<String, Value> = record.as_object_mut()?;

    if !obj.get("name").map(Value::is_string).unwrap_or(false) {
        obj.insert("name".to_string(), json!("Untitled Project"));
    }
    if let Some(pages) = obj.get_mut("pages").and_then(Value::as_array_mut) {
        for (index, page) in pages.iter_mut().enumerate() {
            repair_page(index, page);
        }
    }

    let pages_ok = obj
        .get("pages")
        .and_then(Value::as_array)
        .map(|pages| !pages.is_empty())
        .unwrap_or(false);

    if !pages_ok {
        let html = obj
            .get("html")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(PLACEHOLDER_HTML)
            .to_string();
        obj.insert(
            "pages".to_string(),
            json!([{ "id": "home", "name": "Home", "path": HOME_PATH, "html": html }]),
        );
    }

    match serde_json::from_value(record) {
        Ok(project) => Some(project),
        Err(e) => {
            warn!("Unreadable project record: {}", e);
            None
        }
    }
}

/// Stored collection split into typed projects and records kept verbatim
struct Collection {
    projects: Vec<Project>,
    unreadable: Vec<Value>,
}

fn read_collection(conn: &Connection) -> Result<Collection> {
    let mut collection = Collection {
        projects: Vec::new(),
        unreadable: Vec::new(),
    };
    let Some(raw) = kv::get(conn, PROJECTS_KEY)? else {
        return Ok(collection);
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(records)) => {
            for record in records {
                match repair(record.clone()) {
                    Some(project) => collection.projects.push(project),
                    None => collection.unreadable.push(record),
                }
            }
        }
        Ok(_) => error!("Stored project collection is not a list"),
        Err(e) => error!("Failed to load projects: {}", e),
    }
    Ok(collection)
}

fn write_collection(conn: &Connection, collection: &Collection) -> Result<()> {
    let mut records = Vec::with_capacity(collection.projects.len() + collection.unreadable.len());
    for project in &collection.projects {
        records.push(serde_json::to_value(project).context("Failed to serialize project")?);
    }
    records.extend(collection.unreadable.iter().cloned());

    let raw = serde_json::to_string(&records).context("Failed to serialize projects")?;
    kv::put(conn, PROJECTS_KEY, &raw)
}
