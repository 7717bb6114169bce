// Tests for the project/page reconciler

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{create_test_store, create_workspace, Reply, ScriptedProvider, PAGE_HTML};
use sitesmith::core::workspace::ERROR_REPLY;
use sitesmith::core::{MessageKind, NewPage, NewProject, PromptOutcome, Role, Workspace, WorkspaceError};

fn about_page() -> NewPage {
    NewPage {
        name: "About".to_string(),
        path: "about.html".to_string(),
        seed_html: Some(r#"<html><body><a href="index.html">Home</a></body></html>"#.to_string()),
    }
}

/// Workspace with a home page and an about page, the about page active
async fn two_page_workspace(
    provider: &Arc<ScriptedProvider>,
) -> (Workspace, Arc<sitesmith::db::ProjectStore>, tempfile::TempDir, String, String) {
    let (workspace, store, temp) = create_workspace(Arc::clone(provider)).await;
    provider.push_text("Page added.");
    workspace
        .send_prompt("start the about page", Some(about_page()))
        .await
        .unwrap();

    let project = workspace.project().await;
    let home_id = project.pages[0].id.clone();
    let about_id = project.pages[1].id.clone();
    (workspace, store, temp, home_id, about_id)
}

#[tokio::test]
async fn test_open_creates_initial_project() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(provider).await;

    let project = workspace.project().await;
    assert_eq!(project.pages.len(), 1);
    assert_eq!(project.pages[0].path, "index.html");

    let stored = store.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(store.last_active_id().await.unwrap(), Some(project.id.clone()));
    assert_eq!(workspace.active_page().await.unwrap().id, project.pages[0].id);
}

#[tokio::test]
async fn test_open_restores_last_active_project() {
    let provider = ScriptedProvider::new();
    let (first, store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let first_id = first.project().await.id;
    first.rename_project(&first_id, "Bakery").await.unwrap();
    first.flush().await.unwrap();
    drop(first);

    let reopened = Workspace::open(Arc::clone(&store), provider, Duration::from_secs(60))
        .await
        .unwrap();
    let project = reopened.project().await;
    assert_eq!(project.id, first_id);
    assert_eq!(project.name, "Bakery");
}

#[tokio::test]
async fn test_context_prefix_is_sent() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    provider.push_text("Sure.");

    workspace.send_prompt("make it blue", None).await.unwrap();

    let sent = provider.sent();
    assert_eq!(sent.len(), 1);
    let message = &sent[0].1;
    assert!(message.starts_with("[Current Context]\nEditing Page File: index.html\n\n"));
    assert!(message.contains("- Home: \"index.html\""));
    assert!(message.contains("[User Request]\nCurrent HTML content of index.html:"));
    assert!(message.ends_with("User Request: make it blue"));
}

#[tokio::test]
async fn test_text_reply_never_touches_html() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let before = workspace.active_page().await.unwrap().html;
    provider.push_text("Consider a darker palette for contrast.");

    let outcome = workspace.send_prompt("any advice?", None).await.unwrap();

    assert_eq!(
        outcome,
        PromptOutcome::Text("Consider a darker palette for contrast.".to_string())
    );
    let project = workspace.project().await;
    assert_eq!(project.pages[0].html, before);
    assert_eq!(project.messages.len(), 2);
    assert_eq!(project.messages[0].role, Role::User);
    assert_eq!(project.messages[1].kind, MessageKind::Text);
    assert_eq!(project.messages[1].content, "Consider a darker palette for contrast.");
}

#[tokio::test]
async fn test_code_reply_replaces_page() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let home_id = workspace.project().await.pages[0].id.clone();
    provider.push_text(&format!("{}\n```", PAGE_HTML));

    let outcome = workspace.send_prompt("rebuild", None).await.unwrap();

    assert_eq!(
        outcome,
        PromptOutcome::CodeApplied {
            page_id: home_id,
            path: "index.html".to_string()
        }
    );
    let project = workspace.project().await;
    assert_eq!(project.pages[0].html.trim(), PAGE_HTML);
    let reply = project.messages.last().unwrap();
    assert_eq!(reply.kind, MessageKind::CodeUpdate);
    assert_eq!(reply.content, "Updated code for index.html.");
    assert!(!workspace.is_busy());
}

#[tokio::test]
async fn test_failure_records_apology_and_keeps_new_page() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    provider.push(Reply::Fail("quota exceeded".to_string()));

    let outcome = workspace
        .send_prompt("start the about page", Some(about_page()))
        .await
        .unwrap();

    assert!(matches!(outcome, PromptOutcome::Failed(_)));
    let project = workspace.project().await;
    assert_eq!(project.pages.len(), 2);
    assert_eq!(workspace.active_page().await.unwrap().path, "about.html");
    assert_eq!(project.messages.last().unwrap().content, ERROR_REPLY);
    assert!(!workspace.is_busy());
}

#[tokio::test]
async fn test_duplicate_new_page_is_rejected() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let before = workspace.project().await;

    let result = workspace
        .send_prompt(
            "another home",
            Some(NewPage {
                name: "Home 2".to_string(),
                path: "INDEX.html".to_string(),
                seed_html: None,
            }),
        )
        .await;

    assert!(matches!(result, Err(WorkspaceError::DuplicatePath(_))));
    assert_eq!(workspace.project().await, before);
    assert!(provider.sent().is_empty());
    assert!(!workspace.is_busy());
}

#[tokio::test]
async fn test_invalid_page_path_is_rejected() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(provider).await;
    let home_id = workspace.project().await.pages[0].id.clone();

    for path in ["", "my page.html", "../up.html", "dir/page.html"] {
        let result = workspace.update_page(&home_id, "Home", path).await;
        assert!(matches!(result, Err(WorkspaceError::InvalidPath(_))), "{:?}", path);
    }
}

#[tokio::test]
async fn test_rename_rewrites_links_everywhere() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, home_id, about_id) = two_page_workspace(&provider).await;
    workspace.set_active_page(&home_id).await.unwrap();
    workspace
        .update_code(r#"<html><body><a href="about.html">About</a><a href='about.html#x'>x</a></body></html>"#)
        .await
        .unwrap();

    let page = workspace.update_page(&about_id, "Team", "team.html").await.unwrap();

    assert_eq!(page.path, "team.html");
    assert_eq!(page.name, "Team");
    let project = workspace.project().await;
    assert_eq!(
        project.pages[0].html,
        r#"<html><body><a href="team.html">About</a><a href='about.html#x'>x</a></body></html>"#
    );
    // Links to other pages are left alone
    assert!(project.pages[1].html.contains(r#"href="index.html""#));
}

#[tokio::test]
async fn test_rename_to_taken_path_is_rejected() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, _home_id, about_id) = two_page_workspace(&provider).await;

    let result = workspace.update_page(&about_id, "About", "Index.html").await;

    assert!(matches!(result, Err(WorkspaceError::DuplicatePath(_))));
    assert_eq!(workspace.project().await.pages[1].path, "about.html");

    // Keeping its own path is fine
    workspace.update_page(&about_id, "About Us", "about.html").await.unwrap();
    assert_eq!(workspace.project().await.pages[1].name, "About Us");
}

#[tokio::test]
async fn test_delete_page_rules() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, home_id, about_id) = two_page_workspace(&provider).await;
    assert_eq!(workspace.active_page().await.unwrap().id, about_id);

    workspace.delete_page(&about_id).await.unwrap();
    assert_eq!(workspace.active_page().await.unwrap().id, home_id);

    let result = workspace.delete_page(&home_id).await;
    assert!(matches!(result, Err(WorkspaceError::LastPage)));
    assert_eq!(workspace.project().await.pages.len(), 1);
}

#[tokio::test]
async fn test_navigate_between_pages() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, home_id, about_id) = two_page_workspace(&provider).await;

    let page = workspace.navigate("/index.html?ref=nav").await.unwrap();
    assert_eq!(page.id, home_id);

    let page = workspace.navigate("./about.html#team").await.unwrap();
    assert_eq!(page.id, about_id);

    assert!(workspace.navigate("https://example.com").await.is_none());
    assert_eq!(workspace.active_page().await.unwrap().id, about_id);
}

#[tokio::test]
async fn test_busy_while_request_pending() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let (received, release) = provider.push_gated("Done.");

    let request = workspace.send_prompt("first", None);
    let interleave = async {
        received.notified().await;
        assert!(workspace.is_busy());
        let second = workspace.send_prompt("second", None).await;
        assert!(matches!(second, Err(WorkspaceError::Busy)));
        let nav = workspace.refresh_navigation().await;
        assert!(matches!(nav, Err(WorkspaceError::Busy)));
        release.notify_one();
    };
    let (outcome, ()) = tokio::join!(request, interleave);

    assert_eq!(outcome.unwrap(), PromptOutcome::Text("Done.".to_string()));
    assert!(!workspace.is_busy());
    assert_eq!(provider.sent().len(), 1);
}

#[tokio::test]
async fn test_page_switch_mid_request_updates_original_page() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, home_id, about_id) = two_page_workspace(&provider).await;
    workspace.set_active_page(&home_id).await.unwrap();
    let about_before = workspace.project().await.pages[1].html.clone();
    let (received, release) = provider.push_gated(PAGE_HTML);

    let request = workspace.send_prompt("rebuild home", None);
    let interleave = async {
        received.notified().await;
        workspace.set_active_page(&about_id).await.unwrap();
        release.notify_one();
    };
    let (outcome, ()) = tokio::join!(request, interleave);

    assert!(matches!(outcome.unwrap(), PromptOutcome::CodeApplied { page_id, .. } if page_id == home_id));
    let project = workspace.project().await;
    assert_eq!(project.pages[0].html, PAGE_HTML);
    assert_eq!(project.pages[1].html, about_before);
    assert_eq!(workspace.active_page().await.unwrap().id, about_id);
}

#[tokio::test]
async fn test_page_deleted_mid_request_is_discarded() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, _home_id, about_id) = two_page_workspace(&provider).await;
    let (received, release) = provider.push_gated(PAGE_HTML);

    let request = workspace.send_prompt("rebuild about", None);
    let interleave = async {
        received.notified().await;
        workspace.delete_page(&about_id).await.unwrap();
        release.notify_one();
    };
    let (outcome, ()) = tokio::join!(request, interleave);

    assert_eq!(outcome.unwrap(), PromptOutcome::Discarded { page_id: about_id });
    let project = workspace.project().await;
    assert_eq!(project.pages.len(), 1);
    assert_ne!(project.pages[0].html, PAGE_HTML);
}

#[tokio::test]
async fn test_project_switch_mid_request_updates_stored_project() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let original_id = workspace.project().await.id;
    let (received, release) = provider.push_gated(PAGE_HTML);

    let request = workspace.send_prompt("rebuild", None);
    let interleave = async {
        received.notified().await;
        let (created, _) = workspace.create_project(NewProject::Blank).await.unwrap();
        release.notify_one();
        created
    };
    let (outcome, created) = tokio::join!(request, interleave);

    assert!(matches!(outcome.unwrap(), PromptOutcome::CodeApplied { .. }));

    let current = workspace.project().await;
    assert_eq!(current.id, created.id);
    assert_ne!(current.pages[0].html, PAGE_HTML);
    assert!(current.messages.is_empty());

    let stored = store.get(&original_id).await.unwrap().unwrap();
    assert_eq!(stored.pages[0].html, PAGE_HTML);
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn test_project_deleted_mid_request_stays_deleted() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(Arc::clone(&provider)).await;
    let doomed_id = workspace.project().await.id;
    let (received, release) = provider.push_gated(PAGE_HTML);

    let request = workspace.send_prompt("rebuild", None);
    let interleave = async {
        received.notified().await;
        workspace.delete_project(&doomed_id).await.unwrap();
        release.notify_one();
    };
    let (outcome, ()) = tokio::join!(request, interleave);

    assert!(matches!(outcome.unwrap(), PromptOutcome::Discarded { .. }));
    let current = workspace.project().await;
    assert_ne!(current.id, doomed_id);
    assert_ne!(current.pages[0].html, PAGE_HTML);

    workspace.flush().await.unwrap();
    assert!(store.get(&doomed_id).await.unwrap().is_none());
    let remaining = store.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, current.id);
    assert_eq!(store.last_active_id().await.unwrap(), Some(current.id));
}

#[tokio::test]
async fn test_project_switch_resets_conversation() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    provider.push_text("one");
    provider.push_text("two");

    workspace.send_prompt("hello", None).await.unwrap();
    assert!(workspace.gateway().has_session().await);
    assert_eq!(provider.created(), 1);

    workspace.create_project(NewProject::Template("portfolio-dark".to_string())).await.unwrap();
    assert_eq!(provider.ended(), 1);
    assert!(!workspace.gateway().has_session().await);

    workspace.send_prompt("hello again", None).await.unwrap();
    let sent = provider.sent();
    assert_eq!(provider.created(), 2);
    assert_ne!(sent[0].0, sent[1].0);
}

#[tokio::test]
async fn test_create_project_variants() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(Arc::clone(&provider)).await;

    let result = workspace.create_project(NewProject::Template("nope".to_string())).await;
    assert!(matches!(result, Err(WorkspaceError::UnknownTemplate(_))));

    provider.push_text(PAGE_HTML);
    let (project, outcome) = workspace
        .create_project(NewProject::Ai("a bakery landing page".to_string()))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(PromptOutcome::CodeApplied { .. })));
    assert_eq!(workspace.project().await.pages[0].html, PAGE_HTML);
    assert_eq!(workspace.project().await.id, project.id);

    workspace.flush().await.unwrap();
    assert_eq!(store.list().await.unwrap().len(), 2);
    assert_eq!(store.last_active_id().await.unwrap(), Some(project.id));
}

#[tokio::test]
async fn test_select_and_delete_projects() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(provider).await;
    let first_id = workspace.project().await.id;
    workspace.update_code("<html>first edit</html>").await.unwrap();

    let (second, _) = workspace.create_project(NewProject::Blank).await.unwrap();

    // The pending edit was written before switching away
    let first = workspace.select_project(&first_id).await.unwrap();
    assert_eq!(first.pages[0].html, "<html>first edit</html>");

    workspace.delete_project(&first_id).await.unwrap();
    assert_eq!(workspace.project().await.id, second.id);
    assert!(store.get(&first_id).await.unwrap().is_none());

    workspace.delete_project(&second.id).await.unwrap();
    let remaining = store.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(workspace.project().await.id, remaining[0].id);

    let missing = workspace.select_project("missing").await;
    assert!(matches!(missing, Err(WorkspaceError::ProjectNotFound(_))));
}

#[tokio::test]
async fn test_rename_other_project_goes_to_store() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(provider).await;
    let first_id = workspace.project().await.id;
    workspace.create_project(NewProject::Blank).await.unwrap();

    workspace.rename_project(&first_id, "Archive").await.unwrap();

    assert_eq!(store.get(&first_id).await.unwrap().unwrap().name, "Archive");
    let missing = workspace.rename_project("missing", "x").await;
    assert!(matches!(missing, Err(WorkspaceError::ProjectNotFound(_))));
}

#[tokio::test]
async fn test_add_page_clones_home_and_refreshes_navigation() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp) = create_workspace(Arc::clone(&provider)).await;
    workspace
        .update_code("<!DOCTYPE html><html><body><header>old</header><main>home</main></body></html>")
        .await
        .unwrap();

    provider.push_text("<!DOCTYPE html><html><body><header>old</header><main></main></body></html>");
    provider.push_text(concat!(
        "```html\n",
        r#"<header><nav><a href="index.html">Home</a><a href="about.html">About</a></nav></header>"#,
        "<footer>shared</footer>\n```"
    ));

    let (page, outcome) = workspace.add_page("About", "about.html", true).await.unwrap();

    assert!(matches!(outcome, PromptOutcome::CodeApplied { .. }));
    assert_eq!(workspace.active_page().await.unwrap().id, page.id);

    let sent = provider.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("<main>home</main>"));
    assert!(sent[0].1.contains("by cloning the home page"));
    assert!(sent[1].1.starts_with("Produce the shared navigation"));

    let project = workspace.project().await;
    assert_eq!(project.pages.len(), 2);
    for page in &project.pages {
        assert!(page.html.contains(r#"<a href="about.html">About</a>"#), "{}", page.html);
        assert!(page.html.contains("<footer>shared</footer>"), "{}", page.html);
        assert!(!page.html.contains("<header>old</header>"), "{}", page.html);
    }
    assert!(project.pages[0].html.contains("<main>home</main>"));
}

#[tokio::test]
async fn test_refresh_navigation_counts_only_real_changes() {
    let provider = ScriptedProvider::new();
    let (workspace, _store, _temp, _home_id, _about_id) = two_page_workspace(&provider).await;
    let fragment = concat!(
        "```html\n",
        r#"<header><nav><a href="index.html">Home</a><a href="about.html">About</a></nav></header>"#,
        "<footer>shared</footer>\n```"
    );

    provider.push_text(fragment);
    assert_eq!(workspace.refresh_navigation().await.unwrap(), 2);

    // Same fragment again: both pages already carry it
    provider.push_text(fragment);
    assert_eq!(workspace.refresh_navigation().await.unwrap(), 0);
}

#[tokio::test]
async fn test_flush_persists_pending_edit() {
    let provider = ScriptedProvider::new();
    let (workspace, store, _temp) = create_workspace(provider).await;
    let id = workspace.project().await.id;

    workspace.update_code("<html>draft</html>").await.unwrap();
    assert!(workspace.is_saving());
    assert_ne!(store.get(&id).await.unwrap().unwrap().pages[0].html, "<html>draft</html>");

    workspace.flush().await.unwrap();
    assert!(!workspace.is_saving());
    assert_eq!(store.get(&id).await.unwrap().unwrap().pages[0].html, "<html>draft</html>");
}

#[tokio::test]
async fn test_autosave_debounces_to_latest_state() {
    let provider = ScriptedProvider::new();
    let (store, _temp) = create_test_store();
    let workspace = Workspace::open(Arc::clone(&store), provider, Duration::from_millis(20))
        .await
        .unwrap();
    let id = workspace.project().await.id;

    workspace.update_code("<html>one</html>").await.unwrap();
    workspace.update_code("<html>two</html>").await.unwrap();
    assert!(workspace.is_saving());

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!workspace.is_saving());
    assert_eq!(store.get(&id).await.unwrap().unwrap().pages[0].html, "<html>two</html>");
}
