//! Tests for the editor session: preview rendering, the save round trip and
//! autocomplete request affinity.
//!
//! HTTP collaborators are small axum routers bound to an ephemeral port.

use super::*;
use crate::client::DEFAULT_TIMEOUT;
use crate::models::SaveBody;
use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use std::sync::Mutex;

// ============================================================================
// Helpers
// ============================================================================

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(initial: &str) -> EditorConfig {
    EditorConfig {
        container_id: "mdnote-editor".to_string(),
        preview_id: "mdnote-preview".to_string(),
        project_id: "P".to_string(),
        initial_content: initial.to_string(),
        save_url: "/P/notes/n1".to_string(),
        saved_revert_ms: Some(50),
    }
}

fn session_at(base: &str, initial: &str) -> (EditorSession, PreviewBuffer) {
    let preview = PreviewBuffer::new();
    let client = ApiClient::new(base, DEFAULT_TIMEOUT).unwrap();
    let session = EditorSession::new(config(initial), client, Some(Box::new(preview.clone())));
    (session, preview)
}

fn offline_session(initial: &str) -> (EditorSession, PreviewBuffer) {
    session_at("http://127.0.0.1:9", initial)
}

/// Save endpoint that records bodies and answers with `status`.
async fn save_server(status: StatusCode) -> (String, Arc<Mutex<Vec<String>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/P/notes/n1",
            post(
                move |State(received): State<Arc<Mutex<Vec<String>>>>, Json(body): Json<SaveBody>| async move {
                    received.lock().unwrap().push(body.content);
                    status
                },
            ),
        )
        .with_state(received.clone());
    (serve(app).await, received)
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_from_host_json() {
    let json = r##"{"containerId":"ed","previewId":"pv","projectId":"P",
                    "initialContent":"# Hi","saveUrl":"/P/notes/1"}"##;
    let config: EditorConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.container_id, "ed");
    assert_eq!(config.initial_content, "# Hi");
    assert_eq!(config.saved_revert_delay(), SAVED_REVERT_DELAY);
}

// ============================================================================
// Preview
// ============================================================================

#[test]
fn test_initial_preview_rendered() {
    let (_session, preview) = offline_session("See [[sample:X]]");
    assert_eq!(preview.render_count(), 1);
    assert!(preview.html().contains(r#"href="/P/sample-graph/X""#));
    assert!(preview.html().contains("Sample-X"));
}

#[test]
fn test_every_change_replaces_preview() {
    let (mut session, preview) = offline_session("");
    session.insert("# Title");
    assert!(preview.html().contains("<h1>Title</h1>"));
    session.set_content("[[dataset:Y|Name]]");
    assert!(!preview.html().contains("<h1>"));
    assert!(preview.html().contains(">Name</a>"));
    assert_eq!(preview.render_count(), 3);
}

#[test]
fn test_rendering_does_not_mutate_buffer() {
    let source = "A [[sample:X]] and [[dataset:Y|Name]] and [[bogus]]";
    let (mut session, preview) = offline_session(source);
    for _ in 0..5 {
        session.refresh_preview();
    }
    assert_eq!(session.content(), source);
    assert_eq!(preview.render_count(), 6);
}

#[test]
fn test_missing_preview_surface_is_noop() {
    let client = ApiClient::new("http://127.0.0.1:9", DEFAULT_TIMEOUT).unwrap();
    let mut session = EditorSession::new(config("x"), client, None);
    session.insert(" more");
    session.refresh_preview();
    assert_eq!(session.content(), "x more");
}

// ============================================================================
// Buffer Editing
// ============================================================================

#[test]
fn test_cursor_tracking() {
    let (mut session, _) = offline_session("hello world");
    assert_eq!(session.cursor(), 11);
    session.set_cursor(5).unwrap();
    session.insert(",");
    assert_eq!(session.content(), "hello, world");
    assert_eq!(session.cursor(), 6);
    session.replace_range(0..5, "hi").unwrap();
    assert_eq!(session.content(), "hi, world");
    assert_eq!(session.cursor(), 3);
    session.delete_backward();
    assert_eq!(session.content(), "hi world");
    assert_eq!(session.cursor(), 2);
}

#[test]
fn test_invalid_positions_rejected() {
    let (mut session, _) = offline_session("héllo");
    assert_eq!(session.set_cursor(2), Err(EditorError::InvalidPosition(2)));
    assert_eq!(session.set_cursor(99), Err(EditorError::InvalidPosition(99)));
    assert!(session.replace_range(4..1, "x").is_err());
    assert_eq!(session.content(), "héllo");
}

// ============================================================================
// Save
// ============================================================================

#[tokio::test]
async fn test_save_success_then_revert() {
    let (base, received) = save_server(StatusCode::OK).await;
    let (mut session, _) = session_at(&base, "draft");
    session.insert(" v2");

    let task = session.save().expect("control enabled");
    assert_eq!(session.save_control().label(), "Saving...");
    assert!(!session.save_control().is_enabled());
    assert!(session.save().is_none(), "disabled control must not start a second save");

    assert_eq!(task.await.unwrap(), SaveOutcome::Saved);
    assert_eq!(*received.lock().unwrap(), vec!["draft v2".to_string()]);
    assert_eq!(session.save_control().label(), "Saved!");
    assert!(!session.save_control().is_enabled());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(session.save_control().state(), SaveState::Idle);
    assert_eq!(session.save_control().label(), "Save");
    assert!(session.save_control().is_enabled());
}

#[tokio::test]
async fn test_save_failure_allows_retry() {
    let (base, received) = save_server(StatusCode::INTERNAL_SERVER_ERROR).await;
    let (session, _) = session_at(&base, "draft");

    let outcome = session.save().unwrap().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Failed);
    assert_eq!(session.save_control().label(), "Save Failed - Retry");
    assert!(session.save_control().is_enabled());

    assert_eq!(session.save().unwrap().await.unwrap(), SaveOutcome::Failed);
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_save_network_error_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (session, _) = session_at(&format!("http://{}", addr), "draft");
    assert_eq!(session.save().unwrap().await.unwrap(), SaveOutcome::Failed);
    assert_eq!(session.save_control().state(), SaveState::Failed);
}

#[tokio::test]
async fn test_save_state_is_observable() {
    let (base, _) = save_server(StatusCode::OK).await;
    let (session, _) = session_at(&base, "draft");
    let mut rx = session.save_control().subscribe();

    let task = session.save().unwrap();
    assert_eq!(*rx.borrow_and_update(), SaveState::Saving);
    task.await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SaveState::Saved);
}

#[tokio::test]
async fn test_save_settles_without_awaiting_handle() {
    let (base, received) = save_server(StatusCode::OK).await;
    let (session, _) = session_at(&base, "draft");
    let mut rx = session.save_control().subscribe();

    drop(session.save().unwrap());
    rx.wait_for(|state| *state == SaveState::Saved).await.unwrap();
    assert_eq!(received.lock().unwrap().len(), 1);
}

// ============================================================================
// Autocomplete
// ============================================================================

async fn search_server() -> String {
    let app = Router::new().route(
        "/P/api/samples",
        get(|| async { Json(serde_json::json!([{"id": "1234567890123", "name": "Alpha"}])) }),
    );
    serve(app).await
}

#[tokio::test]
async fn test_completion_inserts_token() {
    let base = search_server().await;
    let (mut session, preview) = session_at(&base, "Grown from ");
    session.insert("[[sample:al");

    let pending = session.request_completions().expect("trigger context");
    let result = pending.lookup.await;
    assert!(session.accept_completions(&pending.ticket, result));
    assert_eq!(session.completions().unwrap().options[0].detail, "123456789012");

    session.apply_suggestion(0).unwrap();
    assert_eq!(session.content(), "Grown from [[sample:1234567890123|Alpha]]");
    assert_eq!(session.cursor(), session.content().len());
    assert!(session.completions().is_none());
    assert!(preview.html().contains(">Alpha</a>"));
}

#[tokio::test]
async fn test_stale_completion_discarded() {
    let base = search_server().await;
    let (mut session, _) = session_at(&base, "[[sample:a");

    let first = session.request_completions().unwrap();
    session.insert("l");
    let second = session.request_completions().unwrap();

    let second_result = second.lookup.await;
    let first_result = first.lookup.await;
    assert!(!session.accept_completions(&first.ticket, first_result));
    assert!(session.accept_completions(&second.ticket, second_result));
}

#[tokio::test]
async fn test_completion_discarded_after_trigger_closed() {
    let base = search_server().await;
    let (mut session, _) = session_at(&base, "[[sample:a");

    let pending = session.request_completions().unwrap();
    session.insert("]] done");
    let result = pending.lookup.await;
    assert!(!session.accept_completions(&pending.ticket, result));
    assert!(session.completions().is_none());
    assert_eq!(session.content(), "[[sample:a]] done");
}

#[tokio::test]
async fn test_failed_lookup_yields_no_suggestions() {
    let (mut session, _) = offline_session("[[dataset:x");
    let pending = session.request_completions().unwrap();
    let result = pending.lookup.await;
    assert!(result.is_none());
    assert!(!session.accept_completions(&pending.ticket, result));
    assert_eq!(session.apply_suggestion(0), Err(EditorError::NoSuchSuggestion(0)));
    assert_eq!(session.content(), "[[dataset:x");
}

#[test]
fn test_no_request_outside_trigger() {
    let (mut session, _) = offline_session("plain text");
    assert!(session.request_completions().is_none());
}

#[tokio::test]
async fn test_moving_cursor_closes_completions() {
    let base = search_server().await;
    let (mut session, _) = session_at(&base, "[[sample:al\nkeep this text");
    session.set_cursor(11).unwrap();

    let pending = session.request_completions().unwrap();
    let result = pending.lookup.await;
    assert!(session.accept_completions(&pending.ticket, result));

    let end = session.content().len();
    session.set_cursor(end).unwrap();
    assert!(session.completions().is_none());
    assert_eq!(session.apply_suggestion(0), Err(EditorError::NoSuchSuggestion(0)));
    assert_eq!(session.content(), "[[sample:al\nkeep this text");
}

#[tokio::test]
async fn test_suggestion_applies_mid_line() {
    let base = search_server().await;
    let (mut session, _) = session_at(&base, "[[sample:al and more");
    session.set_cursor(11).unwrap();

    let pending = session.request_completions().unwrap();
    let result = pending.lookup.await;
    assert!(session.accept_completions(&pending.ticket, result));

    session.apply_suggestion(0).unwrap();
    assert_eq!(session.content(), "[[sample:1234567890123|Alpha]] and more");
    assert_eq!(session.cursor(), 30);
}
