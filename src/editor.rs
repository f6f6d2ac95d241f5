//! Note editor session: text buffer, live preview, autocomplete and save.
//!
//! The text-editing surface itself belongs to the host. This module owns what
//! sits behind it:
//! - the buffer and cursor, with every change re-rendering the preview
//! - request affinity for autocomplete lookups (latest trigger wins)
//! - the save round trip and the state of the save control

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::autocomplete::{detect_trigger, CompletionResult, Trigger, WikiLinkCompleter};
use crate::client::ApiClient;
use crate::error::EditorError;
use crate::markdown::MarkdownRenderer;

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

/// How long "Saved!" stays up before the control returns to "Save".
pub const SAVED_REVERT_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// Configuration
// ============================================================================

/// Editor configuration as passed by the host page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub container_id: String,
    pub preview_id: String,
    pub project_id: String,
    #[serde(default)]
    pub initial_content: String,
    pub save_url: String,
    #[serde(default)]
    pub saved_revert_ms: Option<u64>,
}

impl EditorConfig {
    pub fn saved_revert_delay(&self) -> Duration {
        self.saved_revert_ms
            .map(Duration::from_millis)
            .unwrap_or(SAVED_REVERT_DELAY)
    }
}

// ============================================================================
// Save Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Saving,
    Saved,
    Failed,
}

impl SaveState {
    pub fn label(&self) -> &'static str {
        match self {
            SaveState::Idle => "Save",
            SaveState::Saving => "Saving...",
            SaveState::Saved => "Saved!",
            SaveState::Failed => "Save Failed - Retry",
        }
    }

    /// Only an enabled control accepts clicks.
    pub fn is_enabled(&self) -> bool {
        matches!(self, SaveState::Idle | SaveState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed,
}

/// The save button. Its state is published on a watch channel so the host can
/// mirror label and disabled flag.
#[derive(Debug, Clone)]
pub struct SaveControl {
    state: Arc<watch::Sender<SaveState>>,
}

impl SaveControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SaveState::Idle);
        Self { state: Arc::new(tx) }
    }

    pub fn state(&self) -> SaveState {
        *self.state.borrow()
    }

    pub fn label(&self) -> &'static str {
        self.state().label()
    }

    pub fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.state.subscribe()
    }

    /// Clicks the control. Returns false if it is disabled.
    fn press(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_enabled() {
                *state = SaveState::Saving;
                true
            } else {
                false
            }
        })
    }

    fn succeed(&self, revert_after: Duration) {
        self.state.send_replace(SaveState::Saved);
        let state = self.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(revert_after).await;
            state.send_if_modified(|s| {
                if *s == SaveState::Saved {
                    *s = SaveState::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }

    fn fail(&self) {
        self.state.send_replace(SaveState::Failed);
    }
}

impl Default for SaveControl {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Preview
// ============================================================================

/// The element that shows rendered HTML. Each render replaces its content.
pub trait PreviewSink {
    fn replace_content(&mut self, html: &str);
}

#[derive(Debug, Default)]
struct PreviewContents {
    html: String,
    renders: usize,
}

/// In-memory preview surface; clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct PreviewBuffer(Rc<RefCell<PreviewContents>>);

impl PreviewBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(&self) -> String {
        self.0.borrow().html.clone()
    }

    pub fn render_count(&self) -> usize {
        self.0.borrow().renders
    }
}

impl PreviewSink for PreviewBuffer {
    fn replace_content(&mut self, html: &str) {
        let mut contents = self.0.borrow_mut();
        contents.html = html.to_string();
        contents.renders += 1;
    }
}

// ============================================================================
// Completions
// ============================================================================

/// Identifies one lookup. Only the ticket of the latest request is honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTicket {
    generation: u64,
    pub trigger: Trigger,
}

pub struct PendingCompletion {
    pub ticket: CompletionTicket,
    pub lookup: BoxFuture<'static, Option<CompletionResult>>,
}

// ============================================================================
// Editor Session
// ============================================================================

pub struct EditorSession {
    config: EditorConfig,
    buffer: String,
    cursor: usize,
    renderer: MarkdownRenderer,
    preview: Option<Box<dyn PreviewSink>>,
    client: ApiClient,
    completer: WikiLinkCompleter,
    control: SaveControl,
    generation: u64,
    completions: Option<CompletionResult>,
}

impl EditorSession {
    /// Creates the session and renders the initial preview. With no preview
    /// surface, rendering is skipped.
    pub fn new(config: EditorConfig, client: ApiClient, preview: Option<Box<dyn PreviewSink>>) -> Self {
        let buffer = config.initial_content.clone();
        let mut session = Self {
            renderer: MarkdownRenderer::for_project(&config.project_id),
            completer: WikiLinkCompleter::new(client.clone(), config.project_id.clone()),
            cursor: buffer.len(),
            buffer,
            preview,
            client,
            control: SaveControl::new(),
            generation: 0,
            completions: None,
            config,
        };
        session.refresh_preview();
        session
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn content(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn save_control(&self) -> &SaveControl {
        &self.control
    }

    /// Moves the cursor. Any open completion list is closed.
    pub fn set_cursor(&mut self, pos: usize) -> Result<(), EditorError> {
        self.check_position(pos)?;
        if pos != self.cursor {
            self.completions = None;
        }
        self.cursor = pos;
        Ok(())
    }

    /// Replaces the whole buffer and moves the cursor to its end.
    pub fn set_content(&mut self, text: &str) {
        self.buffer = text.to_string();
        self.cursor = self.buffer.len();
        self.changed();
    }

    /// Inserts at the cursor, leaving the cursor after the inserted text.
    pub fn insert(&mut self, text: &str) {
        let at = self.cursor;
        self.buffer.insert_str(at, text);
        self.cursor = at + text.len();
        self.changed();
    }

    /// Removes the character before the cursor.
    pub fn delete_backward(&mut self) {
        let Some(c) = self.buffer[..self.cursor].chars().next_back() else {
            return;
        };
        let start = self.cursor - c.len_utf8();
        self.buffer.replace_range(start..self.cursor, "");
        self.cursor = start;
        self.changed();
    }

    pub fn replace_range(&mut self, range: Range<usize>, text: &str) -> Result<(), EditorError> {
        self.check_position(range.start)?;
        self.check_position(range.end)?;
        if range.start > range.end {
            return Err(EditorError::InvalidPosition(range.start));
        }

        self.buffer.replace_range(range.clone(), text);
        self.cursor = if self.cursor >= range.end {
            self.cursor - (range.end - range.start) + text.len()
        } else if self.cursor > range.start {
            range.start + text.len()
        } else {
            self.cursor
        };
        self.changed();
        Ok(())
    }

    /// Renders the buffer into the preview surface. The buffer is not touched.
    pub fn refresh_preview(&mut self) {
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        let html = self.renderer.render(&self.buffer);
        preview.replace_content(&html);
    }

    /// Drops the preview surface. Later changes render nothing.
    pub fn detach_preview(&mut self) {
        self.preview = None;
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    fn changed(&mut self) {
        self.completions = None;
        self.refresh_preview();
    }

    fn check_position(&self, pos: usize) -> Result<(), EditorError> {
        if pos <= self.buffer.len() && self.buffer.is_char_boundary(pos) {
            Ok(())
        } else {
            Err(EditorError::InvalidPosition(pos))
        }
    }

    // ------------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------------

    /// Clicks the save control.
    ///
    /// When the control is enabled it switches to "Saving..." immediately and
    /// a task is spawned that sends a snapshot of the buffer. The task settles
    /// the control whether or not the handle is awaited. Editing may continue
    /// while it runs. A disabled control yields `None`.
    pub fn save(&self) -> Option<JoinHandle<SaveOutcome>> {
        if !self.control.press() {
            debug!(state = ?self.control.state(), "save control disabled");
            return None;
        }

        let client = self.client.clone();
        let control = self.control.clone();
        let save_url = self.config.save_url.clone();
        let content = self.buffer.clone();
        let revert_after = self.config.saved_revert_delay();
        info!(%save_url, bytes = content.len(), "saving note");

        Some(tokio::spawn(async move {
            match client.save_content(&save_url, &content).await {
                Ok(()) => {
                    info!(%save_url, "note saved");
                    control.succeed(revert_after);
                    SaveOutcome::Saved
                }
                Err(e) => {
                    warn!(%save_url, error = %e, "save failed");
                    control.fail();
                    SaveOutcome::Failed
                }
            }
        }))
    }

    // ------------------------------------------------------------------------
    // Autocomplete
    // ------------------------------------------------------------------------

    /// Starts a lookup if the cursor is in a trigger context. Any earlier
    /// pending lookup becomes stale.
    pub fn request_completions(&mut self) -> Option<PendingCompletion> {
        let trigger = detect_trigger(&self.buffer, self.cursor)?;
        self.generation += 1;
        let ticket = CompletionTicket {
            generation: self.generation,
            trigger: trigger.clone(),
        };

        let completer = self.completer.clone();
        let lookup = async move { completer.complete_trigger(&trigger).await }.boxed();
        Some(PendingCompletion { ticket, lookup })
    }

    /// Offers the result of a lookup. It is kept only if the ticket is the
    /// latest one and the cursor is still in the same trigger context.
    pub fn accept_completions(
        &mut self,
        ticket: &CompletionTicket,
        result: Option<CompletionResult>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(ticket = ticket.generation, latest = self.generation, "discarding stale completions");
            return false;
        }
        let still_active = detect_trigger(&self.buffer, self.cursor)
            .map(|t| t.from == ticket.trigger.from && t.kind == ticket.trigger.kind)
            .unwrap_or(false);
        if !still_active {
            debug!("discarding completions for a closed trigger");
            return false;
        }

        self.completions = result;
        self.completions.is_some()
    }

    pub fn completions(&self) -> Option<&CompletionResult> {
        self.completions.as_ref()
    }

    pub fn dismiss_completions(&mut self) {
        self.completions = None;
    }

    /// Replaces the partial token with the chosen suggestion. The cursor must
    /// still be in the trigger the completions were made for.
    pub fn apply_suggestion(&mut self, index: usize) -> Result<(), EditorError> {
        let (kind, from, apply) = {
            let result = self
                .completions
                .as_ref()
                .ok_or(EditorError::NoSuchSuggestion(index))?;
            let suggestion = result
                .options
                .get(index)
                .ok_or(EditorError::NoSuchSuggestion(index))?;
            (result.kind, result.from, suggestion.apply.clone())
        };
        let same_trigger = detect_trigger(&self.buffer, self.cursor)
            .map(|t| t.from == from && t.kind == kind)
            .unwrap_or(false);
        if !same_trigger {
            debug!(from, cursor = self.cursor, "completions no longer match the cursor");
            self.completions = None;
            return Err(EditorError::NoSuchSuggestion(index));
        }
        self.replace_range(from..self.cursor, &apply)?;
        self.cursor = from + apply.len();
        Ok(())
    }
}
