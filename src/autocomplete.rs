//! Wiki-link autocompletion.
//!
//! When the text before the cursor ends in `[[sample:<query>` or
//! `[[dataset:<query>`, the completer asks the search endpoint for matching
//! entities and proposes fully-formed `[[kind:id|name]]` tokens that replace
//! the partial span. The completer only returns data; deciding whether a
//! result is still relevant is the editor's job.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::models::{EntityKind, SearchItem};
use crate::wikilink::format_token;

/// Number of id characters shown next to a suggestion.
pub const DETAIL_ID_CHARS: usize = 12;

fn trigger_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[\[(sample|dataset):([^\]]*)$").expect("trigger pattern is valid")
    })
}

/// A partial token before the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: EntityKind,
    pub query: String,
    /// Byte offset of the opening `[[`.
    pub from: usize,
    /// Byte offset of the cursor.
    pub to: usize,
}

/// Matches the trigger pattern against the current line up to `cursor`.
pub fn detect_trigger(doc: &str, cursor: usize) -> Option<Trigger> {
    let before = doc.get(..cursor)?;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &before[line_start..];

    let caps = trigger_pattern().captures(line)?;
    let whole = caps.get(0)?;
    let kind = EntityKind::parse(caps.get(1)?.as_str())?;
    Some(Trigger {
        kind,
        query: caps.get(2)?.as_str().to_string(),
        from: line_start + whole.start(),
        to: cursor,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Display name of the entity.
    pub label: String,
    /// Abbreviated id.
    pub detail: String,
    /// Token inserted in place of the partial span.
    pub apply: String,
}

/// Suggestions for one trigger, in endpoint order. `from` is where the
/// replacement starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub kind: EntityKind,
    pub from: usize,
    pub options: Vec<Suggestion>,
}

pub fn abbreviate_id(id: &str) -> String {
    id.chars().take(DETAIL_ID_CHARS).collect()
}

pub fn suggestion_for(kind: EntityKind, item: &SearchItem) -> Suggestion {
    Suggestion {
        label: item.name.clone(),
        detail: abbreviate_id(&item.id),
        apply: format_token(kind, &item.id, &item.name),
    }
}

/// Completion source backed by the project's search endpoint.
#[derive(Debug, Clone)]
pub struct WikiLinkCompleter {
    client: ApiClient,
    project_id: String,
}

impl WikiLinkCompleter {
    pub fn new(client: ApiClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }

    /// Completes at `cursor`, or `None` when the cursor is not in a trigger
    /// context or the lookup failed.
    pub async fn complete(&self, doc: &str, cursor: usize) -> Option<CompletionResult> {
        let trigger = detect_trigger(doc, cursor)?;
        self.complete_trigger(&trigger).await
    }

    pub async fn complete_trigger(&self, trigger: &Trigger) -> Option<CompletionResult> {
        let items = match self
            .client
            .search_entities(&self.project_id, trigger.kind, &trigger.query)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(kind = %trigger.kind, query = %trigger.query, error = %e, "autocomplete lookup failed");
                return None;
            }
        };

        debug!(kind = %trigger.kind, query = %trigger.query, count = items.len(), "autocomplete lookup");
        Some(CompletionResult {
            kind: trigger.kind,
            from: trigger.from,
            options: items
                .iter()
                .map(|item| suggestion_for(trigger.kind, item))
                .collect(),
        })
    }
}
