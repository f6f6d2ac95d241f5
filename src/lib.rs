//! Wikigraph library: wiki-link notes and entity graphs for a lab data portal.
//!
//! The crate is a headless core. Host pages mount its components through
//! `page::Page`, and the development binary serves the endpoints the core
//! talks to.
//!
//! - `wikilink` / `markdown`: `[[kind:id|label]]` tokens and preview rendering
//! - `autocomplete` / `editor`: the note editor session
//! - `graph` / `popup`: the graph view and its node popup
//! - `handlers` / `catalog` / `config`: the development host

use std::sync::Arc;

pub mod autocomplete;
pub mod catalog;
pub mod client;
pub mod config;
pub mod editor;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod markdown;
pub mod models;
pub mod page;
pub mod popup;
pub mod wikilink;

// ============================================================================
// Application State
// ============================================================================

/// Shared state of the development host.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub catalog: catalog::Catalog,
}

impl AppState {
    pub fn new(catalog: catalog::Catalog) -> Self {
        Self { catalog }
    }
}

/// Builds the host router over `state`.
pub fn app(state: AppState) -> axum::Router {
    handlers::router(Arc::new(state))
}

// Re-export commonly used types
pub use autocomplete::{detect_trigger, CompletionResult, Suggestion, Trigger, WikiLinkCompleter};
pub use client::ApiClient;
pub use config::HostConfig;
pub use editor::{EditorConfig, EditorSession, PreviewBuffer, PreviewSink, SaveControl, SaveState};
pub use error::{ClientError, ConfigError, EditorError};
pub use graph::{
    GraphEffect, GraphFlavor, GraphModel, GraphView, GraphViewConfig, LayoutDirection, PlainStyle,
    TypedStyle,
};
pub use markdown::{render_markdown, MarkdownRenderer};
pub use models::{entity_url, EntityKind, EntityRef, RawGraph};
pub use page::Page;
pub use popup::{NodePopup, SharedPopup};
pub use wikilink::{extract_links, parse_at, WikiLink, WikiLinkRule};
