//! HTTP route handlers of the development host.
//!
//! - `GET /{project}/api/{samples|datasets}?q=`: entity search over the catalog
//! - `POST /{project}/api/preview`: `{content}` rendered to preview HTML
//! - `POST /{project}/api/graph?flavor=&direction=`: raw graph to a view snapshot
//!
//! Nothing is persisted and there is no authentication.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::graph::{GraphFlavor, GraphView, GraphViewConfig, LayoutDirection};
use crate::markdown::render_markdown;
use crate::models::{EntityKind, RawGraph, SaveBody};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{project}/api/preview", post(preview))
        .route("/{project}/api/graph", post(graph_snapshot))
        .route("/{project}/api/{collection}", get(search))
        .with_state(state)
}

// ============================================================================
// Search Handler
// ============================================================================

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

fn kind_for_collection(collection: &str) -> Option<EntityKind> {
    [EntityKind::Sample, EntityKind::Dataset]
        .into_iter()
        .find(|k| k.api_collection() == collection)
}

pub async fn search(
    Path((project, collection)): Path<(String, String)>,
    Query(query): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(kind) = kind_for_collection(&collection) else {
        return (StatusCode::NOT_FOUND, "Unknown collection").into_response();
    };
    let q = query.q.unwrap_or_default();
    let results = state.catalog.search(kind, &q);
    debug!(%project, %kind, query = %q, count = results.len(), "search");
    Json(results).into_response()
}

// ============================================================================
// Preview Handler
// ============================================================================

pub async fn preview(Path(project): Path<String>, Json(body): Json<SaveBody>) -> Html<String> {
    Html(render_markdown(&body.content, &project))
}

// ============================================================================
// Graph Handler
// ============================================================================

#[derive(Deserialize)]
pub struct GraphParams {
    pub flavor: Option<String>,
    pub direction: Option<String>,
}

pub async fn graph_snapshot(
    Path(project): Path<String>,
    Query(params): Query<GraphParams>,
    Json(raw): Json<RawGraph>,
) -> Response {
    let flavor = match params.flavor.as_deref() {
        None => GraphFlavor::Plain,
        Some(s) => match GraphFlavor::parse(s) {
            Some(flavor) => flavor,
            None => return (StatusCode::BAD_REQUEST, "Unknown flavor").into_response(),
        },
    };
    let direction = match params.direction.as_deref() {
        None | Some("LR") => LayoutDirection::LR,
        Some("TB") => LayoutDirection::TB,
        Some(_) => return (StatusCode::BAD_REQUEST, "Unknown direction").into_response(),
    };

    let config = GraphViewConfig {
        container_id: "graph".to_string(),
        project_id: Some(project),
        flavor,
        popup: false,
    };
    let mut view = GraphView::from_config(&config, &raw, None);
    if view.direction() != direction {
        view.toggle_layout();
    }
    let snapshot = view.snapshot();
    info!(
        flavor = snapshot.flavor,
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "graph snapshot"
    );
    Json(snapshot).into_response()
}
