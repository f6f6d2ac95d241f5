//! Page-level registration API.
//!
//! A server-rendered page calls these entry points with typed configuration.
//! The page tracks which element ids exist, and an entry point whose target
//! element is absent logs a warning and does nothing. Components mounted in a
//! removed element are dropped with it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::editor::{EditorConfig, EditorSession, PreviewBuffer, PreviewSink};
use crate::graph::{GraphFlavor, GraphView, GraphViewConfig};
use crate::models::RawGraph;
use crate::popup::{DocumentClick, NodePopup, SharedPopup, Viewport};

pub struct Page {
    client: ApiClient,
    viewport: Viewport,
    surfaces: HashSet<String>,
    /// Created by the first graph that needs it, then shared.
    popup: Option<SharedPopup>,
    graphs: HashMap<String, GraphView>,
    editors: HashMap<String, EditorSession>,
    previews: HashMap<String, PreviewBuffer>,
}

impl Page {
    pub fn new(client: ApiClient, viewport: Viewport) -> Self {
        Self {
            client,
            viewport,
            surfaces: HashSet::new(),
            popup: None,
            graphs: HashMap::new(),
            editors: HashMap::new(),
            previews: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Surfaces
    // ------------------------------------------------------------------------

    pub fn add_surface(&mut self, id: impl Into<String>) {
        self.surfaces.insert(id.into());
    }

    pub fn has_surface(&self, id: &str) -> bool {
        self.surfaces.contains(id)
    }

    /// Removes an element and releases whatever was mounted in it.
    pub fn remove_surface(&mut self, id: &str) -> bool {
        if !self.surfaces.remove(id) {
            return false;
        }
        if self.graphs.remove(id).is_some() {
            debug!(container = %id, "graph view released");
        }
        if let Some(session) = self.editors.remove(id) {
            self.previews.remove(&session.config().preview_id);
            debug!(container = %id, "editor released");
        }
        if self.previews.remove(id).is_some() {
            for session in self.editors.values_mut() {
                if session.config().preview_id == id {
                    session.detach_preview();
                }
            }
            debug!(preview = %id, "preview released");
        }
        true
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(popup) = &self.popup {
            popup.borrow_mut().set_viewport(viewport);
        }
    }

    /// The page's popup, if any graph has created it yet.
    pub fn popup(&self) -> Option<&SharedPopup> {
        self.popup.as_ref()
    }

    fn popup_or_create(&mut self) -> SharedPopup {
        let viewport = self.viewport;
        self.popup
            .get_or_insert_with(|| {
                debug!("creating node popup");
                NodePopup::shared(viewport)
            })
            .clone()
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Mounts a graph view in `config.container_id`, replacing any view
    /// already there.
    pub fn mount_graph(&mut self, config: &GraphViewConfig, raw: &RawGraph) -> Option<&mut GraphView> {
        if !self.has_surface(&config.container_id) {
            warn!(container = %config.container_id, "graph container not found");
            return None;
        }
        let popup = config.popup.then(|| self.popup_or_create());
        let view = GraphView::from_config(config, raw, popup);
        self.graphs.insert(config.container_id.clone(), view);
        self.graphs.get_mut(&config.container_id)
    }

    /// The plain sample graph. Taps navigate to the tapped sample's graph.
    pub fn init_sample_graph(
        &mut self,
        container_id: &str,
        project_id: &str,
        raw: &RawGraph,
    ) -> Option<&mut GraphView> {
        let config = GraphViewConfig {
            container_id: container_id.to_string(),
            project_id: Some(project_id.to_string()),
            flavor: GraphFlavor::Plain,
            popup: false,
        };
        self.mount_graph(&config, raw)
    }

    /// The typed entity graph. Node URLs come with the data.
    pub fn init_entity_graph(
        &mut self,
        container_id: &str,
        raw: &RawGraph,
        with_popup: bool,
    ) -> Option<&mut GraphView> {
        let config = GraphViewConfig {
            container_id: container_id.to_string(),
            project_id: None,
            flavor: GraphFlavor::Typed,
            popup: with_popup,
        };
        self.mount_graph(&config, raw)
    }

    /// Mounts the note editor. Without a preview element the editor still
    /// works but renders nothing.
    pub fn init_note_editor(&mut self, config: EditorConfig) -> Option<&mut EditorSession> {
        if !self.has_surface(&config.container_id) {
            warn!(container = %config.container_id, "editor container not found");
            return None;
        }

        let preview: Option<Box<dyn PreviewSink>> = if self.has_surface(&config.preview_id) {
            let buffer = PreviewBuffer::new();
            self.previews.insert(config.preview_id.clone(), buffer.clone());
            Some(Box::new(buffer))
        } else {
            warn!(preview = %config.preview_id, "preview element not found");
            None
        };

        let container_id = config.container_id.clone();
        let session = EditorSession::new(config, self.client.clone(), preview);
        self.editors.insert(container_id.clone(), session);
        self.editors.get_mut(&container_id)
    }

    pub fn graph(&self, container_id: &str) -> Option<&GraphView> {
        self.graphs.get(container_id)
    }

    pub fn graph_mut(&mut self, container_id: &str) -> Option<&mut GraphView> {
        self.graphs.get_mut(container_id)
    }

    pub fn editor(&self, container_id: &str) -> Option<&EditorSession> {
        self.editors.get(container_id)
    }

    pub fn editor_mut(&mut self, container_id: &str) -> Option<&mut EditorSession> {
        self.editors.get_mut(container_id)
    }

    pub fn preview(&self, preview_id: &str) -> Option<&PreviewBuffer> {
        self.previews.get(preview_id)
    }

    // ------------------------------------------------------------------------
    // Document events
    // ------------------------------------------------------------------------

    /// Routes a click that reached the document. Returns true if it closed
    /// the popup.
    pub fn handle_document_click(&mut self, click: DocumentClick) -> bool {
        match &self.popup {
            Some(popup) => popup.borrow_mut().handle_document_click(click),
            None => false,
        }
    }

    pub fn handle_key(&mut self, key: &str) -> bool {
        match &self.popup {
            Some(popup) => popup.borrow_mut().handle_key(key),
            None => false,
        }
    }
}
