//! Wiki-link tokens: `[[kind:id]]` and `[[kind:id|label]]`.
//!
//! Parsing is pure and never rewrites source text. Anything that is not a
//! well-formed token with a recognized kind is declined, leaving the brackets
//! to the rest of the markdown pipeline.

use crate::markdown::{InlineRule, InlineState, InlineToken, RuleInput};
use crate::models::{default_label, entity_url, EntityKind, EntityRef};

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub kind: EntityKind,
    pub id: String,
    /// Explicit label after `|`, if any.
    pub label: Option<String>,
}

impl WikiLink {
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => default_label(self.kind, &self.id),
        }
    }

    pub fn href(&self, project_id: &str) -> String {
        entity_url(project_id, self.kind, &self.id)
    }

    /// Style class of the rendered anchor, qualified by kind.
    pub fn class(&self) -> String {
        format!("wiki-link wiki-link-{}", self.kind)
    }

    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id.clone(), self.display_label())
    }

    /// Source form of the token.
    pub fn to_token(&self) -> String {
        match &self.label {
            Some(label) => format_token(self.kind, &self.id, label),
            None => format!("{}{}:{}{}", OPEN, self.kind, self.id, CLOSE),
        }
    }
}

/// Formats a fully-formed, labelled token.
pub fn format_token(kind: EntityKind, id: &str, name: &str) -> String {
    format!("{}{}:{}|{}{}", OPEN, kind, id, name, CLOSE)
}

/// Parses a token that starts exactly at byte offset `pos`.
///
/// Returns the link and the offset just past the closing `]]`. The id runs to
/// the first `|` (or the closing brackets); the label is everything after it.
pub fn parse_at(src: &str, pos: usize) -> Option<(WikiLink, usize)> {
    if !src.get(pos..)?.starts_with(OPEN) {
        return None;
    }
    let start = pos + OPEN.len();
    let end = start + src[start..].find(CLOSE)?;
    let content = &src[start..end];

    let (kind, rest) = content.split_once(':')?;
    let kind = EntityKind::parse(kind)?;
    let (id, label) = match rest.split_once('|') {
        Some((id, label)) => (id, Some(label.to_string())),
        None => (rest, None),
    };

    Some((
        WikiLink {
            kind,
            id: id.to_string(),
            label,
        },
        end + CLOSE.len(),
    ))
}

/// Extracts every well-formed token in `src`, in order.
pub fn extract_links(src: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    let mut i = 0;
    while let Some(offset) = src[i..].find(OPEN) {
        let at = i + offset;
        match parse_at(src, at) {
            Some((link, end)) => {
                links.push(link);
                i = end;
            }
            None => i = at + 1,
        }
    }
    links
}

// ============================================================================
// Markdown Rule
// ============================================================================

/// Inline rule rendering tokens as anchors to the entity pages of one project.
/// It reads the raw source, so ids and labels are taken literally.
pub struct WikiLinkRule {
    project_id: String,
}

impl WikiLinkRule {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

impl InlineRule for WikiLinkRule {
    fn name(&self) -> &'static str {
        "wiki_links"
    }

    fn input(&self) -> RuleInput {
        RuleInput::Source
    }

    fn apply(&self, state: &mut InlineState<'_>, silent: bool) -> bool {
        let Some((link, end)) = parse_at(state.src, state.pos) else {
            return false;
        };

        if !silent {
            state.push(InlineToken::LinkOpen {
                href: link.href(&self.project_id),
                class: Some(link.class()),
            });
            state.push(InlineToken::Text(link.display_label()));
            state.push(InlineToken::LinkClose);
        }

        state.pos = end;
        true
    }
}
