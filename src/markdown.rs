//! Markdown rendering with pluggable inline rules.
//!
//! Block structure is parsed by `pulldown-cmark`. [`InlineRule`]s then claim
//! spans and emit render tokens. Source rules read the raw markdown, so
//! emphasis, escapes and smart punctuation never reach inside a claimed span;
//! parser events covered by a span are replaced by the rule's tokens. Text
//! rules rescan the parser's text runs. Code, inline code and existing links
//! are never scanned. The resulting HTML is sanitized with `ammonia`.

use std::ops::Range;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};
use tracing::debug;
use url::Url;

use crate::wikilink::WikiLinkRule;

// ============================================================================
// Inline Scanning
// ============================================================================

/// Render unit produced by the inline scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineToken {
    Text(String),
    LinkOpen { href: String, class: Option<String> },
    LinkClose,
}

/// Scan state handed to each rule: the source text, the cursor and the tokens
/// emitted so far. Plain characters accumulate in `pending` until a rule emits.
#[derive(Debug)]
pub struct InlineState<'a> {
    pub src: &'a str,
    pub pos: usize,
    pub tokens: Vec<InlineToken>,
    pending: String,
}

impl<'a> InlineState<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            pending: String::new(),
        }
    }

    /// Remaining source from the cursor.
    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn push(&mut self, token: InlineToken) {
        self.flush_pending();
        self.tokens.push(token);
    }

    fn push_char(&mut self, c: char) {
        self.pending.push(c);
        self.pos += c.len_utf8();
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.tokens.push(InlineToken::Text(text));
        }
    }

    fn finish(mut self) -> Vec<InlineToken> {
        self.flush_pending();
        self.tokens
    }
}

/// What an [`InlineRule`] scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleInput {
    /// Raw markdown source, before any inline parsing.
    Source,
    /// Text runs as produced by the parser.
    Text,
}

/// An inline grammar extension.
///
/// `apply` is called at every scan position. On a match the rule advances
/// `state.pos` past the consumed span, emits tokens unless `silent`, and
/// returns `true`. On no match it must leave the state untouched and return
/// `false`, so that other rules or plain text handle the position.
pub trait InlineRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn input(&self) -> RuleInput {
        RuleInput::Text
    }

    fn apply(&self, state: &mut InlineState<'_>, silent: bool) -> bool;
}

/// Runs `rules` over `text` and returns the emitted tokens.
pub fn scan_inline(text: &str, rules: &[&dyn InlineRule]) -> Vec<InlineToken> {
    let mut state = InlineState::new(text);
    while state.pos < text.len() {
        let start = state.pos;
        let matched = rules.iter().any(|rule| rule.apply(&mut state, false));
        if matched {
            debug_assert!(state.pos > start, "inline rule matched without consuming");
            continue;
        }
        debug_assert_eq!(state.pos, start);
        match state.rest().chars().next() {
            Some(c) => state.push_char(c),
            None => break,
        }
    }
    state.finish()
}

// ============================================================================
// Linkify
// ============================================================================

/// Turns bare `http://`, `https://` and `www.` URLs into links.
pub struct LinkifyRule;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.as_bytes()
        .get(..prefix.len())
        .map_or(false, |b| b.eq_ignore_ascii_case(prefix.as_bytes()))
}

impl LinkifyRule {
    fn match_len(src: &str, pos: usize) -> Option<(usize, String)> {
        let rest = &src[pos..];
        let is_www = starts_with_ignore_case(rest, "www.");
        if !(is_www
            || starts_with_ignore_case(rest, "http://")
            || starts_with_ignore_case(rest, "https://"))
        {
            return None;
        }
        // Only at a word boundary.
        if src[..pos]
            .chars()
            .next_back()
            .map(|c| c.is_alphanumeric())
            .unwrap_or(false)
        {
            return None;
        }

        let end = rest
            .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
            .unwrap_or(rest.len());
        let candidate = rest[..end].trim_end_matches(TRAILING_PUNCTUATION);
        let href = if is_www {
            format!("http://{}", candidate)
        } else {
            candidate.to_string()
        };
        let parsed = Url::parse(&href).ok()?;
        parsed.host_str().filter(|h| h.contains('.') || *h == "localhost")?;
        Some((candidate.len(), href))
    }
}

impl InlineRule for LinkifyRule {
    fn name(&self) -> &'static str {
        "linkify"
    }

    fn apply(&self, state: &mut InlineState<'_>, silent: bool) -> bool {
        let Some((len, href)) = Self::match_len(state.src, state.pos) else {
            return false;
        };
        if !silent {
            let text = state.src[state.pos..state.pos + len].to_string();
            state.push(InlineToken::LinkOpen { href, class: None });
            state.push(InlineToken::Text(text));
            state.push(InlineToken::LinkClose);
        }
        state.pos += len;
        true
    }
}

// ============================================================================
// Text Escaping
// ============================================================================

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ============================================================================
// Markdown Rendering
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RendererOptions {
    pub linkify: bool,
    pub typographer: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            linkify: true,
            typographer: true,
        }
    }
}

/// Markdown-to-HTML pipeline extended with inline rules.
pub struct MarkdownRenderer {
    options: Options,
    rules: Vec<Box<dyn InlineRule>>,
    sanitizer: ammonia::Builder<'static>,
}

impl MarkdownRenderer {
    pub fn new(opts: RendererOptions) -> Self {
        let mut options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
        if opts.typographer {
            options |= Options::ENABLE_SMART_PUNCTUATION;
        }

        let mut sanitizer = ammonia::Builder::default();
        sanitizer.add_tag_attributes("a", &["class"]).link_rel(None);

        let mut renderer = Self {
            options,
            rules: Vec::new(),
            sanitizer,
        };
        if opts.linkify {
            renderer.rules.push(Box::new(LinkifyRule));
        }
        renderer
    }

    /// Renderer for note previews: default options with the wiki-link rule
    /// ahead of linkify.
    pub fn for_project(project_id: &str) -> Self {
        let mut renderer = Self::new(RendererOptions::default());
        renderer
            .rules
            .insert(0, Box::new(WikiLinkRule::new(project_id)));
        renderer
    }

    /// Appends a rule; rules are tried in registration order.
    pub fn with_rule(mut self, rule: impl InlineRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    fn rules_for(&self, input: RuleInput) -> Vec<&dyn InlineRule> {
        self.rules
            .iter()
            .filter(|rule| rule.input() == input)
            .map(|rule| rule.as_ref())
            .collect()
    }

    pub fn render(&self, content: &str) -> String {
        let events: Vec<(Event<'_>, Range<usize>)> = Parser::new_ext(content, self.options)
            .into_offset_iter()
            .collect();
        let spans = self.claim_source_spans(content, &events);
        let events = self.rewrite_events(content, events, &spans);
        let mut html_output = String::new();
        pulldown_cmark::html::push_html(&mut html_output, events.into_iter());
        self.sanitizer.clean(&html_output).to_string()
    }

    /// Runs the source rules at every position of the eligible text events.
    /// A match is kept only if the parser events it covers can be replaced
    /// as a unit.
    fn claim_source_spans(&self, content: &str, events: &[(Event<'_>, Range<usize>)]) -> Vec<SourceSpan> {
        let rules = self.rules_for(RuleInput::Source);
        let mut spans = Vec::new();
        if rules.is_empty() {
            return spans;
        }

        let mut nesting = Nesting::default();
        let mut claimed_until = 0;
        for (i, (event, range)) in events.iter().enumerate() {
            nesting.track(event);
            if !matches!(event, Event::Text(_)) || !nesting.scannable() {
                continue;
            }
            for (offset, _) in content[range.clone()].char_indices() {
                let pos = range.start + offset;
                if pos < claimed_until {
                    continue;
                }
                let mut state = InlineState::new(content);
                state.pos = pos;
                if !rules.iter().any(|rule| rule.apply(&mut state, false)) {
                    continue;
                }
                let span = pos..state.pos;
                if !covers_whole_events(&events[i..], &span) {
                    debug!(start = span.start, end = span.end, "inline match crosses markup, skipped");
                    continue;
                }
                claimed_until = span.end;
                spans.push(SourceSpan {
                    range: span,
                    tokens: state.finish(),
                });
            }
        }
        spans
    }

    fn rewrite_events<'a>(
        &self,
        content: &'a str,
        events: Vec<(Event<'a>, Range<usize>)>,
        spans: &[SourceSpan],
    ) -> Vec<Event<'a>> {
        let text_rules = self.rules_for(RuleInput::Text);
        let mut out = Vec::new();
        let mut pending = String::new();
        let mut nesting = Nesting::default();

        for (event, range) in events {
            if is_inline(&event) && spans.iter().any(|span| span.covers(&range)) {
                continue;
            }
            if let Event::Text(text) = &event {
                if nesting.scannable() {
                    let mut at = range.start;
                    for span in spans.iter().filter(|span| span.overlaps(&range)) {
                        if span.range.start > at {
                            pending.push_str(&text_slice(content, text, &range, at..span.range.start));
                        }
                        if span.range.start >= range.start {
                            flush_text(&text_rules, &mut pending, &mut out);
                            out.extend(span.tokens.iter().cloned().map(token_event));
                        }
                        at = at.max(span.range.end.min(range.end));
                    }
                    if at == range.start {
                        pending.push_str(text);
                    } else if at < range.end {
                        pending.push_str(&text_slice(content, text, &range, at..range.end));
                    }
                    continue;
                }
            }
            flush_text(&text_rules, &mut pending, &mut out);
            nesting.track(&event);
            out.push(event);
        }
        flush_text(&text_rules, &mut pending, &mut out);
        out
    }
}

/// A source range claimed by a rule and the tokens that replace it.
#[derive(Debug)]
struct SourceSpan {
    range: Range<usize>,
    tokens: Vec<InlineToken>,
}

impl SourceSpan {
    fn covers(&self, other: &Range<usize>) -> bool {
        self.range.start <= other.start && other.end <= self.range.end
    }

    fn overlaps(&self, other: &Range<usize>) -> bool {
        self.range.start < other.end && other.start < self.range.end
    }
}

/// Depth of code blocks and links around the current event.
#[derive(Debug, Default)]
struct Nesting {
    code: usize,
    link: usize,
}

impl Nesting {
    fn track(&mut self, event: &Event<'_>) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => self.code += 1,
            Event::End(TagEnd::CodeBlock) => self.code = self.code.saturating_sub(1),
            Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => self.link += 1,
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                self.link = self.link.saturating_sub(1)
            }
            _ => {}
        }
    }

    fn scannable(&self) -> bool {
        self.code == 0 && self.link == 0
    }
}

fn is_inline(event: &Event<'_>) -> bool {
    match event {
        Event::Text(_)
        | Event::Code(_)
        | Event::InlineHtml(_)
        | Event::SoftBreak
        | Event::HardBreak
        | Event::FootnoteReference(_) => true,
        Event::Start(tag) => matches!(
            tag,
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
        ),
        Event::End(tag) => matches!(
            tag,
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
        ),
        _ => false,
    }
}

/// Checks that `span` can replace the events from its first text event on.
/// Inline events inside it are dropped, text may straddle its edges, and
/// blocks may only end around it.
fn covers_whole_events(events: &[(Event<'_>, Range<usize>)], span: &Range<usize>) -> bool {
    for (event, range) in events {
        if range.start >= span.end {
            break;
        }
        let inside = span.start <= range.start && range.end <= span.end;
        let encloses = range.start <= span.start && span.end <= range.end;
        let ok = if !is_inline(event) {
            encloses && matches!(event, Event::End(_))
        } else if inside {
            true
        } else if encloses {
            matches!(event, Event::Text(_) | Event::End(_))
        } else {
            matches!(event, Event::Text(_))
        };
        if !ok {
            return false;
        }
    }
    true
}

/// The part of a text event that comes from `part` of the source. The
/// parser's text is used when it is the source verbatim.
fn text_slice(content: &str, text: &str, range: &Range<usize>, part: Range<usize>) -> String {
    if &content[range.clone()] == text {
        text[part.start - range.start..part.end - range.start].to_string()
    } else {
        content[part].to_string()
    }
}

fn token_event<'a>(token: InlineToken) -> Event<'a> {
    match token {
        InlineToken::Text(t) => Event::Text(CowStr::from(t)),
        InlineToken::LinkOpen { href, class } => {
            let class_attr = class
                .map(|c| format!(r#" class="{}""#, html_escape(&c)))
                .unwrap_or_default();
            Event::Html(CowStr::from(format!(
                r#"<a href="{}"{}>"#,
                html_escape(&href),
                class_attr
            )))
        }
        InlineToken::LinkClose => Event::Html(CowStr::from("</a>")),
    }
}

/// Runs the text rules over the accumulated text run.
fn flush_text<'a>(rules: &[&dyn InlineRule], pending: &mut String, out: &mut Vec<Event<'a>>) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    out.extend(scan_inline(&text, rules).into_iter().map(token_event));
}

/// Renders a note body for `project_id` with the default preview pipeline.
pub fn render_markdown(content: &str, project_id: &str) -> String {
    MarkdownRenderer::for_project(project_id).render(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> MarkdownRenderer {
        MarkdownRenderer::new(RendererOptions {
            linkify: false,
            typographer: false,
        })
    }

    #[test]
    fn test_render_plain_markdown() {
        let html = plain().render("# Title\n\nSome *emphasis*.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn test_linkify_bare_urls() {
        let renderer = MarkdownRenderer::new(RendererOptions::default());
        let html = renderer.render("See https://example.org/data. And www.example.com too");
        assert!(html.contains(r#"<a href="https://example.org/data">https://example.org/data</a>."#));
        assert!(html.contains(r#"<a href="http://www.example.com">www.example.com</a>"#));
    }

    #[test]
    fn test_linkify_after_non_ascii_text() {
        let renderer = MarkdownRenderer::new(RendererOptions::default());
        let text = format!("{} https://example.org/x", "数据".repeat(200));
        let html = renderer.render(&text);
        assert!(html.contains(r#"<a href="https://example.org/x">https://example.org/x</a>"#));
        assert!(!starts_with_ignore_case("数据", "www."));
        assert!(starts_with_ignore_case("HTTPS://x", "https://"));
    }

    #[test]
    fn test_linkify_requires_word_boundary() {
        let mut state = InlineState::new("xhttps://example.org");
        state.pos = 1;
        assert!(!LinkifyRule.apply(&mut state, false));
        assert_eq!(state.pos, 1);
        assert!(state.tokens.is_empty());
    }

    #[test]
    fn test_code_is_not_rescanned() {
        let renderer = MarkdownRenderer::new(RendererOptions::default());
        let html = renderer.render("```\nhttps://example.org\n```\n\n`https://example.org`");
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_raw_html_is_sanitized() {
        let html = plain().render("hello <script>alert(1)</script> world");
        assert!(!html.contains("<script>"));
        assert!(html.contains("hello"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_for_project_rule_order() {
        let renderer = MarkdownRenderer::for_project("p");
        assert_eq!(renderer.rule_names(), vec!["wiki_links", "linkify"]);
    }
}
