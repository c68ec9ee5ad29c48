//! Markdown structural parsing using tree-sitter.
//!
//! Walks the block syntax tree in document order, maintaining a stack of
//! open heading sections. Each heading becomes a [`Section`] with a byte
//! range into the source; paragraphs, lists, quotes, tables and code blocks
//! become [`ContentBlock`]s attached to the innermost open section. Content
//! appearing before any heading is owned by a synthetic `body` root section
//! of depth 0.
//!
//! The parser also produces the per-level heading projections (`title`,
//! `h1`..`h6`) that the store indexes, and — when code blocks are excluded
//! from search — the byte ranges to mask out of the normalized body.

use std::collections::HashMap;
use tree_sitter::{Node, Parser};

use crate::error::{Error, Result};
use crate::field::FieldKind;
use crate::types::{ContentBlock, ContentKind, Section, Span};

/// Result of structurally parsing one Markdown document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// Text of the first h1.
    pub title: String,
    /// Newline-joined heading text per level, `levels[0]` holding h1.
    pub levels: [String; 6],
    /// Root section ids in document order.
    pub structure: Vec<String>,
    /// Section id to node.
    pub sections_index: HashMap<String, Section>,
    /// Byte ranges of code blocks excluded from the searchable body.
    pub masked_ranges: Vec<(usize, usize)>,
}

/// A tree-sitter based Markdown structural parser.
///
/// Instances are reusable but not thread-safe; create one per thread.
pub struct MarkdownParser {
    parser: Parser,
}

impl MarkdownParser {
    /// Create a parser with the Markdown block grammar loaded.
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_md::LANGUAGE.into())
            .map_err(|e| Error::Parse(format!("failed to load markdown grammar: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse a document into its section forest and field projections.
    pub fn parse(&mut self, text: &str, include_code_blocks: bool) -> Result<ParsedDocument> {
        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| Error::Parse("failed to parse markdown".into()))?;

        let mut state = WalkState {
            text,
            include_code_blocks,
            out: ParsedDocument::default(),
            stack: Vec::new(),
            next_id: 0,
        };
        state.visit_children(tree.root_node());
        Ok(state.out)
    }
}

/// An open heading on the section stack.
struct OpenSection {
    id: String,
    depth: u8,
}

struct WalkState<'a> {
    text: &'a str,
    include_code_blocks: bool,
    out: ParsedDocument,
    stack: Vec<OpenSection>,
    next_id: usize,
}

impl WalkState<'_> {
    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "section" => self.visit_children(child),
                "atx_heading" => self.on_heading(child, atx_depth(child)),
                "setext_heading" => self.on_heading(child, setext_depth(child)),
                "paragraph" => self.on_block(child, ContentKind::Paragraph, None),
                "list" => self.on_block(child, ContentKind::List, None),
                "block_quote" => self.on_block(child, ContentKind::Quote, None),
                "pipe_table" => self.on_block(child, ContentKind::Table, None),
                "fenced_code_block" => self.on_code_block(child, fence_language(child, self.text)),
                "indented_code_block" => self.on_code_block(child, None),
                _ => {},
            }
        }
    }

    fn on_heading(&mut self, node: Node, depth: Option<u8>) {
        let Some(depth) = depth else { return };
        let text = heading_text(node, self.text);
        if text.is_empty() {
            return;
        }

        while self
            .stack
            .last()
            .is_some_and(|open| open.depth >= depth)
        {
            self.stack.pop();
        }

        let id = self.fresh_id();
        let parent_id = self.stack.last().map(|open| open.id.clone());
        let kind = FieldKind::from_depth(depth).unwrap_or(FieldKind::H6);

        let section = Section {
            id: id.clone(),
            kind,
            depth,
            text: text.clone(),
            position: trimmed_span(node, self.text),
            parent_id: parent_id.clone(),
            children_ids: Vec::new(),
            content: Vec::new(),
        };

        match &parent_id {
            Some(pid) => {
                if let Some(parent) = self.out.sections_index.get_mut(pid) {
                    parent.children_ids.push(id.clone());
                }
            },
            None => self.out.structure.push(id.clone()),
        }
        self.out.sections_index.insert(id.clone(), section);
        self.stack.push(OpenSection { id, depth });

        if depth == 1 && self.out.title.is_empty() {
            self.out.title = text;
        } else {
            let projection = &mut self.out.levels[usize::from(depth) - 1];
            if !projection.is_empty() {
                projection.push('\n');
            }
            projection.push_str(&text);
        }
    }

    fn on_code_block(&mut self, node: Node, language: Option<String>) {
        if !self.include_code_blocks {
            let span = trimmed_span(node, self.text);
            self.out.masked_ranges.push((span.start, span.end));
            return;
        }
        self.on_block(node, ContentKind::Code, language);
    }

    fn on_block(&mut self, node: Node, kind: ContentKind, language: Option<String>) {
        let span = trimmed_span(node, self.text);
        let text = match kind {
            ContentKind::Code => code_text(node, self.text),
            _ => self.text[span.start..span.end].trim_end().to_string(),
        };
        if text.trim().is_empty() {
            return;
        }

        let block = ContentBlock {
            kind,
            text,
            position: span,
            language,
        };

        let owner = match self.stack.last() {
            Some(open) => open.id.clone(),
            None => self.body_root_id(),
        };
        if let Some(section) = self.out.sections_index.get_mut(&owner) {
            section.content.push(block);
        }
    }

    /// Lazily create the synthetic root owning pre-heading content.
    fn body_root_id(&mut self) -> String {
        if let Some(first) = self.out.structure.first() {
            if self
                .out
                .sections_index
                .get(first)
                .is_some_and(|s| s.kind == FieldKind::Body)
            {
                return first.clone();
            }
        }
        let id = self.fresh_id();
        let root = Section {
            id: id.clone(),
            kind: FieldKind::Body,
            depth: 0,
            text: String::new(),
            position: Span::new(0, 0),
            parent_id: None,
            children_ids: Vec::new(),
            content: Vec::new(),
        };
        self.out.structure.insert(0, id.clone());
        self.out.sections_index.insert(id.clone(), root);
        id
    }

    fn fresh_id(&mut self) -> String {
        let id = format!("s{}", self.next_id);
        self.next_id += 1;
        id
    }
}

fn atx_depth(node: Node) -> Option<u8> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let depth = match child.kind() {
            "atx_h1_marker" => 1,
            "atx_h2_marker" => 2,
            "atx_h3_marker" => 3,
            "atx_h4_marker" => 4,
            "atx_h5_marker" => 5,
            "atx_h6_marker" => 6,
            _ => continue,
        };
        return Some(depth);
    }
    None
}

fn setext_depth(node: Node) -> Option<u8> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "setext_h1_underline" => return Some(1),
            "setext_h2_underline" => return Some(2),
            _ => {},
        }
    }
    None
}

/// Node byte range with trailing line breaks dropped.
fn trimmed_span(node: Node, text: &str) -> Span {
    let range = node.byte_range();
    let mut end = range.end.min(text.len());
    while end > range.start && matches!(text.as_bytes()[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    Span::new(range.start, end)
}

/// Visible text of a heading: inline formatting removed, inline code
/// unwrapped, links reduced to labels, image alt text preserved.
fn heading_text(node: Node, text: &str) -> String {
    let raw = find_inline(node)
        .map(|inline| &text[inline.byte_range()])
        .unwrap_or_else(|| {
            text[trimmed_span(node, text).start..trimmed_span(node, text).end]
                .trim_start_matches('#')
                .trim()
        });
    let stripped = strip_inline_markup(raw);
    trim_closing_sequence(&stripped).trim().to_string()
}

fn find_inline<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "inline" {
            return Some(child);
        }
        // Setext headings nest their text one level down.
        if let Some(inner) = find_inline(child) {
            return Some(inner);
        }
    }
    None
}

fn fence_language(node: Node, text: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "info_string" {
            let info = text[child.byte_range()].trim();
            if !info.is_empty() {
                return Some(info.split_whitespace().next().unwrap_or(info).to_string());
            }
        }
    }
    None
}

/// Content of a code block without its fences.
fn code_text(node: Node, text: &str) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "code_fence_content" {
            return text[child.byte_range()].trim_end().to_string();
        }
    }
    let span = trimmed_span(node, text);
    text[span.start..span.end].to_string()
}

/// Reduce inline Markdown to its visible text.
///
/// Handles `[label](url)`, `![alt](url)`, `` `code` ``, emphasis markers,
/// strikethrough, HTML tags, and HTML entities. Underscores are left alone:
/// stripping them would mangle snake_case identifiers in headings.
pub fn strip_inline_markup(input: &str) -> String {
    let stripped = strip_inline_bytes(input);
    html_escape::decode_html_entities(&stripped).into_owned()
}

fn strip_inline_bytes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'!' if bytes.get(i + 1) == Some(&b'[') => {
                if let Some((label_end, link_end)) = find_markdown_link(bytes, i + 1) {
                    out.push_str(&strip_inline_bytes(&input[i + 2..label_end]));
                    i = link_end + 1;
                    continue;
                }
                out.push('!');
                i += 1;
            },
            b'[' => {
                if let Some((label_end, link_end)) = find_markdown_link(bytes, i) {
                    out.push_str(&strip_inline_bytes(&input[i + 1..label_end]));
                    i = link_end + 1;
                    continue;
                }
                out.push('[');
                i += 1;
            },
            b'`' => {
                if let Some(close) = bytes[i + 1..].iter().position(|&b| b == b'`') {
                    out.push_str(&input[i + 1..i + 1 + close]);
                    i += close + 2;
                    continue;
                }
                out.push('`');
                i += 1;
            },
            b'<' => {
                if let Some(gt) = bytes[i + 1..].iter().position(|&b| b == b'>') {
                    i += gt + 2;
                    continue;
                }
                out.push('<');
                i += 1;
            },
            b'*' => i += 1,
            b'~' if bytes.get(i + 1) == Some(&b'~') => i += 2,
            _ => {
                let ch = input[i..].chars().next().unwrap_or('\u{FFFD}');
                out.push(ch);
                i += ch.len_utf8();
            },
        }
    }

    out
}

fn find_markdown_link(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b']' => {
                if bytes.get(idx + 1) == Some(&b'(') {
                    if let Some(close) = find_matching_paren(bytes, idx + 2) {
                        return Some((idx, close));
                    }
                }
                return None;
            },
            _ => idx += 1,
        }
    }
    None
}

fn find_matching_paren(bytes: &[u8], mut pos: usize) -> Option<usize> {
    let mut depth = 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }
    None
}

/// Drop an ATX closing sequence (`## Heading ##`). Only a run of `#`
/// preceded by whitespace counts, so headings like `C#` keep their hash.
fn trim_closing_sequence(text: &str) -> &str {
    let trimmed = text.trim_end();
    let without_hashes = trimmed.trim_end_matches('#');
    if without_hashes.len() < trimmed.len()
        && without_hashes
            .chars()
            .last()
            .is_some_and(char::is_whitespace)
    {
        without_hashes.trim_end()
    } else {
        trimmed
    }
}
