//! Core value types: sections, content blocks, document records, snippets.
//!
//! Sections reference each other by id only; the tree is reconstructed on
//! demand from the section map, so nothing here is cyclic and everything
//! serializes cleanly into the persisted blobs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::field::FieldKind;

/// A byte range within the raw document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// Kind of a content block inside a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Paragraph,
    List,
    Code,
    Quote,
    Table,
}

/// A block of content owned by a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
    pub position: Span,
    /// Info-string language tag, code blocks only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
}

/// A node of the document's heading hierarchy.
///
/// `kind == FieldKind::Body` marks the synthetic root that owns content
/// appearing before the first heading; it has depth 0 and empty text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub depth: u8,
    pub text: String,
    /// Range of the heading syntax itself within the raw document.
    pub position: Span,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,
    pub children_ids: Vec<String>,
    pub content: Vec<ContentBlock>,
}

/// Lightweight identification of a section, used wherever embedding the full
/// node would drag its content along.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub text: String,
    pub depth: u8,
}

impl SectionSummary {
    #[must_use]
    pub fn of(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            kind: section.kind,
            text: section.text.clone(),
            depth: section.depth,
        }
    }
}

/// Full section detail with resolved parent and children summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDetails {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub text: String,
    pub depth: u8,
    pub position: Span,
    pub content_count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<SectionSummary>,
    pub children: Vec<SectionSummary>,
    pub content: Vec<ContentBlock>,
}

/// Normalized projections of the searchable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedFields {
    pub title: String,
    pub h1: String,
    pub h2: String,
    pub h3: String,
    pub h4: String,
    pub h5: String,
    pub h6: String,
    pub body: String,
}

/// One stored document: field projections, the section forest, tags, and the
/// source's modification time when it came from the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable identity: absolute filesystem path or a `buffer://` id.
    pub path: String,
    /// First h1 of the document.
    pub title: String,
    pub h1: String,
    pub h2: String,
    pub h3: String,
    pub h4: String,
    pub h5: String,
    pub h6: String,
    /// The full original Markdown text, byte-for-byte.
    pub body: String,
    pub normalized: NormalizedFields,
    /// Visible tag list: manually supplied tags plus the detected language.
    pub tags: Vec<String>,
    /// Detected language code, also present in `tags`. Kept separate so tag
    /// filtering can tell user tags apart from the automatic one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
    /// Ids of root sections in document order.
    pub structure: Vec<String>,
    /// Section id to section node.
    pub sections_index: HashMap<String, Section>,
    /// Source modification time in milliseconds, filesystem inputs only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mtime: Option<i64>,
}

impl DocumentRecord {
    /// Raw text of a field.
    #[must_use]
    pub fn field_raw(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Title => &self.title,
            FieldKind::H1 => &self.h1,
            FieldKind::H2 => &self.h2,
            FieldKind::H3 => &self.h3,
            FieldKind::H4 => &self.h4,
            FieldKind::H5 => &self.h5,
            FieldKind::H6 => &self.h6,
            FieldKind::Body => &self.body,
        }
    }

    /// Normalized text of a field.
    #[must_use]
    pub fn field_norm(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Title => &self.normalized.title,
            FieldKind::H1 => &self.normalized.h1,
            FieldKind::H2 => &self.normalized.h2,
            FieldKind::H3 => &self.normalized.h3,
            FieldKind::H4 => &self.normalized.h4,
            FieldKind::H5 => &self.normalized.h5,
            FieldKind::H6 => &self.normalized.h6,
            FieldKind::Body => &self.normalized.body,
        }
    }

    /// Sections in document order.
    ///
    /// Ids are assigned monotonically during parsing (`s0`, `s1`, ...), so
    /// document order is recovered by sorting on the numeric suffix.
    #[must_use]
    pub fn sections_in_order(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections_index.values().collect();
        sections.sort_by_key(|s| section_ordinal(&s.id));
        sections
    }
}

/// Numeric suffix of a section id, for document ordering.
#[must_use]
pub fn section_ordinal(id: &str) -> usize {
    id.trim_start_matches('s').parse().unwrap_or(usize::MAX)
}

/// Heading identification attached to a snippet whose match landed in (or
/// was attributed to) a heading section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetHeading {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub text: String,
    pub depth: u8,
}

/// One match occurrence with its context window and owning section.
///
/// Pure data: traversal of the surrounding hierarchy goes through
/// [`crate::navigate::Navigator`] with the record resolved explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    /// Context window around the match, or the matched heading line.
    pub text: String,
    /// Field the match was found in.
    pub section_type: FieldKind,
    /// Byte offset of the match in the raw document (body/title matches) or
    /// in the raw heading projection (heading matches).
    pub position: usize,
    pub document_path: String,
    pub document_title: String,
    pub tags: Vec<String>,
    /// Relevance rank of the owning document: ascending weighted BM25,
    /// lower is better.
    pub rank: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,
    pub children_ids: Vec<String>,
    pub content_count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub heading: Option<SnippetHeading>,
}

/// Index-wide statistics, optionally scoped to one tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub documents: usize,
    pub body_bytes: u64,
    pub sections: usize,
    /// Document count per tag.
    pub tags: std::collections::BTreeMap<String, usize>,
}
