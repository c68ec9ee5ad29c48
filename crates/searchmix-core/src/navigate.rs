//! Traversal of a document's section hierarchy and extended-text retrieval.
//!
//! Snippets are pure data; anything that walks the surrounding structure
//! borrows the resolved [`DocumentRecord`] through a [`Navigator`]. Keyed by
//! section id throughout — pass `snippet.section_id` to navigate from a
//! search hit.

use crate::types::{
    ContentBlock, ContentKind, DocumentRecord, Section, SectionDetails, SectionSummary, Snippet,
};

/// Default extended-text window in bytes.
pub const DEFAULT_TEXT_LENGTH: usize = 5000;

/// Options for range-mode text retrieval.
#[derive(Debug, Clone, Copy)]
pub struct RangeOptions {
    /// Window length in bytes.
    pub length: usize,
    /// Signed displacement from the snippet position.
    pub offset: i64,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_TEXT_LENGTH,
            offset: 0,
        }
    }
}

/// Read-only view over one record's section forest.
pub struct Navigator<'a> {
    record: &'a DocumentRecord,
}

impl<'a> Navigator<'a> {
    #[must_use]
    pub const fn new(record: &'a DocumentRecord) -> Self {
        Self { record }
    }

    /// The section itself.
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&'a Section> {
        self.record.sections_index.get(id)
    }

    /// Owning section, none for roots.
    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&'a Section> {
        self.section(id)?
            .parent_id
            .as_deref()
            .and_then(|pid| self.section(pid))
    }

    /// Children in document order.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&'a Section> {
        self.section(id)
            .map(|s| {
                s.children_ids
                    .iter()
                    .filter_map(|cid| self.section(cid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The i-th child.
    #[must_use]
    pub fn child(&self, id: &str, index: usize) -> Option<&'a Section> {
        self.children(id).into_iter().nth(index)
    }

    /// Content blocks of the section, empty when it has none.
    #[must_use]
    pub fn content(&self, id: &str) -> &'a [ContentBlock] {
        self.section(id).map_or(&[], |s| s.content.as_slice())
    }

    /// Full detail with resolved parent and children summaries.
    #[must_use]
    pub fn details(&self, id: &str) -> Option<SectionDetails> {
        let section = self.section(id)?;
        Some(SectionDetails {
            id: section.id.clone(),
            kind: section.kind,
            text: section.text.clone(),
            depth: section.depth,
            position: section.position,
            content_count: section.content.len(),
            parent: self.parent(id).map(SectionSummary::of),
            children: self
                .children(id)
                .into_iter()
                .map(SectionSummary::of)
                .collect(),
            content: section.content.clone(),
        })
    }

    /// Path from the root down to (and including) the section.
    #[must_use]
    pub fn breadcrumbs(&self, id: &str) -> Vec<&'a Section> {
        let mut chain = Vec::new();
        let mut current = self.section(id);
        while let Some(section) = current {
            chain.push(section);
            current = section
                .parent_id
                .as_deref()
                .and_then(|pid| self.section(pid));
        }
        chain.reverse();
        chain
    }

    /// Breadcrumbs joined by a separator (`" > "` by convention).
    #[must_use]
    pub fn breadcrumbs_text(&self, id: &str, separator: &str) -> String {
        self.breadcrumbs(id)
            .iter()
            .filter(|s| !s.text.is_empty())
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Walk parents until one with the requested depth, none if impossible.
    #[must_use]
    pub fn ancestor_at_depth(&self, id: &str, depth: u8) -> Option<&'a Section> {
        let mut current = self.section(id);
        while let Some(section) = current {
            if section.depth == depth {
                return Some(section);
            }
            if section.depth < depth {
                return None;
            }
            current = section
                .parent_id
                .as_deref()
                .and_then(|pid| self.section(pid));
        }
        None
    }

    /// Children of the parent excluding the section itself; empty for roots.
    #[must_use]
    pub fn siblings(&self, id: &str) -> Vec<&'a Section> {
        match self.parent(id) {
            Some(parent) => self
                .children(&parent.id)
                .into_iter()
                .filter(|s| s.id != id)
                .collect(),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn has_parent(&self, id: &str) -> bool {
        self.parent(id).is_some()
    }

    #[must_use]
    pub fn has_children(&self, id: &str) -> bool {
        !self.children(id).is_empty()
    }

    #[must_use]
    pub fn has_content(&self, id: &str) -> bool {
        !self.content(id).is_empty()
    }
}

/// Extended text for a snippet against its resolved record.
///
/// Dispatches on structure: a snippet backed by a section that owns content
/// renders that section, ignoring any length/offset options; only a snippet
/// without section content falls through to a byte window around its
/// position.
#[must_use]
pub fn extended_text(
    record: &DocumentRecord,
    snippet: &Snippet,
    options: Option<RangeOptions>,
) -> String {
    if let Some(id) = snippet.section_id.as_deref() {
        let nav = Navigator::new(record);
        if nav.has_content(id) {
            if let Some(text) = section_text(record, id) {
                return text;
            }
        }
    }
    range_text(record, snippet.position, options.unwrap_or_default())
}

/// Section mode: the section rendered back as Markdown.
#[must_use]
pub fn section_text(record: &DocumentRecord, section_id: &str) -> Option<String> {
    let section = record.sections_index.get(section_id)?;
    let mut parts: Vec<String> = Vec::with_capacity(section.content.len() + 1);
    if section.kind.is_heading() {
        parts.push(format!(
            "{} {}",
            "#".repeat(usize::from(section.depth)),
            section.text
        ));
    }
    for block in &section.content {
        parts.push(render_block(block));
    }
    Some(parts.join("\n\n"))
}

fn render_block(block: &ContentBlock) -> String {
    match block.kind {
        ContentKind::Code => {
            let lang = block.language.as_deref().unwrap_or("");
            format!("```{lang}\n{}\n```", block.text)
        },
        _ => block.text.clone(),
    }
}

/// Range mode: `body[clamp(p+offset) .. clamp(p+offset+length)]`, byte
/// bounds snapped to char boundaries.
#[must_use]
pub fn range_text(record: &DocumentRecord, position: usize, options: RangeOptions) -> String {
    let body = &record.body;
    let len = body.len() as i64;
    let start = (position as i64 + options.offset).clamp(0, len) as usize;
    let end = (start as i64 + options.length as i64).clamp(0, len) as usize;
    let start = snap_to_boundary(body, start);
    let end = snap_to_boundary(body, end);
    body[start..end].to_string()
}

fn snap_to_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::record_from_markdown;

    fn hierarchy() -> DocumentRecord {
        record_from_markdown("# A\n\n## B\n\n### C\n\nc text\n\n### D\n\n## E\n")
    }

    fn id_of(record: &DocumentRecord, text: &str) -> String {
        record
            .sections_index
            .values()
            .find(|s| s.text == text)
            .map(|s| s.id.clone())
            .unwrap()
    }

    #[test]
    fn parent_children_siblings() {
        let record = hierarchy();
        let nav = Navigator::new(&record);
        let c = id_of(&record, "C");

        assert_eq!(nav.parent(&c).unwrap().text, "B");
        assert!(nav.children(&c).is_empty());
        let siblings = nav.siblings(&c);
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].text, "D");
        assert!(nav.has_parent(&c));
        assert!(!nav.has_children(&c));
        assert!(nav.has_content(&c));
    }

    #[test]
    fn ancestors_and_breadcrumbs() {
        let record = hierarchy();
        let nav = Navigator::new(&record);
        let c = id_of(&record, "C");

        assert_eq!(nav.ancestor_at_depth(&c, 1).unwrap().text, "A");
        assert_eq!(nav.ancestor_at_depth(&c, 2).unwrap().text, "B");
        assert_eq!(nav.ancestor_at_depth(&c, 3).unwrap().text, "C");
        assert!(nav.ancestor_at_depth(&c, 4).is_none());

        let crumbs: Vec<&str> = nav.breadcrumbs(&c).iter().map(|s| s.text.as_str()).collect();
        assert_eq!(crumbs, vec!["A", "B", "C"]);
        assert_eq!(nav.breadcrumbs_text(&c, " > "), "A > B > C");
    }

    #[test]
    fn roots_have_no_siblings() {
        let record = hierarchy();
        let nav = Navigator::new(&record);
        let a = id_of(&record, "A");
        assert!(nav.siblings(&a).is_empty());
        assert!(!nav.has_parent(&a));
    }

    #[test]
    fn child_by_index_preserves_order() {
        let record = hierarchy();
        let nav = Navigator::new(&record);
        let b = id_of(&record, "B");
        assert_eq!(nav.child(&b, 0).unwrap().text, "C");
        assert_eq!(nav.child(&b, 1).unwrap().text, "D");
        assert!(nav.child(&b, 2).is_none());
    }

    #[test]
    fn details_resolve_summaries() {
        let record = hierarchy();
        let nav = Navigator::new(&record);
        let b = id_of(&record, "B");
        let details = nav.details(&b).unwrap();
        assert_eq!(details.text, "B");
        assert_eq!(details.parent.unwrap().text, "A");
        let child_texts: Vec<&str> = details.children.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(child_texts, vec!["C", "D"]);
        assert!(nav.details("s999").is_none());
    }

    #[test]
    fn section_mode_renders_markdown() {
        let record = record_from_markdown("## Guide\n\nfirst para\n\n- a\n- b\n");
        let id = id_of(&record, "Guide");
        let text = section_text(&record, &id).unwrap();
        assert!(text.starts_with("## Guide\n\n"));
        assert!(text.contains("first para"));
        assert!(text.contains("- a"));
    }

    #[test]
    fn section_mode_renders_code_fences() {
        let record = crate::testutil::record_from_markdown_with_code(
            "## Ex\n\n```rust\nlet x = 1;\n```\n",
        );
        let id = id_of(&record, "Ex");
        let text = section_text(&record, &id).unwrap();
        assert!(text.contains("```rust\nlet x = 1;\n```"));
    }

    #[test]
    fn range_mode_clamps_and_offsets() {
        let mut record = record_from_markdown("# T\n\nx\n");
        record.body = "abcdefghij".repeat(100); // 1000 bytes
        let snippet_position = 100;
        let text = range_text(
            &record,
            snippet_position,
            RangeOptions {
                length: 50,
                offset: -20,
            },
        );
        assert_eq!(text, record.body[80..130].to_string());

        let clamped = range_text(
            &record,
            990,
            RangeOptions {
                length: 50,
                offset: 0,
            },
        );
        assert_eq!(clamped.len(), 10);
    }

    #[test]
    fn range_mode_respects_char_boundaries() {
        let mut record = record_from_markdown("# T\n\nx\n");
        record.body = "é".repeat(10);
        let text = range_text(
            &record,
            1,
            RangeOptions {
                length: 3,
                offset: 0,
            },
        );
        // Bounds snapped down to char boundaries; no panic, valid UTF-8.
        assert!(text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn extended_text_uses_section_mode_whenever_content_exists() {
        let record = record_from_markdown("## Guide\n\nbody of the guide\n");
        let id = id_of(&record, "Guide");
        let snippet = crate::extract::extract(&record, 1.0, "guide", 100, 5)
            .into_iter()
            .find(|s| s.section_id.as_deref() == Some(id.as_str()))
            .unwrap();

        let text = extended_text(&record, &snippet, None);
        assert!(text.starts_with("## Guide"));

        // Length/offset are ignored while the section owns content.
        let with_options = extended_text(
            &record,
            &snippet,
            Some(RangeOptions {
                length: 8,
                offset: 0,
            }),
        );
        assert_eq!(with_options, text);
    }

    #[test]
    fn extended_text_falls_back_to_range_without_content() {
        let record = record_from_markdown("# T\n\nplain body words\n");
        let snippet = crate::types::Snippet {
            text: String::new(),
            section_type: crate::field::FieldKind::Body,
            position: 5,
            document_path: record.path.clone(),
            document_title: record.title.clone(),
            tags: Vec::new(),
            rank: 0.0,
            section_id: None,
            parent_id: None,
            children_ids: Vec::new(),
            content_count: 0,
            heading: None,
        };
        let ranged = extended_text(
            &record,
            &snippet,
            Some(RangeOptions {
                length: 5,
                offset: 0,
            }),
        );
        assert_eq!(ranged, record.body[5..10].to_string());
    }
}
