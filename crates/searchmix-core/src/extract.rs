//! Locates query-term occurrences inside a matched document and turns each
//! into a [`Snippet`] attributed to the owning section.
//!
//! Works from the ORIGINAL query, not the rewritten one: heading matching
//! re-splits projections on lines and needs the raw term list. All scanning
//! happens on the normalized fields; every hit offset travels back through
//! the char alignment in [`crate::normalize`] before raw text is sliced, so
//! accented originals come out intact.

use regex::Regex;

use crate::field::{FieldKind, FIELD_ORDER};
use crate::normalize::{advance_chars, align_offset, retreat_chars};
use crate::query::{derive_terms, QueryTerm};
use crate::types::{DocumentRecord, Section, Snippet, SnippetHeading};

/// Default context window width in characters.
pub const DEFAULT_SNIPPET_LENGTH: usize = 100;
/// Default per-document snippet cap.
pub const DEFAULT_SNIPPETS_PER_DOC: usize = 5;

static ELLIPSIS: &str = "…";

/// Extract up to `max_snippets` snippets for one matched record.
///
/// Fields are visited in the fixed order title, h1..h6, body; iteration
/// within a field is left-to-right, terms tie-break in query order. When no
/// term occurrence is found anywhere, one fallback snippet is produced from
/// the head of the document.
#[must_use]
pub fn extract(
    record: &DocumentRecord,
    rank: f32,
    query: &str,
    snippet_length: usize,
    max_snippets: usize,
) -> Vec<Snippet> {
    let terms = derive_terms(query);
    let matchers = build_matchers(&terms);
    let mut snippets = Vec::new();

    if !matchers.is_empty() {
        for kind in FIELD_ORDER {
            if snippets.len() >= max_snippets {
                break;
            }
            match kind {
                FieldKind::Title => scan_title(
                    record,
                    rank,
                    &matchers,
                    snippet_length,
                    max_snippets,
                    &mut snippets,
                ),
                FieldKind::Body => scan_body(
                    record,
                    rank,
                    &matchers,
                    snippet_length,
                    max_snippets,
                    &mut snippets,
                ),
                heading => scan_heading_field(
                    record,
                    heading,
                    rank,
                    &matchers,
                    max_snippets,
                    &mut snippets,
                ),
            }
        }
    }

    if snippets.is_empty() {
        snippets.push(fallback_snippet(record, rank, snippet_length));
    }
    snippets
}

struct TermMatcher {
    regex: Regex,
}

/// Compile one boundary regex per term: `\bterm\b` for exact terms,
/// left-boundary `\bterm` for prefix terms.
fn build_matchers(terms: &[QueryTerm]) -> Vec<TermMatcher> {
    terms
        .iter()
        .filter_map(|term| {
            let escaped = regex::escape(&term.text);
            let pattern = if term.prefix {
                format!(r"\b{escaped}")
            } else {
                format!(r"\b{escaped}\b")
            };
            Regex::new(&pattern).ok().map(|regex| TermMatcher { regex })
        })
        .collect()
}

/// Heading fields: match whole projection lines and attach the section whose
/// level and text agree with the matched line.
fn scan_heading_field(
    record: &DocumentRecord,
    kind: FieldKind,
    rank: f32,
    matchers: &[TermMatcher],
    max_snippets: usize,
    out: &mut Vec<Snippet>,
) {
    let raw = record.field_raw(kind);
    if raw.is_empty() {
        return;
    }
    let norm = record.field_norm(kind);
    let raw_lines: Vec<(usize, &str)> = lines_with_offsets(raw);
    let norm_lines: Vec<(usize, &str)> = lines_with_offsets(norm);

    // (line offset, term index, line index): position-major, term order
    // breaking ties.
    let mut matches: Vec<(usize, usize, usize)> = Vec::new();
    for (term_idx, matcher) in matchers.iter().enumerate() {
        for (line_idx, (offset, _)) in raw_lines.iter().enumerate() {
            let Some((_, norm_line)) = norm_lines.get(line_idx) else {
                continue;
            };
            if matcher.regex.is_match(norm_line) {
                matches.push((*offset, term_idx, line_idx));
            }
        }
    }
    matches.sort_by_key(|&(offset, term_idx, _)| (offset, term_idx));

    let mut emitted_lines = Vec::new();
    for (offset, _, line_idx) in matches {
        if out.len() >= max_snippets {
            return;
        }
        if emitted_lines.contains(&line_idx) {
            continue;
        }
        emitted_lines.push(line_idx);
        let raw_line = raw_lines[line_idx].1;
        let section = record
            .sections_in_order()
            .into_iter()
            .find(|s| s.kind == kind && s.text == raw_line);
        out.push(make_snippet(
            record,
            rank,
            raw_line.to_string(),
            kind,
            offset,
            section,
        ));
    }
}

/// All term occurrences in a field as raw byte offsets, left-to-right, the
/// earliest term in the list winning a shared position.
fn collect_occurrences(raw: &str, norm: &str, matchers: &[TermMatcher]) -> Vec<usize> {
    let mut matches: Vec<(usize, usize)> = Vec::new();
    for (term_idx, matcher) in matchers.iter().enumerate() {
        for m in matcher.regex.find_iter(norm) {
            matches.push((align_offset(norm, raw, m.start()), term_idx));
        }
    }
    matches.sort_by_key(|&(pos, term_idx)| (pos, term_idx));
    matches.dedup_by_key(|entry| entry.0);
    matches.into_iter().map(|(pos, _)| pos).collect()
}

/// The title projection: scanned like body text but attributed to the first
/// h1 (the title IS its text).
fn scan_title(
    record: &DocumentRecord,
    rank: f32,
    matchers: &[TermMatcher],
    snippet_length: usize,
    max_snippets: usize,
    out: &mut Vec<Snippet>,
) {
    let raw = record.field_raw(FieldKind::Title);
    if raw.is_empty() {
        return;
    }
    let norm = record.field_norm(FieldKind::Title);

    for raw_pos in collect_occurrences(raw, norm, matchers) {
        if out.len() >= max_snippets {
            return;
        }
        let text = window(raw, raw_pos, snippet_length);
        let section = record
            .sections_in_order()
            .into_iter()
            .find(|s| s.kind == FieldKind::H1 && s.text == raw);
        out.push(make_snippet(
            record,
            rank,
            text,
            FieldKind::Title,
            raw_pos,
            section,
        ));
    }
}

/// The body field: context windows around each occurrence, attributed to the
/// content block containing the offset, else the nearest preceding section.
fn scan_body(
    record: &DocumentRecord,
    rank: f32,
    matchers: &[TermMatcher],
    snippet_length: usize,
    max_snippets: usize,
    out: &mut Vec<Snippet>,
) {
    let raw = record.field_raw(FieldKind::Body);
    if raw.is_empty() {
        return;
    }
    let norm = record.field_norm(FieldKind::Body);

    for raw_pos in collect_occurrences(raw, norm, matchers) {
        if out.len() >= max_snippets {
            return;
        }
        let text = window(raw, raw_pos, snippet_length);
        let section = attribute_body_offset(record, raw_pos);
        out.push(make_snippet(
            record,
            rank,
            text,
            FieldKind::Body,
            raw_pos,
            section,
        ));
    }
}

/// Owning section for a body offset: a section whose content block contains
/// the offset wins; otherwise the section with the greatest start at or
/// before it.
fn attribute_body_offset(record: &DocumentRecord, offset: usize) -> Option<&Section> {
    let sections = record.sections_in_order();
    for section in &sections {
        if section
            .content
            .iter()
            .any(|block| block.position.contains(offset))
        {
            return Some(section);
        }
    }
    sections
        .into_iter()
        .filter(|s| s.position.start <= offset)
        .max_by_key(|s| s.position.start)
}

/// Context window of `length` chars centered on the match, trimmed, with
/// ellipses marking truncation.
fn window(raw: &str, match_byte: usize, length: usize) -> String {
    let start = retreat_chars(raw, match_byte, length / 2);
    let end = advance_chars(raw, start, length);
    let mut text = raw[start..end].trim().to_string();
    if start > 0 {
        text.insert_str(0, ELLIPSIS);
    }
    if end < raw.len() {
        text.push_str(ELLIPSIS);
    }
    text
}

fn fallback_snippet(record: &DocumentRecord, rank: f32, snippet_length: usize) -> Snippet {
    let (source, kind) = if record.body.is_empty() {
        (record.title.as_str(), FieldKind::Title)
    } else {
        (record.body.as_str(), FieldKind::Body)
    };
    let end = advance_chars(source, 0, snippet_length);
    let mut text = source[..end].trim().to_string();
    if end < source.len() {
        text.push_str(ELLIPSIS);
    }
    let section = record
        .structure
        .first()
        .and_then(|id| record.sections_index.get(id));
    make_snippet(record, rank, text, kind, 0, section)
}

fn make_snippet(
    record: &DocumentRecord,
    rank: f32,
    text: String,
    section_type: FieldKind,
    position: usize,
    section: Option<&Section>,
) -> Snippet {
    let heading = section.filter(|s| s.kind.is_heading()).map(|s| SnippetHeading {
        id: s.id.clone(),
        kind: s.kind,
        text: s.text.clone(),
        depth: s.depth,
    });
    Snippet {
        text,
        section_type,
        position,
        document_path: record.path.clone(),
        document_title: record.title.clone(),
        tags: record.tags.clone(),
        rank,
        section_id: section.map(|s| s.id.clone()),
        parent_id: section.and_then(|s| s.parent_id.clone()),
        children_ids: section.map(|s| s.children_ids.clone()).unwrap_or_default(),
        content_count: section.map(|s| s.content.len()).unwrap_or_default(),
        heading,
    }
}

/// Split on newlines, keeping the byte offset of each line start.
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        lines.push((offset, line));
        offset += line.len() + 1;
    }
    lines
}
