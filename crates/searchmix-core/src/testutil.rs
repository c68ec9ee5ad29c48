//! Test-only helpers shared by unit tests across modules.

use crate::engine::assemble_record;
use crate::parser::MarkdownParser;
use crate::types::DocumentRecord;

pub(crate) fn record_from_markdown(markdown: &str) -> DocumentRecord {
    build(markdown, false)
}

pub(crate) fn record_from_markdown_with_code(markdown: &str) -> DocumentRecord {
    build(markdown, true)
}

fn build(markdown: &str, include_code_blocks: bool) -> DocumentRecord {
    let parsed = MarkdownParser::new()
        .expect("grammar loads")
        .parse(markdown, include_code_blocks)
        .expect("markdown parses");
    assemble_record("/doc.md", markdown, parsed, vec!["docs".into()], None)
}
