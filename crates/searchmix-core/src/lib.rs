//! Embedded full-text search over structured text documents.
//!
//! searchmix indexes Markdown (and anything a converter can turn into
//! Markdown), extracts each document's heading hierarchy, and answers
//! ranked queries with in-context match snippets that can be navigated
//! through the document's section tree.
//!
//! ```no_run
//! use searchmix_core::{AddInput, AddOptions, Config, SearchMix, SearchOptions};
//!
//! # async fn run() -> searchmix_core::Result<()> {
//! let mix = SearchMix::new(Config::default())?;
//! mix.add(AddInput::path("./docs"), AddOptions::with_tags(["guides"]))
//!     .await?;
//!
//! let response = mix.search("title:configuración OR setup*", SearchOptions::default())?;
//! for snippet in &response.results {
//!     println!("{} [{}]", snippet.text, snippet.document_path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod extract;
pub mod field;
pub mod index;
pub mod navigate;
pub mod normalize;
pub mod parser;
pub mod query;
pub mod scan;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::{Config, Weights};
pub use convert::{Converter, ConverterRegistry, KNOWN_EXTENSIONS};
pub use engine::{
    AddInput, AddOptions, AddReport, GetOptions, SearchMix, SearchOptions, SearchResponse,
    BUFFER_SCHEME,
};
pub use error::{Error, Result};
pub use extract::{DEFAULT_SNIPPETS_PER_DOC, DEFAULT_SNIPPET_LENGTH};
pub use field::FieldKind;
pub use navigate::{Navigator, RangeOptions, DEFAULT_TEXT_LENGTH};
pub use parser::{MarkdownParser, ParsedDocument};
pub use types::{
    ContentBlock, ContentKind, DocumentRecord, Section, SectionDetails, SectionSummary, Snippet,
    SnippetHeading, Span, Stats,
};
