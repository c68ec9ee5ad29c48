//! Argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "searchmix",
    about = "Full-text search over Markdown document trees with section-aware snippets",
    version
)]
pub struct Cli {
    /// Index directory.
    #[arg(long, global = true, default_value = "./db/searchmix.db")]
    pub db: PathBuf,

    /// Make code blocks searchable.
    #[arg(long, global = true)]
    pub include_code_blocks: bool,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index a file or directory.
    Add {
        /// File or directory to index.
        path: PathBuf,
        /// Tags attached to every indexed document (repeatable).
        #[arg(short, long)]
        tags: Vec<String>,
        /// Exclusion globs for directory scans (repeatable).
        #[arg(long, default_values_t = ["node_modules".to_string(), ".git".to_string()])]
        exclude: Vec<String>,
        /// Do not descend into subdirectories.
        #[arg(long)]
        no_recursive: bool,
        /// Re-index documents that are already present.
        #[arg(short, long)]
        update: bool,
        /// Skip the modification-time check for existing documents.
        #[arg(long)]
        no_check_modified: bool,
    },

    /// Search the index.
    Search {
        /// Query in the public query language.
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Restrict to these tags (untagged documents always match).
        #[arg(short, long)]
        tags: Vec<String>,
        /// Keep only documents with rank at or below this (lower is better).
        #[arg(long)]
        min_score: Option<f32>,
        /// Context window width in characters.
        #[arg(long, default_value_t = searchmix_core::DEFAULT_SNIPPET_LENGTH)]
        snippet_length: usize,
        /// Snippets per matching document.
        #[arg(long, default_value_t = searchmix_core::DEFAULT_SNIPPETS_PER_DOC)]
        per_doc: usize,
        /// One headline per document instead of per-occurrence snippets.
        #[arg(long)]
        no_snippets: bool,
        /// Also report the total match count.
        #[arg(short, long)]
        count: bool,
        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a stored document.
    Get {
        path: String,
        /// Byte position to window the body from.
        #[arg(long)]
        position: Option<usize>,
        /// Window length in bytes.
        #[arg(long, default_value_t = searchmix_core::DEFAULT_TEXT_LENGTH)]
        length: usize,
        #[arg(long)]
        json: bool,
    },

    /// Look up one heading section by id.
    Heading {
        path: String,
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Remove one document by path.
    Remove { path: String },

    /// Remove every document carrying a tag.
    RemoveTag { tag: String },

    /// Remove all documents.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Index statistics.
    Stats {
        /// Scope to one tag.
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(long)]
        json: bool,
    },
}
