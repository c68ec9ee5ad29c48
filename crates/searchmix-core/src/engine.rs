//! The public facade tying converters, parser, store, and extractor
//! together.
//!
//! `add` is the only asynchronous operation (its converter and filesystem
//! reads are the engine's only suspension points); queries and navigation
//! are synchronous. Per-file failures during a directory add are logged and
//! counted, never fatal to the batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use globset::Glob;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::convert::ConverterRegistry;
use crate::error::{Error, Result};
use crate::extract;
use crate::index::SearchIndex;
use crate::navigate::{self, Navigator, RangeOptions};
use crate::normalize::{fold, fold_masked};
use crate::parser::{MarkdownParser, ParsedDocument};
use crate::query;
use crate::scan::{scan, ScanOptions};
use crate::types::{DocumentRecord, NormalizedFields, SectionDetails, Snippet, Stats};

/// URI-style prefix reserving the in-memory document namespace.
pub const BUFFER_SCHEME: &str = "buffer://";

/// Filesystem timestamp quantization tolerance for the modified check.
const MTIME_TOLERANCE_MS: i64 = 1000;

/// Input to [`SearchMix::add`]: a file, a directory, or raw bytes.
pub enum AddInput {
    /// A file or directory on disk.
    Path(PathBuf),
    /// An in-memory document; `format` is an extension-style format name.
    Buffer { content: Vec<u8>, format: String },
}

impl AddInput {
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// An in-memory Markdown document.
    #[must_use]
    pub fn buffer(content: impl Into<Vec<u8>>) -> Self {
        Self::Buffer {
            content: content.into(),
            format: "md".into(),
        }
    }

    #[must_use]
    pub fn buffer_with_format(content: impl Into<Vec<u8>>, format: impl Into<String>) -> Self {
        Self::Buffer {
            content: content.into(),
            format: format.into(),
        }
    }
}

/// Options for [`SearchMix::add`].
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Tags attached to every document of this call.
    pub tags: Vec<String>,
    /// Exclusion globs for directory scans.
    pub exclude: Vec<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Leave already-indexed paths alone (unless modified, see below).
    pub skip_existing: bool,
    /// Force re-indexing of existing paths.
    pub update: bool,
    /// Re-index an existing path when the file's mtime moved by more than
    /// one second from the stored value.
    pub check_modified: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            exclude: vec!["node_modules".into(), ".git".into()],
            recursive: true,
            skip_existing: true,
            update: false,
            check_modified: true,
        }
    }
}

impl AddOptions {
    #[must_use]
    pub fn with_tags(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Outcome of one `add` call.
#[derive(Debug, Clone, Default)]
pub struct AddReport {
    /// Paths indexed or re-indexed.
    pub indexed: Vec<String>,
    /// Files left alone (already indexed and unchanged).
    pub skipped: usize,
    /// Files that failed conversion or parsing and were passed over.
    pub failed: usize,
}

/// Options for [`SearchMix::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Keep only documents with rank at or below this; ranks ascend, so a
    /// lower rank is a better match.
    pub min_score: Option<f32>,
    /// Tag restriction; untagged documents always pass.
    pub tags: Vec<String>,
    /// Extract per-occurrence snippets (otherwise one headline per hit).
    pub snippets: bool,
    pub snippet_length: usize,
    pub snippets_per_doc: usize,
    /// Also count all matching records before the limit.
    pub count: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: None,
            tags: Vec::new(),
            snippets: true,
            snippet_length: extract::DEFAULT_SNIPPET_LENGTH,
            snippets_per_doc: extract::DEFAULT_SNIPPETS_PER_DOC,
            count: false,
        }
    }
}

/// Result of a search.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub results: Vec<Snippet>,
    /// Total matching records, when requested.
    pub total_count: Option<usize>,
    pub total_snippets: usize,
}

/// Options for [`SearchMix::get`].
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// When set, the returned body is the window starting here.
    pub position: Option<usize>,
    pub length: usize,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            position: None,
            length: navigate::DEFAULT_TEXT_LENGTH,
        }
    }
}

/// The embedded search engine.
pub struct SearchMix {
    config: Config,
    index: SearchIndex,
    converters: ConverterRegistry,
    parser: Mutex<MarkdownParser>,
    buffer_seq: AtomicU64,
}

enum FileOutcome {
    Indexed(String),
    Skipped,
}

impl SearchMix {
    /// Open an engine over the configured index directory.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let index = SearchIndex::open(&config.db_path, config.weights.clone())?;
        let parser = MarkdownParser::new()?;
        Ok(Self {
            config,
            index,
            converters: ConverterRegistry::with_builtins(),
            parser: Mutex::new(parser),
            buffer_seq: AtomicU64::new(0),
        })
    }

    /// Register external converters (EPUB, PDF, ...).
    pub fn converters_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    /// Index a file, a directory tree, or an in-memory buffer.
    pub async fn add(&self, input: AddInput, options: AddOptions) -> Result<AddReport> {
        match input {
            AddInput::Buffer { content, format } => {
                let path = self.fresh_buffer_path();
                let markdown = self.converters.convert(&format, &content)?;
                self.index_markdown(&path, markdown, None, &options.tags)?;
                Ok(AddReport {
                    indexed: vec![path],
                    ..AddReport::default()
                })
            },
            AddInput::Path(path) => {
                if !path.exists() {
                    return Err(Error::InputNotFound(path));
                }
                let path = path.canonicalize()?;
                if path.is_dir() {
                    self.add_directory(&path, &options).await
                } else {
                    let mut report = AddReport::default();
                    match self.add_file(&path, &options).await? {
                        FileOutcome::Indexed(p) => report.indexed.push(p),
                        FileOutcome::Skipped => report.skipped += 1,
                    }
                    Ok(report)
                }
            },
        }
    }

    async fn add_directory(&self, dir: &Path, options: &AddOptions) -> Result<AddReport> {
        let scan_options = ScanOptions {
            exclude: options.exclude.clone(),
            recursive: options.recursive,
        };
        let candidates = scan(dir, &scan_options, |ext| self.converters.supports(ext))?;
        info!(dir = %dir.display(), candidates = candidates.len(), "scanning directory");

        let mut report = AddReport::default();
        for file in candidates {
            match self.add_file(&file, options).await {
                Ok(FileOutcome::Indexed(path)) => report.indexed.push(path),
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "skipping file");
                    report.failed += 1;
                },
            }
        }
        info!(
            indexed = report.indexed.len(),
            skipped = report.skipped,
            failed = report.failed,
            "directory add finished"
        );
        Ok(report)
    }

    async fn add_file(&self, file: &Path, options: &AddOptions) -> Result<FileOutcome> {
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !self.converters.supports(&extension) {
            return Err(Error::UnsupportedFormat(extension));
        }

        let path_key = file.to_string_lossy().into_owned();
        let current_mtime = file_mtime_millis(file)?;

        if self.index.has(&path_key)? {
            let reindex = if options.update || !options.skip_existing {
                true
            } else if options.check_modified {
                match self.index.mtime(&path_key)? {
                    Some(stored) => (current_mtime - stored).abs() > MTIME_TOLERANCE_MS,
                    None => true,
                }
            } else {
                false
            };
            if !reindex {
                debug!(path = %path_key, "unchanged, skipping");
                return Ok(FileOutcome::Skipped);
            }
        }

        let bytes = tokio::fs::read(file).await?;
        let markdown = self
            .converters
            .convert(&extension, &bytes)
            .map_err(|e| match e {
                Error::UnsupportedFormat(ext) => Error::UnsupportedFormat(ext),
                other => Error::Converter {
                    path: path_key.clone(),
                    reason: other.to_string(),
                },
            })?;

        self.index_markdown(&path_key, markdown, Some(current_mtime), &options.tags)?;
        Ok(FileOutcome::Indexed(path_key))
    }

    fn index_markdown(
        &self,
        path: &str,
        markdown: String,
        mtime: Option<i64>,
        tags: &[String],
    ) -> Result<()> {
        let parsed = self
            .parser
            .lock()
            .map_err(|_| Error::Parse("markdown parser poisoned".into()))?
            .parse(&markdown, self.config.include_code_blocks)?;

        let mut tags: Vec<String> = tags.to_vec();
        let language = detect_language(&markdown).filter(|lang| !tags.contains(lang));
        if let Some(lang) = &language {
            tags.push(lang.clone());
        }

        let mut record = assemble_record(path, &markdown, parsed, tags, mtime);
        record.language = language;
        self.index.upsert(&record)
    }

    /// Ranked search with snippet extraction.
    pub fn search(&self, query_text: &str, options: SearchOptions) -> Result<SearchResponse> {
        let rewritten = query::rewrite(query_text);
        if rewritten.trim().is_empty() {
            return Ok(SearchResponse {
                total_count: options.count.then_some(0),
                ..SearchResponse::default()
            });
        }

        let (mut hits, total_count) = self.index.query(
            &rewritten,
            query_text,
            options.limit,
            &options.tags,
            options.count,
        )?;
        if let Some(min_score) = options.min_score {
            hits.retain(|(rank, _)| *rank <= min_score);
        }

        let mut results = Vec::new();
        for (rank, record) in &hits {
            let effective_query = if options.snippets { query_text } else { "" };
            results.extend(extract::extract(
                record,
                *rank,
                effective_query,
                options.snippet_length,
                options.snippets_per_doc.max(1),
            ));
        }

        Ok(SearchResponse {
            total_snippets: results.len(),
            results,
            total_count,
        })
    }

    /// Fetch a stored record, optionally windowing the body.
    pub fn get(&self, path: &str, options: GetOptions) -> Result<Option<DocumentRecord>> {
        let Some(mut record) = self.index.get(path)? else {
            return Ok(None);
        };
        if let Some(position) = options.position {
            record.body = navigate::range_text(
                &record,
                position,
                RangeOptions {
                    length: options.length,
                    offset: 0,
                },
            );
            record.normalized.body = fold(&record.body);
        }
        Ok(Some(record))
    }

    /// All records whose path matches the glob pattern.
    pub fn get_multiple(&self, pattern: &str) -> Result<Vec<DocumentRecord>> {
        let matcher = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{pattern}': {e}")))?
            .compile_matcher();
        Ok(self
            .index
            .all_records()?
            .into_iter()
            .filter(|record| matcher.is_match(&record.path))
            .collect())
    }

    /// Section detail lookup; unknown ids resolve to `None`, never an error.
    pub fn get_heading_by_id(
        &self,
        document_path: &str,
        heading_id: &str,
    ) -> Result<Option<SectionDetails>> {
        let Some(record) = self.index.get(document_path)? else {
            return Ok(None);
        };
        Ok(Navigator::new(&record).details(heading_id))
    }

    /// Extended text for a snippet; falls back to the snippet's own text
    /// when its document is gone.
    pub fn get_text(&self, snippet: &Snippet, options: Option<RangeOptions>) -> Result<String> {
        match self.index.get(&snippet.document_path)? {
            Some(record) => Ok(navigate::extended_text(&record, snippet, options)),
            None => Ok(snippet.text.clone()),
        }
    }

    pub fn has_document(&self, path: &str) -> Result<bool> {
        self.index.has(path)
    }

    /// Remove one document. Returns whether it existed.
    pub fn remove_document(&self, path: &str) -> Result<bool> {
        self.index.remove(path)
    }

    /// Remove all documents carrying a tag. Returns the count removed.
    pub fn remove_by_tag(&self, tag: &str) -> Result<usize> {
        self.index.remove_by_tag(tag)
    }

    /// Drop every document.
    pub fn clear(&self) -> Result<()> {
        self.index.clear()
    }

    /// Flush pending writes. The engine stays usable afterwards.
    pub fn close(&self) -> Result<()> {
        self.index.close()
    }

    pub fn get_stats(&self, tag: Option<&str>) -> Result<Stats> {
        self.index.stats(tag)
    }

    fn fresh_buffer_path(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.buffer_seq.fetch_add(1, Ordering::Relaxed);
        format!("{BUFFER_SCHEME}{millis:x}-{seq}")
    }
}

/// Assemble a storable record from a parsed document.
///
/// Normalized fields are folded char-for-char from their raw counterparts;
/// the body additionally masks excluded code-block ranges so they never
/// match a query while raw offsets stay valid.
pub(crate) fn assemble_record(
    path: &str,
    markdown: &str,
    parsed: ParsedDocument,
    tags: Vec<String>,
    mtime: Option<i64>,
) -> DocumentRecord {
    let [h1, h2, h3, h4, h5, h6] = parsed.levels;
    let normalized = NormalizedFields {
        title: fold(&parsed.title),
        h1: fold(&h1),
        h2: fold(&h2),
        h3: fold(&h3),
        h4: fold(&h4),
        h5: fold(&h5),
        h6: fold(&h6),
        body: fold_masked(markdown, &parsed.masked_ranges),
    };
    DocumentRecord {
        path: path.to_string(),
        title: parsed.title,
        h1,
        h2,
        h3,
        h4,
        h5,
        h6,
        body: markdown.to_string(),
        normalized,
        tags,
        language: None,
        structure: parsed.structure,
        sections_index: parsed.sections_index,
        mtime,
    }
}

/// Reliable language detection, ISO 639-3 code.
fn detect_language(text: &str) -> Option<String> {
    whatlang::detect(text)
        .filter(whatlang::Info::is_reliable)
        .map(|info| info.lang().code().to_string())
}

fn file_mtime_millis(path: &Path) -> Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    Ok(i64::try_from(millis).unwrap_or(i64::MAX))
}
