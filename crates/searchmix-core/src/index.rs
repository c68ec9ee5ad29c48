//! Persistent full-text storage and BM25 ranking on Tantivy.
//!
//! One Tantivy document per stored record. Raw field projections are
//! stored-only; their normalized counterparts are indexed with positions and
//! carry per-field boosts, so ranking is weighted BM25 across columns. The
//! section forest travels as stored JSON blobs. Document identity is the
//! `path` column: re-indexing deletes the old term and inserts the new
//! record inside a single writer commit.
//!
//! Tag filtering is part of the boolean query: every tag is indexed as a raw
//! term, untagged documents get a sentinel term, and a filter for tags `T`
//! matches `tag ∈ T OR tag = sentinel` — untagged documents are global.

use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use crate::config::Weights;
use crate::error::{Error, Result};
use crate::field::{FieldKind, FIELD_ORDER};
use crate::types::{DocumentRecord, NormalizedFields, Stats};

/// Term stored on documents with no user-supplied tags, so that tag filters
/// can keep untagged documents visible. The automatically detected language
/// tag does not count: a document nobody tagged stays global.
const UNTAGGED: &str = "__untagged__";

const WRITER_HEAP_BYTES: usize = 50_000_000;

struct SchemaFields {
    raw: [Field; 8],
    normalized: [Field; 8],
    path: Field,
    tag: Field,
    collection: Field,
    language: Field,
    structure: Field,
    sections: Field,
    mtime: Field,
}

/// The persistent document store and ranker.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: SchemaFields,
    weights: Weights,
}

impl SearchIndex {
    /// Open (or create) the index under `dir`.
    pub fn open(dir: &Path, weights: Weights) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("failed to create index directory: {e}")))?;

        let schema = build_schema();
        let directory = MmapDirectory::open(dir)
            .map_err(|e| Error::Storage(format!("failed to open index directory: {e}")))?;
        let index = Index::open_or_create(directory, schema.clone())
            .map_err(|e| Error::Storage(format!("failed to open index: {e}")))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Index(e.to_string()))?;
        let writer = index.writer(WRITER_HEAP_BYTES)?;

        let fields = resolve_fields(&schema)?;
        debug!(path = %dir.display(), "opened search index");

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
            weights,
        })
    }

    /// Insert a record, replacing any previous record with the same path.
    pub fn upsert(&self, record: &DocumentRecord) -> Result<()> {
        let doc = self.record_to_doc(record)?;
        let mut writer = self.lock_writer()?;
        writer.delete_term(Term::from_field_text(self.fields.path, &record.path));
        writer.add_document(doc)?;
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        debug!(path = %record.path, sections = record.sections_index.len(), "indexed document");
        Ok(())
    }

    /// Remove the record with the given path. Returns whether one existed.
    pub fn remove(&self, path: &str) -> Result<bool> {
        if !self.has(path)? {
            return Ok(false);
        }
        let mut writer = self.lock_writer()?;
        writer.delete_term(Term::from_field_text(self.fields.path, path));
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        Ok(true)
    }

    /// Remove every record carrying the given tag. Returns the count removed.
    pub fn remove_by_tag(&self, tag: &str) -> Result<usize> {
        let term = Term::from_field_text(self.fields.tag, tag);
        let query = TermQuery::new(term.clone(), IndexRecordOption::Basic);
        let affected = self.searcher().search(&query, &Count)?;
        if affected == 0 {
            return Ok(0);
        }
        let mut writer = self.lock_writer()?;
        writer.delete_term(term);
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        info!(tag, removed = affected, "removed documents by tag");
        Ok(affected)
    }

    /// Drop every record.
    pub fn clear(&self) -> Result<()> {
        let mut writer = self.lock_writer()?;
        writer.delete_all_documents()?;
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        info!("cleared index");
        Ok(())
    }

    /// Commit any pending writer state. Safe to call repeatedly.
    pub fn close(&self) -> Result<()> {
        let mut writer = self.lock_writer()?;
        writer.commit()?;
        Ok(())
    }

    /// Whether a record with this path exists.
    pub fn has(&self, path: &str) -> Result<bool> {
        let query = self.path_query(path);
        Ok(self.searcher().search(&query, &Count)? > 0)
    }

    /// Fetch one record by path.
    pub fn get(&self, path: &str) -> Result<Option<DocumentRecord>> {
        let query = self.path_query(path);
        let searcher = self.searcher();
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some(&(_, addr)) => {
                let doc: TantivyDocument = searcher.doc(addr)?;
                Ok(Some(self.doc_to_record(&doc)?))
            },
            None => Ok(None),
        }
    }

    /// Stored modification time for a path, if the record exists and has one.
    pub fn mtime(&self, path: &str) -> Result<Option<i64>> {
        let query = self.path_query(path);
        let searcher = self.searcher();
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some(&(_, addr)) => {
                let doc: TantivyDocument = searcher.doc(addr)?;
                Ok(doc
                    .get_first(self.fields.mtime)
                    .and_then(|v| v.as_i64()))
            },
            None => Ok(None),
        }
    }

    /// All stored records. Used by glob lookups and statistics.
    pub fn all_records(&self) -> Result<Vec<DocumentRecord>> {
        let searcher = self.searcher();
        let total = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if total == 0 {
            return Ok(Vec::new());
        }
        let top = searcher.search(
            &tantivy::query::AllQuery,
            &TopDocs::with_limit(total.max(1)),
        )?;
        let mut records = Vec::with_capacity(top.len());
        for (_, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            records.push(self.doc_to_record(&doc)?);
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    /// Run a rewritten query: top `limit` records sorted by ascending
    /// weighted rank, optionally restricted to tags and counted before the
    /// limit.
    ///
    /// The public rank is the negated BM25 score, so lower rank means a
    /// better match and `rank <= threshold` selects the best documents.
    pub fn query(
        &self,
        rewritten: &str,
        original: &str,
        limit: usize,
        tags: &[String],
        want_count: bool,
    ) -> Result<(Vec<(f32, DocumentRecord)>, Option<usize>)> {
        let parsed = self
            .weighted_parser()
            .parse_query(rewritten)
            .map_err(|e| Error::Query {
                original: original.to_string(),
                rewritten: rewritten.to_string(),
                reason: e.to_string(),
            })?;

        let query: Box<dyn Query> = if tags.is_empty() {
            parsed
        } else {
            let mut should: Vec<(Occur, Box<dyn Query>)> = tags
                .iter()
                .map(|tag| {
                    let term = Term::from_field_text(self.fields.tag, tag);
                    let q: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, q)
                })
                .collect();
            should.push((
                Occur::Should,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.tag, UNTAGGED),
                    IndexRecordOption::Basic,
                )),
            ));
            Box::new(BooleanQuery::new(vec![
                (Occur::Must, parsed),
                (Occur::Must, Box::new(BooleanQuery::new(should))),
            ]))
        };

        let searcher = self.searcher();
        let (top, count) = if want_count {
            let (top, count) =
                searcher.search(&query, &(TopDocs::with_limit(limit.max(1)), Count))?;
            (top, Some(count))
        } else {
            (
                searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?,
                None,
            )
        };

        let mut hits = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            hits.push((-score, self.doc_to_record(&doc)?));
        }
        debug!(query = original, hits = hits.len(), "query executed");
        Ok((hits, count))
    }

    /// Index statistics, optionally scoped to one tag.
    pub fn stats(&self, tag: Option<&str>) -> Result<Stats> {
        let mut stats = Stats::default();
        for record in self.all_records()? {
            if let Some(tag) = tag {
                if !record.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            stats.documents += 1;
            stats.body_bytes += record.body.len() as u64;
            stats.sections += record.sections_index.len();
            for t in &record.tags {
                *stats.tags.entry(t.clone()).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }

    fn weighted_parser(&self) -> QueryParser {
        let mut parser =
            QueryParser::for_index(&self.index, self.fields.normalized.to_vec());
        for (i, kind) in FIELD_ORDER.iter().enumerate() {
            parser.set_field_boost(self.fields.normalized[i], self.weights.get(*kind));
        }
        parser
    }

    fn path_query(&self, path: &str) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(self.fields.path, path),
            IndexRecordOption::Basic,
        )
    }

    fn searcher(&self) -> tantivy::Searcher {
        self.reader.searcher()
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, IndexWriter>> {
        self.writer
            .lock()
            .map_err(|_| Error::Storage("index writer poisoned".into()))
    }

    fn record_to_doc(&self, record: &DocumentRecord) -> Result<TantivyDocument> {
        let mut doc = TantivyDocument::default();
        for (i, kind) in FIELD_ORDER.iter().enumerate() {
            doc.add_text(self.fields.raw[i], record.field_raw(*kind));
            doc.add_text(self.fields.normalized[i], record.field_norm(*kind));
        }
        doc.add_text(self.fields.path, &record.path);
        for tag in &record.tags {
            doc.add_text(self.fields.tag, tag);
        }
        let user_tags = record
            .tags
            .iter()
            .filter(|t| Some(t.as_str()) != record.language.as_deref())
            .count();
        if user_tags == 0 {
            doc.add_text(self.fields.tag, UNTAGGED);
        }
        if let Some(language) = &record.language {
            doc.add_text(self.fields.language, language);
        }
        doc.add_text(self.fields.collection, serde_json::to_string(&record.tags)?);
        doc.add_text(
            self.fields.structure,
            serde_json::to_string(&record.structure)?,
        );
        doc.add_text(
            self.fields.sections,
            serde_json::to_string(&record.sections_index)?,
        );
        if let Some(mtime) = record.mtime {
            doc.add_i64(self.fields.mtime, mtime);
        }
        Ok(doc)
    }

    fn doc_to_record(&self, doc: &TantivyDocument) -> Result<DocumentRecord> {
        let text = |field: Field| -> String {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let raw = |kind: FieldKind| text(self.fields.raw[field_slot(kind)]);
        let norm = |kind: FieldKind| text(self.fields.normalized[field_slot(kind)]);

        let tags: Vec<String> =
            serde_json::from_str(&text(self.fields.collection)).unwrap_or_default();
        let structure: Vec<String> =
            serde_json::from_str(&text(self.fields.structure)).unwrap_or_default();
        let sections_index = serde_json::from_str(&text(self.fields.sections))
            .map_err(|e| Error::Serialization(format!("corrupt sections blob: {e}")))?;

        Ok(DocumentRecord {
            path: text(self.fields.path),
            title: raw(FieldKind::Title),
            h1: raw(FieldKind::H1),
            h2: raw(FieldKind::H2),
            h3: raw(FieldKind::H3),
            h4: raw(FieldKind::H4),
            h5: raw(FieldKind::H5),
            h6: raw(FieldKind::H6),
            body: raw(FieldKind::Body),
            normalized: NormalizedFields {
                title: norm(FieldKind::Title),
                h1: norm(FieldKind::H1),
                h2: norm(FieldKind::H2),
                h3: norm(FieldKind::H3),
                h4: norm(FieldKind::H4),
                h5: norm(FieldKind::H5),
                h6: norm(FieldKind::H6),
                body: norm(FieldKind::Body),
            },
            tags,
            language: doc
                .get_first(self.fields.language)
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            structure,
            sections_index,
            mtime: doc.get_first(self.fields.mtime).and_then(|v| v.as_i64()),
        })
    }
}

fn field_slot(kind: FieldKind) -> usize {
    FIELD_ORDER
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    let indexed_text = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("default")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    for kind in FIELD_ORDER {
        builder.add_text_field(kind.column(), STORED);
        builder.add_text_field(kind.normalized_column(), indexed_text.clone());
    }
    builder.add_text_field("path", STRING | STORED);
    builder.add_text_field("tag", STRING);
    builder.add_text_field("collection", STORED);
    builder.add_text_field("language", STORED);
    builder.add_text_field("structure", STORED);
    builder.add_text_field("sections_index", STORED);
    builder.add_i64_field("mtime", STORED);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    let get = |name: &str| -> Result<Field> {
        schema
            .get_field(name)
            .map_err(|_| Error::Storage(format!("missing schema field '{name}'")))
    };

    let mut raw = [Field::from_field_id(0); 8];
    let mut normalized = [Field::from_field_id(0); 8];
    for (i, kind) in FIELD_ORDER.iter().enumerate() {
        raw[i] = get(kind.column())?;
        normalized[i] = get(kind.normalized_column())?;
    }

    Ok(SchemaFields {
        raw,
        normalized,
        path: get("path")?,
        tag: get("tag")?,
        collection: get("collection")?,
        language: get("language")?,
        structure: get("structure")?,
        sections: get("sections_index")?,
        mtime: get("mtime")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fold;
    use tempfile::TempDir;

    fn record(path: &str, title: &str, body: &str, tags: &[&str]) -> DocumentRecord {
        DocumentRecord {
            path: path.into(),
            title: title.into(),
            h1: String::new(),
            h2: String::new(),
            h3: String::new(),
            h4: String::new(),
            h5: String::new(),
            h6: String::new(),
            body: body.into(),
            normalized: NormalizedFields {
                title: fold(title),
                body: fold(body),
                ..NormalizedFields::default()
            },
            tags: tags.iter().map(ToString::to_string).collect(),
            language: None,
            structure: Vec::new(),
            sections_index: std::collections::HashMap::new(),
            mtime: Some(1_700_000_000_000),
        }
    }

    fn open_index(dir: &TempDir) -> SearchIndex {
        SearchIndex::open(dir.path(), Weights::default()).unwrap()
    }

    #[test]
    fn upsert_and_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index
            .upsert(&record("/docs/a.md", "Alpha", "alpha body", &["x"]))
            .unwrap();

        let fetched = index.get("/docs/a.md").unwrap().unwrap();
        assert_eq!(fetched.title, "Alpha");
        assert_eq!(fetched.body, "alpha body");
        assert_eq!(fetched.tags, vec!["x"]);
        assert_eq!(fetched.mtime, Some(1_700_000_000_000));
        assert!(index.get("/docs/missing.md").unwrap().is_none());
    }

    #[test]
    fn path_is_primary_key() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index
            .upsert(&record("/d.md", "First", "one", &[]))
            .unwrap();
        index
            .upsert(&record("/d.md", "Second", "two", &[]))
            .unwrap();

        assert_eq!(index.all_records().unwrap().len(), 1);
        assert_eq!(index.get("/d.md").unwrap().unwrap().title, "Second");
    }

    #[test]
    fn field_weight_ranks_title_above_body() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index
            .upsert(&record("/title.md", "zebra", "other words here", &[]))
            .unwrap();
        index
            .upsert(&record("/body.md", "Other", "zebra zebra zebra", &[]))
            .unwrap();

        let (hits, _) = index.query("zebra", "zebra", 10, &[], false).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1.path, "/title.md");
        // Ranks ascend: the better match carries the lower rank.
        assert!(hits[0].0 < hits[1].0);
        assert!(hits.iter().all(|(rank, _)| *rank < 0.0));
    }

    #[test]
    fn tag_filter_keeps_untagged_documents() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index
            .upsert(&record("/u.md", "Common", "common word", &[]))
            .unwrap();
        index
            .upsert(&record("/a.md", "Common", "common word", &["x"]))
            .unwrap();
        index
            .upsert(&record("/b.md", "Common", "common word", &["y"]))
            .unwrap();

        let tags = vec!["x".to_string()];
        let (hits, count) = index.query("common", "common", 10, &tags, true).unwrap();
        let mut paths: Vec<&str> = hits.iter().map(|(_, r)| r.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["/a.md", "/u.md"]);
        assert_eq!(count, Some(2));
    }

    #[test]
    fn language_tag_does_not_untag_a_document() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        let mut only_lang = record("/u.md", "Common", "common word", &["eng"]);
        only_lang.language = Some("eng".into());
        index.upsert(&only_lang).unwrap();
        index
            .upsert(&record("/b.md", "Common", "common word", &["y"]))
            .unwrap();

        // A document whose only tag is the detected language stays global.
        let tags = vec!["x".to_string()];
        let (hits, _) = index.query("common", "common", 10, &tags, false).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1.path, "/u.md");
        assert_eq!(hits[0].1.language.as_deref(), Some("eng"));
    }

    #[test]
    fn remove_by_tag_and_clear() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index.upsert(&record("/a.md", "A", "text", &["x"])).unwrap();
        index.upsert(&record("/b.md", "B", "text", &["x"])).unwrap();
        index.upsert(&record("/c.md", "C", "text", &["y"])).unwrap();

        assert_eq!(index.remove_by_tag("x").unwrap(), 2);
        assert_eq!(index.all_records().unwrap().len(), 1);

        index.clear().unwrap();
        assert!(index.all_records().unwrap().is_empty());
        assert_eq!(index.remove_by_tag("y").unwrap(), 0);
    }

    #[test]
    fn remove_reports_existence() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index.upsert(&record("/a.md", "A", "text", &[])).unwrap();
        assert!(index.remove("/a.md").unwrap());
        assert!(!index.remove("/a.md").unwrap());
        assert!(!index.has("/a.md").unwrap());
    }

    #[test]
    fn invalid_query_surfaces_both_forms() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        let err = index
            .query("unknown_field:x", "unknown:x", 10, &[], false)
            .unwrap_err();
        match err {
            Error::Query {
                original, rewritten, ..
            } => {
                assert_eq!(original, "unknown:x");
                assert_eq!(rewritten, "unknown_field:x");
            },
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn empty_index_query_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        let (hits, count) = index.query("anything", "anything", 5, &[], true).unwrap();
        assert!(hits.is_empty());
        assert_eq!(count, Some(0));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let index = open_index(&dir);
            index
                .upsert(&record("/a.md", "Persisted", "text", &[]))
                .unwrap();
        }
        let reopened = open_index(&dir);
        assert!(reopened.has("/a.md").unwrap());
        assert_eq!(
            reopened.get("/a.md").unwrap().unwrap().title,
            "Persisted"
        );
    }

    #[test]
    fn stats_scope_by_tag() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir);
        index
            .upsert(&record("/a.md", "A", "12345", &["x", "y"]))
            .unwrap();
        index.upsert(&record("/b.md", "B", "123", &["y"])).unwrap();

        let all = index.stats(None).unwrap();
        assert_eq!(all.documents, 2);
        assert_eq!(all.body_bytes, 8);
        assert_eq!(all.tags.get("y"), Some(&2));

        let only_x = index.stats(Some("x")).unwrap();
        assert_eq!(only_x.documents, 1);
        assert_eq!(only_x.body_bytes, 5);
    }
}
