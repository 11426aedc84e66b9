//! BM25 lexical retrieval over Skill documents, via Tantivy.
//!
//! Backs the Ranker's `lex` component. A Skill is indexed across four
//! fields — title, key insight, domain tags, and body — so a query term
//! appearing in the title scores higher than the same term buried in body
//! text, without needing a separate boosting pass.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tantivy::{
    collector::TopDocs,
    doc,
    query::QueryParser,
    schema::{Field, Schema, Value, STORED, TEXT},
    Index, IndexReader, IndexWriter, TantivyDocument,
};

/// Configuration for the BM25 index.
#[derive(Debug, Clone)]
pub struct BM25Config {
    /// Directory for index storage (`None` = in-memory).
    pub index_dir: Option<PathBuf>,
    /// BM25 k1 parameter (term frequency saturation).
    pub k1: f32,
    /// BM25 b parameter (document length normalization).
    pub b: f32,
    /// Number of indexing threads.
    pub num_threads: usize,
    /// Heap size for indexing, in bytes.
    pub heap_size: usize,
}

impl Default for BM25Config {
    fn default() -> Self {
        Self {
            index_dir: None,
            k1: 1.2,
            b: 0.75,
            num_threads: 1,
            heap_size: 50_000_000,
        }
    }
}

impl BM25Config {
    /// Config for a RAM-backed index, rebuilt fully at process start.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Config for a disk-backed index at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: Some(path.into()),
            ..Default::default()
        }
    }
}

/// A Skill reduced to the fields the lexical index scores against.
#[derive(Debug, Clone)]
pub struct SkillDocument {
    /// `skill_id`.
    pub id: String,
    /// Derived from the body's first H1.
    pub title: String,
    /// Derived from the body's first paragraph.
    pub key_insight: String,
    /// Space-joined `domain_tags`.
    pub domain_tags: String,
    /// Full Markdown body.
    pub body: String,
}

/// A single BM25 hit.
#[derive(Debug, Clone)]
pub struct BM25SearchResult {
    /// `skill_id` of the matched document.
    pub id: String,
    /// BM25 score, unnormalized.
    pub score: f32,
    /// The matched title, for display without a store round-trip.
    pub title: String,
}

/// BM25 index over [`SkillDocument`]s.
pub struct BM25Index {
    index: Index,
    reader: IndexReader,
    writer: Option<IndexWriter>,
    id_field: Field,
    title_field: Field,
    key_insight_field: Field,
    domain_tags_field: Field,
    body_field: Field,
    config: BM25Config,
}

impl BM25Index {
    /// Build a fresh index (in-memory or on-disk per `config`).
    pub fn new(config: BM25Config) -> Result<Self> {
        let mut schema_builder = Schema::builder();

        let id_field = schema_builder.add_text_field("id", STORED);
        let title_field = schema_builder.add_text_field("title", TEXT | STORED);
        let key_insight_field = schema_builder.add_text_field("key_insight", TEXT);
        let domain_tags_field = schema_builder.add_text_field("domain_tags", TEXT);
        let body_field = schema_builder.add_text_field("body", TEXT);

        let schema = schema_builder.build();

        let index = if let Some(ref dir) = config.index_dir {
            std::fs::create_dir_all(dir).context("failed to create index directory")?;
            Index::create_in_dir(dir, schema).context("failed to create index in directory")?
        } else {
            Index::create_in_ram(schema)
        };

        let reader = index
            .reader_builder()
            .reload_policy(tantivy::ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("failed to create index reader")?;

        let writer = index
            .writer(config.heap_size)
            .context("failed to create index writer")?;

        Ok(Self {
            index,
            reader,
            writer: Some(writer),
            id_field,
            title_field,
            key_insight_field,
            domain_tags_field,
            body_field,
            config,
        })
    }

    /// Open an existing on-disk index.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let index = Index::open_in_dir(&path).context("failed to open index")?;

        let schema = index.schema();
        let id_field = schema.get_field("id").context("missing id field")?;
        let title_field = schema.get_field("title").context("missing title field")?;
        let key_insight_field = schema
            .get_field("key_insight")
            .context("missing key_insight field")?;
        let domain_tags_field = schema
            .get_field("domain_tags")
            .context("missing domain_tags field")?;
        let body_field = schema.get_field("body").context("missing body field")?;

        let reader = index
            .reader_builder()
            .reload_policy(tantivy::ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("failed to create index reader")?;

        let config = BM25Config::persistent(&path);

        Ok(Self {
            index,
            reader,
            writer: None,
            id_field,
            title_field,
            key_insight_field,
            domain_tags_field,
            body_field,
            config,
        })
    }

    /// Index a single Skill document, replacing one already indexed under the same `id`.
    pub fn add_document(&mut self, doc: &SkillDocument) -> Result<()> {
        let writer = self.writer.as_mut().context("index not writable")?;

        let id_term = tantivy::Term::from_field_text(self.id_field, &doc.id);
        writer.delete_term(id_term);

        let tantivy_doc = doc!(
            self.id_field => doc.id.as_str(),
            self.title_field => doc.title.as_str(),
            self.key_insight_field => doc.key_insight.as_str(),
            self.domain_tags_field => doc.domain_tags.as_str(),
            self.body_field => doc.body.as_str(),
        );

        writer.add_document(tantivy_doc).context("failed to add document")?;
        Ok(())
    }

    /// Commit pending changes and make them visible to readers.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.commit().context("failed to commit")?;
            self.reader.reload().context("failed to reload reader")?;
        }
        Ok(())
    }

    /// Drop every indexed document (used before a full rebuild).
    pub fn clear(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.delete_all_documents().context("failed to clear index")?;
            writer.commit().context("failed to commit clear")?;
            self.reader.reload().context("failed to reload reader")?;
        }
        Ok(())
    }

    /// Search across title, key insight, domain tags, and body.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<BM25SearchResult>> {
        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.title_field,
                self.key_insight_field,
                self.domain_tags_field,
                self.body_field,
            ],
        );

        let parsed_query = query_parser.parse_query(query).context("failed to parse query")?;

        let top_docs = searcher
            .search(&parsed_query, &TopDocs::with_limit(top_k))
            .context("search failed")?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: TantivyDocument = searcher.doc(doc_address).context("failed to retrieve document")?;

            let id = retrieved
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let title = retrieved
                .get_first(self.title_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            results.push(BM25SearchResult { id, score, title });
        }

        Ok(results)
    }

    /// Number of documents currently indexed.
    pub fn document_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// The configuration this index was built with.
    pub fn config(&self) -> &BM25Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, key_insight: &str, domain_tags: &str, body: &str) -> SkillDocument {
        SkillDocument {
            id: id.to_string(),
            title: title.to_string(),
            key_insight: key_insight.to_string(),
            domain_tags: domain_tags.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn create_index_starts_empty() {
        let index = BM25Index::new(BM25Config::in_memory()).unwrap();
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn add_and_search_finds_matching_skill() {
        let mut index = BM25Index::new(BM25Config::in_memory()).unwrap();

        index
            .add_document(&doc(
                "retry-with-jitter",
                "Retry with jitter",
                "Back off exponentially and add jitter",
                "networking reliability",
                "Full body about exponential backoff and thundering herds.",
            ))
            .unwrap();
        index
            .add_document(&doc(
                "idempotent-migrations",
                "Idempotent database migrations",
                "Migrations should be safe to re-run",
                "database reliability",
                "Full body about migration idempotency.",
            ))
            .unwrap();
        index.commit().unwrap();

        assert_eq!(index.document_count(), 2);

        let results = index.search("jitter", 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "retry-with-jitter");

        let results = index.search("migrations", 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "idempotent-migrations");
    }

    #[test]
    fn re_adding_a_document_replaces_it() {
        let mut index = BM25Index::new(BM25Config::in_memory()).unwrap();
        index
            .add_document(&doc("s1", "Title one", "insight", "tags", "body"))
            .unwrap();
        index.commit().unwrap();
        assert_eq!(index.document_count(), 1);

        index
            .add_document(&doc("s1", "Title updated", "insight", "tags", "body"))
            .unwrap();
        index.commit().unwrap();
        assert_eq!(index.document_count(), 1);
    }

    #[test]
    fn clear_removes_all_documents() {
        let mut index = BM25Index::new(BM25Config::in_memory()).unwrap();
        index
            .add_document(&doc("s1", "title", "insight", "tags", "body"))
            .unwrap();
        index.commit().unwrap();
        assert_eq!(index.document_count(), 1);

        index.clear().unwrap();
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn search_on_empty_index_returns_nothing() {
        let index = BM25Index::new(BM25Config::in_memory()).unwrap();
        let results = index.search("anything", 10).unwrap();
        assert!(results.is_empty());
    }
}
