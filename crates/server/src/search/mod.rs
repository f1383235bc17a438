//! Full-text announcement search using Tantivy.
//!
//! The app starts with no index and serves empty results. A background task
//! (see [`build_index_async`]) loads every live announcement from the
//! database and swaps the built index in atomically. After that,
//! announcement mutations keep the index current incrementally:
//! delete-by-id-term followed by a re-add.

pub mod indexer;

use std::sync::{Arc, Mutex, RwLock};

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions, Value,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::instrument;

use merchkins_core::{AnnouncementId, Audience, MemberRole, OrgId};

use crate::models::announcement::Announcement;

pub use indexer::build_index_async;

const WRITER_BUFFER_BYTES: usize = 50_000_000;

/// A search hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub id: AnnouncementId,
    pub title: String,
    pub snippet: String,
    pub is_pinned: bool,
    pub score: f32,
}

/// Schema field handles for the announcement index.
#[derive(Clone)]
pub struct SearchFields {
    pub id: Field,
    pub org_id: Field,
    pub audience: Field,
    pub title: Field,
    pub snippet: Field,
    pub is_pinned: Field,
    pub title_text: Field,
    pub body_text: Field,
}

/// Inner index state (once built).
struct ReadyIndex {
    #[allow(dead_code)]
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: SearchFields,
}

/// The announcement search index.
#[derive(Clone)]
pub struct SearchIndex {
    inner: Arc<RwLock<Option<ReadyIndex>>>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    /// Create a new empty search index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Check if the index is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Set the built index. Called by the background builder task.
    pub(crate) fn set_ready(
        &self,
        index: Index,
        writer: IndexWriter,
        fields: SearchFields,
    ) -> Result<(), SearchError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::Index(format!("Failed to create reader: {e}")))?;

        let ready = ReadyIndex {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        };

        *self
            .inner
            .write()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))? = Some(ready);

        Ok(())
    }

    /// Build the schema for the announcement index.
    pub(crate) fn build_schema() -> (Schema, SearchFields) {
        let mut schema_builder = Schema::builder();

        let id = schema_builder.add_i64_field("id", INDEXED | STORED | FAST);
        let org_id = schema_builder.add_i64_field("org_id", INDEXED | STORED);
        // STRING means indexed but not tokenized (exact match)
        let audience = schema_builder.add_text_field("audience", STRING | STORED);
        let title = schema_builder.add_text_field("title", STORED);
        let snippet = schema_builder.add_text_field("snippet", STORED);
        let is_pinned = schema_builder.add_u64_field("is_pinned", STORED);

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        let title_text = schema_builder.add_text_field("title_text", text_options.clone());
        let body_text = schema_builder.add_text_field("body_text", text_options);

        let schema = schema_builder.build();
        let fields = SearchFields {
            id,
            org_id,
            audience,
            title,
            snippet,
            is_pinned,
            title_text,
            body_text,
        };

        (schema, fields)
    }

    /// Search one organization's announcements as a given viewer.
    ///
    /// Results are restricted to audiences the viewer's role may see.
    /// Returns empty results if the index isn't ready yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned or the query fails.
    #[instrument(skip(self))]
    // Allow: the read guard must outlive `ready`, which borrows from it.
    #[allow(clippy::significant_drop_tightening)]
    pub fn search(
        &self,
        org_id: OrgId,
        viewer_role: Option<MemberRole>,
        query_str: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let query_str = query_str.trim().to_lowercase();
        if query_str.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        let Some(ready) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let searcher = ready.reader.searcher();
        let fields = &ready.fields;

        let mut text_clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for term in query_str.split_whitespace() {
            let title_term = Term::from_field_text(fields.title_text, term);
            text_clauses.push((
                Occur::Should,
                Box::new(TermQuery::new(title_term.clone(), IndexRecordOption::Basic)),
            ));

            let body_term = Term::from_field_text(fields.body_text, term);
            text_clauses.push((
                Occur::Should,
                Box::new(TermQuery::new(body_term.clone(), IndexRecordOption::Basic)),
            ));

            if term.len() >= 3 {
                text_clauses.push((
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new(title_term, 1, true)),
                ));
                text_clauses.push((
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new(body_term, 1, true)),
                ));
            }
        }

        let audience_clauses: Vec<(Occur, Box<dyn Query>)> =
            [Audience::Public, Audience::Members, Audience::Staff]
                .into_iter()
                .filter(|a| a.visible_to(viewer_role))
                .map(|a| {
                    let term = Term::from_field_text(fields.audience, a.as_str());
                    let q: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, q)
                })
                .collect();

        let org_term = Term::from_field_i64(fields.org_id, org_id.as_i64());
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(org_term, IndexRecordOption::Basic)) as Box<dyn Query>,
            ),
            (Occur::Must, Box::new(BooleanQuery::new(audience_clauses))),
            (Occur::Must, Box::new(BooleanQuery::new(text_clauses))),
        ]);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher
                .doc::<TantivyDocument>(doc_address)
                .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;
            hits.push(Self::doc_to_hit(fields, &doc, score)?);
        }

        Ok(hits)
    }

    /// Add or replace an announcement in the index.
    ///
    /// No-op until the index is ready; the initial build will pick the
    /// document up from the database instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or commit fails.
    pub fn upsert(&self, announcement: &Announcement) -> Result<(), SearchError> {
        self.with_writer(|writer, fields| {
            writer.delete_term(Term::from_field_i64(fields.id, announcement.id.as_i64()));
            writer
                .add_document(indexer::to_document(fields, announcement))
                .map_err(|e| SearchError::Index(format!("Failed to index document: {e}")))?;
            Ok(())
        })
    }

    /// Remove an announcement from the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or commit fails.
    pub fn remove(&self, id: AnnouncementId) -> Result<(), SearchError> {
        self.with_writer(|writer, fields| {
            writer.delete_term(Term::from_field_i64(fields.id, id.as_i64()));
            Ok(())
        })
    }

    /// Get the number of documents in the index, or 0 if not ready.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| r.reader.searcher().num_docs()))
            .unwrap_or(0)
    }

    // Allow: the read guard must be held while the writer mutex and reader
    // borrowed from it are in use.
    #[allow(clippy::significant_drop_tightening)]
    fn with_writer<F>(&self, f: F) -> Result<(), SearchError>
    where
        F: FnOnce(&mut IndexWriter, &SearchFields) -> Result<(), SearchError>,
    {
        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        let Some(ready) = guard.as_ref() else {
            return Ok(());
        };

        let mut writer = ready
            .writer
            .lock()
            .map_err(|_| SearchError::Index("Writer lock poisoned".to_string()))?;

        f(&mut writer, &ready.fields)?;

        writer
            .commit()
            .map_err(|e| SearchError::Index(format!("Failed to commit: {e}")))?;
        ready
            .reader
            .reload()
            .map_err(|e| SearchError::Index(format!("Failed to reload reader: {e}")))?;

        Ok(())
    }

    fn doc_to_hit(
        fields: &SearchFields,
        doc: &TantivyDocument,
        score: f32,
    ) -> Result<SearchHit, SearchError> {
        let get_text = |field: Field| -> String {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let id = doc
            .get_first(fields.id)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| SearchError::Query("Document missing id".to_string()))?;

        Ok(SearchHit {
            id: AnnouncementId::new(id),
            title: get_text(fields.title),
            snippet: get_text(fields.snippet),
            is_pinned: doc
                .get_first(fields.is_pinned)
                .and_then(|v| v.as_u64())
                .is_some_and(|v| v == 1),
            score,
        })
    }
}

/// Search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Index error: {0}")]
    Index(String),
    #[error("Query error: {0}")]
    Query(String),
}
