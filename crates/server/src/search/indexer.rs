//! Search index builder.
//!
//! Builds the announcement index asynchronously from the database at
//! startup, then hands the writer to [`SearchIndex`] for incremental
//! updates.

use sqlx::PgPool;
use tantivy::{Index, IndexWriter, TantivyDocument};
use tracing::{error, info, instrument, warn};

use merchkins_core::AnnouncementId;

use crate::db::announcements::AnnouncementRepository;
use crate::models::announcement::Announcement;

use super::{SearchError, SearchFields, SearchIndex, WRITER_BUFFER_BYTES};

const BATCH_SIZE: i64 = 500;

const SNIPPET_CHARS: usize = 160;

/// Spawn a background task to build the search index from the database.
///
/// Until complete, `SearchIndex::search()` returns empty results.
pub fn build_index_async(search_index: SearchIndex, pool: PgPool) {
    info!("Spawning background search index build task");
    tokio::spawn(async move {
        match build_index(&pool).await {
            Ok((index, writer, fields)) => {
                if let Err(e) = search_index.set_ready(index, writer, fields) {
                    error!(error = %e, "Failed to set search index as ready");
                } else {
                    let docs = search_index.num_docs();
                    info!(docs, "Search index is now ready");
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to build search index");
            }
        }
    });
}

/// Build the index from every live announcement.
#[instrument(skip_all)]
async fn build_index(
    pool: &PgPool,
) -> Result<(Index, IndexWriter, SearchFields), SearchError> {
    let (schema, fields) = SearchIndex::build_schema();

    let index = Index::create_in_ram(schema);

    // Register the English stemmer tokenizer
    index.tokenizers().register(
        "en_stem",
        tantivy::tokenizer::TextAnalyzer::builder(tantivy::tokenizer::SimpleTokenizer::default())
            .filter(tantivy::tokenizer::RemoveLongFilter::limit(40))
            .filter(tantivy::tokenizer::LowerCaser)
            .filter(tantivy::tokenizer::Stemmer::new(
                tantivy::tokenizer::Language::English,
            ))
            .build(),
    );

    let mut writer = index
        .writer(WRITER_BUFFER_BYTES)
        .map_err(|e| SearchError::Index(format!("Failed to create writer: {e}")))?;

    let repo = AnnouncementRepository::new(pool);
    let mut count = 0usize;
    let mut after = AnnouncementId::new(0);

    loop {
        let batch = repo
            .list_live_after(after, BATCH_SIZE)
            .await
            .map_err(|e| SearchError::Index(format!("Failed to load announcements: {e}")))?;

        let Some(last) = batch.last() else { break };
        after = last.id;

        for announcement in &batch {
            if let Err(e) = writer.add_document(to_document(&fields, announcement)) {
                warn!(error = %e, id = %announcement.id, "Failed to index announcement");
            } else {
                count += 1;
            }
        }
    }

    writer
        .commit()
        .map_err(|e| SearchError::Index(format!("Failed to commit index: {e}")))?;

    info!(count, "Search index built");

    Ok((index, writer, fields))
}

/// Convert an announcement to an index document.
pub(super) fn to_document(fields: &SearchFields, announcement: &Announcement) -> TantivyDocument {
    tantivy::doc!(
        fields.id => announcement.id.as_i64(),
        fields.org_id => announcement.org_id.as_i64(),
        fields.audience => announcement.audience.as_str(),
        fields.title => announcement.title.clone(),
        fields.snippet => snippet(&announcement.body),
        fields.is_pinned => u64::from(announcement.is_pinned),
        fields.title_text => announcement.title.clone(),
        fields.body_text => announcement.body.clone()
    )
}

/// The first sentence-ish chunk of the body, for result listings.
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        return trimmed.to_string();
    }

    let cut: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) => format!("{}…", &cut[..pos]),
        None => format!("{cut}…"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_short_body_untouched() {
        assert_eq!(snippet("short body"), "short body");
    }

    #[test]
    fn test_snippet_truncates_at_word_boundary() {
        let body = "word ".repeat(100);
        let s = snippet(&body);
        assert!(s.chars().count() <= SNIPPET_CHARS + 1);
        assert!(s.ends_with('…'));
        assert!(!s.contains("word w…"));
    }
}
