use async_trait::async_trait;
use crosspost::{PostContent, Result, SearchIndexer};

/// Stand-in indexer until a real search backend is wired up; records what
/// would be indexed at debug level.
pub struct LoggingIndexer;

#[async_trait]
impl SearchIndexer for LoggingIndexer {
    async fn index(&self, content: &PostContent) -> Result<()> {
        tracing::debug!(content_id = %content.id, "would index content");
        Ok(())
    }
}
