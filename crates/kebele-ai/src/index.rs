//! Procedure retrieval by embedding.
//!
//! The production index lives with the procedure CRUD store; this crate only
//! consumes it through [`ProcedureIndex`]. [`InMemoryProcedureIndex`] ranks by
//! cosine similarity and backs the CLI demo mode and tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kebele_llm::{CallContext, Embedder, cosine_similarity};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{AiError, Result};
use crate::types::Procedure;

/// Default minimum similarity for the in-memory index.
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Vector-indexed procedure lookup.
///
/// An empty result is not an error; the guide treats it as "no official
/// procedure matched".
#[async_trait]
pub trait ProcedureIndex: Send + Sync {
    /// Return at most `limit` procedures nearest to `embedding`, best first.
    async fn search_by_embedding(&self, embedding: &[f32], limit: usize)
    -> Result<Vec<Procedure>>;
}

/// A procedure index shared across requests.
pub type SharedProcedureIndex = Arc<dyn ProcedureIndex>;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory Index
// ─────────────────────────────────────────────────────────────────────────────

/// Brute-force cosine-similarity index held in memory.
#[derive(Debug)]
pub struct InMemoryProcedureIndex {
    entries: RwLock<Vec<(Procedure, Vec<f32>)>>,
    min_score: f32,
}

impl Default for InMemoryProcedureIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProcedureIndex {
    /// Create an empty index with the default threshold.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Set the minimum similarity a procedure needs to be returned.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Add a procedure with a precomputed embedding.
    pub fn insert(&self, procedure: Procedure, embedding: Vec<f32>) {
        self.entries.write().push((procedure, embedding));
    }

    /// Embed each procedure's search text and add it to the index.
    pub async fn index_all(
        &self,
        ctx: &CallContext,
        embedder: &dyn Embedder,
        procedures: Vec<Procedure>,
    ) -> Result<usize> {
        let mut indexed = 0;
        for procedure in procedures {
            let embedding = embedder.embed(ctx, &procedure.search_text()).await?;
            self.insert(procedure, embedding);
            indexed += 1;
        }
        info!(count = indexed, embedder = embedder.name(), "Procedures indexed");
        Ok(indexed)
    }

    /// Number of indexed procedures.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ProcedureIndex for InMemoryProcedureIndex {
    async fn search_by_embedding(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Procedure>> {
        if embedding.is_empty() {
            return Err(AiError::Retrieval("query embedding is empty".to_string()));
        }

        let entries = self.entries.read();
        let mut scored: Vec<(f32, &Procedure)> = entries
            .iter()
            .map(|(procedure, vector)| (cosine_similarity(embedding, vector), procedure))
            .filter(|(score, _)| *score >= self.min_score)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(limit);

        debug!(
            candidates = entries.len(),
            matched = scored.len(),
            top_score = scored.first().map(|(s, _)| *s),
            "Procedure search finished"
        );

        Ok(scored.into_iter().map(|(_, p)| p.clone()).collect())
    }
}

/// Load procedures from a JSON array file.
pub fn load_procedures(path: &Path) -> Result<Vec<Procedure>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AiError::Config(format!(
            "failed to read procedures file '{}': {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        AiError::Config(format!(
            "failed to parse procedures file '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kebele_llm::MockEmbedder;

    #[tokio::test]
    async fn test_search_ranks_and_limits() {
        let index = InMemoryProcedureIndex::new();
        index.insert(Procedure::new("a", "A"), vec![1.0, 0.0]);
        index.insert(Procedure::new("b", "B"), vec![0.8, 0.6]);
        index.insert(Procedure::new("c", "C"), vec![0.0, 1.0]);

        let found = index.search_by_embedding(&[1.0, 0.0], 3).await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        // C is orthogonal and falls under the threshold
        assert_eq!(names, vec!["A", "B"]);

        let found = index.search_by_embedding(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let index = InMemoryProcedureIndex::new();
        assert!(index.search_by_embedding(&[1.0], 3).await.unwrap().is_empty());

        index.insert(Procedure::new("a", "A"), vec![0.0, 1.0]);
        assert!(index.search_by_embedding(&[1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_embedding_rejected() {
        let index = InMemoryProcedureIndex::new();
        let err = index.search_by_embedding(&[], 3).await.unwrap_err();
        assert!(matches!(err, AiError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_index_all_finds_exact_text() {
        let embedder = MockEmbedder::new(32);
        let index = InMemoryProcedureIndex::new();
        let procedure = Procedure::new("p1", "Driving license").with_steps(["Visit office"]);
        let query = procedure.search_text();

        let count = index
            .index_all(&CallContext::new(), &embedder, vec![procedure])
            .await
            .unwrap();
        assert_eq!(count, 1);

        let query_vec = embedder.embed(&CallContext::new(), &query).await.unwrap();
        let found = index.search_by_embedding(&query_vec, 3).await.unwrap();
        assert_eq!(found[0].id, "p1");
    }

    #[test]
    fn test_load_procedures() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("procedures.json");
        std::fs::write(
            &path,
            r#"[{"id": "p1", "name": "Procedure1", "fee": {"amount": 100, "currency": "ETB"}}]"#,
        )
        .unwrap();

        let procedures = load_procedures(&path).unwrap();
        assert_eq!(procedures[0].fee.as_ref().unwrap().currency, "ETB");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_procedures(&path), Err(AiError::Config(_))));
    }
}
