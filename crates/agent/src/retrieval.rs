//! Document-store boundary for retrieval-augmented answers.
//!
//! The store itself (embeddings, indexing, persistence) is out of scope; this
//! module fixes the query interface and the context-assembly rule consumers
//! rely on: results arrive scored, and context is joined highest-score first.

use anyhow::Result;
use async_trait::async_trait;

/// A retrieved document together with its relevance score. Higher is more
/// relevant.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Return at most `top_k` documents relevant to `query`, scored.
    async fn search_with_score(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>>;
}

/// Keyword-overlap retriever over an in-memory corpus. Good enough for tests
/// and offline development; a production deployment plugs in a vector store
/// behind the same trait.
#[derive(Default)]
pub struct InMemoryRetriever {
    documents: Vec<String>,
}

impl InMemoryRetriever {
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }

    fn score(query_terms: &[String], document: &str) -> f64 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let document = document.to_lowercase();
        let hits = query_terms.iter().filter(|term| document.contains(term.as_str())).count();
        hits as f64 / query_terms.len() as f64
    }
}

#[async_trait]
impl DocumentRetriever for InMemoryRetriever {
    async fn search_with_score(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|term| term.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|term| !term.is_empty())
            .collect();

        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .map(|document| ScoredDocument {
                content: document.clone(),
                score: Self::score(&terms, document),
            })
            .filter(|document| document.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Join retrieved documents into a prompt context, highest score first,
/// separated by blank lines.
pub fn build_context(mut documents: Vec<ScoredDocument>) -> String {
    documents
        .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    documents
        .into_iter()
        .map(|document| document.content)
        .collect::<Vec<_>>()
        .join("\n\n")
}
