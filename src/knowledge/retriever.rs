//! Retriever - 질문 텍스트로 벡터 저장소 검색
//!
//! 질문을 임베딩한 뒤 최근접 k개 문서를 반환합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;

use super::document::Document;
use super::vector::VectorStore;

/// 기본 검색 개수
pub const DEFAULT_TOP_K: usize = 4;

/// 텍스트 → 문서 검색 인터페이스
#[async_trait]
pub trait Retriever: Send + Sync {
    /// 질문과 가까운 문서 목록 (0개 이상)
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}

/// 임베딩 + 벡터 저장소 기반 검색기
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// 검색 개수 지정
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        // 빈 질문은 영벡터가 되어 코사인 검색이 불가능
        if query.trim().is_empty() {
            tracing::debug!("Blank query, skipping vector search");
            return Ok(vec![]);
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let results = self.store.search(&embedding, self.top_k).await?;

        tracing::debug!(
            "Retrieved {} documents from {} (top_k: {})",
            results.len(),
            self.store.name(),
            self.top_k
        );

        Ok(results.into_iter().map(|r| r.document).collect())
    }
}
