//! Ingestor - 문서 수집 파이프라인
//!
//! 청킹 → 임베딩 → 같은 source의 기존 청크 삭제 → 벡터 저장소 upsert.
//! 같은 source를 다시 수집하면 이전 버전의 청크는 남지 않습니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingProvider;

use super::chunker::{default_chunker, Chunker};
use super::document::Metadata;
use super::vector::{record_id, VectorRecord, VectorStore};

/// 새 문서 입력용 구조체
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// 문서 출처 (URL, file:// 경로, 또는 text:<sha256>)
    pub source: String,
    /// 본문
    pub content: String,
    /// 청크마다 복사되는 메타데이터 (title, description, language 등)
    pub metadata: Metadata,
}

impl NewDocument {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// 직접 입력 텍스트 문서 (출처는 본문 해시)
    pub fn from_text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self::new(text_source(&content), content)
    }

    /// 메타데이터 필드 설정 (None이면 무시)
    pub fn with_field(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), Value::String(value));
        }
        self
    }
}

/// 직접 입력 텍스트의 출처 ID
///
/// 본문이 다르면 출처도 달라서 서로의 청크를 덮어쓰지 않습니다.
pub fn text_source(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("text:{}", hex)
}

/// 문서 수집기
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Box<dyn Chunker>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            chunker: default_chunker(),
        }
    }

    /// 청커 교체
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// 문서 추가
    ///
    /// 같은 source로 저장된 청크는 새 청크로 대체됩니다.
    ///
    /// # Returns
    /// 저장된 청크 수
    pub async fn add_document(&self, doc: NewDocument) -> Result<usize> {
        let chunks = self.chunker.chunk(&doc.content);
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for document: {}", doc.source);
            self.replace_source(&doc.source).await?;
            return Ok(0);
        }

        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .await
            .with_context(|| format!("Failed to embed chunks of {}", doc.source))?;

        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "Embedding count mismatch for {}: {} chunks, {} embeddings",
                doc.source,
                chunks.len(),
                embeddings.len()
            );
        }

        // 삭제 필터가 찾을 수 있도록 source는 항상 doc.source
        let mut metadata = doc.metadata;
        metadata.insert("source".to_string(), Value::String(doc.source.clone()));

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| VectorRecord {
                id: record_id(&doc.source, i),
                content,
                metadata: metadata.clone(),
                embedding,
            })
            .collect();

        self.replace_source(&doc.source).await?;

        let stored = self
            .store
            .upsert_batch(&records)
            .await
            .context("Failed to store vectors")?;

        tracing::info!(
            "Ingested {} chunks from {} into {}",
            stored,
            doc.source,
            self.store.name()
        );
        Ok(stored)
    }

    /// 이전에 저장된 source의 청크 삭제
    async fn replace_source(&self, source: &str) -> Result<()> {
        let removed = self
            .store
            .delete_source(source)
            .await
            .with_context(|| format!("Failed to remove previous chunks of {}", source))?;

        if removed > 0 {
            tracing::debug!("Removed {} previous chunks of {}", removed, source);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::{ChunkConfig, MarkdownChunker};
    use crate::knowledge::memory::MemoryVectorStore;
    use crate::knowledge::retriever::tests::FakeEmbedder;

    fn ingestor(store: Arc<MemoryVectorStore>) -> Ingestor {
        Ingestor::new(Arc::new(FakeEmbedder), store).with_chunker(Box::new(MarkdownChunker::new(
            ChunkConfig {
                min_characters: 0,
                max_characters: 30,
                overlap_characters: 0,
            },
        )))
    }

    #[tokio::test]
    async fn test_add_document_chunks_and_stores() {
        let store = Arc::new(MemoryVectorStore::new());
        let ingestor = ingestor(store.clone());

        let doc = NewDocument::new(
            "https://example.com/agents",
            "Agents plan with tools.\n\nAgents reflect on mistakes.",
        )
        .with_field("description", Some("LLM powered agents".to_string()))
        .with_field("title", None);

        let stored = ingestor.add_document(doc).await.unwrap();
        assert_eq!(stored, 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let results = store.search(&[65.0, 23.0, 1.0], 1).await.unwrap();
        let meta = results[0].document.metadata.as_ref().unwrap();
        assert_eq!(meta["source"], "https://example.com/agents");
        assert_eq!(meta["description"], "LLM powered agents");
        assert!(meta.get("title").is_none());
    }

    #[tokio::test]
    async fn test_reingest_overwrites() {
        let store = Arc::new(MemoryVectorStore::new());
        let ingestor = ingestor(store.clone());

        let doc = NewDocument::new("file:///notes.md", "Short note.");
        ingestor.add_document(doc.clone()).await.unwrap();
        ingestor.add_document(doc).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_skipped() {
        let store = Arc::new(MemoryVectorStore::new());
        let stored = ingestor(store.clone())
            .add_document(NewDocument::new("empty", "   "))
            .await
            .unwrap();

        assert_eq!(stored, 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reingest_shorter_document_drops_stale_chunks() {
        let store = Arc::new(MemoryVectorStore::new());
        let ingestor = ingestor(store.clone());

        let long = NewDocument::new(
            "https://example.com/post",
            "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.",
        );
        assert_eq!(ingestor.add_document(long).await.unwrap(), 3);

        let short = NewDocument::new("https://example.com/post", "Short note.");
        assert_eq!(ingestor.add_document(short).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);

        let results = store.search(&[83.0, 11.0, 1.0], 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.page_content, "Short note.");
    }

    #[tokio::test]
    async fn test_reingest_empty_document_clears_source() {
        let store = Arc::new(MemoryVectorStore::new());
        let ingestor = ingestor(store.clone());

        ingestor
            .add_document(NewDocument::new("file:///notes.md", "Short note."))
            .await
            .unwrap();
        ingestor
            .add_document(NewDocument::new("file:///notes.md", "  "))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_sources_untouched() {
        let store = Arc::new(MemoryVectorStore::new());
        let ingestor = ingestor(store.clone());

        ingestor
            .add_document(NewDocument::new("file:///a.md", "Alpha note."))
            .await
            .unwrap();
        ingestor
            .add_document(NewDocument::new("file:///b.md", "Beta note."))
            .await
            .unwrap();
        ingestor
            .add_document(NewDocument::new("file:///a.md", "Alpha again."))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_distinct_texts_both_kept() {
        let store = Arc::new(MemoryVectorStore::new());
        let ingestor = ingestor(store.clone());

        ingestor
            .add_document(NewDocument::from_text("Agents plan with tools."))
            .await
            .unwrap();
        ingestor
            .add_document(NewDocument::from_text("Prompts steer outputs."))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        // 같은 텍스트는 같은 출처라 중복 저장되지 않음
        ingestor
            .add_document(NewDocument::from_text("Agents plan with tools."))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[test]
    fn test_text_source() {
        let source = text_source("hello");
        assert_eq!(
            source,
            "text:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(source, text_source("hello!"));
        assert_eq!(NewDocument::from_text("hello").source, source);
    }
}
