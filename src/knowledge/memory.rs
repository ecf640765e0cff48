//! In-memory vector store (`VECTOR_BACKEND=memory`)
//!
//! 프로세스 수명 동안만 유지되는 저장소입니다. 브루트포스 코사인 유사도로 검색합니다.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::vector::{cosine_similarity, SearchResult, VectorRecord, VectorStore};

/// 메모리 벡터 저장소
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        tracing::debug!("Upserted {} records", records.len());
        Ok(records.len())
    }

    async fn delete_source(&self, source: &str) -> Result<usize> {
        let mut store = self.records.write().await;
        let before = store.len();
        store.retain(|_, r| r.source() != source);
        Ok(before - store.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let store = self.records.read().await;

        let mut scored: Vec<(f32, &VectorRecord)> = store
            .values()
            .map(|r| (cosine_similarity(query_embedding, &r.embedding), r))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(similarity, r)| SearchResult {
                id: r.id.clone(),
                document: r.to_document(),
                similarity,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            content: id.to_string(),
            metadata: Map::new(),
            embedding,
        }
    }

    fn sourced(id: &str, source: &str) -> VectorRecord {
        let mut r = record(id, vec![1.0]);
        r.metadata
            .insert("source".to_string(), Value::String(source.to_string()));
        r
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                record("x", vec![1.0, 0.0]),
                record("y", vec![0.0, 1.0]),
                record("xy", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "x");
        assert_eq!(results[1].id, "xy");
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryVectorStore::new();
        store.upsert_batch(&[record("a", vec![1.0])]).await.unwrap();
        store.upsert_batch(&[record("a", vec![0.5])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_source() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                sourced("a0", "https://a.example"),
                sourced("a1", "https://a.example"),
                sourced("b0", "https://b.example"),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_source("https://a.example").await.unwrap(), 2);
        assert_eq!(store.delete_source("https://a.example").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
