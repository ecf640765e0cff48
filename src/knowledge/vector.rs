//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! Astra DB(원격)와 LanceDB(로컬) 백엔드가 공통으로 구현하는 인터페이스입니다.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::document::{Document, Metadata};

/// 벡터 임베딩 차원 (all-mpnet-base-v2)
/// source: https://huggingface.co/sentence-transformers/all-mpnet-base-v2
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// Types
// ============================================================================

/// 벡터 레코드 (저장용)
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// 레코드 ID (source + chunk_index 해시)
    pub id: String,
    /// 청크 텍스트
    pub content: String,
    /// 문서 메타데이터
    pub metadata: Metadata,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// 검색 결과용 Document로 변환
    pub fn to_document(&self) -> Document {
        Document::with_metadata(self.content.clone(), self.metadata.clone())
    }

    /// 메타데이터의 `source` (없으면 빈 문자열)
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 레코드 ID
    pub id: String,
    /// 검색된 문서 (메타데이터 포함)
    pub document: Document,
    /// 유사도 스코어 (높을수록 유사)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 레코드 배치 upsert (같은 ID는 덮어쓰기)
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<usize>;

    /// 같은 `source`의 레코드 전체 삭제, 삭제된 개수 반환
    async fn delete_source(&self, source: &str) -> Result<usize>;

    /// 최근접 이웃 검색
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 레코드 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 레코드 ID 생성
///
/// 같은 소스를 다시 수집하면 같은 ID가 나오므로 upsert로 덮어씁니다.
pub fn record_id(source: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"#");
    hasher.update(chunk_index.to_le_bytes());
    let digest = hasher.finalize();

    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// Tests
// ============================================================================
