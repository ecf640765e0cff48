//! Knowledge 모듈 - 벡터 저장소와 문서 검색
//!
//! - Document: 검색 결과 공통 문서 타입
//! - VectorStore: Astra DB (원격) / LanceDB (로컬) / 메모리 백엔드
//! - Retriever: 질문 임베딩 → 최근접 문서
//! - Ingestor + Chunker: 문서 수집 파이프라인

mod astra;
mod chunker;
mod document;
mod ingest;
mod lance;
mod memory;
mod retriever;
mod vector;

// Re-exports
pub use astra::{AstraConfig, AstraVectorStore};
pub use chunker::{default_chunker, ChunkConfig, Chunker, MarkdownChunker};
pub use document::{Document, Metadata};
pub use ingest::{text_source, Ingestor, NewDocument};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use retriever::{Retriever, VectorRetriever, DEFAULT_TOP_K};
pub use vector::{
    cosine_similarity, record_id, SearchResult, VectorRecord, VectorStore, EMBEDDING_DIMENSION,
};
