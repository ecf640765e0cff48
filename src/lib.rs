//! palank-router - 질문 라우팅 QA 서비스
//!
//! LLM 분류기가 질문을 벡터 저장소(agents, prompt engineering,
//! adversarial attacks 문서) 또는 Wikipedia 검색으로 보내고,
//! 선택된 한 곳의 결과를 HTTP 응답 문자열로 돌려줍니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod knowledge;
pub mod router;
pub mod scraper;
pub mod server;
pub mod wiki;

// Re-exports
pub use config::{AppConfig, VectorBackend};
pub use embedding::{EmbeddingProvider, HuggingFaceEmbedding};
pub use knowledge::{
    AstraVectorStore, Document, Ingestor, LanceVectorStore, MemoryVectorStore, NewDocument,
    Retriever, VectorRetriever, VectorStore,
};
pub use router::{
    Classifier, GroqClassifier, Retrieval, RouteLabel, RoutingWorkflow, Step, Workflow,
    WorkflowState,
};
pub use scraper::{ScrapedContent, WebScraper};
pub use server::{QueryError, QueryResponse, QueryService};
pub use wiki::{ReferenceSearch, WikipediaSearch};
