//! 설정 모듈
//!
//! 환경변수(및 작업 디렉토리의 `.env`)에서 서비스 설정을 읽고,
//! 시작 시 한 번 공유 협력자(임베딩, 벡터 저장소, 분류기, 위키 검색)를 구성합니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::{EmbeddingProvider, HuggingFaceEmbedding};
use crate::knowledge::{
    AstraConfig, AstraVectorStore, LanceVectorStore, MemoryVectorStore, VectorRetriever,
    VectorStore,
};
use crate::router::{GroqClassifier, RoutingWorkflow, DEFAULT_GROQ_MODEL};
use crate::wiki::WikipediaSearch;

/// 기본 Astra 리전
pub const DEFAULT_ASTRA_REGION: &str = "us-east-2";
/// 기본 키스페이스
pub const DEFAULT_KEYSPACE: &str = "default_keyspace";
/// 기본 컬렉션 (Astra 컬렉션, Lance 테이블 이름)
pub const DEFAULT_COLLECTION: &str = "qa_mini_demo";
/// 허용 CORS origin
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.palank-router/)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".palank-router")
}

// ============================================================================
// Vector Backend
// ============================================================================

/// 벡터 저장소 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// Astra DB Data API (원격)
    Astra,
    /// 로컬 LanceDB
    Lance,
    /// 프로세스 메모리 (비영속, 테스트용)
    Memory,
}

impl VectorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackend::Astra => "astra",
            VectorBackend::Lance => "lance",
            VectorBackend::Memory => "memory",
        }
    }

    /// 프로세스 종료 후에도 데이터가 남는지 여부
    pub fn is_persistent(&self) -> bool {
        !matches!(self, VectorBackend::Memory)
    }
}

impl FromStr for VectorBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "astra" => Ok(VectorBackend::Astra),
            "lance" => Ok(VectorBackend::Lance),
            "memory" => Ok(VectorBackend::Memory),
            other => anyhow::bail!(
                "Unknown VECTOR_BACKEND '{}' (expected astra, lance or memory)",
                other
            ),
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// 서비스 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: VectorBackend,
    pub astra_token: Option<String>,
    pub astra_db_id: Option<String>,
    pub astra_region: String,
    pub astra_endpoint: Option<String>,
    pub keyspace: String,
    pub collection: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub hf_token: Option<String>,
    pub data_dir: PathBuf,
    pub cors_origin: String,
}

impl AppConfig {
    /// `.env` 로드 후 프로세스 환경변수에서 읽기
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to load .env file"),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 임의의 조회 함수로 설정 구성 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backend = match get("VECTOR_BACKEND") {
            Some(value) => value.parse()?,
            None => VectorBackend::Astra,
        };

        Ok(Self {
            backend,
            astra_token: get("ASTRA_DB_APPLICATION_TOKEN"),
            astra_db_id: get("ASTRA_DB_ID"),
            astra_region: get("ASTRA_DB_REGION").unwrap_or_else(|| DEFAULT_ASTRA_REGION.to_string()),
            astra_endpoint: get("ASTRA_DB_API_ENDPOINT"),
            keyspace: get("ASTRA_DB_KEYSPACE").unwrap_or_else(|| DEFAULT_KEYSPACE.to_string()),
            collection: get("ASTRA_DB_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            groq_api_key: get("GROQ_API_KEY"),
            groq_model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            hf_token: get("HF_TOKEN").or_else(|| get("HUGGINGFACEHUB_API_TOKEN")),
            data_dir: get("PALANK_ROUTER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
        })
    }

    /// Astra 접속 설정 (토큰과 엔드포인트 또는 DB ID 필요)
    pub fn astra_config(&self) -> Result<AstraConfig> {
        let token = self
            .astra_token
            .clone()
            .context("ASTRA_DB_APPLICATION_TOKEN is not set")?;

        let endpoint = match (&self.astra_endpoint, &self.astra_db_id) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(db_id)) => AstraConfig::endpoint_for(db_id, &self.astra_region),
            (None, None) => anyhow::bail!("ASTRA_DB_ID or ASTRA_DB_API_ENDPOINT must be set"),
        };

        Ok(AstraConfig {
            endpoint,
            token,
            keyspace: self.keyspace.clone(),
            collection: self.collection.clone(),
        })
    }

    /// 로컬 LanceDB 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }

    pub fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let embedder = HuggingFaceEmbedding::new(self.hf_token.clone())
            .context("Failed to create embedding client")?;
        Ok(Arc::new(embedder))
    }

    /// 설정된 벡터 저장소 열기 (Astra는 컬렉션이 없으면 생성)
    pub async fn open_vector_store(&self) -> Result<Arc<dyn VectorStore>> {
        let store: Arc<dyn VectorStore> = match self.backend {
            VectorBackend::Astra => {
                let store = AstraVectorStore::new(self.astra_config()?)?;
                store
                    .ensure_collection()
                    .await
                    .context("Failed to prepare Astra DB collection")?;
                Arc::new(store)
            }
            VectorBackend::Lance => Arc::new(
                LanceVectorStore::open(&self.lance_path(), &self.collection).await?,
            ),
            VectorBackend::Memory => {
                tracing::warn!("Using in-memory vector store; documents are not persisted");
                Arc::new(MemoryVectorStore::new())
            }
        };

        tracing::info!("Vector store: {}", store.name());
        Ok(store)
    }

    /// 영속 백엔드 확인
    ///
    /// `ingest`는 별도 프로세스이므로 메모리 저장소로는 `serve`/`ask`가
    /// 항상 빈 저장소를 보게 됩니다.
    pub fn require_persistent_backend(&self) -> Result<()> {
        if !self.backend.is_persistent() {
            anyhow::bail!(
                "VECTOR_BACKEND={} is not persistent and only usable in tests; use astra or lance",
                self.backend.as_str()
            );
        }
        Ok(())
    }

    /// 라우팅 워크플로우 구성
    pub async fn build_workflow(&self) -> Result<RoutingWorkflow> {
        let api_key = self
            .groq_api_key
            .clone()
            .context("GROQ_API_KEY is not set")?;
        let classifier = GroqClassifier::new(api_key, self.groq_model.clone())?;

        let retriever = VectorRetriever::new(self.embedder()?, self.open_vector_store().await?);
        let reference = WikipediaSearch::new()?;

        Ok(RoutingWorkflow::new(
            Arc::new(classifier),
            Arc::new(retriever),
            Arc::new(reference),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
