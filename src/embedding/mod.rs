//! 임베딩 모듈 - Hugging Face Inference API를 통한 텍스트 벡터화
//!
//! `sentence-transformers/all-mpnet-base-v2` (768차원) feature-extraction
//! 엔드포인트를 호출합니다. 수집(ingest)과 질의 양쪽에서 같은 모델을 사용합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = HuggingFaceEmbedding::new(config.hf_token.clone())?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::knowledge::EMBEDDING_DIMENSION;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Hugging Face Embedding
// ============================================================================

/// 기본 모델
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-mpnet-base-v2";

/// feature-extraction 엔드포인트 (모델 이름이 뒤에 붙음)
/// source: https://huggingface.co/docs/inference-providers/tasks/feature-extraction
const HF_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// Rate Limiter 설정 (무료 티어 기준)
const RATE_LIMIT_RPM: u32 = 120;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 100;
/// 429/503 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;
/// 배치 요청당 최대 입력 수
const BATCH_SIZE: usize = 32;

/// Hugging Face 임베딩 구현체
#[derive(Debug)]
pub struct HuggingFaceEmbedding {
    token: Option<String>,
    url: String,
    model: String,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl HuggingFaceEmbedding {
    /// 새 인스턴스 생성 (기본 모델)
    ///
    /// # Arguments
    /// * `token` - Hugging Face 액세스 토큰 (없으면 익명 호출)
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_model(token, DEFAULT_MODEL)
    }

    /// 모델을 지정하여 생성
    ///
    /// 모델은 768차원 문장 임베딩을 반환해야 합니다.
    pub fn with_model(token: Option<String>, model: &str) -> Result<Self> {
        if model.trim().is_empty() {
            anyhow::bail!("Embedding model name is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            token: token.filter(|t| !t.is_empty()),
            url: format!("{}/{}/pipeline/feature-extraction", HF_INFERENCE_URL, model),
            model: model.to_string(),
            client,
            rate_limiter,
        })
    }

    /// 입력 목록을 한 번의 요청으로 임베딩 (재시도 포함)
    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = FeatureRequest {
            inputs,
            options: FeatureOptions {
                wait_for_model: true,
            },
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let mut builder = self.client.post(&self.url).json(&request);
            if let Some(ref token) = self.token {
                builder = builder.bearer_auth(token);
            }

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = backoff_for(attempt);
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: FeatureResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                return parsed.into_batch(inputs.len());
            }

            // 429 (rate limit) / 503 (모델 로딩 중) - 재시도
            if status.as_u16() == 429 || status.as_u16() == 503 {
                let backoff = backoff_for(attempt);
                tracing::warn!(
                    "Embedding endpoint busy ({}), backing off {:?} (attempt {}/{})",
                    status,
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Embedding endpoint busy ({})", status));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<HfError>(&body) {
                    anyhow::bail!("Hugging Face API error ({}): {}", status, error.error);
                }
                anyhow::bail!("Hugging Face API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

/// feature-extraction 요청 본문
#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    inputs: &'a [String],
    options: FeatureOptions,
}

#[derive(Debug, Serialize)]
struct FeatureOptions {
    wait_for_model: bool,
}

/// feature-extraction 응답 (입력 형태에 따라 1차원 또는 2차원)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Single(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

impl FeatureResponse {
    fn into_batch(self, expected: usize) -> Result<Vec<Vec<f32>>> {
        let batch = match self {
            FeatureResponse::Single(v) => vec![v],
            FeatureResponse::Batch(b) => b,
        };

        if batch.len() != expected {
            anyhow::bail!(
                "Embedding count mismatch: expected {}, got {}",
                expected,
                batch.len()
            );
        }

        Ok(batch)
    }
}

/// Hugging Face 에러 응답
#[derive(Debug, Deserialize)]
struct HfError {
    error: String,
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension()]);
        }

        let mut batch = self.request(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, chunk) in texts.chunks(BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{}",
                i + 1,
                texts.len().div_ceil(BATCH_SIZE)
            );
            results.extend(self.request(chunk).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION as usize
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_includes_model() {
        let embedder = HuggingFaceEmbedding::new(None).unwrap();
        assert!(embedder
            .url
            .ends_with("sentence-transformers/all-mpnet-base-v2/pipeline/feature-extraction"));
        assert_eq!(embedder.name(), DEFAULT_MODEL);
        assert_eq!(embedder.dimension(), 768);
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let embedder = HuggingFaceEmbedding::new(Some(String::new())).unwrap();
        assert!(embedder.token.is_none());
    }

    #[test]
    fn test_empty_model_rejected() {
        assert!(HuggingFaceEmbedding::with_model(None, " ").is_err());
    }

    #[test]
    fn test_parse_single_and_batch() {
        let single: FeatureResponse = serde_json::from_str("[0.1, 0.2, 0.3]").unwrap();
        let batch = single.into_batch(1).unwrap();
        assert_eq!(batch, vec![vec![0.1, 0.2, 0.3]]);

        let many: FeatureResponse = serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(many.into_batch(2).unwrap().len(), 2);
    }

    #[test]
    fn test_count_mismatch() {
        let many: FeatureResponse = serde_json::from_str("[[0.1], [0.2]]").unwrap();
        let err = many.into_batch(3).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_for(0), Duration::from_millis(2000));
        assert_eq!(backoff_for(2), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HuggingFaceEmbedding::new(None).unwrap();
        let embedding = embedder.embed("   ").await.unwrap();
        assert_eq!(embedding.len(), 768);
        assert!(embedding.iter().all(|v| *v == 0.0));
    }
}
