//! Astra DB Vector Store - Data API 클라이언트
//!
//! DataStax Astra DB의 JSON Data API로 벡터 컬렉션을 조회/저장합니다.
//! 기본 백엔드이며, 애플리케이션 토큰과 데이터베이스 ID가 필요합니다.
//!
//! ref: https://docs.datastax.com/en/astra-db-serverless/api-reference/dataapiclient.html

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::document::{Document, Metadata};
use super::vector::{SearchResult, VectorRecord, VectorStore, EMBEDDING_DIMENSION};

/// insertMany 한 번에 보낼 최대 문서 수 (Data API 제한)
const INSERT_CHUNK_SIZE: usize = 20;

// ============================================================================
// Config
// ============================================================================

/// Astra DB 접속 설정
#[derive(Debug, Clone)]
pub struct AstraConfig {
    /// API 엔드포인트 (https://{db_id}-{region}.apps.astra.datastax.com)
    pub endpoint: String,
    /// 애플리케이션 토큰 (AstraCS:...)
    pub token: String,
    /// 키스페이스
    pub keyspace: String,
    /// 컬렉션 이름
    pub collection: String,
}

impl AstraConfig {
    /// 데이터베이스 ID와 리전으로 엔드포인트 구성
    pub fn endpoint_for(database_id: &str, region: &str) -> String {
        format!("https://{}-{}.apps.astra.datastax.com", database_id, region)
    }

    fn keyspace_url(&self) -> String {
        format!(
            "{}/api/json/v1/{}",
            self.endpoint.trim_end_matches('/'),
            self.keyspace
        )
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.keyspace_url(), self.collection)
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Data API 공통 응답
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    status: Option<Map<String, Value>>,
    #[serde(default)]
    errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(default)]
    documents: Vec<StoredDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
}

/// 컬렉션에 저장된 문서
#[derive(Debug, Deserialize)]
struct StoredDocument {
    #[serde(rename = "_id")]
    id: Value,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default, rename = "$similarity")]
    similarity: Option<f32>,
}

impl From<StoredDocument> for SearchResult {
    fn from(doc: StoredDocument) -> Self {
        let id = match doc.id {
            Value::String(s) => s,
            other => other.to_string(),
        };

        SearchResult {
            id,
            document: Document::with_metadata(doc.content, doc.metadata),
            similarity: doc.similarity.unwrap_or(0.0),
        }
    }
}

// ============================================================================
// AstraVectorStore
// ============================================================================

/// Astra DB 벡터 저장소 구현
pub struct AstraVectorStore {
    config: AstraConfig,
    client: reqwest::Client,
}

impl AstraVectorStore {
    /// 새 저장소 클라이언트 생성
    pub fn new(config: AstraConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            anyhow::bail!("Astra DB application token is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    /// 컬렉션 생성 (이미 있으면 그대로 사용)
    pub async fn ensure_collection(&self) -> Result<()> {
        let body = json!({
            "createCollection": {
                "name": self.config.collection,
                "options": {
                    "vector": {
                        "dimension": EMBEDDING_DIMENSION,
                        "metric": "cosine"
                    }
                }
            }
        });

        self.post(&self.config.keyspace_url(), &body)
            .await
            .context("Failed to create Astra DB collection")?;

        tracing::debug!("Astra DB collection ready: {}", self.config.collection);
        Ok(())
    }

    /// Data API 명령 전송
    async fn post(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        let response = self
            .client
            .post(url)
            .header("Token", &self.config.token)
            .json(body)
            .send()
            .await
            .context("Failed to send Astra DB request")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Astra DB response body")?;

        if !status.is_success() {
            anyhow::bail!("Astra DB error ({}): {}", status, text);
        }

        parse_response(&text)
    }
}

/// 응답 본문 파싱 (errors 필드가 있으면 실패)
fn parse_response(body: &str) -> Result<ApiResponse> {
    let parsed: ApiResponse =
        serde_json::from_str(body).context("Failed to parse Astra DB response")?;

    if let Some(errors) = parsed.errors.as_ref().filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| match &e.error_code {
                Some(code) => format!("{} ({})", e.message, code),
                None => e.message.clone(),
            })
            .collect();
        anyhow::bail!("Astra DB error: {}", messages.join("; "));
    }

    Ok(parsed)
}

/// deleteMany 응답의 (deletedCount, moreData)
fn delete_progress(response: &ApiResponse) -> (usize, bool) {
    let status = response.status.as_ref();
    let count = status
        .and_then(|s| s.get("deletedCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let more = status
        .and_then(|s| s.get("moreData"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    (count as usize, more)
}

#[async_trait]
impl VectorStore for AstraVectorStore {
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = self.config.collection_url();

        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let ids: Vec<&str> = chunk.iter().map(|r| r.id.as_str()).collect();

            // 같은 ID 먼저 삭제 후 삽입
            let delete = json!({ "deleteMany": { "filter": { "_id": { "$in": ids } } } });
            self.post(&url, &delete)
                .await
                .context("Failed to delete existing documents")?;

            let documents: Vec<Value> = chunk
                .iter()
                .map(|r| {
                    json!({
                        "_id": r.id,
                        "content": r.content,
                        "metadata": r.metadata,
                        "$vector": r.embedding,
                    })
                })
                .collect();

            let insert = json!({
                "insertMany": {
                    "documents": documents,
                    "options": { "ordered": false }
                }
            });
            self.post(&url, &insert)
                .await
                .context("Failed to insert documents")?;
        }

        Ok(records.len())
    }

    async fn delete_source(&self, source: &str) -> Result<usize> {
        let url = self.config.collection_url();
        let body = json!({ "deleteMany": { "filter": { "metadata.source": source } } });

        // 한 번에 다 지워지지 않으면 moreData가 true로 옴
        let mut deleted = 0;
        loop {
            let response = self
                .post(&url, &body)
                .await
                .context("Failed to delete source documents")?;

            let (count, more) = delete_progress(&response);
            deleted += count;
            if !more {
                break;
            }
        }

        Ok(deleted)
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let body = json!({
            "find": {
                "sort": { "$vector": query_embedding },
                "projection": { "content": 1, "metadata": 1 },
                "options": { "limit": limit, "includeSimilarity": true }
            }
        });

        let response = self
            .post(&self.config.collection_url(), &body)
            .await
            .context("Astra DB vector search failed")?;

        Ok(response
            .data
            .map(|d| d.documents.into_iter().map(SearchResult::from).collect())
            .unwrap_or_default())
    }

    async fn count(&self) -> Result<usize> {
        let body = json!({ "countDocuments": {} });
        let response = self
            .post(&self.config.collection_url(), &body)
            .await
            .context("Astra DB count failed")?;

        let count = response
            .status
            .as_ref()
            .and_then(|s| s.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("Missing count in Astra DB response"))?;

        Ok(count as usize)
    }

    fn name(&self) -> &str {
        "astra"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AstraConfig {
        AstraConfig {
            endpoint: "https://db-id-us-east-2.apps.astra.datastax.com/".to_string(),
            token: "AstraCS:fake".to_string(),
            keyspace: "default_keyspace".to_string(),
            collection: "qa_mini_demo".to_string(),
        }
    }

    #[test]
    fn test_endpoint_for() {
        assert_eq!(
            AstraConfig::endpoint_for("1234", "us-east-2"),
            "https://1234-us-east-2.apps.astra.datastax.com"
        );
    }

    #[test]
    fn test_collection_url_trims_slash() {
        assert_eq!(
            test_config().collection_url(),
            "https://db-id-us-east-2.apps.astra.datastax.com/api/json/v1/default_keyspace/qa_mini_demo"
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut config = test_config();
        config.token = "  ".to_string();
        assert!(AstraVectorStore::new(config).is_err());
    }

    #[test]
    fn test_parse_find_response() {
        let body = r#"{
            "data": {
                "documents": [
                    {
                        "_id": "abc",
                        "content": "Prompt engineering is ...",
                        "metadata": {"description": "Technique for designing LLM inputs."},
                        "$similarity": 0.91
                    }
                ],
                "nextPageState": null
            }
        }"#;

        let response = parse_response(body).unwrap();
        let results: Vec<SearchResult> = response
            .data
            .unwrap()
            .documents
            .into_iter()
            .map(SearchResult::from)
            .collect();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "abc");
        assert!((results[0].similarity - 0.91).abs() < 1e-6);
        assert_eq!(
            results[0].document.description().as_deref(),
            Some("Technique for designing LLM inputs.")
        );
    }

    #[test]
    fn test_delete_progress() {
        let partial = parse_response(r#"{"status": {"deletedCount": 20, "moreData": true}}"#).unwrap();
        assert_eq!(delete_progress(&partial), (20, true));

        let done = parse_response(r#"{"status": {"deletedCount": 3}}"#).unwrap();
        assert_eq!(delete_progress(&done), (3, false));

        let empty = parse_response(r#"{"status": {"deletedCount": 0}}"#).unwrap();
        assert_eq!(delete_progress(&empty), (0, false));
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"errors": [{"message": "Collection does not exist", "errorCode": "COLLECTION_NOT_EXIST"}]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("Collection does not exist"));
        assert!(err.to_string().contains("COLLECTION_NOT_EXIST"));
    }

    #[test]
    fn test_stored_document_missing_metadata_defaults() {
        let body = r#"{"data": {"documents": [{"_id": 7, "content": "x"}]}}"#;
        let response = parse_response(body).unwrap();
        let result = SearchResult::from(response.data.unwrap().documents.remove(0));

        assert_eq!(result.id, "7");
        // 벡터 저장소 문서는 항상 메타데이터 맵을 가짐
        assert!(result.document.has_metadata());
        assert!(result.document.description().is_none());
    }
}
