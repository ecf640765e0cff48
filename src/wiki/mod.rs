//! Wikipedia 검색 모듈
//!
//! MediaWiki Action API로 상위 문서를 찾고 도입부 요약을 가져옵니다.
//! 결과 형식: `Page: {title}\nSummary: {summary}` (문서 여러 개면 빈 줄로 구분),
//! 최대 글자 수에서 자릅니다.
//!
//! ref: https://www.mediawiki.org/wiki/API:Search
//! ref: https://www.mediawiki.org/wiki/Extension:TextExtracts

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// 검색 결과가 없을 때 반환하는 문구
pub const NO_RESULT: &str = "No good Wikipedia Search Result was found";

/// 검색 쿼리 최대 길이 (문자)
const MAX_QUERY_CHARS: usize = 300;

// ============================================================================
// ReferenceSearch Trait
// ============================================================================

/// 외부 참고 자료 검색 인터페이스
#[async_trait]
pub trait ReferenceSearch: Send + Sync {
    /// 자유 텍스트 질의 → 짧은 텍스트 스니펫
    async fn search(&self, query: &str) -> Result<String>;
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    missing: Option<Value>,
    #[serde(default)]
    extract: Option<String>,
}

// ============================================================================
// WikipediaSearch
// ============================================================================

/// Wikipedia 검색 클라이언트
pub struct WikipediaSearch {
    client: reqwest::Client,
    api_url: Url,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaSearch {
    /// 기본 설정: 영어 위키, 상위 1개, 200자
    pub fn new() -> Result<Self> {
        Self::with_options("en", 1, 200)
    }

    /// 언어/문서 수/최대 글자 수 지정
    pub fn with_options(lang: &str, top_k: usize, max_chars: usize) -> Result<Self> {
        let api_url = Url::parse(&format!("https://{}.wikipedia.org/w/api.php", lang))
            .with_context(|| format!("Invalid Wikipedia language code: {}", lang))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("palank-router/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url,
            top_k: top_k.max(1),
            max_chars,
        })
    }

    /// 제목 검색
    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let query: String = query.chars().take(MAX_QUERY_CHARS).collect();
        let limit = self.top_k.to_string();

        let url = Url::parse_with_params(
            self.api_url.as_str(),
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query.as_str()),
                ("srlimit", limit.as_str()),
                ("srprop", ""),
                ("format", "json"),
            ],
        )?;

        let response: SearchResponse = self
            .client
            .get(url)
            .send()
            .await
            .context("Wikipedia search request failed")?
            .error_for_status()
            .context("Wikipedia search returned an error status")?
            .json()
            .await
            .context("Failed to parse Wikipedia search response")?;

        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default())
    }

    /// 문서 도입부 요약 (없으면 None)
    async fn fetch_summary(&self, title: &str) -> Result<Option<String>> {
        let url = Url::parse_with_params(
            self.api_url.as_str(),
            &[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ],
        )?;

        let response: ExtractResponse = self
            .client
            .get(url)
            .send()
            .await
            .context("Wikipedia extract request failed")?
            .error_for_status()
            .context("Wikipedia extract returned an error status")?
            .json()
            .await
            .context("Failed to parse Wikipedia extract response")?;

        Ok(first_extract(response))
    }
}

/// 응답의 첫 번째 유효 요약
fn first_extract(response: ExtractResponse) -> Option<String> {
    response
        .query?
        .pages
        .into_values()
        .filter(|p| p.missing.is_none())
        .find_map(|p| p.extract.filter(|e| !e.trim().is_empty()))
}

/// 요약 목록을 스니펫으로 결합 후 자르기
fn format_summaries(summaries: &[(String, String)], max_chars: usize) -> String {
    if summaries.is_empty() {
        return NO_RESULT.to_string();
    }

    let joined = summaries
        .iter()
        .map(|(title, summary)| format!("Page: {}\nSummary: {}", title, summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    joined.chars().take(max_chars).collect()
}

#[async_trait]
impl ReferenceSearch for WikipediaSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let titles = self.search_titles(query).await?;
        tracing::debug!("Wikipedia titles for {:?}: {:?}", query, titles);

        let mut summaries = Vec::new();
        for title in titles.into_iter().take(self.top_k) {
            match self.fetch_summary(&title).await? {
                Some(summary) => summaries.push((title, summary)),
                None => tracing::debug!("No extract for Wikipedia page: {}", title),
            }
        }

        Ok(format_summaries(&summaries, self.max_chars))
    }
}

// ============================================================================
// Tests
// ============================================================================
