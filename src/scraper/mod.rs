//! 웹 스크래퍼 모듈 - URL 콘텐츠 추출
//!
//! 수집할 웹 페이지에서 본문과 메타데이터(title, description, language)를 뽑습니다.
//! description은 질의 응답 문자열로 그대로 쓰이므로 `<meta name="description">`을
//! 우선하고, 없으면 `og:description`을 사용합니다.

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::knowledge::NewDocument;

/// 스크랩된 콘텐츠
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    /// 원본 URL
    pub url: String,
    /// 페이지 제목
    pub title: Option<String>,
    /// 메타 설명
    pub description: Option<String>,
    /// `<html lang>` 값
    pub language: Option<String>,
    /// 본문 텍스트 (HTML 태그 제거됨)
    pub content: String,
}

impl ScrapedContent {
    /// 수집용 문서로 변환 (메타데이터: source, title, description, language)
    pub fn into_document(self) -> NewDocument {
        NewDocument::new(self.url, self.content)
            .with_field("title", self.title)
            .with_field("description", self.description)
            .with_field("language", self.language)
    }
}

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
    whitespace_re: Regex,
}

impl WebScraper {
    /// 새 스크래퍼 생성
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("palank-router/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let whitespace_re = Regex::new(r"\s+").context("Invalid whitespace regex")?;

        Ok(Self {
            client,
            whitespace_re,
        })
    }

    /// URL에서 콘텐츠 추출
    pub async fn scrape(&self, url: &str) -> Result<ScrapedContent> {
        tracing::info!("Scraping: {}", url);

        let html = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?
            .error_for_status()
            .context("HTTP error status")?
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(self.parse(url, &html))
    }

    /// HTML 문자열 파싱
    pub fn parse(&self, url: &str, html: &str) -> ScrapedContent {
        let document = Html::parse_document(html);

        ScrapedContent {
            url: url.to_string(),
            title: self.extract_title(&document),
            description: self.extract_description(&document),
            language: self.extract_language(&document),
            content: self.extract_content(&document),
        }
    }

    /// 제목 추출 (`<title>` → `<h1>`)
    fn extract_title(&self, document: &Html) -> Option<String> {
        ["title", "h1"].iter().find_map(|sel| {
            let selector = Selector::parse(sel).ok()?;
            let element = document.select(&selector).next()?;
            non_empty(self.normalize(&element.text().collect::<String>()))
        })
    }

    /// 메타 설명 추출
    fn extract_description(&self, document: &Html) -> Option<String> {
        [
            r#"meta[name="description"]"#,
            r#"meta[property="og:description"]"#,
        ]
        .iter()
        .find_map(|sel| {
            let selector = Selector::parse(sel).ok()?;
            let element = document.select(&selector).next()?;
            non_empty(self.normalize(element.value().attr("content")?))
        })
    }

    /// 문서 언어 추출
    fn extract_language(&self, document: &Html) -> Option<String> {
        let selector = Selector::parse("html").ok()?;
        let element = document.select(&selector).next()?;
        non_empty(element.value().attr("lang")?.trim().to_string())
    }

    /// 본문 추출 (article > main > body)
    fn extract_content(&self, document: &Html) -> String {
        let selectors = [
            "article",
            "main",
            "[role=main]",
            ".content",
            "#content",
            "body",
        ];

        for selector_str in selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(element) = document.select(&selector).next() {
                    let text = self.extract_text_from_element(&element);
                    if text.len() > 100 {
                        return text;
                    }
                }
            }
        }

        // 폴백: 짧더라도 body 전체
        Selector::parse("body")
            .ok()
            .and_then(|s| document.select(&s).next().map(|e| self.extract_text_from_element(&e)))
            .unwrap_or_default()
    }

    /// 요소에서 텍스트 추출 (script/style 제외)
    fn extract_text_from_element(&self, element: &ElementRef) -> String {
        let mut text = String::new();

        for node in element.descendants() {
            let Some(t) = node.value().as_text() else {
                continue;
            };

            let inside_code = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| matches!(e.name(), "script" | "style" | "noscript"))
                    .unwrap_or(false)
            });
            if inside_code {
                continue;
            }

            let trimmed = t.trim();
            if !trimmed.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(trimmed);
            }
        }

        self.normalize(&text)
    }

    /// 연속 공백 정리
    fn normalize(&self, text: &str) -> String {
        self.whitespace_re.replace_all(text, " ").trim().to_string()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html lang="en">
            <head>
                <title>Prompt Engineering | Lil'Log</title>
                <meta name="description" content="Prompt Engineering, also known as In-Context Prompting, refers to methods for how to communicate with LLM.">
                <style>body { color: red; }</style>
            </head>
            <body>
                <nav>Navigation menu</nav>
                <article>
                    Prompt engineering is an empirical science and the effect of prompt
                    engineering methods can vary a lot among models.
                    <script>var tracking = true;</script>
                    It requires heavy experimentation and heuristics.
                </article>
            </body>
        </html>
    "#;

    #[test]
    fn test_parse_metadata() {
        let scraper = WebScraper::new().expect("scraper creation failed");
        let scraped = scraper.parse("https://lilianweng.github.io/posts/2023-03-15-prompt-engineering/", PAGE);

        assert_eq!(scraped.title.as_deref(), Some("Prompt Engineering | Lil'Log"));
        assert!(scraped
            .description
            .as_deref()
            .unwrap_or_default()
            .starts_with("Prompt Engineering, also known as"));
        assert_eq!(scraped.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_content_from_article_without_scripts() {
        let scraper = WebScraper::new().expect("scraper creation failed");
        let scraped = scraper.parse("https://example.com", PAGE);

        assert!(scraped.content.contains("empirical science"));
        assert!(!scraped.content.contains("tracking"));
        assert!(!scraped.content.contains("Navigation"));
    }

    #[test]
    fn test_title_h1_fallback_and_og_description() {
        let scraper = WebScraper::new().expect("scraper creation failed");
        let html = r#"
            <html>
                <head><title></title><meta property="og:description" content="  OG   text "></head>
                <body><h1>H1 Heading</h1></body>
            </html>
        "#;
        let scraped = scraper.parse("https://example.com", html);

        assert_eq!(scraped.title.as_deref(), Some("H1 Heading"));
        assert_eq!(scraped.description.as_deref(), Some("OG text"));
        assert!(scraped.language.is_none());
    }

    #[test]
    fn test_into_document_metadata() {
        let scraper = WebScraper::new().expect("scraper creation failed");
        let doc = scraper.parse("https://example.com/p", PAGE).into_document();

        assert_eq!(doc.source, "https://example.com/p");
        assert!(doc.metadata.contains_key("description"));
        assert_eq!(doc.metadata["language"], "en");
    }
}
