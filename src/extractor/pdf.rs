//! PDF 텍스트 추출
//!
//! (페이지 번호, 텍스트) 목록을 반환합니다. 페이지 번호는 1부터 시작합니다.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF: {:?}. It might be a scanned document.", path);
        return Ok(vec![]);
    }

    Ok(split_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, page)| (i + 1, page))
        .collect())
}

/// 폼피드(\x0c) 또는 `--- Page N ---` 구분자로 페이지 분리
fn split_pages(text: &str) -> Vec<String> {
    let pages = non_empty_parts(text.split('\x0c'));
    if pages.len() > 1 {
        return pages;
    }

    let marker = Regex::new(r"(?m)^\s*[-=]+\s*(?:Page\s*)?\d+\s*[-=]+\s*$").expect("Invalid regex");
    let pages = non_empty_parts(marker.split(text));
    if pages.len() > 1 {
        return pages;
    }

    vec![text.trim().to_string()]
}

fn non_empty_parts<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
