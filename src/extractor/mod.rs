//! 콘텐츠 추출 모듈
//!
//! 수집된 파일을 수집용 문서(`NewDocument`)로 바꿉니다.
//! - 텍스트: 그대로 읽기
//! - PDF: pdf-extract, 페이지마다 문서 하나

mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::{CollectedFile, FileType};
use crate::knowledge::NewDocument;

/// 파일에서 수집용 문서 추출
///
/// source는 파일 경로, PDF는 `{path}#page={n}` 입니다.
pub async fn extract(file: &CollectedFile) -> Result<Vec<NewDocument>> {
    let source = file.path.to_string_lossy().to_string();
    let title = file
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string());

    match file.file_type {
        FileType::Text => {
            let text = tokio::fs::read_to_string(&file.path)
                .await
                .with_context(|| format!("Failed to read text file: {:?}", file.path))?;
            Ok(vec![NewDocument::new(source, text).with_field("title", title)])
        }
        FileType::Pdf => {
            let pages = extract_pdf(&file.path).await?;
            let total = pages.len();
            Ok(pages
                .into_iter()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(page, text)| {
                    let doc = NewDocument::new(format!("{}#page={}", source, page), text)
                        .with_field("title", title.clone());
                    if total > 1 {
                        doc.with_field("page", Some(page.to_string()))
                    } else {
                        doc
                    }
                })
                .collect())
        }
    }
}

/// PDF 추출은 CPU 바운드이므로 spawn_blocking
async fn extract_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
        .await
        .context("PDF extraction task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.md");
        std::fs::write(&path, "# LLM Powered Autonomous Agents").unwrap();

        let file = CollectedFile {
            path: path.clone(),
            file_type: FileType::Text,
            size: 31,
        };
        let docs = extract(&file).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, path.to_string_lossy());
        assert_eq!(docs[0].content, "# LLM Powered Autonomous Agents");
        assert_eq!(docs[0].metadata["title"], "agents");
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let file = CollectedFile {
            path: "/nonexistent/file.txt".into(),
            file_type: FileType::Text,
            size: 0,
        };
        assert!(extract(&file).await.is_err());
    }
}
