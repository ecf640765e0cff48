//! 파일 수집 모듈
//!
//! 벡터 저장소에 넣을 로컬 문서(텍스트/PDF)를 찾습니다.
//! 폴더는 `ignore`로 순회하여 .gitignore 패턴을 존중합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

/// 수집 가능한 문서 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 평문 계열 (마크다운, 텍스트, HTML 등)
    Text,
    /// PDF
    Pdf,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "txt" | "rst" | "adoc" | "html" | "htm" | "json" | "csv" => {
                Some(FileType::Text)
            }
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// 수집된 파일
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub file_type: FileType,
    pub size: u64,
}

/// 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 단일 파일 (지원하지 않는 확장자나 크기 초과면 None)
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let path = absolute(path)?;
        if !path.is_file() {
            anyhow::bail!("Not a file: {:?}", path);
        }
        self.inspect(path)
    }

    /// 폴더 재귀 수집
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let root = absolute(path)?;
        if !root.is_dir() {
            anyhow::bail!("Not a directory: {:?}", root);
        }

        let walker = WalkBuilder::new(&root)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match self.inspect(entry.into_path()) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to collect file: {:#}", e),
            }
        }

        // 실행마다 같은 순서로 수집
        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!("Collected {} files from {:?}", files.len(), root);
        Ok(files)
    }

    fn inspect(&self, path: PathBuf) -> Result<Option<CollectedFile>> {
        let Some(file_type) = FileType::from_path(&path) else {
            return Ok(None);
        };

        let size = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?
            .len();

        if self.config.max_file_size > 0 && size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", path, size);
            return Ok(None);
        }

        Ok(Some(CollectedFile {
            path,
            file_type,
            size,
        }))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(path))
    }
}
