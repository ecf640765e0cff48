//! Text Chunking Module
//!
//! 수집 문서를 벡터 저장소에 넣기 전에 작은 청크로 나눕니다.
//! 분할 우선순위: Markdown 헤더 → 문단 → 줄 → 문자 (UTF-8 경계 유지)

use regex::Regex;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최소 청크 크기 (문자 수, 이보다 작으면 다음 청크와 병합)
    pub min_characters: usize,
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
    /// 오버랩 크기 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    /// 수집용 기본값: 500자, 오버랩 없음
    fn default() -> Self {
        Self {
            min_characters: 100,
            max_characters: 500,
            overlap_characters: 0,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// MarkdownChunker
// ============================================================================

/// Markdown 인식 청커
///
/// 헤더 경계에서 섹션을 나누고, 긴 섹션은 문단/줄/문자 단위로 더 쪼갭니다.
/// 코드 블록 안의 `#` 줄은 헤더로 취급하지 않습니다.
pub struct MarkdownChunker {
    config: ChunkConfig,
    header_re: Regex,
}

impl MarkdownChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let header_re = Regex::new(r"^#{1,6}\s+").expect("Invalid regex");
        Self { config, header_re }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Markdown을 섹션으로 분할
    fn split_sections(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut in_code_block = false;

        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
            }

            if !in_code_block && self.header_re.is_match(line) && !current.trim().is_empty() {
                sections.push(current.trim().to_string());
                current.clear();
            }

            current.push_str(line);
            current.push('\n');
        }

        if !current.trim().is_empty() {
            sections.push(current.trim().to_string());
        }

        sections
    }

    /// 구분자 순서대로 재귀 분할
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let max = self.config.max_characters;
        if char_len(text) <= max {
            return vec![text.to_string()];
        }

        let Some((separator, rest)) = separators.split_first() else {
            return split_by_chars(text, max);
        };

        let mut pieces = Vec::new();
        let mut current = String::new();

        for part in text.split(separator) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            // 조각 자체가 너무 크면 다음 구분자로
            if char_len(part) > max {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                }
                pieces.extend(self.split_recursive(part, rest));
                continue;
            }

            let joined_len = char_len(&current) + separator.chars().count() + char_len(part);
            if !current.is_empty() && joined_len > max {
                pieces.push(std::mem::take(&mut current));
            }

            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(part);
        }

        if !current.is_empty() {
            pieces.push(current);
        }

        pieces
    }

    /// 작은 청크 병합
    fn merge_small_chunks(&self, chunks: Vec<String>) -> Vec<String> {
        if self.config.min_characters == 0 {
            return chunks;
        }

        let mut result: Vec<String> = Vec::new();

        for chunk in chunks {
            if let Some(last) = result.last_mut() {
                if char_len(last) < self.config.min_characters
                    && char_len(last) + char_len(&chunk) + 2 <= self.config.max_characters
                {
                    last.push_str("\n\n");
                    last.push_str(&chunk);
                    continue;
                }
            }
            result.push(chunk);
        }

        result
    }

    /// 이전 청크 끝부분을 다음 청크 앞에 붙임
    fn apply_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        let overlap = self.config.overlap_characters;
        if overlap == 0 || chunks.len() < 2 {
            return chunks;
        }

        let mut result = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                result.push(chunk.clone());
                continue;
            }

            let prev = &chunks[i - 1];
            let skip = char_len(prev).saturating_sub(overlap);
            let tail: String = prev.chars().skip(skip).collect();
            // 단어 중간에서 시작하지 않도록
            let tail = match tail.find(char::is_whitespace) {
                Some(pos) => tail[pos..].trim().to_string(),
                None => tail,
            };

            if tail.is_empty() {
                result.push(chunk.clone());
            } else {
                result.push(format!("{}\n{}", tail, chunk));
            }
        }

        result
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks: Vec<String> = self
            .split_sections(text)
            .into_iter()
            .flat_map(|s| self.split_recursive(&s, &["\n\n", "\n", " "]))
            .collect();

        chunks.retain(|c| !c.trim().is_empty());

        let chunks = self.merge_small_chunks(chunks);
        self.apply_overlap(chunks)
    }

    fn name(&self) -> &'static str {
        "MarkdownChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 문자 단위 강제 분할 (구분자가 없는 긴 토큰용)
fn split_by_chars(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(MarkdownChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================
