//! CLI 모듈
//!
//! palank-router 명령어 정의 및 구현

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{CollectedFile, FileCollector, FileType};
use crate::config::AppConfig;
use crate::extractor;
use crate::knowledge::{Ingestor, NewDocument};
use crate::router::Workflow;
use crate::scraper::WebScraper;
use crate::server::{self, extract_response, QueryService};

// ============================================================================
// CLI Definition
// ============================================================================

const BACKEND_HELP: &str = "VECTOR_BACKEND: astra (기본), lance (로컬), \
memory (비영속, 테스트 전용이라 serve/ask/ingest에서 거부)";

#[derive(Parser)]
#[command(name = "palank-router")]
#[command(version, about = "질문 라우팅 QA 서비스 (벡터 저장소 / Wikipedia)", long_about = None)]
#[command(after_help = BACKEND_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행 (영속 벡터 저장소 필요)
    Serve {
        /// 바인딩 주소
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// 포트
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },

    /// 질문 하나를 워크플로우로 실행
    Ask {
        /// 질문
        question: String,
    },

    /// URL, 텍스트, 파일, 또는 폴더를 벡터 저장소에 추가
    Ingest {
        /// 수집할 URL
        #[arg(short, long)]
        url: Option<String>,

        /// 직접 입력할 텍스트
        #[arg(short, long)]
        text: Option<String>,

        /// 수집할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// description 메타데이터 (질의 응답으로 반환되는 문자열)
        #[arg(long)]
        description: Option<String>,
    },

    /// 설정 및 벡터 저장소 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(&config, &host, port).await,
        Commands::Ask { question } => cmd_ask(&config, &question).await,
        Commands::Ingest {
            url,
            text,
            file,
            dir,
            description,
        } => cmd_ingest(&config, url, text, file, dir, description).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 실행 (serve)
async fn cmd_serve(config: &AppConfig, host: &str, port: u16) -> Result<()> {
    config.require_persistent_backend()?;

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address: {}:{}", host, port))?;

    let workflow = config
        .build_workflow()
        .await
        .context("워크플로우 초기화 실패")?;
    let service = Arc::new(QueryService::new(Arc::new(workflow)));
    let app = server::app(service, &config.cors_origin)?;

    server::serve(addr, app).await
}

/// 단일 질의 (ask)
///
/// 선택된 경로와 응답 문자열을 출력합니다.
async fn cmd_ask(config: &AppConfig, question: &str) -> Result<()> {
    config.require_persistent_backend()?;

    let workflow = config
        .build_workflow()
        .await
        .context("워크플로우 초기화 실패")?;

    let steps = workflow.stream(question).await?;
    let Some(last) = steps.last() else {
        bail!("No response generated");
    };

    println!("[*] Route: {}", last.node);
    println!();
    println!("{}", extract_response(&last.state));

    Ok(())
}

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(
    config: &AppConfig,
    url: Option<String>,
    text: Option<String>,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    description: Option<String>,
) -> Result<()> {
    config.require_persistent_backend()?;

    // 입력 소스 → 수집용 문서
    let docs: Vec<NewDocument> = if let Some(ref url_str) = url {
        println!("[*] URL 스크래핑 중: {}", url_str);
        let scraper = WebScraper::new().context("WebScraper 생성 실패")?;
        let scraped = scraper
            .scrape(url_str)
            .await
            .context("URL 스크래핑 실패")?;
        vec![scraped.into_document()]
    } else if let Some(text_content) = text {
        vec![NewDocument::from_text(text_content)]
    } else if file.is_some() || dir.is_some() {
        let files = collect_files(file, dir)?;
        if files.is_empty() {
            println!("[!] 수집할 파일이 없습니다.");
            return Ok(());
        }
        print_collection(&files);

        let mut docs = Vec::new();
        for collected in &files {
            match extractor::extract(collected).await {
                Ok(mut extracted) => docs.append(&mut extracted),
                Err(e) => println!("[!] 추출 실패 {:?}: {:#}", collected.path, e),
            }
        }
        docs
    } else {
        bail!("--url, --text, --file, --dir 중 하나를 지정해야 합니다");
    };

    // --description은 문서 자체의 값보다 우선
    let docs: Vec<NewDocument> = docs
        .into_iter()
        .map(|doc| doc.with_field("description", description.clone()))
        .collect();

    let store = config.open_vector_store().await?;
    let ingestor = Ingestor::new(config.embedder()?, store.clone());

    println!("[*] 청크 임베딩 및 저장 중 ({})...", store.name());

    let mut total_chunks = 0;
    let mut error_count = 0;
    for (i, doc) in docs.into_iter().enumerate() {
        let source = doc.source.clone();
        match ingestor.add_document(doc).await {
            Ok(n) => {
                println!("  [{}] {} ({} chunks)", i + 1, truncate_text(&source, 80), n);
                total_chunks += n;
            }
            Err(e) => {
                println!("  [{}] {} 실패: {:#}", i + 1, truncate_text(&source, 80), e);
                error_count += 1;
            }
        }
    }

    println!();
    println!("[OK] 완료: {} 청크 저장, 실패 {}", total_chunks, error_count);
    Ok(())
}

fn collect_files(file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<Vec<CollectedFile>> {
    let collector = FileCollector::with_defaults();

    if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => Ok(vec![f]),
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                Ok(vec![])
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    }
}

fn print_collection(files: &[CollectedFile]) {
    let pdf_files = files.iter().filter(|f| f.file_type == FileType::Pdf).count();
    let total_size: u64 = files.iter().map(|f| f.size).sum();

    println!("[*] 수집 대상: {} 파일", files.len());
    println!("    텍스트: {}, PDF: {}", files.len() - pdf_files, pdf_files);
    println!("    총 크기: {}", format_bytes(total_size as usize));
}

/// 상태 명령어 (status)
async fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("palank-router v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if config.backend.is_persistent() {
        println!("[*] 벡터 저장소: {}", config.backend.as_str());
    } else {
        println!(
            "[!] 벡터 저장소: {} (비영속, 테스트 전용; serve/ask/ingest 불가)",
            config.backend.as_str()
        );
    }
    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 분류 모델: {}", config.groq_model);
    println!("[*] CORS origin: {}", config.cors_origin);

    if config.groq_api_key.is_some() {
        println!("[OK] GROQ_API_KEY: 설정됨");
    } else {
        println!("[!] GROQ_API_KEY: 미설정");
    }

    if config.hf_token.is_some() {
        println!("[OK] HF_TOKEN: 설정됨");
    } else {
        println!("[!] HF_TOKEN: 미설정 (익명 호출, 제한이 낮음)");
    }

    match config.open_vector_store().await {
        Ok(store) => match store.count().await {
            Ok(count) => println!("[OK] 저장된 청크: {} 건", count),
            Err(e) => println!("[!] 청크 수 조회 실패: {:#}", e),
        },
        Err(e) => println!("[!] 벡터 저장소 열기 실패: {:#}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
