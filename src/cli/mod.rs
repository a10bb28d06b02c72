//! CLI 모듈
//!
//! pdf-qabot CLI 명령어 정의 및 구현

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::app::AppContext;
use crate::chat::{ChatHistory, ChatMessage, DEMO_WARNING, GREETING};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::embedding::{get_api_key, GeminiEmbedding};
use crate::knowledge::{build_index, IngestOptions, VectorIndex};
use crate::query::render_error;

/// 미리보기 최대 글자 수
const PREVIEW_CHARS: usize = 200;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "pdf-qabot")]
#[command(version, about = "PDF 문서 기반 질의응답 봇", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// data_path의 PDF로 벡터 인덱스 생성 (기존 인덱스 교체)
    Ingest,

    /// 질문 하나에 답변
    Ask {
        /// 질문 (생략 시 표준 입력에서 한 줄 읽음)
        question: Option<String>,
    },

    /// 대화형 질의응답
    Chat,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest => cmd_ingest(&cli.config).await,
        Commands::Ask { question } => cmd_ask(&cli.config, question).await,
        Commands::Chat => cmd_chat(&cli.config).await,
        Commands::Status => cmd_status(&cli.config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱스 생성 명령어 (ingest)
async fn cmd_ingest(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path).context("설정 로드 실패")?;
    let settings = config.ingest_settings().context("인덱싱 설정 확인 실패")?;

    let embedder = GeminiEmbedding::load(
        &settings.embedding_model_name,
        settings.embedding_dimension,
    )
    .context("임베딩 모델 로드 실패")?;

    let options = IngestOptions {
        chunk_size: settings.chunk_size,
        chunk_overlap: settings.chunk_overlap,
        recursive: settings.recursive,
    };

    println!("[*] PDF 로드 중: {}", settings.data_path.display());

    let report = build_index(
        &settings.data_path,
        &settings.vector_store_path,
        &embedder,
        &options,
    )
    .await
    .context("인덱스 생성 실패")?;

    println!("[OK] 문서 {} 건 로드, 청크 {} 개 생성", report.documents, report.chunks);
    println!();

    for (i, chunk) in report.preview.iter().enumerate() {
        println!("--- Chunk {} ---", i + 1);
        println!("{}", truncate_text(chunk, PREVIEW_CHARS));
        println!();
    }

    println!("[OK] 인덱스 저장: {}", report.index_path.display());
    Ok(())
}

/// 단일 질문 명령어 (ask)
async fn cmd_ask(config_path: &Path, question: Option<String>) -> Result<()> {
    let config = Config::load(config_path).context("설정 로드 실패")?;
    let app = AppContext::load(&config)
        .await
        .context("애플리케이션 초기화 실패")?;

    let question = match question {
        Some(q) => q,
        None => {
            print!("Enter your question: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line
        }
    };

    let question = question.trim();
    if question.is_empty() {
        bail!("질문이 비어 있습니다");
    }

    let result = app.ask(question).await;
    println!("{}", render_reply(&result));

    if let Err(e) = result {
        // 에러는 이미 출력됨
        tracing::debug!("Query failed: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// 대화형 명령어 (chat)
async fn cmd_chat(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path).context("설정 로드 실패")?;
    let app = AppContext::load(&config)
        .await
        .context("애플리케이션 초기화 실패")?;

    let mut history = app.new_history();

    println!("[*] /clear: 기록 초기화, /history: 기록 보기, /quit: 종료");

    loop {
        if history.is_empty() {
            println!();
            println!("{}", GREETING);
            println!("[!] {}", DEMO_WARNING);
        }

        print!("\n> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            // EOF
            println!();
            break;
        }

        let input = line.trim();
        match input {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                history.clear();
                println!("[OK] 대화 기록을 지웠습니다");
            }
            "/history" => print_history(&history),
            question => {
                history.append(ChatMessage::user(question));

                let result = app.ask(question).await;
                if let Err(ref e) = result {
                    tracing::warn!("Query failed: {}", e);
                }
                let reply = render_reply(&result);

                println!("{}", reply);
                history.append(ChatMessage::assistant(reply));
            }
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config_path: &Path) -> Result<()> {
    println!("pdf-qabot v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 설정 파일: {}", config_path.display());

    // API 키 상태
    let api_key = get_api_key();
    if api_key.is_some() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("[!] 설정 로드 실패: {}", e);
            return Ok(());
        }
    };

    let settings = match config.query_settings() {
        Ok(settings) => settings,
        Err(e) => {
            println!("[!] 설정 확인 실패: {}", e);
            return Ok(());
        }
    };

    println!("[*] 인덱스 경로: {}", settings.vector_store_path.display());
    println!("[*] LLM: {}", settings.llm_name);

    let embedder = match GeminiEmbedding::with_api_key(
        &settings.embedding_model_name,
        settings.embedding_dimension,
        api_key,
    ) {
        Ok(embedder) => embedder,
        Err(e) => {
            println!("[!] 임베딩 모델 확인 실패: {}", e);
            return Ok(());
        }
    };

    match VectorIndex::open(&settings.vector_store_path, Arc::new(embedder)).await {
        Ok(index) => {
            let manifest = index.manifest();
            match index.count().await {
                Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
                Err(e) => println!("[!] 청크 수 조회 실패: {}", e),
            }
            println!(
                "     임베딩 모델: {} ({} dims)",
                manifest.embedding_model, manifest.dimension
            );
            println!(
                "     생성 시각: {}",
                manifest.created_at.format("%Y-%m-%d %H:%M")
            );
        }
        Err(e) => {
            println!("[!] 인덱스 열기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 답변 또는 사용자용 에러 문자열
fn render_reply(result: &crate::error::Result<String>) -> String {
    match result {
        Ok(answer) => answer.clone(),
        Err(e) => render_error(e),
    }
}

fn print_history(history: &ChatHistory) {
    if history.is_empty() {
        println!("[!] 대화 기록이 없습니다.");
        return;
    }

    for message in history.all() {
        println!("{}", message.render());
    }
}

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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        let truncated = truncate_text(korean, 5);
        assert_eq!(truncated, "안녕하세요...");
    }

    #[test]
    fn test_render_reply() {
        assert_eq!(render_reply(&Ok("Blue.".to_string())), "Blue.");

        let failed = Err(RagError::Generation("timeout".into()));
        assert_eq!(
            render_reply(&failed),
            "An error occurred: Generation failed: timeout"
        );
    }

    #[test]
    fn test_parse_ask_with_config() {
        let cli = Cli::parse_from(["pdf-qabot", "--config", "other.json", "ask", "What?"]);
        assert_eq!(cli.config, PathBuf::from("other.json"));
        assert!(matches!(cli.command, Commands::Ask { question: Some(ref q) } if q == "What?"));
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["pdf-qabot", "chat"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Commands::Chat));

        let cli = Cli::parse_from(["pdf-qabot", "ask"]);
        assert!(matches!(cli.command, Commands::Ask { question: None }));
    }
}
