//! 문서 로드 모듈
//!
//! 디렉토리에서 PDF 파일을 찾아 페이지 단위 [`Document`]로 읽어옵니다.
//! - 확장자 필터: `.pdf` (대소문자 무시)
//! - 기본은 최상위 디렉토리만, 설정 시 재귀 탐색

pub mod pdf;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{RagError, Result};

// ============================================================================
// Document
// ============================================================================

/// 로드된 문서 (PDF 한 페이지)
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 원본 파일 경로
    pub source: PathBuf,
    /// 페이지 텍스트
    pub text: String,
    /// 메타데이터
    pub metadata: DocumentMetadata,
}

/// 문서 메타데이터
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    /// 페이지 번호 (1부터 시작)
    pub page_number: Option<usize>,
    /// 총 페이지 수
    pub total_pages: Option<usize>,
}

impl Document {
    /// 메타데이터 없이 생성
    pub fn new(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            metadata: DocumentMetadata::default(),
        }
    }
}

// ============================================================================
// PDF Loader
// ============================================================================

/// PDF 디렉토리 로더
#[derive(Debug, Clone, Default)]
pub struct PdfLoader {
    /// 하위 디렉토리까지 탐색할지 여부
    pub recursive: bool,
}

impl PdfLoader {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// 디렉토리에서 PDF 파일 경로 수집 (정렬됨)
    pub fn collect(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(RagError::NotFound(dir.to_path_buf()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).max_depth(max_depth) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && is_pdf(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        tracing::info!("Collected {} PDF files from {:?}", files.len(), dir);
        Ok(files)
    }
}

/// PDF 파일 하나를 페이지별 문서로 로드
pub fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let extracted = pdf::extract_text_from_pdf(path)?;
    let total_pages = extracted.total_pages;

    Ok(extracted
        .pages
        .into_iter()
        .map(|(page_number, text)| Document {
            source: path.to_path_buf(),
            text,
            metadata: DocumentMetadata {
                page_number: Some(page_number),
                total_pages: Some(total_pages),
            },
        })
        .collect())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
