//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use std::path::Path;

use crate::error::{RagError, Result};

/// 추출된 PDF 텍스트
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfText {
    /// 전체 페이지 수 (빈 페이지 포함)
    pub total_pages: usize,
    /// (페이지 번호, 텍스트), 페이지 번호는 1부터 시작
    pub pages: Vec<(usize, String)>,
}

/// PDF에서 페이지별 텍스트 추출
///
/// 텍스트가 없는 페이지는 건너뛰고, 텍스트가 전혀 없는 PDF(스캔 문서 등)는
/// 빈 목록을 반환합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<PdfText> {
    let bytes = std::fs::read(path)?;

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
        RagError::Extraction {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let total_pages = pages.len();
    let pages = number_pages(pages);
    if pages.is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
    } else {
        tracing::debug!(
            "Extracted {} of {} pages from {:?}",
            pages.len(),
            total_pages,
            path
        );
    }

    Ok(PdfText { total_pages, pages })
}

/// 페이지 번호 부여 (빈 페이지는 번호만 소비)
fn number_pages(pages: Vec<String>) -> Vec<(usize, String)> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text.trim().to_string()))
        .filter(|(_, text)| !text.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
