//! Text Chunking Module
//!
//! 재귀적 경계 탐색 분할기를 제공합니다.
//! 문단 → 줄 → 문장 → 단어 → 문자 순서로 자를 위치를 찾고,
//! 인접 청크는 정확히 `chunk_overlap` 문자를 공유합니다.

use std::path::PathBuf;

use crate::error::{RagError, Result};
use crate::extractor::Document;

/// 우선순위별 구분자 (같은 단계 안에서는 가장 뒤쪽 위치 사용)
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

// ============================================================================
// Chunk
// ============================================================================

/// 분할된 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 텍스트 (원문의 연속 부분 문자열)
    pub text: String,
    /// 원본 파일 경로
    pub source: PathBuf,
    /// 원본 페이지 번호
    pub page_number: Option<usize>,
    /// 문서 내 청크 인덱스 (0-based)
    pub chunk_index: usize,
}

// ============================================================================
// RecursiveSplitter
// ============================================================================

/// 재귀적 경계 탐색 분할기
///
/// 길이는 문자(char) 단위로 계산합니다.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// 분할기 생성
    ///
    /// `chunk_overlap >= chunk_size`이면 진행이 불가능하므로 즉시 실패합니다.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfiguration {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// 텍스트를 청크로 분할
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        // 문자 인덱스 → 바이트 오프셋 (끝 위치 포함)
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            if total - start <= self.chunk_size {
                chunks.push(text[bounds[start]..].to_string());
                break;
            }

            let end = self.find_cut(text, &bounds, start);
            chunks.push(text[bounds[start]..bounds[end]].to_string());

            // end > start + overlap 이므로 항상 전진
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// 문서를 메타데이터가 붙은 청크로 분할
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                text,
                source: document.source.clone(),
                page_number: document.metadata.page_number,
                chunk_index,
            })
            .collect()
    }

    /// `start`부터 `chunk_size` 문자 안에서 자를 위치(문자 인덱스) 탐색
    fn find_cut(&self, text: &str, bounds: &[usize], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let window = &text[bounds[start]..bounds[limit]];

        for level in SEPARATORS {
            let cut = level
                .iter()
                .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
                .max();

            if let Some(cut_byte) = cut {
                let cut_chars = window[..cut_byte].chars().count();
                // 가장 뒤쪽 경계도 오버랩보다 짧으면 다음 단계로
                if cut_chars > self.chunk_overlap {
                    return start + cut_chars;
                }
            }
        }

        // 경계 없음: 문자 단위로 자름
        limit
    }
}

// ============================================================================
// Tests
// ============================================================================
