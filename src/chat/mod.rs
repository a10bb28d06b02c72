//! 대화 기록
//!
//! 세션 단위의 역할/시각이 붙은 메시지 목록입니다.
//! 최대 개수를 넘으면 가장 오래된 메시지부터 버립니다.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};

use crate::config::DEFAULT_MAX_HISTORY;

/// 타임스탬프 표시 형식
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 빈 대화일 때 보여주는 안내
pub const GREETING: &str = "Ask me anything!";

/// 빈 대화일 때 보여주는 경고
pub const DEMO_WARNING: &str = "This is a demo. Please do not share sensitive information.";

// ============================================================================
// Message
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// 대화 메시지 (생성 후 변경 없음)
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// `[role] content (at YYYY-MM-DD HH:MM:SS)`
    pub fn render(&self) -> String {
        format!(
            "[{}] {} (at {})",
            self.role,
            self.content,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}

// ============================================================================
// History
// ============================================================================

/// 크기 제한이 있는 대화 기록
#[derive(Debug, Clone)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
    max: usize,
}

impl ChatHistory {
    pub fn new(max: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max.min(DEFAULT_MAX_HISTORY)),
            max,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }

    /// 메시지 추가 후 최대 개수 초과분을 앞에서부터 제거
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.max {
            self.messages.pop_front();
        }
    }

    /// 오래된 순서
    pub fn all(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_eviction_keeps_latest() {
        let mut history = ChatHistory::with_default_capacity();
        for i in 1..=51 {
            history.append(ChatMessage::user(format!("message {}", i)));
        }

        assert_eq!(history.len(), 50);
        let first = history.all().next().unwrap();
        assert_eq!(first.content, "message 2");
        assert_eq!(history.all().last().unwrap().content, "message 51");
    }

    #[test]
    fn test_clear() {
        let mut history = ChatHistory::new(3);
        history.append(ChatMessage::user("q"));
        history.append(ChatMessage::assistant("a"));
        assert!(!history.is_empty());

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.all().count(), 0);
    }

    #[test]
    fn test_order_is_oldest_first() {
        let mut history = ChatHistory::new(10);
        history.append(ChatMessage::user("question"));
        history.append(ChatMessage::assistant("answer"));

        let roles: Vec<Role> = history.all().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[test]
    fn test_render_format() {
        let message = ChatMessage {
            role: Role::Assistant,
            content: "Blue.".into(),
            timestamp: Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
        };
        assert_eq!(message.render(), "[assistant] Blue. (at 2024-03-05 14:07:09)");
    }
}
