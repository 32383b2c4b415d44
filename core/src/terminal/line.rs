//! Terminal lines and the bounded line buffer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Input,
    Output,
    Error,
    System,
    Branding,
    Ai,
}

impl LineKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            "error" => Some(Self::Error),
            "system" => Some(Self::System),
            "branding" => Some(Self::Branding),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

/// Payload of a line. Widgets are opaque to the engine and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineContent {
    Text(String),
    Widget(String),
}

impl LineContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LineContent::Text(s) => Some(s),
            LineContent::Widget(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLine {
    pub id: u64,
    pub kind: LineKind,
    pub content: LineContent,
    pub created_at: DateTime<Utc>,
}

impl TerminalLine {
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}

/// FIFO buffer of terminal lines with a fixed capacity.
///
/// Ids are handed out in generation order and never reused within a buffer.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<TerminalLine>,
    capacity: usize,
    next_id: u64,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    pub fn push(&mut self, kind: LineKind, content: LineContent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(TerminalLine {
            id,
            kind,
            content,
            created_at: Utc::now(),
        });
        id
    }

    pub fn push_text(&mut self, kind: LineKind, text: impl Into<String>) -> u64 {
        self.push(kind, LineContent::Text(text.into()))
    }

    /// Replace the contents with restored lines. Id generation resumes
    /// after the largest restored id.
    pub fn restore(&mut self, lines: Vec<TerminalLine>) {
        self.lines.clear();
        let skip = lines.len().saturating_sub(self.capacity);
        let max_id = lines.iter().map(|l| l.id).max().unwrap_or(0);
        self.lines.extend(lines.into_iter().skip(skip));
        self.next_id = self.next_id.max(max_id + 1);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn has_branding(&self) -> bool {
        self.lines.iter().any(|l| l.kind == LineKind::Branding)
    }

    /// Lines as presented: every branding line after the first is hidden
    pub fn visible(&self) -> Vec<&TerminalLine> {
        let mut seen_branding = false;
        self.lines
            .iter()
            .filter(|l| {
                if l.kind != LineKind::Branding {
                    return true;
                }
                if seen_branding {
                    return false;
                }
                seen_branding = true;
                true
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TerminalLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&TerminalLine> {
        self.lines.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_bounded_fifo() {
        let mut buf = LineBuffer::new(100);
        for i in 0..150 {
            buf.push_text(LineKind::Output, format!("line {}", i));
        }
        assert_eq!(buf.len(), 100);
        let first = buf.iter().next().unwrap();
        assert_eq!(first.text(), Some("line 50"));
        assert_eq!(buf.last().unwrap().text(), Some("line 149"));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut buf = LineBuffer::new(3);
        let ids: Vec<u64> = (0..5)
            .map(|_| buf.push_text(LineKind::System, "x"))
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_only_first_branding_visible() {
        let mut buf = LineBuffer::new(10);
        buf.push(LineKind::Branding, LineContent::Widget("logo".into()));
        buf.push_text(LineKind::System, "ready");
        buf.push(LineKind::Branding, LineContent::Widget("logo".into()));

        assert_eq!(buf.len(), 3);
        let visible = buf.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(
            visible.iter().filter(|l| l.kind == LineKind::Branding).count(),
            1
        );
    }

    #[test]
    fn test_restore_resumes_ids() {
        let mut buf = LineBuffer::new(10);
        let restored = vec![TerminalLine {
            id: 41,
            kind: LineKind::Input,
            content: LineContent::Text("> help".into()),
            created_at: Utc::now(),
        }];
        buf.restore(restored);
        assert_eq!(buf.push_text(LineKind::System, "next"), 42);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(LineKind::parse("ai"), Some(LineKind::Ai));
        assert_eq!(LineKind::parse("widget"), None);
    }
}
