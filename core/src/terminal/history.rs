//! Command history with up/down navigation

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    cap: usize,
    /// Index into `entries` while navigating, `None` when at the draft
    cursor: Option<usize>,
    /// Draft saved when navigation starts
    stash: Option<String>,
}

impl CommandHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
            cursor: None,
            stash: None,
        }
    }

    /// Append an entry. Adjacent duplicates collapse; oldest entries fall off.
    pub fn push(&mut self, entry: &str) {
        self.reset_navigation();
        if entry.is_empty() || self.entries.back().map(String::as_str) == Some(entry) {
            return;
        }
        if self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.to_string());
    }

    pub fn restore(&mut self, entries: Vec<String>) {
        self.entries.clear();
        self.reset_navigation();
        for entry in entries {
            self.push(&entry);
        }
    }

    /// Step to an older entry. Returns the text the input should show.
    pub fn up(&mut self, current_draft: &str) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => {
                self.stash = Some(current_draft.to_string());
                self.entries.len() - 1
            }
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.cursor = Some(next);
        self.entries.get(next).cloned()
    }

    /// Step to a newer entry. Walking past the newest restores the draft.
    pub fn down(&mut self) -> Option<String> {
        let i = self.cursor?;
        if i + 1 < self.entries.len() {
            self.cursor = Some(i + 1);
            return self.entries.get(i + 1).cloned();
        }
        self.cursor = None;
        Some(self.stash.take().unwrap_or_default())
    }

    pub fn reset_navigation(&mut self) {
        self.cursor = None;
        self.stash = None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reset_navigation();
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
