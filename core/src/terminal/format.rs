//! Markdown to terminal text conversion
//!
//! AI answers arrive as markdown. The terminal shows plain text, so headers
//! become underlined titles, fenced code becomes a box, emphasis markers are
//! dropped and long paragraphs are wrapped.

use lazy_static::lazy_static;
use regex::Regex;

pub const DEFAULT_WIDTH: usize = 80;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```(\w+)?\n(.*?)```").unwrap();
    static ref HEADER: Regex = Regex::new(r"(?m)^(#{1,3})\s+(.+)$").unwrap();
    static ref BOLD: Regex = Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap();
    static ref ITALIC: Regex = Regex::new(r"\*([^*\s][^*]*?)\*").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`([^`]+)`").unwrap();
    static ref BULLET: Regex = Regex::new(r"(?m)^[-*]\s+(.+)$").unwrap();
}

/// Convert a markdown answer to wrapped terminal text
pub fn markdown_to_terminal(markdown: &str, width: usize) -> String {
    let width = width.max(20);

    // Pull code blocks out first so inline rules don't touch them
    let mut blocks = Vec::new();
    let text = CODE_FENCE.replace_all(markdown, |caps: &regex::Captures| {
        let lang = caps.get(1).map(|m| m.as_str());
        let code = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        blocks.push(code_box(code.trim_end(), lang, width));
        format!("\u{0}{}\u{0}", blocks.len() - 1)
    });

    let text = HEADER.replace_all(&text, |caps: &regex::Captures| {
        let title = caps[2].trim();
        let rule = if caps[1].len() == 1 { '═' } else { '─' };
        format!(
            "{}\n{}",
            title.to_uppercase(),
            rule.to_string().repeat(title.chars().count())
        )
    });
    let text = BOLD.replace_all(&text, |caps: &regex::Captures| {
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string()).unwrap_or_default()
    });
    let text = ITALIC.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "[$1]");
    let text = BULLET.replace_all(&text, "  • $1");

    let mut out = Vec::new();
    for line in text.lines() {
        if !line.contains('\u{0}') {
            out.extend(wrap(line, width));
            continue;
        }
        // A fence may share its line with text: `\0N\0` splits into
        // text at even positions and block indexes at odd ones
        for (i, part) in line.split('\u{0}').enumerate() {
            let block = (i % 2 == 1)
                .then(|| part.parse::<usize>().ok())
                .flatten()
                .and_then(|idx| blocks.get(idx));
            match block {
                Some(block) => out.push(block.clone()),
                None if part.trim().is_empty() => {}
                None => out.extend(wrap(part.trim(), width)),
            }
        }
    }
    out.join("\n").trim_matches('\n').to_string()
}

fn code_box(code: &str, lang: Option<&str>, width: usize) -> String {
    let inner = width - 4;
    let mut lines = vec![format!("┌{}┐", "─".repeat(width - 2))];
    if let Some(lang) = lang {
        lines.push(format!("│ {:<inner$} │", format!("[{}]", lang)));
        lines.push(format!("├{}┤", "─".repeat(width - 2)));
    }
    for raw in code.lines() {
        for chunk in hard_wrap(raw, inner) {
            lines.push(format!("│ {:<inner$} │", chunk));
        }
    }
    lines.push(format!("└{}┘", "─".repeat(width - 2)));
    lines.join("\n")
}

fn hard_wrap(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

/// Greedy word wrap; words longer than the width are split
fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    let indent_len = indent.chars().count();
    let mut out = Vec::new();
    let mut current = indent.clone();
    for word in line.split_whitespace() {
        let len = current.chars().count();
        let word_len = word.chars().count();
        if word_len > width {
            if len > indent_len {
                out.push(std::mem::replace(&mut current, indent.clone()));
            }
            out.extend(hard_wrap(word, width));
            continue;
        }
        if len > indent_len && len + 1 + word_len > width {
            out.push(std::mem::replace(&mut current, indent.clone()));
        }
        if current.chars().count() > indent_len {
            current.push(' ');
        }
        current.push_str(word);
    }
    if current.chars().count() > indent_len {
        out.push(current);
    }
    out
}
