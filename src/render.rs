//! Printing terminal lines with `console` styles
//!
//! Output may be written while the terminal is in raw mode, so every line
//! break is emitted as `\r\n`.

use console::{Style, Term};
use std::io;

use apex_hud_core::terminal::{messages, LineContent, LineKind, TerminalLine};

/// Prints each line once, in id order
pub struct LineRenderer {
    last_id: u64,
    input: Style,
    output: Style,
    error: Style,
    system: Style,
    ai: Style,
    branding: Style,
    dim: Style,
}

impl Default for LineRenderer {
    fn default() -> Self {
        Self {
            last_id: 0,
            input: Style::new().bold(),
            output: Style::new(),
            error: Style::new().red(),
            system: Style::new().green(),
            ai: Style::new().cyan(),
            branding: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }
}

impl LineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print lines not printed yet. If the last printed line is gone (the
    /// buffer was cleared) the screen is cleared first.
    pub fn print_new(&mut self, term: &Term, lines: &[&TerminalLine]) -> io::Result<()> {
        if self.last_id > 0 && !lines.iter().any(|l| l.id == self.last_id) {
            term.clear_screen()?;
        }
        for line in lines.iter().filter(|l| l.id > self.last_id) {
            write_block(term, &self.render(line))?;
        }
        self.mark_printed(lines);
        Ok(())
    }

    /// Repaint the screen with the view scrolled `offset` lines back from
    /// the newest line.
    pub fn redraw(&mut self, term: &Term, lines: &[&TerminalLine], offset: usize) -> io::Result<()> {
        term.clear_screen()?;
        let (rows, _) = term.size();
        let end = lines.len().saturating_sub(offset);
        let start = end.saturating_sub(usize::from(rows).saturating_sub(2).max(1));
        for line in &lines[start..end] {
            write_block(term, &self.render(line))?;
        }
        if offset > 0 {
            write_block(term, &self.note(&format!("-- {} more below (PgDn) --", offset)))?;
        }
        self.mark_printed(lines);
        Ok(())
    }

    /// Treat `lines` as already on screen
    pub fn mark_printed(&mut self, lines: &[&TerminalLine]) {
        if let Some(last) = lines.last() {
            self.last_id = self.last_id.max(last.id);
        }
    }

    pub fn render(&self, line: &TerminalLine) -> String {
        let text = match &line.content {
            LineContent::Text(text) => text.as_str(),
            LineContent::Widget(name) if name == messages::BRANDING_WIDGET => messages::APEX_LOGO,
            LineContent::Widget(name) => name.as_str(),
        };
        let style = match line.kind {
            LineKind::Input => &self.input,
            LineKind::Output => &self.output,
            LineKind::Error => &self.error,
            LineKind::System => &self.system,
            LineKind::Ai => &self.ai,
            LineKind::Branding => &self.branding,
        };
        style.apply_to(text).to_string()
    }

    pub fn note(&self, text: &str) -> String {
        self.dim.apply_to(text).to_string()
    }
}

/// Write `text` followed by a line break
pub fn write_block(term: &Term, text: &str) -> io::Result<()> {
    term.write_str(&text.replace('\n', "\r\n"))?;
    term.write_str("\r\n")
}
