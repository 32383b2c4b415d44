//! Companion chat mode

use anyhow::Result;
use console::{Style, Term};
use std::sync::Arc;

use apex_hud_core::ai::{ChatPanel, QueryRouter};
use apex_hud_core::config::HudConfig;

pub async fn run(config: &HudConfig, client: reqwest::Client) -> Result<()> {
    let router = Arc::new(QueryRouter::from_config(&config.ai.providers, client));
    let mut panel = ChatPanel::from_config(router, &config.chat);

    let term = Term::stdout();
    let you = Style::new().bold();
    let dm = Style::new().magenta();
    let dim = Style::new().dim();

    term.write_line(&dim.apply_to("Companion channel open. Type 'exit' to leave.").to_string())?;
    loop {
        term.write_str(&you.apply_to("you> ").to_string())?;
        let input = tokio::task::block_in_place(|| term.read_line())?;
        if input.is_empty() && !term.is_term() {
            return Ok(());
        }
        if matches!(input.trim(), "exit" | "quit") {
            return Ok(());
        }

        let Some(reply) = panel.send(&input).await else {
            continue;
        };
        term.write_line(&format!("{} {}", dm.apply_to("dm>"), reply.text))?;
        if !reply.from_ai {
            term.write_line(&dim.apply_to("(offline answer)").to_string())?;
        }
    }
}
