//! Routing of one sanitized submission
//!
//! Every submission is recorded in history and echoed, then handled by a
//! registered command, the vault phrase, or the AI gateway. Whatever goes
//! wrong ends as exactly one error line; nothing propagates to the caller.

use std::time::Duration;

use crate::diag_error;
use crate::error::HudError;
use crate::events::HudEvent;
use crate::session::SessionContext;
use crate::terminal::format::DEFAULT_WIDTH;
use crate::terminal::{markdown_to_terminal, messages, LineKind};

const VAULT_DELAY: Duration = Duration::from_millis(1500);

pub async fn dispatch(input: &str, ctx: &mut SessionContext) {
    ctx.history.push(input);
    ctx.add_line(LineKind::Input, format!("> {}", input));

    let mut parts = input.split_whitespace();
    let Some(command) = parts.next().map(str::to_lowercase) else {
        ctx.add_line(LineKind::Error, messages::EMPTY_COMMAND);
        return;
    };
    let args: Vec<String> = parts.map(str::to_string).collect();

    let handler = ctx.registry().get(&command);
    ctx.processing().set(true);
    let result = match handler {
        Some(handler) => {
            if handler.args().accepts(&args) {
                handler.run(ctx, &args).await
            } else {
                Err(HudError::Usage {
                    usage: handler.usage().to_string(),
                })
            }
        }
        None if is_vault_phrase(input) => {
            open_vault(ctx);
            Ok(())
        }
        None => {
            forward_to_ai(input, ctx).await;
            Ok(())
        }
    };

    if let Err(e) = result {
        report_failure(ctx, &command, &e);
    }
    ctx.processing().set(false);
}

/// `showmethemoney`, ignoring whitespace, or anything mentioning money
pub fn is_vault_phrase(input: &str) -> bool {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    compact == "showmethemoney" || compact.contains("money")
}

fn open_vault(ctx: &mut SessionContext) {
    ctx.add_line(LineKind::System, messages::ACCESSING_VAULT);
    let events = ctx.events().clone();
    tokio::spawn(async move {
        tokio::time::sleep(VAULT_DELAY).await;
        events.publish(HudEvent::CloseRequested);
        events.publish(HudEvent::Navigate(messages::VAULT_PATH.to_string()));
    });
}

async fn forward_to_ai(input: &str, ctx: &mut SessionContext) {
    let answer = ctx.ask_ai(input).await;
    ctx.add_line(LineKind::System, markdown_to_terminal(&answer, DEFAULT_WIDTH));
}

fn report_failure(ctx: &mut SessionContext, command: &str, err: &HudError) {
    let text = match err {
        HudError::Usage { .. } => err.user_message(),
        _ => messages::command_failed(&err.user_message()),
    };
    ctx.add_line(LineKind::Error, text);
    diag_error!(ctx.diagnostics(), "'{}' failed: {}", command, err);
}
