//! Built-in terminal commands

use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{ArgSpec, Command, CommandCategory, CommandRegistry};
use crate::ai::{ProviderPreference, QualityPreference};
use crate::error::{HudError, Result};
use crate::session::SessionContext;
use crate::terminal::format::DEFAULT_WIDTH;
use crate::terminal::{markdown_to_terminal, messages, LineKind};

const DEFAULT_LOG_LINES: usize = 20;

pub fn register_all(registry: &mut CommandRegistry) {
    registry.register(HelpCommand);
    registry.register(ClearCommand);
    registry.register(VibeCommand);
    for prompt in AI_PROMPTS {
        registry.register(prompt.clone());
    }
    registry.register(ProviderCommand);
    registry.register(QualityCommand);
    registry.register(HistoryCommand);
    registry.register(LogsCommand);
    registry.register(ResetCommand);
}

pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List available commands"
    }

    fn usage(&self) -> &str {
        "help"
    }

    async fn run(&self, ctx: &mut SessionContext, _args: &[String]) -> Result<()> {
        let registry = ctx.registry().clone();
        let mut commands: Vec<_> = registry.commands().collect();
        commands.sort_by_key(|c| c.category());

        let width = commands.iter().map(|c| c.usage().chars().count()).max().unwrap_or(0);
        let mut out = String::from("APEX OS - CLI Commands\n");
        let mut current = None;
        for command in commands {
            if current != Some(command.category()) {
                current = Some(command.category());
                out.push_str(&format!("\n{}\n", command.category()));
            }
            out.push_str(&format!(
                "  {:<width$}  {}\n",
                command.usage(),
                command.description(),
                width = width
            ));
        }
        out.push_str("\nAnything else is sent to the AI.");

        ctx.add_line(LineKind::System, out);
        Ok(())
    }
}

pub struct ClearCommand;

#[async_trait]
impl Command for ClearCommand {
    fn name(&self) -> &str {
        "clear"
    }

    fn description(&self) -> &str {
        "Clear the terminal"
    }

    fn usage(&self) -> &str {
        "clear"
    }

    async fn run(&self, ctx: &mut SessionContext, _args: &[String]) -> Result<()> {
        ctx.clear_lines();
        Ok(())
    }
}

pub struct VibeCommand;

#[async_trait]
impl Command for VibeCommand {
    fn name(&self) -> &str {
        "vibe"
    }

    fn description(&self) -> &str {
        "Random wisdom"
    }

    fn usage(&self) -> &str {
        "vibe"
    }

    async fn run(&self, ctx: &mut SessionContext, _args: &[String]) -> Result<()> {
        let quote = messages::VIBE_QUOTES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(messages::HANDSHAKE_COMPLETE);
        ctx.add_line(LineKind::System, format!("\"{}\"", quote));
        Ok(())
    }
}

/// A command that wraps its arguments in a fixed prompt and asks the AI
#[derive(Clone)]
pub struct AiPromptCommand {
    name: &'static str,
    description: &'static str,
    usage: &'static str,
    prefix: &'static str,
}

const AI_PROMPTS: &[AiPromptCommand] = &[
    AiPromptCommand {
        name: "ask",
        description: "Ask AI anything",
        usage: "ask <question>",
        prefix: "",
    },
    AiPromptCommand {
        name: "code",
        description: "Generate code",
        usage: "code <description>",
        prefix: "Generate code for: ",
    },
    AiPromptCommand {
        name: "explain",
        description: "Get an explanation",
        usage: "explain <topic>",
        prefix: "Explain: ",
    },
    AiPromptCommand {
        name: "debug",
        description: "Debug help",
        usage: "debug <error>",
        prefix: "Debug: ",
    },
];

#[async_trait]
impl Command for AiPromptCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn usage(&self) -> &str {
        self.usage
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Ai
    }

    fn args(&self) -> ArgSpec {
        ArgSpec::Required
    }

    async fn run(&self, ctx: &mut SessionContext, args: &[String]) -> Result<()> {
        let prompt = format!("{}{}", self.prefix, args.join(" "));
        let answer = ctx.ask_ai(&prompt).await;
        ctx.add_line(LineKind::System, markdown_to_terminal(&answer, DEFAULT_WIDTH));
        Ok(())
    }
}

pub struct ProviderCommand;

#[async_trait]
impl Command for ProviderCommand {
    fn name(&self) -> &str {
        "provider"
    }

    fn description(&self) -> &str {
        "Show or set the preferred AI provider"
    }

    fn usage(&self) -> &str {
        "provider [auto|<name>]"
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Ai
    }

    fn args(&self) -> ArgSpec {
        ArgSpec::Optional
    }

    async fn run(&self, ctx: &mut SessionContext, args: &[String]) -> Result<()> {
        let families = ctx.gateway().router().families();
        let available = format!("auto, {}", families.join(", "));

        let Some(choice) = args.first() else {
            let line = format!(
                "AI provider: {} (available: {})",
                ctx.preferences.provider, available
            );
            ctx.add_line(LineKind::System, line);
            return Ok(());
        };
        if args.len() > 1 {
            return Err(HudError::Usage {
                usage: self.usage().to_string(),
            });
        }

        let preference = ProviderPreference::parse(choice);
        if let ProviderPreference::Family(name) = &preference {
            if !families.contains(name) {
                return Err(HudError::command(
                    self.name(),
                    format!("Unknown provider '{}'. Available: {}", name, available),
                ));
            }
        }
        ctx.add_line(LineKind::System, format!("AI provider set to {}", preference));
        ctx.preferences.provider = preference;
        Ok(())
    }
}

pub struct QualityCommand;

#[async_trait]
impl Command for QualityCommand {
    fn name(&self) -> &str {
        "quality"
    }

    fn description(&self) -> &str {
        "Show or set the preferred model class"
    }

    fn usage(&self) -> &str {
        "quality [auto|fast|pro]"
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Ai
    }

    fn args(&self) -> ArgSpec {
        ArgSpec::Choice(&["auto", "fast", "pro"])
    }

    async fn run(&self, ctx: &mut SessionContext, args: &[String]) -> Result<()> {
        match args.first().and_then(|a| QualityPreference::parse(a)) {
            Some(quality) => {
                ctx.preferences.quality = quality;
                ctx.add_line(LineKind::System, format!("AI quality set to {}", quality));
            }
            None => {
                let line = format!("AI quality: {}", ctx.preferences.quality);
                ctx.add_line(LineKind::System, line);
            }
        }
        Ok(())
    }
}

pub struct HistoryCommand;

#[async_trait]
impl Command for HistoryCommand {
    fn name(&self) -> &str {
        "history"
    }

    fn description(&self) -> &str {
        "Show command history"
    }

    fn usage(&self) -> &str {
        "history"
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Session
    }

    async fn run(&self, ctx: &mut SessionContext, _args: &[String]) -> Result<()> {
        let entries = ctx.history.entries();
        let text = if entries.is_empty() {
            "No command history.".to_string()
        } else {
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| format!("{:>4}  {}", i + 1, entry))
                .collect::<Vec<_>>()
                .join("\n")
        };
        ctx.add_line(LineKind::System, text);
        Ok(())
    }
}

pub struct LogsCommand;

#[async_trait]
impl Command for LogsCommand {
    fn name(&self) -> &str {
        "logs"
    }

    fn description(&self) -> &str {
        "Show recent diagnostics"
    }

    fn usage(&self) -> &str {
        "logs [n]"
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Session
    }

    fn args(&self) -> ArgSpec {
        ArgSpec::Optional
    }

    async fn run(&self, ctx: &mut SessionContext, args: &[String]) -> Result<()> {
        let count = match args {
            [] => DEFAULT_LOG_LINES,
            [n] => n.parse::<usize>().map_err(|_| HudError::Usage {
                usage: self.usage().to_string(),
            })?,
            _ => {
                return Err(HudError::Usage {
                    usage: self.usage().to_string(),
                })
            }
        };

        let mut entries = ctx.diagnostics().recent(count);
        let text = if entries.is_empty() {
            "No diagnostics recorded.".to_string()
        } else {
            entries.reverse();
            entries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        };
        ctx.add_line(LineKind::System, text);
        Ok(())
    }
}

pub struct ResetCommand;

#[async_trait]
impl Command for ResetCommand {
    fn name(&self) -> &str {
        "reset"
    }

    fn description(&self) -> &str {
        "Forget this session and its stored history"
    }

    fn usage(&self) -> &str {
        "reset"
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Session
    }

    async fn run(&self, ctx: &mut SessionContext, _args: &[String]) -> Result<()> {
        ctx.persistence().clear();
        ctx.clear_lines();
        ctx.history.clear();
        ctx.input_draft.clear();
        ctx.add_line(LineKind::System, messages::SESSION_RESET);
        Ok(())
    }
}
