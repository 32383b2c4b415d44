//! User-facing text shown by the terminal

pub const EMPTY_COMMAND: &str = "Empty command";
pub const ALREADY_PROCESSING: &str = "Request already being processed...";
pub const HANDSHAKE_COMPLETE: &str = "Neural handshake complete.";
pub const THINKING: &str = "Thinking...";
pub const ACCESSING_VAULT: &str =
    "Accessing vault...\nInitializing secure connection...\nVault access granted.";
pub const VAULT_PATH: &str = "/showmethemoney";
pub const SESSION_RESTORED: &str = "Session restored.";
pub const SESSION_RESET: &str = "Session reset. Stored history removed.";
pub const STUCK_PROCESSING: &str = "Processing flag stuck; forcing reset";

pub const BRANDING_WIDGET: &str = "apex-logo";

pub const APEX_LOGO: &str = r#"
  █████╗ ██████╗ ███████╗██╗  ██╗    ██████╗ ███████╗
 ██╔══██╗██╔══██╗██╔════╝╚██╗██╔╝   ██╔═══██╗██╔════╝
 ███████║██████╔╝█████╗   ╚███╔╝    ██║   ██║███████╗
 ██╔══██║██╔═══╝ ██╔══╝   ██╔██╗    ██║   ██║╚════██║
 ██║  ██║██║     ███████╗██╔╝ ██╗   ╚██████╔╝███████║
 ╚═╝  ╚═╝╚═╝     ╚══════╝╚═╝  ╚═╝    ╚═════╝ ╚══════╝
"#;

pub fn command_failed(err: &str) -> String {
    format!("Command failed: {}", err)
}

pub fn all_ai_offline(status: &str) -> String {
    format!(
        "✗ ALL_AI_OFFLINE: Both primary and fallback AI services are unavailable. \
         Please try again later. (Status: {})",
        status
    )
}

pub fn request_timeout(secs: u64) -> String {
    format!(
        "✗ REQUEST_TIMEOUT: No provider answered within {}s. Please retry.",
        secs
    )
}

pub fn tier_prefix(provider: &str, tier: usize) -> String {
    format!("[{} T{}]\n", provider.to_uppercase(), tier)
}

pub const VIBE_QUOTES: &[&str] = &[
    "The vibe coder doesn't fight the current - they become the current.",
    "Speed is a feature. Ship fast, learn faster.",
    "The best code is the code you don't write.",
    "In the age of AI, taste becomes the ultimate skill.",
    "We don't write code anymore. We conduct symphonies of intent.",
    "Perfect is the enemy of deployed.",
    "You're not learning to code - you're learning to shape reality.",
];

/// Canned companion answers, grouped by topic
pub mod companion {
    pub const HELP: &[&str] = &[
        "APEX OS is your command center. The skill tree tracks your progression; each node is a capability you've unlocked.",
        "Your progress is saved automatically. Type `help` in the terminal for the full command list.",
    ];
    pub const QUEST: &[&str] = &[
        "Your current quest is the next step. Focus on the objectives and the XP will follow.",
        "Stuck on a quest? Break it into smaller steps. Every complex system is a series of simple actions.",
    ];
    pub const TIP: &[&str] = &[
        "Pro tip: let the AI handle the syntax, you focus on the architecture.",
        "Debugging tip: when generated code fails, explain the problem back to the model.",
    ];
    pub const ADVICE: &[&str] = &[
        "Ship early, iterate often. Perfect is the enemy of deployed.",
        "When in doubt, prototype. A working demo beats a design document.",
    ];
    pub const VIBE: &[&str] = &[
        "\"Speed is a feature. Ship fast, learn faster.\" - Vibe Coder Creed",
        "\"The future belongs to those who can see it. Build what doesn't exist yet.\"",
    ];
    pub const DEFAULT: &[&str] = &[
        "Keep pushing forward, Player One. Every line of code is a step toward mastery.",
        "The Frontier rewards persistence. Your next breakthrough is closer than you think.",
    ];
}
