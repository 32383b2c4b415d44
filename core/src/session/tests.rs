use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::test_support::session_with;
use super::*;
use crate::ai::gateway::test_support::ScriptedBackend;
use crate::commands::{Command, CommandRegistry};
use crate::diagnostics::Level;
use crate::error::{HudError, Result};
use crate::events::HudEvent;
use crate::terminal::{messages, LineKind};

fn texts(session: &TerminalSession, kind: LineKind) -> Vec<String> {
    session
        .context()
        .lines
        .iter()
        .filter(|l| l.kind == kind)
        .filter_map(|l| l.text().map(str::to_string))
        .collect()
}

async fn started(backend: Arc<ScriptedBackend>, store: Arc<MemoryStore>) -> TerminalSession {
    let mut session = session_with(backend, store);
    session.start().await;
    session
}

async fn wait_for_calls(backend: &ScriptedBackend, n: usize) {
    for _ in 0..100 {
        if backend.calls() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
}

struct Boom;

#[async_trait]
impl Command for Boom {
    fn name(&self) -> &str {
        "boom"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn usage(&self) -> &str {
        "boom"
    }

    async fn run(&self, _ctx: &mut SessionContext, _args: &[String]) -> Result<()> {
        Err(HudError::command("boom", "kaboom"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_boot_shows_single_branding_line() {
    let store = Arc::new(MemoryStore::new());
    let mut session = session_with(ScriptedBackend::answering("x"), store);
    let mut rx = session.events().subscribe();

    assert_eq!(session.submit("help").await, SubmitOutcome::NotReady);
    session.start().await;
    session.start().await;

    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(rx.recv().await.unwrap(), HudEvent::BootCompleted);
    let branding = session
        .visible_lines()
        .iter()
        .filter(|l| l.kind == LineKind::Branding)
        .count();
    assert_eq!(branding, 1);
}

#[tokio::test(start_paused = true)]
async fn test_help_is_a_command_not_a_query() {
    let backend = ScriptedBackend::answering("should not be used");
    let mut session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    assert_eq!(session.submit("HELP").await, SubmitOutcome::Accepted);
    assert_eq!(backend.calls(), 0);
    assert_eq!(texts(&session, LineKind::Input), vec!["> HELP"]);
    assert!(texts(&session, LineKind::System)[0].contains("ask <question>"));
    assert!(!session.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_free_text_goes_to_ai_once() {
    let backend = ScriptedBackend::answering("**Rust** is a language");
    let mut session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    session.submit("what is rust").await;
    assert_eq!(backend.calls(), 1);
    assert_eq!(backend.requests.lock()[0].message, "what is rust");
    assert_eq!(
        session.context().lines.last().and_then(|l| l.text()),
        Some("Rust is a language")
    );
}

#[tokio::test(start_paused = true)]
async fn test_ai_history_excludes_current_echo() {
    let backend = ScriptedBackend::answering("ok");
    let mut session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    session.submit("first").await;
    session.submit("second").await;

    let requests = backend.requests.lock();
    assert!(requests[0].history.is_empty());
    assert_eq!(requests[1].history.len(), 1);
    assert_eq!(requests[1].history[0].content, "first");
}

#[tokio::test(start_paused = true)]
async fn test_handler_failure_is_one_error_line() {
    let mut registry = CommandRegistry::with_builtins();
    registry.register(Boom);
    let mut session = session_with(ScriptedBackend::answering("x"), Arc::new(MemoryStore::new()))
        .with_registry(registry);
    session.start().await;

    assert_eq!(session.submit("boom").await, SubmitOutcome::Accepted);
    assert_eq!(texts(&session, LineKind::Error), vec!["Command failed: kaboom"]);
    assert!(!session.is_processing());
    assert_eq!(session.diagnostics().count_at(Level::Error), 1);

    // Next submission still works
    session.submit("vibe").await;
    assert_eq!(texts(&session, LineKind::Error).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_arguments_render_usage() {
    let backend = ScriptedBackend::answering("x");
    let mut session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    session.submit("ask").await;
    session.submit("quality turbo").await;
    assert_eq!(
        texts(&session, LineKind::Error),
        vec!["Usage: ask <question>", "Usage: quality [auto|fast|pro]"]
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_offline_answer_is_a_system_line() {
    let mut session = started(ScriptedBackend::failing(), Arc::new(MemoryStore::new())).await;
    session.submit("hello?").await;

    assert!(texts(&session, LineKind::Error).is_empty());
    let last = session.context().lines.last().and_then(|l| l.text()).unwrap();
    assert!(last.contains("ALL_AI_OFFLINE"));
}

#[tokio::test(start_paused = true)]
async fn test_vault_phrase_closes_and_navigates() {
    let backend = ScriptedBackend::answering("x");
    let mut session = started(backend.clone(), Arc::new(MemoryStore::new())).await;
    let mut rx = session.events().subscribe();

    session.submit("show me the money").await;
    assert_eq!(
        texts(&session, LineKind::System).last().map(String::as_str),
        Some(messages::ACCESSING_VAULT)
    );
    assert_eq!(backend.calls(), 0);

    let mut seen = Vec::new();
    while !matches!(seen.last(), Some(HudEvent::Navigate(_))) {
        seen.push(rx.recv().await.unwrap());
    }
    assert!(seen.contains(&HudEvent::CloseRequested));
    assert_eq!(
        seen.last(),
        Some(&HudEvent::Navigate(messages::VAULT_PATH.to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_busy_session_refuses_input() {
    let backend = ScriptedBackend::answering("x");
    let mut session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    session.context().processing().set(true);
    assert_eq!(session.submit("hello").await, SubmitOutcome::Busy);
    assert_eq!(backend.calls(), 0);

    session.context().processing().set(false);
    assert_eq!(session.submit("hello").await, SubmitOutcome::Accepted);
}

#[tokio::test(start_paused = true)]
async fn test_blank_and_invalid_input() {
    let mut session = started(ScriptedBackend::answering("x"), Arc::new(MemoryStore::new())).await;
    let before = session.context().lines.len();

    assert_eq!(session.submit("   ").await, SubmitOutcome::Ignored);
    assert_eq!(session.context().lines.len(), before);

    assert_eq!(session.submit("\u{200B}\u{0007}").await, SubmitOutcome::Ignored);
    assert_eq!(texts(&session, LineKind::Error), vec!["Invalid input"]);
    assert!(session.context().history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_history_navigation_restores_draft() {
    let mut session = started(ScriptedBackend::answering("x"), Arc::new(MemoryStore::new())).await;
    session.submit("help").await;
    session.submit("vibe").await;

    session.set_draft("dra");
    assert_eq!(session.history_up().as_deref(), Some("vibe"));
    assert_eq!(session.history_up().as_deref(), Some("help"));
    assert_eq!(session.history_up().as_deref(), Some("help"));
    assert_eq!(session.history_down().as_deref(), Some("vibe"));
    assert_eq!(session.history_down().as_deref(), Some("dra"));
    assert_eq!(session.draft(), "dra");
    assert_eq!(session.history_down(), None);
}

#[tokio::test(start_paused = true)]
async fn test_submission_scrolls_to_newest() {
    let mut session = started(ScriptedBackend::answering("x"), Arc::new(MemoryStore::new())).await;
    session.set_scroll_offset(2);
    assert_eq!(session.scroll_offset(), 2);

    session.submit("vibe").await;
    assert_eq!(session.scroll_offset(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tab_completion() {
    let mut session = started(ScriptedBackend::answering("x"), Arc::new(MemoryStore::new())).await;

    session.set_draft("he");
    assert_eq!(session.complete_input().as_deref(), Some("help"));
    assert_eq!(session.draft(), "help");

    session.set_draft("h");
    assert_eq!(session.complete_input(), None);
    assert_eq!(
        texts(&session, LineKind::System).last().map(String::as_str),
        Some("help  history")
    );

    session.set_draft("ask some");
    assert_eq!(session.complete_input(), None);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_then_restore() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut session = started(ScriptedBackend::answering("x"), store.clone()).await;
        session.submit("help").await;
        session.teardown();
    }
    assert!(store.get("apex-os-terminal").is_some());

    let mut session = session_with(ScriptedBackend::answering("x"), store);
    let mut rx = session.events().subscribe();
    session.start().await;

    assert_eq!(rx.recv().await.unwrap(), HudEvent::SessionRestored { lines: 2 });
    assert_eq!(texts(&session, LineKind::Input), vec!["> help"]);
    assert_eq!(
        texts(&session, LineKind::System).last().map(String::as_str),
        Some(messages::SESSION_RESTORED)
    );
    assert!(session
        .visible_lines()
        .iter()
        .all(|l| l.kind != LineKind::Branding));
    assert_eq!(session.context().history.entries(), vec!["help"]);
}

#[tokio::test(start_paused = true)]
async fn test_boot_only_session_keeps_draft() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut session = started(ScriptedBackend::answering("x"), store.clone()).await;
        session.set_draft("hel");
        session.set_scroll_offset(3);
    }

    let mut session = session_with(ScriptedBackend::answering("x"), store);
    let mut rx = session.events().subscribe();
    session.start().await;

    assert_eq!(rx.recv().await.unwrap(), HudEvent::SessionRestored { lines: 0 });
    assert_eq!(session.draft(), "hel");
    assert_eq!(session.context().scroll_offset, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unstarted_session_leaves_store_alone() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut session = started(ScriptedBackend::answering("x"), store.clone()).await;
        session.submit("vibe").await;
    }
    let saved = store.get("apex-os-terminal");
    assert!(saved.is_some());

    drop(session_with(ScriptedBackend::answering("x"), store.clone()));
    assert_eq!(store.get("apex-os-terminal"), saved);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_writes_mirror() {
    let store = Arc::new(MemoryStore::new());
    let mut session = started(ScriptedBackend::answering("x"), store.clone()).await;
    session.submit("vibe").await;
    assert!(store.get("apex-os-terminal").is_none());

    tokio::time::sleep(Duration::from_millis(4_100)).await;
    for _ in 0..50 {
        if store.get("apex-os-terminal").is_some() {
            break;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let saved = store.get("apex-os-terminal").unwrap();
    assert!(saved.contains("> vibe"));
}

#[tokio::test(start_paused = true)]
async fn test_prewarm_runs_once() {
    let backend = ScriptedBackend::answering("warm");
    let session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    session.prewarm();
    session.events().publish(HudEvent::PrewarmRequested);
    session.prewarm();
    wait_for_calls(&backend, 1).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(backend.calls(), 1);
    assert_eq!(backend.requests.lock()[0].message, "handshake");
}

#[tokio::test(start_paused = true)]
async fn test_prewarm_on_event() {
    let backend = ScriptedBackend::answering("warm");
    let session = started(backend.clone(), Arc::new(MemoryStore::new())).await;

    session.events().publish(HudEvent::PrewarmRequested);
    wait_for_calls(&backend, 1).await;
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_forgets_stored_session() {
    let store = Arc::new(MemoryStore::new());
    let mut session = started(ScriptedBackend::answering("x"), store.clone()).await;
    session.submit("vibe").await;
    session.teardown();
    assert!(store.get("apex-os-terminal").is_some());

    let mut session = started(ScriptedBackend::answering("x"), store.clone()).await;
    session.submit("reset").await;
    assert!(session.context().history.is_empty());
    assert_eq!(
        texts(&session, LineKind::System),
        vec![messages::SESSION_RESET]
    );
}
