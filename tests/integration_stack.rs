use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use ratatui::layout::Rect;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use term_sidebar::constants::BASE_Z_INDEX;
use term_sidebar::state::is_valid_history;
use term_sidebar::terminal::TerminalHost;
use term_sidebar::{
    CloseOutcome, ComponentRef, ContentDescriptor, PanelComponent, PanelConfig, PanelContent,
    PanelContext, PanelError, PanelOrchestrator, PanelPosition, PanelResult, PanelState,
    PreventClose, StateChange, TemplateRef,
};

fn orchestrator() -> (Arc<TerminalHost>, PanelOrchestrator) {
    let host = Arc::new(TerminalHost::new(Rect::new(0, 0, 120, 40)));
    (host.clone(), PanelOrchestrator::new(host))
}

fn quick() -> PanelConfig {
    PanelConfig::new().with_animation_duration(Duration::from_millis(50))
}

fn stacked() -> PanelConfig {
    quick().with_allow_multiple(true)
}

fn template(name: &str) -> ContentDescriptor {
    ContentDescriptor::template(
        TemplateRef::new(name, |ctx, _| vec![ctx["text"].to_string()]),
        json!({ "text": "hello" }),
    )
}

struct Tracked;

impl PanelContent for Tracked {
    fn body(&self, _width: u16) -> Vec<String> {
        vec!["tracked".to_string()]
    }
}

impl PanelComponent for Tracked {
    fn create(_ctx: &PanelContext) -> PanelResult<Self> {
        Ok(Tracked)
    }
}

/// Only used by one test, so the counter is never shared.
static DESTROYED: AtomicUsize = AtomicUsize::new(0);

struct Counted;

impl PanelContent for Counted {
    fn body(&self, _width: u16) -> Vec<String> {
        Vec::new()
    }

    fn destroy(&mut self) {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
    }
}

impl PanelComponent for Counted {
    fn create(_ctx: &PanelContext) -> PanelResult<Self> {
        Ok(Counted)
    }
}

#[tokio::test(start_paused = true)]
async fn single_panel_policy_replaces_the_open_panel() {
    let (_host, orchestrator) = orchestrator();
    let first = orchestrator
        .open(template("first"), quick())
        .await
        .expect("first");
    let mut first_changes = first.on_state_change();

    let second = orchestrator
        .open(template("second"), quick().with_position(PanelPosition::Left))
        .await
        .expect("second");

    // The old panel finished closing before the new one was created.
    assert_eq!(first.state(), PanelState::Closed);
    assert_eq!(orchestrator.open_panels_count(), 1);
    assert_eq!(orchestrator.get_all_panels(), vec![second.clone()]);
    let mut seen = Vec::new();
    while let Ok(change) = first_changes.recv().await {
        seen.push(change.to);
    }
    assert_eq!(seen.last(), Some(&PanelState::Closed));
}

#[tokio::test(start_paused = true)]
async fn single_panel_policy_also_closes_minimized_panels() {
    let (_host, orchestrator) = orchestrator();
    let minimized = orchestrator
        .open(template("tray"), stacked().with_minimizable(true))
        .await
        .expect("open");
    assert!(minimized.minimize());
    assert_eq!(orchestrator.tabs().len(), 1);

    orchestrator
        .open(template("other"), quick())
        .await
        .expect("replacement");
    assert_eq!(minimized.state(), PanelState::Closed);
    assert!(orchestrator.tabs().is_empty());
    assert_eq!(orchestrator.open_panels_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reopening_minimized_content_restores_it() {
    let (_host, orchestrator) = orchestrator();
    let config = || stacked().with_minimizable(true);
    let handle = orchestrator
        .open(ContentDescriptor::component::<Tracked>(), config())
        .await
        .expect("open");
    assert!(handle.minimize());
    assert!(orchestrator.tabs().has_tab(handle.id()));

    let again = orchestrator
        .open(ContentDescriptor::component::<Tracked>(), config())
        .await
        .expect("reopen");
    assert_eq!(again, handle);
    assert_eq!(handle.state(), PanelState::Open);
    assert!(orchestrator.tabs().is_empty());
    assert_eq!(orchestrator.open_panels_count(), 1);

    // Same content at another edge is a different panel.
    let elsewhere = orchestrator
        .open(
            ContentDescriptor::component::<Tracked>(),
            config().with_position(PanelPosition::Bottom),
        )
        .await
        .expect("other edge");
    assert_ne!(elsewhere, handle);
    assert_eq!(orchestrator.open_panels_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn html_content_is_never_deduplicated() {
    let (_host, orchestrator) = orchestrator();
    let config = || stacked().with_minimizable(true);
    let first = orchestrator
        .open(ContentDescriptor::html("<p>same</p>"), config())
        .await
        .expect("first");
    assert!(first.minimize());
    let second = orchestrator
        .open(ContentDescriptor::html("<p>same</p>"), config())
        .await
        .expect("second");
    assert_ne!(first, second);
    assert_eq!(first.state(), PanelState::Minimized);
}

#[tokio::test(start_paused = true)]
async fn z_indices_increase_with_each_open() {
    let (_host, orchestrator) = orchestrator();
    for name in ["a", "b", "c"] {
        orchestrator
            .open(template(name), stacked())
            .await
            .expect("open");
    }
    let z: Vec<i32> = orchestrator
        .stack_snapshot()
        .iter()
        .map(|entry| entry.z_index)
        .collect();
    assert_eq!(z, [BASE_Z_INDEX + 1, BASE_Z_INDEX + 2, BASE_Z_INDEX + 3]);
    let top = orchestrator.top_panel().expect("top");
    assert_eq!(top.title(), "Untitled");
    assert_eq!(
        orchestrator.stack_snapshot().last().map(|e| e.id.clone()),
        Some(top.id().clone())
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_ids_and_empty_content_are_rejected() {
    let (_host, orchestrator) = orchestrator();
    orchestrator
        .open(template("a"), stacked().with_id("settings"))
        .await
        .expect("first");
    let duplicate = orchestrator
        .open(template("b"), stacked().with_id("settings"))
        .await;
    assert!(matches!(duplicate, Err(PanelError::DuplicateId(id)) if id == "settings"));
    let empty = orchestrator.open(ContentDescriptor::html("  "), quick()).await;
    assert!(matches!(empty, Err(PanelError::MissingContent)));
    assert_eq!(orchestrator.open_panels_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_closes_tear_down_once() {
    let (host, orchestrator) = orchestrator();
    let handle = orchestrator
        .open(ContentDescriptor::component::<Counted>(), quick())
        .await
        .expect("open");
    let id = handle.id().clone();
    let (a, b, c) = tokio::join!(
        handle.close(Some(json!("first"))),
        handle.close(None),
        orchestrator.close(id.as_str()),
    );
    let outcomes = [a, b, c.expect("known panel")];
    assert_eq!(
        outcomes.iter().filter(|o| **o == CloseOutcome::Closed).count(),
        1
    );
    assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    assert_eq!(handle.wait_closed().await, Some(json!("first")));
    assert_eq!(host.layer_count(), 0);
    assert!(matches!(
        orchestrator.close(id.as_str()).await,
        Err(PanelError::UnknownPanel(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn prevent_close_keeps_the_panel() {
    let (_host, orchestrator) = orchestrator();
    let allow = Arc::new(AtomicBool::new(false));
    let gate = allow.clone();
    let handle = orchestrator
        .open(
            template("guarded"),
            quick().with_prevent_close(PreventClose::sync(move || gate.load(Ordering::SeqCst))),
        )
        .await
        .expect("open");
    let mut prevented = handle.on_close_prevented();

    assert_eq!(handle.close(None).await, CloseOutcome::Prevented);
    assert!(prevented.recv().await.is_ok());
    assert!(handle.state().is_visible());

    // close_all skips it too.
    assert_eq!(orchestrator.close_all().await, 0);
    assert_eq!(orchestrator.open_panels_count(), 1);

    allow.store(true, Ordering::SeqCst);
    assert_eq!(handle.close(None).await, CloseOutcome::Closed);
    assert_eq!(orchestrator.open_panels_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn minimize_restore_close_keeps_a_valid_history() {
    let (_host, orchestrator) = orchestrator();
    let handle = orchestrator
        .open(template("cycle"), quick().with_minimizable(true))
        .await
        .expect("open");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(handle.state(), PanelState::Open);

    assert!(handle.minimize());
    assert!(orchestrator.tabs().restore_tab(handle.id()));
    assert!(handle.minimize());
    assert_eq!(handle.close(None).await, CloseOutcome::Closed);

    let history = handle.state_history();
    assert!(is_valid_history(&history), "{history:?}");
    assert_eq!(
        history,
        [
            PanelState::Opening,
            PanelState::Open,
            PanelState::Minimized,
            PanelState::Open,
            PanelState::Minimized,
            PanelState::Closing,
            PanelState::Closed,
        ]
    );
    assert!(orchestrator.tabs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn streams_complete_once_the_panel_closes() {
    let (_host, orchestrator) = orchestrator();
    let handle = orchestrator
        .open(template("streams"), quick())
        .await
        .expect("open");
    let mut changes = handle.on_state_change();
    let mut closed = handle.on_closed();

    handle.close(Some(json!({ "saved": true }))).await;

    let mut last = None;
    loop {
        match changes.recv().await {
            Ok(change) => last = Some(change),
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(_)) => continue,
        }
    }
    assert_eq!(
        last,
        Some(StateChange {
            from: PanelState::Closing,
            to: PanelState::Closed
        })
    );
    let event = closed.recv().await.expect("closed event");
    assert_eq!(event.result, Some(json!({ "saved": true })));
    assert!(matches!(closed.recv().await, Err(RecvError::Closed)));

    // Late subscribers see a completed stream straight away.
    assert!(matches!(handle.on_opened().recv().await, Err(RecvError::Closed)));
    assert!(handle.events().all_finalized());
}

#[tokio::test(start_paused = true)]
async fn route_changes_close_opted_in_panels() {
    let (_host, orchestrator) = orchestrator();
    let leaves = orchestrator
        .open(template("leaves"), stacked())
        .await
        .expect("leaves");
    let stays = orchestrator
        .open(
            template("stays"),
            stacked().with_close_on_route_change(false),
        )
        .await
        .expect("stays");
    tokio::task::yield_now().await;

    assert_eq!(orchestrator.navigate("/next"), 1);
    leaves.wait_closed().await;
    assert_eq!(leaves.state(), PanelState::Closed);
    assert!(stays.state().is_visible());
    assert_eq!(orchestrator.open_panels_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_components_leave_nothing_behind() {
    let (host, orchestrator) = orchestrator();
    let broken = ComponentRef::from_fn("broken", |_ctx| {
        Err(PanelError::content(
            term_sidebar::content::ContentKind::Component,
            "no backend",
        ))
    });
    let result = orchestrator
        .open(ContentDescriptor::Component(broken), quick())
        .await;
    assert!(matches!(result, Err(PanelError::ContentCreation { .. })));
    assert_eq!(orchestrator.open_panels_count(), 0);
    assert_eq!(host.layer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn close_all_closes_every_stacked_panel_once() {
    let (host, orchestrator) = orchestrator();
    let mut receivers = Vec::new();
    for name in ["one", "two", "three"] {
        let handle = orchestrator
            .open(template(name), stacked())
            .await
            .expect("open");
        receivers.push(handle.on_closed());
    }
    assert_eq!(orchestrator.open_panels_count(), 3);

    assert_eq!(orchestrator.close_all().await, 3);
    assert_eq!(orchestrator.open_panels_count(), 0);
    assert_eq!(host.layer_count(), 0);
    for mut closed in receivers {
        assert!(closed.recv().await.is_ok());
        assert!(matches!(closed.recv().await, Err(RecvError::Closed)));
    }
}

#[tokio::test(start_paused = true)]
async fn restoring_through_the_handle_clears_the_tab() {
    let (_host, orchestrator) = orchestrator();
    let handle = orchestrator
        .open(
            template("edge"),
            quick()
                .with_minimizable(true)
                .with_position(PanelPosition::Right),
        )
        .await
        .expect("open");

    assert!(handle.minimize());
    assert_eq!(handle.state(), PanelState::Minimized);
    assert_eq!(orchestrator.tabs().tabs_by_position(PanelPosition::Right).len(), 1);

    assert!(handle.restore());
    assert_eq!(handle.state(), PanelState::Open);
    assert!(orchestrator.tabs().tabs_by_position(PanelPosition::Right).is_empty());
    assert!(orchestrator.tabs().is_empty());
}
