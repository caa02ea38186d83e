use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

use term_sidebar::terminal::TerminalHost;
use term_sidebar::ui::UiFrame;
use term_sidebar::{
    ContentDescriptor, FooterAction, InputOutcome, PanelConfig, PanelDefaults, PanelOrchestrator,
    PanelPosition, PanelSize, PanelState,
};

fn setup() -> (Arc<TerminalHost>, PanelOrchestrator) {
    let host = Arc::new(TerminalHost::new(Rect::new(0, 0, 80, 24)));
    (host.clone(), PanelOrchestrator::new(host))
}

fn notes() -> PanelConfig {
    PanelConfig::new()
        .with_title("Notes")
        .with_position(PanelPosition::Right)
        .with_size(PanelSize::Cells(30))
        .with_minimizable(true)
        .with_animation_duration(Duration::from_millis(100))
}

async fn settle(host: &TerminalHost) {
    tokio::time::advance(Duration::from_millis(150)).await;
    host.tick();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn click(column: u16, row: u16) -> Event {
    Event::Mouse(MouseEvent {
        kind: MouseEventKind::Down(MouseButton::Left),
        column,
        row,
        modifiers: KeyModifiers::NONE,
    })
}

fn render(host: &TerminalHost) -> Buffer {
    let area = host.area();
    let mut buffer = Buffer::empty(area);
    host.render(&mut UiFrame::from_parts(area, &mut buffer));
    buffer
}

fn row_text(buffer: &Buffer, row: u16) -> String {
    (0..buffer.area.width)
        .filter_map(|x| buffer.cell((x, row)).map(|c| c.symbol().to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn escape_closes_the_top_panel() {
    let (host, orchestrator) = setup();
    let handle = orchestrator
        .open(ContentDescriptor::html("<p>esc</p>"), notes())
        .await
        .expect("open");
    settle(&host).await;

    let esc = Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
    assert_eq!(orchestrator.dispatch_event(&esc), InputOutcome::CloseRequested);
    settle(&host).await;
    settle(&host).await;

    assert_eq!(handle.state(), PanelState::Closed);
    assert_eq!(orchestrator.open_panels_count(), 0);
    assert_eq!(host.layer_count(), 0);
    assert_eq!(orchestrator.dispatch_event(&esc), InputOutcome::Ignored);
}

#[tokio::test(start_paused = true)]
async fn escape_is_ignored_when_disabled() {
    let (host, orchestrator) = setup();
    let handle = orchestrator
        .open(
            ContentDescriptor::html("<p>sticky</p>"),
            notes().with_close_on_escape(false),
        )
        .await
        .expect("open");
    settle(&host).await;
    let mut keys = handle.on_key();

    let esc = Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
    assert_eq!(orchestrator.dispatch_event(&esc), InputOutcome::Ignored);
    assert_eq!(keys.recv().await.expect("key").code, KeyCode::Esc);
    assert_eq!(handle.state(), PanelState::Open);
}

#[tokio::test(start_paused = true)]
async fn clicking_the_close_glyph_closes() {
    let (host, orchestrator) = setup();
    let handle = orchestrator
        .open(ContentDescriptor::html("<p>click</p>"), notes())
        .await
        .expect("open");
    settle(&host).await;

    assert_eq!(orchestrator.dispatch_event(&click(77, 1)), InputOutcome::CloseRequested);
    settle(&host).await;
    settle(&host).await;
    assert_eq!(handle.state(), PanelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn backdrop_click_closes_and_reports_the_point() {
    let (host, orchestrator) = setup();
    let handle = orchestrator
        .open(ContentDescriptor::html("<p>backdrop</p>"), notes())
        .await
        .expect("open");
    settle(&host).await;
    let mut clicks = handle.on_backdrop_click();

    assert_eq!(orchestrator.dispatch_event(&click(10, 10)), InputOutcome::CloseRequested);
    let point = clicks.recv().await.expect("backdrop click");
    assert_eq!((point.column, point.row), (10, 10));
    settle(&host).await;
    settle(&host).await;
    assert_eq!(handle.state(), PanelState::Closed);
}

#[tokio::test(start_paused = true)]
async fn footer_button_runs_its_handler() {
    let (host, orchestrator) = setup();
    let saves = Arc::new(AtomicUsize::new(0));
    let counter = saves.clone();
    let config = notes().with_footer_buttons(vec![
        FooterAction::new("Save").on_click(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        FooterAction::new("Off").disabled(true),
    ]);
    orchestrator
        .open(ContentDescriptor::html("<p>footer</p>"), config)
        .await
        .expect("open");
    settle(&host).await;

    assert!(row_text(&render(&host), 22).contains(" Save "));
    assert_eq!(orchestrator.dispatch_event(&click(52, 22)), InputOutcome::Consumed);
    settle(&host).await;
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    // Disabled buttons swallow nothing.
    assert_eq!(orchestrator.dispatch_event(&click(59, 22)), InputOutcome::Ignored);
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn minimize_glyph_and_tab_round_trip() {
    let (host, orchestrator) = setup();
    let handle = orchestrator
        .open(ContentDescriptor::html("<p>tray</p>"), notes())
        .await
        .expect("open");
    settle(&host).await;

    assert_eq!(orchestrator.dispatch_event(&click(75, 1)), InputOutcome::Consumed);
    assert_eq!(handle.state(), PanelState::Minimized);
    settle(&host).await;
    assert!(orchestrator.tabs().tray_present());
    assert!(row_text(&render(&host), 23).ends_with(" Notes "));

    assert_eq!(orchestrator.dispatch_event(&click(79, 23)), InputOutcome::Consumed);
    assert_eq!(handle.state(), PanelState::Open);
    assert!(!orchestrator.tabs().tray_present());
    settle(&host).await;
    assert!(row_text(&render(&host), 2).contains("tray"));
}

#[tokio::test(start_paused = true)]
async fn defaults_file_feeds_every_open() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{ "position": "left", "size": {{ "cells": 20 }}, "animation_duration_ms": 40, "has_backdrop": false }}"#
    )
    .expect("write defaults");
    let defaults = PanelDefaults::load(file.path()).expect("load defaults");

    let host = Arc::new(TerminalHost::new(Rect::new(0, 0, 80, 24)));
    let orchestrator = PanelOrchestrator::with_defaults(host.clone(), defaults);
    let handle = orchestrator
        .open(
            ContentDescriptor::html("<p>defaults</p>"),
            PanelConfig::new().with_title("Left"),
        )
        .await
        .expect("open");
    let config = handle.config();
    assert_eq!(config.position, PanelPosition::Left);
    assert_eq!(config.size, PanelSize::Cells(20));
    assert_eq!(config.animation_duration, Duration::from_millis(40));
    assert!(!config.has_backdrop);

    settle(&host).await;
    assert_eq!(handle.state(), PanelState::Open);
    let buffer = render(&host);
    assert!(row_text(&buffer, 1).starts_with("│ Left"));
    // Nothing sits behind a panel without a backdrop.
    assert_eq!(orchestrator.dispatch_event(&click(60, 10)), InputOutcome::Ignored);
}

#[test]
fn malformed_defaults_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, r#"{{ "position": "diagonal" }}"#).expect("write defaults");
    assert!(PanelDefaults::load(file.path()).is_err());
    assert!(PanelDefaults::from_json(r#"{ "unknown_field": 1 }"#).is_err());
}
