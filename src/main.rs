use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{Event, KeyCode, KeyEvent};
use indoc::indoc;
use ratatui::layout::Rect;
use serde_json::{Value, json};
use tracing::Level;

use term_sidebar::content::html;
use term_sidebar::drivers::OutputDriver;
use term_sidebar::drivers::console::{ConsoleInputDriver, ConsoleOutputDriver};
use term_sidebar::event_loop::{ControlFlow, EventLoop, LoopEvent};
use term_sidebar::keybindings::{Action, KeyBindings};
use term_sidebar::log_buffer::{LogBuffer, set_global_log_buffer};
use term_sidebar::terminal::TerminalHost;
use term_sidebar::ui::UiFrame;
use term_sidebar::{
    ComponentRef, ContentDescriptor, FooterAction, InputOutcome, MinimizedTabConfig,
    PanelConfig, PanelContent, PanelContext, PanelDefaults, PanelHandle, PanelOrchestrator,
    PanelPosition, PanelResult, PanelSize, PanelView, PreventClose, TemplateRef,
    WeakPanelHandle, theme, tracing_sub,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const THEMES: [&str; 3] = ["dark", "light", "solarized"];

#[derive(Debug, Parser)]
#[command(about = "Interactive demo of stacked slide-in panels")]
struct Args {
    /// JSON file with global panel defaults.
    #[arg(long)]
    defaults: Option<PathBuf>,
    /// Override the transition length in milliseconds.
    #[arg(long)]
    animation_ms: Option<u64>,
    /// Stack panels instead of replacing the open one.
    #[arg(long)]
    allow_multiple: bool,
    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let log = LogBuffer::new_default();
    set_global_log_buffer(log.clone());
    tracing_sub::init_default(args.log_level);

    let mut defaults = match &args.defaults {
        Some(path) => PanelDefaults::load(path).map_err(io::Error::other)?,
        None => PanelDefaults::default(),
    };
    if let Some(ms) = args.animation_ms {
        defaults.animation_duration_ms = Some(ms);
    }
    if args.allow_multiple {
        defaults.allow_multiple = Some(true);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    // Input handlers spawn closes and footer actions from this thread.
    let _guard = runtime.enter();

    let mut output = ConsoleOutputDriver::new()?;
    output.enter()?;
    let host = Arc::new(TerminalHost::new(output.area()?));
    let orchestrator = PanelOrchestrator::with_defaults(host.clone(), defaults);
    let mut app = Demo::new(host, orchestrator.clone(), log);

    let mut event_loop = EventLoop::new(ConsoleInputDriver::new(), FRAME_INTERVAL);
    let result = event_loop.run(|event| app.handle(event, &mut output));

    orchestrator.shutdown();
    output.exit()?;
    result
}

struct Demo {
    host: Arc<TerminalHost>,
    orchestrator: PanelOrchestrator,
    bindings: KeyBindings,
    log: LogBuffer,
    scroll: usize,
    routes: usize,
    settings_dirty: Arc<AtomicBool>,
    settings_theme: Arc<AtomicUsize>,
}

impl Demo {
    fn new(host: Arc<TerminalHost>, orchestrator: PanelOrchestrator, log: LogBuffer) -> Self {
        Self {
            host,
            orchestrator,
            bindings: KeyBindings::standard(),
            log,
            scroll: 0,
            routes: 0,
            settings_dirty: Arc::new(AtomicBool::new(false)),
            settings_theme: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn handle<O: OutputDriver>(&mut self, event: LoopEvent, output: &mut O) -> io::Result<ControlFlow> {
        match event {
            LoopEvent::Frame => {
                self.host.tick();
                output.draw(|mut frame| self.draw(&mut frame))?;
                Ok(ControlFlow::Continue)
            }
            LoopEvent::Input(Event::Resize(width, height)) => {
                self.host.resize(Rect::new(0, 0, width, height));
                Ok(ControlFlow::Continue)
            }
            LoopEvent::Input(event) => {
                if self.orchestrator.dispatch_event(&event) != InputOutcome::Ignored {
                    return Ok(ControlFlow::Continue);
                }
                match event {
                    Event::Key(key) => Ok(self.on_key(&key)),
                    _ => Ok(ControlFlow::Continue),
                }
            }
        }
    }

    fn on_key(&mut self, key: &KeyEvent) -> ControlFlow {
        let Some(action) = self.bindings.action_for_key(key) else {
            return ControlFlow::Continue;
        };
        tracing::debug!(%action, "shell action");
        match action {
            Action::Quit => return ControlFlow::Quit,
            Action::OpenSettings => self.open(self.settings(), settings_config(self.settings_dirty.clone())),
            Action::OpenHelp => self.open(help(&self.bindings), help_config()),
            Action::OpenNotes => self.open(ContentDescriptor::html(NOTES_HTML), notes_config()),
            Action::OpenLog => self.open(self.log_panel(), log_config()),
            Action::MinimizeTop => {
                if let Some(top) = self.orchestrator.top_panel()
                    && !top.minimize()
                {
                    tracing::info!(panel_id = %top.id(), "panel is not minimizable");
                }
            }
            Action::RestoreAll => {
                let tabs = self.orchestrator.tabs();
                for record in tabs.tabs() {
                    tabs.restore_tab(&record.id);
                }
            }
            Action::CloseAll => {
                let orchestrator = self.orchestrator.clone();
                tokio::spawn(async move {
                    let closed = orchestrator.close_all().await;
                    tracing::info!(closed, "closed all panels");
                });
            }
            Action::Navigate => {
                self.routes += 1;
                let route = format!("/demo/{}", self.routes);
                let listeners = self.orchestrator.navigate(route.clone());
                tracing::info!(%route, listeners, "navigated");
            }
            Action::ToggleAllowMultiple => {
                let mut defaults = self.orchestrator.defaults();
                let allow = !defaults.allow_multiple.unwrap_or(false);
                defaults.allow_multiple = Some(allow);
                self.orchestrator.set_defaults(defaults);
                tracing::info!(allow_multiple = allow, "stacking policy changed");
            }
            Action::ScrollUp if !self.host.scroll_locked() => {
                self.scroll = self.scroll.saturating_add(1);
            }
            Action::ScrollDown if !self.host.scroll_locked() => {
                self.scroll = self.scroll.saturating_sub(1);
            }
            Action::ScrollUp | Action::ScrollDown => {}
        }
        ControlFlow::Continue
    }

    fn open(&self, content: ContentDescriptor, config: PanelConfig) {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            match orchestrator.open(content, config).await {
                Ok(handle) => report_result(handle),
                Err(err) => tracing::warn!(error = %err, "open failed"),
            }
        });
    }

    fn settings(&self) -> ContentDescriptor {
        let dirty = self.settings_dirty.clone();
        let selected = self.settings_theme.clone();
        ContentDescriptor::Component(ComponentRef::from_fn("settings", move |ctx| {
            Ok(Box::new(Settings::create(ctx, dirty.clone(), selected.clone())) as Box<dyn PanelContent>)
        }))
    }

    fn log_panel(&self) -> ContentDescriptor {
        let log = self.log.clone();
        ContentDescriptor::Component(ComponentRef::from_fn("log", move |ctx| {
            LogView::create(ctx, log.clone()).map(|view| Box::new(view) as Box<dyn PanelContent>)
        }))
    }

    fn draw(&self, frame: &mut UiFrame<'_>) {
        let area = frame.area();
        if area.height == 0 {
            return;
        }
        let header = format!(
            " term-sidebar demo | panels: {} | minimized: {} | stacking: {} ",
            self.orchestrator.open_panels_count(),
            self.orchestrator.tabs().len(),
            if self.orchestrator.defaults().allow_multiple.unwrap_or(false) {
                "on"
            } else {
                "off"
            },
        );
        let header_row = Rect::new(area.x, area.y, area.width, 1);
        frame.fill(header_row, theme::status_bar());
        frame.set_string(header_row, area.x, area.y, &header, theme::status_bar());

        let keys: Vec<String> = self
            .bindings
            .help_entries()
            .into_iter()
            .map(|(action, key)| format!("{key}: {action}"))
            .collect();
        let help_rows = html::wrap(&keys.join("  "), area.width);
        let mut row = area.y + 1;
        for line in &help_rows {
            if row >= area.bottom() {
                return;
            }
            frame.set_string(area, area.x, row, line, theme::body());
            row += 1;
        }

        // Log tail fills the rest; the bottom row stays free for tabs.
        let visible = area.bottom().saturating_sub(row + 1) as usize;
        let lines = self.log.tail(visible + self.scroll);
        for line in lines.iter().take(visible) {
            frame.set_string(area, area.x, row, line, theme::body());
            row += 1;
        }
        self.host.render(frame);
    }
}

/// Log whatever the panel hands back when it closes.
fn report_result(handle: PanelHandle) {
    tokio::spawn(async move {
        let result = handle.wait_closed().await;
        tracing::info!(panel_id = %handle.id(), result = ?result, "panel closed");
    });
}

fn settings_config(dirty: Arc<AtomicBool>) -> PanelConfig {
    PanelConfig::new()
        .with_title("Settings")
        .with_position(PanelPosition::Right)
        .with_minimizable(true)
        .with_minimized_tab(MinimizedTabConfig {
            icon: Some("⚙".to_string()),
            ..MinimizedTabConfig::default()
        })
        .with_prevent_close(PreventClose::sync(move || {
            // Veto once; a second attempt discards the edits.
            let unsaved = dirty.swap(false, Ordering::SeqCst);
            if unsaved {
                tracing::warn!("unsaved settings; close again to discard");
            }
            !unsaved
        }))
}

fn help_config() -> PanelConfig {
    PanelConfig::new()
        .with_position(PanelPosition::Left)
        .with_size(PanelSize::Sm)
        .with_close_on_route_change(false)
}

fn notes_config() -> PanelConfig {
    PanelConfig::new()
        .with_title("Notes")
        .with_position(PanelPosition::Bottom)
        .with_size(PanelSize::Percent(40))
        .with_footer_template(PanelView::text("Esc closes  |  g changes route"))
}

fn log_config() -> PanelConfig {
    PanelConfig::new()
        .with_title("Log")
        .with_position(PanelPosition::Top)
        .with_size(PanelSize::Percent(50))
        .with_minimizable(true)
        .with_backdrop(false)
        .with_allow_multiple(true)
}

fn help(bindings: &KeyBindings) -> ContentDescriptor {
    let keys: Vec<Value> = bindings
        .help_entries()
        .into_iter()
        .map(|(action, key)| json!({ "key": key, "action": action.to_string() }))
        .collect();
    let template = TemplateRef::new("help", |ctx, width| {
        let mut lines = Vec::new();
        for entry in ctx["keys"].as_array().into_iter().flatten() {
            let key = entry["key"].as_str().unwrap_or_default();
            let action = entry["action"].as_str().unwrap_or_default();
            lines.extend(html::wrap(&format!("{key:>7}  {action}"), width));
        }
        lines
    });
    ContentDescriptor::template(template, json!({ "title": "Keys", "keys": keys }))
}

const NOTES_HTML: &str = indoc! {"
    <h1>Panels</h1>
    <p>Every panel slides in from one edge. Opening a panel while another is
    open closes the first one unless stacking is on.</p>
    <ul>
      <li>Esc or a backdrop click closes the top panel.</li>
      <li>Minimized panels leave a tab along the bottom or top row.</li>
      <li>Reopening minimized content restores it instead.</li>
    </ul>
"};

/// Theme picker with a Save/Cancel footer and unsaved-change protection.
struct Settings {
    dirty: Arc<AtomicBool>,
    selected: Arc<AtomicUsize>,
}

impl Settings {
    fn create(ctx: &PanelContext, dirty: Arc<AtomicBool>, selected: Arc<AtomicUsize>) -> Self {
        let panel = ctx
            .panel()
            .map(|handle| handle.downgrade())
            .unwrap_or_default();
        let save_panel = panel.clone();
        let save_dirty = dirty.clone();
        let save_theme = selected.clone();
        ctx.footer().register(vec![
            FooterAction::new("Save")
                .with_icon("✓")
                .with_color("green")
                .on_click_async(move || {
                    let panel = save_panel.clone();
                    let dirty = save_dirty.clone();
                    let theme = THEMES[save_theme.load(Ordering::SeqCst) % THEMES.len()];
                    async move {
                        dirty.store(false, Ordering::SeqCst);
                        if let Some(handle) = panel.upgrade() {
                            handle.close(Some(json!({ "theme": theme }))).await;
                        }
                    }
                }),
            FooterAction::new("Cancel").on_click_async(move || close_weak(panel.clone())),
        ]);
        Self { dirty, selected }
    }
}

async fn close_weak(panel: WeakPanelHandle) {
    if let Some(handle) = panel.upgrade() {
        handle.close(None).await;
    }
}

impl PanelContent for Settings {
    fn body(&self, width: u16) -> Vec<String> {
        let current = self.selected.load(Ordering::SeqCst) % THEMES.len();
        let mut lines = html::wrap("Left/Right picks a theme.", width);
        lines.push(String::new());
        for (index, name) in THEMES.iter().enumerate() {
            let marker = if index == current { ">" } else { " " };
            lines.push(format!("{marker} {name}"));
        }
        if self.dirty.load(Ordering::SeqCst) {
            lines.push(String::new());
            lines.push("(unsaved)".to_string());
        }
        lines
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let step = match key.code {
            KeyCode::Left => THEMES.len() - 1,
            KeyCode::Right => 1,
            _ => return false,
        };
        let next = (self.selected.load(Ordering::SeqCst) + step) % THEMES.len();
        self.selected.store(next, Ordering::SeqCst);
        self.dirty.store(true, Ordering::SeqCst);
        true
    }
}

/// Live tail of the log buffer.
struct LogView {
    log: LogBuffer,
}

impl LogView {
    fn create(ctx: &PanelContext, log: LogBuffer) -> PanelResult<Self> {
        ctx.footer()
            .set_custom_footer(Some(PanelView::text("m minimizes  |  Esc closes")));
        if let Some(panel) = ctx.panel() {
            panel.update_header_template(Some(PanelView::from_fn("log-header", {
                let log = log.clone();
                move |_| vec![format!("Log ({} lines)", log.len())]
            })));
        }
        Ok(Self { log })
    }
}

impl PanelContent for LogView {
    fn body(&self, width: u16) -> Vec<String> {
        self.log
            .tail(64)
            .iter()
            .flat_map(|line| html::wrap(line, width))
            .collect()
    }
}
