use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use serde_json::json;

use term_sidebar::terminal::TerminalHost;
use term_sidebar::ui::UiFrame;
use term_sidebar::{
    ContentDescriptor, PanelConfig, PanelDefaults, PanelOrchestrator, PanelPosition, TemplateRef,
};

#[derive(Parser, Debug)]
#[command(
    name = "sidebar-bench",
    version = env!("CARGO_PKG_VERSION"),
    about = "Churns the panel stack offscreen and reports lifecycle and render throughput"
)]
struct BenchCli {
    /// Number of open/close cycles to run.
    #[arg(short = 'n', long = "cycles", default_value_t = 2000)]
    cycles: u32,

    /// Transition length in milliseconds. Zero measures pure bookkeeping.
    #[arg(long = "animation-ms", default_value_t = 0)]
    animation_ms: u64,

    /// Keep previous panels open instead of replacing them.
    #[arg(long)]
    stack: bool,

    #[arg(long, default_value_t = 160)]
    width: u16,

    #[arg(long, default_value_t = 48)]
    height: u16,
}

struct BenchConfig {
    cycles: u32,
    area: Rect,
    defaults: PanelDefaults,
}

impl TryFrom<&BenchCli> for BenchConfig {
    type Error = String;

    fn try_from(cli: &BenchCli) -> Result<Self, Self::Error> {
        if cli.cycles == 0 {
            return Err("cycles must be at least 1".to_string());
        }
        if cli.animation_ms > 1_000 {
            return Err("animation-ms must be at most 1000".to_string());
        }
        if cli.width < 20 || cli.height < 8 {
            return Err("area must be at least 20x8".to_string());
        }
        Ok(Self {
            cycles: cli.cycles,
            area: Rect::new(0, 0, cli.width, cli.height),
            defaults: PanelDefaults {
                animation_duration_ms: Some(cli.animation_ms),
                allow_multiple: Some(cli.stack),
                minimizable: Some(true),
                ..PanelDefaults::default()
            },
        })
    }
}

fn main() -> io::Result<()> {
    let args = BenchCli::parse();
    let config = BenchConfig::try_from(&args)
        .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stats = runtime.block_on(run_benchmark(&config))?;
    println!("{}", stats.final_report(&config));
    Ok(())
}

fn content(cycle: u32) -> ContentDescriptor {
    // Four template names so re-opens of minimized content take the restore
    // path regularly.
    let name = format!("bench-{}", cycle % 4);
    ContentDescriptor::template(
        TemplateRef::new(name, |ctx, width| {
            let cycle = ctx["cycle"].as_u64().unwrap_or_default();
            (0..20)
                .map(|row| format!("{cycle:>6} row {row:>2} {}", "-".repeat(width as usize / 2)))
                .collect()
        }),
        json!({ "cycle": cycle, "title": format!("Bench {cycle}") }),
    )
}

async fn run_benchmark(config: &BenchConfig) -> io::Result<BenchStats> {
    let host = Arc::new(TerminalHost::new(config.area));
    let orchestrator = PanelOrchestrator::with_defaults(host.clone(), config.defaults.clone());
    let mut stats = BenchStats::new();
    let mut buffer = Buffer::empty(config.area);

    for cycle in 0..config.cycles {
        let position = PanelPosition::ALL[cycle as usize % PanelPosition::ALL.len()];
        let started = Instant::now();
        let handle = orchestrator
            .open(content(cycle), PanelConfig::new().with_position(position))
            .await
            .map_err(io::Error::other)?;
        stats.opens += 1;

        render(&host, &mut buffer, &mut stats);

        match cycle % 3 {
            0 => {
                if handle.minimize() {
                    stats.minimizes += 1;
                }
            }
            1 => {
                handle.close(None).await;
                stats.closes += 1;
            }
            _ => {}
        }
        render(&host, &mut buffer, &mut stats);
        stats.record_cycle(started.elapsed());
    }

    stats.closes += orchestrator.close_all().await as u64;
    orchestrator.shutdown();
    stats.mark_completed();
    Ok(stats)
}

fn render(host: &TerminalHost, buffer: &mut Buffer, stats: &mut BenchStats) {
    let started = Instant::now();
    host.tick();
    buffer.reset();
    let area = buffer.area;
    host.render(&mut UiFrame::from_parts(area, buffer));
    stats.record_frame(started.elapsed());
}

struct BenchStats {
    start: Instant,
    completed_at: Option<Instant>,
    opens: u64,
    minimizes: u64,
    closes: u64,
    cycles: u64,
    frames: u64,
    total_cycle_time: Duration,
    slowest_cycle: Duration,
    total_frame_time: Duration,
}

impl BenchStats {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            completed_at: None,
            opens: 0,
            minimizes: 0,
            closes: 0,
            cycles: 0,
            frames: 0,
            total_cycle_time: Duration::ZERO,
            slowest_cycle: Duration::ZERO,
            total_frame_time: Duration::ZERO,
        }
    }

    fn elapsed(&self) -> Duration {
        match self.completed_at {
            Some(done) => done.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    fn mark_completed(&mut self) {
        self.completed_at = Some(Instant::now());
    }

    fn record_cycle(&mut self, time: Duration) {
        self.cycles += 1;
        self.total_cycle_time += time;
        self.slowest_cycle = self.slowest_cycle.max(time);
    }

    fn record_frame(&mut self, time: Duration) {
        self.frames += 1;
        self.total_frame_time += time;
    }

    fn average_ms(total: Duration, count: u64) -> f64 {
        if count == 0 {
            return 0.0;
        }
        total.as_secs_f64() / count as f64 * 1_000.0
    }

    fn final_report(&self, config: &BenchConfig) -> String {
        let elapsed = self.elapsed().as_secs_f64();
        let cycles_per_sec = if elapsed > 0.0 {
            self.cycles as f64 / elapsed
        } else {
            0.0
        };
        indoc::formatdoc!(
            r#"
            Sidebar bench finished {cycles} cycles in {elapsed:.2}s ({rate:.0} cycles/s).
            Area: {width}x{height} | stacking: {stacking}
            Opens: {opens} | Minimizes: {minimizes} | Closes: {closes}
            Avg cycle: {avg_cycle:.3} ms | Worst: {worst:.3} ms
            Frames: {frames} | Avg frame: {avg_frame:.3} ms
            "#,
            cycles = self.cycles,
            elapsed = elapsed,
            rate = cycles_per_sec,
            width = config.area.width,
            height = config.area.height,
            stacking = config.defaults.allow_multiple.unwrap_or(false),
            opens = self.opens,
            minimizes = self.minimizes,
            closes = self.closes,
            avg_cycle = Self::average_ms(self.total_cycle_time, self.cycles),
            worst = self.slowest_cycle.as_secs_f64() * 1_000.0,
            frames = self.frames,
            avg_frame = Self::average_ms(self.total_frame_time, self.frames),
        )
    }
}
