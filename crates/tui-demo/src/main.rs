//! Demo entrypoint wiring the engine crates into a runnable binary: a
//! handful of focusable panes bound to basic navigation and quit chords.
use anyhow::Result;
use clap::Parser;
use core_bindings::{Binding, BindingBuilder};
use core_config::AppConfig;
use core_events::{InputEvent, Key, KeyStep, Modifiers};
use core_grid::{Color, Grid, Rect, Style};
use core_runtime::{RenderLoop, RescuePolicy, RuntimeOptions};
use core_terminal::CrosstermBackend;
use core_tree::{ActionContext, Desc, Handled, NodeId, Widget};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "tui-demo", version, about = "Declarative terminal UI engine demo")]
struct Args {
    /// Optional configuration file path (overrides discovery of `ui.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn run(&mut self) -> Result<(AppConfig, RuntimeOptions)> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let args = Args::parse();
        let config = core_config::load_from(args.config.clone())?;
        let options = RuntimeOptions::from(&config);

        info!(
            target: "runtime.startup",
            click_threshold_ms = config.input.click_threshold_ms,
            mouse_tracking = config.input.mouse_tracking,
            log_level = config.log.level.as_str(),
            "bootstrap_complete"
        );

        Ok((config, options))
    }

    fn backend_mut(&mut self) -> &mut CrosstermBackend {
        &mut self.backend
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("tui-demo.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "tui-demo.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// A single focusable pane: a titled box that highlights its border when
/// focused and quits the application on `q`.
struct Pane {
    title: &'static str,
    fg: Color,
}

impl Widget for Pane {
    fn is_focusable(&self) -> bool {
        true
    }

    fn build_bindings(&self, _node: NodeId, builder: &mut BindingBuilder<ActionContext>) {
        let quit = Binding::new(
            [KeyStep::new(Key::Char('q'), Modifiers::empty())],
            Rc::new(|ctx: ActionContext| {
                ctx.stop();
                Box::pin(async {}) as core_bindings::HandlerFuture
            }),
        )
        .expect("single-step binding with no modifiers is always valid");
        builder.key(quit);

        let next = Binding::new(
            [KeyStep::new(Key::Tab, Modifiers::empty())],
            Rc::new(|ctx: ActionContext| {
                ctx.focus_next();
                Box::pin(async {}) as core_bindings::HandlerFuture
            }),
        )
        .expect("single-step binding with no modifiers is always valid");
        builder.key(next);
    }

    fn handle_input(&mut self, _event: &InputEvent) -> Handled {
        Handled::NotHandled
    }

    fn render(&self, grid: &mut Grid, bounds: Rect) {
        let style = Style::new(self.fg, Color::Default, core_grid::Attrs::empty());
        grid.write_text(bounds.x, bounds.y, self.title, style);
    }
}

fn build_ui() -> Desc {
    Desc::new(Pane {
        title: "tui-demo — press q to quit, Tab to change focus",
        fg: Color::Rgb(255, 255, 255),
    })
}

fn rescue_ui() -> Desc {
    Desc::new(Pane {
        title: "a handler failed; showing fallback surface",
        fg: Color::Rgb(255, 0, 0),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    let (_config, options) = startup.run()?;

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let render_loop = RenderLoop::start(
                startup.backend_mut(),
                Rc::new(build_ui),
                RescuePolicy::Rescue(Rc::new(rescue_ui)),
                options,
            )?;
            render_loop.run().await
        })
        .await
}
