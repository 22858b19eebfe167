//! Owns the frame cadence: the strict order of drain → dispatch →
//! reconcile → layout → focus → rasterize → diff/emit → swap, plus
//! terminal and input-task lifecycle around it.
//!
//! Everything here runs on one task thread. Handler futures are spawned
//! via `tokio::task::spawn_local` and awaited to completion before the
//! loop proceeds to the next step, which is what gives §5's "while a
//! handler is suspended the loop does not begin a new frame" guarantee
//! while still surfacing a handler panic as a `JoinError` instead of
//! unwinding the loop itself. Callers must run `RenderLoop::run` inside a
//! `tokio::task::LocalSet`.

use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use core_events::{CommandEvent, Event, EventSourceRegistry, InputEvent, NoopEventHooks};
use core_grid::Grid;
use core_grid::writer::Writer;
use core_input::TerminalInputSource;
use core_router::{RouteOutcome, Router};
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalCapabilities, TerminalGuard};
use core_tree::{ActionContext, Desc, FocusRing, Tree};

pub use core_events::EventHooks;

const EVENT_CHANNEL_CAP: usize = 256;

/// Knobs the loop needs at startup; the rest lives in `core_config`.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub click_threshold: Duration,
    pub enable_mouse: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            click_threshold: core_input::DEFAULT_THRESHOLD,
            enable_mouse: true,
        }
    }
}

impl From<&core_config::AppConfig> for RuntimeOptions {
    fn from(cfg: &core_config::AppConfig) -> Self {
        Self {
            click_threshold: cfg.input.click_threshold(),
            enable_mouse: cfg.input.mouse_tracking,
        }
    }
}

/// A function that rebuilds the declarative tree from current application
/// state. Called once per frame; must not block.
pub type BuildFn = Rc<dyn Fn() -> Desc>;

/// What to do when a handler's spawned task panics.
pub enum RescuePolicy {
    /// Swap `build` for this fallback surface and keep running.
    Rescue(BuildFn),
    /// Stop the loop and return an error from `run`.
    Terminate,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CommandQuit,
    Cancelled,
    ChannelClosed,
    HandlerFailureTerminate,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::Cancelled => "cancelled",
            ShutdownReason::ChannelClosed => "channel_closed",
            ShutdownReason::HandlerFailureTerminate => "handler_failure_terminate",
        }
    }
}

/// Owns the tree, focus ring, router, input task, and terminal guard for
/// one running application. Built via [`RenderLoop::start`].
pub struct RenderLoop<'a> {
    tree: Rc<std::cell::RefCell<Tree>>,
    ring: Rc<std::cell::RefCell<FocusRing>>,
    router: Router,
    ctx: ActionContext,
    build: BuildFn,
    rescue: RescuePolicy,
    grid: Grid,
    prev_grid: Grid,
    writer: Writer,
    hooks: Box<dyn EventHooks>,
    rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
    input_task: Option<tokio::task::JoinHandle<()>>,
    input_shutdown: Option<core_input::InputShutdown>,
    cancellation: CancellationToken,
    capabilities: TerminalCapabilities,
    _terminal_guard: TerminalGuard<'a>,
}

impl<'a> RenderLoop<'a> {
    /// Enters the terminal, queries capabilities, enables mouse tracking,
    /// spawns the input task, and builds+renders the first frame. Returns
    /// a loop ready for [`RenderLoop::run`].
    pub fn start(
        backend: &'a mut CrosstermBackend,
        build: BuildFn,
        rescue: RescuePolicy,
        options: RuntimeOptions,
    ) -> Result<Self> {
        let mut guard = backend.enter_guard().context("entering terminal")?;
        guard.backend_mut().query_capabilities().ok();
        if options.enable_mouse {
            guard
                .backend_mut()
                .enable_mouse_tracking()
                .context("enabling mouse tracking")?;
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAP);
        // Terminal input needs an `InputShutdown` handle for an orderly
        // stop, so it's spawned directly rather than through the generic
        // registry. The registry stays available for future ambient
        // sources (timers, file watchers) that don't need bespoke shutdown.
        let mut registry = EventSourceRegistry::new();
        let source_handles = registry.spawn_all(&tx);
        let (input_task, input_shutdown) =
            TerminalInputSource::new(options.click_threshold).spawn_with_shutdown(tx.clone());

        let tree = Rc::new(std::cell::RefCell::new(Tree::new()));
        let ring = Rc::new(std::cell::RefCell::new(FocusRing::new()));
        let cancellation = CancellationToken::new();

        let invalidate_tx = tx.clone();
        let stop_tx = tx.clone();
        let ctx = ActionContext::new(tree.clone(), ring.clone())
            .with_cancellation(cancellation.clone())
            .with_invalidate(Rc::new(move || {
                let _ = invalidate_tx.try_send(Event::RenderRequested);
            }))
            .with_stop(Rc::new(move || {
                let _ = stop_tx.try_send(Event::Command(CommandEvent::Quit));
            }));

        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));

        let mut this = Self {
            tree,
            ring,
            router: Router::new(),
            ctx,
            build,
            rescue,
            grid: Grid::new(cols, rows),
            prev_grid: Grid::new(cols, rows),
            writer: Writer::new(),
            hooks: Box::new(NoopEventHooks),
            rx,
            tx,
            source_handles,
            input_task: Some(input_task),
            input_shutdown: Some(input_shutdown),
            cancellation,
            capabilities: TerminalCapabilities::detect(),
            _terminal_guard: guard,
        };

        this.run_frame_pipeline()?;
        Ok(this)
    }

    /// Installs hooks observing events at the loop boundary.
    pub fn with_hooks(mut self, hooks: Box<dyn EventHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// A sender handle a caller can use to post synthetic events (e.g. a
    /// `CommandEvent::Quit` from an out-of-band Ctrl-C watcher).
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Capabilities detected so far: the optimistic defaults until a DA1
    /// reply has been parsed by [`RenderLoop::dispatch_input`].
    pub fn capabilities(&self) -> TerminalCapabilities {
        self.capabilities
    }

    /// Runs until a quit command, cancellation, or channel closure. Must
    /// be driven inside a `tokio::task::LocalSet` because handler futures
    /// and the node tree are `!Send`.
    pub async fn run(mut self) -> Result<()> {
        let reason = loop {
            if self.cancellation.is_cancelled() {
                break ShutdownReason::Cancelled;
            }

            let Some(first) = self.rx.recv().await else {
                break ShutdownReason::ChannelClosed;
            };

            let mut batch = vec![first];
            while let Ok(next) = self.rx.try_recv() {
                batch.push(next);
            }

            let mut stop = None;
            for event in batch {
                self.hooks.pre_handle(&event);
                match self.dispatch(event.clone()).await {
                    Ok(Some(reason)) => {
                        stop = Some(reason);
                        self.hooks.post_handle(&event);
                        break;
                    }
                    Ok(None) => self.hooks.post_handle(&event),
                    Err(reason) => {
                        stop = Some(reason);
                        self.hooks.post_handle(&event);
                        break;
                    }
                }
            }

            if let Some(reason) = stop {
                break reason;
            }

            if let Err(err) = self.run_frame_pipeline() {
                error!(target: "runtime.render", ?err, "frame_pipeline_failed");
                break ShutdownReason::ChannelClosed;
            }
        };

        self.shutdown(reason).await;
        Ok(())
    }

    /// Dispatches one event through the router, awaiting any returned
    /// handler future on the local task set. Returns `Some(reason)` when
    /// the loop should stop, `None` to continue to the next event.
    async fn dispatch(&mut self, event: Event) -> Result<Option<ShutdownReason>, ShutdownReason> {
        match event {
            Event::Command(CommandEvent::Quit) => return Ok(Some(ShutdownReason::CommandQuit)),
            Event::Shutdown => return Ok(Some(ShutdownReason::Cancelled)),
            Event::RenderRequested | Event::Tick => return Ok(None),
            Event::Input(input) => self.dispatch_input(input).await,
        }
    }

    async fn dispatch_input(&mut self, input: InputEvent) -> Result<Option<ShutdownReason>, ShutdownReason> {
        let outcome = match input {
            InputEvent::Key(key) => {
                let mut tree = self.tree.borrow_mut();
                match self.router.route_key(&mut tree, &key, &self.ctx) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(target: "runtime.router", ?err, "router_configuration_error");
                        return Ok(None);
                    }
                }
            }
            InputEvent::Mouse(mouse) => {
                let mut tree = self.tree.borrow_mut();
                let ring = self.ring.borrow();
                self.router.route_mouse(&mut tree, &ring, mouse, &self.ctx)
            }
            InputEvent::Resize(w, h) => {
                resize_grids(&mut self.grid, &mut self.prev_grid, w, h);
                return Ok(None);
            }
            InputEvent::TerminalResponse(bytes) => {
                match TerminalCapabilities::from_da1_response(&bytes) {
                    Some(caps) => {
                        debug!(target: "terminal.lifecycle", ?caps, "capabilities_detected");
                        self.capabilities = caps;
                    }
                    None => warn!(target: "terminal.lifecycle", "unparseable_terminal_response"),
                }
                return Ok(None);
            }
        };

        if let RouteOutcome::Handled { future: Some(future) } = outcome {
            let handle = tokio::task::spawn_local(future);
            if let Err(join_err) = handle.await {
                warn!(target: "runtime.handler", ?join_err, "handler_task_failed");
                return self.handle_failure(join_err);
            }
        }
        Ok(None)
    }

    fn handle_failure(
        &mut self,
        join_err: tokio::task::JoinError,
    ) -> Result<Option<ShutdownReason>, ShutdownReason> {
        match &self.rescue {
            RescuePolicy::Rescue(surface) => {
                error!(target: "runtime.handler", ?join_err, "handler_failed_rendering_rescue_surface");
                self.build = surface.clone();
                Ok(None)
            }
            RescuePolicy::Terminate => Err(ShutdownReason::HandlerFailureTerminate),
        }
    }

    /// Steps 3-8 of a single frame: reconcile, layout, focus, rasterize,
    /// diff+emit, swap.
    fn run_frame_pipeline(&mut self) -> Result<()> {
        let desc = (self.build)();
        {
            let mut tree = self.tree.borrow_mut();
            tree.reconcile(desc);
            tree.layout(core_grid::Rect::new(0, 0, self.grid.width(), self.grid.height()));
        }
        self.ring.borrow_mut().rebuild(&self.tree.borrow());
        self.ring.borrow().ensure_focus(&mut self.tree.borrow_mut());

        let mut next = Grid::new(self.grid.width(), self.grid.height());
        self.tree.borrow().render(&mut next);

        let bytes = self.writer.diff_and_emit(&self.grid, &next);
        if !bytes.is_empty() {
            use std::io::Write;
            std::io::stdout()
                .write_all(&bytes)
                .context("writing frame to terminal sink")?;
            std::io::stdout().flush().context("flushing terminal sink")?;
        }

        self.grid = next;
        Ok(())
    }

    async fn shutdown(&mut self, reason: ShutdownReason) {
        info!(target: "runtime.shutdown", reason = reason.as_str(), "shutdown_begin");
        self.rx.close();

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(())) => trace!(target: "runtime.shutdown", "event_source_stopped"),
                Ok(Err(err)) => warn!(target: "runtime.shutdown", ?err, "event_source_join_error"),
                Err(_) => warn!(target: "runtime.shutdown", "event_source_join_timeout"),
            }
        }

        if let Some(shutdown) = self.input_shutdown.take() {
            shutdown.signal();
        }
        if let Some(handle) = self.input_task.take() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(())) => trace!(target: "runtime.shutdown", "input_task_stopped"),
                Ok(Err(err)) => warn!(target: "runtime.shutdown", ?err, "input_task_join_error"),
                Err(_) => warn!(target: "runtime.shutdown", "input_task_join_timeout"),
            }
        }

        info!(target: "runtime.shutdown", reason = reason.as_str(), "shutdown_complete");
    }
}

fn resize_grids(grid: &mut Grid, prev_grid: &mut Grid, w: u16, h: u16) {
    *grid = Grid::new(w, h);
    *prev_grid = Grid::new(w, h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_grid::Rect;
    use core_tree::{Handled, Widget};

    struct Leaf;
    impl Widget for Leaf {
        fn render(&self, _grid: &mut Grid, _bounds: Rect) {}
        fn handle_input(&mut self, _event: &core_events::InputEvent) -> Handled {
            Handled::NotHandled
        }
    }

    #[test]
    fn runtime_options_from_config_carries_threshold_and_toggle() {
        let mut cfg = core_config::AppConfig::default();
        cfg.input.click_threshold_ms = 450;
        cfg.input.mouse_tracking = false;
        let options = RuntimeOptions::from(&cfg);
        assert_eq!(options.click_threshold, Duration::from_millis(450));
        assert!(!options.enable_mouse);
    }

    #[test]
    fn shutdown_reason_labels_are_stable() {
        assert_eq!(ShutdownReason::CommandQuit.as_str(), "command_quit");
        assert_eq!(ShutdownReason::Cancelled.as_str(), "cancelled");
        assert_eq!(ShutdownReason::ChannelClosed.as_str(), "channel_closed");
        assert_eq!(
            ShutdownReason::HandlerFailureTerminate.as_str(),
            "handler_failure_terminate"
        );
    }

    #[test]
    fn resize_grids_replaces_both_buffers_with_the_new_dimensions() {
        let mut grid = Grid::new(10, 10);
        let mut prev = Grid::new(10, 10);
        resize_grids(&mut grid, &mut prev, 40, 12);
        assert_eq!(grid.width(), 40);
        assert_eq!(grid.height(), 12);
        assert_eq!(prev.width(), 40);
        assert_eq!(prev.height(), 12);
    }

    #[test]
    fn build_fn_runs_against_a_fresh_tree() {
        let tree = Rc::new(std::cell::RefCell::new(Tree::new()));
        let ring = Rc::new(std::cell::RefCell::new(FocusRing::new()));
        let build: BuildFn = Rc::new(|| Desc::new(Leaf));
        let desc = build();
        let root = tree.borrow_mut().reconcile(desc);
        assert!(tree.borrow().root().is_some());
        ring.borrow_mut().rebuild(&tree.borrow());
        let _ = root;
    }
}
