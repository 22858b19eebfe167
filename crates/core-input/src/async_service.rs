use crate::click::ClickCounter;
use crate::key_token::map_key_event;
use core_events::{AsyncEventSource, Event, InputEvent, Modifiers, MouseAction, MouseButton, MouseEvent};
use crossterm::event::{
    Event as CEvent, EventStream, MouseEventKind as CMouseKind, MouseEvent as CMouseEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task::{self, JoinHandle};
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

/// Handle used by the render loop to ask the input task to stop promptly,
/// without waiting for the next terminal event to arrive.
#[derive(Clone, Debug)]
pub struct InputShutdown {
    notify: Arc<Notify>,
}

impl InputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    ShutdownSignal,
    ChannelClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

/// Async crossterm input source. Translates terminal events into
/// [`core_events::InputEvent`]s and forwards them over the shared channel;
/// this is the concrete [`AsyncEventSource`] registered at startup.
pub struct TerminalInputSource {
    click_threshold: Duration,
}

impl TerminalInputSource {
    pub fn new(click_threshold: Duration) -> Self {
        Self { click_threshold }
    }

    /// Spawns the task directly, returning a shutdown handle alongside the
    /// join handle — used by callers that need to request an early stop
    /// independently of dropping the channel (e.g. on Ctrl-C).
    pub fn spawn_with_shutdown(self, sender: Sender<Event>) -> (JoinHandle<()>, InputShutdown) {
        let notify = Arc::new(Notify::new());
        let shutdown = InputShutdown {
            notify: notify.clone(),
        };
        let threshold = self.click_threshold;
        let handle = task::spawn(async move {
            let span = tracing::debug_span!(target: "input.task", "terminal_input_task");
            let _enter = span.enter();
            let stream = EventStream::new();
            EventStreamTask::new(sender, stream, notify, threshold)
                .run()
                .await;
        });
        (handle, shutdown)
    }
}

impl AsyncEventSource for TerminalInputSource {
    fn name(&self) -> &'static str {
        "terminal_input"
    }

    fn spawn(self: Box<Self>, sender: Sender<Event>) -> JoinHandle<()> {
        self.spawn_with_shutdown(sender).0
    }
}

struct EventStreamTask<S>
where
    S: tokio_stream::Stream<Item = std::io::Result<CEvent>> + Send + Unpin + 'static,
{
    sender: Sender<Event>,
    stream: S,
    shutdown: Arc<Notify>,
    clicks: ClickCounter,
}

impl<S> EventStreamTask<S>
where
    S: tokio_stream::Stream<Item = std::io::Result<CEvent>> + Send + Unpin + 'static,
{
    fn new(sender: Sender<Event>, stream: S, shutdown: Arc<Notify>, click_threshold: Duration) -> Self {
        Self {
            sender,
            stream,
            shutdown,
            clicks: ClickCounter::new(click_threshold),
        }
    }

    async fn run(mut self) {
        info!(target: "input.task", "terminal_input_task_started");
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.notified() => break ExitReason::ShutdownSignal,
                item = self.stream.next() => item,
            };
            let Some(item) = next else {
                break ExitReason::StreamEnded;
            };
            match item {
                Ok(event) => {
                    if !self.handle_event(event).await {
                        break ExitReason::ChannelClosed;
                    }
                }
                Err(err) => {
                    warn!(target: "input.task", error = %err, "terminal_input_stream_error");
                    break ExitReason::StreamError;
                }
            }
        };
        info!(target: "input.task", reason = reason.as_str(), "terminal_input_task_stopped");
    }

    async fn handle_event(&mut self, event: CEvent) -> bool {
        match event {
            CEvent::Key(key) => {
                let Some(mapped) = map_key_event(&key) else {
                    return true;
                };
                trace!(target: "input.event", kind = "key", key = ?mapped.key);
                self.send(Event::Input(InputEvent::Key(mapped))).await
            }
            CEvent::Mouse(mouse) => {
                let Some(mut mapped) = map_mouse_event(mouse) else {
                    return true;
                };
                self.clicks.annotate(&mut mapped);
                trace!(
                    target: "input.event",
                    kind = "mouse",
                    action = ?mapped.action,
                    click_count = mapped.click_count,
                );
                self.send(Event::Input(InputEvent::Mouse(mapped))).await
            }
            CEvent::Resize(w, h) => {
                trace!(target: "input.event", w, h, "resize");
                self.send(Event::Input(InputEvent::Resize(w, h))).await
            }
            CEvent::FocusGained | CEvent::FocusLost | CEvent::Paste(_) => true,
        }
    }

    async fn send(&mut self, event: Event) -> bool {
        match self.sender.send(event).await {
            Ok(()) => true,
            Err(_) => {
                debug!(target: "input.task", "terminal_input_channel_closed");
                false
            }
        }
    }
}

fn map_mouse_event(event: CMouseEvent) -> Option<MouseEvent> {
    let mut mods = Modifiers::empty();
    if event.modifiers.contains(crossterm::event::KeyModifiers::SHIFT) {
        mods |= Modifiers::SHIFT;
    }
    if event.modifiers.contains(crossterm::event::KeyModifiers::ALT) {
        mods |= Modifiers::ALT;
    }
    if event.modifiers.contains(crossterm::event::KeyModifiers::CONTROL) {
        mods |= Modifiers::CONTROL;
    }

    let (button, action) = match event.kind {
        CMouseKind::Down(b) => (map_button(b), MouseAction::Down),
        CMouseKind::Up(b) => (map_button(b), MouseAction::Up),
        CMouseKind::Drag(b) => (map_button(b), MouseAction::Drag),
        CMouseKind::Moved => (MouseButton::None, MouseAction::Move),
        CMouseKind::ScrollUp => (MouseButton::ScrollUp, MouseAction::Down),
        CMouseKind::ScrollDown => (MouseButton::ScrollDown, MouseAction::Down),
        CMouseKind::ScrollLeft | CMouseKind::ScrollRight => return None,
    };

    Some(MouseEvent::new(button, action, event.column, event.row, mods, 1))
}

fn map_button(button: crossterm::event::MouseButton) -> MouseButton {
    match button {
        crossterm::event::MouseButton::Left => MouseButton::Left,
        crossterm::event::MouseButton::Right => MouseButton::Right,
        crossterm::event::MouseButton::Middle => MouseButton::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::Key;
    use crossterm::event::{
        KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKind, KeyEventState,
        KeyModifiers as CKeyModifiers, MouseButton as CMouseButton,
    };
    use tokio::sync::mpsc;

    async fn run_scenario(events: Vec<CEvent>) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel(64);
        let stream = tokio_stream::iter(events.into_iter().map(Ok));
        let notify = Arc::new(Notify::new());
        EventStreamTask::new(tx, stream, notify, Duration::from_millis(300))
            .run()
            .await;

        let mut outputs = Vec::new();
        while let Some(evt) = rx.recv().await {
            outputs.push(evt);
        }
        outputs
    }

    fn key(code: CKeyCode) -> CEvent {
        CEvent::Key(CKeyEvent {
            code,
            modifiers: CKeyModifiers::NONE,
            kind: CKind::Press,
            state: KeyEventState::empty(),
        })
    }

    #[tokio::test]
    async fn forwards_basic_key_events() {
        let outputs = run_scenario(vec![key(CKeyCode::Char('a'))]).await;
        match outputs.as_slice() {
            [Event::Input(InputEvent::Key(ev))] => assert_eq!(ev.key, Key::Char('a')),
            other => panic!("unexpected outputs: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_resize_event() {
        let outputs = run_scenario(vec![CEvent::Resize(120, 48)]).await;
        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Resize(120, 48))]
        ));
    }

    #[tokio::test]
    async fn mouse_down_events_get_click_counted() {
        fn down() -> CMouseEvent {
            CMouseEvent {
                kind: CMouseKind::Down(CMouseButton::Left),
                column: 3,
                row: 3,
                modifiers: CKeyModifiers::NONE,
            }
        }
        let outputs = run_scenario(vec![CEvent::Mouse(down()), CEvent::Mouse(down())]).await;
        assert_eq!(outputs.len(), 2);
        match &outputs[0] {
            Event::Input(InputEvent::Mouse(m)) => assert_eq!(m.click_count, 1),
            other => panic!("unexpected: {other:?}"),
        }
        match &outputs[1] {
            Event::Input(InputEvent::Mouse(m)) => assert_eq!(m.click_count, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_task_promptly() {
        let (tx, mut rx) = mpsc::channel(8);
        let (infinite_tx, infinite_rx) = tokio::sync::mpsc::unbounded_channel::<std::io::Result<CEvent>>();
        let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(infinite_rx);
        let notify = Arc::new(Notify::new());

        let task_notify = notify.clone();
        let task = tokio::spawn(async move {
            let _keep_alive = infinite_tx;
            EventStreamTask::new(tx, stream, task_notify, Duration::from_millis(300))
                .run()
                .await;
        });

        notify.notify_one();
        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("task should stop promptly")
            .expect("task join failed");
        assert!(rx.recv().await.is_none());
    }
}
