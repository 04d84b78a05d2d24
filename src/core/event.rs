//! Session events and delivery
//!
//! Sessions never call the host directly. Each running session owns a
//! [`Notifier`]: a bounded queue drained by a dispatcher thread that hands
//! events to the shared [`EventSink`]. Enqueueing never blocks; when the
//! queue is full the newest event is dropped and counted. Closing a
//! notifier yields a `DispatcherHandle` whose `join` returns once `Exit`
//! has been delivered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default per-session event queue capacity
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 100;

/// State change reported to the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Output written to the session, as given to `write`
    Data { bytes: Vec<u8> },
    /// Screen resized
    Resize { cols: u16, rows: u16 },
    /// Cursor position after a single byte was applied
    CursorMoved { x: u16, y: u16 },
    /// Session stopped; always the last event of a session
    Exit,
}

/// Receiver of session events
///
/// One sink is shared by every session of a registry and is called from
/// each session's dispatcher thread, so implementations must tolerate
/// concurrent calls. Calls for a single session are sequential and in
/// mutation order.
pub trait EventSink: Send + Sync {
    fn emit(&self, session_id: &str, event: Event);
}

impl<F> EventSink for F
where
    F: Fn(&str, Event) + Send + Sync,
{
    fn emit(&self, session_id: &str, event: Event) {
        self(session_id, event)
    }
}

/// Sink forwarding `(session id, event)` pairs into a channel
pub struct ChannelSink {
    tx: Sender<(String, Event)>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<(String, Event)>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, session_id: &str, event: Event) {
        // Receiver gone means the host stopped listening
        let _ = self.tx.send((session_id.to_string(), event));
    }
}

/// Bounded, non-blocking event queue of one session
pub(crate) struct Notifier {
    session_id: String,
    tx: SyncSender<Event>,
    dropped: Arc<AtomicU64>,
    /// Set the first time a send finds the dispatcher dead
    dispatcher_gone: AtomicBool,
    dispatcher: JoinHandle<()>,
}

impl Notifier {
    /// Start the dispatcher thread for `session_id`
    ///
    /// The dispatcher delivers queued events in order and emits
    /// [`Event::Exit`] once the notifier is closed and the queue drained.
    pub(crate) fn spawn(
        session_id: &str,
        sink: Arc<dyn EventSink>,
        capacity: usize,
        dropped: Arc<AtomicU64>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<Event>(capacity.max(1));
        let id = session_id.to_string();

        let dispatcher = thread::Builder::new()
            .name(format!("termplex-events-{}", session_id))
            .spawn(move || {
                for event in rx {
                    sink.emit(&id, event);
                }
                sink.emit(&id, Event::Exit);
                debug!(session = %id, "event dispatcher finished");
            })?;

        Ok(Self {
            session_id: session_id.to_string(),
            tx,
            dropped,
            dispatcher_gone: AtomicBool::new(false),
            dispatcher,
        })
    }

    /// Queue an event without blocking
    pub(crate) fn notify(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    session = %self.session_id,
                    ?event,
                    dropped,
                    "event queue full, dropping event"
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                if !self.dispatcher_gone.swap(true, Ordering::Relaxed) {
                    warn!(
                        session = %self.session_id,
                        "event dispatcher is gone, events are discarded"
                    );
                }
            }
        }
    }

    /// Close the queue; the dispatcher drains it and then emits `Exit`
    pub(crate) fn close(self) -> DispatcherHandle {
        let Self {
            session_id,
            tx,
            dispatcher,
            ..
        } = self;
        drop(tx);
        DispatcherHandle {
            session_id,
            handle: dispatcher,
        }
    }
}

/// Dispatcher thread of a closed notifier
pub(crate) struct DispatcherHandle {
    session_id: String,
    handle: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Wait until the dispatcher has delivered `Exit`
    ///
    /// Called from the dispatcher itself (a sink stopping its own session)
    /// this returns at once; `Exit` follows when the sink call returns.
    pub(crate) fn join(self) {
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!(session = %self.session_id, "event dispatcher panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_closure_sink() {
        let (tx, rx) = mpsc::channel();
        let sink = move |id: &str, event: Event| {
            tx.send((id.to_string(), event)).unwrap();
        };

        sink.emit("a", Event::Resize { cols: 3, rows: 4 });
        assert_eq!(
            rx.recv().unwrap(),
            ("a".to_string(), Event::Resize { cols: 3, rows: 4 })
        );
    }

    #[test]
    fn test_notifier_delivers_in_order_then_exit() {
        let (sink, rx) = ChannelSink::new();
        let dropped = Arc::new(AtomicU64::new(0));
        let notifier = Notifier::spawn("s1", Arc::new(sink), 16, dropped.clone()).unwrap();

        notifier.notify(Event::CursorMoved { x: 1, y: 0 });
        notifier.notify(Event::Data { bytes: b"a".to_vec() });
        notifier.close().join();

        // Everything is delivered once join returns
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                ("s1".to_string(), Event::CursorMoved { x: 1, y: 0 }),
                ("s1".to_string(), Event::Data { bytes: b"a".to_vec() }),
                ("s1".to_string(), Event::Exit),
            ]
        );
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate = parking_lot::Mutex::new(gate_rx);
        let (tx, rx) = mpsc::channel();
        let sink = move |_: &str, event: Event| {
            // Blocks until the gate sender is dropped
            let _ = gate.lock().recv();
            let _ = tx.send(event);
        };

        let dropped = Arc::new(AtomicU64::new(0));
        let notifier = Notifier::spawn("s1", Arc::new(sink), 2, dropped.clone()).unwrap();
        for x in 0..10 {
            notifier.notify(Event::CursorMoved { x, y: 0 });
        }

        // At most one event in the dispatcher plus two queued
        let dropped_count = dropped.load(Ordering::Relaxed);
        assert!(dropped_count >= 7, "dropped {}", dropped_count);

        drop(gate_tx);
        let dispatcher = notifier.close();

        let mut delivered = Vec::new();
        loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if event == Event::Exit {
                break;
            }
            delivered.push(event);
        }
        dispatcher.join();

        assert_eq!(delivered.len() as u64 + dropped_count, 10);
        assert_eq!(delivered[0], Event::CursorMoved { x: 0, y: 0 });
        let xs: Vec<u16> = delivered
            .iter()
            .map(|event| match event {
                Event::CursorMoved { x, .. } => *x,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert!(xs.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_dead_dispatcher_is_reported_once() {
        let sink = |_: &str, _: Event| {
            panic!("sink failure");
        };
        let dropped = Arc::new(AtomicU64::new(0));
        let notifier = Notifier::spawn("s1", Arc::new(sink), 4, dropped).unwrap();

        notifier.notify(Event::CursorMoved { x: 1, y: 0 });
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !notifier.dispatcher_gone.load(Ordering::Relaxed) {
            assert!(std::time::Instant::now() < deadline, "dispatcher never died");
            thread::sleep(Duration::from_millis(5));
            notifier.notify(Event::CursorMoved { x: 2, y: 0 });
        }

        // Later sends are discarded quietly
        for x in 0..100 {
            notifier.notify(Event::CursorMoved { x, y: 0 });
        }
        assert!(notifier.dispatcher_gone.load(Ordering::Relaxed));
        notifier.close().join();
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let value = toml::Value::try_from(Event::Resize { cols: 80, rows: 24 }).unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table["type"].as_str(), Some("resize"));
        assert_eq!(table["cols"].as_integer(), Some(80));
    }
}
