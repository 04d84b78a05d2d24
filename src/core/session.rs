//! Session management
//!
//! A session owns one screen buffer and serializes every operation on it
//! behind a single lock. Events are queued while the lock is held, so the
//! host sees them in exactly the order the buffer was mutated.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::error::{Result, SessionError};
use super::event::{DispatcherHandle, Event, EventSink, Notifier};
use super::screen::{ScreenBuffer, ScreenSnapshot};

/// Session lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    /// Terminal state
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Parameters for a new session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Shell hint for the process collaborator; never interpreted here
    pub shell: Option<String>,
    pub cols: u16,
    pub rows: u16,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: None,
            cols: 80,
            rows: 24,
        }
    }
}

impl SessionOptions {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            shell: None,
            cols,
            rows,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

/// A terminal session
pub struct Session {
    id: String,
    shell: Option<String>,
    sink: Arc<dyn EventSink>,
    queue_capacity: usize,
    /// Events lost to a full queue
    dropped: Arc<AtomicU64>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: SessionState,
    buffer: Option<ScreenBuffer>,
    notifier: Option<Notifier>,
}

impl Inner {
    /// Buffer and notifier of a running session
    fn live(
        &mut self,
        id: &str,
        operation: &'static str,
    ) -> Result<(&mut ScreenBuffer, &Notifier)> {
        match (self.state, self.buffer.as_mut(), self.notifier.as_ref()) {
            (SessionState::Running, Some(buffer), Some(notifier)) => Ok((buffer, notifier)),
            (state, _, _) => Err(SessionError::InvalidState {
                id: id.to_string(),
                state,
                operation,
            }),
        }
    }

    /// Stop and close the queue; the caller joins the dispatcher once the
    /// session lock is released
    fn teardown(&mut self) -> Option<DispatcherHandle> {
        self.state = SessionState::Stopped;
        self.buffer = None;
        self.notifier.take().map(Notifier::close)
    }
}

impl Session {
    /// Create a session in the `Created` state
    pub fn new(
        id: impl Into<String>,
        options: SessionOptions,
        sink: Arc<dyn EventSink>,
        queue_capacity: usize,
    ) -> Result<Self> {
        validate_size(options.cols, options.rows)?;

        Ok(Self {
            id: id.into(),
            shell: options.shell,
            sink,
            queue_capacity,
            dropped: Arc::new(AtomicU64::new(0)),
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                buffer: Some(ScreenBuffer::new(options.cols, options.rows)),
                notifier: None,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn shell(&self) -> Option<&str> {
        self.shell.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Number of events dropped because the host fell behind
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Start accepting operations
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Created {
            return Err(SessionError::InvalidState {
                id: self.id.clone(),
                state: inner.state,
                operation: "start",
            });
        }

        let notifier = Notifier::spawn(
            &self.id,
            self.sink.clone(),
            self.queue_capacity,
            self.dropped.clone(),
        )
        .map_err(SessionError::Dispatcher)?;

        inner.notifier = Some(notifier);
        inner.state = SessionState::Running;
        info!(session = %self.id, shell = ?self.shell, "session started");
        Ok(())
    }

    /// Stop the session and release its screen
    ///
    /// Returns once `Exit` has been delivered, after every event queued
    /// before the stop. Stopping twice is a no-op.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            SessionState::Stopped => Ok(()),
            SessionState::Created => Err(SessionError::InvalidState {
                id: self.id.clone(),
                state: SessionState::Created,
                operation: "stop",
            }),
            SessionState::Running => {
                let dispatcher = inner.teardown();
                drop(inner);
                if let Some(dispatcher) = dispatcher {
                    dispatcher.join();
                }
                info!(
                    session = %self.id,
                    dropped_events = self.dropped_events(),
                    "session stopped"
                );
                Ok(())
            }
        }
    }

    /// Apply output to the screen and report it as `Data`
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let (buffer, notifier) = inner.live(&self.id, "write")?;

        apply(buffer, notifier, bytes);
        notifier.notify(Event::Data {
            bytes: bytes.to_vec(),
        });
        debug!(session = %self.id, len = bytes.len(), "write");
        Ok(())
    }

    /// Apply locally echoed input; no `Data` event
    pub fn handle_input(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let (buffer, notifier) = inner.live(&self.id, "handle input")?;

        apply(buffer, notifier, bytes);
        debug!(session = %self.id, len = bytes.len(), "input");
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        validate_size(cols, rows)?;

        let mut inner = self.inner.lock();
        let (buffer, notifier) = inner.live(&self.id, "resize")?;

        buffer.resize(cols, rows);
        notifier.notify(Event::Resize { cols, rows });
        debug!(session = %self.id, cols, rows, "resize");
        Ok(())
    }

    pub fn snapshot(&self) -> Result<ScreenSnapshot> {
        let mut inner = self.inner.lock();
        let (buffer, _) = inner.live(&self.id, "snapshot")?;
        Ok(buffer.snapshot())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state == SessionState::Running {
            if let Some(dispatcher) = inner.teardown() {
                dispatcher.join();
            }
            debug!(session = %self.id, "running session dropped");
        }
    }
}

/// Feed bytes to the buffer, one `CursorMoved` per byte
fn apply(buffer: &mut ScreenBuffer, notifier: &Notifier, bytes: &[u8]) {
    buffer.write(bytes, |cursor| {
        notifier.notify(Event::CursorMoved {
            x: cursor.x,
            y: cursor.y,
        })
    });
}

fn validate_size(cols: u16, rows: u16) -> Result<()> {
    if cols == 0 || rows == 0 {
        return Err(SessionError::InvalidArgument(format!(
            "screen size must be positive, got {}x{}",
            cols, rows
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::ChannelSink;
    use std::sync::mpsc::Receiver;
    use std::sync::OnceLock;
    use std::thread;
    use std::time::Duration;

    fn running(options: SessionOptions) -> (Session, Receiver<(String, Event)>) {
        let (sink, rx) = ChannelSink::new();
        let session = Session::new("t1", options, Arc::new(sink), 1024).unwrap();
        session.start().unwrap();
        (session, rx)
    }

    fn events_until_exit(rx: &Receiver<(String, Event)>) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            let (id, event) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(id, "t1");
            let done = event == Event::Exit;
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[test]
    fn test_write_emits_cursor_per_byte_then_data() {
        let (session, rx) = running(SessionOptions::default());
        session.write(b"ab").unwrap();
        session.stop().unwrap();

        assert_eq!(
            events_until_exit(&rx),
            vec![
                Event::CursorMoved { x: 1, y: 0 },
                Event::CursorMoved { x: 2, y: 0 },
                Event::Data { bytes: b"ab".to_vec() },
                Event::Exit,
            ]
        );
    }

    #[test]
    fn test_handle_input_has_no_data_event() {
        let (session, rx) = running(SessionOptions::default());
        session.handle_input(b"x\r").unwrap();
        assert_eq!(session.snapshot().unwrap().lines[0].trim_end(), "x");
        session.stop().unwrap();

        assert_eq!(
            events_until_exit(&rx),
            vec![
                Event::CursorMoved { x: 1, y: 0 },
                Event::CursorMoved { x: 0, y: 0 },
                Event::Exit,
            ]
        );
    }

    #[test]
    fn test_resize_validates_and_notifies() {
        let (session, rx) = running(SessionOptions::new(10, 4));

        assert!(matches!(
            session.resize(0, 4),
            Err(SessionError::InvalidArgument(_))
        ));
        session.resize(20, 6).unwrap();

        let snapshot = session.snapshot().unwrap();
        assert_eq!((snapshot.cols, snapshot.rows), (20, 6));
        session.stop().unwrap();

        assert_eq!(
            events_until_exit(&rx),
            vec![Event::Resize { cols: 20, rows: 6 }, Event::Exit]
        );
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (sink, _rx) = ChannelSink::new();
        let session = Session::new("t1", SessionOptions::default(), Arc::new(sink), 8).unwrap();
        assert_eq!(session.state(), SessionState::Created);

        assert!(matches!(
            session.write(b"a"),
            Err(SessionError::InvalidState {
                state: SessionState::Created,
                ..
            })
        ));
        assert!(matches!(
            session.stop(),
            Err(SessionError::InvalidState { .. })
        ));

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidState {
                state: SessionState::Running,
                ..
            })
        ));

        session.stop().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        assert!(matches!(
            session.write(b"a"),
            Err(SessionError::InvalidState {
                state: SessionState::Stopped,
                ..
            })
        ));
        assert!(matches!(
            session.resize(5, 5),
            Err(SessionError::InvalidState { .. })
        ));
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_zero_size_rejected_at_creation() {
        let (sink, _rx) = ChannelSink::new();
        let result = Session::new("t1", SessionOptions::new(0, 24), Arc::new(sink), 8);
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
    }

    #[test]
    fn test_shell_hint_passed_through() {
        let (session, _rx) = running(SessionOptions::default().with_shell("zsh"));
        assert_eq!(session.shell(), Some("zsh"));
        assert_eq!(session.id(), "t1");
    }

    #[test]
    fn test_dropping_running_session_emits_exit() {
        let (session, rx) = running(SessionOptions::default());
        session.write(b"z").unwrap();
        drop(session);

        let events = events_until_exit(&rx);
        assert_eq!(events.last(), Some(&Event::Exit));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_stop_returns_after_exit_delivered() {
        let (session, rx) = running(SessionOptions::default());
        session.write(b"ab").unwrap();
        session.stop().unwrap();

        let events: Vec<Event> = rx.try_iter().map(|(_, event)| event).collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events.last(), Some(&Event::Exit));
    }

    #[test]
    fn test_sink_may_stop_its_own_session() {
        let slot: Arc<OnceLock<Arc<Session>>> = Arc::new(OnceLock::new());
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = {
            let slot = slot.clone();
            move |_: &str, event: Event| {
                if matches!(event, Event::Data { .. }) {
                    if let Some(session) = slot.get() {
                        session.stop().unwrap();
                    }
                }
                let _ = tx.send(event);
            }
        };

        let session = Session::new("t1", SessionOptions::default(), Arc::new(sink), 8).unwrap();
        let session = Arc::new(session);
        assert!(slot.set(session.clone()).is_ok());
        session.start().unwrap();
        session.write(b"a").unwrap();

        let timeout = Duration::from_secs(5);
        let events: Vec<Event> = (0..3).map(|_| rx.recv_timeout(timeout).unwrap()).collect();
        assert_eq!(
            events,
            vec![
                Event::CursorMoved { x: 1, y: 0 },
                Event::Data { bytes: b"a".to_vec() },
                Event::Exit,
            ]
        );
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_invalid_state_message() {
        let (session, _rx) = running(SessionOptions::default());
        session.stop().unwrap();

        let err = session.handle_input(b"a").unwrap_err();
        assert_eq!(err.to_string(), "Cannot handle input: session t1 is stopped");
        let err = session.write(b"a").unwrap_err();
        assert_eq!(err.to_string(), "Cannot write: session t1 is stopped");
    }

    #[test]
    fn test_concurrent_write_and_resize_never_tear() {
        let sink: Arc<dyn EventSink> = Arc::new(|_: &str, _: Event| {});
        let session = Arc::new(Session::new("t1", SessionOptions::new(10, 5), sink, 64).unwrap());
        session.start().unwrap();

        let writer = {
            let session = session.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    session.write(b"the quick brown fox\r\njumps\x08\x08 over").unwrap();
                }
            })
        };

        let sizes = [(10u16, 5u16), (23, 9), (3, 2), (40, 1)];
        for i in 0..200 {
            let (cols, rows) = sizes[i % sizes.len()];
            session.resize(cols, rows).unwrap();

            let snapshot = session.snapshot().unwrap();
            assert_eq!((snapshot.cols, snapshot.rows), (cols, rows));
            assert_eq!(snapshot.lines.len(), rows as usize);
            assert!(snapshot
                .lines
                .iter()
                .all(|line| line.chars().count() == cols as usize));
            assert!(snapshot.cursor.x < cols && snapshot.cursor.y < rows);
        }

        writer.join().unwrap();
        session.stop().unwrap();
    }

    #[test]
    fn test_operations_are_not_interleaved() {
        let (sink, rx) = ChannelSink::new();
        let session = Arc::new(
            Session::new("t1", SessionOptions::new(100, 10), Arc::new(sink), 4096).unwrap(),
        );
        session.start().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = session.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        session.write(b"\rabcd").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        session.stop().unwrap();

        // Every write is a contiguous run: CR, four characters, then Data
        let events = events_until_exit(&rx);
        assert_eq!(events.len(), 20 * 6 + 1);
        for chunk in events[..120].chunks(6) {
            assert_eq!(chunk[0], Event::CursorMoved { x: 0, y: 0 });
            for (i, event) in chunk[1..5].iter().enumerate() {
                assert_eq!(*event, Event::CursorMoved { x: i as u16 + 1, y: 0 });
            }
            assert_eq!(chunk[5], Event::Data { bytes: b"\rabcd".to_vec() });
        }
    }
}
