//! Session registry
//!
//! Owns every live session, keyed by the caller-supplied id. The id table
//! has its own lock, separate from the per-session locks: lookups hold it
//! only long enough to clone the session handle, so work on one session
//! never waits for another.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::error::{Result, SessionError};
use super::event::{EventSink, DEFAULT_EVENT_QUEUE_CAPACITY};
use super::screen::ScreenSnapshot;
use super::session::{Session, SessionOptions};
use crate::config::Config;

/// Registry of running sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    sink: Arc<dyn EventSink>,
    queue_capacity: usize,
    defaults: SessionOptions,
}

impl SessionRegistry {
    /// Create an empty registry reporting to `sink`
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
            queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            defaults: SessionOptions::default(),
        }
    }

    /// Create an empty registry using configured defaults
    pub fn with_config(config: &Config, sink: Arc<dyn EventSink>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
            queue_capacity: config.event_queue_capacity,
            defaults: config.session_options(),
        }
    }

    /// Options for a session created without explicit parameters
    pub fn default_options(&self) -> SessionOptions {
        self.defaults.clone()
    }

    /// Create and start a session
    ///
    /// The id is reserved under the table lock for the whole construction,
    /// so a failed start leaves nothing behind.
    pub fn create(&self, id: impl Into<String>, options: SessionOptions) -> Result<()> {
        let mut sessions = self.sessions.write();
        match sessions.entry(id.into()) {
            Entry::Occupied(entry) => Err(SessionError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let session = Session::new(
                    entry.key().clone(),
                    options,
                    self.sink.clone(),
                    self.queue_capacity,
                )?;
                session.start()?;
                info!(session = %entry.key(), "session created");
                entry.insert(Arc::new(session));
                Ok(())
            }
        }
    }

    /// Stop a session and remove it
    ///
    /// The id disappears from the table before teardown begins; a `create`
    /// with the same id may then proceed and gets a fresh session. Returns
    /// once the old session's `Exit` has been delivered; callers that create
    /// the id again after this see no events of the old session.
    pub fn destroy(&self, id: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        session.stop()?;
        info!(session = %id, "session destroyed");
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        self.lookup(id)?.write(bytes)
    }

    pub fn handle_input(&self, id: &str, bytes: &[u8]) -> Result<()> {
        self.lookup(id)?.handle_input(bytes)
    }

    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        self.lookup(id)?.resize(cols, rows)
    }

    pub fn snapshot(&self, id: &str) -> Result<ScreenSnapshot> {
        self.lookup(id)?.snapshot()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Ids of all live sessions, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Stop and remove every session; returns how many were stopped
    pub fn shutdown(&self) -> usize {
        let drained: Vec<(String, Arc<Session>)> = self.sessions.write().drain().collect();
        let count = drained.len();

        for (id, session) in drained {
            if let Err(e) = session.stop() {
                warn!(session = %id, error = %e, "failed to stop session during shutdown");
            }
        }

        if count > 0 {
            info!(count, "registry shut down");
        }
        count
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        let stopped = self.shutdown();
        debug!(stopped, "session registry dropped");
    }
}
