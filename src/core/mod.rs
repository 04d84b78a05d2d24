//! Core session engine.
//!
//! - **screen**: character grid, cursor, wrap and scroll rules
//! - **event**: events, the host sink and per-session delivery queues
//! - **session**: one screen behind a lock, with a lifecycle
//! - **registry**: the id → session table owned by the host
//! - **error**: error kinds shared by all of the above
//!
//! # Architecture
//!
//! ```text
//! SessionRegistry
//! └── Session (one lock each)
//!     ├── ScreenBuffer (cells + cursor)
//!     └── Notifier ──queue──> dispatcher thread ──> EventSink (shared)
//! ```

pub mod error;
pub mod event;
pub mod registry;
pub mod screen;
pub mod session;

pub use error::{Result, SessionError};
pub use event::{ChannelSink, Event, EventSink};
pub use registry::SessionRegistry;
pub use screen::{Cursor, ScreenBuffer, ScreenSnapshot};
pub use session::{Session, SessionOptions, SessionState};
