//! termplex - terminal session multiplexing and screen emulation engine
//!
//! A host application (an editor, an IDE panel) owns one
//! [`SessionRegistry`] and drives any number of named terminal sessions
//! through it. Each session keeps a character grid and cursor; every
//! change is reported back through an [`EventSink`] without blocking the
//! caller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use termplex::{Event, SessionOptions, SessionRegistry};
//!
//! let sink = Arc::new(|id: &str, event: Event| println!("{id}: {event:?}"));
//! let registry = SessionRegistry::new(sink);
//!
//! registry.create("main", SessionOptions::default().with_shell("bash"))?;
//! registry.write("main", b"hello\r\n")?;
//! registry.resize("main", 120, 40)?;
//! registry.destroy("main")?;
//! # Ok::<(), termplex::SessionError>(())
//! ```
//!
//! Only newline, carriage return and backspace are interpreted; escape
//! sequences and process management belong to the host.

pub mod config;
pub mod core;
pub mod ui;

pub use crate::config::Config;
pub use crate::core::{
    ChannelSink, Cursor, Event, EventSink, ScreenBuffer, ScreenSnapshot, Session, SessionError,
    SessionOptions, SessionRegistry, SessionState,
};
