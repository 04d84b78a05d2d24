//! Session engine errors

use std::io;
use thiserror::Error;

use super::session::SessionState;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Cannot {operation}: session {id} is {state}")]
    InvalidState {
        id: String,
        state: SessionState,
        operation: &'static str,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to start event dispatcher: {0}")]
    Dispatcher(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
