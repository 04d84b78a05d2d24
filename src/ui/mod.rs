//! Host-side helpers for the demo binary.
//!
//! - **keymapper**: keyboard input to session input bytes
//! - **renderer**: painting a screen snapshot (crossterm) and a text dump
//!
//! The engine in [`crate::core`] does not depend on this module.

pub mod keymapper;
pub mod renderer;

pub use keymapper::*;
pub use renderer::*;
