//! Diagnostic text rendering.
//!
//! Pure string output (no terminal control, no global state): a
//! [`BoardRenderer`] is built with a [`Verbosity`] and handed a board.

pub mod renderer;

pub use towers_core as core;
pub use towers_types as types;

pub use renderer::{BoardRenderer, Verbosity};
