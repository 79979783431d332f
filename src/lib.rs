//! Towers (workspace facade crate).
//!
//! Re-exports the member crates under short names so tools and tests can use
//! `towers::{core, engine, term, types}` without depending on each one.

pub use towers_core as core;
pub use towers_engine as engine;
pub use towers_term as term;
pub use towers_types as types;

pub mod sim;
