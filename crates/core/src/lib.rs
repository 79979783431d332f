//! Core simulation module - pure, deterministic, and testable
//!
//! Everything needed to advance a single board lives here. Nothing in this
//! crate touches the network, the terminal, or the clock: time only enters as
//! the `dt` passed to [`PhaseMachine::advance`].
//!
//! # Module Structure
//!
//! - [`codec`]: bit-packed [`Cell`] encoding (type, power field, flags, owner id)
//! - [`rng`]: 48-bit LCG shared by every peer, plus the precomputed stream
//! - [`board`]: [`BoardState`], the full per-seat snapshot and grid helpers
//! - [`phase`]: [`PhaseMachine`], spawn / fall / lock / break / collapse / cascade
//! - [`config`]: [`GameConfig`] with JSON and environment loaders
//!
//! # Example
//!
//! ```
//! use towers_core::{BoardState, GameConfig, PhaseMachine, RandomSequence};
//! use towers_core::types::{GamePhase, TICK_SECS};
//!
//! let config = GameConfig::default();
//! let sequence = RandomSequence::materialize(42, config.sequence_length, 5040);
//! let machine = PhaseMachine::new(&config, &sequence);
//!
//! let mut board = BoardState::new(0, 0);
//! machine.advance(&mut board, TICK_SECS);
//! assert_eq!(board.phase, GamePhase::Falling);
//! ```

pub mod board;
pub mod codec;
pub mod config;
pub mod error;
pub mod phase;
pub mod rng;

pub use towers_types as types;

pub use board::{BoardState, BrokenCell, CellDrop, Grid, Piece, Power};
pub use codec::{Cell, CellFlag, Severity};
pub use config::{EndMode, GameConfig, LockGrace};
pub use error::{CodecError, ConfigError};
pub use phase::PhaseMachine;
pub use rng::{RandomGenerator, RandomSequence};
