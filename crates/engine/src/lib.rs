//! Match engine - action resolution and session orchestration
//!
//! Builds on `towers-core` to run whole matches:
//!
//! - [`resolver`]: [`ActionResolver`] applies movement, effects and attacks
//! - [`queue`]: [`ActionQueue`] orders pending actions by tick and rejects duplicates
//! - [`manager`]: [`GameManager`] owns the boards, the tick loop and prediction
//! - [`error`]: [`ActionError`] and the [`RejectCode`] surfaced upward
//!
//! # Example
//!
//! ```
//! use towers_core::GameConfig;
//! use towers_engine::GameManager;
//! use towers_types::{ActionType, PlayerAction, TICK_SECS};
//!
//! let mut gm = GameManager::new(GameConfig::default(), 42).unwrap();
//! gm.start_game_loop();
//! gm.update(TICK_SECS);
//!
//! gm.submit_action(PlayerAction::new(0, ActionType::MoveLeft, 0, 1)).unwrap();
//! gm.update(TICK_SECS);
//! assert!(gm.take_rejections().is_empty());
//! ```

pub mod error;
pub mod manager;
pub mod queue;
pub mod resolver;

pub use error::{ActionError, RejectCode};
pub use manager::{GameManager, MatchSnapshot, Reconciliation, EFFECT_SALT, SEQUENCE_BOUND};
pub use queue::ActionQueue;
pub use resolver::{ActionResolver, Resolution};
