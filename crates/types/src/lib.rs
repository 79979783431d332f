//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the engine.
//! All types are plain data (with `serde` derives so transports can carry them),
//! usable in any context: simulation, prediction, diagnostics.
//!
//! # Board Dimensions
//!
//! - **Columns**: 6 (indexed 0-5)
//! - **Rows**: 16 (indexed 0-15, row 0 is the top; gravity pulls toward row 15)
//! - **Spawn position**: column 2, row 0 (top segment of the three-segment piece)
//!
//! # Block Types
//!
//! | Value | Block |
//! |-------|-------|
//! | 0 | empty |
//! | 1-6 | letter blocks `Y A H O O !` (matchable) |
//! | 7 | Medusa segment (special) |
//! | 8 | Midas segment (special) |
//! | 9 | stone (never matches) |
//!
//! # Timing Defaults
//!
//! Timing values are in seconds (the simulation runs on `f32` deltas):
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `TICK_SECS` | 1/60 | Nominal server tick |
//! | `FALL_INTERVAL_SECS` | 0.5 | Time per row while falling |
//! | `LOCK_DELAY_SECS` | 0.45 | Time a resting piece waits before locking |
//! | `LOCK_RESET_LIMIT` | 15 | Max lock timer resets per piece |
//! | `BREAK_DELAY_SECS` | 0.18 | Break animation before collapse |
//! | `SPEED_UP_SECS` | 10.0 | Speed-up effect duration per severity tier |
//! | `YAHOO_SECS` | 8.0 | Yahoo shield duration |
//!
//! # Examples
//!
//! ```
//! use towers_types::{ActionType, AttackTarget, GamePhase, PlayerAction, BOARD_COLS, BOARD_ROWS};
//!
//! assert_eq!(BOARD_COLS, 6);
//! assert_eq!(BOARD_ROWS, 16);
//!
//! let phase = GamePhase::from_str("cascade_check").unwrap();
//! assert_eq!(phase, GamePhase::CascadeCheck);
//!
//! let action = PlayerAction::new(0, ActionType::Attack(AttackTarget::Seat(2)), 0, 7);
//! assert_eq!(action.key().tick, 7);
//! ```

use serde::{Deserialize, Serialize};

/// Board width in cells (6 columns)
pub const BOARD_COLS: usize = 6;

/// Board height in cells (16 rows)
pub const BOARD_ROWS: usize = 16;

/// Number of segments in a falling piece
pub const PIECE_LEN: usize = 3;

/// Column the piece spawns in
pub const SPAWN_COLUMN: i8 = 2;

/// Row of the top segment at spawn
pub const SPAWN_ROW: i8 = 0;

/// Maximum number of seats (boards) in one match
pub const MAX_SEATS: usize = 8;

/// Empty cell type
pub const EMPTY: u8 = 0;

/// First matchable letter type (`Y`)
pub const FIRST_LETTER: u8 = 1;

/// Number of matchable letter types (`Y A H O O !`)
pub const LETTER_TYPES: u8 = 6;

/// Medusa special piece segment
pub const MEDUSA: u8 = 7;

/// Midas special piece segment
pub const MIDAS: u8 = 8;

/// Stone block (never matches)
pub const STONE: u8 = 9;

/// Number of distinct block-type slots (4-bit field)
pub const BLOCK_TYPE_SLOTS: usize = 16;

/// Minimum run length that breaks
pub const MATCH_LEN: usize = 3;

/// Nominal tick length (60 Hz)
pub const TICK_SECS: f32 = 1.0 / 60.0;

/// Gravity interval per row
pub const FALL_INTERVAL_SECS: f32 = 0.5;

/// Lock delay for a resting piece
pub const LOCK_DELAY_SECS: f32 = 0.45;

/// Maximum number of lock timer resets per piece (15)
pub const LOCK_RESET_LIMIT: u8 = 15;

/// Break animation before the collapse runs
pub const BREAK_DELAY_SECS: f32 = 0.18;

/// Speed-up duration per severity tier
pub const SPEED_UP_SECS: f32 = 10.0;

/// Yahoo shield duration
pub const YAHOO_SECS: f32 = 8.0;

/// Broken cells needed to earn one power block
pub const POWER_THRESHOLD: u32 = 10;

/// Retained power queue capacity
pub const POWER_CAPACITY: usize = 8;

/// Returns true for the six matchable letter types.
#[inline]
pub fn is_letter(block_type: u8) -> bool {
    (FIRST_LETTER..FIRST_LETTER + LETTER_TYPES).contains(&block_type)
}

/// Partner seat of `seat` (seats pair as 0-1, 2-3, 4-5, 6-7).
#[inline]
pub fn partner_of(seat: usize) -> usize {
    seat ^ 1
}

/// Gameplay phase of one board.
///
/// The cycle goes: SpawnNext → Falling → Locking → Breaking → Collapsing →
/// CascadeCheck → (Breaking | SpawnNext). GameOver is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    SpawnNext,
    Falling,
    Locking,
    Breaking,
    Collapsing,
    CascadeCheck,
    GameOver,
}

impl GamePhase {
    /// Parse phase from string (case-insensitive, `SPAWN_NEXT` style)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SPAWN_NEXT" => Some(GamePhase::SpawnNext),
            "FALLING" => Some(GamePhase::Falling),
            "LOCKING" => Some(GamePhase::Locking),
            "BREAKING" => Some(GamePhase::Breaking),
            "COLLAPSING" => Some(GamePhase::Collapsing),
            "CASCADE_CHECK" => Some(GamePhase::CascadeCheck),
            "GAME_OVER" => Some(GamePhase::GameOver),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::SpawnNext => "SPAWN_NEXT",
            GamePhase::Falling => "FALLING",
            GamePhase::Locking => "LOCKING",
            GamePhase::Breaking => "BREAKING",
            GamePhase::Collapsing => "COLLAPSING",
            GamePhase::CascadeCheck => "CASCADE_CHECK",
            GamePhase::GameOver => "GAME_OVER",
        }
    }

    /// True while a player-controlled piece is on the board
    pub fn has_active_piece(&self) -> bool {
        matches!(self, GamePhase::Falling | GamePhase::Locking)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GamePhase::GameOver)
    }
}

/// Attack destination: a random live opponent, or an explicit seat (board id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackTarget {
    Random,
    Seat(u8),
}

/// Every action a board can initiate.
///
/// Effect variants carry no data of their own; their severity travels in the
/// action payload as a raw power field (0..=7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Move the active piece one column left
    MoveLeft,
    /// Move the active piece one column right
    MoveRight,
    /// Soft drop by one row
    MoveDown,
    /// Hard drop to the resting row
    Drop,
    /// Rotate segment values upward
    CycleUp,
    /// Rotate segment values downward
    CycleDown,
    AddRow,
    RemoveRow,
    Dither,
    Clump,
    AddStones,
    DropStones,
    Defuse,
    ColorBlast,
    MedusaPiece,
    MidasPiece,
    RemovePowers,
    RemoveStones,
    SpeedUp,
    ClearSpeed,
    /// Legacy single-block drop; payload is the owner id stamped on the block
    AddBlock,
    /// Spend the initiator's oldest retained power
    Attack(AttackTarget),
}

impl ActionType {
    /// Direct piece inputs (always resolved against the initiator)
    pub fn is_movement(&self) -> bool {
        matches!(
            self,
            ActionType::MoveLeft
                | ActionType::MoveRight
                | ActionType::MoveDown
                | ActionType::Drop
                | ActionType::CycleUp
                | ActionType::CycleDown
        )
    }

    /// Effects that hurt the board they land on
    pub fn is_offensive(&self) -> bool {
        matches!(
            self,
            ActionType::AddRow
                | ActionType::Dither
                | ActionType::AddStones
                | ActionType::Defuse
                | ActionType::MedusaPiece
                | ActionType::SpeedUp
                | ActionType::AddBlock
        )
    }

    /// True when the payload is read as a power field
    pub fn takes_power_field(&self) -> bool {
        !self.is_movement() && !matches!(self, ActionType::AddBlock | ActionType::Attack(_))
    }

    /// Power effect carried by a letter block of `block_type`.
    ///
    /// Each letter holds one offensive and one defensive effect.
    pub fn for_power(block_type: u8, offensive: bool) -> Option<Self> {
        let pair = match block_type {
            1 => (ActionType::AddRow, ActionType::RemoveRow),
            2 => (ActionType::Dither, ActionType::Clump),
            3 => (ActionType::AddStones, ActionType::DropStones),
            4 => (ActionType::Defuse, ActionType::ColorBlast),
            5 => (ActionType::MedusaPiece, ActionType::MidasPiece),
            6 => (ActionType::SpeedUp, ActionType::RemoveStones),
            _ => return None,
        };
        Some(if offensive { pair.0 } else { pair.1 })
    }

    /// camelCase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::MoveLeft => "moveLeft",
            ActionType::MoveRight => "moveRight",
            ActionType::MoveDown => "moveDown",
            ActionType::Drop => "drop",
            ActionType::CycleUp => "cycleUp",
            ActionType::CycleDown => "cycleDown",
            ActionType::AddRow => "addRow",
            ActionType::RemoveRow => "removeRow",
            ActionType::Dither => "dither",
            ActionType::Clump => "clump",
            ActionType::AddStones => "addStones",
            ActionType::DropStones => "dropStones",
            ActionType::Defuse => "defuse",
            ActionType::ColorBlast => "colorBlast",
            ActionType::MedusaPiece => "medusaPiece",
            ActionType::MidasPiece => "midasPiece",
            ActionType::RemovePowers => "removePowers",
            ActionType::RemoveStones => "removeStones",
            ActionType::SpeedUp => "speedUp",
            ActionType::ClearSpeed => "clearSpeed",
            ActionType::AddBlock => "addBlock",
            ActionType::Attack(AttackTarget::Random) => "attackRandom",
            ActionType::Attack(AttackTarget::Seat(_)) => "attackTarget",
        }
    }
}

/// Identity of an action for deduplication: (initiator, type, target, tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    pub initiator: u8,
    pub action: ActionType,
    pub target: u8,
    pub tick: u64,
}

/// Immutable action record delivered by the session layer.
///
/// Equality is identity: two records with the same (initiator, type, target, tick)
/// are the same action regardless of payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerAction {
    pub initiator: u8,
    pub action: ActionType,
    pub target: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<u32>,
    pub tick: u64,
}

impl PlayerAction {
    pub fn new(initiator: u8, action: ActionType, target: u8, tick: u64) -> Self {
        Self {
            initiator,
            action,
            target,
            payload: None,
            tick,
        }
    }

    /// Builder-style payload attachment
    pub fn with_payload(mut self, payload: u32) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn key(&self) -> ActionKey {
        ActionKey {
            initiator: self.initiator,
            action: self.action,
            target: self.target,
            tick: self.tick,
        }
    }
}

impl PartialEq for PlayerAction {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PlayerAction {}

impl std::hash::Hash for PlayerAction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_defaults() {
        assert_eq!(LOCK_RESET_LIMIT, 15);
        assert_eq!(LOCK_DELAY_SECS, 0.45);
        assert_eq!(BREAK_DELAY_SECS, 0.18);
        assert!(FALL_INTERVAL_SECS > TICK_SECS);
    }

    #[test]
    fn phase_names_round_trip() {
        for phase in [
            GamePhase::SpawnNext,
            GamePhase::Falling,
            GamePhase::Locking,
            GamePhase::Breaking,
            GamePhase::Collapsing,
            GamePhase::CascadeCheck,
            GamePhase::GameOver,
        ] {
            assert_eq!(GamePhase::from_str(phase.as_str()), Some(phase));
        }
        assert_eq!(GamePhase::from_str("nope"), None);
    }

    #[test]
    fn action_identity_ignores_payload() {
        let a = PlayerAction::new(1, ActionType::AddRow, 2, 10).with_payload(3);
        let b = PlayerAction::new(1, ActionType::AddRow, 2, 10);
        assert_eq!(a, b);

        let c = PlayerAction::new(1, ActionType::AddRow, 2, 11);
        assert_ne!(a, c);
    }

    #[test]
    fn every_letter_has_two_powers() {
        for t in FIRST_LETTER..FIRST_LETTER + LETTER_TYPES {
            let off = ActionType::for_power(t, true).unwrap();
            let def = ActionType::for_power(t, false).unwrap();
            assert_ne!(off, def);
            assert!(off.takes_power_field());
        }
        assert_eq!(ActionType::for_power(STONE, true), None);
    }

    #[test]
    fn partners_pair_up() {
        assert_eq!(partner_of(0), 1);
        assert_eq!(partner_of(1), 0);
        assert_eq!(partner_of(6), 7);
    }
}
