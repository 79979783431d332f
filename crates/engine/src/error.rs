//! Action rejection taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use towers_core::CodecError;
use towers_types::{ActionKey, ActionType};

/// Reason code surfaced to the session layer for a rejected action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectCode {
    #[serde(rename = "invalid_action")]
    InvalidAction,
    #[serde(rename = "duplicate_action")]
    DuplicateAction,
    #[serde(rename = "out_of_sync")]
    OutOfSync,
    #[serde(rename = "illegal_action")]
    IllegalAction,
}

impl RejectCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectCode::InvalidAction => "INVALID_ACTION",
            RejectCode::DuplicateAction => "DUPLICATE_ACTION",
            RejectCode::OutOfSync => "OUT_OF_SYNC",
            RejectCode::IllegalAction => "ILLEGAL_ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("seat {seat} is not part of this match")]
    UnknownSeat { seat: u8 },
    #[error("malformed payload: {0}")]
    Codec(#[from] CodecError),
    #[error("{action:?} requires a payload")]
    MissingPayload { action: ActionType },
    #[error("action already queued: {key:?}")]
    Duplicate { key: ActionKey },
    #[error("tick {tick} already resolved (current tick {current})")]
    StaleTick { tick: u64, current: u64 },
    #[error("snapshot for board {board_id} delivered to seat {seat}")]
    SnapshotMismatch { seat: u8, board_id: u8 },
    #[error("snapshot carries {found} boards, match has {expected}")]
    SeatCountMismatch { expected: usize, found: usize },
    #[error("no local seat; this manager does not predict")]
    NoLocalSeat,
    #[error("seat {seat} is not the local seat")]
    NotLocalSeat { seat: u8 },
    #[error("seat {seat} is out of the game")]
    InitiatorDead { seat: u8 },
    #[error("target board {target} is out of the game")]
    TargetDead { target: u8 },
    #[error("target board {target} is not part of this match")]
    UnknownTarget { target: u8 },
    #[error("seat {seat} has no retained power to spend")]
    NoPower { seat: u8 },
    #[error("no live opponent to attack")]
    NoTarget,
}

impl ActionError {
    pub fn code(&self) -> RejectCode {
        match self {
            ActionError::UnknownSeat { .. }
            | ActionError::Codec(_)
            | ActionError::MissingPayload { .. }
            | ActionError::NoLocalSeat
            | ActionError::NotLocalSeat { .. } => RejectCode::InvalidAction,
            ActionError::Duplicate { .. } | ActionError::StaleTick { .. } => {
                RejectCode::DuplicateAction
            }
            ActionError::SnapshotMismatch { .. } | ActionError::SeatCountMismatch { .. } => {
                RejectCode::OutOfSync
            }
            ActionError::InitiatorDead { .. }
            | ActionError::TargetDead { .. }
            | ActionError::UnknownTarget { .. }
            | ActionError::NoPower { .. }
            | ActionError::NoTarget => RejectCode::IllegalAction,
        }
    }

    /// Rejections the caller should answer with a resync rather than a retry
    pub fn is_sync_error(&self) -> bool {
        matches!(
            self,
            ActionError::Duplicate { .. }
                | ActionError::StaleTick { .. }
                | ActionError::SnapshotMismatch { .. }
                | ActionError::SeatCountMismatch { .. }
        )
    }
}
