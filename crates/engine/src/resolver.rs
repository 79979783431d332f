//! Action resolver - applies one `PlayerAction` to the boards of a match
//!
//! Movement inputs go through the [`PhaseMachine`] on the initiator's board.
//! Effects mutate a single receiving board; attacks spend the initiator's
//! oldest retained power and route it to the target (offensive) or back to
//! the initiator (defensive). Randomness for effects comes from the manager's
//! effect generator, never from the piece stream, so effects cannot shift a
//! board's upcoming pieces.

use log::debug;
use towers_core::types::*;
use towers_core::{
    BoardState, Cell, CellFlag, GameConfig, PhaseMachine, Power, RandomGenerator, RandomSequence,
    Severity,
};

use crate::error::ActionError;

/// What a successfully resolved action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Movement input accepted
    Moved,
    /// Movement input had no effect (blocked, or no active piece)
    Blocked,
    /// Effect landed on `target`
    Applied { target: u8, effect: ActionType },
    /// Offensive effect swallowed by the target's yahoo shield
    Absorbed { target: u8, effect: ActionType },
}

pub struct ActionResolver<'a> {
    config: &'a GameConfig,
    sequence: &'a RandomSequence,
}

impl<'a> ActionResolver<'a> {
    pub fn new(config: &'a GameConfig, sequence: &'a RandomSequence) -> Self {
        Self { config, sequence }
    }

    /// Checks that need no board state: payload ranges.
    pub fn validate_payload(action: &PlayerAction) -> Result<(), ActionError> {
        if action.action.takes_power_field() {
            if let Some(field) = action.payload {
                power_field(field)?;
            }
        }
        if action.action == ActionType::AddBlock {
            let owner = action.payload.ok_or(ActionError::MissingPayload {
                action: action.action,
            })?;
            owner_id(owner)?;
        }
        Ok(())
    }

    pub fn resolve(
        &self,
        boards: &mut [BoardState],
        action: &PlayerAction,
        rng: &mut RandomGenerator,
    ) -> Result<Resolution, ActionError> {
        Self::validate_payload(action)?;

        let initiator = action.initiator;
        let seat = match live_board(boards, initiator) {
            Err(ActionError::TargetDead { .. }) => {
                return Err(ActionError::InitiatorDead { seat: initiator })
            }
            Err(ActionError::UnknownTarget { .. }) => {
                return Err(ActionError::UnknownSeat { seat: initiator })
            }
            other => other?,
        };

        if action.action.is_movement() {
            let machine = PhaseMachine::new(self.config, self.sequence);
            let board = &mut boards[seat];
            let moved = match action.action {
                ActionType::MoveLeft => machine.shift(board, -1),
                ActionType::MoveRight => machine.shift(board, 1),
                ActionType::MoveDown => machine.soft_drop(board),
                ActionType::Drop => machine.hard_drop(board),
                ActionType::CycleUp => machine.cycle(board, true),
                ActionType::CycleDown => machine.cycle(board, false),
                _ => false,
            };
            return Ok(if moved {
                Resolution::Moved
            } else {
                Resolution::Blocked
            });
        }

        if let ActionType::Attack(target) = action.action {
            return self.attack(boards, initiator, target, rng);
        }

        let target = live_board(boards, action.target)?;
        let field = match (action.action.takes_power_field(), action.payload) {
            (true, Some(field)) => power_field(field)?,
            _ => 0,
        };
        let magnitude = Severity::from_field(field).magnitude();
        Ok(self.apply_effect(
            boards,
            seat,
            target,
            action.action,
            magnitude,
            action.payload,
            rng,
        ))
    }

    fn attack(
        &self,
        boards: &mut [BoardState],
        initiator: u8,
        target: AttackTarget,
        rng: &mut RandomGenerator,
    ) -> Result<Resolution, ActionError> {
        let seat = initiator as usize;
        if boards[seat].active_powers.is_empty() {
            return Err(ActionError::NoPower { seat: initiator });
        }

        let target = match target {
            AttackTarget::Seat(n) => live_board(boards, n)?,
            AttackTarget::Random => {
                let partner = partner_of(seat);
                let candidates: Vec<usize> = (0..boards.len())
                    .filter(|&i| i != seat && i != partner && !boards[i].is_dead())
                    .collect();
                if candidates.is_empty() {
                    return Err(ActionError::NoTarget);
                }
                candidates[rng.next_bounded(candidates.len() as u32) as usize]
            }
        };

        let power: Power = boards[seat].active_powers.remove(0);
        let Some(effect) = power.effect() else {
            // Retained powers are always letter powers; anything else is spent silently.
            return Ok(Resolution::Blocked);
        };
        let receiver = if power.is_offensive() { target } else { seat };
        debug!(
            "seat {} spends {:?} power ({:?}) on board {}",
            initiator,
            effect,
            power.severity(),
            receiver
        );
        Ok(self.apply_effect(
            boards,
            seat,
            receiver,
            effect,
            power.severity().magnitude(),
            None,
            rng,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_effect(
        &self,
        boards: &mut [BoardState],
        initiator: usize,
        receiver: usize,
        effect: ActionType,
        magnitude: u32,
        payload: Option<u32>,
        rng: &mut RandomGenerator,
    ) -> Resolution {
        let target = receiver as u8;
        let board = &mut boards[receiver];

        if effect.is_offensive() && receiver != initiator && board.yahoo_timer > 0.0 {
            debug!("board {} absorbed {:?}", receiver, effect);
            return Resolution::Absorbed { target, effect };
        }

        let capacity = self.config.power_capacity;
        match effect {
            ActionType::AddRow => {
                for _ in 0..magnitude {
                    let row = garbage_row(rng);
                    if board.push_bottom_row(row) {
                        overflow(board);
                        break;
                    }
                    if let Some(piece) = board.piece.as_mut() {
                        if piece.row > 0 {
                            piece.row -= 1;
                        }
                    }
                }
                settle_piece(board);
            }
            ActionType::RemoveRow => {
                for _ in 0..magnitude {
                    for cell in board.remove_bottom_row() {
                        if !cell.is_empty() {
                            board.break_counts[cell.block_type() as usize] += 1;
                        }
                    }
                }
            }
            ActionType::Dither => dither(board, 3 * magnitude, rng),
            ActionType::Clump => clump(board),
            ActionType::AddStones => {
                for _ in 0..2 * magnitude {
                    let col = rng.next_bounded(BOARD_COLS as u32) as usize;
                    let stone = Cell::block(STONE)
                        .unwrap_or(Cell::EMPTY)
                        .with_flag(CellFlag::Artificial);
                    if !stack_on_column(board, col, stone) {
                        overflow(board);
                        break;
                    }
                }
                settle_piece(board);
            }
            ActionType::DropStones => sink_stones(board),
            ActionType::Defuse => board.active_powers.clear(),
            ActionType::ColorBlast => {
                if let Some(letter) = board.most_common_letter() {
                    for row in 0..BOARD_ROWS {
                        for col in 0..BOARD_COLS {
                            let cell = board.grid[row][col];
                            if cell.is_matchable() && cell.block_type() == letter {
                                board.break_cell(row, col, None, capacity);
                            }
                        }
                    }
                }
            }
            ActionType::MedusaPiece => board.special_pieces.push(MEDUSA),
            ActionType::MidasPiece => board.special_pieces.push(MIDAS),
            ActionType::RemovePowers => {
                for cell in board.grid.iter_mut().flatten() {
                    if cell.has_flag(CellFlag::PowerBlock) {
                        let stripped = cell.without_flag(CellFlag::PowerBlock);
                        *cell = stripped.with_power_field(0).unwrap_or(stripped);
                    }
                }
            }
            ActionType::RemoveStones => {
                for cell in board.grid.iter_mut().flatten() {
                    if cell.is_stone() {
                        *cell = Cell::EMPTY;
                    }
                }
                board.settle(false);
                settle_piece(board);
            }
            ActionType::SpeedUp => {
                board.speed_timer = magnitude as f32 * self.config.speed_up_duration;
            }
            ActionType::ClearSpeed => board.speed_timer = 0.0,
            ActionType::AddBlock => {
                let owner = payload.and_then(|p| u8::try_from(p).ok()).unwrap_or(0);
                let col = rng.next_bounded(BOARD_COLS as u32) as usize;
                let letter = FIRST_LETTER + rng.next_bounded(u32::from(LETTER_TYPES)) as u8;
                let block = Cell::block(letter)
                    .and_then(|c| c.with_owner_id(owner))
                    .unwrap_or(Cell::EMPTY)
                    .with_flag(CellFlag::Artificial);
                if !stack_on_column(board, col, block) {
                    overflow(board);
                }
                settle_piece(board);
            }
            _ => return Resolution::Blocked,
        }

        board.powers_received += 1;
        Resolution::Applied { target, effect }
    }

    /// Carry out Midas partner breaks requested during the last phase step.
    pub fn apply_partner_breaks(&self, boards: &mut [BoardState]) {
        for seat in 0..boards.len() {
            if boards[seat].partner_breaks.is_empty() {
                continue;
            }
            let requested = std::mem::take(&mut boards[seat].partner_breaks);
            let partner = partner_of(seat);
            let Some(board) = boards.get_mut(partner) else {
                continue;
            };
            if board.is_dead() {
                continue;
            }
            for letter in requested {
                for row in 0..BOARD_ROWS {
                    for col in 0..BOARD_COLS {
                        let cell = board.grid[row][col];
                        if cell.is_matchable() && cell.block_type() == letter {
                            board.break_cell(
                                row,
                                col,
                                Some(CellFlag::PartnerBreak),
                                self.config.power_capacity,
                            );
                        }
                    }
                }
            }
        }
    }
}

fn power_field(raw: u32) -> Result<u8, ActionError> {
    u8::try_from(raw)
        .ok()
        .filter(|&f| f <= towers_core::codec::MAX_POWER_FIELD)
        .ok_or(ActionError::Codec(towers_core::CodecError::PowerField(raw)))
}

fn owner_id(raw: u32) -> Result<u8, ActionError> {
    u8::try_from(raw)
        .ok()
        .filter(|&id| id <= towers_core::codec::MAX_OWNER_ID)
        .ok_or(ActionError::Codec(towers_core::CodecError::OwnerId(raw)))
}

/// Index of a live board, or the matching rejection.
fn live_board(boards: &[BoardState], seat: u8) -> Result<usize, ActionError> {
    match boards.get(seat as usize) {
        None => Err(ActionError::UnknownTarget { target: seat }),
        Some(board) if board.is_dead() => Err(ActionError::TargetDead { target: seat }),
        Some(_) => Ok(seat as usize),
    }
}

fn overflow(board: &mut BoardState) {
    debug!("board {} overflowed", board.board_id);
    board.piece = None;
    board.phase = GamePhase::GameOver;
}

/// Keep the active piece clear of cells that moved under it.
fn settle_piece(board: &mut BoardState) {
    if !board.is_dead() && !board.unstick_piece() {
        overflow(board);
    }
}

/// Artificial row of random letters with one random gap.
fn garbage_row(rng: &mut RandomGenerator) -> [Cell; BOARD_COLS] {
    let gap = rng.next_bounded(BOARD_COLS as u32) as usize;
    let mut row = [Cell::EMPTY; BOARD_COLS];
    for (col, cell) in row.iter_mut().enumerate() {
        if col == gap {
            continue;
        }
        let letter = FIRST_LETTER + rng.next_bounded(u32::from(LETTER_TYPES)) as u8;
        *cell = Cell::block(letter)
            .unwrap_or(Cell::EMPTY)
            .with_flag(CellFlag::Artificial);
    }
    row
}

/// Place `cell` on top of `col`. False when the column is full.
fn stack_on_column(board: &mut BoardState, col: usize, cell: Cell) -> bool {
    let top = board.column_top(col);
    if top == 0 {
        return false;
    }
    board.grid[top - 1][col] = cell;
    true
}

/// Swap the types of `swaps` random pairs of letter cells.
fn dither(board: &mut BoardState, swaps: u32, rng: &mut RandomGenerator) {
    let letters: Vec<(usize, usize)> = (0..BOARD_ROWS)
        .flat_map(|row| (0..BOARD_COLS).map(move |col| (row, col)))
        .filter(|&(row, col)| board.grid[row][col].is_matchable())
        .collect();
    if letters.len() < 2 {
        return;
    }
    for _ in 0..swaps {
        let (ar, ac) = letters[rng.next_bounded(letters.len() as u32) as usize];
        let (br, bc) = letters[rng.next_bounded(letters.len() as u32) as usize];
        let a = board.grid[ar][ac];
        let b = board.grid[br][bc];
        board.grid[ar][ac] = a.with_type(b.block_type()).unwrap_or(a);
        board.grid[br][bc] = b.with_type(a.block_type()).unwrap_or(b);
    }
}

/// Sort the letter cells of each column by type, leaving other cells in place.
fn clump(board: &mut BoardState) {
    for col in 0..BOARD_COLS {
        let rows: Vec<usize> = (0..BOARD_ROWS)
            .filter(|&row| board.grid[row][col].is_matchable())
            .collect();
        let mut cells: Vec<Cell> = rows.iter().map(|&row| board.grid[row][col]).collect();
        cells.sort_by_key(|c| c.block_type());
        for (row, cell) in rows.into_iter().zip(cells) {
            board.grid[row][col] = cell;
        }
    }
}

/// Stable partition of each column: stones sink below the other cells.
fn sink_stones(board: &mut BoardState) {
    for col in 0..BOARD_COLS {
        let (stones, others): (Vec<Cell>, Vec<Cell>) = (0..BOARD_ROWS)
            .map(|row| board.grid[row][col])
            .filter(|c| !c.is_empty())
            .partition(|c| c.is_stone());
        let packed: Vec<Cell> = others.into_iter().chain(stones).collect();
        let start = BOARD_ROWS - packed.len();
        for row in 0..BOARD_ROWS {
            board.grid[row][col] = if row < start {
                Cell::EMPTY
            } else {
                packed[row - start]
            };
        }
    }
    settle_piece(board);
}
