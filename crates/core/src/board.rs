//! Board module - one seat's complete simulation snapshot
//!
//! The grid is 6 columns x 16 rows of encoded [`Cell`]s, row 0 at the top.
//! Coordinates are `(row, col)`; out-of-range lookups return `None` instead of
//! panicking so callers can check neighbours freely.
//!
//! Everything a peer needs to continue the simulation lives in [`BoardState`]:
//! grid, pieces, stream cursor, counters, timers and pending animation queues.
//! Two boards compare equal only if every field matches, which is what the
//! prediction path relies on.

use serde::{Deserialize, Serialize};

use crate::codec::{Cell, CellFlag, Severity};
use crate::rng::RandomSequence;
use crate::types::*;

/// Full grid, row-major
pub type Grid = [[Cell; BOARD_COLS]; BOARD_ROWS];

/// Three-segment falling piece. `(column, row)` names the top segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub column: i8,
    pub row: i8,
    pub cells: [Cell; PIECE_LEN],
}

impl Piece {
    /// Piece at the spawn coordinate
    pub fn new(cells: [Cell; PIECE_LEN]) -> Self {
        Self {
            column: SPAWN_COLUMN,
            row: SPAWN_ROW,
            cells,
        }
    }

    /// `(row, col)` of each segment, top to bottom
    pub fn positions(&self) -> [(i8, i8); PIECE_LEN] {
        let mut out = [(0, 0); PIECE_LEN];
        for (i, pos) in out.iter_mut().enumerate() {
            *pos = (self.row + i as i8, self.column);
        }
        out
    }

    /// Segment values shift toward the top: `[a, b, c] -> [b, c, a]`
    pub fn cycle_up(&mut self) {
        self.cells.rotate_left(1);
    }

    /// Segment values shift toward the bottom: `[a, b, c] -> [c, a, b]`
    pub fn cycle_down(&mut self) {
        self.cells.rotate_right(1);
    }

    pub fn is_special(&self) -> bool {
        self.cells.iter().any(|c| c.has_flag(CellFlag::Special))
    }
}

/// A usable power retained after its block broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Power {
    pub block_type: u8,
    pub field: u8,
}

impl Power {
    pub fn from_cell(cell: Cell) -> Option<Self> {
        cell.is_power().then(|| Self {
            block_type: cell.block_type(),
            field: cell.power_field(),
        })
    }

    pub fn is_offensive(&self) -> bool {
        self.field & 1 != 0
    }

    pub fn severity(&self) -> Severity {
        Severity::from_field(self.field)
    }

    /// The action this power performs when spent
    pub fn effect(&self) -> Option<ActionType> {
        ActionType::for_power(self.block_type, self.is_offensive())
    }
}

/// A cell marked broken, kept for animation until the next spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrokenCell {
    pub row: u8,
    pub col: u8,
    pub cell: Cell,
}

/// One cell moved by gravity during a collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellDrop {
    pub col: u8,
    pub from_row: u8,
    pub to_row: u8,
    pub cell: Cell,
}

/// Per-seat snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    pub board_id: u8,
    pub phase: GamePhase,
    pub grid: Grid,
    /// Mirror of the partner's grid for combined views
    pub partner_grid: Grid,
    pub partner_on_right: bool,
    pub piece: Option<Piece>,
    pub next_piece: Option<Piece>,
    /// Where this board reads the shared random stream
    pub sequence_offset: usize,
    pub sequence_cursor: usize,
    /// Broken cells per block type
    pub break_counts: [u32; BLOCK_TYPE_SLOTS],
    /// Powers earned per block type
    pub power_counts: [u32; BLOCK_TYPE_SLOTS],
    /// Effects that landed on this board
    pub powers_received: u32,
    /// Broken cells since the last earned power
    pub power_progress: u32,
    /// Next drawn piece carries a power block
    pub power_pending: bool,
    /// Owner ids currently stamped in the grid (128-bit set)
    pub owner_ids: [u64; 2],
    pub owner_cursor: u8,
    pub fall_timer: f32,
    pub lock_timer: f32,
    pub lock_resets: u8,
    pub animation_timer: f32,
    pub speed_timer: f32,
    pub yahoo_timer: f32,
    /// Retained powers, oldest first
    pub active_powers: Vec<Power>,
    pub broken_cells: Vec<BrokenCell>,
    /// Special pieces waiting to replace the next draw
    pub special_pieces: Vec<u8>,
    /// Letter types whose cells the partner board must break (Midas)
    pub partner_breaks: Vec<u8>,
    pub game_started: bool,
    pub now_ms: u64,
    pub prev_ms: u64,
    pub server_start_ms: u64,
    pub drops: Vec<CellDrop>,
    /// Ticks simulated so far
    pub tick: u64,
    pub pieces_spawned: u32,
}

impl BoardState {
    pub fn new(board_id: u8, sequence_offset: usize) -> Self {
        Self {
            board_id,
            phase: GamePhase::SpawnNext,
            grid: [[Cell::EMPTY; BOARD_COLS]; BOARD_ROWS],
            partner_grid: [[Cell::EMPTY; BOARD_COLS]; BOARD_ROWS],
            partner_on_right: board_id % 2 == 0,
            piece: None,
            next_piece: None,
            sequence_offset,
            sequence_cursor: 0,
            break_counts: [0; BLOCK_TYPE_SLOTS],
            power_counts: [0; BLOCK_TYPE_SLOTS],
            powers_received: 0,
            power_progress: 0,
            power_pending: false,
            owner_ids: [0; 2],
            owner_cursor: 0,
            fall_timer: 0.0,
            lock_timer: 0.0,
            lock_resets: 0,
            animation_timer: 0.0,
            speed_timer: 0.0,
            yahoo_timer: 0.0,
            active_powers: Vec::new(),
            broken_cells: Vec::new(),
            special_pieces: Vec::new(),
            partner_breaks: Vec::new(),
            game_started: false,
            now_ms: 0,
            prev_ms: 0,
            server_start_ms: 0,
            drops: Vec::new(),
            tick: 0,
            pieces_spawned: 0,
        }
    }

    #[inline(always)]
    fn index(row: i8, col: i8) -> Option<(usize, usize)> {
        if row < 0 || row >= BOARD_ROWS as i8 || col < 0 || col >= BOARD_COLS as i8 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Get cell at `(row, col)`; None if out of bounds
    pub fn get(&self, row: i8, col: i8) -> Option<Cell> {
        Self::index(row, col).map(|(r, c)| self.grid[r][c])
    }

    /// Set cell at `(row, col)`; false if out of bounds
    pub fn set(&mut self, row: i8, col: i8, cell: Cell) -> bool {
        match Self::index(row, col) {
            Some((r, c)) => {
                self.grid[r][c] = cell;
                true
            }
            None => false,
        }
    }

    /// In bounds and empty
    pub fn is_open(&self, row: i8, col: i8) -> bool {
        matches!(self.get(row, col), Some(c) if c.is_empty())
    }

    pub fn is_dead(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn piece_fits(&self, piece: &Piece) -> bool {
        piece
            .positions()
            .iter()
            .all(|&(row, col)| self.is_open(row, col))
    }

    /// True when the piece cannot descend another row
    pub fn piece_resting(&self, piece: &Piece) -> bool {
        !self.is_open(piece.row + PIECE_LEN as i8, piece.column)
    }

    /// Any of the three spawn cells is occupied
    pub fn spawn_blocked(&self) -> bool {
        (0..PIECE_LEN as i8).any(|i| !self.is_open(SPAWN_ROW + i, SPAWN_COLUMN))
    }

    /// Next value from this board's slice of the shared stream, reduced to `[0, n)`.
    pub fn draw(&mut self, sequence: &RandomSequence, n: u32) -> u32 {
        let v = sequence.get_at(self.sequence_offset + self.sequence_cursor);
        self.sequence_cursor = self.sequence_cursor.wrapping_add(1);
        if n == 0 {
            0
        } else {
            v % n
        }
    }

    /// Next free owner id, wrapping at 128; reuses the cursor slot when all are taken.
    pub fn allocate_owner_id(&mut self) -> u8 {
        let start = self.owner_cursor & 0x7F;
        let id = (0..128u8)
            .map(|i| (start + i) & 0x7F)
            .find(|&id| !self.owner_id_used(id))
            .unwrap_or(start);
        self.owner_ids[(id >> 6) as usize] |= 1 << (id & 63);
        self.owner_cursor = (id + 1) & 0x7F;
        id
    }

    pub fn owner_id_used(&self, id: u8) -> bool {
        let id = id & 0x7F;
        self.owner_ids[(id >> 6) as usize] & (1 << (id & 63)) != 0
    }

    /// Rebuild the id set from the ids still stamped on player-placed cells.
    pub fn refresh_owner_ids(&mut self) {
        let mut ids = [0u64; 2];
        for cell in self.grid.iter().flatten() {
            if !cell.is_empty() && !cell.has_flag(CellFlag::Artificial) {
                let id = cell.owner_id();
                ids[(id >> 6) as usize] |= 1 << (id & 63);
            }
        }
        self.owner_ids = ids;
    }

    /// Mask of every cell that belongs to a run of 3+ equal letters in any of
    /// the four line directions.
    pub fn find_matches(&self) -> [[bool; BOARD_COLS]; BOARD_ROWS] {
        const DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];
        let mut mask = [[false; BOARD_COLS]; BOARD_ROWS];

        for row in 0..BOARD_ROWS as i8 {
            for col in 0..BOARD_COLS as i8 {
                let Some(cell) = self.get(row, col) else {
                    continue;
                };
                if !cell.is_matchable() {
                    continue;
                }
                let t = cell.block_type();
                for (dr, dc) in DIRECTIONS {
                    // Only start counting at the beginning of a run.
                    if self.matches_type(row - dr, col - dc, t) {
                        continue;
                    }
                    let mut len = 1i8;
                    while self.matches_type(row + dr * len, col + dc * len, t) {
                        len += 1;
                    }
                    if len as usize >= MATCH_LEN {
                        for i in 0..len {
                            mask[(row + dr * i) as usize][(col + dc * i) as usize] = true;
                        }
                    }
                }
            }
        }
        mask
    }

    fn matches_type(&self, row: i8, col: i8, block_type: u8) -> bool {
        matches!(self.get(row, col), Some(c) if c.is_matchable() && c.block_type() == block_type)
    }

    pub fn has_matches(&self) -> bool {
        self.find_matches().iter().flatten().any(|&m| m)
    }

    pub fn has_broken_cells(&self) -> bool {
        self.grid
            .iter()
            .flatten()
            .any(|c| !c.is_empty() && c.has_flag(CellFlag::Broken))
    }

    /// Clear every broken cell, then let gravity settle each column,
    /// recording drops. Returns the number of cells removed.
    pub fn collapse(&mut self) -> usize {
        let mut removed = 0;
        for cell in self.grid.iter_mut().flatten() {
            if !cell.is_empty() && cell.has_flag(CellFlag::Broken) {
                *cell = Cell::EMPTY;
                removed += 1;
            }
        }
        self.settle(true);
        self.refresh_owner_ids();
        removed
    }

    /// Compact every column toward the bottom (two-pointer, no allocation).
    /// Returns the number of cells moved.
    pub fn settle(&mut self, record: bool) -> usize {
        let mut moved = 0;
        for col in 0..BOARD_COLS {
            let mut write = BOARD_ROWS;
            for read in (0..BOARD_ROWS).rev() {
                let cell = self.grid[read][col];
                if cell.is_empty() {
                    continue;
                }
                write -= 1;
                if write != read {
                    self.grid[write][col] = cell;
                    self.grid[read][col] = Cell::EMPTY;
                    moved += 1;
                    if record {
                        self.drops.push(CellDrop {
                            col: col as u8,
                            from_row: read as u8,
                            to_row: write as u8,
                            cell,
                        });
                    }
                }
            }
        }
        moved
    }

    /// Highest occupied row in `col`, or `BOARD_ROWS` when the column is empty.
    pub fn column_top(&self, col: usize) -> usize {
        (0..BOARD_ROWS)
            .find(|&row| !self.grid[row][col].is_empty())
            .unwrap_or(BOARD_ROWS)
    }

    /// Shift every row up and insert `row` at the bottom.
    /// Returns true if an occupied top row was pushed off (overflow).
    pub fn push_bottom_row(&mut self, row: [Cell; BOARD_COLS]) -> bool {
        let overflow = self.grid[0].iter().any(|c| !c.is_empty());
        self.grid.copy_within(1.., 0);
        self.grid[BOARD_ROWS - 1] = row;
        overflow
    }

    /// Drop the bottom row and shift everything down. Returns the removed row.
    pub fn remove_bottom_row(&mut self) -> [Cell; BOARD_COLS] {
        let removed = self.grid[BOARD_ROWS - 1];
        self.grid.copy_within(..BOARD_ROWS - 1, 1);
        self.grid[0] = [Cell::EMPTY; BOARD_COLS];
        removed
    }

    /// Letter type with the most cells on the grid (lowest type wins ties).
    pub fn most_common_letter(&self) -> Option<u8> {
        let mut counts = [0u32; BLOCK_TYPE_SLOTS];
        for cell in self.grid.iter().flatten() {
            if cell.is_matchable() {
                counts[cell.block_type() as usize] += 1;
            }
        }
        (FIRST_LETTER..FIRST_LETTER + LETTER_TYPES)
            .filter(|&t| counts[t as usize] > 0)
            .max_by(|&a, &b| counts[a as usize].cmp(&counts[b as usize]).then(b.cmp(&a)))
    }

    /// Mark a cell broken, book it, and retain any power it carried.
    pub fn break_cell(&mut self, row: usize, col: usize, extra: Option<CellFlag>, capacity: usize) {
        let mut cell = self.grid[row][col].with_flag(CellFlag::Broken);
        if let Some(flag) = extra {
            cell = cell.with_flag(flag);
        }
        self.grid[row][col] = cell;
        self.break_counts[cell.block_type() as usize] += 1;
        self.broken_cells.push(BrokenCell {
            row: row as u8,
            col: col as u8,
            cell,
        });
        if let Some(power) = Power::from_cell(cell) {
            self.retain_power(power, capacity);
        }
    }

    /// Push a power onto the retained queue, dropping the oldest when full.
    pub fn retain_power(&mut self, power: Power, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.active_powers.len() >= capacity {
            self.active_powers.remove(0);
        }
        self.active_powers.push(power);
        self.power_counts[power.block_type as usize] += 1;
    }

    /// Nudge the active piece upward until it no longer overlaps the grid.
    /// Returns false when no free position exists.
    pub fn unstick_piece(&mut self) -> bool {
        let Some(mut piece) = self.piece else {
            return true;
        };
        while !self.piece_fits(&piece) {
            if piece.row <= 0 {
                return false;
            }
            piece.row -= 1;
        }
        self.piece = Some(piece);
        true
    }

    /// Advance the board clock by `dt` seconds.
    pub fn advance_clock(&mut self, dt: f32) {
        self.prev_ms = self.now_ms;
        self.now_ms = self.now_ms.saturating_add((dt.max(0.0) * 1000.0).round() as u64);
    }

    /// Count of non-empty grid cells
    pub fn filled_cells(&self) -> usize {
        self.grid.iter().flatten().filter(|c| !c.is_empty()).count()
    }
}
