//! Phase machine - per-tick progression of one board
//!
//! Each call to [`PhaseMachine::advance`] performs at most one phase step, so
//! every transition is observable at tick granularity:
//!
//! ```text
//! SpawnNext -> Falling -> Locking -> Breaking -> Collapsing -> CascadeCheck
//!     ^            ^---------'                                    |   |
//!     |                                                           |   v
//!     '-----------------------------------------------------------'  Breaking
//! ```
//!
//! A blocked spawn (or a piece that can no longer be written) moves the board
//! to `GameOver`, after which `advance` is a no-op.
//!
//! The machine holds no state of its own; everything lives in [`BoardState`],
//! so identical boards fed identical deltas stay identical.

use arrayvec::ArrayVec;
use log::debug;

use crate::board::{BoardState, Piece};
use crate::codec::{Cell, CellFlag};
use crate::config::{GameConfig, LockGrace};
use crate::rng::RandomSequence;
use crate::types::*;

/// Upper bound on cells touched by one break pass
const GRID_CELLS: usize = BOARD_ROWS * BOARD_COLS;

pub struct PhaseMachine<'a> {
    config: &'a GameConfig,
    sequence: &'a RandomSequence,
}

impl<'a> PhaseMachine<'a> {
    pub fn new(config: &'a GameConfig, sequence: &'a RandomSequence) -> Self {
        Self { config, sequence }
    }

    /// Run one phase step with `dt` seconds elapsed. Returns the resulting phase.
    pub fn advance(&self, board: &mut BoardState, dt: f32) -> GamePhase {
        if board.phase.is_terminal() {
            return board.phase;
        }
        let dt = dt.max(0.0);

        board.speed_timer = (board.speed_timer - dt).max(0.0);
        board.yahoo_timer = (board.yahoo_timer - dt).max(0.0);

        match board.phase {
            GamePhase::SpawnNext => self.spawn(board),
            GamePhase::Falling => self.fall(board, dt),
            GamePhase::Locking => self.lock(board, dt),
            GamePhase::Breaking => self.break_matches(board),
            GamePhase::Collapsing => self.collapse(board, dt),
            GamePhase::CascadeCheck => {
                board.phase = if board.has_matches() || board.has_broken_cells() {
                    debug!("board {} cascades", board.board_id);
                    GamePhase::Breaking
                } else {
                    GamePhase::SpawnNext
                };
            }
            GamePhase::GameOver => {}
        }
        board.phase
    }

    fn spawn(&self, board: &mut BoardState) {
        board.broken_cells.clear();
        board.drops.clear();

        if board.spawn_blocked() {
            self.game_over(board, "spawn blocked");
            return;
        }

        let upcoming = match board.next_piece.take() {
            Some(piece) => piece,
            None => self.draw_piece(board),
        };
        board.piece = Some(Piece::new(upcoming.cells));
        board.next_piece = Some(self.draw_piece(board));
        board.pieces_spawned += 1;
        board.fall_timer = 0.0;
        board.lock_timer = self.config.lock_delay;
        board.lock_resets = 0;
        board.phase = GamePhase::Falling;
    }

    /// Next piece descriptor: a queued special piece, or three letters from the stream.
    pub fn draw_piece(&self, board: &mut BoardState) -> Piece {
        if !board.special_pieces.is_empty() {
            let kind = board.special_pieces.remove(0);
            let cell = Cell::block(kind)
                .unwrap_or(Cell::EMPTY)
                .with_flag(CellFlag::Special);
            return Piece::new([cell; PIECE_LEN]);
        }

        let mut cells = [Cell::EMPTY; PIECE_LEN];
        for cell in cells.iter_mut() {
            let letter = FIRST_LETTER + board.draw(self.sequence, u32::from(LETTER_TYPES)) as u8;
            *cell = Cell::block(letter).unwrap_or(Cell::EMPTY);
        }

        if board.power_pending {
            board.power_pending = false;
            let idx = board.draw(self.sequence, PIECE_LEN as u32) as usize;
            // Fields 0-5: offensive bit plus severity tiers minor..mega
            let field = board.draw(self.sequence, 6) as u8;
            if let Ok(powered) = cells[idx].with_power_field(field) {
                cells[idx] = powered.with_flag(CellFlag::PowerBlock);
            }
        }
        Piece::new(cells)
    }

    fn fall(&self, board: &mut BoardState, dt: f32) {
        let Some(mut piece) = board.piece else {
            board.phase = GamePhase::SpawnNext;
            return;
        };

        if !board.piece_resting(&piece) {
            let interval = if board.speed_timer > 0.0 {
                self.config.fall_interval * 0.5
            } else {
                self.config.fall_interval
            };
            board.fall_timer += dt;
            while board.fall_timer >= interval && !board.piece_resting(&piece) {
                board.fall_timer -= interval;
                piece.row += 1;
            }
            board.piece = Some(piece);
        }

        if board.piece_resting(&piece) {
            board.fall_timer = 0.0;
            board.phase = GamePhase::Locking;
        }
    }

    fn lock(&self, board: &mut BoardState, dt: f32) {
        let Some(piece) = board.piece else {
            board.phase = GamePhase::SpawnNext;
            return;
        };

        if !board.piece_resting(&piece) {
            board.phase = GamePhase::Falling;
            return;
        }

        board.lock_timer = (board.lock_timer - dt).max(0.0);
        if board.lock_timer > 0.0 {
            return;
        }

        board.piece = None;
        if !board.piece_fits(&piece) {
            self.game_over(board, "piece overlaps the stack");
            return;
        }

        let owner = board.allocate_owner_id();
        for (&(row, col), &cell) in piece.positions().iter().zip(piece.cells.iter()) {
            board.set(row, col, cell.with_owner_id(owner).unwrap_or(cell));
        }
        debug!(
            "board {} locked piece at col {} row {} (owner {})",
            board.board_id, piece.column, piece.row, owner
        );

        if piece.is_special() {
            self.land_special(board, &piece);
        }
        board.phase = GamePhase::Breaking;
    }

    /// Medusa petrifies, Midas breaks, every cell sharing the type under the piece.
    /// The special segments themselves are consumed.
    fn land_special(&self, board: &mut BoardState, piece: &Piece) {
        let kind = piece.cells[0].block_type();
        let beneath = board
            .get(piece.row + PIECE_LEN as i8, piece.column)
            .filter(|c| c.is_matchable())
            .map(|c| c.block_type());

        if let Some(target) = beneath {
            for row in 0..BOARD_ROWS {
                for col in 0..BOARD_COLS {
                    let cell = board.grid[row][col];
                    if !cell.is_matchable() || cell.block_type() != target {
                        continue;
                    }
                    match kind {
                        MEDUSA => {
                            board.grid[row][col] = Cell::block(STONE)
                                .and_then(|s| s.with_owner_id(cell.owner_id()))
                                .unwrap_or(cell);
                        }
                        MIDAS => board.break_cell(row, col, None, self.config.power_capacity),
                        _ => {}
                    }
                }
            }
            if kind == MIDAS {
                board.partner_breaks.push(target);
            }
            debug!(
                "board {} special {} landed on type {}",
                board.board_id, kind, target
            );
        }

        for (row, col) in piece.positions() {
            board.break_cell(row as usize, col as usize, None, self.config.power_capacity);
        }
    }

    fn break_matches(&self, board: &mut BoardState) {
        let mask = board.find_matches();
        let matched: ArrayVec<(usize, usize), GRID_CELLS> = (0..BOARD_ROWS)
            .flat_map(|row| (0..BOARD_COLS).map(move |col| (row, col)))
            .filter(|&(row, col)| mask[row][col])
            .collect();

        let mut letters_seen = 0u16;
        for &(row, col) in &matched {
            letters_seen |= 1 << board.grid[row][col].block_type();
            board.break_cell(row, col, None, self.config.power_capacity);
        }

        if !matched.is_empty() {
            board.power_progress += matched.len() as u32;
            while board.power_progress >= self.config.power_threshold {
                board.power_progress -= self.config.power_threshold;
                board.power_pending = true;
            }

            let all_letters = (FIRST_LETTER..FIRST_LETTER + LETTER_TYPES)
                .all(|t| letters_seen & (1 << t) != 0);
            if all_letters {
                board.yahoo_timer = self.config.yahoo_duration;
                debug!("board {} yahoo", board.board_id);
            }
        }

        board.animation_timer = if board.has_broken_cells() {
            self.config.break_delay
        } else {
            0.0
        };
        board.phase = GamePhase::Collapsing;
    }

    fn collapse(&self, board: &mut BoardState, dt: f32) {
        board.animation_timer = (board.animation_timer - dt).max(0.0);
        if board.animation_timer > 0.0 {
            return;
        }
        board.collapse();
        board.phase = GamePhase::CascadeCheck;
    }

    fn game_over(&self, board: &mut BoardState, reason: &str) {
        debug!("board {} game over: {}", board.board_id, reason);
        board.piece = None;
        board.phase = GamePhase::GameOver;
    }

    /// Move the active piece one column. Returns false if blocked or no piece.
    pub fn shift(&self, board: &mut BoardState, dx: i8) -> bool {
        self.try_place(board, |p| p.column += dx)
    }

    /// Soft drop by one row
    pub fn soft_drop(&self, board: &mut BoardState) -> bool {
        self.try_place(board, |p| p.row += 1)
    }

    /// Rotate the segment values (up: `[a,b,c] -> [b,c,a]`)
    pub fn cycle(&self, board: &mut BoardState, up: bool) -> bool {
        self.try_place(board, |p| if up { p.cycle_up() } else { p.cycle_down() })
    }

    /// Drop the piece to its resting row and lock on the next step.
    pub fn hard_drop(&self, board: &mut BoardState) -> bool {
        if !board.phase.has_active_piece() {
            return false;
        }
        let Some(mut piece) = board.piece else {
            return false;
        };
        while !board.piece_resting(&piece) {
            piece.row += 1;
        }
        board.piece = Some(piece);
        board.lock_timer = 0.0;
        board.fall_timer = 0.0;
        board.phase = GamePhase::Locking;
        true
    }

    fn try_place(&self, board: &mut BoardState, change: impl FnOnce(&mut Piece)) -> bool {
        if !board.phase.has_active_piece() {
            return false;
        }
        let Some(mut piece) = board.piece else {
            return false;
        };
        change(&mut piece);
        if !board.piece_fits(&piece) {
            return false;
        }
        board.piece = Some(piece);

        if board.phase == GamePhase::Locking {
            if self.grace_allows(board.lock_resets) {
                board.lock_timer = self.config.lock_delay;
                board.lock_resets = board.lock_resets.saturating_add(1);
            }
            if !board.piece_resting(&piece) {
                board.phase = GamePhase::Falling;
            }
        }
        true
    }

    fn grace_allows(&self, resets: u8) -> bool {
        match self.config.lock_grace {
            LockGrace::Reset => true,
            LockGrace::NoReset => false,
            LockGrace::Limited(limit) => resets < limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(t: u8) -> Cell {
        Cell::block(t).unwrap()
    }

    fn setup() -> (GameConfig, RandomSequence) {
        (
            GameConfig::default(),
            RandomSequence::materialize(42, 512, 5040),
        )
    }

    #[test]
    fn test_spawn_places_piece_and_preview() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);

        assert_eq!(machine.advance(&mut board, TICK_SECS), GamePhase::Falling);
        let piece = board.piece.unwrap();
        assert_eq!((piece.column, piece.row), (SPAWN_COLUMN, SPAWN_ROW));
        assert!(piece.cells.iter().all(|c| is_letter(c.block_type())));
        assert!(board.next_piece.is_some());
        assert_eq!(board.sequence_cursor, 6);
    }

    #[test]
    fn test_spawn_blocked_is_game_over() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        board.set(2, SPAWN_COLUMN, letter(STONE));

        assert_eq!(machine.advance(&mut board, TICK_SECS), GamePhase::GameOver);
        assert!(board.is_dead());

        let frozen = board.clone();
        machine.advance(&mut board, 1.0);
        assert_eq!(board, frozen);
    }

    #[test]
    fn test_piece_falls_and_locks() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        machine.advance(&mut board, 0.0);

        let mut steps = 0;
        while board.phase != GamePhase::Breaking && steps < 10_000 {
            machine.advance(&mut board, TICK_SECS);
            steps += 1;
        }
        assert_eq!(board.phase, GamePhase::Breaking);
        assert_eq!(board.filled_cells(), 3);
        assert!(!board.get(15, SPAWN_COLUMN).unwrap().is_empty());
        assert!(board.owner_id_used(0));
    }

    #[test]
    fn test_hard_drop_locks_next_step() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        machine.advance(&mut board, 0.0);

        assert!(machine.hard_drop(&mut board));
        assert_eq!(board.piece.unwrap().row, 13);
        assert_eq!(machine.advance(&mut board, TICK_SECS), GamePhase::Breaking);
    }

    #[test]
    fn test_shift_respects_walls() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        machine.advance(&mut board, 0.0);

        assert!(machine.shift(&mut board, -1));
        assert!(machine.shift(&mut board, -1));
        assert!(!machine.shift(&mut board, -1));
        assert_eq!(board.piece.unwrap().column, 0);
    }

    #[test]
    fn test_no_reset_grace_keeps_timer() {
        let (mut config, seq) = setup();
        config.lock_grace = LockGrace::NoReset;
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        machine.advance(&mut board, 0.0);
        machine.hard_drop(&mut board);
        board.lock_timer = 0.2;

        assert!(machine.cycle(&mut board, true));
        assert_eq!(board.lock_timer, 0.2);
        assert_eq!(board.lock_resets, 0);
    }

    #[test]
    fn test_reset_grace_always_restarts_timer() {
        let (mut config, seq) = setup();
        config.lock_grace = LockGrace::Reset;
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        machine.advance(&mut board, 0.0);
        machine.hard_drop(&mut board);

        for n in 1..=40u8 {
            board.lock_timer = 0.1;
            assert!(machine.cycle(&mut board, n % 2 == 0));
            assert_eq!(board.lock_timer, config.lock_delay);
            assert_eq!(board.lock_resets, n);
        }
        assert_eq!(board.phase, GamePhase::Locking);
    }

    #[test]
    fn test_limited_grace_counts_resets() {
        let (mut config, seq) = setup();
        config.lock_grace = LockGrace::Limited(1);
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        machine.advance(&mut board, 0.0);
        machine.hard_drop(&mut board);

        assert!(machine.cycle(&mut board, false));
        assert_eq!(board.lock_timer, config.lock_delay);
        board.lock_timer = 0.1;
        assert!(machine.cycle(&mut board, false));
        assert_eq!(board.lock_timer, 0.1);
    }

    #[test]
    fn test_break_marks_and_counts() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        for col in 0..3 {
            board.set(15, col, letter(2));
        }
        board.phase = GamePhase::Breaking;

        assert_eq!(machine.advance(&mut board, 0.0), GamePhase::Collapsing);
        assert_eq!(board.break_counts[2], 3);
        assert_eq!(board.broken_cells.len(), 3);
        assert_eq!(board.animation_timer, config.break_delay);
        assert!(board.get(15, 0).unwrap().has_flag(CellFlag::Broken));
    }

    #[test]
    fn test_power_threshold_promotes_next_piece() {
        let (mut config, seq) = setup();
        config.power_threshold = 3;
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        for col in 0..3 {
            board.set(15, col, letter(4));
        }
        board.phase = GamePhase::Breaking;
        machine.advance(&mut board, 0.0);
        assert!(board.power_pending);

        let piece = machine.draw_piece(&mut board);
        assert_eq!(piece.cells.iter().filter(|c| c.is_power()).count(), 1);
        assert!(!board.power_pending);
    }

    #[test]
    fn test_cascade_reenters_breaking() {
        let (mut config, seq) = setup();
        config.break_delay = 0.0;
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        // Vertical Y run in column 0 clears; the H above it lands in row 15
        // next to two Hs and forms a horizontal run.
        board.set(12, 0, letter(3));
        board.set(13, 0, letter(1));
        board.set(14, 0, letter(1));
        board.set(15, 0, letter(1));
        board.set(15, 1, letter(3));
        board.set(15, 2, letter(3));
        board.set(14, 1, letter(5));
        board.set(14, 2, letter(6));
        board.phase = GamePhase::Breaking;

        assert_eq!(machine.advance(&mut board, 0.0), GamePhase::Collapsing);
        assert_eq!(board.break_counts[1], 3);
        assert_eq!(machine.advance(&mut board, 0.0), GamePhase::CascadeCheck);
        assert_eq!(board.get(15, 0), Some(letter(3)));
        assert_eq!(machine.advance(&mut board, 0.0), GamePhase::Breaking);
        machine.advance(&mut board, 0.0);
        assert_eq!(board.break_counts[3], 3);
        machine.advance(&mut board, 0.0);
        assert_eq!(machine.advance(&mut board, 0.0), GamePhase::SpawnNext);
    }

    #[test]
    fn test_medusa_turns_type_to_stone() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        board.set(15, SPAWN_COLUMN, letter(2));
        board.set(15, 0, letter(2));
        board.set(15, 5, letter(4));
        board.special_pieces.push(MEDUSA);
        board.next_piece = None;

        machine.advance(&mut board, 0.0);
        assert!(board.piece.unwrap().is_special());
        machine.hard_drop(&mut board);
        machine.advance(&mut board, 0.0);

        assert!(board.get(15, 0).unwrap().is_stone());
        assert!(board.get(15, SPAWN_COLUMN).unwrap().is_stone());
        assert_eq!(board.get(15, 5), Some(letter(4)));
    }

    #[test]
    fn test_midas_breaks_type_and_requests_partner() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(0, 0);
        board.set(15, SPAWN_COLUMN, letter(5));
        board.set(15, 4, letter(5));
        board.special_pieces.push(MIDAS);

        machine.advance(&mut board, 0.0);
        machine.hard_drop(&mut board);
        machine.advance(&mut board, 0.0);

        assert!(board.get(15, 4).unwrap().has_flag(CellFlag::Broken));
        assert_eq!(board.break_counts[5], 2);
        assert_eq!(board.partner_breaks, vec![5]);
    }

    #[test]
    fn test_phases_always_return_to_spawn_or_end() {
        let (config, seq) = setup();
        let machine = PhaseMachine::new(&config, &seq);
        let mut board = BoardState::new(1, 64);
        let mut spawns = 0;
        for _ in 0..200_000 {
            let before = board.phase;
            let after = machine.advance(&mut board, TICK_SECS);
            if after == GamePhase::SpawnNext && before != GamePhase::SpawnNext {
                spawns += 1;
            }
            if after == GamePhase::GameOver {
                break;
            }
        }
        assert_eq!(board.phase, GamePhase::GameOver);
        assert!(spawns >= 5);
    }
}
