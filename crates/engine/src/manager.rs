//! Game manager - session orchestrator for up to eight boards
//!
//! The manager owns every board of a match, the shared piece stream, the
//! effect generator and the action queue. One call to [`GameManager::update`]
//! is one tick:
//!
//! 1. drain queued actions with `tick <= current_tick`, in submission order
//! 2. advance every live board's phase machine by `delta`
//! 3. carry out partner breaks and refresh each board's partner mirror
//!
//! A manager created with a local seat also predicts: it keeps recent local
//! snapshots and tick deltas so an authoritative snapshot can be checked
//! against what was predicted and, on divergence, replayed forward.

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use towers_core::types::*;
use towers_core::{
    BoardState, ConfigError, EndMode, GameConfig, PhaseMachine, RandomGenerator, RandomSequence,
};

use crate::error::ActionError;
use crate::queue::ActionQueue;
use crate::resolver::{ActionResolver, Resolution};

/// Bound of the shared piece stream; divisible by every modulus the engine uses.
pub const SEQUENCE_BOUND: u32 = 5040;

/// Mixed into the match seed for the effect generator.
pub const EFFECT_SALT: u64 = 0x7A11_5EED;

/// Everything a peer needs to resume a match without replaying history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub seed: u64,
    pub tick: u64,
    pub effect_rng_state: u64,
    pub boards: Vec<BoardState>,
}

/// Outcome of [`GameManager::receive_server_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Non-local board (or no usable history): snapshot installed as-is
    Overwritten,
    /// Snapshot equals the prediction for its tick; local state kept
    Confirmed,
    /// Prediction diverged: snapshot installed, then local inputs replayed
    Replayed { from_tick: u64, ticks: u64, actions: usize },
}

/// Recorded tick to re-run during reconciliation
#[derive(Debug, Clone, Copy)]
struct ReplayStep {
    tick: u64,
    delta: f32,
    rng_state: u64,
}

/// One simulated tick as seen by the predicting seat.
#[derive(Debug, Clone)]
struct Prediction {
    /// Board tick before this step ran
    tick: u64,
    delta: f32,
    /// Effect generator state before the tick's actions were drained
    rng_state: u64,
    /// Local board after the step
    board: BoardState,
}

pub struct GameManager {
    config: GameConfig,
    seed: u64,
    sequence: RandomSequence,
    effect_rng: RandomGenerator,
    boards: Vec<BoardState>,
    queue: ActionQueue,
    current_tick: u64,
    clock_ms: u64,
    running: bool,
    local_seat: Option<u8>,
    predictions: VecDeque<Prediction>,
    /// Local inputs not yet covered by an authoritative snapshot
    local_actions: Vec<PlayerAction>,
    rejections: Vec<(PlayerAction, ActionError)>,
}

impl GameManager {
    /// Build a manager and initialize it with `seed` (no local seat).
    pub fn new(config: GameConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let sequence = RandomSequence::materialize(seed, config.sequence_length, SEQUENCE_BOUND);
        let mut manager = Self {
            config,
            seed,
            sequence,
            effect_rng: RandomGenerator::new(seed ^ EFFECT_SALT),
            boards: Vec::new(),
            queue: ActionQueue::new(),
            current_tick: 0,
            clock_ms: 0,
            running: false,
            local_seat: None,
            predictions: VecDeque::new(),
            local_actions: Vec::new(),
            rejections: Vec::new(),
        };
        manager.initialize(seed, None);
        Ok(manager)
    }

    /// Rebuild every board from `seed`; `local_seat` enables prediction for that seat.
    pub fn initialize(&mut self, seed: u64, local_seat: Option<u8>) {
        let seats = self.config.seats;
        if self.seed != seed || self.sequence.is_empty() {
            self.sequence =
                RandomSequence::materialize(seed, self.config.sequence_length, SEQUENCE_BOUND);
        }
        self.seed = seed;
        self.effect_rng = RandomGenerator::new(seed ^ EFFECT_SALT);

        let stride = self.sequence.len() / MAX_SEATS;
        self.boards = (0..seats)
            .map(|i| BoardState::new(i as u8, i * stride))
            .collect();
        self.queue.clear();
        self.current_tick = 0;
        self.clock_ms = 0;
        self.running = false;
        self.local_seat = local_seat.filter(|&s| (s as usize) < seats);
        self.predictions.clear();
        self.local_actions.clear();
        self.rejections.clear();
        self.mirror_partners();

        info!(
            "initialized match: seed={} seats={} local={:?}",
            seed, seats, self.local_seat
        );
    }

    /// New match with a new seed; keeps the local seat.
    pub fn reset(&mut self, seed: u64) {
        info!("reset match (seed {})", seed);
        self.initialize(seed, self.local_seat);
    }

    pub fn start_game_loop(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        for board in &mut self.boards {
            if !board.game_started {
                board.game_started = true;
                board.server_start_ms = self.clock_ms;
                board.now_ms = self.clock_ms;
                board.prev_ms = self.clock_ms;
            }
        }
        info!("game loop started at tick {}", self.current_tick);
    }

    /// Stop ticking; boards keep their last computed state.
    pub fn end_game_loop(&mut self) {
        if self.running {
            info!("game loop ended at tick {}", self.current_tick);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Validate, deduplicate and queue an action (authoritative path).
    pub fn submit_action(&mut self, action: PlayerAction) -> Result<(), ActionError> {
        if action.initiator as usize >= self.boards.len() {
            return Err(ActionError::UnknownSeat {
                seat: action.initiator,
            });
        }
        ActionResolver::validate_payload(&action)?;
        self.queue.push(action, self.current_tick)
    }

    /// Queue an input from the local seat for predicted application.
    pub fn apply_local_player_action(&mut self, action: PlayerAction) -> Result<(), ActionError> {
        let local = self.local_seat.ok_or(ActionError::NoLocalSeat)?;
        if action.initiator != local {
            return Err(ActionError::NotLocalSeat {
                seat: action.initiator,
            });
        }
        self.submit_action(action)?;
        self.local_actions.push(action);
        Ok(())
    }

    /// Run one tick of `delta` seconds. No-op unless the loop is running.
    pub fn update(&mut self, delta: f32) {
        if !self.running {
            return;
        }
        let delta = delta.max(0.0);
        let tick = self.current_tick;
        let local_before = self
            .local_seat
            .and_then(|s| self.boards.get(s as usize))
            .map(|b| b.tick);
        let rng_before = self.effect_rng.state();

        let resolver = ActionResolver::new(&self.config, &self.sequence);
        for action in self.queue.drain_ready(tick) {
            match resolver.resolve(&mut self.boards, &action, &mut self.effect_rng) {
                Ok(Resolution::Absorbed { target, effect }) => {
                    debug!("tick {}: {:?} absorbed by board {}", tick, effect, target);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        "tick {}: rejected {} from seat {}: {} ({})",
                        tick,
                        action.action.as_str(),
                        action.initiator,
                        err,
                        err.code().as_str()
                    );
                    self.rejections.push((action, err));
                }
            }
        }

        self.clock_ms = self
            .clock_ms
            .saturating_add((delta * 1000.0).round() as u64);
        let machine = PhaseMachine::new(&self.config, &self.sequence);
        for board in self.boards.iter_mut().filter(|b| !b.is_dead()) {
            machine.advance(board, delta);
            board.tick += 1;
            board.advance_clock(delta);
        }
        resolver.apply_partner_breaks(&mut self.boards);
        self.mirror_partners();

        if let (Some(seat), Some(before)) = (self.local_seat, local_before) {
            self.record_prediction(seat, before, delta, rng_before);
        }

        self.current_tick += 1;
        self.queue.prune(self.current_tick);
    }

    fn record_prediction(&mut self, seat: u8, tick: u64, delta: f32, rng_state: u64) {
        let Some(board) = self.boards.get(seat as usize) else {
            return;
        };
        self.predictions.push_back(Prediction {
            tick,
            delta,
            rng_state,
            board: board.clone(),
        });
        while self.predictions.len() > self.config.prediction_history {
            self.predictions.pop_front();
        }
    }

    fn mirror_partners(&mut self) {
        for seat in 0..self.boards.len() {
            let partner = partner_of(seat);
            if partner >= self.boards.len() || self.boards[seat].is_dead() {
                continue;
            }
            let grid = self.boards[partner].grid;
            self.boards[seat].partner_grid = grid;
        }
    }

    /// Install an authoritative snapshot for `seat`.
    ///
    /// The snapshot always wins. For the local seat the snapshot is compared
    /// with the prediction made for the same board tick; on a mismatch the
    /// local inputs issued after that tick are replayed on top of it.
    pub fn receive_server_state(
        &mut self,
        seat: u8,
        state: BoardState,
    ) -> Result<Reconciliation, ActionError> {
        let idx = seat as usize;
        if idx >= self.boards.len() {
            return Err(ActionError::UnknownSeat { seat });
        }
        if state.board_id != seat {
            return Err(ActionError::SnapshotMismatch {
                seat,
                board_id: state.board_id,
            });
        }

        if self.local_seat != Some(seat) {
            self.boards[idx] = state;
            self.mirror_partners();
            return Ok(Reconciliation::Overwritten);
        }

        let server_tick = state.tick;
        self.local_actions.retain(|a| a.tick >= server_tick);

        let predicted = self
            .predictions
            .iter()
            .find(|p| p.board.tick == server_tick)
            .map(|p| &p.board);
        if predicted == Some(&state) {
            self.predictions.retain(|p| p.board.tick > server_tick);
            return Ok(Reconciliation::Confirmed);
        }

        let replay: Vec<ReplayStep> = self
            .predictions
            .iter()
            .filter(|p| p.tick >= server_tick)
            .map(|p| ReplayStep {
                tick: p.tick,
                delta: p.delta,
                rng_state: p.rng_state,
            })
            .collect();
        let covered = replay.first().map_or(false, |step| step.tick == server_tick);

        self.boards[idx] = state;
        self.predictions.clear();
        if !covered {
            self.mirror_partners();
            info!(
                "seat {} overwritten at tick {} (no prediction history)",
                seat, server_tick
            );
            return Ok(Reconciliation::Overwritten);
        }

        let replayed = self.replay_local(idx, &replay);
        self.mirror_partners();
        info!(
            "seat {} diverged at tick {}; replayed {} ticks, {} inputs",
            seat,
            server_tick,
            replay.len(),
            replayed
        );
        Ok(Reconciliation::Replayed {
            from_tick: server_tick,
            ticks: replay.len() as u64,
            actions: replayed,
        })
    }

    /// Re-simulate the local board over recorded ticks, re-applying every
    /// local input of each tick.
    ///
    /// Actions resolve against a scratch copy of the match and only the local
    /// board is kept: offensive effects aimed at other seats, and Midas breaks
    /// requested for the partner, stay server-owned. Each tick's actions draw
    /// from the effect generator as it stood when that tick was first predicted.
    fn replay_local(&mut self, idx: usize, steps: &[ReplayStep]) -> usize {
        let machine = PhaseMachine::new(&self.config, &self.sequence);
        let resolver = ActionResolver::new(&self.config, &self.sequence);
        let start = steps.first().map_or(0, |step| step.tick);
        // Board ticks and manager ticks differ by a constant offset for a live board.
        let offset = self.current_tick.saturating_sub(start + steps.len() as u64);
        let mut applied = 0;

        for step in steps {
            if self.boards[idx].is_dead() {
                break;
            }
            let manager_tick = step.tick + offset;
            let inputs: Vec<PlayerAction> = self
                .local_actions
                .iter()
                .filter(|a| a.tick == manager_tick)
                .copied()
                .collect();
            if !inputs.is_empty() {
                let mut rng = RandomGenerator::from_state(step.rng_state);
                for action in &inputs {
                    let mut scratch = self.boards.clone();
                    if resolver.resolve(&mut scratch, action, &mut rng).is_ok() {
                        applied += 1;
                    }
                    self.boards[idx] = scratch.swap_remove(idx);
                }
            }

            let board = &mut self.boards[idx];
            machine.advance(board, step.delta);
            board.tick += 1;
            board.advance_clock(step.delta);
            board.partner_breaks.clear();
            self.predictions.push_back(Prediction {
                tick: step.tick,
                delta: step.delta,
                rng_state: step.rng_state,
                board: self.boards[idx].clone(),
            });
        }
        applied
    }

    pub fn get_board_state(&self, seat: u8) -> Option<&BoardState> {
        self.boards.get(seat as usize)
    }

    /// The seat's board followed by its partner's, when present.
    pub fn board_states(&self, seat: u8) -> Vec<&BoardState> {
        let idx = seat as usize;
        [idx, partner_of(idx)]
            .into_iter()
            .filter_map(|i| self.boards.get(i))
            .collect()
    }

    pub fn boards(&self) -> &[BoardState] {
        &self.boards
    }

    pub fn is_player_dead(&self, seat: u8) -> bool {
        self.boards
            .get(seat as usize)
            .map_or(false, BoardState::is_dead)
    }

    /// True once the configured end condition holds.
    ///
    /// A single-seat match ends when its only board dies, whatever the mode.
    pub fn check_game_end_conditions(&self) -> bool {
        let alive: Vec<usize> = (0..self.boards.len())
            .filter(|&i| !self.boards[i].is_dead())
            .collect();
        if self.boards.len() <= 1 {
            return alive.is_empty();
        }
        match self.config.end_mode {
            EndMode::LastSeatStanding => alive.len() <= 1,
            EndMode::LastTeamStanding => alive.windows(2).all(|w| w[0] / 2 == w[1] / 2),
            EndMode::AllSeatsDead => alive.is_empty(),
        }
    }

    /// Rejections collected during `update` since the last call.
    pub fn take_rejections(&mut self) -> Vec<(PlayerAction, ActionError)> {
        std::mem::take(&mut self.rejections)
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            seed: self.seed,
            tick: self.current_tick,
            effect_rng_state: self.effect_rng.state(),
            boards: self.boards.clone(),
        }
    }

    /// Resume from a snapshot without replaying history.
    pub fn restore_snapshot(&mut self, snapshot: MatchSnapshot) -> Result<(), ActionError> {
        if snapshot.boards.len() != self.config.seats {
            return Err(ActionError::SeatCountMismatch {
                expected: self.config.seats,
                found: snapshot.boards.len(),
            });
        }
        if let Some((i, board)) = snapshot
            .boards
            .iter()
            .enumerate()
            .find(|(i, b)| b.board_id as usize != *i)
        {
            return Err(ActionError::SnapshotMismatch {
                seat: i as u8,
                board_id: board.board_id,
            });
        }
        if snapshot.seed != self.seed {
            self.sequence = RandomSequence::materialize(
                snapshot.seed,
                self.config.sequence_length,
                SEQUENCE_BOUND,
            );
        }
        self.seed = snapshot.seed;
        self.current_tick = snapshot.tick;
        self.effect_rng.set_state(snapshot.effect_rng_state);
        self.boards = snapshot.boards;
        self.queue.clear();
        self.predictions.clear();
        self.local_actions.clear();
        info!("restored snapshot at tick {}", self.current_tick);
        Ok(())
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn local_seat(&self) -> Option<u8> {
        self.local_seat
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }
}
