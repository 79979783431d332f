//! Headless match driver used by the `towers-sim` binary.
//!
//! Runs an authoritative match at a fixed 60 Hz with scripted inputs drawn
//! from a seeded generator, so the same arguments always produce the same
//! final boards.

use anyhow::{anyhow, Result};
use log::info;

use crate::core::{GameConfig, RandomGenerator};
use crate::engine::{GameManager, MatchSnapshot};
use crate::term::Verbosity;
use crate::types::{ActionType, AttackTarget, PlayerAction, MAX_SEATS, TICK_SECS};

/// Mixed into the match seed for the scripted input generator.
const INPUT_SALT: u64 = 0x1A9_07C3;

/// Ticks between scripted inputs per seat
const INPUT_EVERY: u64 = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub seed: u64,
    pub seats: usize,
    pub ticks: u64,
    pub verbosity: Verbosity,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            seats: 2,
            ticks: 3600,
            verbosity: Verbosity::Normal,
        }
    }
}

pub fn parse_sim_args(args: &[String]) -> Result<SimConfig> {
    let mut config = SimConfig::default();
    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .ok_or_else(|| anyhow!("sim: missing value for {}", flag))
        };
        match flag {
            "--seed" => {
                let v = value()?;
                config.seed = v
                    .parse::<u64>()
                    .map_err(|_| anyhow!("sim: invalid --seed value: {}", v))?;
            }
            "--seats" => {
                let v = value()?;
                config.seats = v
                    .parse::<usize>()
                    .ok()
                    .filter(|n| (1..=MAX_SEATS).contains(n))
                    .ok_or_else(|| anyhow!("sim: --seats must be 1-{}: {}", MAX_SEATS, v))?;
            }
            "--ticks" => {
                let v = value()?;
                config.ticks = v
                    .parse::<u64>()
                    .map_err(|_| anyhow!("sim: invalid --ticks value: {}", v))?;
            }
            "--verbosity" => {
                let v = value()?;
                config.verbosity = Verbosity::from_str(v)
                    .ok_or_else(|| anyhow!("sim: invalid --verbosity value: {}", v))?;
            }
            other => {
                return Err(anyhow!("sim: unknown argument: {}", other));
            }
        }
        i += 2;
    }
    Ok(config)
}

/// Result of a headless run.
#[derive(Debug, Clone)]
pub struct SimReport {
    pub ticks_run: u64,
    pub rejected: usize,
    pub ended: bool,
    pub snapshot: MatchSnapshot,
}

/// Play a match to its end condition or the tick limit.
pub fn run_sim(sim: &SimConfig, mut game: GameConfig) -> Result<SimReport> {
    game.seats = sim.seats;
    let mut gm = GameManager::new(game, sim.seed)?;
    let mut inputs = RandomGenerator::new(sim.seed ^ INPUT_SALT);
    let mut rejected = 0;
    let mut ended = false;

    gm.start_game_loop();
    while gm.current_tick() < sim.ticks {
        let tick = gm.current_tick();
        if tick % INPUT_EVERY == 0 {
            for seat in 0..sim.seats as u8 {
                if gm.is_player_dead(seat) {
                    continue;
                }
                let action = scripted_action(&gm, seat, &mut inputs);
                if gm.submit_action(PlayerAction::new(seat, action, seat, tick)).is_err() {
                    rejected += 1;
                }
            }
        }
        gm.update(TICK_SECS);
        rejected += gm.take_rejections().len();

        if gm.check_game_end_conditions() {
            ended = true;
            break;
        }
    }
    gm.end_game_loop();

    info!(
        "sim finished: ticks={} rejected={} ended={}",
        gm.current_tick(),
        rejected,
        ended
    );
    Ok(SimReport {
        ticks_run: gm.current_tick(),
        rejected,
        ended,
        snapshot: gm.snapshot(),
    })
}

fn scripted_action(gm: &GameManager, seat: u8, rng: &mut RandomGenerator) -> ActionType {
    let has_power = gm
        .get_board_state(seat)
        .map_or(false, |b| !b.active_powers.is_empty());
    if has_power && rng.next_bounded(4) == 0 {
        return ActionType::Attack(AttackTarget::Random);
    }
    match rng.next_bounded(6) {
        0 => ActionType::MoveLeft,
        1 => ActionType::MoveRight,
        2 => ActionType::CycleUp,
        3 => ActionType::CycleDown,
        4 => ActionType::MoveDown,
        _ => ActionType::Drop,
    }
}
