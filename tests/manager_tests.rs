//! Session lifecycle, determinism and reconciliation

use towers::core::{GameConfig, Power, RandomGenerator};
use towers::engine::{ActionError, GameManager, Reconciliation};
use towers::types::{ActionType, AttackTarget, GamePhase, PlayerAction, MIDAS, TICK_SECS};

fn config(seats: usize) -> GameConfig {
    GameConfig {
        seats,
        ..GameConfig::default()
    }
}

fn scripted(tick: u64, seats: usize, rng: &mut RandomGenerator) -> Vec<PlayerAction> {
    const INPUTS: [ActionType; 6] = [
        ActionType::MoveLeft,
        ActionType::MoveRight,
        ActionType::CycleUp,
        ActionType::CycleDown,
        ActionType::MoveDown,
        ActionType::Drop,
    ];
    (0..seats as u8)
        .map(|seat| {
            let action = INPUTS[rng.next_bounded(INPUTS.len() as u32) as usize];
            PlayerAction::new(seat, action, seat, tick)
        })
        .collect()
}

#[test]
fn identical_inputs_identical_snapshots() {
    let mut a = GameManager::new(config(4), 1234).unwrap();
    let mut b = GameManager::new(config(4), 1234).unwrap();
    let mut rng_a = RandomGenerator::new(77);
    let mut rng_b = RandomGenerator::new(77);
    a.start_game_loop();
    b.start_game_loop();

    for tick in 0..3000u64 {
        if tick % 10 == 0 {
            for action in scripted(tick, 4, &mut rng_a) {
                let _ = a.submit_action(action);
            }
            for action in scripted(tick, 4, &mut rng_b) {
                let _ = b.submit_action(action);
            }
        }
        a.update(TICK_SECS);
        b.update(TICK_SECS);
        assert_eq!(a.snapshot(), b.snapshot(), "diverged at tick {}", tick);
    }
}

#[test]
fn different_seeds_differ() {
    let mut a = GameManager::new(config(1), 1).unwrap();
    let mut b = GameManager::new(config(1), 2).unwrap();
    a.start_game_loop();
    b.start_game_loop();
    a.update(TICK_SECS);
    b.update(TICK_SECS);
    let a = a.get_board_state(0).unwrap();
    let b = b.get_board_state(0).unwrap();
    assert_ne!((a.piece, a.next_piece), (b.piece, b.next_piece));
}

#[test]
fn lifecycle_flags() {
    let mut gm = GameManager::new(config(2), 3).unwrap();
    assert!(!gm.is_running());
    gm.start_game_loop();
    assert!(gm.is_running());
    for _ in 0..10 {
        gm.update(TICK_SECS);
    }
    let mid = gm.snapshot();

    gm.end_game_loop();
    assert!(!gm.is_running());
    gm.update(TICK_SECS);
    assert_eq!(gm.snapshot(), mid);

    let board = gm.get_board_state(0).unwrap();
    assert!(board.game_started);
    assert_eq!(board.now_ms - board.server_start_ms, 170);
    assert_eq!(board.tick, 10);
}

#[test]
fn reset_starts_new_match() {
    let mut gm = GameManager::new(config(2), 3).unwrap();
    gm.start_game_loop();
    for _ in 0..50 {
        gm.update(TICK_SECS);
    }
    gm.reset(4);
    assert_eq!(gm.current_tick(), 0);
    assert_eq!(gm.seed(), 4);
    assert!(gm
        .boards()
        .iter()
        .all(|b| b.phase == GamePhase::SpawnNext && b.tick == 0));
}

#[test]
fn snapshot_restore_resumes_identically() {
    let mut a = GameManager::new(config(2), 8).unwrap();
    a.start_game_loop();
    for _ in 0..200 {
        a.update(TICK_SECS);
    }

    let mut b = GameManager::new(config(2), 1).unwrap();
    b.restore_snapshot(a.snapshot()).unwrap();
    b.start_game_loop();
    for _ in 0..500 {
        a.update(TICK_SECS);
        b.update(TICK_SECS);
    }
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn matching_prediction_is_confirmed() {
    let mut server = GameManager::new(config(2), 55).unwrap();
    let mut client = GameManager::new(config(2), 55).unwrap();
    client.initialize(55, Some(0));
    server.start_game_loop();
    client.start_game_loop();

    let input = PlayerAction::new(0, ActionType::MoveLeft, 0, 3);
    server.submit_action(input).unwrap();
    client.apply_local_player_action(input).unwrap();
    for _ in 0..10 {
        server.update(TICK_SECS);
        client.update(TICK_SECS);
    }

    let authoritative = server.get_board_state(0).unwrap().clone();
    assert_eq!(
        client.receive_server_state(0, authoritative.clone()),
        Ok(Reconciliation::Confirmed)
    );
    assert_eq!(client.get_board_state(0), Some(&authoritative));
}

#[test]
fn divergent_prediction_is_replayed() {
    let mut server = GameManager::new(config(2), 55).unwrap();
    let mut client = GameManager::new(config(2), 55).unwrap();
    client.initialize(55, Some(0));
    server.start_game_loop();
    client.start_game_loop();

    // The server never saw the first input.
    let lost = PlayerAction::new(0, ActionType::MoveLeft, 0, 3);
    let kept = PlayerAction::new(0, ActionType::MoveRight, 0, 7);
    client.apply_local_player_action(lost).unwrap();
    client.apply_local_player_action(kept).unwrap();
    server.submit_action(kept).unwrap();

    for _ in 0..5 {
        server.update(TICK_SECS);
    }
    let at_five = server.get_board_state(0).unwrap().clone();
    for _ in 0..5 {
        server.update(TICK_SECS);
    }
    for _ in 0..10 {
        client.update(TICK_SECS);
    }
    assert_ne!(client.get_board_state(0), server.get_board_state(0));

    let outcome = client.receive_server_state(0, at_five).unwrap();
    assert_eq!(
        outcome,
        Reconciliation::Replayed {
            from_tick: 5,
            ticks: 5,
            actions: 1
        }
    );
    assert_eq!(client.get_board_state(0), server.get_board_state(0));
}

#[test]
fn remote_boards_are_overwritten() {
    let mut server = GameManager::new(config(2), 9).unwrap();
    let mut client = GameManager::new(config(2), 9).unwrap();
    client.initialize(9, Some(0));
    server.start_game_loop();
    server.update(TICK_SECS);

    let remote = server.get_board_state(1).unwrap().clone();
    assert_eq!(
        client.receive_server_state(1, remote.clone()),
        Ok(Reconciliation::Overwritten)
    );
    assert_eq!(client.get_board_state(1), Some(&remote));
    assert_eq!(client.get_board_state(0).unwrap().partner_grid, remote.grid);
}

#[test]
fn mismatched_snapshot_is_out_of_sync() {
    let mut gm = GameManager::new(config(2), 9).unwrap();
    let other = gm.get_board_state(1).unwrap().clone();
    let err = gm.receive_server_state(0, other).unwrap_err();
    assert_eq!(err, ActionError::SnapshotMismatch { seat: 0, board_id: 1 });
    assert!(err.is_sync_error());
}

/// Install a retained power on `seat` in every given manager.
fn grant_power(managers: &mut [&mut GameManager], seat: u8, power: Power) {
    for gm in managers.iter_mut() {
        let mut board = gm.get_board_state(seat).unwrap().clone();
        board.active_powers.push(power);
        gm.receive_server_state(seat, board).unwrap();
    }
}

#[test]
fn replay_reapplies_local_attacks() {
    let mut server = GameManager::new(config(2), 61).unwrap();
    let mut client = GameManager::new(config(2), 61).unwrap();
    client.initialize(61, Some(0));
    // Defensive Midas: spending it queues a Midas piece on the spender.
    let midas = Power {
        block_type: 5,
        field: 0,
    };
    grant_power(&mut [&mut server, &mut client], 0, midas);
    server.start_game_loop();
    client.start_game_loop();

    let lost = PlayerAction::new(0, ActionType::MoveLeft, 0, 3);
    let spend = PlayerAction::new(0, ActionType::Attack(AttackTarget::Seat(0)), 0, 7);
    client.apply_local_player_action(lost).unwrap();
    client.apply_local_player_action(spend).unwrap();
    server.submit_action(spend).unwrap();

    for _ in 0..5 {
        server.update(TICK_SECS);
    }
    let at_five = server.get_board_state(0).unwrap().clone();
    for _ in 0..5 {
        server.update(TICK_SECS);
    }
    for _ in 0..10 {
        client.update(TICK_SECS);
    }

    let outcome = client.receive_server_state(0, at_five).unwrap();
    assert_eq!(
        outcome,
        Reconciliation::Replayed {
            from_tick: 5,
            ticks: 5,
            actions: 1
        }
    );
    let board = client.get_board_state(0).unwrap();
    assert!(board.active_powers.is_empty());
    assert_eq!(board.special_pieces, vec![MIDAS]);
    assert_eq!(Some(board), server.get_board_state(0));
}

#[test]
fn replay_leaves_attacked_boards_to_the_server() {
    let mut server = GameManager::new(config(2), 62).unwrap();
    let mut client = GameManager::new(config(2), 62).unwrap();
    client.initialize(62, Some(0));
    let add_row = Power {
        block_type: 1,
        field: 1,
    };
    grant_power(&mut [&mut server, &mut client], 0, add_row);
    server.start_game_loop();
    client.start_game_loop();

    let lost = PlayerAction::new(0, ActionType::MoveLeft, 0, 2);
    let attack = PlayerAction::new(0, ActionType::Attack(AttackTarget::Seat(1)), 1, 6);
    client.apply_local_player_action(lost).unwrap();
    client.apply_local_player_action(attack).unwrap();
    server.submit_action(attack).unwrap();

    for _ in 0..4 {
        server.update(TICK_SECS);
    }
    let at_four = server.get_board_state(0).unwrap().clone();
    for _ in 0..6 {
        server.update(TICK_SECS);
    }
    for _ in 0..10 {
        client.update(TICK_SECS);
    }
    let opponent = client.get_board_state(1).unwrap().clone();
    assert_eq!(opponent.powers_received, 1);

    let outcome = client.receive_server_state(0, at_four).unwrap();
    assert!(matches!(outcome, Reconciliation::Replayed { actions: 1, .. }));
    assert_eq!(client.get_board_state(1), Some(&opponent));
    assert_eq!(client.get_board_state(0), server.get_board_state(0));
}
