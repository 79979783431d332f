//! JSON round trips for the records that cross the session boundary

use towers::core::{GameConfig, LockGrace};
use towers::engine::{GameManager, MatchSnapshot};
use towers::types::{ActionType, AttackTarget, PlayerAction, TICK_SECS};

#[test]
fn snapshot_survives_json() {
    let mut gm = GameManager::new(GameConfig::default(), 2024).unwrap();
    gm.start_game_loop();
    for _ in 0..240 {
        gm.update(TICK_SECS);
    }
    let snapshot = gm.snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: MatchSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);

    let mut restored = GameManager::new(GameConfig::default(), 1).unwrap();
    restored.restore_snapshot(back).unwrap();
    assert_eq!(restored.current_tick(), 240);
    assert_eq!(restored.seed(), 2024);
}

#[test]
fn action_payload_is_optional_on_the_wire() {
    let plain = PlayerAction::new(1, ActionType::Drop, 1, 9);
    let json = serde_json::to_string(&plain).unwrap();
    assert!(!json.contains("payload"));

    let attack = PlayerAction::new(0, ActionType::Attack(AttackTarget::Seat(3)), 3, 12);
    let back: PlayerAction = serde_json::from_str(&serde_json::to_string(&attack).unwrap()).unwrap();
    assert_eq!(back.action, attack.action);

    let add = PlayerAction::new(2, ActionType::AddBlock, 5, 4).with_payload(17);
    let back: PlayerAction = serde_json::from_str(&serde_json::to_string(&add).unwrap()).unwrap();
    assert_eq!(back.payload, Some(17));
}

#[test]
fn config_round_trip_and_partial_input() {
    let config = GameConfig {
        seats: 6,
        lock_grace: LockGrace::Limited(4),
        ..GameConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(GameConfig::from_json_str(&json).unwrap(), config);

    let partial = GameConfig::from_json_str(r#"{"seats": 3}"#).unwrap();
    assert_eq!(partial.seats, 3);
    assert_eq!(partial.lock_grace, GameConfig::default().lock_grace);
}
