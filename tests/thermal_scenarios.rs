//! Throttle coalescing of rapid target-temperature requests, auto-restart
//! after idle drift past the threshold, and the `needs_auto_restart`
//! threshold edge.

mod common;

use chrono::Utc;
use hotel_ac_core::domain::{Mode, Room, Speed};
use hotel_ac_core::repository::Repository;

/// Four target-temp requests arrive at t=0, t+200ms, t+400ms and
/// t+1100ms with `change_temp_ms=1000`. Only the first applies immediately;
/// the rest coalesce into a single pending value that is overwritten by each
/// later request, so only the *last* pending value (22) is ever applied.
#[test]
fn throttle_coalesces_rapid_requests_into_one_applied_change() {
    let mut room = Room::new("A", 25.0, 100.0);
    room.check_in();
    let t0 = Utc::now();
    let throttle_ms = 1000;
    let range = Some((16.0, 30.0));

    let applied = room.request_target_temp(24.0, t0, throttle_ms, range).unwrap();
    assert!(applied, "first request always applies immediately");
    assert_eq!(room.target_temp, 24.0);

    let applied = room
        .request_target_temp(23.0, t0 + chrono::Duration::milliseconds(200), throttle_ms, range)
        .unwrap();
    assert!(!applied, "second request arrives inside the throttle window");
    assert_eq!(room.pending_target_temp, Some(23.0));

    let applied = room
        .request_target_temp(22.0, t0 + chrono::Duration::milliseconds(400), throttle_ms, range)
        .unwrap();
    assert!(!applied, "third request also buffers, overwriting the pending value");
    assert_eq!(room.pending_target_temp, Some(22.0));
    assert_eq!(room.target_temp, 24.0, "target unchanged until the window elapses");

    // Q7: `apply_pending_target` before the window has elapsed is a no-op.
    room.apply_pending_target(t0 + chrono::Duration::milliseconds(900), throttle_ms);
    assert_eq!(room.target_temp, 24.0);
    assert_eq!(room.pending_target_temp, Some(22.0));

    let applied = room
        .request_target_temp(21.0, t0 + chrono::Duration::milliseconds(1100), throttle_ms, range)
        .unwrap();
    assert!(applied, "the window has elapsed since the last applied change (t0)");
    assert_eq!(room.target_temp, 21.0);
    assert_eq!(room.pending_target_temp, None, "an applied request clears any pending value");
}

/// `needs_auto_restart` trips at exactly `|current - target| == threshold`,
/// not only strictly beyond it.
#[test]
fn needs_auto_restart_trips_at_exact_threshold() {
    let mut room = Room::new("A", 24.0, 100.0);
    room.check_in();
    room.target_temp = 24.0;

    room.current_temp = 24.9;
    assert!(!room.needs_auto_restart(1.0));

    room.current_temp = 25.0;
    assert!(room.needs_auto_restart(1.0), "exact threshold counts as drifted");

    room.manual_powered_off = true;
    assert!(!room.needs_auto_restart(1.0), "a manual power-off suppresses auto-restart");
}

/// A room reaches its target while serving, is released, drifts
/// back out past the auto-restart threshold while idle, and re-enters the
/// scheduler at its last speed.
#[tokio::test]
async fn room_auto_restarts_after_idle_drift_past_threshold() {
    let mut cfg = common::small_config();
    // Fast-forward the thermal constants so the scenario needs only a
    // couple of ticks instead of hundreds.
    cfg.temperature.mid_delta_per_min = 240.0;
    cfg.temperature.idle_drift_per_min = 60.0;
    cfg.temperature.auto_restart_threshold = 1.0;

    let context = common::build_context(cfg).await;
    let room_id = "A";

    context
        .checkin_service
        .check_in(room_id, "cust", "Guest", 1, Utc::now(), 0.0)
        .await
        .unwrap();

    let mut room = context.repository.get_room(room_id).await.unwrap().unwrap();
    room.current_temp = 28.0;
    context.repository.save_room(room).await.unwrap();

    context
        .ac_service
        .power_on(room_id, Mode::Cool, 24.0, Speed::Mid)
        .await
        .unwrap();

    // One tick at mid_delta_per_min=240 moves current_temp by 4.0/sec,
    // snapping the room straight onto its 24.0 target.
    context.timers.tick().await;
    common::settle().await;

    let room = context.repository.get_room(room_id).await.unwrap().unwrap();
    assert_eq!(room.current_temp, 24.0);
    assert!(!room.is_serving, "reaching target released the service slot");

    // Idle now: idle_drift_per_min=60 moves 1.0/sec toward initial_temp
    // (28.0), crossing the threshold in this same tick's auto-restart stage.
    context.timers.tick().await;
    common::settle().await;

    let room = context.repository.get_room(room_id).await.unwrap().unwrap();
    assert!(room.is_serving, "auto-restart re-admitted the room to the scheduler");
    assert_eq!(room.speed, Speed::Mid, "re-entry reuses the room's last speed");

    let service = context.repository.get_service_object(room_id).await.unwrap();
    assert!(service.is_some(), "a fresh service object backs the auto-restart");
}
