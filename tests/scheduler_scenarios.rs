//! End-to-end scheduler scenarios: capacity-bound admission with
//! priority preemption, round-robin time-slice rotation, capacity and
//! queue-exclusivity invariants, and checkout idempotence.

mod common;

use hotel_ac_core::domain::{ServiceStatus, Speed};
use hotel_ac_core::repository::Repository;

#[tokio::test]
async fn capacity_and_preemption_selects_longest_served_mid() {
    let context = common::build_context(common::small_config()).await;

    common::check_in_and_serve(&context, "A", Speed::Mid).await;
    common::check_in_and_serve(&context, "B", Speed::Mid).await;
    common::check_in_and_serve(&context, "C", Speed::Mid).await;

    // give A a head start so it is unambiguously the longest-served MID
    context.timers.tick().await;
    context.timers.tick().await;

    common::check_in_and_serve(&context, "D", Speed::High).await;
    common::settle().await;

    let services = context.repository.list_service_objects().await.unwrap();
    assert_eq!(services.len(), 3, "capacity stays at max_concurrent");

    let serving_ids: Vec<&str> = services.iter().map(|s| s.room_id.as_str()).collect();
    assert!(serving_ids.contains(&"D"), "D must be admitted on HIGH");
    assert!(!serving_ids.contains(&"A"), "A (longest-served MID) is the victim");

    let mut speeds: Vec<Speed> = services.iter().map(|s| s.speed).collect();
    speeds.sort_by_key(|s| s.priority());
    assert_eq!(speeds, vec![Speed::Mid, Speed::Mid, Speed::High]);

    let waiting = context.repository.list_wait_entries().await.unwrap();
    assert!(waiting.iter().any(|w| w.room_id == "A"));

    let victim = context.repository.get_service_object("A").await.unwrap();
    assert!(victim.is_none(), "victim no longer holds a service object");
}

#[tokio::test]
async fn round_robin_rotates_after_full_time_slice() {
    let context = common::build_context(common::small_config()).await;

    common::check_in_and_serve(&context, "A", Speed::Mid).await;
    common::check_in_and_serve(&context, "B", Speed::Mid).await;
    common::check_in_and_serve(&context, "C", Speed::Mid).await;
    common::check_in_and_serve(&context, "D", Speed::Mid).await;
    common::settle().await;

    let waiting = context.repository.list_wait_entries().await.unwrap();
    let d_entry = waiting.iter().find(|w| w.room_id == "D").expect("D waits");
    let d_timer = d_entry.timer_id.clone().expect("D has a wait timer");
    let d_state = context.timers.get_timer_state(&d_timer).expect("wait timer exists");
    assert!(d_state.time_slice_enforced, "D's slice is enforced immediately: another MID is already serving");
    assert_eq!(d_state.remaining_seconds, 60);

    for _ in 0..61 {
        context.timers.tick().await;
    }
    common::settle().await;

    let services = context.repository.list_service_objects().await.unwrap();
    assert_eq!(services.len(), 3);
    let serving_ids: Vec<&str> = services.iter().map(|s| s.room_id.as_str()).collect();
    assert!(serving_ids.contains(&"D"), "D was promoted after its slice elapsed");

    let d_service = services.iter().find(|s| s.room_id == "D").unwrap();
    assert_eq!(d_service.status, ServiceStatus::Serving);

    let waiting = context.repository.list_wait_entries().await.unwrap();
    assert_eq!(waiting.len(), 1, "exactly one of A/B/C rotated out to make room");
}

#[tokio::test]
async fn at_most_one_service_object_per_room_across_queues() {
    let context = common::build_context(common::small_config()).await;
    common::check_in_and_serve(&context, "A", Speed::Mid).await;
    common::check_in_and_serve(&context, "B", Speed::Mid).await;
    common::check_in_and_serve(&context, "C", Speed::Mid).await;
    common::check_in_and_serve(&context, "D", Speed::Low).await;
    common::settle().await;

    let serving: std::collections::HashSet<String> = context
        .repository
        .list_service_objects()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.room_id)
        .collect();
    let waiting: std::collections::HashSet<String> = context
        .repository
        .list_wait_entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.room_id)
        .collect();

    assert!(serving.is_disjoint(&waiting), "a room is never serving and waiting at once");
    assert!(serving.len() <= context.config.scheduling.max_concurrent, "capacity stays at max_concurrent");
}

#[tokio::test]
async fn checkout_is_idempotent_and_rejects_a_second_call() {
    let context = common::build_context(common::small_config()).await;
    common::check_in_and_serve(&context, "A", Speed::Mid).await;
    common::settle().await;

    let summary = context.checkout_service.check_out("A").await.expect("first checkout succeeds");
    assert!(summary.total_due >= 0.0, "room fee alone covers a zero-deposit stay");
    assert_eq!(summary.accommodation_bill.nights, 1);

    let room = context.repository.get_room("A").await.unwrap().unwrap();
    assert_eq!(room.status, hotel_ac_core::domain::RoomStatus::Vacant);
    assert!(!room.is_serving);

    let second = context.checkout_service.check_out("A").await;
    assert!(
        matches!(second, Err(hotel_ac_core::CoreError::PreconditionFailed(_))),
        "second checkout must fail without mutating state"
    );

    let services = context.repository.list_service_objects().await.unwrap();
    assert!(services.iter().all(|s| s.room_id != "A"));
}
