//! Check-in argument validation and the accommodation-bill repository
//! contract exercised end-to-end through checkout.

mod common;

use chrono::Utc;
use hotel_ac_core::domain::{Mode, Speed};

#[tokio::test]
async fn check_in_rejects_a_negative_deposit() {
    let context = common::build_context(common::small_config()).await;

    let result = context
        .checkin_service
        .check_in("A", "cust", "Guest", 1, Utc::now(), -1.0)
        .await;

    assert!(
        matches!(result, Err(hotel_ac_core::CoreError::InvalidArgument(_))),
        "a negative deposit must be rejected before anything is persisted"
    );

    let room = context.repository.get_room("A").await.unwrap();
    assert!(room.is_none(), "no room should have been created by the rejected check-in");
}

#[tokio::test]
async fn checkout_exposes_the_latest_accommodation_bill() {
    let context = common::build_context(common::small_config()).await;
    context
        .checkin_service
        .check_in("A", "cust", "Guest", 1, Utc::now(), 0.0)
        .await
        .unwrap();
    context
        .ac_service
        .power_on("A", Mode::Cool, 20.0, Speed::Mid)
        .await
        .unwrap();

    let summary = context.checkout_service.check_out("A").await.unwrap();

    let (latest_bill, _ac_bills) = context.checkout_service.get_room_bills("A").await.unwrap();
    let latest_bill = latest_bill.expect("checkout just recorded a bill");
    assert_eq!(latest_bill.room_id, summary.accommodation_bill.room_id);
    assert_eq!(latest_bill.total_fee, summary.accommodation_bill.total_fee);
}
