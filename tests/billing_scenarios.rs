//! Billing aggregation across a stay with several speed segments, plus
//! the fee-accrual and bill-total invariants.

mod common;

use chrono::{Duration, Utc};
use hotel_ac_core::domain::Speed;

const TOLERANCE: f64 = 1e-6;

#[tokio::test]
async fn segments_at_three_speeds_aggregate_to_expected_total() {
    let context = common::build_context(common::small_config()).await;
    let billing = &context.billing;
    let room_id = "A";
    let check_in_at = Utc::now() - Duration::hours(1);

    billing.start_new_detail_record(room_id, Speed::Mid).await.unwrap();
    for _ in 0..60 {
        context.timers.tick().await;
    }
    let mid = billing.close_current_detail_record(room_id).await.unwrap().unwrap();

    billing.start_new_detail_record(room_id, Speed::High).await.unwrap();
    for _ in 0..30 {
        context.timers.tick().await;
    }
    let high = billing.close_current_detail_record(room_id).await.unwrap().unwrap();

    billing.start_new_detail_record(room_id, Speed::Low).await.unwrap();
    for _ in 0..90 {
        context.timers.tick().await;
    }
    let low = billing.close_current_detail_record(room_id).await.unwrap().unwrap();

    for record in [&mid, &high, &low] {
        assert!(
            (record.fee_value - 0.5).abs() < TOLERANCE,
            "segment {:?} fee was {}, expected 0.5",
            record.speed,
            record.fee_value
        );
    }

    let bill = billing
        .aggregate_records_to_bill(room_id, check_in_at, Utc::now())
        .await
        .unwrap();
    assert!((bill.total_fee - 1.5).abs() < TOLERANCE);
    assert_eq!(bill.details.len(), 3);

    // The bill total is exactly the sum of its own details.
    let recomputed: f64 = bill.details.iter().map(|d| d.fee_value).sum();
    assert!((recomputed - bill.total_fee).abs() < TOLERANCE);
}

#[tokio::test]
async fn bill_excludes_segments_from_a_prior_stay() {
    let context = common::build_context(common::small_config()).await;
    let billing = &context.billing;
    let room_id = "A";

    // A segment from a stay that ended before the current check-in.
    billing.start_new_detail_record(room_id, Speed::High).await.unwrap();
    for _ in 0..10 {
        context.timers.tick().await;
    }
    billing.close_current_detail_record(room_id).await.unwrap();

    let check_in_at = Utc::now();

    billing.start_new_detail_record(room_id, Speed::Low).await.unwrap();
    for _ in 0..30 {
        context.timers.tick().await;
    }
    billing.close_current_detail_record(room_id).await.unwrap();

    let bill = billing
        .aggregate_records_to_bill(room_id, check_in_at, Utc::now())
        .await
        .unwrap();

    assert_eq!(bill.details.len(), 1, "only the current-stay segment is billed");
    assert_eq!(bill.details[0].speed, Speed::Low);
}

#[tokio::test]
async fn closing_with_no_open_record_is_a_no_op() {
    let context = common::build_context(common::small_config()).await;
    let result = context.billing.close_current_detail_record("nobody-home").await.unwrap();
    assert!(result.is_none());
}

/// A closed record's fee matches `rate/60 * price_per_unit * elapsed`
/// within floating tolerance, independent of the aggregation path.
#[tokio::test]
async fn fee_value_matches_rate_formula() {
    let context = common::build_context(common::small_config()).await;
    let billing = &context.billing;
    let rate = billing.rate_for_speed(Speed::High);
    let price_per_unit = context.config.billing.price_per_unit;

    billing.start_new_detail_record("A", Speed::High).await.unwrap();
    for _ in 0..45 {
        context.timers.tick().await;
    }
    let record = billing.close_current_detail_record("A").await.unwrap().unwrap();

    let expected = (rate / 60.0) * price_per_unit * 45.0;
    assert!((record.fee_value - expected).abs() < TOLERANCE);
}
