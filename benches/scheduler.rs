use criterion::{criterion_group, criterion_main, Criterion};
use hotel_ac_core::domain::Speed;
use hotel_ac_core::scheduler::victim::{
    pick_highest_priority_waiting, select_victim, ServingSnapshot, WaitingSnapshot,
};

fn serving_fixture(n: usize) -> Vec<ServingSnapshot> {
    let speeds = [Speed::High, Speed::Mid, Speed::Low];
    (0..n)
        .map(|i| ServingSnapshot {
            room_id: format!("room-{i:04}"),
            speed: speeds[i % speeds.len()],
            served_seconds: (i as i64) * 7 % 3600,
        })
        .collect()
}

fn waiting_fixture(n: usize) -> Vec<WaitingSnapshot> {
    let speeds = [Speed::High, Speed::Mid, Speed::Low];
    (0..n)
        .map(|i| WaitingSnapshot {
            room_id: format!("room-{i:04}"),
            speed: speeds[i % speeds.len()],
            priority_token: (i % 5) as u64,
            total_waited_seconds: (i as i64) * 11 % 1800,
        })
        .collect()
}

// `select_victim` runs once per admitted request at full occupancy, so its
// cost scales with `max_concurrent`, not room count — small inputs only.
fn bench_select_victim(c: &mut Criterion) {
    let serving = serving_fixture(3);
    c.bench_function("select_victim_3_serving", |b| {
        b.iter(|| std::hint::black_box(select_victim(&serving, Speed::High)));
    });

    let serving = serving_fixture(16);
    c.bench_function("select_victim_16_serving", |b| {
        b.iter(|| std::hint::black_box(select_victim(&serving, Speed::High)));
    });
}

// `pick_highest_priority_waiting` runs once per tick while any room waits,
// so it scales with hotel size.
fn bench_pick_highest_priority_waiting(c: &mut Criterion) {
    let waiting = waiting_fixture(10);
    c.bench_function("pick_highest_priority_waiting_10", |b| {
        b.iter(|| std::hint::black_box(pick_highest_priority_waiting(&waiting)));
    });

    let waiting = waiting_fixture(200);
    c.bench_function("pick_highest_priority_waiting_200", |b| {
        b.iter(|| std::hint::black_box(pick_highest_priority_waiting(&waiting)));
    });
}

criterion_group!(benches, bench_select_victim, bench_pick_highest_priority_waiting);
criterion_main!(benches);
