//! Pure selection rules, grounded on
//! `original_source/backend/application/scheduler.py`'s
//! `select_victim_by_rules` / `_pop_highest_priority` / `_longest_served`.
//!
//! Kept free of the timer registry and repository so they can be unit
//! tested and benchmarked in isolation. All tie-breaks use an explicit
//! fold rather than `Iterator::max_by_key`, which does not guarantee which
//! of several equal-key items it returns — this crate always resolves
//! ties by ascending `room_id`.

use std::cmp::Ordering;

use crate::domain::Speed;

#[derive(Debug, Clone, PartialEq)]
pub struct ServingSnapshot {
    pub room_id: String,
    pub speed: Speed,
    pub served_seconds: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitingSnapshot {
    pub room_id: String,
    pub speed: Speed,
    pub priority_token: u64,
    pub total_waited_seconds: i64,
}

pub fn compare_speed(a: Speed, b: Speed) -> Ordering {
    a.priority().cmp(&b.priority())
}

/// Picks the single serving room to evict for an incoming request at
/// `new_speed`: only rooms running a strictly slower speed are eligible.
/// Among several eligible speeds, the *slowest* group is preferred; within
/// a group, the longest-served room.
pub fn select_victim(serving: &[ServingSnapshot], new_speed: Speed) -> Option<&ServingSnapshot> {
    let slower: Vec<&ServingSnapshot> = serving
        .iter()
        .filter(|s| compare_speed(s.speed, new_speed) == Ordering::Less)
        .collect();

    if slower.is_empty() {
        return None;
    }
    if slower.len() == 1 {
        return Some(slower[0]);
    }

    let min_priority = slower.iter().map(|s| s.speed.priority()).min().unwrap();
    let candidates: Vec<&ServingSnapshot> = slower
        .into_iter()
        .filter(|s| s.speed.priority() == min_priority)
        .collect();

    longest_served_of(&candidates)
}

/// The serving room with the largest `served_seconds` (ties broken by
/// ascending `room_id`); used when a waiting room's time slice expires.
pub fn longest_served(serving: &[ServingSnapshot]) -> Option<&ServingSnapshot> {
    let refs: Vec<&ServingSnapshot> = serving.iter().collect();
    longest_served_of(&refs)
}

fn longest_served_of<'a>(items: &[&'a ServingSnapshot]) -> Option<&'a ServingSnapshot> {
    items.iter().copied().fold(None, |best, cur| match best {
        None => Some(cur),
        Some(b) if cur.served_seconds > b.served_seconds => Some(cur),
        Some(b) if cur.served_seconds == b.served_seconds && cur.room_id < b.room_id => Some(cur),
        Some(b) => Some(b),
    })
}

/// The waiting room that should be admitted next when capacity frees up:
/// highest speed priority first, then highest boosted `priority_token`,
/// then longest total wait.
pub fn pick_highest_priority_waiting(waiting: &[WaitingSnapshot]) -> Option<&WaitingSnapshot> {
    fn key(w: &WaitingSnapshot) -> (u8, u64, i64) {
        (w.speed.priority(), w.priority_token, w.total_waited_seconds)
    }

    waiting.iter().fold(None, |best, cur| match best {
        None => Some(cur),
        Some(b) if key(cur) > key(b) => Some(cur),
        Some(b) if key(cur) == key(b) && cur.room_id < b.room_id => Some(cur),
        Some(b) => Some(b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serving(room_id: &str, speed: Speed, served_seconds: i64) -> ServingSnapshot {
        ServingSnapshot {
            room_id: room_id.to_string(),
            speed,
            served_seconds,
        }
    }

    fn waiting(room_id: &str, speed: Speed, priority_token: u64, total_waited_seconds: i64) -> WaitingSnapshot {
        WaitingSnapshot {
            room_id: room_id.to_string(),
            speed,
            priority_token,
            total_waited_seconds,
        }
    }

    #[test]
    fn no_slower_service_means_no_victim() {
        let services = vec![serving("101", Speed::High, 10)];
        assert!(select_victim(&services, Speed::High).is_none());
    }

    #[test]
    fn single_slower_service_is_victim() {
        let services = vec![serving("101", Speed::Low, 5), serving("102", Speed::High, 5)];
        let victim = select_victim(&services, Speed::Mid).unwrap();
        assert_eq!(victim.room_id, "101");
    }

    #[test]
    fn prefers_slowest_group_then_longest_served() {
        let services = vec![
            serving("101", Speed::Low, 20),
            serving("102", Speed::Mid, 999),
            serving("103", Speed::Low, 5),
        ];
        let victim = select_victim(&services, Speed::High).unwrap();
        assert_eq!(victim.room_id, "101");
    }

    #[test]
    fn tie_break_is_ascending_room_id() {
        let services = vec![serving("102", Speed::Low, 10), serving("101", Speed::Low, 10)];
        let victim = select_victim(&services, Speed::High).unwrap();
        assert_eq!(victim.room_id, "101");
    }

    #[test]
    fn highest_priority_waiting_prefers_speed_then_token_then_wait() {
        let waiters = vec![
            waiting("101", Speed::Mid, 0, 100),
            waiting("102", Speed::High, 0, 1),
            waiting("103", Speed::High, 1, 1),
        ];
        let chosen = pick_highest_priority_waiting(&waiters).unwrap();
        assert_eq!(chosen.room_id, "103");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_speed() -> impl Strategy<Value = Speed> {
        prop_oneof![Just(Speed::High), Just(Speed::Mid), Just(Speed::Low)]
    }

    fn arb_serving() -> impl Strategy<Value = ServingSnapshot> {
        ("[a-z]{1,4}[0-9]{1,3}", arb_speed(), 0i64..100_000).prop_map(|(room_id, speed, served_seconds)| {
            ServingSnapshot {
                room_id,
                speed,
                served_seconds,
            }
        })
    }

    proptest! {
        // A victim, if any, is always strictly slower than the incoming
        // request and is always one of the snapshots handed in.
        #[test]
        fn victim_is_always_slower_and_present_in_input(
            serving in prop::collection::vec(arb_serving(), 0..12),
            new_speed in arb_speed(),
        ) {
            if let Some(victim) = select_victim(&serving, new_speed) {
                prop_assert!(victim.speed.priority() < new_speed.priority());
                prop_assert!(serving.iter().any(|s| s.room_id == victim.room_id));
            }
        }

        // select_victim never returns a victim when every serving room is
        // already at or above the incoming speed's priority.
        #[test]
        fn no_victim_when_nothing_is_slower(
            served_seconds in prop::collection::vec(0i64..100_000, 0..8),
        ) {
            let serving: Vec<ServingSnapshot> = served_seconds
                .into_iter()
                .enumerate()
                .map(|(i, secs)| ServingSnapshot {
                    room_id: format!("r{i}"),
                    speed: Speed::High,
                    served_seconds: secs,
                })
                .collect();
            prop_assert!(select_victim(&serving, Speed::High).is_none());
            prop_assert!(select_victim(&serving, Speed::Mid).is_none());
        }
    }
}
