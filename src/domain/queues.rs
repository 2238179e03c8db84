//! Queues hold no ordering logic of their own — the scheduler applies the
//! priority rules in `scheduler::victim`. Grounded on
//! `original_source/backend/domain/queues.py`, whose `ServiceQueue` /
//! `WaitingQueue` ABCs exist purely to distinguish the two collections by
//! type. The repository trait carries the actual add/remove/get/list
//! operations for both.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Service,
    Wait,
}
