//! Logical-clock timer registry.

pub mod handle;
pub mod registry;

pub use handle::{TimerHandle, TimerType};
pub use registry::{FeeCallback, TickErrorSnapshot, TimeManager, TimerSnapshot, TimerState, TimerStats};
