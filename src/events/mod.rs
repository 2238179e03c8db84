//! Bounded async event bus, grounded on
//! `original_source/backend/application/events.py`. Delivery is
//! at-least-once with drop-oldest-on-full backpressure; handlers are
//! isolated so one failing handler never stops the consumer loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::domain::Speed;
use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    TimeSliceExpired,
    TemperatureReached,
    AutoRestartNeeded,
    DetailTimeout,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    pub speed: Option<Speed>,
    pub timer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub room_id: String,
    pub payload: EventPayload,
}

pub type Handler = Arc<dyn Fn(SchedulerEvent) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>;

/// Bounded, drop-oldest, multi-consumer-safe (single internal consumer task)
/// pub-sub bus. `register_handler` order is preserved per event type —
/// handlers run in registration order.
pub struct EventBus {
    capacity: usize,
    sender: mpsc::Sender<SchedulerEvent>,
    receiver: Mutex<Option<mpsc::Receiver<SchedulerEvent>>>,
    handlers: Mutex<HashMap<EventType, Vec<Handler>>>,
    running: Mutex<bool>,
    pending: Arc<AtomicU64>,
    dropped: AtomicU64,
    handler_errors: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Arc::new(EventBus {
            capacity,
            sender,
            receiver: Mutex::new(Some(receiver)),
            handlers: Mutex::new(HashMap::new()),
            running: Mutex::new(false),
            pending: Arc::new(AtomicU64::new(0)),
            dropped: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed) as usize
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn handler_error_count(&self) -> u64 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    pub async fn register_handler(&self, event_type: EventType, handler: Handler) {
        self.handlers
            .lock()
            .await
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Enqueue an event, dropping the bus's own oldest in-flight event on
    /// overflow. Called from synchronous tick code, so this is a
    /// non-blocking best-effort send rather than an `async fn`.
    pub fn publish(&self, event: SchedulerEvent) {
        match self.sender.try_send(event.clone()) {
            Ok(()) => {
                self.pending.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    room_id = %event.room_id,
                    event_type = ?event.event_type,
                    "event bus full, dropping oldest in-flight event"
                );
                if let Ok(mut receiver_guard) = self.receiver.try_lock() {
                    if let Some(receiver) = receiver_guard.as_mut() {
                        let _ = receiver.try_recv();
                        self.pending.fetch_sub(1, Ordering::Relaxed);
                    }
                }
                if self.sender.try_send(event).is_ok() {
                    self.pending.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("event bus closed, dropping event");
            }
        }
    }

    /// Starts the single consumer loop, idempotently. Spawns onto the
    /// current tokio runtime and returns immediately.
    pub fn start(self: &Arc<Self>) {
        let bus = self.clone();
        tokio::spawn(async move {
            {
                let mut running = bus.running.lock().await;
                if *running {
                    return;
                }
                *running = true;
            }
            let mut receiver = match bus.receiver.lock().await.take() {
                Some(r) => r,
                None => return,
            };
            while let Some(event) = receiver.recv().await {
                bus.pending.fetch_sub(1, Ordering::Relaxed);
                bus.dispatch(event).await;
            }
        });
    }

    /// Runs each handler on its own spawned task so a panic inside a
    /// handler surfaces as a `JoinError` instead of killing the consumer
    /// loop (the Rust analogue of the source's per-handler try/except).
    async fn dispatch(&self, event: SchedulerEvent) {
        let handlers = {
            let guard = self.handlers.lock().await;
            guard.get(&event.event_type).cloned().unwrap_or_default()
        };
        for handler in handlers {
            let event_type = event.event_type;
            let task = tokio::spawn(handler(event.clone()));
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.handler_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, ?event_type, "event handler returned an error");
                }
                Err(join_err) => {
                    self.handler_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(error = %join_err, ?event_type, "event handler panicked");
                }
            }
        }
    }
}
