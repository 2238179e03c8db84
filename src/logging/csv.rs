//! CSV audit trail: a per-channel `OnceCell<Mutex<BufWriter<File>>>`
//! pattern (one lazily-opened, header-stamped file per log kind).

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OnceCell};
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};

static SCHEDULER_EVENTS: OnceCell<Arc<Mutex<BufWriter<tokio::fs::File>>>> = OnceCell::const_new();
static BILLING: OnceCell<Arc<Mutex<BufWriter<tokio::fs::File>>>> = OnceCell::const_new();
static TIMERS: OnceCell<Arc<Mutex<BufWriter<tokio::fs::File>>>> = OnceCell::const_new();

async fn ensure_dir() {
    let _ = fs::create_dir_all("logs").await;
}

async fn get_file(
    cell: &OnceCell<Arc<Mutex<BufWriter<tokio::fs::File>>>>,
    path: &str,
    header: &str,
) -> Arc<Mutex<BufWriter<tokio::fs::File>>> {
    let arc = cell
        .get_or_init(|| async move {
            ensure_dir().await;
            let fresh = !fs::try_exists(path).await.unwrap_or(false);
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .expect("open log file");
            let writer = BufWriter::new(f);
            let m = Arc::new(Mutex::new(writer));
            if fresh {
                let mut g = m.lock().await;
                let _ = g.write_all(header.as_bytes()).await;
                let _ = g.flush().await;
            }
            m
        })
        .await;
    arc.clone()
}

/// scheduler_events.csv: ts,event,room_id,speed,timer_id
pub async fn log_scheduler_event(event: &str, room_id: &str, speed: Option<&str>, timer_id: Option<&str>) {
    let ts = Utc::now().to_rfc3339();
    let speed = speed.unwrap_or("");
    let timer_id = timer_id.unwrap_or("");
    let line = format!("{ts},{event},{room_id},{speed},{timer_id}\n");
    let file = get_file(
        &SCHEDULER_EVENTS,
        "logs/scheduler_events.csv",
        "ts,event,room_id,speed,timer_id\n",
    )
    .await;
    let mut f = file.lock().await;
    let _ = f.write_all(line.as_bytes()).await;
    let _ = f.flush().await;
}

/// billing.csv: ts,room_id,record_id,speed,fee_increment,cumulative_fee
pub async fn log_fee_accrual(room_id: &str, record_id: &str, speed: &str, fee_increment: f64, cumulative_fee: f64) {
    let ts = Utc::now().to_rfc3339();
    let line = format!("{ts},{room_id},{record_id},{speed},{fee_increment:.4},{cumulative_fee:.4}\n");
    let file = get_file(
        &BILLING,
        "logs/billing.csv",
        "ts,room_id,record_id,speed,fee_increment,cumulative_fee\n",
    )
    .await;
    let mut f = file.lock().await;
    let _ = f.write_all(line.as_bytes()).await;
    let _ = f.flush().await;
}

/// timers.csv: ts,event,timer_id,timer_type,room_id
pub async fn log_timer_event(event: &str, timer_id: &str, timer_type: &str, room_id: &str) {
    let ts = Utc::now().to_rfc3339();
    let line = format!("{ts},{event},{timer_id},{timer_type},{room_id}\n");
    let file = get_file(&TIMERS, "logs/timers.csv", "ts,event,timer_id,timer_type,room_id\n").await;
    let mut f = file.lock().await;
    let _ = f.write_all(line.as_bytes()).await;
    let _ = f.flush().await;
}
