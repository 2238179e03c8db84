//! sqlx/SQLite-backed `Repository`. Short, per-call transactions — no
//! connection is held across `.await` boundaries beyond a single query,
//! following the session-store pattern in the reference proxy crate this
//! workspace was seeded from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::domain::{
    ACBill, ACDetailRecord, AccommodationBill, AccommodationOrder, MealOrder, Mode, Room,
    RoomStatus, ServiceObject, ServiceStatus, Speed,
};
use crate::errors::{CoreError, CoreResult};

use super::{Repository, WaitEntry};

pub struct SqliteRepository {
    pool: SqlitePool,
}

fn db_err(context: &str, err: sqlx::Error) -> CoreError {
    CoreError::transient(format!("{context}: {err}"))
}

fn speed_to_str(s: Speed) -> &'static str {
    match s {
        Speed::High => "HIGH",
        Speed::Mid => "MID",
        Speed::Low => "LOW",
    }
}

fn str_to_speed(s: &str) -> CoreResult<Speed> {
    match s {
        "HIGH" => Ok(Speed::High),
        "MID" => Ok(Speed::Mid),
        "LOW" => Ok(Speed::Low),
        other => Err(CoreError::internal(format!("unknown speed column value {other}"))),
    }
}

fn mode_to_str(m: Mode) -> &'static str {
    match m {
        Mode::Cool => "COOL",
        Mode::Heat => "HEAT",
    }
}

fn str_to_mode(s: &str) -> CoreResult<Mode> {
    match s {
        "COOL" => Ok(Mode::Cool),
        "HEAT" => Ok(Mode::Heat),
        other => Err(CoreError::internal(format!("unknown mode column value {other}"))),
    }
}

fn status_to_str(s: RoomStatus) -> &'static str {
    match s {
        RoomStatus::Vacant => "VACANT",
        RoomStatus::Occupied => "OCCUPIED",
    }
}

fn str_to_status(s: &str) -> CoreResult<RoomStatus> {
    match s {
        "VACANT" => Ok(RoomStatus::Vacant),
        "OCCUPIED" => Ok(RoomStatus::Occupied),
        other => Err(CoreError::internal(format!("unknown room status column value {other}"))),
    }
}

fn service_status_to_str(s: ServiceStatus) -> &'static str {
    match s {
        ServiceStatus::Serving => "SERVING",
        ServiceStatus::Waiting => "WAITING",
        ServiceStatus::Stopped => "STOPPED",
    }
}

fn str_to_service_status(s: &str) -> CoreResult<ServiceStatus> {
    match s {
        "SERVING" => Ok(ServiceStatus::Serving),
        "WAITING" => Ok(ServiceStatus::Waiting),
        "STOPPED" => Ok(ServiceStatus::Stopped),
        other => Err(CoreError::internal(format!("unknown service status column value {other}"))),
    }
}

impl SqliteRepository {
    pub async fn connect(database_url: &str) -> CoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| db_err("connecting to sqlite", e))?;
        let repo = SqliteRepository { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    async fn migrate(&self) -> CoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                room_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                current_temp REAL NOT NULL,
                target_temp REAL NOT NULL,
                initial_temp REAL NOT NULL,
                mode TEXT NOT NULL,
                speed TEXT NOT NULL,
                is_serving INTEGER NOT NULL,
                powered_on INTEGER NOT NULL,
                manual_powered_off INTEGER NOT NULL,
                last_temp_change_ts TEXT,
                pending_target_temp REAL,
                rate_per_night REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS service_objects (
                room_id TEXT PRIMARY KEY,
                speed TEXT NOT NULL,
                started_at TEXT,
                priority_token INTEGER NOT NULL,
                time_slice_enforced INTEGER NOT NULL,
                status TEXT NOT NULL,
                timer_id TEXT
            );

            CREATE TABLE IF NOT EXISTS wait_entries (
                room_id TEXT PRIMARY KEY,
                speed TEXT NOT NULL,
                priority_token INTEGER NOT NULL DEFAULT 0,
                timer_id TEXT
            );

            CREATE TABLE IF NOT EXISTS detail_records (
                record_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ac_bills (
                bill_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS accommodation_orders (
                order_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                created_seq INTEGER NOT NULL,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS accommodation_bills (
                bill_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meal_orders (
                order_id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                ordered_at TEXT NOT NULL,
                body TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("running schema migration", e))?;
        Ok(())
    }

    fn row_to_room(row: &sqlx::sqlite::SqliteRow) -> CoreResult<Room> {
        Ok(Room {
            room_id: row.try_get("room_id").map_err(|e| db_err("room_id", e))?,
            status: str_to_status(&row.try_get::<String, _>("status").map_err(|e| db_err("status", e))?)?,
            current_temp: row.try_get("current_temp").map_err(|e| db_err("current_temp", e))?,
            target_temp: row.try_get("target_temp").map_err(|e| db_err("target_temp", e))?,
            initial_temp: row.try_get("initial_temp").map_err(|e| db_err("initial_temp", e))?,
            mode: str_to_mode(&row.try_get::<String, _>("mode").map_err(|e| db_err("mode", e))?)?,
            speed: str_to_speed(&row.try_get::<String, _>("speed").map_err(|e| db_err("speed", e))?)?,
            is_serving: row.try_get::<i64, _>("is_serving").map_err(|e| db_err("is_serving", e))? != 0,
            powered_on: row.try_get::<i64, _>("powered_on").map_err(|e| db_err("powered_on", e))? != 0,
            manual_powered_off: row
                .try_get::<i64, _>("manual_powered_off")
                .map_err(|e| db_err("manual_powered_off", e))?
                != 0,
            last_temp_change_ts: row
                .try_get::<Option<DateTime<Utc>>, _>("last_temp_change_ts")
                .map_err(|e| db_err("last_temp_change_ts", e))?,
            pending_target_temp: row
                .try_get("pending_target_temp")
                .map_err(|e| db_err("pending_target_temp", e))?,
            rate_per_night: row.try_get("rate_per_night").map_err(|e| db_err("rate_per_night", e))?,
        })
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_room(&self, room_id: &str) -> CoreResult<Option<Room>> {
        let row = sqlx::query("SELECT * FROM rooms WHERE room_id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("fetching room", e))?;
        row.as_ref().map(Self::row_to_room).transpose()
    }

    async fn list_rooms(&self) -> CoreResult<Vec<Room>> {
        let rows = sqlx::query("SELECT * FROM rooms")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("listing rooms", e))?;
        rows.iter().map(Self::row_to_room).collect()
    }

    async fn save_room(&self, room: Room) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rooms (
                room_id, status, current_temp, target_temp, initial_temp, mode, speed,
                is_serving, powered_on, manual_powered_off, last_temp_change_ts,
                pending_target_temp, rate_per_night
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(room_id) DO UPDATE SET
                status = excluded.status,
                current_temp = excluded.current_temp,
                target_temp = excluded.target_temp,
                initial_temp = excluded.initial_temp,
                mode = excluded.mode,
                speed = excluded.speed,
                is_serving = excluded.is_serving,
                powered_on = excluded.powered_on,
                manual_powered_off = excluded.manual_powered_off,
                last_temp_change_ts = excluded.last_temp_change_ts,
                pending_target_temp = excluded.pending_target_temp,
                rate_per_night = excluded.rate_per_night
            "#,
        )
        .bind(&room.room_id)
        .bind(status_to_str(room.status))
        .bind(room.current_temp)
        .bind(room.target_temp)
        .bind(room.initial_temp)
        .bind(mode_to_str(room.mode))
        .bind(speed_to_str(room.speed))
        .bind(room.is_serving as i64)
        .bind(room.powered_on as i64)
        .bind(room.manual_powered_off as i64)
        .bind(room.last_temp_change_ts)
        .bind(room.pending_target_temp)
        .bind(room.rate_per_night)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("saving room", e))?;
        Ok(())
    }

    async fn add_service_object(&self, service: ServiceObject) -> CoreResult<()> {
        self.update_service_object(service).await
    }

    async fn update_service_object(&self, service: ServiceObject) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO service_objects
                (room_id, speed, started_at, priority_token, time_slice_enforced, status, timer_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(room_id) DO UPDATE SET
                speed = excluded.speed,
                started_at = excluded.started_at,
                priority_token = excluded.priority_token,
                time_slice_enforced = excluded.time_slice_enforced,
                status = excluded.status,
                timer_id = excluded.timer_id
            "#,
        )
        .bind(&service.room_id)
        .bind(speed_to_str(service.speed))
        .bind(service.started_at)
        .bind(service.priority_token as i64)
        .bind(service.time_slice_enforced as i64)
        .bind(service_status_to_str(service.status))
        .bind(&service.timer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("upserting service object", e))?;
        Ok(())
    }

    async fn remove_service_object(&self, room_id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM service_objects WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("removing service object", e))?;
        Ok(())
    }

    async fn get_service_object(&self, room_id: &str) -> CoreResult<Option<ServiceObject>> {
        let row = sqlx::query("SELECT * FROM service_objects WHERE room_id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("fetching service object", e))?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(ServiceObject {
            room_id: row.try_get("room_id").map_err(|e| db_err("room_id", e))?,
            speed: str_to_speed(&row.try_get::<String, _>("speed").map_err(|e| db_err("speed", e))?)?,
            started_at: row.try_get("started_at").map_err(|e| db_err("started_at", e))?,
            priority_token: row.try_get::<i64, _>("priority_token").map_err(|e| db_err("priority_token", e))? as u64,
            time_slice_enforced: row
                .try_get::<i64, _>("time_slice_enforced")
                .map_err(|e| db_err("time_slice_enforced", e))?
                != 0,
            status: str_to_service_status(&row.try_get::<String, _>("status").map_err(|e| db_err("status", e))?)?,
            timer_id: row.try_get("timer_id").map_err(|e| db_err("timer_id", e))?,
        }))
    }

    async fn list_service_objects(&self) -> CoreResult<Vec<ServiceObject>> {
        let rows = sqlx::query("SELECT room_id FROM service_objects")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("listing service objects", e))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let room_id: String = row.try_get("room_id").map_err(|e| db_err("room_id", e))?;
            if let Some(service) = self.get_service_object(&room_id).await? {
                out.push(service);
            }
        }
        Ok(out)
    }

    async fn add_wait_entry(&self, entry: WaitEntry) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wait_entries (room_id, speed, priority_token, timer_id) VALUES (?, ?, ?, ?)
            ON CONFLICT(room_id) DO UPDATE SET
                speed = excluded.speed,
                priority_token = excluded.priority_token,
                timer_id = excluded.timer_id
            "#,
        )
        .bind(&entry.room_id)
        .bind(speed_to_str(entry.speed))
        .bind(entry.priority_token as i64)
        .bind(&entry.timer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("upserting wait entry", e))?;
        Ok(())
    }

    async fn remove_wait_entry(&self, room_id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM wait_entries WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("removing wait entry", e))?;
        Ok(())
    }

    async fn list_wait_entries(&self) -> CoreResult<Vec<WaitEntry>> {
        let rows = sqlx::query("SELECT room_id, speed, priority_token, timer_id FROM wait_entries")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("listing wait entries", e))?;
        rows.iter()
            .map(|row| {
                Ok(WaitEntry {
                    room_id: row.try_get("room_id").map_err(|e| db_err("room_id", e))?,
                    speed: str_to_speed(&row.try_get::<String, _>("speed").map_err(|e| db_err("speed", e))?)?,
                    priority_token: row.try_get::<i64, _>("priority_token").map_err(|e| db_err("priority_token", e))? as u64,
                    timer_id: row.try_get("timer_id").map_err(|e| db_err("timer_id", e))?,
                })
            })
            .collect()
    }

    async fn add_detail_record(&self, record: ACDetailRecord) -> CoreResult<()> {
        let body = serde_json::to_string(&record).map_err(|e| CoreError::internal(e.to_string()))?;
        sqlx::query("INSERT INTO detail_records (record_id, room_id, started_at, body) VALUES (?, ?, ?, ?)")
            .bind(&record.record_id)
            .bind(&record.room_id)
            .bind(record.started_at)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("inserting detail record", e))?;
        Ok(())
    }

    async fn update_detail_record(&self, record: ACDetailRecord) -> CoreResult<()> {
        let body = serde_json::to_string(&record).map_err(|e| CoreError::internal(e.to_string()))?;
        sqlx::query("UPDATE detail_records SET body = ? WHERE record_id = ?")
            .bind(body)
            .bind(&record.record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("updating detail record", e))?;
        Ok(())
    }

    async fn get_active_detail_record(&self, room_id: &str) -> CoreResult<Option<ACDetailRecord>> {
        let rows = sqlx::query(
            "SELECT body FROM detail_records WHERE room_id = ? ORDER BY started_at DESC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetching detail records", e))?;
        for row in rows {
            let body: String = row.try_get("body").map_err(|e| db_err("body", e))?;
            let record: ACDetailRecord =
                serde_json::from_str(&body).map_err(|e| CoreError::internal(e.to_string()))?;
            if record.is_open() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn list_completed_detail_records(
        &self,
        room_id: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<ACDetailRecord>> {
        let rows = sqlx::query(
            "SELECT body FROM detail_records WHERE room_id = ? AND started_at >= ? ORDER BY started_at ASC",
        )
        .bind(room_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("listing detail records", e))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row.try_get("body").map_err(|e| db_err("body", e))?;
            let record: ACDetailRecord =
                serde_json::from_str(&body).map_err(|e| CoreError::internal(e.to_string()))?;
            if record.ended_at.is_some() {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn add_ac_bill(&self, bill: ACBill) -> CoreResult<()> {
        let body = serde_json::to_string(&bill).map_err(|e| CoreError::internal(e.to_string()))?;
        sqlx::query("INSERT INTO ac_bills (bill_id, room_id, body) VALUES (?, ?, ?)")
            .bind(&bill.bill_id)
            .bind(&bill.room_id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("inserting ac bill", e))?;
        Ok(())
    }

    async fn list_ac_bills(&self, room_id: &str) -> CoreResult<Vec<ACBill>> {
        let rows = sqlx::query("SELECT body FROM ac_bills WHERE room_id = ?")
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("listing ac bills", e))?;
        rows.iter()
            .map(|row| {
                let body: String = row.try_get("body").map_err(|e| db_err("body", e))?;
                serde_json::from_str(&body).map_err(|e| CoreError::internal(e.to_string()))
            })
            .collect()
    }

    async fn add_accommodation_order(&self, order: AccommodationOrder) -> CoreResult<()> {
        let body = serde_json::to_string(&order).map_err(|e| CoreError::internal(e.to_string()))?;
        let seq = order.check_in_at.timestamp_micros();
        sqlx::query(
            "INSERT INTO accommodation_orders (order_id, room_id, created_seq, body) VALUES (?, ?, ?, ?)",
        )
        .bind(&order.order_id)
        .bind(&order.room_id)
        .bind(seq)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("inserting accommodation order", e))?;
        Ok(())
    }

    async fn get_latest_accommodation_order(
        &self,
        room_id: &str,
    ) -> CoreResult<Option<AccommodationOrder>> {
        let row = sqlx::query(
            "SELECT body FROM accommodation_orders WHERE room_id = ? ORDER BY created_seq DESC LIMIT 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("fetching accommodation order", e))?;
        row.map(|row| {
            let body: String = row.try_get("body").map_err(|e| db_err("body", e))?;
            serde_json::from_str(&body).map_err(|e| CoreError::internal(e.to_string()))
        })
        .transpose()
    }

    async fn add_accommodation_bill(&self, bill: AccommodationBill) -> CoreResult<()> {
        let body = serde_json::to_string(&bill).map_err(|e| CoreError::internal(e.to_string()))?;
        sqlx::query("INSERT INTO accommodation_bills (bill_id, room_id, body) VALUES (?, ?, ?)")
            .bind(&bill.bill_id)
            .bind(&bill.room_id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("inserting accommodation bill", e))?;
        Ok(())
    }

    async fn list_accommodation_bills(&self, room_id: &str) -> CoreResult<Vec<AccommodationBill>> {
        let rows = sqlx::query("SELECT body FROM accommodation_bills WHERE room_id = ?")
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("listing accommodation bills", e))?;
        rows.iter()
            .map(|row| {
                let body: String = row.try_get("body").map_err(|e| db_err("body", e))?;
                serde_json::from_str(&body).map_err(|e| CoreError::internal(e.to_string()))
            })
            .collect()
    }

    async fn add_meal_order(&self, order: MealOrder) -> CoreResult<()> {
        let body = serde_json::to_string(&order).map_err(|e| CoreError::internal(e.to_string()))?;
        sqlx::query("INSERT INTO meal_orders (order_id, room_id, ordered_at, body) VALUES (?, ?, ?, ?)")
            .bind(&order.order_id)
            .bind(&order.room_id)
            .bind(order.ordered_at)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("inserting meal order", e))?;
        Ok(())
    }

    async fn list_meal_orders(&self, room_id: &str, since: DateTime<Utc>) -> CoreResult<Vec<MealOrder>> {
        let rows = sqlx::query(
            "SELECT body FROM meal_orders WHERE room_id = ? AND ordered_at >= ? ORDER BY ordered_at ASC",
        )
        .bind(room_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("listing meal orders", e))?;
        rows.iter()
            .map(|row| {
                let body: String = row.try_get("body").map_err(|e| db_err("body", e))?;
                serde_json::from_str(&body).map_err(|e| CoreError::internal(e.to_string()))
            })
            .collect()
    }
}
