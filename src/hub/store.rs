//! Persistent storage for the latest telemetry of every instance.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::schema::SCHEMA;
use crate::info::Info;

/// Latest known state of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub id: i64,
    pub instance_id: String,
    pub name: String,
    pub address: String,
    pub az: String,
    pub deployment: String,
    pub instance_index: i64,
    pub ip: String,
    pub label: String,
    pub cpu_used: f64,
    pub memory_used: f64,
    pub persistent_disk_used: f64,
    pub load_15: f64,
    pub uptime: i64,
    pub app_names: Vec<String>,
    pub space_name: String,
    pub org_name: String,
    /// RFC 3339 timestamp of the last submission
    pub updated_at: String,
}

impl MetricsRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let app_names_raw: String = row.get(14)?;
        let app_names = serde_json::from_str(&app_names_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            instance_id: row.get(1)?,
            name: row.get(2)?,
            address: row.get(3)?,
            az: row.get(4)?,
            deployment: row.get(5)?,
            instance_index: row.get(6)?,
            ip: row.get(7)?,
            label: row.get(8)?,
            cpu_used: row.get(9)?,
            memory_used: row.get(10)?,
            persistent_disk_used: row.get(11)?,
            load_15: row.get(12)?,
            uptime: row.get(13)?,
            app_names,
            space_name: row.get(15)?,
            org_name: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

/// SQLite-backed upsert-by-instance store.
pub struct MetricsStore {
    conn: Mutex<Connection>,
}

impl MetricsStore {
    /// Open (or create) a file-backed store.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Error opening database at {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to configure SQLite WAL mode")?;

        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory DB")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to create metrics table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics db lock poisoned"))
    }

    /// Insert or replace the row for `info.spec.id`.
    pub fn upsert(&self, info: &Info) -> Result<()> {
        let cf = info.cf.clone().unwrap_or_default();
        let app_names = serde_json::to_string(&cf.app_names)?;
        let uptime = i64::try_from(info.stats.uptime).unwrap_or(i64::MAX);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO metrics (
                instance_id, name, address, az, deployment, instance_index, ip, label,
                cpu_used, memory_used, persistent_disk_used, load_15, uptime,
                app_names, space_name, org_name, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(instance_id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                az = excluded.az,
                deployment = excluded.deployment,
                instance_index = excluded.instance_index,
                ip = excluded.ip,
                label = excluded.label,
                cpu_used = excluded.cpu_used,
                memory_used = excluded.memory_used,
                persistent_disk_used = excluded.persistent_disk_used,
                load_15 = excluded.load_15,
                uptime = excluded.uptime,
                app_names = excluded.app_names,
                space_name = excluded.space_name,
                org_name = excluded.org_name,
                updated_at = excluded.updated_at",
            params![
                info.spec.id,
                info.spec.instance_name,
                info.spec.address,
                info.spec.az,
                info.spec.deployment,
                info.spec.index,
                info.spec.ip,
                info.label,
                info.stats.cpu_used,
                info.stats.memory_used,
                info.stats.disk_used,
                info.stats.load15,
                uptime,
                app_names,
                cf.space_name,
                cf.org_name,
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to write metrics for {}", info.spec.id))?;

        debug!("Stored metrics for instance {}", info.spec.id);
        Ok(())
    }

    /// Every stored row, in insertion order.
    pub fn all(&self) -> Result<Vec<MetricsRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, instance_id, name, address, az, deployment, instance_index, ip, label,
                    cpu_used, memory_used, persistent_disk_used, load_15, uptime,
                    app_names, space_name, org_name, updated_at
             FROM metrics ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], MetricsRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read metrics")?;

        Ok(rows)
    }
}
