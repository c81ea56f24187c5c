//! SQLite schema for the hub's metrics table.

/// One row per BOSH instance; resubmission replaces the row in place.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER NOT NULL PRIMARY KEY,
    instance_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    az TEXT NOT NULL DEFAULT '',
    deployment TEXT NOT NULL DEFAULT '',
    instance_index INTEGER NOT NULL DEFAULT 0,
    ip TEXT NOT NULL DEFAULT '',
    label TEXT NOT NULL DEFAULT '',

    cpu_used REAL NOT NULL DEFAULT 0,
    memory_used REAL NOT NULL DEFAULT 0,
    persistent_disk_used REAL NOT NULL DEFAULT 0,
    load_15 REAL NOT NULL DEFAULT 0,
    uptime INTEGER NOT NULL DEFAULT 0,

    app_names TEXT NOT NULL DEFAULT '[]',
    space_name TEXT NOT NULL DEFAULT '',
    org_name TEXT NOT NULL DEFAULT '',

    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metrics_deployment
    ON metrics(deployment);
"#;
