//! SQL schema for the narrative log SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Messages are append-only. The only UPDATE ever issued sets
-- date_invalidated, once; the triggers below reject anything else.
-- Array fields hold JSON arrays of strings.
CREATE TABLE IF NOT EXISTS message (
    id               TEXT PRIMARY KEY,
    site_id          TEXT NOT NULL CHECK (length(site_id) <= 16),
    message_text     TEXT NOT NULL,
    level            INTEGER NOT NULL,
    tags             TEXT NOT NULL DEFAULT '[]',
    urls             TEXT NOT NULL DEFAULT '[]',
    time_lost        REAL NOT NULL DEFAULT 0,     -- seconds
    date_begin       TEXT,                        -- naive UTC, fixed width
    date_end         TEXT,
    user_id          TEXT NOT NULL,
    user_agent       TEXT NOT NULL,
    is_human         INTEGER NOT NULL,
    date_added       TEXT NOT NULL,               -- server-assigned
    date_invalidated TEXT,
    parent_id        TEXT REFERENCES message(id),
    systems          TEXT NOT NULL DEFAULT '[]',
    subsystems       TEXT NOT NULL DEFAULT '[]',
    cscs             TEXT NOT NULL DEFAULT '[]',
    category         TEXT,
    time_lost_type   TEXT,
    components                  TEXT NOT NULL DEFAULT '[]',
    primary_software_components TEXT NOT NULL DEFAULT '[]',
    primary_hardware_components TEXT NOT NULL DEFAULT '[]',
    components_json             TEXT      -- JSON object, opaque to the store
);

-- A message has at most one direct child.
CREATE UNIQUE INDEX IF NOT EXISTS message_parent_idx ON message(parent_id);

CREATE INDEX IF NOT EXISTS message_date_added_idx       ON message(date_added);
CREATE INDEX IF NOT EXISTS message_date_begin_idx       ON message(date_begin);
CREATE INDEX IF NOT EXISTS message_date_end_idx         ON message(date_end);
CREATE INDEX IF NOT EXISTS message_date_invalidated_idx ON message(date_invalidated);
CREATE INDEX IF NOT EXISTS message_level_idx            ON message(level);
CREATE INDEX IF NOT EXISTS message_user_id_idx          ON message(user_id);

CREATE TRIGGER IF NOT EXISTS message_no_delete
BEFORE DELETE ON message
BEGIN
    SELECT RAISE(ABORT, 'messages are never deleted');
END;

CREATE TRIGGER IF NOT EXISTS message_fields_immutable
BEFORE UPDATE OF
    id, site_id, message_text, level, tags, urls, time_lost,
    date_begin, date_end, user_id, user_agent, is_human, date_added,
    parent_id, systems, subsystems, cscs, category, time_lost_type,
    components, primary_software_components, primary_hardware_components,
    components_json
ON message
BEGIN
    SELECT RAISE(ABORT, 'message fields are immutable');
END;

CREATE TRIGGER IF NOT EXISTS message_invalidated_once
BEFORE UPDATE OF date_invalidated ON message
WHEN OLD.date_invalidated IS NOT NULL OR NEW.date_invalidated IS NULL
BEGIN
    SELECT RAISE(ABORT, 'date_invalidated is set at most once');
END;

PRAGMA user_version = 1;
";

/// Columns selected for every message read, in [`crate::encode::RawMessage`]
/// field order.
pub const MESSAGE_COLUMNS: &str = "
    m.id, m.site_id, m.message_text, m.level, m.tags, m.urls, m.time_lost,
    m.date_begin, m.date_end, m.user_id, m.user_agent, m.is_human,
    m.date_added, m.date_invalidated, m.parent_id,
    m.systems, m.subsystems, m.cscs, m.category, m.time_lost_type,
    m.components, m.primary_software_components, m.primary_hardware_components,
    m.components_json";
