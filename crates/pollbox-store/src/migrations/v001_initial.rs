//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `polls`, `poll_options`, and `votes`.
//! The `UNIQUE (poll_id, visitor_id)` constraint on `votes` is what makes
//! concurrent duplicate submissions safe; the application relies on it
//! rather than serializing requests itself.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Polls
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS polls (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    question    TEXT NOT NULL,
    description TEXT,
    category    TEXT NOT NULL DEFAULT 'other',
    status      TEXT NOT NULL DEFAULT 'active',
    is_featured INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    expires_at  TEXT,                         -- RFC-3339, NULL = never
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_polls_status   ON polls(status);
CREATE INDEX IF NOT EXISTS idx_polls_category ON polls(category);
CREATE INDEX IF NOT EXISTS idx_polls_featured ON polls(is_featured);

-- ----------------------------------------------------------------
-- Poll options
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS poll_options (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    poll_id    TEXT NOT NULL,                 -- FK -> polls(id)
    text       TEXT NOT NULL,
    votes      INTEGER NOT NULL DEFAULT 0,    -- monotonically non-decreasing
    position   INTEGER NOT NULL,              -- creation order within the poll
    created_at TEXT NOT NULL,

    FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_poll_options_poll_id ON poll_options(poll_id);

-- ----------------------------------------------------------------
-- Votes
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS votes (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    poll_id    TEXT NOT NULL,                 -- FK -> polls(id)
    option_id  TEXT NOT NULL,                 -- FK -> poll_options(id)
    visitor_id TEXT NOT NULL,                 -- opaque caller-supplied token
    created_at TEXT NOT NULL,

    FOREIGN KEY (poll_id)   REFERENCES polls(id)        ON DELETE CASCADE,
    FOREIGN KEY (option_id) REFERENCES poll_options(id) ON DELETE CASCADE,
    UNIQUE (poll_id, visitor_id)
);

CREATE INDEX IF NOT EXISTS idx_votes_poll_id    ON votes(poll_id);
CREATE INDEX IF NOT EXISTS idx_votes_visitor_id ON votes(visitor_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
