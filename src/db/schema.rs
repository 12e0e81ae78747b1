use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS channels (
            username           TEXT PRIMARY KEY,
            status             TEXT NOT NULL DEFAULT 'WAITING',
            queue_seq          INTEGER NOT NULL,
            raw_score          REAL,
            trust_factor       REAL,
            final_score        INTEGER,
            verdict            TEXT,
            category           TEXT,
            category_secondary TEXT,
            members            INTEGER,
            breakdown          TEXT, -- JSON
            error_message      TEXT,
            discovered_via     TEXT NOT NULL,
            created_at         TEXT NOT NULL,
            scanned_at         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_channels_queue ON channels(status, queue_seq);
        CREATE INDEX IF NOT EXISTS idx_channels_final_score ON channels(final_score DESC);
        ",
    )?;
    Ok(())
}
