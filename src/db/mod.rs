pub mod schema;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::core::links::normalize_username;
use crate::core::{Category, ChannelStatus, Verdict};
use crate::scoring::ScoredChannel;

/// Marker stored in `discovered_via` for channels loaded from the seed list.
pub const SEED_MARKER: &str = "seed";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A persisted channel row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub username: String,
    pub status: ChannelStatus,
    pub raw_score: Option<f64>,
    pub trust_factor: Option<f64>,
    pub final_score: Option<u8>,
    pub verdict: Option<Verdict>,
    pub category: Option<Category>,
    pub category_secondary: Option<Category>,
    pub members: Option<u64>,
    pub breakdown: Option<String>,
    pub error_message: Option<String>,
    pub discovered_via: String,
    pub created_at: String,
    pub scanned_at: Option<String>,
}

/// Row counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub good: u64,
    pub bad: u64,
    pub private: u64,
    pub error: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.waiting + self.good + self.bad + self.private + self.error
    }
}

/// Terminal write for a WAITING row. Only constructible with a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    status: ChannelStatus,
    raw_score: Option<f64>,
    trust_factor: Option<f64>,
    final_score: Option<u8>,
    verdict: Option<Verdict>,
    category: Option<Category>,
    category_secondary: Option<Category>,
    members: Option<u64>,
    breakdown: Option<String>,
    error_message: Option<String>,
}

impl Completion {
    fn bare(status: ChannelStatus) -> Self {
        debug_assert!(status.is_terminal());
        Self {
            status,
            raw_score: None,
            trust_factor: None,
            final_score: None,
            verdict: None,
            category: None,
            category_secondary: None,
            members: None,
            breakdown: None,
            error_message: None,
        }
    }

    pub fn scored(scored: &ScoredChannel) -> Result<Self, serde_json::Error> {
        debug_assert!(scored.status.is_terminal());
        Ok(Self {
            status: scored.status,
            raw_score: Some(scored.raw_score),
            trust_factor: Some(scored.trust_factor),
            final_score: Some(scored.final_score),
            verdict: Some(scored.verdict),
            category: Some(scored.category),
            category_secondary: scored.category_secondary,
            members: Some(scored.members),
            breakdown: Some(scored.breakdown.to_json()?),
            error_message: None,
        })
    }

    pub fn private() -> Self {
        Self::bare(ChannelStatus::Private)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::bare(ChannelStatus::Error)
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }
}

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a channel. Returns false if it was already known.
    pub fn add_channel(&self, username: &str, discovered_via: &str) -> Result<bool, rusqlite::Error> {
        self.db().add_channel(username, discovered_via)
    }

    /// Oldest WAITING channel. Does not mutate anything.
    pub fn peek_next(&self) -> Result<Option<String>, rusqlite::Error> {
        self.db().peek_next()
    }

    /// Atomically move a WAITING channel to its terminal state.
    /// Returns false if another worker got there first.
    pub fn claim_and_complete(&self, username: &str, completion: &Completion) -> Result<bool, rusqlite::Error> {
        self.db().claim_and_complete(username, completion)
    }

    pub fn delete_if_waiting(&self, username: &str) -> Result<bool, rusqlite::Error> {
        self.db().delete_if_waiting(username)
    }

    /// Move a WAITING channel to the back of the queue.
    pub fn requeue(&self, username: &str) -> Result<bool, rusqlite::Error> {
        self.db().requeue(username)
    }

    pub fn get_channel(&self, username: &str) -> Result<Option<ChannelRecord>, rusqlite::Error> {
        self.db().get_channel(username)
    }

    pub fn queue_stats(&self) -> Result<QueueStats, rusqlite::Error> {
        self.db().queue_stats()
    }

    /// How many of `usernames` currently hold one of `statuses`.
    pub fn count_with_status_in(
        &self,
        usernames: &[String],
        statuses: &[ChannelStatus],
    ) -> Result<u32, rusqlite::Error> {
        self.db().count_with_status_in(usernames, statuses)
    }

    /// Bulk-queue seed channels in a single transaction. Returns how many were new.
    pub fn seed_channels(&self, usernames: &[String]) -> Result<usize, rusqlite::Error> {
        self.db().seed_channels(usernames)
    }

    /// Seed from a text file with one username per line. `#` starts a comment.
    pub fn seed_from_file(&self, path: &Path) -> crate::error::Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let usernames: Vec<String> = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(self.seed_channels(&usernames)?)
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn add_channel(&self, username: &str, discovered_via: &str) -> Result<bool, rusqlite::Error> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Ok(false);
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO channels (username, status, queue_seq, discovered_via, created_at)
             SELECT ?1, 'WAITING', COALESCE(MAX(queue_seq), 0) + 1, ?2, ?3 FROM channels",
            rusqlite::params![username, discovered_via, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    pub fn peek_next(&self) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT username FROM channels WHERE status = 'WAITING' ORDER BY queue_seq LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn claim_and_complete(&self, username: &str, c: &Completion) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE channels
             SET status = ?2, raw_score = ?3, trust_factor = ?4, final_score = ?5, verdict = ?6,
                 category = ?7, category_secondary = ?8, members = ?9, breakdown = ?10,
                 error_message = ?11, scanned_at = ?12
             WHERE username = ?1 AND status = 'WAITING'",
            rusqlite::params![
                normalize_username(username),
                c.status.as_str(),
                c.raw_score,
                c.trust_factor,
                c.final_score,
                c.verdict.map(|v| v.as_str()),
                c.category.map(|cat| cat.as_str()),
                c.category_secondary.map(|cat| cat.as_str()),
                c.members.map(|m| m as i64),
                c.breakdown,
                c.error_message,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn delete_if_waiting(&self, username: &str) -> Result<bool, rusqlite::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM channels WHERE username = ?1 AND status = 'WAITING'",
            rusqlite::params![normalize_username(username)],
        )?;
        Ok(deleted == 1)
    }

    pub fn requeue(&self, username: &str) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE channels SET queue_seq = (SELECT MAX(queue_seq) FROM channels) + 1
             WHERE username = ?1 AND status = 'WAITING'",
            rusqlite::params![normalize_username(username)],
        )?;
        Ok(changed == 1)
    }

    fn row_to_channel(row: &rusqlite::Row) -> rusqlite::Result<ChannelRecord> {
        Ok(ChannelRecord {
            username: row.get(0)?,
            status: parse_column(row, 1)?,
            raw_score: row.get(2)?,
            trust_factor: row.get(3)?,
            final_score: row.get(4)?,
            verdict: parse_optional_column(row, 5)?,
            category: parse_optional_column(row, 6)?,
            category_secondary: parse_optional_column(row, 7)?,
            members: row.get::<_, Option<i64>>(8)?.map(|m| m as u64),
            breakdown: row.get(9)?,
            error_message: row.get(10)?,
            discovered_via: row.get(11)?,
            created_at: row.get(12)?,
            scanned_at: row.get(13)?,
        })
    }

    pub fn get_channel(&self, username: &str) -> Result<Option<ChannelRecord>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT username, status, raw_score, trust_factor, final_score, verdict, category,
                        category_secondary, members, breakdown, error_message, discovered_via,
                        created_at, scanned_at
                 FROM channels WHERE username = ?1",
                rusqlite::params![normalize_username(username)],
                Self::row_to_channel,
            )
            .optional()
    }

    pub fn queue_stats(&self) -> Result<QueueStats, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT status, COUNT(*) FROM channels GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((parse_column::<ChannelStatus>(row, 0)?, row.get::<_, i64>(1)? as u64))
        })?;
        let mut stats = QueueStats::default();
        for row in rows {
            let (status, count) = row?;
            match status {
                ChannelStatus::Waiting => stats.waiting = count,
                ChannelStatus::Good => stats.good = count,
                ChannelStatus::Bad => stats.bad = count,
                ChannelStatus::Private => stats.private = count,
                ChannelStatus::Error => stats.error = count,
            }
        }
        Ok(stats)
    }

    pub fn count_with_status_in(
        &self,
        usernames: &[String],
        statuses: &[ChannelStatus],
    ) -> Result<u32, rusqlite::Error> {
        if usernames.is_empty() || statuses.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM channels WHERE username IN ({}) AND status IN ({})",
            placeholders(1, usernames.len()),
            placeholders(usernames.len() + 1, statuses.len()),
        );
        let params: Vec<String> = usernames
            .iter()
            .map(|u| normalize_username(u))
            .chain(statuses.iter().map(|s| s.as_str().to_string()))
            .collect();
        self.conn
            .query_row(&sql, rusqlite::params_from_iter(params), |row| row.get::<_, i64>(0))
            .map(|count| count as u32)
    }

    pub fn seed_channels(&self, usernames: &[String]) -> Result<usize, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO channels (username, status, queue_seq, discovered_via, created_at)
                 SELECT ?1, 'WAITING', COALESCE(MAX(queue_seq), 0) + 1, ?2, ?3 FROM channels",
            )?;
            let now = Utc::now().to_rfc3339();
            for username in usernames {
                let username = normalize_username(username);
                if username.is_empty() {
                    continue;
                }
                added += stmt.execute(rusqlite::params![username, SEED_MARKER, now])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }
}

/// `?start, ?start+1, ...` for `count` numbered parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{classification, healthy_snapshot};
    use crate::scoring::ScoringEngine;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn open_temp_db() -> (TempDir, SharedDatabase) {
        let dir = TempDir::new().unwrap();
        let db = SharedDatabase::open(&dir.path().join("chanradar.db")).unwrap();
        (dir, db)
    }

    fn scored_completion(username: &str) -> Completion {
        let now = Utc::now();
        let scored = ScoringEngine::new()
            .score(&healthy_snapshot(username, now), &classification(Category::Tech), 0, now)
            .unwrap();
        Completion::scored(&scored).unwrap()
    }

    #[test]
    fn add_channel_is_idempotent() {
        let (_dir, db) = open_temp_db();
        assert!(db.add_channel("durov", "seed").unwrap());
        assert!(!db.add_channel("durov", "other").unwrap());
        assert!(!db.add_channel("@Durov ", "other").unwrap());

        let record = db.get_channel("durov").unwrap().unwrap();
        assert_eq!(record.status, ChannelStatus::Waiting);
        assert_eq!(record.discovered_via, "seed");
        assert_eq!(db.queue_stats().unwrap().total(), 1);
    }

    #[test]
    fn usernames_are_normalised() {
        let (_dir, db) = open_temp_db();
        db.add_channel("  @TechNews ", "seed").unwrap();
        assert_eq!(db.peek_next().unwrap().as_deref(), Some("technews"));
        assert!(db.get_channel("TECHNEWS").unwrap().is_some());
    }

    #[test]
    fn peek_does_not_mutate() {
        let (_dir, db) = open_temp_db();
        db.add_channel("first_chan", "seed").unwrap();
        db.add_channel("second_chan", "seed").unwrap();

        assert_eq!(db.peek_next().unwrap().as_deref(), Some("first_chan"));
        assert_eq!(db.peek_next().unwrap().as_deref(), Some("first_chan"));
        assert_eq!(db.get_channel("first_chan").unwrap().unwrap().status, ChannelStatus::Waiting);
    }

    #[test]
    fn empty_queue_peeks_none() {
        let (_dir, db) = open_temp_db();
        assert_eq!(db.peek_next().unwrap(), None);
    }

    #[test]
    fn claim_and_complete_only_once() {
        let (_dir, db) = open_temp_db();
        db.add_channel("healthy", "seed").unwrap();
        let completion = scored_completion("healthy");

        assert!(db.claim_and_complete("healthy", &completion).unwrap());
        assert!(!db.claim_and_complete("healthy", &completion).unwrap());

        let record = db.get_channel("healthy").unwrap().unwrap();
        assert_eq!(record.status, ChannelStatus::Good);
        assert_eq!(record.final_score, Some(93));
        assert_eq!(record.verdict, Some(Verdict::Excellent));
        assert_eq!(record.category, Some(Category::Tech));
        assert_eq!(record.members, Some(10_000));
        assert!(record.scanned_at.is_some());
        assert!(record.breakdown.unwrap().contains("\"version\":1"));
        assert_eq!(db.peek_next().unwrap(), None);
    }

    #[test]
    fn claim_unknown_channel_fails() {
        let (_dir, db) = open_temp_db();
        assert!(!db.claim_and_complete("nobody", &Completion::private()).unwrap());
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("race.db");
        SharedDatabase::open(&path).unwrap().add_channel("contested", "seed").unwrap();

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                thread::spawn(move || {
                    // Each worker gets its own connection, like separate processes.
                    let db = SharedDatabase::open(&path).unwrap();
                    barrier.wait();
                    db.claim_and_complete("contested", &Completion::failed(format!("worker {i}")))
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);

        let record = SharedDatabase::open(&path).unwrap().get_channel("contested").unwrap().unwrap();
        assert_eq!(record.status, ChannelStatus::Error);
        assert!(record.error_message.unwrap().starts_with("worker "));
    }

    #[test]
    fn requeue_moves_to_back() {
        let (_dir, db) = open_temp_db();
        for name in ["alpha_chan", "bravo_chan", "charlie_chan"] {
            db.add_channel(name, "seed").unwrap();
        }
        assert!(db.requeue("alpha_chan").unwrap());
        assert_eq!(db.peek_next().unwrap().as_deref(), Some("bravo_chan"));

        db.delete_if_waiting("bravo_chan").unwrap();
        db.delete_if_waiting("charlie_chan").unwrap();
        assert_eq!(db.peek_next().unwrap().as_deref(), Some("alpha_chan"));
    }

    #[test]
    fn requeue_ignores_terminal_rows() {
        let (_dir, db) = open_temp_db();
        db.add_channel("done_chan", "seed").unwrap();
        db.claim_and_complete("done_chan", &Completion::private()).unwrap();
        assert!(!db.requeue("done_chan").unwrap());
        assert_eq!(db.get_channel("done_chan").unwrap().unwrap().status, ChannelStatus::Private);
    }

    #[test]
    fn delete_only_waiting() {
        let (_dir, db) = open_temp_db();
        db.add_channel("gone_chan", "seed").unwrap();
        db.add_channel("kept_chan", "seed").unwrap();
        db.claim_and_complete("kept_chan", &Completion::failed("boom")).unwrap();

        assert!(db.delete_if_waiting("gone_chan").unwrap());
        assert!(!db.delete_if_waiting("gone_chan").unwrap());
        assert!(!db.delete_if_waiting("kept_chan").unwrap());
        assert!(db.get_channel("gone_chan").unwrap().is_none());
        assert!(db.get_channel("kept_chan").unwrap().is_some());
    }

    #[test]
    fn error_rows_carry_message() {
        let (_dir, db) = open_temp_db();
        db.add_channel("broken_chan", "seed").unwrap();
        db.claim_and_complete("broken_chan", &Completion::failed("snapshot has no posts")).unwrap();

        let record = db.get_channel("broken_chan").unwrap().unwrap();
        assert_eq!(record.status, ChannelStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("snapshot has no posts"));
        assert_eq!(record.final_score, None);
    }

    #[test]
    fn counts_bad_neighbours() {
        let (_dir, db) = open_temp_db();
        for name in ["bad_one", "bad_two", "fine_one", "pending_one"] {
            db.add_channel(name, "seed").unwrap();
        }
        let mut bad = scored_completion("bad_one");
        bad.status = ChannelStatus::Bad;
        db.claim_and_complete("bad_one", &bad).unwrap();
        db.claim_and_complete("bad_two", &bad).unwrap();
        db.claim_and_complete("fine_one", &scored_completion("fine_one")).unwrap();

        let refs: Vec<String> = ["bad_one", "bad_two", "fine_one", "pending_one", "unknown_one"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(db.count_with_status_in(&refs, &[ChannelStatus::Bad]).unwrap(), 2);
        assert_eq!(
            db.count_with_status_in(&refs, &[ChannelStatus::Bad, ChannelStatus::Good]).unwrap(),
            3
        );
        assert_eq!(db.count_with_status_in(&[], &[ChannelStatus::Bad]).unwrap(), 0);
    }

    #[test]
    fn completions_carry_terminal_status() {
        let completions = [scored_completion("any_chan"), Completion::private(), Completion::failed("x")];
        for completion in &completions {
            assert!(completion.status().is_terminal(), "{:?}", completion.status());
        }
        assert!(!ChannelStatus::Waiting.is_terminal());
    }

    #[test]
    fn queue_stats_by_status() {
        let (_dir, db) = open_temp_db();
        for name in ["w_one_chan", "w_two_chan", "good_chan", "err_chan", "priv_chan"] {
            db.add_channel(name, "seed").unwrap();
        }
        db.claim_and_complete("good_chan", &scored_completion("good_chan")).unwrap();
        db.claim_and_complete("err_chan", &Completion::failed("x")).unwrap();
        db.claim_and_complete("priv_chan", &Completion::private()).unwrap();

        let stats = db.queue_stats().unwrap();
        assert_eq!(
            stats,
            QueueStats { waiting: 2, good: 1, bad: 0, private: 1, error: 1 }
        );
    }

    #[test]
    fn seeds_are_marked() {
        let (dir, db) = open_temp_db();
        let seeds = dir.path().join("seeds.txt");
        std::fs::write(&seeds, "# starters\n@first_seed\nsecond_seed # inline\n\nfirst_seed\n").unwrap();

        assert_eq!(db.seed_from_file(&seeds).unwrap(), 2);
        assert_eq!(db.get_channel("second_seed").unwrap().unwrap().discovered_via, SEED_MARKER);
        assert_eq!(db.peek_next().unwrap().as_deref(), Some("first_seed"));
        assert_eq!(db.seed_channels(&["first_seed".into()]).unwrap(), 0);
    }
}
