//! The crawl loop: peek, scan, classify, score, claim, discover.

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::collab::{ChannelScanner, ClassifyRequest, ContentClassifier};
use crate::config::CrawlerConfig;
use crate::core::ChannelStatus;
use crate::core::links::extract_references;
use crate::db::{Completion, SharedDatabase};
use crate::error::{Result, ScanError};
use crate::scoring::ScoringEngine;

/// Longest we honour a scanner's Retry-After.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// What happened to one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Written to a terminal status; `discovered` new channels were queued.
    Completed { status: ChannelStatus, discovered: usize },
    /// Left WAITING at the back of the queue.
    Requeued { retry_after: Option<Duration> },
    Deleted,
    /// Another worker finished the channel first.
    Conflict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub processed: u64,
    pub completed: u64,
    pub requeued: u64,
    pub deleted: u64,
    pub conflicts: u64,
    /// ERROR rows written plus storage failures.
    pub errors: u64,
    pub discovered: u64,
}

impl CrawlStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed { status, discovered } => {
                self.completed += 1;
                self.discovered += *discovered as u64;
                if *status == ChannelStatus::Error {
                    self.errors += 1;
                }
            }
            Outcome::Requeued { .. } => self.requeued += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Conflict => self.conflicts += 1,
        }
    }
}

pub struct Crawler<S, C> {
    db: SharedDatabase,
    scanner: S,
    classifier: C,
    engine: ScoringEngine,
    config: CrawlerConfig,
}

impl<S: ChannelScanner, C: ContentClassifier> Crawler<S, C> {
    pub fn new(db: SharedDatabase, scanner: S, classifier: C, config: CrawlerConfig) -> Self {
        Self {
            db,
            scanner,
            classifier,
            engine: ScoringEngine::new(),
            config,
        }
    }

    /// Crawl until `stop` flips to true. An empty queue is polled every `idle_poll_secs`.
    pub async fn run(&self, stop: watch::Receiver<bool>) -> CrawlStats {
        self.crawl(stop, false).await
    }

    /// Crawl until the queue is empty or `stop` flips to true.
    pub async fn drain(&self, stop: watch::Receiver<bool>) -> CrawlStats {
        self.crawl(stop, true).await
    }

    async fn crawl(&self, mut stop: watch::Receiver<bool>, exit_when_idle: bool) -> CrawlStats {
        let mut stats = CrawlStats::default();
        info!("Crawler started");

        while !*stop.borrow() {
            let next = match self.db.peek_next() {
                Ok(next) => next,
                Err(e) => {
                    error!("Failed to read queue: {e}");
                    stats.errors += 1;
                    if self.pause(self.config.idle_poll(), &mut stop).await {
                        break;
                    }
                    continue;
                }
            };

            let Some(username) = next else {
                if exit_when_idle {
                    debug!("Queue empty, stopping");
                    break;
                }
                debug!("Queue empty, polling again in {}s", self.config.idle_poll_secs);
                if self.pause(self.config.idle_poll(), &mut stop).await {
                    break;
                }
                continue;
            };

            stats.processed += 1;
            let mut delay = jitter(self.config.delay_range_ms());
            match self.process(&username).await {
                Ok(outcome) => {
                    if let Outcome::Requeued { retry_after: Some(wait) } = &outcome {
                        delay = delay.max((*wait).min(MAX_RETRY_AFTER));
                    }
                    stats.record(&outcome);
                }
                Err(e) => {
                    error!("Storage failure on @{username}: {e}");
                    stats.errors += 1;
                }
            }

            if stats.processed % 100 == 0 {
                info!(
                    "Crawler processed {} channels ({} completed, {} discovered)",
                    stats.processed, stats.completed, stats.discovered
                );
            }

            if self.pause(delay, &mut stop).await {
                break;
            }
            if self.config.batch_size > 0 && stats.processed % self.config.batch_size == 0 {
                debug!("Batch of {} done, pausing {}s", self.config.batch_size, self.config.batch_pause_secs);
                if self.pause(self.config.batch_pause(), &mut stop).await {
                    break;
                }
            }
        }

        info!("Crawler stopped: {stats:?}");
        stats
    }

    /// Handle one WAITING channel end to end.
    pub async fn process(&self, username: &str) -> Result<Outcome> {
        let snapshot = match self.scanner.scan(username).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.handle_scan_error(username, e),
        };

        let request = ClassifyRequest::from_snapshot(&snapshot);
        let classification = match self.classifier.classify(&request).await {
            Ok(Some(classification)) => classification,
            Ok(None) => {
                debug!("No classification for @{username}, requeueing");
                return self.requeue(username, None);
            }
            Err(e) => {
                warn!("Classifier failed for @{username}: {e}");
                return self.requeue(username, None);
            }
        };

        let references = extract_references(&snapshot);
        let bad_neighbours = self.db.count_with_status_in(&references, &[ChannelStatus::Bad])?;

        let completion = match self.engine.score(&snapshot, &classification, bad_neighbours, Utc::now()) {
            Ok(scored) => {
                info!(
                    "Scored @{username}: {} {} (raw {:.1} x trust {:.2})",
                    scored.verdict.as_str(),
                    scored.final_score,
                    scored.raw_score,
                    scored.trust_factor
                );
                Completion::scored(&scored)?
            }
            Err(e) => {
                warn!("Cannot score @{username}: {e}");
                Completion::failed(e.to_string())
            }
        };

        if !self.db.claim_and_complete(username, &completion)? {
            debug!("@{username} already completed elsewhere");
            return Ok(Outcome::Conflict);
        }

        let mut discovered = 0;
        if completion.status() != ChannelStatus::Error {
            for child in &references {
                if self.db.add_channel(child, username)? {
                    discovered += 1;
                }
            }
            if discovered > 0 {
                debug!("@{username} led to {discovered} new channels");
            }
        }

        Ok(Outcome::Completed { status: completion.status(), discovered })
    }

    fn handle_scan_error(&self, username: &str, e: ScanError) -> Result<Outcome> {
        if e.is_transient() {
            warn!("Transient scan failure for @{username}: {e}");
            let retry_after = match e {
                ScanError::RateLimited { retry_after_secs } => retry_after_secs.map(Duration::from_secs),
                _ => None,
            };
            return self.requeue(username, retry_after);
        }

        if e == ScanError::Private && self.config.keep_private {
            info!("@{username} is private, recording it");
            return Ok(if self.db.claim_and_complete(username, &Completion::private())? {
                Outcome::Completed { status: ChannelStatus::Private, discovered: 0 }
            } else {
                Outcome::Conflict
            });
        }

        info!("Dropping @{username}: {e}");
        Ok(if self.db.delete_if_waiting(username)? {
            Outcome::Deleted
        } else {
            Outcome::Conflict
        })
    }

    fn requeue(&self, username: &str, retry_after: Option<Duration>) -> Result<Outcome> {
        Ok(if self.db.requeue(username)? {
            Outcome::Requeued { retry_after }
        } else {
            Outcome::Conflict
        })
    }

    /// Sleep for `duration` unless stopped first. Returns whether to stop.
    async fn pause(&self, duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
        if duration.is_zero() {
            return *stop.borrow();
        }
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        let sender_gone = tokio::select! {
            _ = &mut sleep => false,
            res = stop.wait_for(|stopped| *stopped) => res.is_err(),
        };
        if sender_gone {
            sleep.await;
        }
        *stop.borrow()
    }
}

/// Uniform random delay within the inclusive millisecond range.
fn jitter((min_ms, max_ms): (u64, u64)) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
