pub mod breakdown;
pub mod composer;
pub mod conviction;
pub mod curves;
pub mod forensics;
pub mod trust;
pub mod verdict;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::metrics::ChannelMetrics;
use crate::core::{Category, ChannelSnapshot, ChannelStatus, Classification, Verdict};
use crate::error::ScoringError;
use breakdown::Breakdown;
use composer::ScoreInputs;
use conviction::{ConvictionEngine, ConvictionInput, ConvictionReport};
use forensics::ForensicsReport;
use trust::{TrustInput, TrustResult};

/// Everything the crawler persists for a scanned channel.
#[derive(Debug, Clone)]
pub struct ScoredChannel {
    pub raw_score: f64,
    pub trust_factor: f64,
    pub final_score: u8,
    pub verdict: Verdict,
    pub status: ChannelStatus,
    pub category: Category,
    pub category_secondary: Option<Category>,
    pub members: u64,
    pub breakdown: Breakdown,
    pub conviction: ConvictionReport,
    pub trust: TrustResult,
}

/// Outcome of replaying a stored breakdown with the current formulas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rescored {
    pub raw_score: f64,
    pub trust_factor: f64,
    pub final_score: u8,
    pub verdict: Verdict,
    pub status: ChannelStatus,
}

/// The scoring engine runs every stage over one snapshot and renders a verdict.
pub struct ScoringEngine {
    conviction: ConvictionEngine,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self {
            conviction: ConvictionEngine::new(),
        }
    }

    /// Score a snapshot. Pure CPU work; `bad_neighbours` is the number of
    /// referenced channels already judged BAD.
    pub fn score(
        &self,
        snapshot: &ChannelSnapshot,
        classification: &Classification,
        bad_neighbours: u32,
        now: DateTime<Utc>,
    ) -> Result<ScoredChannel, ScoringError> {
        if snapshot.posts.is_empty() {
            return Err(ScoringError::NoPosts);
        }
        if snapshot.members == 0 {
            return Err(ScoringError::NoMembers);
        }
        if snapshot.posts.iter().all(|p| p.views.is_none()) {
            return Err(ScoringError::NoViews);
        }

        let metrics = ChannelMetrics::derive(snapshot, now);
        let forensics = forensics::analyze(&snapshot.audience);
        let conviction = self.conviction.evaluate(&ConvictionInput {
            metrics: &metrics,
            comment_trust: classification.comment_trust,
        });

        let inputs = ScoreInputs::from_metrics(&metrics, &forensics);
        let card = composer::compose(&inputs);
        if !card.raw_score.is_finite() {
            return Err(ScoringError::NonFinite("raw score"));
        }

        let trust_input = trust_input(
            &metrics,
            &forensics,
            &conviction,
            classification,
            snapshot,
            bad_neighbours,
        );
        let trust = trust::compose(&trust_input);
        let finalized = verdict::finalize(card.raw_score, trust.trust_factor);

        debug!(
            channel = %snapshot.username,
            raw = card.raw_score,
            trust = trust.trust_factor,
            final_score = finalized.final_score,
            conviction = conviction.conviction_score,
            penalties = trust.penalties.len(),
            "Scored channel"
        );

        let raw_score = card.raw_score;
        let breakdown = Breakdown::assemble(
            card,
            &trust,
            trust_input,
            forensics,
            &conviction,
            classification,
            inputs,
        );

        Ok(ScoredChannel {
            raw_score,
            trust_factor: trust.trust_factor,
            final_score: finalized.final_score,
            verdict: finalized.verdict,
            status: finalized.status,
            category: classification.category,
            category_secondary: classification.category_secondary,
            members: snapshot.members,
            breakdown,
            conviction,
            trust,
        })
    }
}

/// Flatten every signal the trust rules read.
pub fn trust_input(
    metrics: &ChannelMetrics,
    forensics: &ForensicsReport,
    conviction: &ConvictionReport,
    classification: &Classification,
    snapshot: &ChannelSnapshot,
    bad_neighbours: u32,
) -> TrustInput {
    TrustInput {
        cluster_fatality: forensics.cluster_fatality,
        cluster_suspicious: forensics.cluster_suspicious,
        cluster_ratio: forensics.cluster_ratio,
        foreign_ratio: forensics.foreign_ratio,
        dc_mismatch: forensics.dc_mismatch,
        premium_zero: forensics.premium_zero,
        premium_bonus: forensics.premium_bonus,
        bot_percentage: classification.bot_percentage,
        ad_percentage: classification.ad_percentage,
        category: Some(classification.category),
        conviction_score: conviction.conviction_score,
        effective_conviction: conviction.effective_conviction,
        is_scam: conviction.is_scam,
        members: metrics.members,
        reach_pct: metrics.reach_pct,
        forward_rate: metrics.forward_rate,
        reaction_rate: metrics.reaction_rate,
        decay_ratio: metrics.decay_ratio,
        views_cv: metrics.views_cv,
        avg_comments: metrics.avg_comments,
        online_ratio: metrics.online_ratio,
        posts_per_day: metrics.posts_per_day,
        private_link_ratio: metrics.private_link_ratio,
        comments_enabled: metrics.comments_enabled,
        comments_hidden: metrics.comments_hidden,
        engagement_trend: metrics.engagement_trend,
        bad_neighbours,
        platform_scam: snapshot.platform_scam,
        platform_fake: snapshot.platform_fake,
    }
}

/// Recompute a stored channel's score from its breakdown alone. No I/O.
pub fn rescore(breakdown: &Breakdown) -> Rescored {
    let raw_score = composer::compose(&breakdown.inputs).raw_score;
    let trust_factor = trust::compose(&breakdown.trust_input).trust_factor;
    let finalized = verdict::finalize(raw_score, trust_factor);
    Rescored {
        raw_score,
        trust_factor,
        final_score: finalized.final_score,
        verdict: finalized.verdict,
        status: finalized.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{classification, healthy_snapshot, inflated_snapshot};

    #[test]
    fn healthy_channel_is_excellent() {
        let now = Utc::now();
        let engine = ScoringEngine::new();
        let scored = engine
            .score(&healthy_snapshot("healthy", now), &classification(Category::Tech), 0, now)
            .unwrap();

        assert_eq!(scored.raw_score, 93.0);
        assert_eq!(scored.trust_factor, 1.0);
        assert_eq!(scored.final_score, 93);
        assert_eq!(scored.verdict, Verdict::Excellent);
        assert_eq!(scored.status, ChannelStatus::Good);
        assert!(scored.trust.penalties.is_empty());
        assert!(!scored.conviction.is_scam);
    }

    #[test]
    fn inflated_channel_is_scam() {
        let now = Utc::now();
        let scored = ScoringEngine::new()
            .score(&inflated_snapshot("inflated", now), &classification(Category::Crypto), 0, now)
            .unwrap();

        assert!(scored.conviction.is_scam);
        let names = scored.conviction.triggered_names();
        assert!(names.contains(&"impossible_reach".to_string()));
        assert!(names.contains(&"flat_views".to_string()));
        assert_eq!(scored.trust_factor, trust::TRUST_FLOOR);
        assert_eq!(scored.verdict, Verdict::Scam);
        assert_eq!(scored.status, ChannelStatus::Bad);
        assert!(scored.breakdown.trust_details.contains_key("conviction"));
    }

    #[test]
    fn bad_neighbours_lower_trust() {
        let now = Utc::now();
        let engine = ScoringEngine::new();
        let snapshot = healthy_snapshot("healthy", now);
        let class = classification(Category::Tech);
        let alone = engine.score(&snapshot, &class, 0, now).unwrap();
        let surrounded = engine.score(&snapshot, &class, 3, now).unwrap();

        assert!(surrounded.trust_factor < alone.trust_factor);
        assert_eq!(surrounded.raw_score, alone.raw_score);
        assert!(surrounded.breakdown.trust_details.contains_key("bad_neighbours"));
    }

    #[test]
    fn rejects_unscorable_snapshots() {
        let now = Utc::now();
        let engine = ScoringEngine::new();
        let class = classification(Category::News);

        let mut empty = healthy_snapshot("empty", now);
        empty.posts.clear();
        assert_eq!(engine.score(&empty, &class, 0, now).unwrap_err(), ScoringError::NoPosts);

        let mut no_members = healthy_snapshot("ghost", now);
        no_members.members = 0;
        assert_eq!(engine.score(&no_members, &class, 0, now).unwrap_err(), ScoringError::NoMembers);

        let mut blind = healthy_snapshot("blind", now);
        for post in &mut blind.posts {
            post.views = None;
        }
        assert_eq!(engine.score(&blind, &class, 0, now).unwrap_err(), ScoringError::NoViews);
    }

    #[test]
    fn replay_reproduces_stored_score() {
        let now = Utc::now();
        let engine = ScoringEngine::new();
        for (snapshot, neighbours) in [
            (healthy_snapshot("a", now), 0),
            (healthy_snapshot("b", now), 2),
            (inflated_snapshot("c", now), 0),
        ] {
            let scored = engine
                .score(&snapshot, &classification(Category::Finance), neighbours, now)
                .unwrap();
            let json = scored.breakdown.to_json().unwrap();
            let replayed = rescore(&Breakdown::from_json(&json).unwrap());

            assert_eq!(replayed.raw_score, scored.raw_score);
            assert_eq!(replayed.trust_factor, scored.trust_factor);
            assert_eq!(replayed.final_score, scored.final_score);
            assert_eq!(replayed.verdict, scored.verdict);
            assert_eq!(replayed.status, scored.status);
        }
    }

    #[test]
    fn replay_keeps_full_precision_classifier_signals() {
        let now = Utc::now();
        let mut class = classification(Category::Tech);
        class.bot_percentage = Some(91.58764724684899);
        let scored = ScoringEngine::new()
            .score(&healthy_snapshot("precise_chan", now), &class, 0, now)
            .unwrap();
        assert!(scored.trust_factor < 1.0);

        let replayed = rescore(&Breakdown::from_json(&scored.breakdown.to_json().unwrap()).unwrap());
        assert_eq!(replayed.trust_factor.to_bits(), scored.trust_factor.to_bits());
    }

    #[test]
    fn breakdown_json_shape() {
        let now = Utc::now();
        let scored = ScoringEngine::new()
            .score(&healthy_snapshot("shape", now), &classification(Category::Tech), 0, now)
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&scored.breakdown.to_json().unwrap()).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["categories"]["quality"]["max"], 40.0);
        assert_eq!(value["categories"]["reputation"]["max"], 20.0);
        assert_eq!(value["metrics"]["comments"]["max"], 15.0);
        assert_eq!(value["conviction"]["is_scam"], false);
        assert_eq!(value["classifier_signals"]["bot_percentage"], 5.0);
        assert_eq!(value["inputs"]["members"], 10_000);
        assert_eq!(value["trust_input"]["category"], "TECH");
        assert!(value["floated"].as_array().unwrap().is_empty());
    }

    #[test]
    fn disabled_comments_float_and_survive_replay() {
        let now = Utc::now();
        let mut snapshot = healthy_snapshot("quiet", now);
        snapshot.comments_enabled = false;
        for post in &mut snapshot.posts {
            post.comments = None;
        }
        let scored = ScoringEngine::new()
            .score(&snapshot, &classification(Category::Tech), 0, now)
            .unwrap();

        assert_eq!(scored.breakdown.floated, vec!["comments".to_string()]);
        assert_eq!(rescore(&scored.breakdown).raw_score, scored.raw_score);
    }
}
