use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::curves;
use super::forensics::ForensicsReport;
use crate::core::SizeBucket;
use crate::core::metrics::ChannelMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Quality,
    Engagement,
    Reputation,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 3] = [
        ScoreCategory::Quality,
        ScoreCategory::Engagement,
        ScoreCategory::Reputation,
    ];
}

/// A channel feature an administrator can switch off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Comments,
    Reactions,
}

/// Curve inputs. Persisted in the breakdown so scores can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreInputs {
    pub members: u64,
    pub views_cv: Option<f64>,
    pub reach_pct: Option<f64>,
    pub decay_ratio: Option<f64>,
    pub interval_cv: Option<f64>,
    pub avg_comments: f64,
    pub reaction_rate: Option<f64>,
    pub forward_rate: Option<f64>,
    pub age_days: Option<f64>,
    pub premium_ratio: Option<f64>,
    pub premium_known: usize,
    pub source_diversity: Option<f64>,
    pub comments_enabled: bool,
    pub reactions_enabled: bool,
}

impl Default for ScoreInputs {
    fn default() -> Self {
        Self {
            members: 0,
            views_cv: None,
            reach_pct: None,
            decay_ratio: None,
            interval_cv: None,
            avg_comments: 0.0,
            reaction_rate: None,
            forward_rate: None,
            age_days: None,
            premium_ratio: None,
            premium_known: 0,
            source_diversity: None,
            comments_enabled: true,
            reactions_enabled: true,
        }
    }
}

impl ScoreInputs {
    pub fn from_metrics(metrics: &ChannelMetrics, forensics: &ForensicsReport) -> Self {
        Self {
            members: metrics.members,
            views_cv: metrics.views_cv,
            reach_pct: metrics.reach_pct,
            decay_ratio: metrics.decay_ratio,
            interval_cv: metrics.interval_cv,
            avg_comments: metrics.avg_comments,
            reaction_rate: metrics.reaction_rate,
            forward_rate: metrics.forward_rate,
            age_days: metrics.age_days,
            premium_ratio: forensics.premium_ratio,
            premium_known: forensics.premium_known,
            source_diversity: metrics.source_diversity,
            comments_enabled: metrics.comments_enabled,
            reactions_enabled: metrics.reactions_enabled,
        }
    }

    fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Comments => self.comments_enabled,
            Feature::Reactions => self.reactions_enabled,
        }
    }
}

/// One metric's place in the budget.
pub struct MetricSpec {
    pub name: &'static str,
    pub category: ScoreCategory,
    pub base_max: f64,
    /// Feature whose absence floats this metric's budget to its siblings.
    pub floats_without: Option<Feature>,
    /// Observed value and points against `base_max`.
    pub score: fn(&ScoreInputs) -> (Option<f64>, f64),
}

pub const METRICS: &[MetricSpec] = &[
    MetricSpec {
        name: "cv_views",
        category: ScoreCategory::Quality,
        base_max: 15.0,
        floats_without: None,
        score: score_cv_views,
    },
    MetricSpec {
        name: "reach",
        category: ScoreCategory::Quality,
        base_max: 10.0,
        floats_without: None,
        score: score_reach,
    },
    MetricSpec {
        name: "views_decay",
        category: ScoreCategory::Quality,
        base_max: 8.0,
        floats_without: None,
        score: score_views_decay,
    },
    MetricSpec {
        name: "posting_regularity",
        category: ScoreCategory::Quality,
        base_max: 7.0,
        floats_without: None,
        score: score_regularity,
    },
    MetricSpec {
        name: "comments",
        category: ScoreCategory::Engagement,
        base_max: 15.0,
        floats_without: Some(Feature::Comments),
        score: score_comments,
    },
    MetricSpec {
        name: "reaction_rate",
        category: ScoreCategory::Engagement,
        base_max: 15.0,
        floats_without: Some(Feature::Reactions),
        score: score_reaction_rate,
    },
    MetricSpec {
        name: "forward_rate",
        category: ScoreCategory::Engagement,
        base_max: 10.0,
        floats_without: None,
        score: score_forward_rate,
    },
    MetricSpec {
        name: "channel_age",
        category: ScoreCategory::Reputation,
        base_max: 7.0,
        floats_without: None,
        score: score_age,
    },
    MetricSpec {
        name: "premium_ratio",
        category: ScoreCategory::Reputation,
        base_max: 7.0,
        floats_without: None,
        score: score_premium,
    },
    MetricSpec {
        name: "source_diversity",
        category: ScoreCategory::Reputation,
        base_max: 6.0,
        floats_without: None,
        score: score_source_diversity,
    },
];

fn score_cv_views(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.views_cv, curves::cv_views_points(i.views_cv))
}

fn score_reach(i: &ScoreInputs) -> (Option<f64>, f64) {
    let bucket = SizeBucket::from_members(i.members);
    (i.reach_pct, curves::reach_points(i.reach_pct, bucket))
}

fn score_views_decay(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.decay_ratio, curves::decay_points(i.decay_ratio))
}

fn score_regularity(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.interval_cv, curves::regularity_points(i.interval_cv))
}

fn score_comments(i: &ScoreInputs) -> (Option<f64>, f64) {
    (Some(i.avg_comments), curves::comments_points(i.avg_comments))
}

fn score_reaction_rate(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.reaction_rate, curves::reaction_rate_points(i.reaction_rate))
}

fn score_forward_rate(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.forward_rate, curves::forward_rate_points(i.forward_rate))
}

fn score_age(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.age_days, curves::age_points(i.age_days))
}

fn score_premium(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.premium_ratio, curves::premium_points(i.premium_ratio, i.premium_known))
}

fn score_source_diversity(i: &ScoreInputs) -> (Option<f64>, f64) {
    (i.source_diversity, curves::source_diversity_points(i.source_diversity))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub value: Option<f64>,
    pub points: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub metrics: BTreeMap<String, MetricScore>,
    pub categories: BTreeMap<ScoreCategory, CategoryScore>,
    /// Metrics whose budget was redistributed.
    pub floated: Vec<String>,
    pub raw_score: f64,
}

impl ScoreCard {
    pub fn category(&self, category: ScoreCategory) -> Option<&CategoryScore> {
        self.categories.get(&category)
    }
}

/// Budget each category is held to regardless of disabled features.
pub fn category_budget(category: ScoreCategory) -> f64 {
    METRICS
        .iter()
        .filter(|m| m.category == category)
        .map(|m| m.base_max)
        .sum()
}

pub fn compose(inputs: &ScoreInputs) -> ScoreCard {
    let floats = |spec: &MetricSpec| spec.floats_without.is_some_and(|f| !inputs.is_enabled(f));

    let mut metrics = BTreeMap::new();
    let mut categories = BTreeMap::new();
    let mut floated = Vec::new();

    for category in ScoreCategory::ALL {
        let members: Vec<&MetricSpec> = METRICS.iter().filter(|m| m.category == category).collect();
        let pool: f64 = members.iter().filter(|m| floats(m)).map(|m| m.base_max).sum();
        let enabled_base: f64 = members.iter().filter(|m| !floats(m)).map(|m| m.base_max).sum();

        let mut score = 0.0;
        let mut max = 0.0;
        for spec in members {
            if floats(spec) {
                floated.push(spec.name.to_string());
                metrics.insert(
                    spec.name.to_string(),
                    MetricScore { value: None, points: 0.0, max: 0.0 },
                );
                continue;
            }
            let effective_max = if enabled_base > 0.0 {
                spec.base_max + pool * spec.base_max / enabled_base
            } else {
                spec.base_max
            };
            let (value, base_points) = (spec.score)(inputs);
            let points = round2(base_points * effective_max / spec.base_max);
            score += points;
            max += effective_max;
            metrics.insert(
                spec.name.to_string(),
                MetricScore { value, points, max: round2(effective_max) },
            );
        }
        categories.insert(category, CategoryScore { score: round2(score), max: round2(max) });
    }

    let total: f64 = categories.values().map(|c| c.score).sum();
    ScoreCard {
        metrics,
        categories,
        floated,
        raw_score: round1(total.clamp(0.0, 100.0)),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> ScoreInputs {
        ScoreInputs {
            members: 5_000,
            views_cv: Some(35.0),
            reach_pct: Some(40.0),
            decay_ratio: Some(1.1),
            interval_cv: Some(0.8),
            avg_comments: 12.0,
            reaction_rate: Some(2.0),
            forward_rate: Some(1.0),
            age_days: Some(800.0),
            premium_ratio: Some(0.1),
            premium_known: 30,
            source_diversity: None,
            comments_enabled: true,
            reactions_enabled: true,
        }
    }

    #[test]
    fn budgets_sum_to_hundred() {
        assert_eq!(category_budget(ScoreCategory::Quality), 40.0);
        assert_eq!(category_budget(ScoreCategory::Engagement), 40.0);
        assert_eq!(category_budget(ScoreCategory::Reputation), 20.0);
    }

    #[test]
    fn healthy_channel_scores() {
        let card = compose(&healthy());
        // quality 15+10+8+7, engagement 13+12+8, reputation 7+7+6
        assert_eq!(card.category(ScoreCategory::Quality).unwrap().score, 40.0);
        assert_eq!(card.category(ScoreCategory::Engagement).unwrap().score, 33.0);
        assert_eq!(card.category(ScoreCategory::Reputation).unwrap().score, 20.0);
        assert_eq!(card.raw_score, 93.0);
        assert!(card.floated.is_empty());
        assert_eq!(card.metrics.len(), METRICS.len());
    }

    #[test]
    fn disabled_comments_keep_engagement_budget() {
        let both = compose(&healthy());
        let mut inputs = healthy();
        inputs.comments_enabled = false;
        let card = compose(&inputs);

        let before = both.category(ScoreCategory::Engagement).unwrap().max;
        let after = card.category(ScoreCategory::Engagement).unwrap().max;
        assert_eq!(before, 40.0);
        assert_eq!(after, 40.0);
        assert_eq!(card.floated, vec!["comments".to_string()]);

        let comments = &card.metrics["comments"];
        assert_eq!(comments.max, 0.0);
        assert_eq!(comments.points, 0.0);
        // reaction_rate 15 + 15·15/25, forward_rate 10 + 15·10/25
        assert_eq!(card.metrics["reaction_rate"].max, 24.0);
        assert_eq!(card.metrics["forward_rate"].max, 16.0);
        // 12/15 of 24 plus 8/10 of 16
        assert_eq!(card.category(ScoreCategory::Engagement).unwrap().score, 32.0);
    }

    #[test]
    fn both_features_disabled_float_onto_forwards() {
        let mut inputs = healthy();
        inputs.comments_enabled = false;
        inputs.reactions_enabled = false;
        let card = compose(&inputs);
        assert_eq!(card.metrics["forward_rate"].max, 40.0);
        assert_eq!(card.category(ScoreCategory::Engagement).unwrap().max, 40.0);
        assert_eq!(card.category(ScoreCategory::Engagement).unwrap().score, 32.0);
    }

    #[test]
    fn empty_inputs_stay_bounded() {
        let card = compose(&ScoreInputs::default());
        assert!(card.raw_score >= 0.0 && card.raw_score <= 100.0);
    }

    #[test]
    fn missing_feature_flags_default_to_enabled() {
        let inputs: ScoreInputs = serde_json::from_str(r#"{"members": 5000, "avg_comments": 12.0}"#).unwrap();
        assert!(inputs.comments_enabled);
        assert!(inputs.reactions_enabled);
        assert!(compose(&inputs).floated.is_empty());
    }

    #[test]
    fn compose_is_deterministic() {
        assert_eq!(compose(&healthy()), compose(&healthy()));
    }
}
