use serde::{Deserialize, Serialize};

use crate::core::SizeBucket;
use crate::core::metrics::ChannelMetrics;

/// Posts needed before any fraud factor is evaluated.
pub const MIN_POSTS: usize = 10;
/// Members needed before any fraud factor is evaluated.
pub const MIN_MEMBERS: u64 = 100;

const VIRALITY_FORWARD_RATE: f64 = 5.0;
const VIRALITY_BONUS: u32 = 15;
const VERIFIED_BONUS: u32 = 20;

/// One fraud factor's outcome for a single scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudFactor {
    pub name: String,
    pub weight: u32,
    pub triggered: bool,
    pub value: Option<f64>,
    pub threshold: f64,
    pub description: String,
}

impl FraudFactor {
    fn new(name: &str, value: Option<f64>, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            weight: 0,
            triggered: false,
            value,
            threshold,
            description: String::new(),
        }
    }

    fn trigger(mut self, weight: u32, description: impl Into<String>) -> Self {
        self.weight = weight;
        self.triggered = true;
        self.description = description.into();
        self
    }

    fn clear(mut self, description: impl Into<String>) -> Self {
        self.weight = 0;
        self.triggered = false;
        self.description = description.into();
        self
    }
}

/// Signals a fraud check reads.
pub struct ConvictionInput<'a> {
    pub metrics: &'a ChannelMetrics,
    /// 0–100 trust the classifier places in the comment section.
    pub comment_trust: Option<f64>,
}

/// A single independent fraud check.
pub trait FraudCheck {
    fn name(&self) -> &str;
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor;
}

/// All thirteen checks in evaluation order.
pub fn default_checks() -> Vec<Box<dyn FraudCheck + Send + Sync>> {
    vec![
        Box::new(ImpossibleReach),
        Box::new(FlatViews),
        Box::new(DeadEngagement),
        Box::new(NoDecay),
        Box::new(SimpleReactions),
        Box::new(CommentsDisabled),
        Box::new(BotRegularity),
        Box::new(FlatReactions),
        Box::new(ReachDecayCombo),
        Box::new(ReactionsWithoutComments),
        Box::new(GrowthVelocity),
        Box::new(EffectiveMembers),
        Box::new(YoungFastInactive),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvictionStatus {
    Evaluated,
    InsufficientData,
}

/// Aggregated fraud evidence for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvictionReport {
    pub status: ConvictionStatus,
    pub factors: Vec<FraudFactor>,
    pub conviction_score: u32,
    pub factors_triggered: u32,
    pub mitigation: u32,
    pub effective_conviction: u32,
    pub is_scam: bool,
    pub reason: Option<String>,
}

impl ConvictionReport {
    fn insufficient(reason: String) -> Self {
        Self {
            status: ConvictionStatus::InsufficientData,
            factors: Vec::new(),
            conviction_score: 0,
            factors_triggered: 0,
            mitigation: 0,
            effective_conviction: 0,
            is_scam: false,
            reason: Some(reason),
        }
    }

    pub fn triggered_names(&self) -> Vec<String> {
        self.factors
            .iter()
            .filter(|f| f.triggered)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Runs every fraud check and renders the scam verdict.
pub struct ConvictionEngine {
    checks: Vec<Box<dyn FraudCheck + Send + Sync>>,
}

impl Default for ConvictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvictionEngine {
    pub fn new() -> Self {
        Self {
            checks: default_checks(),
        }
    }

    pub fn evaluate(&self, input: &ConvictionInput<'_>) -> ConvictionReport {
        let m = input.metrics;
        if m.post_count < MIN_POSTS || m.members < MIN_MEMBERS {
            return ConvictionReport::insufficient(format!(
                "insufficient data: {} posts, {} members",
                m.post_count, m.members
            ));
        }

        let factors: Vec<FraudFactor> = self.checks.iter().map(|c| c.evaluate(input)).collect();
        let conviction_score: u32 = factors.iter().filter(|f| f.triggered).map(|f| f.weight).sum();
        let factors_triggered = factors.iter().filter(|f| f.triggered).count() as u32;

        let mut mitigation = 0;
        if m.forward_rate.is_some_and(|r| r > VIRALITY_FORWARD_RATE) {
            mitigation += VIRALITY_BONUS;
        }
        if m.verified {
            mitigation += VERIFIED_BONUS;
        }
        let effective_conviction = conviction_score.saturating_sub(mitigation);

        let reason = scam_reason(conviction_score, effective_conviction, factors_triggered);

        ConvictionReport {
            status: ConvictionStatus::Evaluated,
            factors,
            conviction_score,
            factors_triggered,
            mitigation,
            effective_conviction,
            is_scam: reason.is_some(),
            reason,
        }
    }
}

/// First matching rule wins. The raw-80 rule ignores mitigation.
fn scam_reason(conviction: u32, effective: u32, triggered: u32) -> Option<String> {
    if effective >= 50 && triggered >= 2 {
        Some(format!("effective conviction {effective} with {triggered} factors"))
    } else if effective >= 70 && triggered >= 1 {
        Some(format!("effective conviction {effective} from a single factor"))
    } else if conviction >= 80 {
        Some(format!("raw conviction {conviction} overrides mitigation"))
    } else {
        None
    }
}

// --- Individual Checks ---

fn impossible_reach_threshold(bucket: SizeBucket) -> f64 {
    match bucket {
        SizeBucket::Micro => 250.0,
        SizeBucket::Small => 200.0,
        SizeBucket::Medium => 150.0,
        SizeBucket::Large => 120.0,
    }
}

fn comment_alibi_threshold(bucket: SizeBucket) -> f64 {
    match bucket {
        SizeBucket::Micro => 5.0,
        SizeBucket::Small => 15.0,
        SizeBucket::Medium => 40.0,
        SizeBucket::Large => 100.0,
    }
}

/// F1. Alibis zero the factor outright instead of discounting it.
struct ImpossibleReach;
impl FraudCheck for ImpossibleReach {
    fn name(&self) -> &str { "impossible_reach" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let threshold = impossible_reach_threshold(m.size_bucket);
        let factor = FraudFactor::new(self.name(), m.reach_pct, threshold);
        let Some(reach) = m.reach_pct else { return factor };
        if reach < threshold {
            return factor;
        }

        if let Some(fwd) = m.forward_rate.filter(|r| *r > 3.0) {
            return factor.clear(format!("reach {reach:.0}% explained by forward rate {fwd:.1}%"));
        }
        let comment_alibi = m.avg_comments > comment_alibi_threshold(m.size_bucket)
            && input.comment_trust.is_some_and(|t| t >= 70.0);
        if comment_alibi {
            return factor.clear(format!(
                "reach {reach:.0}% explained by {:.1} trusted comments per post",
                m.avg_comments
            ));
        }

        let weight = if reach > 300.0 { 35 } else { 30 };
        factor.trigger(weight, format!("reach {reach:.0}% ≥ {threshold:.0}% for channel size"))
    }
}

/// F2
struct FlatViews;
impl FraudCheck for FlatViews {
    fn name(&self) -> &str { "flat_views" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let cv = input.metrics.views_cv;
        let factor = FraudFactor::new(self.name(), cv, 15.0);
        match cv {
            Some(cv) if cv < 15.0 => {
                let weight = if cv < 10.0 { 25 } else { 20 };
                factor.trigger(weight, format!("views CV {cv:.1}% is machine-flat"))
            }
            _ => factor,
        }
    }
}

/// F3
struct DeadEngagement;
impl FraudCheck for DeadEngagement {
    fn name(&self) -> &str { "dead_engagement" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let ratio = (m.avg_reactions > 0.0).then(|| m.avg_comments / m.avg_reactions);
        let factor = FraudFactor::new(self.name(), ratio, 0.005);
        if !m.comments_enabled || m.avg_reactions < 50.0 {
            return factor;
        }
        match ratio {
            Some(r) if r < 0.005 => factor.trigger(
                20,
                format!("{:.0} reactions per post but comment ratio {r:.4}", m.avg_reactions),
            ),
            _ => factor,
        }
    }
}

/// F4
struct NoDecay;
impl FraudCheck for NoDecay {
    fn name(&self) -> &str { "no_decay" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let decay = input.metrics.decay_ratio;
        let factor = FraudFactor::new(self.name(), decay, 0.85);
        match decay {
            Some(d) if d < 0.85 => {
                let weight = if d < 0.6 { 15 } else { 10 };
                factor.trigger(weight, format!("old posts hold only {d:.2}x the views of new ones"))
            }
            _ => factor,
        }
    }
}

/// F5
struct SimpleReactions;
impl FraudCheck for SimpleReactions {
    fn name(&self) -> &str { "simple_reactions" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let share = input.metrics.easy_reaction_share;
        let factor = FraudFactor::new(self.name(), share, 0.95);
        match share {
            Some(s) if s > 0.95 => {
                factor.trigger(10, format!("{:.0}% of reactions in two easy types", s * 100.0))
            }
            _ => factor,
        }
    }
}

/// F6
struct CommentsDisabled;
impl FraudCheck for CommentsDisabled {
    fn name(&self) -> &str { "comments_disabled" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let enabled = input.metrics.comments_enabled;
        let factor = FraudFactor::new(self.name(), Some(if enabled { 1.0 } else { 0.0 }), 1.0);
        if enabled {
            factor
        } else {
            factor.trigger(15, "comments are turned off")
        }
    }
}

/// F7
struct BotRegularity;
impl FraudCheck for BotRegularity {
    fn name(&self) -> &str { "bot_regularity" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let cv = input.metrics.interval_cv;
        let factor = FraudFactor::new(self.name(), cv, 0.15);
        match cv {
            Some(cv) if cv < 0.15 => factor.trigger(10, format!("posting interval CV {cv:.3}")),
            _ => factor,
        }
    }
}

/// F8
struct FlatReactions;
impl FraudCheck for FlatReactions {
    fn name(&self) -> &str { "flat_reactions" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let share = input.metrics.flat_reaction_share;
        let factor = FraudFactor::new(self.name(), share, 0.5);
        match share {
            Some(s) if s > 0.5 => factor.trigger(
                20,
                format!("{:.0}% of posts have evenly spread reaction types", s * 100.0),
            ),
            _ => factor,
        }
    }
}

/// F9. Independent of F1/F4 firing on their own.
struct ReachDecayCombo;
impl FraudCheck for ReachDecayCombo {
    fn name(&self) -> &str { "reach_decay_combo" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let factor = FraudFactor::new(self.name(), m.reach_pct, 200.0);
        match (m.reach_pct, m.decay_ratio) {
            (Some(reach), Some(decay)) if reach > 200.0 && decay < 0.7 => factor.trigger(
                25,
                format!("reach {reach:.0}% together with decay ratio {decay:.2}"),
            ),
            _ => factor,
        }
    }
}

/// F10
struct ReactionsWithoutComments;
impl FraudCheck for ReactionsWithoutComments {
    fn name(&self) -> &str { "reactions_without_comments" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let factor = FraudFactor::new(self.name(), Some(m.avg_reactions), 500.0);
        if m.comments_enabled && m.avg_reactions > 500.0 && m.avg_comments < 5.0 {
            factor.trigger(
                15,
                format!(
                    "{:.0} reactions but {:.1} comments per post",
                    m.avg_reactions, m.avg_comments
                ),
            )
        } else {
            factor
        }
    }
}

/// Members/day (warning, scam) per size bucket.
fn velocity_thresholds(bucket: SizeBucket) -> (f64, f64) {
    match bucket {
        SizeBucket::Micro => (20.0, 50.0),
        SizeBucket::Small => (100.0, 300.0),
        SizeBucket::Medium => (500.0, 1_500.0),
        SizeBucket::Large => (2_000.0, 5_000.0),
    }
}

fn youth_multiplier(age_days: f64) -> f64 {
    if age_days < 30.0 {
        1.5
    } else if age_days < 90.0 {
        1.2
    } else if age_days < 365.0 {
        1.0
    } else {
        0.5
    }
}

/// F11
struct GrowthVelocity;
impl FraudCheck for GrowthVelocity {
    fn name(&self) -> &str { "growth_velocity" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let (warn, scam) = velocity_thresholds(m.size_bucket);
        let factor = FraudFactor::new(self.name(), m.growth_velocity, warn);
        let (Some(velocity), Some(age)) = (m.growth_velocity, m.age_days) else {
            return factor;
        };
        let base = if velocity >= scam {
            20.0
        } else if velocity >= warn {
            10.0
        } else {
            return factor;
        };
        let weight = (base * youth_multiplier(age)).round() as u32;
        factor.trigger(
            weight,
            format!("{velocity:.0} members/day over {age:.0} days"),
        )
    }
}

/// Share of members a healthy channel of each size reaches per post.
fn expected_reach_ratio(bucket: SizeBucket) -> f64 {
    match bucket {
        SizeBucket::Micro => 0.6,
        SizeBucket::Small => 0.4,
        SizeBucket::Medium => 0.25,
        SizeBucket::Large => 0.15,
    }
}

/// F12
struct EffectiveMembers;
impl FraudCheck for EffectiveMembers {
    fn name(&self) -> &str { "effective_members" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let ratio = (m.members > 0).then(|| {
            let effective = m.avg_views / expected_reach_ratio(m.size_bucket);
            effective / m.members as f64
        });
        let factor = FraudFactor::new(self.name(), ratio, 0.5);
        match ratio {
            Some(r) if r < 0.3 => factor.trigger(
                25,
                format!("views imply {:.0}% of stated members are real", r * 100.0),
            ),
            Some(r) if r < 0.5 => factor.trigger(
                10,
                format!("views imply {:.0}% of stated members are real", r * 100.0),
            ),
            _ => factor,
        }
    }
}

/// F13
struct YoungFastInactive;
impl FraudCheck for YoungFastInactive {
    fn name(&self) -> &str { "young_fast_inactive" }
    fn evaluate(&self, input: &ConvictionInput<'_>) -> FraudFactor {
        let m = input.metrics;
        let factor = FraudFactor::new(self.name(), m.age_days, 60.0);
        let (Some(age), Some(velocity)) = (m.age_days, m.growth_velocity) else {
            return factor;
        };
        let inactive = m.reaction_rate.unwrap_or(0.0) < 0.5 && m.avg_comments < 1.0;
        if age < 60.0 && velocity > 100.0 && inactive {
            factor.trigger(
                30,
                format!("{age:.0} days old, {velocity:.0} members/day, no engagement"),
            )
        } else {
            factor
        }
    }
}
