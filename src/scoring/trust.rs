//! Multiplicative trust factor. Every rule is an independent pure function
//! over a flat signal record; triggered multipliers stack by product.

use serde::{Deserialize, Serialize};

use crate::core::Category;
use crate::core::metrics::EngagementTrend;

pub const TRUST_FLOOR: f64 = 0.10;
/// Applied after the penalty product when the audience shows a healthy premium share.
pub const PREMIUM_BONUS: f64 = 1.05;

/// Everything the trust rules look at. Persisted verbatim in the breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustInput {
    // audience forensics
    pub cluster_fatality: bool,
    pub cluster_suspicious: bool,
    pub cluster_ratio: Option<f64>,
    pub foreign_ratio: Option<f64>,
    pub dc_mismatch: bool,
    pub premium_zero: bool,
    pub premium_bonus: bool,
    // classifier
    pub bot_percentage: Option<f64>,
    pub ad_percentage: Option<f64>,
    pub category: Option<Category>,
    // conviction
    pub conviction_score: u32,
    pub effective_conviction: u32,
    pub is_scam: bool,
    // channel metrics
    pub members: u64,
    pub reach_pct: Option<f64>,
    pub forward_rate: Option<f64>,
    pub reaction_rate: Option<f64>,
    pub decay_ratio: Option<f64>,
    pub views_cv: Option<f64>,
    pub avg_comments: f64,
    pub online_ratio: Option<f64>,
    pub posts_per_day: Option<f64>,
    pub private_link_ratio: f64,
    pub comments_enabled: bool,
    pub comments_hidden: bool,
    pub engagement_trend: EngagementTrend,
    // graph
    pub bad_neighbours: u32,
    // platform labels
    pub platform_scam: bool,
    pub platform_fake: bool,
}

impl Default for TrustInput {
    fn default() -> Self {
        Self {
            cluster_fatality: false,
            cluster_suspicious: false,
            cluster_ratio: None,
            foreign_ratio: None,
            dc_mismatch: false,
            premium_zero: false,
            premium_bonus: false,
            bot_percentage: None,
            ad_percentage: None,
            category: None,
            conviction_score: 0,
            effective_conviction: 0,
            is_scam: false,
            members: 0,
            reach_pct: None,
            forward_rate: None,
            reaction_rate: None,
            decay_ratio: None,
            views_cv: None,
            avg_comments: 0.0,
            online_ratio: None,
            posts_per_day: None,
            private_link_ratio: 0.0,
            comments_enabled: true,
            comments_hidden: false,
            engagement_trend: EngagementTrend::Unknown,
            bad_neighbours: 0,
            platform_scam: false,
            platform_fake: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPenalty {
    pub name: String,
    pub multiplier: f64,
    pub reason: String,
}

impl TrustPenalty {
    fn new(name: &str, multiplier: f64, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            multiplier,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustResult {
    pub trust_factor: f64,
    /// Sorted by name.
    pub penalties: Vec<TrustPenalty>,
    pub premium_bonus: bool,
}

pub type TrustRule = fn(&TrustInput) -> Option<TrustPenalty>;

/// Every rule, in no meaningful order.
pub const RULES: &[TrustRule] = &[
    id_clustering_fatality,
    id_clustering_suspicious,
    dc_mismatch,
    premium_zero,
    bot_percentage,
    ad_percentage,
    conviction,
    hollow_views,
    zombie_audience,
    posting_cadence,
    private_links,
    finance_private_links,
    hidden_comments_private_links,
    engagement_trend,
    bad_neighbours,
    platform_flag,
    dead_comments,
    forward_farm,
    category_risk,
    flat_views,
];

pub fn compose(input: &TrustInput) -> TrustResult {
    compose_with(RULES, input)
}

/// Evaluate `rules` against `input`. The product is taken over penalties
/// sorted by name, so any rule order gives a bit-identical factor.
pub fn compose_with(rules: &[TrustRule], input: &TrustInput) -> TrustResult {
    let mut penalties: Vec<TrustPenalty> = rules.iter().filter_map(|rule| rule(input)).collect();
    penalties.sort_by(|a, b| a.name.cmp(&b.name));

    let mut factor: f64 = penalties.iter().map(|p| p.multiplier).product();
    if input.premium_bonus {
        factor *= PREMIUM_BONUS;
    }

    TrustResult {
        trust_factor: clamp_trust(factor),
        penalties,
        premium_bonus: input.premium_bonus,
    }
}

pub fn clamp_trust(factor: f64) -> f64 {
    if factor.is_nan() {
        return TRUST_FLOOR;
    }
    factor.clamp(TRUST_FLOOR, 1.0)
}

/// Posts/day (normal, heavy, spam) tolerated per category.
pub fn cadence_thresholds(category: Option<Category>) -> (f64, f64, f64) {
    match category {
        Some(Category::News) => (20.0, 40.0, 80.0),
        Some(Category::Crypto) | Some(Category::Finance) => (8.0, 15.0, 30.0),
        Some(Category::Tech) => (5.0, 10.0, 20.0),
        Some(Category::Lifestyle) => (3.0, 6.0, 12.0),
        Some(Category::Entertainment) => (6.0, 12.0, 25.0),
        _ => (5.0, 10.0, 20.0),
    }
}

// --- Rules ---

fn id_clustering_fatality(i: &TrustInput) -> Option<TrustPenalty> {
    i.cluster_fatality.then(|| {
        TrustPenalty::new(
            "id_clustering_fatality",
            0.2,
            format!("{:.0}% of commenters registered in bulk", i.cluster_ratio.unwrap_or(0.0) * 100.0),
        )
    })
}

fn id_clustering_suspicious(i: &TrustInput) -> Option<TrustPenalty> {
    (i.cluster_suspicious && !i.cluster_fatality).then(|| {
        TrustPenalty::new(
            "id_clustering_suspicious",
            0.7,
            format!("{:.0}% of commenters have adjacent IDs", i.cluster_ratio.unwrap_or(0.0) * 100.0),
        )
    })
}

fn dc_mismatch(i: &TrustInput) -> Option<TrustPenalty> {
    i.dc_mismatch.then(|| {
        TrustPenalty::new(
            "dc_mismatch",
            0.8,
            format!("{:.0}% of commenters from foreign data-centres", i.foreign_ratio.unwrap_or(0.0) * 100.0),
        )
    })
}

fn premium_zero(i: &TrustInput) -> Option<TrustPenalty> {
    i.premium_zero
        .then(|| TrustPenalty::new("premium_zero", 0.85, "no premium accounts among commenters"))
}

fn bot_percentage(i: &TrustInput) -> Option<TrustPenalty> {
    let bot = i.bot_percentage?;
    if bot <= 40.0 {
        return None;
    }
    let multiplier = (1.0 - (bot - 40.0) / 100.0).max(0.3);
    Some(TrustPenalty::new("bot_percentage", multiplier, format!("{bot:.0}% of comments look automated")))
}

fn ad_percentage(i: &TrustInput) -> Option<TrustPenalty> {
    let ads = i.ad_percentage?;
    let multiplier = if ads <= 20.0 {
        return None;
    } else if ads <= 40.0 {
        0.9
    } else if ads <= 60.0 {
        0.8
    } else if ads <= 80.0 {
        0.65
    } else {
        0.5
    };
    Some(TrustPenalty::new("ad_percentage", multiplier, format!("{ads:.0}% of posts are ads")))
}

fn conviction(i: &TrustInput) -> Option<TrustPenalty> {
    if i.is_scam {
        return Some(TrustPenalty::new(
            "conviction",
            0.1,
            format!("scam conviction {} (effective {})", i.conviction_score, i.effective_conviction),
        ));
    }
    if i.effective_conviction >= 30 {
        let multiplier = 1.0 - i.effective_conviction as f64 / 200.0;
        return Some(TrustPenalty::new(
            "conviction",
            multiplier,
            format!("fraud evidence {} below scam threshold", i.effective_conviction),
        ));
    }
    None
}

fn hollow_views(i: &TrustInput) -> Option<TrustPenalty> {
    let reach = i.reach_pct?;
    let reactions = i.reaction_rate.unwrap_or(0.0);
    (reach > 150.0 && reactions < 0.1).then(|| {
        TrustPenalty::new(
            "hollow_views",
            0.6,
            format!("reach {reach:.0}% with {reactions:.2}% reactions"),
        )
    })
}

fn zombie_audience(i: &TrustInput) -> Option<TrustPenalty> {
    let online = i.online_ratio?;
    (i.members >= 1_000 && online < 0.005).then(|| {
        TrustPenalty::new(
            "zombie_audience",
            0.7,
            format!("{:.2}% of {} members online", online * 100.0, i.members),
        )
    })
}

fn posting_cadence(i: &TrustInput) -> Option<TrustPenalty> {
    let ppd = i.posts_per_day?;
    let (normal, heavy, spam) = cadence_thresholds(i.category);
    let (multiplier, level) = if ppd > spam {
        (0.5, "spam")
    } else if ppd > heavy {
        (0.8, "heavy")
    } else if ppd > normal {
        (0.95, "above normal")
    } else {
        return None;
    };
    Some(TrustPenalty::new(
        "posting_cadence",
        multiplier,
        format!("{ppd:.1} posts/day is {level} for the category"),
    ))
}

fn private_links(i: &TrustInput) -> Option<TrustPenalty> {
    let ratio = i.private_link_ratio;
    let multiplier = if ratio >= 1.0 {
        0.4
    } else if ratio >= 0.8 {
        0.6
    } else if ratio >= 0.6 {
        0.8
    } else {
        return None;
    };
    Some(TrustPenalty::new(
        "private_links",
        multiplier,
        format!("{:.0}% of posts push private invite links", ratio * 100.0),
    ))
}

fn finance_private_links(i: &TrustInput) -> Option<TrustPenalty> {
    let finance = matches!(i.category, Some(Category::Finance) | Some(Category::Crypto));
    (finance && i.private_link_ratio > 0.4).then(|| {
        TrustPenalty::new(
            "finance_private_links",
            0.7,
            "finance channel funnelling readers into private chats",
        )
    })
}

fn hidden_comments_private_links(i: &TrustInput) -> Option<TrustPenalty> {
    (i.comments_hidden && i.private_link_ratio > 0.5).then(|| {
        TrustPenalty::new(
            "hidden_comments_private_links",
            0.7,
            "hidden comments combined with private invite links",
        )
    })
}

fn engagement_trend(i: &TrustInput) -> Option<TrustPenalty> {
    match i.engagement_trend {
        EngagementTrend::Declining => Some(TrustPenalty::new("engagement_trend", 0.9, "engagement declining")),
        EngagementTrend::Collapsed => Some(TrustPenalty::new("engagement_trend", 0.75, "engagement collapsed")),
        _ => None,
    }
}

fn bad_neighbours(i: &TrustInput) -> Option<TrustPenalty> {
    let multiplier = match i.bad_neighbours {
        0 => return None,
        1 | 2 => 0.85,
        _ => 0.6,
    };
    Some(TrustPenalty::new(
        "bad_neighbours",
        multiplier,
        format!("links to {} channels already rated bad", i.bad_neighbours),
    ))
}

fn platform_flag(i: &TrustInput) -> Option<TrustPenalty> {
    (i.platform_scam || i.platform_fake)
        .then(|| TrustPenalty::new("platform_flag", 0.1, "platform labels the channel scam or fake"))
}

fn dead_comments(i: &TrustInput) -> Option<TrustPenalty> {
    (i.comments_enabled && i.members > 5_000 && i.avg_comments < 0.1).then(|| {
        TrustPenalty::new(
            "dead_comments",
            0.85,
            format!("{:.2} comments per post with {} members", i.avg_comments, i.members),
        )
    })
}

fn forward_farm(i: &TrustInput) -> Option<TrustPenalty> {
    let fwd = i.forward_rate?;
    let reach = i.reach_pct?;
    (fwd > 20.0 && reach < 5.0).then(|| {
        TrustPenalty::new(
            "forward_farm",
            0.8,
            format!("forward rate {fwd:.0}% on reach {reach:.1}%"),
        )
    })
}

fn category_risk(i: &TrustInput) -> Option<TrustPenalty> {
    match i.category {
        Some(Category::Gambling) => Some(TrustPenalty::new("category_risk", 0.7, "gambling content")),
        Some(Category::Adult) => Some(TrustPenalty::new("category_risk", 0.6, "adult content")),
        _ => None,
    }
}

fn flat_views(i: &TrustInput) -> Option<TrustPenalty> {
    let cv = i.views_cv?;
    (cv < 5.0).then(|| TrustPenalty::new("flat_views", 0.7, format!("views CV {cv:.1}%")))
}
