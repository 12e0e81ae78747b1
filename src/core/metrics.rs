use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::links::has_private_invite;
use super::{ChannelSnapshot, Post, SizeBucket};

/// Reaction types that cost a viewer nothing to think about.
const EASY_REACTIONS: &[&str] = &["👍", "❤", "❤️", "🔥", "🥰", "👏", "🎉"];

/// Below this many reactions the type concentration says nothing.
const MIN_REACTIONS_FOR_SHARE: u64 = 100;

/// Direction of engagement between the older and the newer half of the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementTrend {
    Growing,
    Stable,
    Declining,
    Collapsed,
    Unknown,
}

/// Statistics derived once from a snapshot. Every scorer reads only these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub members: u64,
    pub size_bucket: SizeBucket,
    pub post_count: usize,
    pub avg_views: f64,
    /// Sample coefficient of variation of views, percent.
    pub views_cv: Option<f64>,
    pub reach_pct: Option<f64>,
    pub forward_rate: Option<f64>,
    pub reaction_rate: Option<f64>,
    pub avg_reactions: f64,
    pub avg_comments: f64,
    /// Older-half mean views over newer-half mean views.
    pub decay_ratio: Option<f64>,
    /// Coefficient of variation of gaps between posts (ratio, not percent).
    pub interval_cv: Option<f64>,
    pub posts_per_day: Option<f64>,
    pub easy_reaction_share: Option<f64>,
    pub flat_reaction_share: Option<f64>,
    pub age_days: Option<f64>,
    pub growth_velocity: Option<f64>,
    pub private_link_ratio: f64,
    pub source_diversity: Option<f64>,
    pub online_ratio: Option<f64>,
    pub engagement_trend: EngagementTrend,
    pub comments_enabled: bool,
    pub reactions_enabled: bool,
    pub comments_hidden: bool,
    pub verified: bool,
}

impl ChannelMetrics {
    pub fn derive(snapshot: &ChannelSnapshot, now: DateTime<Utc>) -> Self {
        let posts = &snapshot.posts;
        let members = snapshot.members;

        let views: Vec<f64> = posts.iter().filter_map(|p| p.views).map(|v| v as f64).collect();
        let avg_views = mean(&views).unwrap_or(0.0);
        let total_views: f64 = views.iter().sum();

        let total_forwards: f64 = posts.iter().filter_map(|p| p.forwards).map(|v| v as f64).sum();
        let total_reactions: f64 = posts.iter().map(|p| p.total_reactions() as f64).sum();
        let total_comments: f64 = posts.iter().filter_map(|p| p.comments).map(|v| v as f64).sum();

        let post_count = posts.len();
        let per_post = |total: f64| {
            if post_count == 0 { 0.0 } else { total / post_count as f64 }
        };

        let reach_pct = ratio(avg_views, members as f64).map(|r| r * 100.0);
        let age_days = snapshot
            .created_at
            .map(|created| ((now - created).num_seconds() as f64 / 86_400.0).max(0.0));
        let growth_velocity = age_days.map(|days| members as f64 / days.max(1.0));

        let forwarded: Vec<&str> = posts.iter().filter_map(|p| p.forwarded_from.as_deref()).collect();
        let source_diversity = if forwarded.is_empty() {
            None
        } else {
            let unique: HashSet<&str> = forwarded.iter().copied().collect();
            Some(unique.len() as f64 / forwarded.len() as f64)
        };

        let private_links = posts.iter().filter(|p| has_private_invite(&p.text)).count();

        Self {
            members,
            size_bucket: SizeBucket::from_members(members),
            post_count,
            avg_views,
            views_cv: coefficient_of_variation(&views).map(|cv| cv * 100.0),
            reach_pct,
            forward_rate: ratio(total_forwards, total_views).map(|r| r * 100.0),
            reaction_rate: ratio(total_reactions, total_views).map(|r| r * 100.0),
            avg_reactions: per_post(total_reactions),
            avg_comments: per_post(total_comments),
            decay_ratio: decay_ratio(posts),
            interval_cv: interval_cv(posts),
            posts_per_day: posts_per_day(posts),
            easy_reaction_share: easy_reaction_share(posts),
            flat_reaction_share: flat_reaction_share(posts),
            age_days,
            growth_velocity,
            private_link_ratio: ratio(private_links as f64, post_count as f64).unwrap_or(0.0),
            source_diversity,
            online_ratio: snapshot
                .online_count
                .and_then(|online| ratio(online as f64, members as f64)),
            engagement_trend: engagement_trend(posts),
            comments_enabled: snapshot.comments_enabled,
            reactions_enabled: snapshot.reactions_enabled,
            comments_hidden: snapshot.comments_hidden,
            verified: snapshot.verified,
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample (n-1) coefficient of variation. None for fewer than 2 values or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    if m == 0.0 {
        return None;
    }
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt() / m)
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 { Some(numerator / denominator) } else { None }
}

/// Posts ordered oldest first.
fn chronological(posts: &[Post]) -> Vec<&Post> {
    let mut sorted: Vec<&Post> = posts.iter().collect();
    sorted.sort_by_key(|p| (p.date, p.id));
    sorted
}

fn decay_ratio(posts: &[Post]) -> Option<f64> {
    let with_views: Vec<&Post> = chronological(posts)
        .into_iter()
        .filter(|p| p.views.is_some())
        .collect();
    if with_views.len() < 4 {
        return None;
    }
    let (older, newer) = with_views.split_at(with_views.len() / 2);
    let avg = |half: &[&Post]| {
        let v: Vec<f64> = half.iter().filter_map(|p| p.views).map(|v| v as f64).collect();
        mean(&v).unwrap_or(0.0)
    };
    ratio(avg(older), avg(newer))
}

fn interval_cv(posts: &[Post]) -> Option<f64> {
    let sorted = chronological(posts);
    let gaps: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_seconds() as f64)
        .collect();
    if gaps.len() < 5 {
        return None;
    }
    coefficient_of_variation(&gaps)
}

fn posts_per_day(posts: &[Post]) -> Option<f64> {
    let first = posts.iter().map(|p| p.date).min()?;
    let last = posts.iter().map(|p| p.date).max()?;
    let span_days = ((last - first).num_seconds() as f64 / 86_400.0).max(1.0);
    Some(posts.len() as f64 / span_days)
}

fn easy_reaction_share(posts: &[Post]) -> Option<f64> {
    let mut by_type: BTreeMap<&str, u64> = BTreeMap::new();
    for post in posts {
        for r in &post.reactions {
            *by_type.entry(r.emoji.as_str()).or_insert(0) += r.count;
        }
    }
    let total: u64 = by_type.values().sum();
    if total < MIN_REACTIONS_FOR_SHARE {
        return None;
    }
    let mut ranked: Vec<(&str, u64)> = by_type.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let top: Vec<&(&str, u64)> = ranked.iter().take(2).collect();
    if !top.iter().all(|(emoji, _)| EASY_REACTIONS.contains(emoji)) {
        return Some(0.0);
    }
    let top_sum: u64 = top.iter().map(|(_, c)| c).sum();
    Some(top_sum as f64 / total as f64)
}

fn flat_reaction_share(posts: &[Post]) -> Option<f64> {
    let eligible: Vec<&Post> = posts
        .iter()
        .filter(|p| p.reactions.len() >= 3 && p.total_reactions() >= 10)
        .collect();
    if eligible.is_empty() {
        return None;
    }
    let flat = eligible
        .iter()
        .filter(|p| {
            let counts: Vec<f64> = p.reactions.iter().map(|r| r.count as f64).collect();
            coefficient_of_variation(&counts).is_some_and(|cv| cv < 0.15)
        })
        .count();
    Some(flat as f64 / eligible.len() as f64)
}

fn engagement_trend(posts: &[Post]) -> EngagementTrend {
    let sorted = chronological(posts);
    if sorted.len() < 4 {
        return EngagementTrend::Unknown;
    }
    let (older, newer) = sorted.split_at(sorted.len() / 2);
    let rate = |half: &[&Post]| {
        let views: f64 = half.iter().filter_map(|p| p.views).map(|v| v as f64).sum();
        let reactions: f64 = half.iter().map(|p| p.total_reactions() as f64).sum();
        ratio(reactions, views)
    };
    let (Some(old_rate), Some(new_rate)) = (rate(older), rate(newer)) else {
        return EngagementTrend::Unknown;
    };
    if old_rate == 0.0 {
        return EngagementTrend::Unknown;
    }
    let change = new_rate / old_rate;
    if change >= 1.25 {
        EngagementTrend::Growing
    } else if change >= 0.8 {
        EngagementTrend::Stable
    } else if change >= 0.4 {
        EngagementTrend::Declining
    } else {
        EngagementTrend::Collapsed
    }
}
