//! Snapshot fixtures shared by unit tests across the crate.

use chrono::{DateTime, Duration, Utc};

use super::{AudienceMember, Category, ChannelSnapshot, Classification, Post, ReactionCount};

fn reactions(pairs: &[(&str, u64)]) -> Vec<ReactionCount> {
    pairs
        .iter()
        .map(|(emoji, count)| ReactionCount { emoji: (*emoji).to_string(), count: *count })
        .collect()
}

fn spread_audience(n: i64, premium: i64) -> Vec<AudienceMember> {
    (0..n)
        .map(|i| AudienceMember {
            user_id: 100_000_000 + i * 50_000_000,
            is_premium: Some(i < premium),
        })
        .collect()
}

/// A two-year-old 10k channel with organic views, comments and reactions.
/// Scores 93 raw with no trust penalties.
pub fn healthy_snapshot(username: &str, now: DateTime<Utc>) -> ChannelSnapshot {
    let posts = (0..20)
        .map(|i| Post {
            id: 100 - i,
            date: now - Duration::hours(i * 20 + (i % 3) * 7),
            views: Some((if i % 2 == 0 { 2_500 } else { 4_500 }) + 50 * i as u64),
            forwards: Some(40),
            comments: Some(12),
            reactions: reactions(&[("👍", 40), ("❤", 20), ("🤔", 15)]),
            text: String::new(),
            forwarded_from: None,
        })
        .collect();

    ChannelSnapshot {
        username: username.to_string(),
        title: "Healthy".into(),
        description: "Friends: t.me/partner_one and @partner_two".into(),
        members: 10_000,
        online_count: Some(200),
        created_at: Some(now - Duration::days(800)),
        verified: false,
        platform_scam: false,
        platform_fake: false,
        comments_enabled: true,
        reactions_enabled: true,
        comments_hidden: false,
        posts,
        audience: spread_audience(20, 2),
    }
}

/// A micro channel whose views are flat and exceed its membership 2.5x.
pub fn inflated_snapshot(username: &str, now: DateTime<Utc>) -> ChannelSnapshot {
    let posts = (0..20)
        .map(|i| Post {
            id: 100 - i,
            date: now - Duration::hours(i * 20 + (i % 3) * 7),
            views: Some(if i % 2 == 0 { 1_840 } else { 2_160 }),
            forwards: Some(0),
            comments: Some(0),
            reactions: Vec::new(),
            text: String::new(),
            forwarded_from: None,
        })
        .collect();

    ChannelSnapshot {
        username: username.to_string(),
        title: "Inflated".into(),
        description: "Buy now @partner_two".into(),
        members: 800,
        online_count: None,
        created_at: Some(now - Duration::days(400)),
        verified: false,
        platform_scam: false,
        platform_fake: false,
        comments_enabled: true,
        reactions_enabled: true,
        comments_hidden: false,
        posts,
        audience: Vec::new(),
    }
}

pub fn classification(category: Category) -> Classification {
    Classification {
        category,
        category_secondary: None,
        bot_percentage: Some(5.0),
        ad_percentage: Some(10.0),
        comment_trust: Some(80.0),
    }
}
