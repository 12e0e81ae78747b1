//! Piecewise point curves. Each function maps one raw statistic to points
//! against its metric's base budget. Missing input yields the neutral value
//! listed on the function instead of an error.

use crate::core::SizeBucket;

/// Views coefficient of variation (percent) → 0..15. Missing → 0.
///
/// Flat, bot-fed series sit near zero; wildly chaotic ones lose a little.
pub fn cv_views_points(cv_pct: Option<f64>) -> f64 {
    let Some(cv) = cv_pct else { return 0.0 };
    if cv < 5.0 {
        0.0
    } else if cv < 10.0 {
        3.0
    } else if cv < 15.0 {
        6.0
    } else if cv < 25.0 {
        10.0
    } else if cv < 60.0 {
        15.0
    } else if cv < 100.0 {
        12.0
    } else {
        8.0
    }
}

/// Reach ceiling per size bucket: the highest reach a healthy channel of that size shows.
pub fn good_reach_ceiling(bucket: SizeBucket) -> f64 {
    match bucket {
        SizeBucket::Micro => 150.0,
        SizeBucket::Small => 100.0,
        SizeBucket::Medium => 60.0,
        SizeBucket::Large => 40.0,
    }
}

/// Reach percent → 0..10, relative to the bucket's ceiling. Missing → 0.
pub fn reach_points(reach_pct: Option<f64>, bucket: SizeBucket) -> f64 {
    let Some(reach) = reach_pct else { return 0.0 };
    let ceiling = good_reach_ceiling(bucket);
    if reach <= 0.0 {
        0.0
    } else if reach < ceiling * 0.1 {
        2.0
    } else if reach < ceiling * 0.3 {
        5.0
    } else if reach <= ceiling {
        10.0
    } else if reach <= ceiling * 1.5 {
        6.0
    } else {
        2.0
    }
}

/// Older/newer view ratio → 0..8. Missing → 4.
pub fn decay_points(decay_ratio: Option<f64>) -> f64 {
    let Some(ratio) = decay_ratio else { return 4.0 };
    if ratio < 0.5 {
        0.0
    } else if ratio < 0.7 {
        2.0
    } else if ratio < 0.85 {
        4.0
    } else if ratio <= 1.5 {
        8.0
    } else if ratio <= 3.0 {
        6.0
    } else {
        4.0
    }
}

/// Posting interval CV → 0..7. Clockwork schedules look automated. Missing → 3.
pub fn regularity_points(interval_cv: Option<f64>) -> f64 {
    let Some(cv) = interval_cv else { return 3.0 };
    if cv < 0.15 {
        0.0
    } else if cv < 0.3 {
        3.0
    } else {
        7.0
    }
}

/// Average comments per post → 0..15.
pub fn comments_points(avg_comments: f64) -> f64 {
    if avg_comments <= 0.0 {
        0.0
    } else if avg_comments < 1.0 {
        3.0
    } else if avg_comments < 3.0 {
        6.0
    } else if avg_comments < 10.0 {
        10.0
    } else if avg_comments < 30.0 {
        13.0
    } else {
        15.0
    }
}

/// Reactions per view (percent) → 0..15. Above 10% is suspicious. Missing → 0.
pub fn reaction_rate_points(rate_pct: Option<f64>) -> f64 {
    let Some(rate) = rate_pct else { return 0.0 };
    if rate < 0.1 {
        0.0
    } else if rate < 0.5 {
        4.0
    } else if rate < 1.0 {
        8.0
    } else if rate < 3.0 {
        12.0
    } else if rate <= 10.0 {
        15.0
    } else {
        10.0
    }
}

/// Forwards per view (percent) → 0..10. Missing → 0.
pub fn forward_rate_points(rate_pct: Option<f64>) -> f64 {
    let Some(rate) = rate_pct else { return 0.0 };
    if rate <= 0.0 {
        0.0
    } else if rate < 0.1 {
        2.0
    } else if rate < 0.5 {
        5.0
    } else if rate < 1.5 {
        8.0
    } else {
        10.0
    }
}

/// Channel age in days → 0..7. Missing → 0.
pub fn age_points(age_days: Option<f64>) -> f64 {
    let Some(days) = age_days else { return 0.0 };
    if days < 30.0 {
        0.0
    } else if days < 90.0 {
        2.0
    } else if days < 180.0 {
        4.0
    } else if days < 365.0 {
        5.0
    } else if days < 730.0 {
        6.0
    } else {
        7.0
    }
}

/// Premium share of the audience sample → 0..7.
/// Fewer than 10 known flags is neutral (3). Missing → 3.
pub fn premium_points(premium_ratio: Option<f64>, known: usize) -> f64 {
    let Some(ratio) = premium_ratio else { return 3.0 };
    if known < 10 {
        return 3.0;
    }
    if ratio <= 0.0 {
        0.0
    } else if ratio < 0.02 {
        2.0
    } else if ratio < 0.05 {
        5.0
    } else if ratio <= 0.20 {
        7.0
    } else {
        4.0
    }
}

/// Unique repost sources per reposted post → 0..6. A channel without reposts scores full.
pub fn source_diversity_points(diversity: Option<f64>) -> f64 {
    let Some(d) = diversity else { return 6.0 };
    if d < 0.2 {
        1.0
    } else if d < 0.4 {
        3.0
    } else if d < 0.7 {
        5.0
    } else {
        6.0
    }
}
