use serde::{Deserialize, Serialize};

use crate::core::AudienceMember;

/// Identifiers needed before any audience check runs.
pub const MIN_SAMPLE: usize = 10;
/// Known premium flags needed before premium density is judged.
pub const MIN_PREMIUM_SAMPLE: usize = 10;
/// Neighbouring IDs closer than this were likely registered in one batch.
pub const CLUSTER_GAP: u64 = 500;

const CLUSTER_FATALITY_RATIO: f64 = 0.30;
const CLUSTER_SUSPICIOUS_RATIO: f64 = 0.15;
const FOREIGN_RATIO_LIMIT: f64 = 0.75;
const PREMIUM_BONUS_RATIO: f64 = 0.15;

/// Data-centre an account was registered on, inferred from its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCenter {
    Dc1,
    Dc2,
    Dc3,
    Dc4,
    Dc5,
}

/// Upper-exclusive ID bounds, in ascending order.
const DC_RANGES: &[(i64, DataCenter)] = &[
    (1_000_000_000, DataCenter::Dc2),
    (2_000_000_000, DataCenter::Dc4),
    (5_000_000_000, DataCenter::Dc1),
    (6_000_000_000, DataCenter::Dc5),
    (7_000_000_000, DataCenter::Dc2),
    (8_000_000_000, DataCenter::Dc4),
];

impl DataCenter {
    pub fn from_user_id(user_id: i64) -> Self {
        DC_RANGES
            .iter()
            .find(|(bound, _)| user_id < *bound)
            .map(|(_, dc)| *dc)
            .unwrap_or(DataCenter::Dc3)
    }

    pub fn is_native(&self) -> bool {
        matches!(self, DataCenter::Dc2 | DataCenter::Dc4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForensicsStatus {
    Complete,
    Skipped,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForensicsReport {
    pub status: ForensicsStatus,
    pub sample_size: usize,
    pub cluster_ratio: Option<f64>,
    pub cluster_fatality: bool,
    pub cluster_suspicious: bool,
    pub foreign_ratio: Option<f64>,
    pub dc_mismatch: bool,
    pub premium_known: usize,
    pub premium_ratio: Option<f64>,
    pub premium_zero: bool,
    pub premium_bonus: bool,
}

impl ForensicsReport {
    fn empty(status: ForensicsStatus, sample_size: usize) -> Self {
        Self {
            status,
            sample_size,
            cluster_ratio: None,
            cluster_fatality: false,
            cluster_suspicious: false,
            foreign_ratio: None,
            dc_mismatch: false,
            premium_known: 0,
            premium_ratio: None,
            premium_zero: false,
            premium_bonus: false,
        }
    }
}

/// Run all audience checks over a sample of commenting users.
pub fn analyze(sample: &[AudienceMember]) -> ForensicsReport {
    if sample.is_empty() {
        return ForensicsReport::empty(ForensicsStatus::Skipped, 0);
    }
    if sample.len() < MIN_SAMPLE {
        return ForensicsReport::empty(ForensicsStatus::InsufficientData, sample.len());
    }

    let ids: Vec<i64> = sample.iter().map(|m| m.user_id).collect();
    let cluster_ratio = id_cluster_ratio(&ids);
    let foreign_ratio = foreign_ratio(&ids);

    let known: Vec<bool> = sample.iter().filter_map(|m| m.is_premium).collect();
    let premium_ratio = (known.len() >= MIN_PREMIUM_SAMPLE)
        .then(|| known.iter().filter(|p| **p).count() as f64 / known.len() as f64);

    let cluster_fatality = cluster_ratio > CLUSTER_FATALITY_RATIO;
    ForensicsReport {
        status: ForensicsStatus::Complete,
        sample_size: sample.len(),
        cluster_ratio: Some(cluster_ratio),
        cluster_fatality,
        cluster_suspicious: !cluster_fatality && cluster_ratio > CLUSTER_SUSPICIOUS_RATIO,
        foreign_ratio: Some(foreign_ratio),
        dc_mismatch: foreign_ratio > FOREIGN_RATIO_LIMIT,
        premium_known: known.len(),
        premium_ratio,
        premium_zero: premium_ratio == Some(0.0),
        premium_bonus: premium_ratio.is_some_and(|r| r >= PREMIUM_BONUS_RATIO),
    }
}

/// Fraction of distinct IDs whose gap to either sorted neighbour is under [`CLUSTER_GAP`].
pub fn id_cluster_ratio(ids: &[i64]) -> f64 {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() < 2 {
        return 0.0;
    }
    let clustered = (0..sorted.len())
        .filter(|&i| {
            let near_prev = i > 0 && sorted[i].abs_diff(sorted[i - 1]) < CLUSTER_GAP;
            let near_next = i + 1 < sorted.len() && sorted[i + 1].abs_diff(sorted[i]) < CLUSTER_GAP;
            near_prev || near_next
        })
        .count();
    clustered as f64 / sorted.len() as f64
}

pub fn foreign_ratio(ids: &[i64]) -> f64 {
    if ids.is_empty() {
        return 0.0;
    }
    let foreign = ids
        .iter()
        .filter(|id| !DataCenter::from_user_id(**id).is_native())
        .count();
    foreign as f64 / ids.len() as f64
}
