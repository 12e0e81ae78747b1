use serde::{Deserialize, Serialize};

use crate::core::{ChannelStatus, Verdict};

/// Terminal outcome of a scored channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Finalized {
    pub final_score: u8,
    pub verdict: Verdict,
    pub status: ChannelStatus,
}

/// `clamp(round(raw_score * trust_factor), 0, 100)`.
pub fn final_score(raw_score: f64, trust_factor: f64) -> u8 {
    let adjusted = (raw_score * trust_factor).round();
    if adjusted.is_nan() {
        return 0;
    }
    adjusted.clamp(0.0, 100.0) as u8
}

pub fn finalize(raw_score: f64, trust_factor: f64) -> Finalized {
    let final_score = final_score(raw_score, trust_factor);
    let verdict = Verdict::from_score(final_score);
    Finalized {
        final_score,
        verdict,
        status: verdict.status(),
    }
}
