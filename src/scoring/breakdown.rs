use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::composer::{CategoryScore, MetricScore, ScoreCard, ScoreCategory, ScoreInputs};
use super::conviction::ConvictionReport;
use super::forensics::ForensicsReport;
use super::trust::{TrustInput, TrustResult};
use crate::core::Classification;

/// Bumped whenever a formula change makes old breakdowns score differently.
pub const BREAKDOWN_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustDetail {
    pub multiplier: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvictionSummary {
    pub score: u32,
    pub effective: u32,
    pub triggered: u32,
    pub is_scam: bool,
    pub factors: Vec<String>,
    pub reason: Option<String>,
}

impl From<&ConvictionReport> for ConvictionSummary {
    fn from(report: &ConvictionReport) -> Self {
        Self {
            score: report.conviction_score,
            effective: report.effective_conviction,
            triggered: report.factors_triggered,
            is_scam: report.is_scam,
            factors: report.triggered_names(),
            reason: report.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSignals {
    pub bot_percentage: Option<f64>,
    pub ad_percentage: Option<f64>,
    pub comment_trust: Option<f64>,
}

/// Everything needed to explain a score and to recompute it offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub version: u32,
    pub metrics: BTreeMap<String, MetricScore>,
    pub categories: BTreeMap<ScoreCategory, CategoryScore>,
    pub floated: Vec<String>,
    pub trust_details: BTreeMap<String, TrustDetail>,
    pub forensics: ForensicsReport,
    pub conviction: ConvictionSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier_signals: Option<ClassifierSignals>,
    pub inputs: ScoreInputs,
    pub trust_input: TrustInput,
}

impl Breakdown {
    pub fn assemble(
        card: ScoreCard,
        trust: &TrustResult,
        trust_input: TrustInput,
        forensics: ForensicsReport,
        conviction: &ConvictionReport,
        classification: &Classification,
        inputs: ScoreInputs,
    ) -> Self {
        let trust_details = trust
            .penalties
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    TrustDetail { multiplier: p.multiplier, reason: p.reason.clone() },
                )
            })
            .collect();

        Self {
            version: BREAKDOWN_VERSION,
            metrics: card.metrics,
            categories: card.categories,
            floated: card.floated,
            trust_details,
            forensics,
            conviction: conviction.into(),
            classifier_signals: Some(ClassifierSignals {
                bot_percentage: classification.bot_percentage,
                ad_percentage: classification.ad_percentage,
                comment_trust: classification.comment_trust,
            }),
            inputs,
            trust_input,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
