pub mod char_model;
pub mod features;
pub mod tabular_model;
mod weights;

use char_model::CharPoolingNetwork;
use serde::{Deserialize, Serialize};
use tabular_model::TabularNetwork;

/// The tabular path carries more signal and is weighted higher.
const CHAR_WEIGHT: f32 = 0.4;
const TABULAR_WEIGHT: f32 = 0.6;

/// Symmetric agreement adjustment: both models confidently agreeing nudges
/// the combined score; disagreement leaves the weighted average alone.
const AGREEMENT_BOOST: f32 = 0.05;
const AGREE_HIGH: f32 = 0.7;
const AGREE_LOW: f32 = 0.3;

const PHISHING_THRESHOLD: f32 = 0.5;

/// Weight artifacts larger than this are rejected up front.
const MAX_ARTIFACT_BYTES: usize = 8 * 1024;

/// Ranked features reported for explainability.
const TOP_FEATURE_COUNT: usize = 5;

pub fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub name: &'static str,
    pub value: f32,
    pub importance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MlScoringResult {
    pub ensemble_score: f32,
    pub char_score: f32,
    pub feature_score: f32,
    pub is_phishing: bool,
    pub confidence: f32,
    pub top_features: Vec<FeatureImportance>,
}

impl MlScoringResult {
    /// Fixed neutral prediction for numerically unusable input.
    fn neutral() -> Self {
        Self {
            ensemble_score: 0.5,
            char_score: 0.5,
            feature_score: 0.5,
            is_phishing: false,
            confidence: 0.0,
            top_features: Vec::new(),
        }
    }
}

/// The original logistic-regression export format:
/// `{"weights": {"values": [...], "bias": N}}`.
#[derive(Debug, Deserialize)]
struct WeightArtifact {
    weights: WeightValues,
}

#[derive(Debug, Deserialize)]
struct WeightValues {
    values: Vec<f32>,
    bias: f32,
}

/// Two independently-structured deterministic inference paths over the same
/// URL, combined with fixed weights and an agreement adjustment. The
/// ensemble is a bonus signal for the orchestrator; it never replaces the
/// rule-based scoring floor.
pub struct MlEnsemble {
    char_model: CharPoolingNetwork,
    tabular_model: TabularNetwork,
}

impl Default for MlEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl MlEnsemble {
    pub fn new() -> Self {
        Self {
            char_model: CharPoolingNetwork::with_default_weights(),
            tabular_model: TabularNetwork::with_default_weights(),
        }
    }

    pub fn with_models(char_model: CharPoolingNetwork, tabular_model: TabularNetwork) -> Self {
        Self {
            char_model,
            tabular_model,
        }
    }

    /// Parse a weight artifact, falling back to compiled-in defaults on any
    /// malformed or oversized document. Never errors past this boundary.
    pub fn from_json_str(content: &str) -> Self {
        if content.len() > MAX_ARTIFACT_BYTES {
            log::warn!(
                "model artifact exceeds {} bytes, using compiled-in weights",
                MAX_ARTIFACT_BYTES
            );
            return Self::new();
        }
        match serde_json::from_str::<WeightArtifact>(content) {
            Ok(artifact) => {
                match TabularNetwork::logistic(artifact.weights.values, artifact.weights.bias) {
                    Some(tabular) => Self {
                        char_model: CharPoolingNetwork::with_default_weights(),
                        tabular_model: tabular,
                    },
                    None => {
                        log::warn!("model artifact has wrong shape, using compiled-in weights");
                        Self::new()
                    }
                }
            }
            Err(e) => {
                log::warn!("failed to parse model artifact: {}, using compiled-in weights", e);
                Self::new()
            }
        }
    }

    pub fn from_json_file(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json_str(&content),
            Err(e) => {
                log::warn!("failed to read model artifact {}: {}", path, e);
                Self::new()
            }
        }
    }

    pub fn score(&self, url: &str) -> MlScoringResult {
        let features = features::extract(url);
        if !features.is_finite() {
            return MlScoringResult::neutral();
        }

        let char_score = self.char_model.score(url);
        let feature_score = self.tabular_model.score(&features);
        if !char_score.is_finite() || !feature_score.is_finite() {
            return MlScoringResult::neutral();
        }
        let char_score = char_score.clamp(0.0, 1.0);
        let feature_score = feature_score.clamp(0.0, 1.0);

        let mut ensemble = CHAR_WEIGHT * char_score + TABULAR_WEIGHT * feature_score;
        let agree_phishing = char_score >= AGREE_HIGH && feature_score >= AGREE_HIGH;
        let agree_safe = char_score <= AGREE_LOW && feature_score <= AGREE_LOW;
        if agree_phishing {
            ensemble += AGREEMENT_BOOST;
        } else if agree_safe {
            ensemble -= AGREEMENT_BOOST;
        }
        let ensemble = ensemble.clamp(0.0, 1.0);

        let mut confidence = (ensemble - 0.5).abs() * 2.0;
        if agree_phishing || agree_safe {
            confidence = (confidence + 0.15).min(1.0);
        }

        let mut ranked: Vec<usize> = (0..features::FEATURE_COUNT).collect();
        ranked.sort_by(|&a, &b| {
            let ia = self.tabular_model.importance(&features, a);
            let ib = self.tabular_model.importance(&features, b);
            ib.partial_cmp(&ia).unwrap_or(std::cmp::Ordering::Equal)
        });
        let top_features = ranked
            .into_iter()
            .take(TOP_FEATURE_COUNT)
            .map(|i| FeatureImportance {
                name: features::FEATURE_NAMES[i],
                value: features.values[i],
                importance: self.tabular_model.importance(&features, i),
            })
            .collect();

        MlScoringResult {
            ensemble_score: ensemble,
            char_score,
            feature_score,
            is_phishing: ensemble >= PHISHING_THRESHOLD,
            confidence,
            top_features,
        }
    }

    pub fn is_likely_phishing(&self, url: &str) -> bool {
        self.score(url).is_phishing
    }
}
