use super::features::{FeatureVector, FEATURE_COUNT};
use super::weights::SeededWeights;

pub const HIDDEN1_DIM: usize = 16;
pub const HIDDEN2_DIM: usize = 8;

/// Feature count the original logistic export carries.
pub const LOGISTIC_FEATURES: usize = 15;

/// Tabular scoring path over the normalized feature vector.
///
/// The compiled-in default is a two-hidden-layer feedforward network; the
/// loadable artifact format is the flat logistic export (15 weights + bias),
/// which replaces the feedforward stack with a logistic head over the first
/// 15 features. Both paths are strictly deterministic.
pub enum TabularNetwork {
    Logistic {
        weights: Vec<f32>,
        bias: f32,
    },
    FeedForward {
        /// FEATURE_COUNT x HIDDEN1_DIM, row-major.
        w1: Vec<f32>,
        b1: Vec<f32>,
        /// HIDDEN1_DIM x HIDDEN2_DIM, row-major.
        w2: Vec<f32>,
        b2: Vec<f32>,
        w3: Vec<f32>,
        b3: f32,
    },
}

impl TabularNetwork {
    pub fn with_default_weights() -> Self {
        TabularNetwork::FeedForward {
            w1: SeededWeights::new(0x165667B1).take(FEATURE_COUNT * HIDDEN1_DIM),
            b1: SeededWeights::new(0xD3A2646C).take(HIDDEN1_DIM),
            w2: SeededWeights::new(0xFD7046C5).take(HIDDEN1_DIM * HIDDEN2_DIM),
            b2: SeededWeights::new(0xB55A4F09).take(HIDDEN2_DIM),
            w3: SeededWeights::new(0x2B759924).take(HIDDEN2_DIM),
            b3: 0.0,
        }
    }

    /// Build the logistic head from a loaded artifact. Rejects wrong shapes.
    pub fn logistic(weights: Vec<f32>, bias: f32) -> Option<Self> {
        if weights.len() != LOGISTIC_FEATURES || weights.iter().any(|w| !w.is_finite()) {
            return None;
        }
        Some(TabularNetwork::Logistic { weights, bias })
    }

    pub fn score(&self, features: &FeatureVector) -> f32 {
        match self {
            TabularNetwork::Logistic { weights, bias } => {
                let mut z = *bias;
                for (w, v) in weights.iter().zip(features.values.iter()) {
                    z += w * v;
                }
                super::sigmoid(z)
            }
            TabularNetwork::FeedForward {
                w1,
                b1,
                w2,
                b2,
                w3,
                b3,
            } => {
                let mut hidden1 = [0.0f32; HIDDEN1_DIM];
                for (h, out) in hidden1.iter_mut().enumerate() {
                    let mut sum = b1[h];
                    for (i, v) in features.values.iter().enumerate() {
                        sum += v * w1[i * HIDDEN1_DIM + h];
                    }
                    *out = sum.max(0.0);
                }

                let mut hidden2 = [0.0f32; HIDDEN2_DIM];
                for (h, out) in hidden2.iter_mut().enumerate() {
                    let mut sum = b2[h];
                    for (i, v) in hidden1.iter().enumerate() {
                        sum += v * w2[i * HIDDEN2_DIM + h];
                    }
                    *out = sum.max(0.0);
                }

                let mut output = *b3;
                for (h, v) in hidden2.iter().enumerate() {
                    output += v * w3[h];
                }
                super::sigmoid(output)
            }
        }
    }

    /// Per-feature importance proxy for explainability: the feature's value
    /// scaled by the magnitude of its first-layer (or logistic) weights.
    pub fn importance(&self, features: &FeatureVector, index: usize) -> f32 {
        let value = features.values[index];
        match self {
            TabularNetwork::Logistic { weights, .. } => {
                weights.get(index).map_or(0.0, |w| (w * value).abs())
            }
            TabularNetwork::FeedForward { w1, .. } => {
                let row = &w1[index * HIDDEN1_DIM..(index + 1) * HIDDEN1_DIM];
                let magnitude: f32 = row.iter().map(|w| w.abs()).sum::<f32>() / HIDDEN1_DIM as f32;
                (magnitude * value).abs()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::features;
    use super::*;

    #[test]
    fn test_feedforward_score_bounded() {
        let net = TabularNetwork::with_default_weights();
        for url in [
            "https://google.com",
            "http://paypa1-secure.tk/login",
            "http://192.168.1.1:8080/verify?a=1&b=2",
        ] {
            let score = net.score(&features::extract(url));
            assert!((0.0..=1.0).contains(&score));
            assert!(score.is_finite());
        }
    }

    #[test]
    fn test_logistic_shape_validation() {
        assert!(TabularNetwork::logistic(vec![0.1; 14], 0.0).is_none());
        assert!(TabularNetwork::logistic(vec![0.1; 15], 0.0).is_some());
        assert!(TabularNetwork::logistic(vec![f32::NAN; 15], 0.0).is_none());
    }

    #[test]
    fn test_logistic_scoring() {
        // A positive weight on the "no HTTPS" direction: has_https is index
        // 4, so weight it negatively and feed an http URL.
        let mut weights = vec![0.0f32; 15];
        weights[4] = -2.0;
        let net = TabularNetwork::logistic(weights, 1.0).unwrap();

        let http = net.score(&features::extract("http://example.com/"));
        let https = net.score(&features::extract("https://example.com/"));
        assert!(http > https);
        assert_eq!(https, super::super::sigmoid(-1.0));
    }

    #[test]
    fn test_zero_features_give_midpoint_logistic() {
        let net = TabularNetwork::logistic(vec![1.0; 15], 0.0).unwrap();
        assert_eq!(net.score(&FeatureVector::zeros()), 0.5);
    }

    #[test]
    fn test_determinism() {
        let net = TabularNetwork::with_default_weights();
        let v = features::extract("http://paypa1-secure.tk/login");
        assert_eq!(net.score(&v), net.score(&v));
    }

    #[test]
    fn test_importance_nonnegative() {
        let net = TabularNetwork::with_default_weights();
        let v = features::extract("http://paypa1-secure.tk/login");
        for i in 0..FEATURE_COUNT {
            assert!(net.importance(&v, i) >= 0.0);
        }
    }
}
