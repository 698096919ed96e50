use super::weights::SeededWeights;

/// Only the first N characters participate in pooling.
pub const MAX_CHARS: usize = 256;
/// Printable ASCII (0x20..=0x7E) plus one reserved unknown index.
pub const VOCAB_SIZE: usize = 96;
pub const EMBED_DIM: usize = 8;
pub const HIDDEN_DIM: usize = 16;

const UNKNOWN_INDEX: usize = VOCAB_SIZE - 1;

/// Character-pooled scoring path: per-character embeddings are mean-pooled
/// across the sequence, passed through one ReLU hidden layer and a sigmoid
/// output. Strictly deterministic; no randomness at inference time.
pub struct CharPoolingNetwork {
    /// VOCAB_SIZE x EMBED_DIM, row-major.
    embeddings: Vec<f32>,
    /// EMBED_DIM x HIDDEN_DIM, row-major.
    hidden_w: Vec<f32>,
    hidden_b: Vec<f32>,
    output_w: Vec<f32>,
    output_b: f32,
}

impl CharPoolingNetwork {
    /// Compiled-in stand-in weights, expanded from fixed seeds. Deployments
    /// replace these with a trained artifact through the ensemble loader.
    pub fn with_default_weights() -> Self {
        Self {
            embeddings: SeededWeights::new(0x9E3779B9).take(VOCAB_SIZE * EMBED_DIM),
            hidden_w: SeededWeights::new(0x85EBCA6B).take(EMBED_DIM * HIDDEN_DIM),
            hidden_b: SeededWeights::new(0xC2B2AE35).take(HIDDEN_DIM),
            output_w: SeededWeights::new(0x27D4EB2F).take(HIDDEN_DIM),
            output_b: 0.0,
        }
    }

    pub fn from_parts(
        embeddings: Vec<f32>,
        hidden_w: Vec<f32>,
        hidden_b: Vec<f32>,
        output_w: Vec<f32>,
        output_b: f32,
    ) -> Option<Self> {
        if embeddings.len() != VOCAB_SIZE * EMBED_DIM
            || hidden_w.len() != EMBED_DIM * HIDDEN_DIM
            || hidden_b.len() != HIDDEN_DIM
            || output_w.len() != HIDDEN_DIM
        {
            return None;
        }
        Some(Self {
            embeddings,
            hidden_w,
            hidden_b,
            output_w,
            output_b,
        })
    }

    fn char_index(ch: char) -> usize {
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            (code - 0x20) as usize
        } else {
            UNKNOWN_INDEX
        }
    }

    /// 0-1 score for a URL string. Empty input pools a zero vector, which
    /// still flows through the layers deterministically.
    pub fn score(&self, url: &str) -> f32 {
        let mut pooled = [0.0f32; EMBED_DIM];
        let mut count = 0usize;

        for ch in url.chars().take(MAX_CHARS) {
            let index = Self::char_index(ch);
            let row = &self.embeddings[index * EMBED_DIM..(index + 1) * EMBED_DIM];
            for (slot, value) in pooled.iter_mut().zip(row) {
                *slot += value;
            }
            count += 1;
        }
        if count > 0 {
            for slot in pooled.iter_mut() {
                *slot /= count as f32;
            }
        }

        let mut hidden = [0.0f32; HIDDEN_DIM];
        for (h, hidden_value) in hidden.iter_mut().enumerate() {
            let mut sum = self.hidden_b[h];
            for (e, pooled_value) in pooled.iter().enumerate() {
                sum += pooled_value * self.hidden_w[e * HIDDEN_DIM + h];
            }
            *hidden_value = sum.max(0.0); // ReLU
        }

        let mut output = self.output_b;
        for (h, hidden_value) in hidden.iter().enumerate() {
            output += hidden_value * self.output_w[h];
        }
        super::sigmoid(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_in_unit_interval() {
        let net = CharPoolingNetwork::with_default_weights();
        for url in [
            "https://google.com",
            "http://paypa1-secure.tk/login",
            "",
            "\u{202E}\u{200B}garbage",
        ] {
            let score = net.score(url);
            assert!((0.0..=1.0).contains(&score), "score {} for {:?}", score, url);
            assert!(score.is_finite());
        }
    }

    #[test]
    fn test_determinism() {
        let net = CharPoolingNetwork::with_default_weights();
        let a = net.score("http://paypa1-secure.tk/login");
        let b = net.score("http://paypa1-secure.tk/login");
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_vocab_maps_to_unknown() {
        assert_eq!(CharPoolingNetwork::char_index('\u{0430}'), VOCAB_SIZE - 1);
        assert_eq!(CharPoolingNetwork::char_index(' '), 0);
        assert_eq!(CharPoolingNetwork::char_index('a'), ('a' as usize) - 0x20);
    }

    #[test]
    fn test_long_input_capped() {
        let net = CharPoolingNetwork::with_default_weights();
        let base = format!("https://example.com/{}", "x".repeat(300));
        let longer = format!("{}{}", base, "y".repeat(1_000));
        // Characters past the cap cannot change the score.
        assert_eq!(net.score(&base), net.score(&longer));
    }

    #[test]
    fn test_from_parts_validates_shapes() {
        assert!(CharPoolingNetwork::from_parts(vec![0.0; 10], vec![], vec![], vec![], 0.0).is_none());
        let net = CharPoolingNetwork::from_parts(
            vec![0.0; VOCAB_SIZE * EMBED_DIM],
            vec![0.0; EMBED_DIM * HIDDEN_DIM],
            vec![0.0; HIDDEN_DIM],
            vec![0.0; HIDDEN_DIM],
            0.0,
        );
        assert!(net.is_some());
        // All-zero weights give exactly the neutral sigmoid midpoint.
        assert_eq!(net.unwrap().score("https://example.com"), 0.5);
    }
}
