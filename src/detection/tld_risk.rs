use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Risk band for a top-level domain suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TldRisk {
    /// Established gTLDs with working abuse desks.
    Established,
    /// Common country-code TLDs outside the deployment's home market.
    Foreign,
    /// Cheap gTLDs with persistently high abuse rates.
    Suspicious,
    /// Free registrations, the bulk of throwaway phishing domains.
    HighRisk,
}

impl TldRisk {
    /// Fixed band scores. Total-order preserving: a higher-abuse band never
    /// scores below a lower one.
    pub fn score(self) -> u32 {
        match self {
            TldRisk::Established => 0,
            TldRisk::Foreign => 8,
            TldRisk::Suspicious => 12,
            TldRisk::HighRisk => 25,
        }
    }
}

const HIGH_RISK_TLDS: [&str; 5] = ["tk", "ml", "ga", "cf", "gq"];

const SUSPICIOUS_TLDS: [&str; 14] = [
    "xyz", "top", "club", "online", "site", "bid", "loan", "win", "stream", "download", "icu",
    "work", "click", "link",
];

const FOREIGN_TLDS: [&str; 9] = ["ru", "cn", "su", "br", "in", "vn", "id", "pk", "ng"];

const ESTABLISHED_TLDS: [&str; 8] = ["com", "org", "net", "gov", "edu", "mil", "int", "io"];

/// Unknown suffixes carry a small fixed penalty below every named band
/// except Established.
const UNKNOWN_TLD_SCORE: u32 = 5;

/// Fixed suffix-to-band lookup. Pure and immutable; built once and shared.
pub struct TldScorer {
    bands: HashMap<&'static str, TldRisk>,
}

impl Default for TldScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl TldScorer {
    pub fn new() -> Self {
        let mut bands = HashMap::new();
        for tld in HIGH_RISK_TLDS {
            bands.insert(tld, TldRisk::HighRisk);
        }
        for tld in SUSPICIOUS_TLDS {
            bands.insert(tld, TldRisk::Suspicious);
        }
        for tld in FOREIGN_TLDS {
            bands.insert(tld, TldRisk::Foreign);
        }
        for tld in ESTABLISHED_TLDS {
            bands.insert(tld, TldRisk::Established);
        }
        Self { bands }
    }

    /// Band for a suffix. Multi-part suffixes ("co.uk") are judged by their
    /// final label.
    pub fn risk(&self, tld: &str) -> Option<TldRisk> {
        let last = tld.rsplit('.').next().unwrap_or(tld);
        self.bands.get(last.to_ascii_lowercase().as_str()).copied()
    }

    /// Score for a suffix; unknown suffixes carry a small fixed penalty.
    pub fn score(&self, tld: &str) -> u32 {
        if tld.is_empty() {
            return 0; // IP hosts have no suffix; scored elsewhere
        }
        match self.risk(tld) {
            Some(band) => band.score(),
            None => UNKNOWN_TLD_SCORE,
        }
    }

    pub fn is_high_risk(&self, tld: &str) -> bool {
        self.risk(tld) == Some(TldRisk::HighRisk)
    }

    /// True for any band phishing campaigns favor.
    pub fn is_abused(&self, tld: &str) -> bool {
        matches!(self.risk(tld), Some(TldRisk::HighRisk | TldRisk::Suspicious))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tlds_highest_band() {
        let scorer = TldScorer::new();
        for tld in ["tk", "ml", "ga", "cf", "gq"] {
            assert_eq!(scorer.risk(tld), Some(TldRisk::HighRisk));
            assert!(scorer.score(tld) >= 15);
        }
    }

    #[test]
    fn test_abused_paid_tlds_medium_band() {
        let scorer = TldScorer::new();
        for tld in ["xyz", "top", "site", "loan", "win"] {
            assert_eq!(scorer.risk(tld), Some(TldRisk::Suspicious));
            assert!(scorer.score(tld) >= 10);
        }
    }

    #[test]
    fn test_established_tlds_score_zero() {
        let scorer = TldScorer::new();
        for tld in ["com", "org", "net", "gov", "edu"] {
            assert_eq!(scorer.score(tld), 0);
        }
    }

    #[test]
    fn test_foreign_band_small() {
        let scorer = TldScorer::new();
        assert!(scorer.score("ru") <= 15);
        assert!(scorer.score("ru") > 0);
    }

    #[test]
    fn test_band_total_order() {
        let scorer = TldScorer::new();
        assert!(scorer.score("tk") > scorer.score("xyz"));
        assert!(scorer.score("xyz") > scorer.score("ru"));
        assert!(scorer.score("ru") > scorer.score("com"));
        assert!(scorer.score("unknowntld") > scorer.score("com"));
    }

    #[test]
    fn test_multi_part_suffix_uses_final_label() {
        let scorer = TldScorer::new();
        // co.uk judged by "uk": unknown, small penalty only.
        assert!(scorer.score("co.uk") <= UNKNOWN_TLD_SCORE);
    }

    #[test]
    fn test_case_insensitive() {
        let scorer = TldScorer::new();
        assert_eq!(scorer.score("TK"), scorer.score("tk"));
    }

    #[test]
    fn test_empty_suffix_for_ip_hosts() {
        let scorer = TldScorer::new();
        assert_eq!(scorer.score(""), 0);
    }
}
