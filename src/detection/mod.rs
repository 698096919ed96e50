pub mod brand_impersonation;
pub mod homograph;
pub mod tld_risk;

use serde::{Deserialize, Serialize};

/// Ordered severity ladder shared by all detectors. Derived from scores, so
/// ordering here must stay monotonic with the score bands that produce it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Band mapping used wherever a numeric score needs a display ordinal.
    pub fn from_score(score: u32) -> Self {
        match score {
            0 => Severity::None,
            1..=14 => Severity::Low,
            15..=29 => Severity::Medium,
            30..=44 => Severity::High,
            _ => Severity::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Sector a protected brand belongs to. Drives subdomain-abuse scoring and
/// policy category blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrandCategory {
    Financial,
    Government,
    Logistics,
    Tech,
    Ecommerce,
    Social,
    Crypto,
}

impl BrandCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            BrandCategory::Financial => "FINANCIAL",
            BrandCategory::Government => "GOVERNMENT",
            BrandCategory::Logistics => "LOGISTICS",
            BrandCategory::Tech => "TECH",
            BrandCategory::Ecommerce => "ECOMMERCE",
            BrandCategory::Social => "SOCIAL",
            BrandCategory::Crypto => "CRYPTO",
        }
    }
}

/// Which impersonation technique matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Typosquat,
    ComboSquat,
    ExactInSubdomain,
    Homograph,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::None < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_from_score_monotonic() {
        let scores = [0u32, 5, 14, 15, 29, 30, 44, 45, 100];
        let mut last = Severity::None;
        for score in scores {
            let severity = Severity::from_score(score);
            assert!(severity >= last, "severity regressed at score {}", score);
            last = severity;
        }
    }
}
