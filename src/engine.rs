use crate::detection::brand_impersonation::{BrandDatabase, BrandDetector};
use crate::detection::homograph::HomographAnalyzer;
use crate::heuristics::HeuristicsEngine;
use crate::machine_learning::MlEnsemble;
use crate::normalization::UrlNormalizer;
use crate::url_parser::UrlParser;
use serde::Serialize;

/// Component weights. Rule-based heuristics dominate; brand and homograph
/// findings are strong secondary signals; the ML ensemble is an additive
/// bonus capped well below any band width, never a replacement.
const BRAND_WEIGHT: f64 = 0.6;
const HOMOGRAPH_WEIGHT: f64 = 0.6;
const NORMALIZATION_WEIGHT: f64 = 0.4;
const ML_BONUS_SCALE: f64 = 20.0;

const SUSPICIOUS_THRESHOLD: u32 = 30;
const MALICIOUS_THRESHOLD: u32 = 65;

/// A domain the brand table knows as official can never leave the safe band
/// on rule or ML noise alone.
const OFFICIAL_DOMAIN_CAP: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Safe,
    Suspicious,
    Malicious,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Safe => "SAFE",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::Malicious => "MALICIOUS",
        }
    }

    fn from_score(score: u32) -> Self {
        match score {
            s if s >= MALICIOUS_THRESHOLD => Verdict::Malicious,
            s if s >= SUSPICIOUS_THRESHOLD => Verdict::Suspicious,
            _ => Verdict::Safe,
        }
    }
}

/// Final artifact of one `analyze` call. Immutable; owned by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub verdict: Verdict,
    pub flags: Vec<String>,
    pub confidence: f32,
}

/// Orchestrates the full pipeline: normalize, parse, run the rule engine,
/// brand detector, homograph analyzer and ML ensemble, and combine their
/// scores into one bounded verdict. A pure function of the URL plus the
/// fixed tables and weights wired in at construction.
pub struct PhishingEngine {
    normalizer: UrlNormalizer,
    parser: UrlParser,
    heuristics: HeuristicsEngine,
    brands: BrandDetector,
    homograph: HomographAnalyzer,
    ml: MlEnsemble,
}

impl Default for PhishingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhishingEngine {
    /// Engine over the compiled-in tables and weights.
    pub fn new() -> Self {
        Self::with_parts(BrandDatabase::default(), MlEnsemble::default())
    }

    /// Dependency-injected construction: tables and weights are explicit,
    /// immutable inputs. Replacing them means building a new engine value.
    pub fn with_parts(brand_db: BrandDatabase, ml: MlEnsemble) -> Self {
        Self {
            normalizer: UrlNormalizer::new(),
            parser: UrlParser::new(),
            heuristics: HeuristicsEngine::new(),
            brands: BrandDetector::new(brand_db),
            homograph: HomographAnalyzer::new(),
            ml,
        }
    }

    pub fn analyze(&self, url: &str) -> RiskAssessment {
        if url.trim().is_empty() {
            return RiskAssessment {
                score: 100,
                verdict: Verdict::Malicious,
                flags: vec!["Empty input cannot be verified".to_string()],
                confidence: 1.0,
            };
        }

        let normalization = self.normalizer.normalize(url);

        let components = match self.parser.parse(&normalization.normalized_url) {
            Ok(components) => components,
            Err(e) => {
                log::debug!("analyze: cannot parse {:?}: {}", url, e);
                let mut flags = vec![format!("Cannot classify: {}", e)];
                for attack in &normalization.detected_attacks {
                    push_flag(&mut flags, attack.description().to_string());
                }
                let score = (50 + normalization.risk_score / 2).min(100);
                return RiskAssessment {
                    score,
                    verdict: Verdict::from_score(score),
                    flags,
                    confidence: 0.3,
                };
            }
        };

        let heuristics = self
            .heuristics
            .analyze_components(&components, &normalization.normalized_url);
        let brand = self.brands.detect_components(&components);
        let homograph = self.homograph.analyze(&components.host);
        let ml = self.ml.score(&normalization.normalized_url);

        let ml_bonus = ((ml.ensemble_score as f64) - 0.5).max(0.0) * ML_BONUS_SCALE;
        let combined = heuristics.score as f64
            + BRAND_WEIGHT * brand.score as f64
            + HOMOGRAPH_WEIGHT * homograph.score as f64
            + NORMALIZATION_WEIGHT * normalization.risk_score as f64
            + ml_bonus;
        let mut score = combined.round().clamp(0.0, 100.0) as u32;

        // Asymmetric trust: a known-official domain with no obfuscation in
        // play stays in the safe band regardless of what the ML paths think.
        if brand.is_official && homograph.score == 0 && normalization.risk_score == 0 {
            score = score.min(OFFICIAL_DOMAIN_CAP);
        }

        let mut flags = Vec::new();
        for reason in &heuristics.reasons {
            push_flag(&mut flags, reason.description.clone());
        }
        if let (Some(name), Some(match_type)) = (&brand.brand, brand.match_type) {
            let category = brand
                .category
                .map(|c| c.as_str())
                .unwrap_or("UNKNOWN");
            push_flag(
                &mut flags,
                format!(
                    "Possible {} brand impersonation of '{}' ({:?})",
                    category, name, match_type
                ),
            );
        }
        if homograph.is_homograph {
            push_flag(
                &mut flags,
                "Unicode lookalike characters in host".to_string(),
            );
            for ch in &homograph.detected_characters {
                push_flag(
                    &mut flags,
                    format!(
                        "{} character '{}' imitates '{}' at position {}",
                        ch.block_name, ch.source_char, ch.lookalike, ch.position
                    ),
                );
            }
        }
        for attack in &normalization.detected_attacks {
            push_flag(&mut flags, attack.description().to_string());
        }
        if ml.is_phishing {
            push_flag(&mut flags, "ML ensemble flags this URL".to_string());
        }

        let spread = ((score as f32) - 50.0).abs() / 50.0;
        let confidence = (0.7 * spread + 0.3 * ml.confidence).clamp(0.0, 1.0);

        RiskAssessment {
            score,
            verdict: Verdict::from_score(score),
            flags,
            confidence,
        }
    }
}

fn push_flag(flags: &mut Vec<String>, flag: String) {
    if !flags.contains(&flag) {
        flags.push(flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PhishingEngine {
        PhishingEngine::new()
    }

    #[test]
    fn test_safe_domain_floor() {
        let result = engine().analyze("https://google.com");
        assert_eq!(result.verdict, Verdict::Safe);
        assert!(result.score < 30, "score was {}", result.score);
    }

    #[test]
    fn test_malicious_pattern_ceiling() {
        let result = engine().analyze("http://paypa1-secure.tk/login");
        assert_ne!(result.verdict, Verdict::Safe);
        assert!(result.score >= 50, "score was {}", result.score);
    }

    #[test]
    fn test_empty_input_max_risk() {
        let result = engine().analyze("");
        assert_eq!(result.score, 100);
        assert_eq!(result.verdict, Verdict::Malicious);
        let result = engine().analyze("   ");
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_unparsable_input_flagged_not_crashed() {
        let result = engine().analyze("ftp://example.com/file");
        assert!(result.flags.iter().any(|f| f.contains("Cannot classify")));
        assert_eq!(result.verdict, Verdict::Suspicious);
    }

    #[test]
    fn test_determinism() {
        let e = engine();
        let url = "http://paypa1-secure.tk/login?next=https://evil.example/x";
        let a = e.analyze(url);
        let b = e.analyze(url);
        assert_eq!(a.score, b.score);
        assert_eq!(a.verdict, b.verdict);
        assert_eq!(a.flags, b.flags);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_score_bounded() {
        let e = engine();
        for url in [
            "https://google.com",
            "http://paypa1-secure.tk/login",
            "http://0xC0A80101/verify?u=https%3A%2F%2Fevil.example",
            "http://p\u{0430}ypal-login.tk:4444/secure@verify",
        ] {
            let result = e.analyze(url);
            assert!(result.score <= 100);
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_official_domain_capped_despite_ml() {
        // paypal.com is official in the brand table; whatever the ensemble
        // thinks, the verdict stays SAFE.
        let result = engine().analyze("https://www.paypal.com/signin");
        assert_eq!(result.verdict, Verdict::Safe);
    }

    #[test]
    fn test_homograph_flag_propagates() {
        let result = engine().analyze("https://p\u{0430}ypal.com/login");
        assert!(result
            .flags
            .iter()
            .any(|f| f.contains("lookalike")));
        assert_ne!(result.verdict, Verdict::Safe);
    }

    #[test]
    fn test_flags_deduplicated() {
        let result = engine().analyze("http://paypa1-secure.tk/login");
        let mut sorted = result.flags.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), result.flags.len());
    }

    #[test]
    fn test_ip_literal_host_flagged() {
        let result = engine().analyze("http://3232235777/admin");
        assert!(result.flags.iter().any(|f| f.contains("IP address")));
        assert_ne!(result.verdict, Verdict::Safe);
    }
}
