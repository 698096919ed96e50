use crate::detection::tld_risk::TldScorer;
use crate::detection::Severity;
use crate::url_parser::{UrlComponents, UrlParser};
use serde::Serialize;
use std::collections::HashSet;

/// Entropy is computed over bounded prefixes to cap cost on huge inputs.
const HOST_ENTROPY_PREFIX: usize = 100;
const PATH_ENTROPY_PREFIX: usize = 200;

const HOST_ENTROPY_THRESHOLD: f64 = 3.8;
const PATH_ENTROPY_THRESHOLD: f64 = 4.5;

/// Discount applied once at the end for verified official domains.
const SAFE_DOMAIN_DISCOUNT: f64 = 0.5;

pub const SHORTENER_DOMAINS: [&str; 10] = [
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "rebrand.ly",
    "cutt.ly",
    "shorturl.at",
];

/// Domains that skip most penalties; the discount is a multiplier, never a
/// negative score.
const VERIFIED_SAFE_DOMAINS: [&str; 14] = [
    "google.com",
    "youtube.com",
    "facebook.com",
    "amazon.com",
    "wikipedia.org",
    "microsoft.com",
    "apple.com",
    "github.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "paypal.com",
    "netflix.com",
    "instagram.com",
];

const CREDENTIAL_KEYWORDS: [&str; 11] = [
    "login", "signin", "verify", "account", "secure", "update", "password", "bank", "confirm",
    "billing", "wallet",
];

pub fn is_shortener_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    SHORTENER_DOMAINS
        .iter()
        .any(|s| host == *s || host.ends_with(&format!(".{}", s)))
}

/// Shannon entropy over a bounded character prefix.
pub fn shannon_entropy(text: &str, prefix: usize) -> f64 {
    let chars: Vec<char> = text.chars().take(prefix).collect();
    if chars.is_empty() {
        return 0.0;
    }
    let mut counts = std::collections::HashMap::new();
    for ch in &chars {
        *counts.entry(*ch).or_insert(0usize) += 1;
    }
    let len = chars.len() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    NoHttps,
    IpAddressHost,
    SuspiciousTld,
    LongUrl,
    DeepSubdomains,
    UrlShortener,
    AtSymbol,
    CredentialKeywords,
    NonStandardPort,
    ManyQueryParams,
    HighHostEntropy,
    HighPathEntropy,
    Unparsable,
}

impl ReasonCode {
    pub fn tag(self) -> &'static str {
        match self {
            ReasonCode::NoHttps => "NO_HTTPS",
            ReasonCode::IpAddressHost => "IP_HOST",
            ReasonCode::SuspiciousTld => "SUSPICIOUS_TLD",
            ReasonCode::LongUrl => "LONG_URL",
            ReasonCode::DeepSubdomains => "DEEP_SUBDOMAINS",
            ReasonCode::UrlShortener => "SHORTENER",
            ReasonCode::AtSymbol => "AT_SYMBOL",
            ReasonCode::CredentialKeywords => "CREDENTIAL_PATH",
            ReasonCode::NonStandardPort => "NON_STANDARD_PORT",
            ReasonCode::ManyQueryParams => "MANY_PARAMS",
            ReasonCode::HighHostEntropy => "HOST_ENTROPY",
            ReasonCode::HighPathEntropy => "PATH_ENTROPY",
            ReasonCode::Unparsable => "UNPARSABLE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reason {
    pub code: ReasonCode,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeuristicResult {
    pub score: u32,
    pub reasons: Vec<Reason>,
    pub flags: Vec<String>,
}

impl HeuristicResult {
    fn hostile(description: &str) -> Self {
        Self {
            score: 100,
            reasons: vec![Reason {
                code: ReasonCode::Unparsable,
                severity: Severity::Critical,
                description: description.to_string(),
            }],
            flags: vec![ReasonCode::Unparsable.tag().to_string()],
        }
    }
}

/// Stateless rule engine: a fixed ordered list of independent checks, each
/// contributing zero or a fixed penalty. Homograph and brand scores are NOT
/// folded in here; the orchestrator combines those exactly once.
pub struct HeuristicsEngine {
    tld_scorer: TldScorer,
    parser: UrlParser,
    safe_domains: HashSet<&'static str>,
}

impl Default for HeuristicsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicsEngine {
    pub fn new() -> Self {
        Self {
            tld_scorer: TldScorer::new(),
            parser: UrlParser::new(),
            safe_domains: VERIFIED_SAFE_DOMAINS.iter().copied().collect(),
        }
    }

    /// Cannot-verify inputs are scored as hostile (100), never as errors.
    pub fn analyze(&self, url: &str) -> HeuristicResult {
        if url.trim().is_empty() {
            return HeuristicResult::hostile("Empty input cannot be verified");
        }
        match self.parser.parse(url) {
            Ok(components) => self.analyze_components(&components, url),
            Err(e) => {
                log::debug!("heuristics: unparsable input ({})", e);
                HeuristicResult::hostile("URL could not be parsed")
            }
        }
    }

    pub fn analyze_components(&self, components: &UrlComponents, full_url: &str) -> HeuristicResult {
        let mut score: u32 = 0;
        let mut reasons: Vec<Reason> = Vec::new();

        let hit = |score: &mut u32, reasons: &mut Vec<Reason>, code, penalty: u32, text: String| {
            *score += penalty;
            reasons.push(Reason {
                code,
                severity: Severity::from_score(penalty),
                description: text,
            });
        };

        if !components.protocol.is_secure() {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::NoHttps,
                10,
                "Connection is not HTTPS".to_string(),
            );
        }

        if components.domain.is_ip_address {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::IpAddressHost,
                25,
                format!("Host is a raw IP address ({})", components.host),
            );
        }

        let tld_score = self.tld_scorer.score(&components.domain.tld);
        if tld_score > 0 {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::SuspiciousTld,
                tld_score,
                format!("TLD .{} carries elevated abuse risk", components.domain.tld),
            );
        }

        let url_len = full_url.chars().count();
        if url_len > 150 {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::LongUrl,
                15,
                format!("URL is unusually long ({} characters)", url_len),
            );
        } else if url_len > 75 {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::LongUrl,
                10,
                format!("URL is long ({} characters)", url_len),
            );
        }

        let depth = components.subdomain_depth();
        if depth > 3 {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::DeepSubdomains,
                15,
                format!("Excessive subdomain depth ({})", depth),
            );
        }

        if is_shortener_host(&components.host) {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::UrlShortener,
                15,
                format!("Shortener domain {} hides the destination", components.host),
            );
        }

        if full_url.contains('@') {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::AtSymbol,
                30,
                "'@' in URL can disguise the real host".to_string(),
            );
        }

        let path_lower = components.path.to_ascii_lowercase();
        let keyword = CREDENTIAL_KEYWORDS.iter().find(|k| path_lower.contains(*k));
        if let Some(keyword) = keyword {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::CredentialKeywords,
                20,
                format!("Credential keyword '{}' in path", keyword),
            );
        }

        if let Some(port) = components.port {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::NonStandardPort,
                15,
                format!("Non-standard port {}", port),
            );
        }

        if let Some(query) = &components.query {
            let params = query.split('&').filter(|p| !p.is_empty()).count();
            if params > 8 {
                hit(
                    &mut score,
                    &mut reasons,
                    ReasonCode::ManyQueryParams,
                    10,
                    format!("Unusually many query parameters ({})", params),
                );
            }
        }

        let host_entropy = shannon_entropy(&components.host, HOST_ENTROPY_PREFIX);
        if host_entropy > HOST_ENTROPY_THRESHOLD {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::HighHostEntropy,
                15,
                format!("High host entropy ({:.2})", host_entropy),
            );
        }

        let path_entropy = shannon_entropy(&components.path, PATH_ENTROPY_PREFIX);
        if path_entropy > PATH_ENTROPY_THRESHOLD {
            hit(
                &mut score,
                &mut reasons,
                ReasonCode::HighPathEntropy,
                10,
                format!("High path entropy ({:.2})", path_entropy),
            );
        }

        // Verified official domains get one discount multiplier at the end.
        if self
            .safe_domains
            .contains(components.domain.registrable_domain.as_str())
        {
            score = (score as f64 * SAFE_DOMAIN_DISCOUNT) as u32;
        }

        let flags = reasons.iter().map(|r| r.code.tag().to_string()).collect();
        HeuristicResult {
            score: score.min(100),
            reasons,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> HeuristicsEngine {
        HeuristicsEngine::new()
    }

    #[test]
    fn test_clean_https_domain_scores_zero() {
        let result = engine().analyze("https://google.com");
        assert_eq!(result.score, 0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_empty_input_is_hostile() {
        let result = engine().analyze("");
        assert_eq!(result.score, 100);
        assert_eq!(result.reasons[0].code, ReasonCode::Unparsable);
    }

    #[test]
    fn test_unparsable_input_is_hostile() {
        let result = engine().analyze("ftp://example.com/");
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_http_penalty() {
        let result = engine().analyze("http://example.com/");
        assert!(result.flags.contains(&"NO_HTTPS".to_string()));
        assert_eq!(result.score, 10);
    }

    #[test]
    fn test_ip_host_penalty() {
        let result = engine().analyze("http://192.168.1.1/admin");
        assert!(result.flags.contains(&"IP_HOST".to_string()));
        assert!(result.score >= 35); // http + IP host
    }

    #[test]
    fn test_phishing_pattern_scores_high() {
        let result = engine().analyze("http://paypa1-secure.tk/login");
        // no https + high-risk TLD + credential keyword
        assert!(result.score >= 50, "score was {}", result.score);
        assert!(result.flags.contains(&"SUSPICIOUS_TLD".to_string()));
        assert!(result.flags.contains(&"CREDENTIAL_PATH".to_string()));
    }

    #[test]
    fn test_at_symbol_penalty() {
        let result = engine().analyze("https://paypal.com@evil.example/login");
        assert!(result.flags.contains(&"AT_SYMBOL".to_string()));
    }

    #[test]
    fn test_shortener_penalty() {
        let result = engine().analyze("https://bit.ly/x3Yz");
        assert!(result.flags.contains(&"SHORTENER".to_string()));
    }

    #[test]
    fn test_subdomain_depth_penalty() {
        let result = engine().analyze("https://a.b.c.d.example.com/");
        assert!(result.flags.contains(&"DEEP_SUBDOMAINS".to_string()));
    }

    #[test]
    fn test_non_standard_port_penalty() {
        let result = engine().analyze("https://example.com:8443/");
        assert!(result.flags.contains(&"NON_STANDARD_PORT".to_string()));
    }

    #[test]
    fn test_long_url_penalty() {
        let url = format!("https://example.com/{}", "a/".repeat(100));
        let result = engine().analyze(&url);
        assert!(result.flags.contains(&"LONG_URL".to_string()));
    }

    #[test]
    fn test_query_param_penalty() {
        let query: Vec<String> = (0..12).map(|i| format!("p{}={}", i, i)).collect();
        let url = format!("https://example.com/?{}", query.join("&"));
        let result = engine().analyze(&url);
        assert!(result.flags.contains(&"MANY_PARAMS".to_string()));
    }

    #[test]
    fn test_safe_domain_discount() {
        // Force some penalties onto a verified domain and a lookalike setup,
        // then confirm the discount halves the verified one.
        let verified = engine().analyze("http://google.com/login");
        let unknown = engine().analyze("http://not-a-known-site.com/login");
        assert!(verified.score < unknown.score);
    }

    #[test]
    fn test_score_clamped() {
        let query: Vec<String> = (0..12).map(|i| format!("p{}={}", i, i)).collect();
        let url = format!(
            "http://a.b.c.d.1.2.3.4.long-host-with-entropy-xq7z9.tk:4444/login/verify@x?{}{}",
            query.join("&"),
            "&pad=".repeat(40)
        );
        let result = engine().analyze(&url);
        assert!(result.score <= 100);
    }

    #[test]
    fn test_entropy_helper_bounds() {
        assert_eq!(shannon_entropy("", 100), 0.0);
        let uniform = shannon_entropy("aaaa", 100);
        assert!(uniform.abs() < f64::EPSILON);
        let mixed = shannon_entropy("abcdefgh", 100);
        assert!(mixed > uniform);
    }

    #[test]
    fn test_reasons_match_flags() {
        let result = engine().analyze("http://paypa1-secure.tk/login");
        assert_eq!(result.reasons.len(), result.flags.len());
    }
}
