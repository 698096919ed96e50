use crate::detection::BrandCategory;
use crate::heuristics::is_shortener_host;
use crate::url_parser::UrlParser;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Policy documents larger than this fall back to the compiled-in default.
const MAX_POLICY_BYTES: usize = 8 * 1024;
/// Individual patterns are length-capped before compilation.
const MAX_PATTERN_CHARS: usize = 256;
/// URLs pulled out of an SMS body, capped to bound work.
const MAX_SMS_URLS: usize = 5;

lazy_static! {
    static ref SMS_URL: Regex =
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s"'<>]+"#).unwrap();
}

/// QR payload kinds the surrounding application distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadType {
    Url,
    Wifi,
    Vcard,
    Sms,
    Email,
    Phone,
    Geo,
    Text,
}

impl PayloadType {
    pub fn all() -> Vec<PayloadType> {
        vec![
            PayloadType::Url,
            PayloadType::Wifi,
            PayloadType::Vcard,
            PayloadType::Sms,
            PayloadType::Email,
            PayloadType::Phone,
            PayloadType::Geo,
            PayloadType::Text,
        ]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "URL" => Some(PayloadType::Url),
            "WIFI" => Some(PayloadType::Wifi),
            "VCARD" => Some(PayloadType::Vcard),
            "SMS" => Some(PayloadType::Sms),
            "EMAIL" => Some(PayloadType::Email),
            "PHONE" => Some(PayloadType::Phone),
            "GEO" => Some(PayloadType::Geo),
            "TEXT" => Some(PayloadType::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    DomainBlocked,
    TldBlocked,
    HttpsRequired,
    IpAddress,
    Shortener,
    LengthExceeded,
    PatternMatch,
    PayloadTypeBlocked,
    SmishingDetected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyResult {
    Allowed { reason: String },
    Blocked { reason: BlockReason, detail: String },
    RequiresReview { reason: String },
    /// No policy rule fired; the classifier owns the decision.
    PassedPolicy,
}

impl PolicyResult {
    pub fn is_blocked(&self) -> bool {
        matches!(self, PolicyResult::Blocked { .. })
    }
}

/// Serializable policy document. Field names follow the management console's
/// camelCase export format and round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConfig {
    pub version: u32,
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub blocked_tlds: Vec<String>,
    pub allowed_patterns: Vec<String>,
    pub blocked_patterns: Vec<String>,
    pub require_https: bool,
    pub block_ip_addresses: bool,
    pub block_shorteners: bool,
    pub strict_mode: bool,
    pub max_url_length: usize,
    pub allowed_payload_types: Vec<PayloadType>,
    pub blocked_categories: Vec<BrandCategory>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: 1,
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            blocked_tlds: Vec::new(),
            allowed_patterns: Vec::new(),
            blocked_patterns: Vec::new(),
            require_https: false,
            block_ip_addresses: false,
            block_shorteners: false,
            strict_mode: false,
            max_url_length: 2_048,
            allowed_payload_types: PayloadType::all(),
            blocked_categories: Vec::new(),
        }
    }
}

/// Managed-deployment rule layer evaluated independently of the classifier.
/// Immutable once constructed; rebuild to change. Allow rules always take
/// priority over block rules for the same URL.
pub struct OrgPolicy {
    config: PolicyConfig,
    allow_regexes: Vec<Regex>,
    block_regexes: Vec<Regex>,
    parser: UrlParser,
}

impl Default for OrgPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl OrgPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        let allow_regexes = compile_patterns(&config.allowed_patterns);
        let block_regexes = compile_patterns(&config.blocked_patterns);
        Self {
            config,
            allow_regexes,
            block_regexes,
            parser: UrlParser::new(),
        }
    }

    /// Parse a policy document, falling back to the compiled-in default on
    /// malformed or oversized input. Never errors past this boundary.
    pub fn from_json_str(content: &str) -> Self {
        if content.len() > MAX_POLICY_BYTES {
            log::warn!(
                "policy document exceeds {} bytes, using default policy",
                MAX_POLICY_BYTES
            );
            return Self::default();
        }
        match serde_json::from_str::<PolicyConfig>(content) {
            Ok(config) => Self::new(config),
            Err(e) => {
                log::warn!("failed to parse policy document: {}, using default policy", e);
                Self::default()
            }
        }
    }

    pub fn from_json_file(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json_str(&content),
            Err(e) => {
                log::warn!("failed to read policy {}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Lossless JSON export of the documented fields.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.config).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn is_category_blocked(&self, category: BrandCategory) -> bool {
        self.config.blocked_categories.contains(&category)
    }

    /// First match wins: allow rules, then block rules, then fall through to
    /// the classifier.
    pub fn evaluate(&self, url: &str) -> PolicyResult {
        let components = match self.parser.parse(url) {
            Ok(components) => components,
            Err(e) => {
                // The classifier's cannot-classify path owns unparsable
                // input unless strict mode wants eyes on it.
                return if self.config.strict_mode {
                    PolicyResult::RequiresReview {
                        reason: format!("Unparsable URL under strict mode: {}", e),
                    }
                } else {
                    PolicyResult::PassedPolicy
                };
            }
        };

        let host = components.host.as_str();

        // 1. Allow-list beats everything, including TLD and shortener blocks.
        for pattern in &self.config.allowed_domains {
            if domain_matches(pattern, host) {
                return PolicyResult::Allowed {
                    reason: format!("Domain allow-listed ({})", pattern),
                };
            }
        }
        for regex in &self.allow_regexes {
            if regex.is_match(url) {
                return PolicyResult::Allowed {
                    reason: format!("Allow pattern matched ({})", regex.as_str()),
                };
            }
        }

        // 2. Block rules, most specific first.
        for pattern in &self.config.blocked_domains {
            if domain_matches(pattern, host) {
                return PolicyResult::Blocked {
                    reason: BlockReason::DomainBlocked,
                    detail: format!("Domain {} is blocked by policy", host),
                };
            }
        }

        let tld = components.domain.tld.as_str();
        if !tld.is_empty() {
            let blocked_tld = self
                .config
                .blocked_tlds
                .iter()
                .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(tld));
            if blocked_tld {
                return PolicyResult::Blocked {
                    reason: BlockReason::TldBlocked,
                    detail: format!("TLD .{} is blocked by policy", tld),
                };
            }
        }

        for regex in &self.block_regexes {
            if regex.is_match(url) {
                return PolicyResult::Blocked {
                    reason: BlockReason::PatternMatch,
                    detail: format!("Blocked pattern matched ({})", regex.as_str()),
                };
            }
        }

        if self.config.require_https && !components.protocol.is_secure() {
            return PolicyResult::Blocked {
                reason: BlockReason::HttpsRequired,
                detail: "Policy requires HTTPS".to_string(),
            };
        }

        if self.config.block_ip_addresses && components.domain.is_ip_address {
            return PolicyResult::Blocked {
                reason: BlockReason::IpAddress,
                detail: format!("IP-literal host {} blocked by policy", host),
            };
        }

        if self.config.block_shorteners && is_shortener_host(host) {
            return PolicyResult::Blocked {
                reason: BlockReason::Shortener,
                detail: format!("Shortener {} blocked by policy", host),
            };
        }

        if url.chars().count() > self.config.max_url_length {
            return PolicyResult::Blocked {
                reason: BlockReason::LengthExceeded,
                detail: format!(
                    "URL length exceeds policy maximum of {}",
                    self.config.max_url_length
                ),
            };
        }

        if self.config.strict_mode && components.subdomain_depth() > 3 {
            return PolicyResult::RequiresReview {
                reason: format!(
                    "Excessive subdomain depth ({}) under strict mode",
                    components.subdomain_depth()
                ),
            };
        }

        PolicyResult::PassedPolicy
    }

    /// Screen a raw QR payload: payload-type gating first, then URL policy
    /// for URL payloads and smishing extraction for SMS bodies.
    pub fn evaluate_payload(&self, content: &str, payload_type: PayloadType) -> PolicyResult {
        if !self.config.allowed_payload_types.contains(&payload_type) {
            return PolicyResult::Blocked {
                reason: BlockReason::PayloadTypeBlocked,
                detail: format!("Payload type {:?} not permitted by policy", payload_type),
            };
        }

        match payload_type {
            PayloadType::Url => self.evaluate(content),
            PayloadType::Sms => {
                for found in SMS_URL.find_iter(content).take(MAX_SMS_URLS) {
                    match self.evaluate(found.as_str()) {
                        PolicyResult::Blocked { detail, .. } => {
                            return PolicyResult::Blocked {
                                reason: BlockReason::SmishingDetected,
                                detail: format!("SMS body contains blocked URL: {}", detail),
                            };
                        }
                        PolicyResult::RequiresReview { reason } => {
                            return PolicyResult::RequiresReview { reason };
                        }
                        _ => {}
                    }
                }
                PolicyResult::Allowed {
                    reason: "SMS payload passed policy".to_string(),
                }
            }
            // Non-URL payloads carry nothing for the classifier; passing the
            // type gate is a decision, not a fall-through.
            _ => PolicyResult::Allowed {
                reason: format!("Payload type {:?} permitted", payload_type),
            },
        }
    }
}

/// `*.example.com` matches subdomains only; a bare `example.com` entry
/// matches the apex and subdomains.
fn domain_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    if let Some(parent) = pattern.strip_prefix("*.") {
        host.ends_with(&format!(".{}", parent))
    } else {
        host == pattern || host.ends_with(&format!(".{}", pattern))
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter(|p| {
            if p.chars().count() > MAX_PATTERN_CHARS {
                log::warn!("policy pattern too long, skipping: {:.40}...", p);
                false
            } else {
                true
            }
        })
        .filter_map(|p| match Regex::new(p) {
            Ok(regex) => Some(regex),
            Err(e) => {
                log::warn!("invalid policy pattern {:?}: {}", p, e);
                None
            }
        })
        .collect()
}
