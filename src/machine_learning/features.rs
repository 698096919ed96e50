use crate::heuristics::{is_shortener_host, shannon_entropy};

pub const FEATURE_COUNT: usize = 18;

/// Names aligned index-for-index with the vector `extract` produces.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "url_length",
    "host_length",
    "path_length",
    "subdomain_count",
    "has_https",
    "has_ip_host",
    "host_entropy",
    "path_entropy",
    "query_param_count",
    "has_at_symbol",
    "dot_count",
    "dash_count",
    "has_port",
    "is_shortener",
    "suspicious_tld",
    "digit_ratio",
    "brand_token",
    "path_depth",
];

/// TLDs the tabular model treats as a binary risk feature. Matches the
/// training-time extraction; the richer banding lives in the rule layer.
const MODEL_SUSPICIOUS_TLDS: [&str; 8] = ["tk", "ml", "ga", "cf", "gq", "xyz", "icu", "top"];

const BRAND_KEYWORDS: [&str; 6] = ["paypal", "amazon", "apple", "microsoft", "google", "bank"];

/// Inputs longer than this yield the all-zero vector instead of failing.
const MAX_FEATURE_INPUT: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Extract the normalized numeric features the tabular network consumes.
///
/// This deliberately re-implements the training pipeline's lightweight
/// string splitting rather than delegating to the full parser, so inference
/// matches the feature distribution the weights were fitted on. It never
/// fails: invalid or oversized input produces the all-zero vector.
pub fn extract(url: &str) -> FeatureVector {
    if url.is_empty() || url.len() > MAX_FEATURE_INPUT {
        return FeatureVector::zeros();
    }

    let has_https = url.starts_with("https://");
    let clean = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let host_end = clean
        .find(|c| c == '/' || c == '?')
        .unwrap_or(clean.len());
    let host_and_port = &clean[..host_end];
    let rest = &clean[host_end..];
    let path = match rest.find('?') {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    let query = match rest.find('?') {
        Some(idx) => &rest[idx + 1..],
        None => "",
    };

    let (host, has_port) = match host_and_port.rsplit_once(':') {
        Some((h, p)) if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) => (h, true),
        _ => (host_and_port, false),
    };
    let host_lower = host.to_ascii_lowercase();

    let is_ip = is_dotted_quad(&host_lower);
    let subdomain_count = host_lower.matches('.').count().saturating_sub(1);
    let query_params = if query.is_empty() {
        0
    } else {
        query.split('&').filter(|p| !p.is_empty()).count()
    };

    let tld = host_lower.rsplit('.').next().unwrap_or("");
    let suspicious_tld = MODEL_SUSPICIOUS_TLDS.contains(&tld);

    let host_chars = host_lower.chars().count().max(1);
    let digit_count = host_lower.chars().filter(|c| c.is_ascii_digit()).count();

    let brand_token = BRAND_KEYWORDS.iter().any(|b| host_lower.contains(b));

    let mut values = [0.0f32; FEATURE_COUNT];
    values[0] = ratio(url.chars().count(), 500);
    values[1] = ratio(host_lower.chars().count(), 100);
    values[2] = ratio(path.chars().count(), 200);
    values[3] = ratio(subdomain_count, 5);
    values[4] = flag(has_https);
    values[5] = flag(is_ip);
    values[6] = (shannon_entropy(&host_lower, 100) / 5.0).min(1.0) as f32;
    values[7] = (shannon_entropy(path, 200) / 5.0).min(1.0) as f32;
    values[8] = ratio(query_params, 10);
    values[9] = flag(url.contains('@'));
    values[10] = ratio(url.matches('.').count(), 10);
    values[11] = ratio(url.matches('-').count(), 10);
    values[12] = flag(has_port);
    values[13] = flag(is_shortener_host(&host_lower));
    values[14] = flag(suspicious_tld);
    values[15] = (digit_count as f32 / host_chars as f32).min(1.0);
    values[16] = flag(brand_token);
    values[17] = ratio(path.matches('/').count(), 10);

    FeatureVector { values }
}

fn ratio(count: usize, max: usize) -> f32 {
    (count as f32 / max as f32).min(1.0)
}

fn flag(condition: bool) -> f32 {
    if condition {
        1.0
    } else {
        0.0
    }
}

fn is_dotted_quad(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|p| {
            !p.is_empty() && p.len() <= 3 && p.chars().all(|c| c.is_ascii_digit())
        })
}
