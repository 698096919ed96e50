use super::homograph::HomographAnalyzer;
use super::{BrandCategory, MatchType, Severity};
use crate::url_parser::{UrlComponents, UrlParser};
use serde::{Deserialize, Serialize};

/// Inputs to the edit-distance comparison are capped to bound worst-case
/// cost regardless of adversarial label length.
const MAX_COMPARE_CHARS: usize = 50;
/// Edit distances above this are not typosquats.
const MAX_EDIT_DISTANCE: usize = 2;

/// Tokens that, combined with a brand name, mark a combosquat domain.
const SUSPICIOUS_TOKENS: [&str; 12] = [
    "secure", "login", "verify", "billing", "support", "update", "account", "signin", "auth",
    "wallet", "service", "alert",
];

/// Subset of tokens that imply credential harvesting; worth an extra bump.
const CREDENTIAL_TOKENS: [&str; 5] = ["login", "signin", "verify", "account", "billing"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandEntry {
    pub name: String,
    /// Official registrable domains; matches here are never impersonation.
    pub domains: Vec<String>,
    pub category: BrandCategory,
    /// Regional or alternate spellings checked like the primary name.
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandDatabase {
    pub brands: Vec<BrandEntry>,
}

impl Default for BrandDatabase {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BrandDatabase {
    /// Load a database override in the house YAML table format, falling back
    /// to the compiled-in set on any error.
    pub fn load_from_file(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<BrandDatabase>(&content) {
                Ok(db) if !db.brands.is_empty() => db,
                Ok(_) => {
                    log::warn!("brand database {} is empty, using built-in set", path);
                    Self::builtin()
                }
                Err(e) => {
                    log::warn!("failed to parse brand database {}: {}", path, e);
                    Self::builtin()
                }
            },
            Err(e) => {
                log::warn!("failed to read brand database {}: {}", path, e);
                Self::builtin()
            }
        }
    }

    pub fn builtin() -> Self {
        fn entry(
            name: &str,
            domains: &[&str],
            category: BrandCategory,
            variants: &[&str],
        ) -> BrandEntry {
            BrandEntry {
                name: name.to_string(),
                domains: domains.iter().map(|d| d.to_string()).collect(),
                category,
                variants: variants.iter().map(|v| v.to_string()).collect(),
            }
        }

        use BrandCategory::*;
        Self {
            brands: vec![
                // Financial
                entry("paypal", &["paypal.com", "paypal.me"], Financial, &[]),
                entry("chase", &["chase.com"], Financial, &[]),
                entry("bankofamerica", &["bankofamerica.com"], Financial, &["bofa"]),
                entry("wellsfargo", &["wellsfargo.com"], Financial, &["wells-fargo"]),
                entry("hsbc", &["hsbc.com", "hsbc.co.uk"], Financial, &[]),
                entry("citibank", &["citibank.com", "citi.com"], Financial, &[]),
                entry("barclays", &["barclays.co.uk", "barclays.com"], Financial, &[]),
                entry("santander", &["santander.com", "santander.co.uk"], Financial, &[]),
                // Government
                entry("irs", &["irs.gov"], Government, &[]),
                entry("hmrc", &["hmrc.gov.uk", "gov.uk"], Government, &[]),
                // Logistics
                entry("usps", &["usps.com"], Logistics, &[]),
                entry("fedex", &["fedex.com"], Logistics, &[]),
                entry("dhl", &["dhl.com", "dhl.de"], Logistics, &[]),
                entry("royalmail", &["royalmail.com"], Logistics, &["royal-mail"]),
                // Tech
                entry("google", &["google.com", "gmail.com"], Tech, &[]),
                entry(
                    "microsoft",
                    &["microsoft.com", "live.com", "outlook.com"],
                    Tech,
                    &[],
                ),
                entry("apple", &["apple.com", "icloud.com"], Tech, &[]),
                entry("netflix", &["netflix.com"], Tech, &[]),
                entry("adobe", &["adobe.com"], Tech, &[]),
                entry("steam", &["steampowered.com", "steamcommunity.com"], Tech, &[]),
                // E-commerce
                entry(
                    "amazon",
                    &["amazon.com", "amazon.co.uk", "amazon.de"],
                    Ecommerce,
                    &[],
                ),
                entry("ebay", &["ebay.com", "ebay.co.uk"], Ecommerce, &[]),
                entry("walmart", &["walmart.com"], Ecommerce, &[]),
                entry("alibaba", &["alibaba.com", "aliexpress.com"], Ecommerce, &[]),
                // Social
                entry("facebook", &["facebook.com", "fb.com"], Social, &[]),
                entry("instagram", &["instagram.com"], Social, &[]),
                entry("whatsapp", &["whatsapp.com"], Social, &[]),
                entry("twitter", &["twitter.com", "x.com"], Social, &[]),
                entry("linkedin", &["linkedin.com"], Social, &[]),
                entry("telegram", &["telegram.org"], Social, &[]),
                // Crypto
                entry("binance", &["binance.com"], Crypto, &[]),
                entry("coinbase", &["coinbase.com"], Crypto, &[]),
                entry("metamask", &["metamask.io"], Crypto, &[]),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandDetectionResult {
    /// Matched brand id; `None` for clean and official domains alike.
    pub brand: Option<String>,
    pub score: u32,
    pub match_type: Option<MatchType>,
    pub category: Option<BrandCategory>,
    pub severity: Severity,
    /// True only for an exact registrable-domain match on an official
    /// domain. Lets the orchestrator hold the safe floor.
    pub is_official: bool,
}

impl BrandDetectionResult {
    pub fn is_impersonation(&self) -> bool {
        self.brand.is_some()
    }

    fn clean() -> Self {
        Self {
            brand: None,
            score: 0,
            match_type: None,
            category: None,
            severity: Severity::None,
            is_official: false,
        }
    }

    fn official() -> Self {
        Self {
            is_official: true,
            ..Self::clean()
        }
    }
}

struct Candidate {
    brand: String,
    score: u32,
    match_type: MatchType,
    category: BrandCategory,
}

/// Matches a host against the protected-brand table: exact official domains,
/// bounded-edit-distance typosquats, combosquats, brand-in-subdomain abuse
/// and confusable-skeleton homographs. Highest-severity match wins.
pub struct BrandDetector {
    database: BrandDatabase,
    parser: UrlParser,
    homograph: HomographAnalyzer,
}

impl Default for BrandDetector {
    fn default() -> Self {
        Self::new(BrandDatabase::default())
    }
}

impl BrandDetector {
    pub fn new(database: BrandDatabase) -> Self {
        Self {
            database,
            parser: UrlParser::new(),
            homograph: HomographAnalyzer::new(),
        }
    }

    /// Convenience entry point over a raw URL string. Unparsable input is
    /// simply not brand impersonation.
    pub fn detect(&self, url: &str) -> BrandDetectionResult {
        match self.parser.parse(url) {
            Ok(components) => self.detect_components(&components),
            Err(_) => BrandDetectionResult::clean(),
        }
    }

    /// Independent per-URL application of `detect`; no shared mutable state.
    pub fn detect_batch(&self, urls: &[&str]) -> Vec<BrandDetectionResult> {
        urls.iter().map(|url| self.detect(url)).collect()
    }

    pub fn detect_components(&self, components: &UrlComponents) -> BrandDetectionResult {
        if components.domain.is_ip_address {
            return BrandDetectionResult::clean();
        }

        let registrable = components.domain.registrable_domain.as_str();
        let sld = components.domain.sld();

        // Official domains short-circuit: never impersonation, score 0.
        for brand in &self.database.brands {
            if brand.domains.iter().any(|d| d == registrable) {
                return BrandDetectionResult::official();
            }
        }

        // The parser emits IDN hosts in ACE form; the skeleton comparison
        // needs the Unicode form back.
        let unicode_sld = if sld.starts_with("xn--") {
            let (decoded, _errors) = idna::domain_to_unicode(registrable);
            decoded
                .split('.')
                .next()
                .map(|l| l.to_string())
                .unwrap_or_else(|| sld.to_string())
        } else {
            sld.to_string()
        };

        let mut best: Option<Candidate> = None;
        for brand in &self.database.brands {
            for name in std::iter::once(&brand.name).chain(brand.variants.iter()) {
                if let Some(candidate) =
                    self.match_brand_name(components, sld, &unicode_sld, brand, name)
                {
                    best = match best {
                        Some(current) if current.score >= candidate.score => Some(current),
                        _ => Some(candidate),
                    };
                }
            }
        }

        match best {
            Some(candidate) => {
                log::debug!(
                    "brand match: {} via {:?} on {} (score {})",
                    candidate.brand,
                    candidate.match_type,
                    registrable,
                    candidate.score
                );
                BrandDetectionResult {
                    severity: Severity::from_score(candidate.score),
                    brand: Some(candidate.brand),
                    score: candidate.score,
                    match_type: Some(candidate.match_type),
                    category: Some(candidate.category),
                    is_official: false,
                }
            }
            None => BrandDetectionResult::clean(),
        }
    }

    fn match_brand_name(
        &self,
        components: &UrlComponents,
        sld: &str,
        unicode_sld: &str,
        brand: &BrandEntry,
        name: &str,
    ) -> Option<Candidate> {
        let mut best: Option<(u32, MatchType)> = None;
        let mut consider = |score: u32, match_type: MatchType| {
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, match_type));
            }
        };

        // Confusable skeleton: folding the SLD recovers the brand exactly.
        let folded = self.homograph.fold_confusables(unicode_sld);
        if folded != unicode_sld && folded == name {
            consider(50, MatchType::Homograph);
        }

        // Typosquat against the whole SLD.
        if let Some(score) = typosquat_score(sld, name) {
            consider(score, MatchType::Typosquat);
        }

        // Combosquat: brand name plus a suspicious token in the SLD, and
        // typosquats hidden inside hyphenated tokens.
        let tokens: Vec<&str> = sld.split('-').filter(|t| !t.is_empty()).collect();
        if tokens.len() > 1 {
            let brand_token = tokens.iter().any(|t| {
                *t == name || (name.len() >= 4 && bounded_levenshtein(t, name, 1).is_some())
            });
            if brand_token {
                let credential = tokens.iter().any(|t| CREDENTIAL_TOKENS.contains(t));
                let suspicious = credential || tokens.iter().any(|t| SUSPICIOUS_TOKENS.contains(t));
                if suspicious {
                    consider(if credential { 45 } else { 35 }, MatchType::ComboSquat);
                }
            }
        }
        if sld != name && sld.contains(name) && !sld.contains('-') {
            // Concatenated combosquat ("paypalverify").
            let remainder = sld.replacen(name, "", 1);
            if SUSPICIOUS_TOKENS.contains(&remainder.as_str()) {
                let score = if CREDENTIAL_TOKENS.contains(&remainder.as_str()) {
                    45
                } else {
                    35
                };
                consider(score, MatchType::ComboSquat);
            }
        }

        // Brand name as a subdomain label over someone else's domain.
        if components.domain.subdomains.iter().any(|s| s == name) {
            let score = match brand.category {
                BrandCategory::Financial | BrandCategory::Government => 40,
                BrandCategory::Tech | BrandCategory::Logistics | BrandCategory::Ecommerce => 30,
                _ => 25,
            };
            consider(score, MatchType::ExactInSubdomain);
        }

        best.map(|(score, match_type)| Candidate {
            brand: brand.name.clone(),
            score,
            match_type,
            category: brand.category,
        })
    }
}

/// Score a whole-SLD typosquat. Distance 0 means the brand's exact name on a
/// registrable domain that is not official (wrong TLD).
fn typosquat_score(sld: &str, name: &str) -> Option<u32> {
    let distance = bounded_levenshtein(sld, name, MAX_EDIT_DISTANCE)?;
    match distance {
        0 => Some(40),
        1 if name.len() >= 4 => Some(45),
        2 if name.len() >= 6 => Some(25),
        _ => None,
    }
}

/// Single-row Levenshtein with a band early-exit: returns `None` as soon as
/// the distance provably exceeds `max`. Both inputs are capped before
/// comparison so cost stays bounded on adversarial labels.
fn bounded_levenshtein(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().take(MAX_COMPARE_CHARS).collect();
    let b: Vec<char> = b.chars().take(MAX_COMPARE_CHARS).collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        let mut row_min = row[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let value = (prev + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev = row[j + 1];
            row[j + 1] = value;
            row_min = row_min.min(value);
        }
        if row_min > max {
            return None;
        }
    }

    let distance = row[b.len()];
    (distance <= max).then_some(distance)
}
