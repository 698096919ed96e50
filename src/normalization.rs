use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_script::{Script, UnicodeScript};

/// Maximum raw input length. Longer inputs are truncated, never rejected.
const MAX_INPUT_CHARS: usize = 10_000;
/// Iteration cap for percent decoding.
const MAX_DECODE_PASSES: usize = 3;
/// Cap on extracted nested URLs to bound work per input.
const MAX_NESTED_URLS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObfuscationAttack {
    MixedScripts,
    ZeroWidthCharacters,
    DoubleEncoding,
    NestedRedirects,
    RtlOverride,
    CombiningMarks,
    DecimalIp,
    HexIp,
    OctalIp,
    MixedIpNotation,
    PunycodeDomain,
}

impl ObfuscationAttack {
    /// Fixed per-attack risk contribution.
    pub fn weight(self) -> u32 {
        match self {
            ObfuscationAttack::MixedScripts => 15,
            ObfuscationAttack::ZeroWidthCharacters => 20,
            ObfuscationAttack::DoubleEncoding => 15,
            ObfuscationAttack::NestedRedirects => 15,
            ObfuscationAttack::RtlOverride => 20,
            ObfuscationAttack::CombiningMarks => 10,
            ObfuscationAttack::DecimalIp => 15,
            ObfuscationAttack::HexIp => 15,
            ObfuscationAttack::OctalIp => 15,
            ObfuscationAttack::MixedIpNotation => 20,
            ObfuscationAttack::PunycodeDomain => 10,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ObfuscationAttack::MixedScripts => "Mixed Unicode scripts in host label",
            ObfuscationAttack::ZeroWidthCharacters => "Zero-width characters",
            ObfuscationAttack::DoubleEncoding => "Double percent-encoding",
            ObfuscationAttack::NestedRedirects => "Nested redirect URLs in query",
            ObfuscationAttack::RtlOverride => "Right-to-left override character",
            ObfuscationAttack::CombiningMarks => "Combining diacritical marks",
            ObfuscationAttack::DecimalIp => "Decimal-encoded IP address",
            ObfuscationAttack::HexIp => "Hex-encoded IP address",
            ObfuscationAttack::OctalIp => "Octal-encoded IP address",
            ObfuscationAttack::MixedIpNotation => "Mixed-radix IP notation",
            ObfuscationAttack::PunycodeDomain => "Punycode (ACE) domain label",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationResult {
    pub normalized_url: String,
    pub has_obfuscation: bool,
    pub detected_attacks: Vec<ObfuscationAttack>,
    pub nested_urls: Vec<String>,
    pub risk_score: u32,
}

/// Radix classification for one dotted-IP component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpPartKind {
    Decimal,
    Hex,
    Octal,
}

lazy_static! {
    // Percent-encoded "://" inside a query value marks an encoded nested URL.
    static ref ENCODED_SCHEME: Regex = Regex::new(r"(?i)%3A%2F%2F").unwrap();
    // Substantial base64 run inside a data: payload.
    static ref BASE64_RUN: Regex = Regex::new(r"[A-Za-z0-9+/]{16,}={0,2}").unwrap();
}

const ZERO_WIDTH_CHARS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

fn is_bidi_control(ch: char) -> bool {
    matches!(
        ch,
        '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

fn is_combining_mark(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF
    )
}

/// Lexical URL cleanup ahead of parsing: decoding, invisible-character
/// stripping, IP-radix normalization and nested-redirect extraction.
///
/// Pure and bounded: the result is a deterministic function of the input
/// string, and every loop is capped. When nothing suspicious is found the
/// output is byte-identical to the whitespace-trimmed input.
pub struct UrlNormalizer;

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &str) -> NormalizationResult {
        let trimmed = truncate_chars(raw.trim(), MAX_INPUT_CHARS);
        let mut attacks: Vec<ObfuscationAttack> = Vec::new();

        // Working copy for detection: fully percent-decoded.
        let (decoded, decode_passes) = self.decode_percent(&trimmed);
        if decode_passes > 1 {
            push_attack(&mut attacks, ObfuscationAttack::DoubleEncoding);
        }

        // The emitted URL keeps single-layer encoding intact so that a clean
        // input round-trips unchanged; only double-encoded input is emitted
        // in decoded form.
        let mut normalized = if decode_passes > 1 {
            decoded.clone()
        } else {
            trimmed.clone()
        };

        if decoded.chars().any(|c| ZERO_WIDTH_CHARS.contains(&c)) {
            push_attack(&mut attacks, ObfuscationAttack::ZeroWidthCharacters);
        }
        if decoded.contains('\u{202E}') {
            push_attack(&mut attacks, ObfuscationAttack::RtlOverride);
        }
        if attacks.contains(&ObfuscationAttack::ZeroWidthCharacters)
            || attacks.contains(&ObfuscationAttack::RtlOverride)
        {
            normalized = strip_invisible(&normalized);
        }

        if decoded.chars().any(is_combining_mark) {
            push_attack(&mut attacks, ObfuscationAttack::CombiningMarks);
            normalized = strip_ascii_attached_marks(&normalized);
        }

        // Host-level checks run on the cleaned string.
        if let Some(host) = extract_host(&normalized) {
            if let Some((dotted, attack)) = self.normalize_ip_host(&host) {
                normalized = normalized.replacen(&host, &dotted, 1);
                push_attack(&mut attacks, attack);
            }
            if host_has_mixed_script_label(&host) {
                push_attack(&mut attacks, ObfuscationAttack::MixedScripts);
            }
            if host
                .split('.')
                .any(|label| label.to_ascii_lowercase().starts_with("xn--"))
            {
                push_attack(&mut attacks, ObfuscationAttack::PunycodeDomain);
            }
        }

        let nested_urls = self.extract_nested_urls(&decoded);
        if !nested_urls.is_empty() {
            push_attack(&mut attacks, ObfuscationAttack::NestedRedirects);
        }

        let risk_score = attacks.iter().map(|a| a.weight()).sum::<u32>().min(100);
        if !attacks.is_empty() {
            log::debug!(
                "normalizer flagged {} attack(s), score {}",
                attacks.len(),
                risk_score
            );
        }

        NormalizationResult {
            normalized_url: normalized,
            has_obfuscation: !attacks.is_empty(),
            detected_attacks: attacks,
            nested_urls,
            risk_score,
        }
    }

    /// Iterative percent decoding. Returns the decoded string and the number
    /// of passes that changed it.
    fn decode_percent(&self, input: &str) -> (String, usize) {
        let mut current = input.to_string();
        let mut changed_passes = 0;

        for _ in 0..MAX_DECODE_PASSES {
            if !current.contains('%') {
                break;
            }
            let decoded = percent_decode_str(&current).decode_utf8_lossy().to_string();
            if decoded == current {
                break;
            }
            current = decoded;
            changed_passes += 1;
        }

        (current, changed_passes)
    }

    /// Detect a non-standard IP-literal host and return its dotted-quad form
    /// together with the radix tag.
    fn normalize_ip_host(&self, host: &str) -> Option<(String, ObfuscationAttack)> {
        if host.starts_with('[') {
            return None; // bracketed IPv6, handled by the parser
        }

        let parts: Vec<&str> = host.split('.').collect();
        match parts.len() {
            1 => {
                let (value, kind) = parse_ip_part_u32(parts[0])?;
                let attack = match kind {
                    IpPartKind::Decimal => ObfuscationAttack::DecimalIp,
                    IpPartKind::Hex => ObfuscationAttack::HexIp,
                    IpPartKind::Octal => ObfuscationAttack::OctalIp,
                };
                Some((dotted_quad(value), attack))
            }
            4 => {
                let mut kinds = Vec::with_capacity(4);
                let mut octets = Vec::with_capacity(4);
                for part in &parts {
                    let (value, kind) = parse_ip_part_u8(part)?;
                    kinds.push(kind);
                    octets.push(value);
                }
                if kinds.iter().all(|k| *k == IpPartKind::Decimal) {
                    return None; // plain dotted quad, nothing to normalize
                }
                let attack = if kinds.iter().all(|k| *k == kinds[0]) {
                    match kinds[0] {
                        IpPartKind::Hex => ObfuscationAttack::HexIp,
                        IpPartKind::Octal => ObfuscationAttack::OctalIp,
                        IpPartKind::Decimal => unreachable!(),
                    }
                } else {
                    ObfuscationAttack::MixedIpNotation
                };
                Some((
                    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]),
                    attack,
                ))
            }
            _ => None,
        }
    }

    /// Scan query parameter values for embedded absolute URLs. Only values
    /// that actually parse as a URI scheme count; the word "redirect" alone
    /// does not.
    fn extract_nested_urls(&self, decoded: &str) -> Vec<String> {
        let mut nested = Vec::new();

        let query = match decoded.find('?') {
            Some(idx) => &decoded[idx + 1..],
            None => return nested,
        };

        for pair in query.split('&') {
            if nested.len() >= MAX_NESTED_URLS {
                break;
            }
            let value = match pair.split_once('=') {
                Some((_, v)) => v,
                None => continue,
            };

            let lower = value.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                nested.push(value.to_string());
            } else if lower.starts_with("javascript:") || lower.starts_with("data:") {
                nested.push(value.to_string());
                if let Some(url) = self.url_from_base64_payload(value) {
                    if nested.len() < MAX_NESTED_URLS {
                        nested.push(url);
                    }
                }
            } else if ENCODED_SCHEME.is_match(value) {
                let inner = percent_decode_str(value).decode_utf8_lossy().to_string();
                let inner_lower = inner.to_ascii_lowercase();
                if inner_lower.starts_with("http://") || inner_lower.starts_with("https://") {
                    nested.push(inner);
                }
            }
        }

        nested
    }

    /// Decode a substantial base64 run inside a data: payload and return any
    /// absolute URL it conceals.
    fn url_from_base64_payload(&self, value: &str) -> Option<String> {
        if !value.to_ascii_lowercase().starts_with("data:") {
            return None;
        }
        let run = BASE64_RUN.find(value)?;
        let bytes = general_purpose::STANDARD.decode(run.as_str()).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let idx = text.find("http://").or_else(|| text.find("https://"))?;
        let tail = &text[idx..];
        let end = tail
            .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
            .unwrap_or(tail.len());
        Some(tail[..end].to_string())
    }
}

fn push_attack(attacks: &mut Vec<ObfuscationAttack>, attack: ObfuscationAttack) {
    if !attacks.contains(&attack) {
        attacks.push(attack);
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn dotted_quad(value: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        (value >> 24) & 0xFF,
        (value >> 16) & 0xFF,
        (value >> 8) & 0xFF,
        value & 0xFF
    )
}

fn parse_ip_part_u32(part: &str) -> Option<(u32, IpPartKind)> {
    if let Some(hex) = part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return u32::from_str_radix(hex, 16).ok().map(|v| (v, IpPartKind::Hex));
        }
        return None;
    }
    if part.len() > 1 && part.starts_with('0') && part.chars().all(|c| ('0'..='7').contains(&c)) {
        return u32::from_str_radix(part, 8).ok().map(|v| (v, IpPartKind::Octal));
    }
    if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
        return part.parse::<u32>().ok().map(|v| (v, IpPartKind::Decimal));
    }
    None
}

fn parse_ip_part_u8(part: &str) -> Option<(u8, IpPartKind)> {
    let (value, kind) = parse_ip_part_u32(part)?;
    if value <= 255 {
        Some((value as u8, kind))
    } else {
        None
    }
}

fn strip_invisible(s: &str) -> String {
    s.chars()
        .filter(|c| !ZERO_WIDTH_CHARS.contains(c) && !is_bidi_control(*c))
        .collect()
}

/// Drop combining marks attached to ASCII base characters. Marks carried by
/// non-ASCII bases are meaning-bearing (legitimate diacritics) and kept.
fn strip_ascii_attached_marks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_ascii = false;
    for ch in s.chars() {
        if is_combining_mark(ch) && prev_ascii {
            continue;
        }
        if !is_combining_mark(ch) {
            prev_ascii = ch.is_ascii();
        }
        out.push(ch);
    }
    out
}

fn extract_host(url: &str) -> Option<String> {
    let after_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let authority_end = after_scheme
        .find(|c| c == '/' || c == '?' || c == '#')
        .unwrap_or(after_scheme.len());
    let authority = &after_scheme[..authority_end];
    // Userinfo trick: the real host follows the last '@'.
    let host_and_port = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };
    let host = if host_and_port.starts_with('[') {
        match host_and_port.find(']') {
            Some(idx) => &host_and_port[..=idx],
            None => host_and_port,
        }
    } else {
        match host_and_port.rfind(':') {
            Some(idx) if host_and_port[idx + 1..].chars().all(|c| c.is_ascii_digit()) => {
                &host_and_port[..idx]
            }
            _ => host_and_port,
        }
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// True when any single host label mixes two or more concrete scripts.
/// A label written entirely in one non-Latin script is legitimate and never
/// flagged here.
fn host_has_mixed_script_label(host: &str) -> bool {
    for label in host.split('.') {
        if label.is_ascii() {
            continue;
        }
        let mut seen: Vec<Script> = Vec::new();
        for ch in label.chars() {
            let script = ch.script();
            if script == Script::Common || script == Script::Inherited {
                continue;
            }
            if !seen.contains(&script) {
                seen.push(script);
            }
        }
        if seen.len() >= 2 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_url_untouched() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("  https://example.com/path?q=1  ");
        assert_eq!(result.normalized_url, "https://example.com/path?q=1");
        assert!(!result.has_obfuscation);
        assert!(result.detected_attacks.is_empty());
        assert_eq!(result.risk_score, 0);
    }

    #[test]
    fn test_zero_width_stripped_and_flagged() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://drop\u{200B}box.com");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::ZeroWidthCharacters));
        assert!(!result.normalized_url.contains('\u{200B}'));
        assert_eq!(result.normalized_url, "https://dropbox.com");
    }

    #[test]
    fn test_rtl_override_flagged() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://example.com/\u{202E}gpj.exe");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::RtlOverride));
        assert!(!result.normalized_url.contains('\u{202E}'));
    }

    #[test]
    fn test_double_encoding_detected() {
        let normalizer = UrlNormalizer::new();
        // %252F decodes to %2F, which decodes again to '/'.
        let result = normalizer.normalize("https://example.com/a%252Fb");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::DoubleEncoding));
    }

    #[test]
    fn test_single_encoding_is_not_an_attack() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://example.com/a%20b");
        assert!(!result
            .detected_attacks
            .contains(&ObfuscationAttack::DoubleEncoding));
        // Untouched: single-layer encoding is normal.
        assert_eq!(result.normalized_url, "https://example.com/a%20b");
    }

    #[test]
    fn test_decimal_ip_normalized() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("http://3232235777/admin");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::DecimalIp));
        assert!(result.normalized_url.contains("192.168.1.1"));
    }

    #[test]
    fn test_hex_ip_normalized() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("http://0xC0A80101/");
        assert!(result.detected_attacks.contains(&ObfuscationAttack::HexIp));
        assert!(result.normalized_url.contains("192.168.1.1"));
    }

    #[test]
    fn test_octal_ip_normalized() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("http://0300.0250.01.01/");
        assert!(result.detected_attacks.contains(&ObfuscationAttack::OctalIp));
        assert!(result.normalized_url.contains("192.168.1.1"));
    }

    #[test]
    fn test_mixed_ip_notation() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("http://0xC0.168.01.1/");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::MixedIpNotation));
        assert!(result.normalized_url.contains("192.168.1.1"));
    }

    #[test]
    fn test_plain_dotted_quad_untouched() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("http://192.168.1.1/");
        assert!(!result.has_obfuscation);
        assert_eq!(result.normalized_url, "http://192.168.1.1/");
    }

    #[test]
    fn test_nested_redirect_extraction() {
        let normalizer = UrlNormalizer::new();
        let result =
            normalizer.normalize("https://example.com/go?next=https://evil.example/login");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::NestedRedirects));
        assert_eq!(result.nested_urls, vec!["https://evil.example/login"]);
    }

    #[test]
    fn test_redirect_word_alone_not_extracted() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://example.com/page?mode=redirect");
        assert!(result.nested_urls.is_empty());
        assert!(!result
            .detected_attacks
            .contains(&ObfuscationAttack::NestedRedirects));
    }

    #[test]
    fn test_percent_encoded_nested_url() {
        let normalizer = UrlNormalizer::new();
        let result =
            normalizer.normalize("https://example.com/r?u=https%3A%2F%2Fevil.example%2Fx");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::NestedRedirects));
        assert!(!result.nested_urls.is_empty());
    }

    #[test]
    fn test_javascript_uri_extracted() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://example.com/go?u=javascript:alert(1)");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::NestedRedirects));
    }

    #[test]
    fn test_nested_url_cap() {
        let normalizer = UrlNormalizer::new();
        let query: Vec<String> = (0..10)
            .map(|i| format!("u{}=https://site{}.example/x", i, i))
            .collect();
        let url = format!("https://example.com/r?{}", query.join("&"));
        let result = normalizer.normalize(&url);
        assert_eq!(result.nested_urls.len(), MAX_NESTED_URLS);
    }

    #[test]
    fn test_mixed_script_label_flagged() {
        let normalizer = UrlNormalizer::new();
        // Latin "paypal" with a Cyrillic а inside one label.
        let result = normalizer.normalize("https://p\u{0430}ypal.com/login");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::MixedScripts));
    }

    #[test]
    fn test_single_script_host_not_flagged() {
        let normalizer = UrlNormalizer::new();
        // Entirely Cyrillic label: legitimate internationalized host.
        let result =
            normalizer.normalize("https://\u{043F}\u{0440}\u{0438}\u{0432}\u{0435}\u{0442}.com");
        assert!(!result
            .detected_attacks
            .contains(&ObfuscationAttack::MixedScripts));
    }

    #[test]
    fn test_punycode_label_flagged() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://xn--pypal-4ve.com/");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::PunycodeDomain));
    }

    #[test]
    fn test_combining_mark_after_ascii_stripped() {
        let normalizer = UrlNormalizer::new();
        let result = normalizer.normalize("https://a\u{0301}pple.com");
        assert!(result
            .detected_attacks
            .contains(&ObfuscationAttack::CombiningMarks));
        assert!(!result.normalized_url.contains('\u{0301}'));
    }

    #[test]
    fn test_oversized_input_truncated_not_rejected() {
        let normalizer = UrlNormalizer::new();
        let url = format!("https://example.com/{}", "a".repeat(20_000));
        let result = normalizer.normalize(&url);
        assert!(result.normalized_url.chars().count() <= MAX_INPUT_CHARS);
    }

    #[test]
    fn test_score_capped_at_100() {
        let normalizer = UrlNormalizer::new();
        let url = "http://0xC0.168.01.1/r\u{202E}\u{200B}?u=https%3A%2F%2Fevil.example%2Fx&n=https://e2.example/%252F";
        let result = normalizer.normalize(url);
        assert!(result.risk_score <= 100);
        assert!(result.has_obfuscation);
    }

    #[test]
    fn test_determinism() {
        let normalizer = UrlNormalizer::new();
        let url = "http://0xC0A80101/?next=https://evil.example/a%252Fb\u{200B}";
        let a = normalizer.normalize(url);
        let b = normalizer.normalize(url);
        assert_eq!(a.normalized_url, b.normalized_url);
        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.detected_attacks, b.detected_attacks);
    }
}
