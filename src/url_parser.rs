use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

/// Per-section bounds applied before any downstream processing.
const MAX_PATH_CHARS: usize = 2_048;
const MAX_QUERY_CHARS: usize = 2_048;
const MAX_FRAGMENT_CHARS: usize = 512;
const MAX_SUBDOMAIN_DEPTH: usize = 10;

/// Two-part public suffixes the decomposition needs to know about so that
/// `amazon.co.uk` yields the right registrable domain. Not exhaustive;
/// covers the suffixes present in the brand database.
const TWO_PART_SUFFIXES: [&str; 7] = [
    "co.uk", "com.au", "co.jp", "com.br", "co.in", "co.nz", "com.mx",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Protocol::Https)
    }
}

/// Parse failures. Callers treat these as "cannot assess", never as a crash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("missing host")]
    MissingHost,
    #[error("unparsable URL")]
    Unparsable,
}

/// Registrable-domain decomposition of a parsed host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainParts {
    /// Effective suffix ("com", "co.uk"); empty for IP hosts.
    pub tld: String,
    /// SLD + suffix ("example.com"); the full host for IP literals.
    pub registrable_domain: String,
    /// Subdomain labels, leftmost first, capped at a fixed depth.
    pub subdomains: Vec<String>,
    pub is_ip_address: bool,
}

impl DomainParts {
    /// Second-level label without the suffix ("example" for example.com).
    pub fn sld(&self) -> &str {
        match self.registrable_domain.split_once('.') {
            Some((sld, _)) => sld,
            None => &self.registrable_domain,
        }
    }
}

/// Immutable components of one analyzed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlComponents {
    pub protocol: Protocol,
    /// Lowercased host.
    pub host: String,
    /// Explicit non-default port only.
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
    pub domain: DomainParts,
}

impl UrlComponents {
    pub fn subdomain_depth(&self) -> usize {
        self.domain.subdomains.len()
    }
}

/// Pure function from a bounded string to `UrlComponents` or a parse failure.
/// Only http/https are accepted. Scheme-less input gets one retry with an
/// implicit http prefix, matching the bare-host payloads QR codes carry.
pub struct UrlParser;

impl Default for UrlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, input: &str) -> Result<UrlComponents, ParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                // Bare "example.com/path" scan payload.
                Url::parse(&format!("http://{}", trimmed)).map_err(|_| ParseError::Unparsable)?
            }
            Err(_) => return Err(ParseError::Unparsable),
        };

        let protocol = match url.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            other => return Err(ParseError::UnsupportedScheme(other.to_string())),
        };

        let (host, is_ip) = match url.host() {
            Some(Host::Domain(domain)) => (domain.to_ascii_lowercase(), false),
            Some(Host::Ipv4(addr)) => (addr.to_string(), true),
            Some(Host::Ipv6(addr)) => (addr.to_string(), true),
            None => return Err(ParseError::MissingHost),
        };

        let domain = decompose_domain(&host, is_ip);

        Ok(UrlComponents {
            protocol,
            port: url.port(),
            path: truncate_chars(url.path(), MAX_PATH_CHARS),
            query: url.query().map(|q| truncate_chars(q, MAX_QUERY_CHARS)),
            fragment: url.fragment().map(|f| truncate_chars(f, MAX_FRAGMENT_CHARS)),
            host,
            domain,
        })
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn decompose_domain(host: &str, is_ip: bool) -> DomainParts {
    if is_ip {
        return DomainParts {
            tld: String::new(),
            registrable_domain: host.to_string(),
            subdomains: Vec::new(),
            is_ip_address: true,
        };
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return DomainParts {
            tld: String::new(),
            registrable_domain: host.to_string(),
            subdomains: Vec::new(),
            is_ip_address: false,
        };
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let suffix_len = if labels.len() >= 3 && TWO_PART_SUFFIXES.contains(&last_two.as_str()) {
        2
    } else {
        1
    };

    let tld = labels[labels.len() - suffix_len..].join(".");
    let registrable_start = labels.len().saturating_sub(suffix_len + 1);
    let registrable_domain = labels[registrable_start..].join(".");
    let subdomains: Vec<String> = labels[..registrable_start]
        .iter()
        .take(MAX_SUBDOMAIN_DEPTH)
        .map(|l| l.to_string())
        .collect();

    DomainParts {
        tld,
        registrable_domain,
        subdomains,
        is_ip_address: false,
    }
}
