pub mod detection;
pub mod engine;
pub mod heuristics;
pub mod machine_learning;
pub mod normalization;
pub mod policy;
pub mod url_parser;

pub use detection::brand_impersonation::{BrandDatabase, BrandDetectionResult, BrandDetector};
pub use detection::homograph::{HomographAnalyzer, HomographResult};
pub use detection::tld_risk::{TldRisk, TldScorer};
pub use detection::{BrandCategory, MatchType, Severity};
pub use engine::{PhishingEngine, RiskAssessment, Verdict};
pub use heuristics::{HeuristicResult, HeuristicsEngine};
pub use machine_learning::{MlEnsemble, MlScoringResult};
pub use normalization::{NormalizationResult, ObfuscationAttack, UrlNormalizer};
pub use policy::{BlockReason, OrgPolicy, PayloadType, PolicyConfig, PolicyResult};
pub use url_parser::{ParseError, Protocol, UrlComponents, UrlParser};
