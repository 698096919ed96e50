use serde::Serialize;
use std::collections::HashMap;
use unicode_script::{Script, UnicodeScript};

/// Fixed contribution for an ACE (`xn--`) label, independent of other findings.
const PUNYCODE_SCORE: u32 = 20;
/// Per confusable character.
const CONFUSABLE_CHAR_SCORE: u32 = 10;
/// Overall result cap.
const MAX_SCORE: u32 = 50;

/// One detected lookalike character, recorded with enough context for a
/// client to render a "safe display" explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusableChar {
    /// Character position within the analyzed host.
    pub position: usize,
    pub source_char: char,
    /// The ASCII letter this character imitates.
    pub lookalike: char,
    pub block_name: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomographResult {
    pub is_homograph: bool,
    /// Unicode form of the host when an ACE label was decoded.
    pub punycode: Option<String>,
    pub detected_characters: Vec<ConfusableChar>,
    pub score: u32,
}

impl HomographResult {
    fn clean() -> Self {
        Self {
            is_homograph: false,
            punycode: None,
            detected_characters: Vec::new(),
            score: 0,
        }
    }
}

/// Detects punycode labels and Unicode confusable characters in a host.
///
/// The confusable table maps Cyrillic and Greek homoglyphs to the Latin
/// letters they imitate. A host written entirely in one non-Latin script
/// that hits no table entry is left alone: legitimate internationalized
/// domains must not be flagged.
pub struct HomographAnalyzer {
    confusables: HashMap<char, (char, &'static str)>,
}

/// (source, latin lookalike, Unicode block name)
const CONFUSABLE_TABLE: [(char, char, &'static str); 26] = [
    // Cyrillic
    ('\u{0430}', 'a', "Cyrillic"), // а
    ('\u{0435}', 'e', "Cyrillic"), // е
    ('\u{043E}', 'o', "Cyrillic"), // о
    ('\u{0440}', 'p', "Cyrillic"), // р
    ('\u{0441}', 'c', "Cyrillic"), // с
    ('\u{0443}', 'y', "Cyrillic"), // у
    ('\u{0445}', 'x', "Cyrillic"), // х
    ('\u{0455}', 's', "Cyrillic"), // ѕ
    ('\u{0456}', 'i', "Cyrillic"), // і
    ('\u{0458}', 'j', "Cyrillic"), // ј
    ('\u{0475}', 'v', "Cyrillic"), // ѵ
    ('\u{04BB}', 'h', "Cyrillic"), // һ
    ('\u{0501}', 'd', "Cyrillic"), // ԁ
    ('\u{051B}', 'q', "Cyrillic"), // ԛ
    ('\u{051D}', 'w', "Cyrillic"), // ԝ
    ('\u{043C}', 'm', "Cyrillic"), // м
    ('\u{043A}', 'k', "Cyrillic"), // к
    // Greek
    ('\u{03B1}', 'a', "Greek"), // α
    ('\u{03B5}', 'e', "Greek"), // ε
    ('\u{03B9}', 'i', "Greek"), // ι
    ('\u{03BA}', 'k', "Greek"), // κ
    ('\u{03BD}', 'v', "Greek"), // ν
    ('\u{03BF}', 'o', "Greek"), // ο
    ('\u{03C1}', 'p', "Greek"), // ρ
    ('\u{03C5}', 'u', "Greek"), // υ
    ('\u{03C4}', 't', "Greek"), // τ
];

impl Default for HomographAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl HomographAnalyzer {
    pub fn new() -> Self {
        let mut confusables = HashMap::new();
        for (source, latin, block) in CONFUSABLE_TABLE {
            confusables.insert(source, (latin, block));
        }
        Self { confusables }
    }

    pub fn analyze(&self, host: &str) -> HomographResult {
        if host.is_empty() {
            return HomographResult::clean();
        }

        let mut result = HomographResult::clean();
        let mut punycode_score = 0;

        let has_ace_label = host
            .split('.')
            .any(|label| label.to_ascii_lowercase().starts_with("xn--"));
        if has_ace_label {
            let (decoded, _errors) = idna::domain_to_unicode(host);
            log::debug!("decoded ACE host {} -> {}", host, decoded);
            result.punycode = Some(decoded);
            result.is_homograph = true;
            punycode_score = PUNYCODE_SCORE;
        }

        // Scan the Unicode form when one exists, otherwise the host as given.
        // Single-script exemption: a label written entirely in one non-Latin
        // script is a legitimate internationalized name and is not scanned;
        // only labels that mix Latin with another script can carry injected
        // lookalikes.
        let scan_target = result.punycode.clone().unwrap_or_else(|| host.to_string());
        let mut char_score = 0;
        let mut position = 0;
        for (index, label) in scan_target.split('.').enumerate() {
            if index > 0 {
                position += 1; // the dot
            }
            if label_mixes_latin(label) {
                for (offset, ch) in label.chars().enumerate() {
                    if let Some(&(lookalike, block_name)) = self.confusables.get(&ch) {
                        result.detected_characters.push(ConfusableChar {
                            position: position + offset,
                            source_char: ch,
                            lookalike,
                            block_name,
                        });
                        char_score += CONFUSABLE_CHAR_SCORE;
                    }
                }
            }
            position += label.chars().count();
        }

        if !result.detected_characters.is_empty() {
            result.is_homograph = true;
        }
        result.score = (punycode_score + char_score.min(MAX_SCORE)).min(MAX_SCORE);
        result
    }

    /// Fold every confusable character to its Latin lookalike. Used by the
    /// brand detector to catch skeleton matches ("p\u{0430}ypal" -> "paypal").
    pub fn fold_confusables(&self, input: &str) -> String {
        input
            .chars()
            .map(|ch| match self.confusables.get(&ch) {
                Some(&(latin, _)) => latin,
                None => ch,
            })
            .collect()
    }
}

/// True when a label contains Latin letters alongside at least one character
/// from another concrete script.
fn label_mixes_latin(label: &str) -> bool {
    if label.is_ascii() {
        return false;
    }
    let mut has_latin = false;
    let mut has_other = false;
    for ch in label.chars() {
        match ch.script() {
            Script::Latin => has_latin = true,
            Script::Common | Script::Inherited => {}
            _ => has_other = true,
        }
    }
    has_latin && has_other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_host_clean() {
        let analyzer = HomographAnalyzer::new();
        let result = analyzer.analyze("paypal.com");
        assert!(!result.is_homograph);
        assert_eq!(result.score, 0);
        assert!(result.detected_characters.is_empty());
    }

    #[test]
    fn test_cyrillic_a_detected_at_position() {
        let analyzer = HomographAnalyzer::new();
        // "pаypal.com" with Cyrillic а at position 1.
        let result = analyzer.analyze("p\u{0430}ypal.com");
        assert!(result.is_homograph);
        assert_eq!(result.detected_characters.len(), 1);
        let detected = &result.detected_characters[0];
        assert_eq!(detected.position, 1);
        assert_eq!(detected.source_char, '\u{0430}');
        assert_eq!(detected.lookalike, 'a');
        assert_eq!(detected.block_name, "Cyrillic");
    }

    #[test]
    fn test_punycode_label_decoded_and_scored() {
        let analyzer = HomographAnalyzer::new();
        // xn--pypal-4ve decodes to pаypal (Cyrillic а).
        let result = analyzer.analyze("xn--pypal-4ve.com");
        assert!(result.is_homograph);
        assert!(result.punycode.is_some());
        assert!(result.score >= PUNYCODE_SCORE);
    }

    #[test]
    fn test_score_capped_at_50() {
        let analyzer = HomographAnalyzer::new();
        // Ten confusables in a Latin-mixed label would be 100 uncapped.
        let host: String = "x\u{0430}".repeat(10);
        let result = analyzer.analyze(&format!("{}.com", host));
        assert_eq!(result.detected_characters.len(), 10);
        assert_eq!(result.score, 50);
    }

    #[test]
    fn test_greek_omicron_detected() {
        let analyzer = HomographAnalyzer::new();
        let result = analyzer.analyze("g\u{03BF}ogle.com");
        assert!(result.is_homograph);
        assert_eq!(result.detected_characters[0].block_name, "Greek");
        assert_eq!(result.detected_characters[0].lookalike, 'o');
    }

    #[test]
    fn test_fold_confusables() {
        let analyzer = HomographAnalyzer::new();
        assert_eq!(analyzer.fold_confusables("p\u{0430}yp\u{0430}l"), "paypal");
        assert_eq!(analyzer.fold_confusables("plain"), "plain");
    }

    #[test]
    fn test_fully_cyrillic_label_exempt() {
        let analyzer = HomographAnalyzer::new();
        // Legitimate Russian host: contains table characters but no Latin
        // mixing, so nothing is flagged.
        let result = analyzer.analyze("\u{043F}\u{0440}\u{0438}\u{0432}\u{0435}\u{0442}.com");
        assert!(!result.is_homograph);
        assert_eq!(result.score, 0);
        assert!(result.detected_characters.is_empty());
    }

    #[test]
    fn test_empty_host() {
        let analyzer = HomographAnalyzer::new();
        let result = analyzer.analyze("");
        assert!(!result.is_homograph);
        assert_eq!(result.score, 0);
    }
}
