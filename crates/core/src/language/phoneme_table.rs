//! Phoneme inventory: IPA-to-ARPABET mapping, articulatory features and
//! vowel/consonant classes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    /// IPA-to-ARPABET mapping for recognizer and dictionary output.
    static ref IPA_TO_ARPABET: HashMap<&'static str, &'static str> = {
        let pairs: &[(&str, &str)] = &[
            // Diphthongs
            ("aɪ", "AY"), ("aʊ", "AW"), ("eɪ", "EY"), ("oʊ", "OW"), ("əʊ", "OW"), ("ɔɪ", "OY"),
            // Vowels
            ("i", "IY"), ("ɪ", "IH"), ("e", "EY"), ("ɛ", "EH"), ("æ", "AE"),
            ("ɑ", "AA"), ("ɒ", "AA"), ("ɔ", "AO"), ("o", "OW"), ("ʊ", "UH"),
            ("u", "UW"), ("ə", "AH"), ("ɜ", "ER"), ("ɝ", "ER"), ("ɚ", "ER"),
            ("ɐ", "AH"), ("ʌ", "AH"), ("a", "AA"),
            // Stops
            ("p", "P"), ("b", "B"), ("t", "T"), ("d", "D"), ("k", "K"), ("g", "G"), ("ɡ", "G"),
            // Affricates
            ("tʃ", "CH"), ("t͡ʃ", "CH"), ("dʒ", "JH"), ("d͡ʒ", "JH"),
            // Nasals
            ("m", "M"), ("n", "N"), ("ŋ", "NG"), ("ɲ", "N"),
            // Fricatives
            ("f", "F"), ("v", "V"), ("θ", "TH"), ("ð", "DH"), ("s", "S"),
            ("z", "Z"), ("ʃ", "SH"), ("ʒ", "ZH"), ("h", "HH"), ("ɦ", "HH"),
            // Liquids
            ("l", "L"), ("ɫ", "L"), ("r", "R"), ("ɹ", "R"), ("ɾ", "R"),
            // Glides
            ("j", "Y"), ("w", "W"),
        ];
        pairs.iter().copied().collect()
    };

    /// Articulatory features for each ARPABET phoneme.
    static ref FEATURES: HashMap<&'static str, &'static [&'static str]> = {
        let mut m = HashMap::new();
        // Consonants: [type, manner, place, voicing]
        m.insert("P",  &["consonant", "stop", "bilabial", "voiceless"][..]);
        m.insert("B",  &["consonant", "stop", "bilabial", "voiced"][..]);
        m.insert("T",  &["consonant", "stop", "alveolar", "voiceless"][..]);
        m.insert("D",  &["consonant", "stop", "alveolar", "voiced"][..]);
        m.insert("K",  &["consonant", "stop", "velar", "voiceless"][..]);
        m.insert("G",  &["consonant", "stop", "velar", "voiced"][..]);
        m.insert("F",  &["consonant", "fricative", "labiodental", "voiceless"][..]);
        m.insert("V",  &["consonant", "fricative", "labiodental", "voiced"][..]);
        m.insert("TH", &["consonant", "fricative", "dental", "voiceless"][..]);
        m.insert("DH", &["consonant", "fricative", "dental", "voiced"][..]);
        m.insert("S",  &["consonant", "fricative", "alveolar", "voiceless"][..]);
        m.insert("Z",  &["consonant", "fricative", "alveolar", "voiced"][..]);
        m.insert("SH", &["consonant", "fricative", "postalveolar", "voiceless"][..]);
        m.insert("ZH", &["consonant", "fricative", "postalveolar", "voiced"][..]);
        m.insert("HH", &["consonant", "fricative", "glottal", "voiceless"][..]);
        m.insert("CH", &["consonant", "affricate", "postalveolar", "voiceless"][..]);
        m.insert("JH", &["consonant", "affricate", "postalveolar", "voiced"][..]);
        m.insert("M",  &["consonant", "nasal", "bilabial", "voiced"][..]);
        m.insert("N",  &["consonant", "nasal", "alveolar", "voiced"][..]);
        m.insert("NG", &["consonant", "nasal", "velar", "voiced"][..]);
        m.insert("L",  &["consonant", "liquid", "alveolar", "voiced"][..]);
        m.insert("R",  &["consonant", "liquid", "postalveolar", "voiced"][..]);
        m.insert("W",  &["consonant", "glide", "bilabial", "voiced"][..]);
        m.insert("Y",  &["consonant", "glide", "palatal", "voiced"][..]);
        // Vowels: [type, height, backness, roundness, tenseness]
        m.insert("IY", &["vowel", "high", "front", "unrounded", "tense"][..]);
        m.insert("IH", &["vowel", "high", "front", "unrounded", "lax"][..]);
        m.insert("EY", &["vowel", "mid", "front", "unrounded", "tense"][..]);
        m.insert("EH", &["vowel", "mid", "front", "unrounded", "lax"][..]);
        m.insert("AE", &["vowel", "low", "front", "unrounded", "lax"][..]);
        m.insert("AA", &["vowel", "low", "back", "unrounded", "tense"][..]);
        m.insert("AH", &["vowel", "mid", "central", "unrounded", "lax"][..]);
        m.insert("AO", &["vowel", "mid", "back", "rounded", "tense"][..]);
        m.insert("OW", &["vowel", "mid", "back", "rounded", "tense"][..]);
        m.insert("UH", &["vowel", "high", "back", "rounded", "lax"][..]);
        m.insert("UW", &["vowel", "high", "back", "rounded", "tense"][..]);
        m.insert("AW", &["vowel", "low", "central", "unrounded", "tense"][..]);
        m.insert("AY", &["vowel", "low", "central", "unrounded", "tense"][..]);
        m.insert("OY", &["vowel", "mid", "back", "rounded", "tense"][..]);
        m.insert("ER", &["vowel", "mid", "central", "rounded", "tense"][..]);
        m
    };
}

/// Coarse phoneme class used by the substitution cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonemeClass {
    Vowel,
    Consonant,
    /// Not in the inventory (including the unknown-word placeholder)
    Unknown,
}

/// Strip trailing stress marker (0, 1, 2) from an ARPABET phoneme.
pub fn strip_stress(phoneme: &str) -> &str {
    phoneme.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// True for uppercase ASCII symbols such as "AE" or "NG".
pub fn is_arpabet(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_uppercase())
}

/// Map a symbol to its ARPABET base form, passing unknown symbols through.
///
/// Stress digits, IPA stress marks, length marks and aspiration are dropped.
pub fn canonical_symbol(symbol: &str) -> String {
    let base = strip_stress(symbol);
    if is_arpabet(base) {
        return base.to_string();
    }

    let cleaned: String = symbol
        .chars()
        .filter(|c| !matches!(c, 'ˈ' | 'ˌ' | 'ː' | 'ˑ' | 'ʰ' | '\u{0329}'))
        .collect();

    match IPA_TO_ARPABET.get(cleaned.as_str()) {
        Some(arpabet) => arpabet.to_string(),
        None => cleaned,
    }
}

/// Articulatory features of a symbol, if it is in the inventory.
pub fn features(symbol: &str) -> Option<&'static [&'static str]> {
    let key = canonical_symbol(symbol);
    FEATURES.get(key.as_str()).copied()
}

pub fn class_of(symbol: &str) -> PhonemeClass {
    match features(symbol).map(|f| f[0]) {
        Some("vowel") => PhonemeClass::Vowel,
        Some(_) => PhonemeClass::Consonant,
        None => PhonemeClass::Unknown,
    }
}

pub fn is_vowel(symbol: &str) -> bool {
    class_of(symbol) == PhonemeClass::Vowel
}

/// Human-readable articulatory description, e.g. "voiceless dental fricative".
pub fn describe(symbol: &str) -> Option<String> {
    let f = features(symbol)?;
    if f[0] == "vowel" {
        Some(format!("{} {} {} vowel", f[1], f[2], f[3]))
    } else {
        Some(format!("{} {} {}", f[3], f[2], f[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_stress() {
        assert_eq!(strip_stress("AE1"), "AE");
        assert_eq!(strip_stress("K"), "K");
        assert_eq!(strip_stress("IY0"), "IY");
    }

    #[test]
    fn test_canonical_ipa_vowel() {
        assert_eq!(canonical_symbol("æ"), "AE");
        assert_eq!(canonical_symbol("ɪ"), "IH");
        assert_eq!(canonical_symbol("iː"), "IY");
    }

    #[test]
    fn test_canonical_ipa_consonant() {
        assert_eq!(canonical_symbol("k"), "K");
        assert_eq!(canonical_symbol("kʰ"), "K");
        assert_eq!(canonical_symbol("ʃ"), "SH");
        assert_eq!(canonical_symbol("ɡ"), "G");
        assert_eq!(canonical_symbol("tʃ"), "CH");
    }

    #[test]
    fn test_canonical_diphthong() {
        assert_eq!(canonical_symbol("aɪ"), "AY");
        assert_eq!(canonical_symbol("oʊ"), "OW");
    }

    #[test]
    fn test_canonical_already_arpabet() {
        assert_eq!(canonical_symbol("AE1"), "AE");
        assert_eq!(canonical_symbol("NG"), "NG");
    }

    #[test]
    fn test_canonical_unknown_passthrough() {
        assert_eq!(canonical_symbol("?"), "?");
        assert_eq!(canonical_symbol("ʘ"), "ʘ");
    }

    #[test]
    fn test_class_of() {
        assert_eq!(class_of("AE1"), PhonemeClass::Vowel);
        assert_eq!(class_of("ɛ"), PhonemeClass::Vowel);
        assert_eq!(class_of("K"), PhonemeClass::Consonant);
        assert_eq!(class_of("θ"), PhonemeClass::Consonant);
        assert_eq!(class_of("?"), PhonemeClass::Unknown);
    }

    #[test]
    fn test_is_vowel() {
        assert!(is_vowel("ER"));
        assert!(is_vowel("IY0"));
        assert!(!is_vowel("TH"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("TH").as_deref(), Some("voiceless dental fricative"));
        assert_eq!(describe("ɪ").as_deref(), Some("high front unrounded vowel"));
        assert!(describe("?").is_none());
    }
}
