//! Pre-translation gate: detect new sentence boundaries to bypass debouncing.
//!
//! No lightweight Unicode sentence-boundary-analysis crate exists in this
//! stack, so supported languages get a rule-based segmenter (punctuation
//! lookahead with an abbreviation/decimal guard) instead of a full ML
//! segmenter — same rule-based spirit as the reference's pySBD, minus the
//! model. Unsupported languages fall back to the plain punctuation regex
//! spec'd for all languages.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;

/// Languages with a rule-based segmenter. Everything else (including
/// `mt`/`ga`, which are in the 24 EU target languages but not here) uses
/// the punctuation-regex fallback.
pub const SEGMENTER_LANGUAGES: &[&str] = &[
    "en", "fr", "de", "es", "it", "pt", "nl", "pl", "ro", "cs", "da", "sv", "fi", "el", "hu",
    "bg", "hr", "sk", "sl", "et", "lv", "lt",
];

static FALLBACK_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?;]\s").unwrap());

/// Common cross-language abbreviations that must not be treated as a
/// sentence-ending period. Kept small and shared rather than a large
/// per-language dictionary — good enough to avoid the obvious false
/// splits without pretending to be a full NLP model.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs", "etc", "inc", "ltd", "co", "no",
    "m", "mme", "mlle", "sr", "sra", "dott", "ing", "usw", "bzw", "z.b",
];

/// A cached, process-lifetime rule-based sentence segmenter for one
/// language code.
pub struct Segmenter {
    lang: String,
}

impl Segmenter {
    fn new(lang: &str) -> Self {
        Self { lang: lang.to_string() }
    }

    /// Split `text` into sentence-like segments. The last segment is the
    /// current, possibly-incomplete sentence.
    pub fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let _ = &self.lang; // reserved for future per-language tuning
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut start = 0usize;
        let chars: Vec<(usize, char)> = text.char_indices().collect();

        for (idx, (byte_pos, c)) in chars.iter().enumerate() {
            if !matches!(c, '.' | '!' | '?') {
                continue;
            }
            let end = byte_pos + c.len_utf8();

            // Don't split mid-number ("3.14").
            let prev_is_digit = idx > 0 && chars[idx - 1].1.is_ascii_digit();
            let next_is_digit = chars
                .get(idx + 1)
                .map(|(_, c)| c.is_ascii_digit())
                .unwrap_or(false);
            if *c == '.' && prev_is_digit && next_is_digit {
                continue;
            }

            // Must be followed by whitespace or end-of-text to count as a boundary.
            let followed_by_space_or_eof = chars
                .get(idx + 1)
                .map(|(_, c)| c.is_whitespace())
                .unwrap_or(true);
            if !followed_by_space_or_eof {
                continue;
            }

            // Don't split right after a known abbreviation token.
            if *c == '.' && self.ends_with_abbreviation(&text[start..end]) {
                continue;
            }

            segments.push(text[start..end].trim_end());
            start = end;
            // Skip over the content range already consumed for next segment start.
            let _ = bytes;
        }

        let remainder = text[start..].trim();
        if !remainder.is_empty() || segments.is_empty() {
            segments.push(text[start..].trim_end_matches(|c: char| c.is_whitespace()));
        }

        segments
    }

    fn ends_with_abbreviation(&self, fragment: &str) -> bool {
        let trimmed = fragment.trim_end_matches('.').trim();
        let last_word = trimmed.rsplit(|c: char| c.is_whitespace()).next().unwrap_or("");
        let lowered = last_word.to_lowercase();
        ABBREVIATIONS.contains(&lowered.as_str())
    }
}

static SEGMENTERS: Lazy<Mutex<HashMap<String, std::sync::Arc<Segmenter>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Reduce a BCP-47 code to its primary subtag (e.g. `"fr-FR"` -> `"fr"`).
fn primary_subtag(lang: &str) -> &str {
    lang.split('-').next().unwrap_or(lang)
}

/// Get a cached segmenter for `lang`, or `None` if unsupported.
pub fn get_segmenter(lang: Option<&str>) -> Option<std::sync::Arc<Segmenter>> {
    let lang = lang?;
    let short = primary_subtag(lang);
    if !SEGMENTER_LANGUAGES.contains(&short) {
        return None;
    }
    let mut cache = SEGMENTERS.lock();
    if let Some(seg) = cache.get(short) {
        return Some(seg.clone());
    }
    let seg = std::sync::Arc::new(Segmenter::new(short));
    cache.insert(short.to_string(), seg.clone());
    Some(seg)
}

/// Count complete sentences in `text`. The last (possibly incomplete)
/// segment is not counted on the segmenter path; the regex fallback
/// count itself is the answer.
pub fn count_complete_sentences(text: &str, lang: Option<&str>) -> usize {
    if let Some(segmenter) = get_segmenter(lang) {
        let sentences = segmenter.segment(text);
        sentences.len().saturating_sub(1)
    } else {
        FALLBACK_BOUNDARY_RE.find_iter(text).count()
    }
}

/// Check whether a new complete sentence appeared since `prev_count`.
/// Returns `(has_new_boundary, current_count)`.
pub fn has_new_sentence(text: &str, lang: Option<&str>, prev_count: usize) -> (bool, usize) {
    let current = count_complete_sentences(text, lang);
    (current > prev_count, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_language_returns_segmenter() {
        assert!(get_segmenter(Some("fr")).is_some());
    }

    #[test]
    fn bcp47_code_extracts_short() {
        assert!(get_segmenter(Some("fr-FR")).is_some());
    }

    #[test]
    fn unsupported_language_returns_none() {
        assert!(get_segmenter(Some("mt")).is_none());
        assert!(get_segmenter(Some("ga")).is_none());
    }

    #[test]
    fn caching_returns_same_instance() {
        let a = get_segmenter(Some("en")).unwrap();
        let b = get_segmenter(Some("en")).unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn french_single_complete_sentence() {
        let text = "Bonjour le monde. Comment";
        assert!(count_complete_sentences(text, Some("fr")) >= 1);
    }

    #[test]
    fn french_no_complete_sentence() {
        let text = "Bonjour le monde";
        assert_eq!(count_complete_sentences(text, Some("fr")), 0);
    }

    #[test]
    fn english_two_sentences() {
        let text = "Hello world. How are you? I am fine";
        assert!(count_complete_sentences(text, Some("en")) >= 2);
    }

    #[test]
    fn english_incomplete() {
        assert_eq!(count_complete_sentences("Hello world", Some("en")), 0);
    }

    #[test]
    fn german_sentence_boundary() {
        assert!(count_complete_sentences("Hallo Welt. Wie geht es", Some("de")) >= 1);
    }

    #[test]
    fn unsupported_language_punctuation_fallback() {
        let text = "Kif inti. Tajjeb? Sewwa";
        assert!(count_complete_sentences(text, Some("mt")) >= 1);
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert_eq!(count_complete_sentences("", Some("en")), 0);
    }

    #[test]
    fn no_lang_falls_back_to_regex() {
        assert_eq!(count_complete_sentences("Hello. World", None), 1);
    }

    #[test]
    fn no_new_boundary() {
        let (has_new, count) = has_new_sentence("Hello world", Some("en"), 0);
        assert!(!has_new);
        assert_eq!(count, 0);
    }

    #[test]
    fn new_boundary_detected() {
        let (has_new, count) = has_new_sentence("Hello world. How are you", Some("en"), 0);
        assert!(has_new);
        assert!(count >= 1);
    }

    #[test]
    fn same_count_means_no_new_boundary() {
        let (has_new, _) = has_new_sentence("Hello world. How are you", Some("en"), 1);
        assert!(!has_new);
    }

    #[test]
    fn incremental_growth_eventually_detects_boundary() {
        let (_, count1) = has_new_sentence("Bonjour", Some("fr"), 0);
        assert_eq!(count1, 0);
        let (_, count2) = has_new_sentence("Bonjour le monde", Some("fr"), count1);
        assert_eq!(count2, 0);
        let (has_new, count3) = has_new_sentence("Bonjour le monde. Comment", Some("fr"), count2);
        assert!(has_new);
        assert!(count3 >= 1);
    }

    #[test]
    fn abbreviation_is_not_a_boundary() {
        // "Dr." should not split — the sentence is not actually complete yet.
        let text = "Dr. Smith arrived";
        assert_eq!(count_complete_sentences(text, Some("en")), 0);
    }

    #[test]
    fn decimal_number_is_not_a_boundary() {
        let text = "The value is 3.14 exactly";
        assert_eq!(count_complete_sentences(text, Some("en")), 0);
    }
}
