//! Pre-translation gate: skip a partial if the source text barely changed.

/// Default RapidFuzz-equivalent similarity threshold (0-100 scale).
pub const DEFAULT_THRESHOLD: f64 = 85.0;
/// Default minimum new characters required to force a translation.
pub const DEFAULT_MIN_CHARS: usize = 10;

/// Returns `true` if the partial should be skipped (not enough change).
///
/// Skips only when BOTH hold:
/// - `similarity(last_source, new_source) > threshold`
/// - `len(new_source) - len(last_source) < min_chars`
///
/// The first partial for a triple always passes (`last_source` empty).
pub fn should_skip(last_source: &str, new_source: &str, threshold: f64, min_chars: usize) -> bool {
    if last_source.is_empty() {
        return false;
    }

    let similarity = strsim::normalized_levenshtein(last_source, new_source) * 100.0;
    let chars_added = new_source.chars().count() as i64 - last_source.chars().count() as i64;

    similarity > threshold && chars_added < min_chars as i64
}
