//! Post-translation gate: does a new translation preserve the already
//! displayed prefix well enough to publish?

/// Default minimum fraction of the previously-published tokens that must
/// still prefix-match the new translation.
pub const DEFAULT_STABILITY_THRESHOLD: f64 = 0.6;

/// Tokenize by whitespace, walk from index 0 counting the longest common
/// prefix in equal tokens, and compare that against `threshold`.
///
/// `lastPublished` empty, or two tokens or fewer, is always stable
/// (nothing meaningful to flicker yet) with `ratio = 1.0`.
pub fn check_stability(last_published: &str, new_translation: &str, threshold: f64) -> (bool, f64) {
    let last_tokens: Vec<&str> = last_published.split_whitespace().collect();

    if last_tokens.is_empty() || last_tokens.len() <= 2 {
        return (true, 1.0);
    }

    let new_tokens: Vec<&str> = new_translation.split_whitespace().collect();
    let common = last_tokens
        .iter()
        .zip(new_tokens.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let ratio = common as f64 / last_tokens.len() as f64;
    (ratio >= threshold, ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_last_published_is_always_stable() {
        assert_eq!(check_stability("", "Bonjour le monde", 0.6), (true, 1.0));
    }

    #[test]
    fn short_last_published_is_always_stable() {
        // Two tokens or fewer never meaningfully flickers.
        assert_eq!(check_stability("it walks", "it crawls now", 0.6), (true, 1.0));
    }

    #[test]
    fn identical_text_is_fully_stable() {
        let (stable, ratio) = check_stability("it walks on a table", "it walks on a table", 0.6);
        assert!(stable);
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn extended_prefix_is_stable() {
        let (stable, ratio) = check_stability("it walks on a", "it walks on a table", 0.6);
        assert!(stable);
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn prefix_break_is_unstable() {
        // "it walks on a" vs "it works on an RTX card": only "it" matches -> 1/4.
        let (stable, ratio) = check_stability("it walks on a", "it works on an RTX card", 0.6);
        assert!(!stable);
        assert_eq!(ratio, 0.25);
    }

    #[test]
    fn completely_different_text_is_unstable() {
        let (stable, ratio) = check_stability("it walks on a table", "completely different sentence entirely now", 0.6);
        assert!(!stable);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        // 3 of 5 tokens match exactly -> ratio 0.6.
        let (stable, ratio) = check_stability("a b c d e", "a b c x y", 0.6);
        assert!(stable);
        assert_eq!(ratio, 0.6);
    }

    #[test]
    fn lower_threshold_accepts_more_drift() {
        let (stable, _) = check_stability("it walks on a", "it works on an RTX card", 0.1);
        assert!(stable);
    }

    #[test]
    fn shrinking_translation_that_is_a_strict_prefix_can_still_hold() {
        // New translation is shorter but shares only 2 of 5 tokens as a prefix.
        let (stable, ratio) = check_stability("it walks on a table now", "it walks", 0.6);
        assert!(!stable);
        assert_eq!(ratio, 2.0 / 5.0);
    }
}
