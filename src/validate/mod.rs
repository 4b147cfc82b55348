//! Institution whitelist validation
//!
//! Fuzzy-matches an OCR'd institution candidate against a closed whitelist.
//! Tiers, in order: exact substring containment on cleaned text, bounded
//! Levenshtein distance, then a fallback keyword escape hatch for the most
//! common institution family. Failure degrades the field, never the run.

use tracing::debug;

use crate::config::ValidatorConfig;

/// Strip non-alphanumeric characters and uppercase, the comparison form
/// for both OCR text and whitelist entries.
pub fn clean(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Classic single-cost edit distance.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Match an OCR'd institution string against the whitelist.
///
/// Returns the matched whitelist entry in its original form, or `None`
/// when every tier fails.
pub fn validate_institution(text: &str, cfg: &ValidatorConfig) -> Option<String> {
    let cleaned = clean(text);
    if cleaned.is_empty() {
        return None;
    }

    // Tier 1: exact substring containment
    for entry in &cfg.whitelist {
        let entry_clean = clean(entry);
        if !entry_clean.is_empty() && cleaned.contains(&entry_clean) {
            debug!("institution matched by containment: {:?}", entry);
            return Some(entry.clone());
        }
    }

    // Tier 2: bounded edit distance, minimum wins
    let mut best: Option<(&String, usize)> = None;
    for entry in &cfg.whitelist {
        let entry_clean = clean(entry);
        if entry_clean.is_empty() {
            continue;
        }
        let dist = edit_distance(&cleaned, &entry_clean);
        let budget = (cfg.tolerance * entry_clean.chars().count() as f32) as usize;
        if dist <= budget && best.map_or(true, |(_, d)| dist < d) {
            best = Some((entry, dist));
        }
    }
    if let Some((entry, dist)) = best {
        debug!("institution matched by edit distance {}: {:?}", dist, entry);
        return Some(entry.clone());
    }

    // Tier 3: keyword escape hatch for the dominant institution family
    let keyword = clean(&cfg.fallback_keyword);
    if !keyword.is_empty() && cleaned.contains(&keyword) {
        debug!("institution matched by fallback keyword");
        return Some(cfg.fallback_entry.clone());
    }

    debug!("institution candidate {:?} failed all tiers", text);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ValidatorConfig {
        ValidatorConfig::default()
    }

    #[test]
    fn test_clean_strips_and_uppercases() {
        assert_eq!(clean("Saveetha School, of Engg."), "SAVEETHASCHOOLOFENGG");
        assert_eq!(clean("  "), "");
    }

    #[test]
    fn test_edit_distance_properties() {
        let samples = ["KITTEN", "SITTING", "", "SAVEETHA", "SAVEETHB"];

        for a in samples {
            for b in samples {
                // Symmetry
                assert_eq!(edit_distance(a, b), edit_distance(b, a));
                // Zero iff equal
                assert_eq!(edit_distance(a, b) == 0, a == b);
                // Triangle inequality
                for c in samples {
                    assert!(
                        edit_distance(a, c) <= edit_distance(a, b) + edit_distance(b, c)
                    );
                }
            }
        }
    }

    #[test]
    fn test_substring_tier() {
        let result = validate_institution("XX SAVEETHA SCHOOL OF ENGINEERING YY", &cfg());
        assert_eq!(result.as_deref(), Some("SAVEETHA SCHOOL OF ENGINEERING"));
    }

    #[test]
    fn test_levenshtein_tier_on_digit_confusions() {
        // Digit/letter confusions rule out the substring tier; the five
        // substitutions sit well inside the 40% budget of the 27-char entry.
        let result = validate_institution("5AVEETHA 5CH00L 0F ENGINEERING", &cfg());
        assert_eq!(result.as_deref(), Some("SAVEETHA SCHOOL OF ENGINEERING"));
    }

    #[test]
    fn test_levenshtein_tier_picks_minimum_distance() {
        let cfg = ValidatorConfig {
            whitelist: vec!["ABCDEFGHIJ".into(), "ABCDEFGHXX".into()],
            tolerance: 0.4,
            fallback_keyword: "ZZZ".into(),
            fallback_entry: "ABCDEFGHIJ".into(),
        };
        // Distance 1 to the first entry, 3 to the second
        let result = validate_institution("ABCDEFGHIK", &cfg);
        assert_eq!(result.as_deref(), Some("ABCDEFGHIJ"));
    }

    #[test]
    fn test_fallback_keyword_tier() {
        // Far from every entry, but carries the family keyword
        let result = validate_institution("SAVEETHA", &cfg());
        assert_eq!(result.as_deref(), Some("SAVEETHA SCHOOL OF ENGINEERING"));
    }

    #[test]
    fn test_no_match_returns_none() {
        assert!(validate_institution("COMPLETELY DIFFERENT", &cfg()).is_none());
        assert!(validate_institution("", &cfg()).is_none());
        assert!(validate_institution("...", &cfg()).is_none());
    }
}
