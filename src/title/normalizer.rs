//! Title normalization for deduplication, search filtering, AniList
//! variation generation, and progressive query reduction (C3).
//!
//! Mirrors the teacher's transform-pipeline idiom (see
//! `modules::provider::domain::services::search_processor::title_normalizer`
//! in the reference tree) but applies the exact, ordered substitution table
//! the distilled algorithm specifies rather than a generic composable
//! pipeline — each of the four functions here has its own fixed contract.

use std::sync::OnceLock;

use regex::Regex;

/// Ordered substitution table applied by [`dedup_normalize`].
///
/// Order matters: `part`/`temporada` are rewritten to `season` before
/// parentheses and separators are stripped. Hyphens are folded in alongside
/// spaces — titles routinely use `-` and ` ` interchangeably as a word
/// separator (e.g. "Geiko-hen" / "Geiko hen"), and dedup must treat them the
/// same for that case to collapse. See DESIGN.md for the full rationale.
const DEDUP_TABLE: &[(&str, &str)] = &[
    ("clássico", ""),
    ("classico", ""),
    (":", ""),
    ("part", "season"),
    ("temporada", "season"),
    ("(", ""),
    (")", ""),
    ("-", ""),
    (" ", ""),
];

/// Dedup normalization: decides whether two scraper titles refer to the same
/// catalog entry. Seasons remain distinct anime; dub/sub/part markers that
/// survive this transform keep entries distinct too.
pub fn dedup_normalize(title: &str) -> String {
    let mut normalized = title.to_lowercase();
    for (from, to) in DEDUP_TABLE {
        normalized = normalized.replace(from, to);
    }
    normalized
}

/// Search-filter normalization: used when substring-filtering catalog
/// titles against a user-typed filter string.
pub fn search_filter_normalize(title: &str) -> String {
    let mut normalized = title.to_lowercase();
    for ch in ['-', ':', '(', ')', '!', '?', '.'] {
        normalized = normalized.replace(ch, " ");
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct SeasonPatterns {
    patterns: Vec<Regex>,
    non_alphanumeric: Regex,
}

fn season_patterns() -> &'static SeasonPatterns {
    static CELL: OnceLock<SeasonPatterns> = OnceLock::new();
    CELL.get_or_init(|| SeasonPatterns {
        patterns: [
            r"(?i)\s+season\s+\d+",
            r"(?i)\s+\d+(?:st|nd|rd|th)\s+season",
            r"(?i)\s+s\d+",
            r"(?i)\s+part\s+\d+",
            r"(?i)\s+cour\s+\d+",
            r"(?i)\s+arc\s+[^:]+",
            r"(?i)\s+final\s+season",
            r"(?i)\s+2nd\s+season",
            r"(?i)[:−-]\s*season\s+\d+",
            r"(?i)\s+dublado.*$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex is valid"))
        .collect(),
        non_alphanumeric: Regex::new(r"[^A-Za-z0-9\s]").expect("static regex is valid"),
    })
}

/// Generates the ordered, deduplicated set of title variations tried
/// against the catalog during progressive fallback.
///
/// Takes the romaji half of a `"Romaji / English"` title, strips trailing
/// season/part/cour/arc/dublado markers, keeps only alphanumerics and
/// spaces, then emits the full cleaned string followed by its 3-, 2-, and
/// 1-word prefixes (deduplicated, longest first).
pub fn generate_variations(title: &str) -> Vec<String> {
    let mut cleaned = match title.split_once(" / ") {
        Some((romaji, _english)) => romaji.to_string(),
        None => title.to_string(),
    };

    let patterns = season_patterns();
    for pattern in &patterns.patterns {
        cleaned = pattern.replace_all(&cleaned, "").to_string();
    }

    cleaned = patterns.non_alphanumeric.replace_all(&cleaned, " ").to_string();
    cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        return vec![title.trim().to_lowercase()];
    }
    cleaned = cleaned.to_lowercase();

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let mut variations = vec![cleaned.clone()];
    for prefix_len in [3usize, 2, 1] {
        if prefix_len <= words.len() {
            let variant = words[..prefix_len].join(" ");
            if !variations.contains(&variant) {
                variations.push(variant);
            }
        }
    }
    variations
}

/// Progressive query reduction: given a user query of `W` words and a
/// minimum word floor `M`, emits the prefixes of length `W, W-1, …, M` in
/// that order.
pub fn reduce_query(query: &str, min_words: usize) -> Vec<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let total = words.len();
    let floor = min_words.max(1).min(total.max(1));

    let mut out = Vec::new();
    let mut w = total;
    while w >= floor {
        out.push(words[..w].join(" "));
        if w == 0 {
            break;
        }
        w -= 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_collapses_colon_and_hyphen_variants() {
        let a = dedup_normalize("Kimetsu no Yaiba: Hashira Geiko-hen");
        let b = dedup_normalize("Kimetsu no Yaiba Hashira Geiko hen");
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_keeps_seasons_distinct() {
        let a = dedup_normalize("Foo");
        let b = dedup_normalize("Foo Season 2");
        assert_ne!(a, b);
    }

    #[test]
    fn dedup_maps_part_and_temporada_to_season() {
        assert_eq!(dedup_normalize("Foo Part 2"), dedup_normalize("Foo Season 2"));
        assert_eq!(
            dedup_normalize("Foo Temporada 2"),
            dedup_normalize("Foo Season 2")
        );
    }

    #[test]
    fn search_filter_normalize_collapses_punctuation_and_whitespace() {
        assert_eq!(
            search_filter_normalize("Re:Zero - Starting Life!"),
            "re zero   starting life"
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        );
    }

    #[test]
    fn variations_take_romaji_half() {
        let vs = generate_variations("Kimetsu no Yaiba: Hashira Geiko-hen / Demon Slayer: Hashira Training Arc");
        assert_eq!(vs[0], "kimetsu no yaiba hashira geiko hen");
    }

    #[test]
    fn variations_strip_season_markers() {
        let vs = generate_variations("Dandadan Season 2");
        assert!(vs.contains(&"dandadan".to_string()));
    }

    #[test]
    fn variations_emit_prefixes_longest_first() {
        let vs = generate_variations("One Piece Film Red");
        assert_eq!(vs[0], "one piece film red");
        assert!(vs.contains(&"one piece film".to_string()));
        assert!(vs.contains(&"one piece".to_string()));
        assert!(vs.contains(&"one".to_string()));
    }

    #[test]
    fn variations_dedup_short_titles() {
        let vs = generate_variations("Bleach");
        assert_eq!(vs, vec!["bleach".to_string()]);
    }

    #[test]
    fn reduce_query_emits_descending_prefixes() {
        let out = reduce_query("Spy x Family Season 2 Part 2", 1);
        assert_eq!(out[0], "Spy x Family Season 2 Part 2");
        assert_eq!(out[3], "Spy x Family");
        assert_eq!(out.last().unwrap(), "Spy");
    }

    #[test]
    fn reduce_query_respects_floor() {
        let out = reduce_query("a b c d", 2);
        assert_eq!(out, vec!["a b c d", "a b c", "a b"]);
    }

    #[test]
    fn reduce_query_single_word() {
        let out = reduce_query("Naruto", 1);
        assert_eq!(out, vec!["Naruto".to_string()]);
    }
}
