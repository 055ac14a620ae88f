//! String similarity scores in `0..=100`.
//!
//! [`token_set_ratio`] is order- and duplicate-insensitive: both inputs are
//! split into token sets, and the shared tokens are compared against each
//! side's shared-plus-remaining tokens. A query that is a token subset of a
//! catalog name ("ryzen 5 3600" vs "AMD Ryzen 5 3600") scores 100.
//!
//! The underlying pairwise score is rapidfuzz's normalized indel similarity,
//! scaled and rounded to an integer percentage. A missing prefix ("i74790k" against
//! "intelcorei74790k") costs only its own length, not a full rewrite.

use std::collections::BTreeSet;

use rapidfuzz::fuzz;

/// Similarity score, `0..=100`.
pub type Score = u8;

/// Pairwise similarity of two already-processed strings.
///
/// Either side empty scores 0.
pub fn ratio(a: &str, b: &str) -> Score {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(fuzz::ratio(a.chars(), b.chars()))
}

/// Ratio over lower-cased alphanumerics only; all other characters are dropped.
///
/// Used where token boundaries carry no meaning, e.g. game titles with
/// arbitrary punctuation ("Ratchet & Clank: Up Your Arsenal").
pub fn simple_ratio(a: &str, b: &str) -> Score {
    ratio(&squash(a), &squash(b))
}

/// Token-set similarity: order-independent, duplicate-insensitive.
pub fn token_set_ratio(a: &str, b: &str) -> Score {
    let pa = full_process(a);
    let pb = full_process(b);
    if pa.is_empty() || pb.is_empty() {
        return 0;
    }

    let ta: BTreeSet<&str> = pa.split_whitespace().collect();
    let tb: BTreeSet<&str> = pb.split_whitespace().collect();

    let sect = join(ta.intersection(&tb).copied());
    let diff_ab = join(ta.difference(&tb).copied());
    let diff_ba = join(tb.difference(&ta).copied());

    let combined_ab = join_pair(&sect, &diff_ab);
    let combined_ba = join_pair(&sect, &diff_ba);

    ratio(&sect, &combined_ab)
        .max(ratio(&sect, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

/// Lower-case, replace every non-alphanumeric character with a space, trim.
pub fn full_process(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.to_lowercase().trim().to_string()
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn join<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.collect::<Vec<_>>().join(" ")
}

fn join_pair(left: &str, right: &str) -> String {
    format!("{left} {right}").trim().to_string()
}

fn to_score(similarity: f64) -> Score {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as Score
}
