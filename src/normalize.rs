//! Canonical comparison form for catalog keys and user queries.
//!
//! Normalization strips a trailing clock-speed suffix ("@ 3.60GHz"), folds
//! case, and removes the two separators users type inconsistently (space and
//! hyphen). All other punctuation survives: model suffixes such as "i7-4790K"
//! versus "i7 4790" are distinguished by what remains.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Trailing frequency suffix: `@ 3.60GHz`, ` 4.2 ghz`, `@3500MHz`, ` 3.5`.
///
/// A bare trailing integer is never stripped: "Ryzen 5 3600" keeps its model
/// number. An integer only counts as a frequency when preceded by `@` or
/// followed by a unit.
static RE_CLOCK_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\s*@\s*\d+(?:\.\d+)?\s*(?:[gm]hz)?|\s*\d+\.\d{1,2}\s*(?:[gm]hz)?|\s*\d+\s*[gm]hz)\s*$",
    )
    .unwrap()
});

/// Options controlling [`normalize_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Remove a trailing clock-speed suffix before folding.
    pub strip_clock_speed: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_clock_speed: true,
        }
    }
}

/// Normalize with the default (CPU-style) options.
pub fn normalize(input: &str) -> String {
    normalize_with(input, NormalizeOptions::default())
}

/// Normalize `input` into its comparable form. Never fails; empty in, empty out.
pub fn normalize_with(input: &str, options: NormalizeOptions) -> String {
    // Full-width and compatibility forms ("ＲＴＸ") fold to their ASCII shapes.
    let folded: String = input.nfkc().collect();
    let trimmed = if options.strip_clock_speed {
        strip_clock_speed(&folded)
    } else {
        folded.as_str()
    };
    trimmed
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect()
}

/// Return `input` without its trailing clock-speed suffix, if any.
pub fn strip_clock_speed(input: &str) -> &str {
    match RE_CLOCK_SUFFIX.find(input) {
        Some(m) => &input[..m.start()],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_at_frequency_suffix() {
        assert_eq!(normalize("Intel Core i7-4790K @ 4.00GHz"), "intelcorei74790k");
        assert_eq!(normalize("Intel Core i5-2500 @3.30GHz"), "intelcorei52500");
    }

    #[test]
    fn strips_unitless_decimal_suffix() {
        assert_eq!(normalize("Athlon II X2 250 3.0"), "athloniix2250");
    }

    #[test]
    fn keeps_bare_model_numbers() {
        assert_eq!(normalize("Ryzen 5 3600"), "ryzen53600");
        assert_eq!(normalize("GeForce GTX 1080"), "geforcegtx1080");
    }

    #[test]
    fn removes_only_space_and_hyphen() {
        assert_eq!(normalize("Core i7-8700K (ES)"), "corei78700k(es)");
        assert_eq!(normalize("Radeon RX 5700 XT/5700"), "radeonrx5700xt/5700");
    }

    #[test]
    fn folds_compatibility_forms() {
        assert_eq!(normalize("ＲＴＸ 3080"), "rtx3080");
    }

    #[test]
    fn game_titles_keep_decimals_when_not_stripping() {
        let opts = NormalizeOptions {
            strip_clock_speed: false,
        };
        assert_eq!(normalize_with("Kingdom Hearts 2.5", opts), "kingdomhearts2.5");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  - "), "");
    }
}
