//! Fuzzy entity resolution against a [`Catalog`].
//!
//! Resolution runs in two passes:
//!
//! 1. **Pre-filter**: every catalog key is normalized and scored against the
//!    normalized query with the configured [`Scorer`]. Keys at or above
//!    `prefilter_threshold` become candidates.
//! 2. **Acceptance**: each candidate is re-scored with token-set similarity
//!    against the raw (rewritten, un-normalized) query. The best candidate is
//!    `Matched` if it clears `acceptance_threshold`; otherwise up to
//!    [`MAX_SUGGESTIONS`] candidates are returned as suggestions.
//!
//! A key whose normalized form equals the normalized query scores 100 in both
//! passes and wins over every other candidate, so spacing, hyphenation, case
//! and clock suffixes never prevent an otherwise exact match. Ties between
//! non-identical candidates keep catalog order.
//!
//! Keys that normalize to the empty string never reach the resolver:
//! [`Catalog::from_entries`] drops them.

use std::borrow::Cow;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogEntry, EntryDetail};
use crate::error::{ConfigError, ConfigResult};
use crate::normalize::{NormalizeOptions, normalize_with};
use crate::similarity::{Score, simple_ratio, token_set_ratio};

/// Upper bound on suggestions returned for a near miss.
pub const MAX_SUGGESTIONS: usize = 6;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Similarity used by the pre-filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Order-independent token overlap. Suits model names.
    TokenSet,
    /// Whole-string ratio over alphanumerics. Catches title abbreviations.
    Simple,
}

/// A regex rewrite applied to the query before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRewrite {
    pub pattern: String,
    pub replacement: String,
}

/// Per-bot resolver tuning. Catalog noise differs per source, so none of
/// these are hidden constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub prefilter: Scorer,
    pub prefilter_threshold: Score,
    pub acceptance_threshold: Score,
    /// `score >= threshold` when true, `score > threshold` when false.
    pub inclusive_acceptance: bool,
    pub strip_clock_speed: bool,
    pub rewrites: Vec<QueryRewrite>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefilter: Scorer::TokenSet,
            prefilter_threshold: 50,
            acceptance_threshold: 85,
            inclusive_acceptance: true,
            strip_clock_speed: true,
            rewrites: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("prefilter_threshold", self.prefilter_threshold),
            ("acceptance_threshold", self.acceptance_threshold),
        ] {
            if value > 100 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be in 0..=100, got {value}"),
                });
            }
        }
        if !self.inclusive_acceptance && self.acceptance_threshold >= 100 {
            return Err(ConfigError::Invalid {
                message: "exclusive acceptance at 100 can never match; lower the threshold \
                          or set inclusive_acceptance = true"
                    .into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A candidate that cleared the pre-filter, with its acceptance-pass score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub entry: CatalogEntry,
    pub score: Score,
}

/// Outcome of resolving one query. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single accepted entity. `detail` is filled in by the responder after
    /// probing the entity's detail page.
    Matched {
        entry: CatalogEntry,
        score: Score,
        detail: Option<EntryDetail>,
    },
    /// Near misses, best first, at most [`MAX_SUGGESTIONS`].
    Suggestions(Vec<Suggestion>),
    NoMatch,
}

impl Resolution {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Stateless resolver: a pure function of query, catalog and configuration.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    config: ResolverConfig,
    rewrites: Vec<(Regex, String)>,
}

impl EntityResolver {
    /// Validate the configuration and compile its rewrites.
    pub fn new(config: ResolverConfig) -> ConfigResult<Self> {
        config.validate()?;
        let rewrites = config
            .rewrites
            .iter()
            .map(|rw| {
                Regex::new(&rw.pattern)
                    .map(|re| (re, rw.replacement.clone()))
                    .map_err(|e| ConfigError::Invalid {
                        message: format!("bad rewrite pattern {:?}: {e}", rw.pattern),
                    })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self { config, rewrites })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `query` against `catalog`.
    pub fn resolve(&self, query: &str, catalog: &Catalog) -> Resolution {
        let query = query.trim();
        if query.is_empty() {
            return Resolution::NoMatch;
        }

        let query = self.rewrite(query);
        let options = NormalizeOptions {
            strip_clock_speed: self.config.strip_clock_speed,
        };
        let norm_query = normalize_with(&query, options);

        let mut candidates: Vec<Suggestion> = Vec::new();
        let mut first_identical: Option<usize> = None;
        for entry in catalog.iter() {
            let norm_key = normalize_with(&entry.name, options);
            let identical = !norm_key.is_empty() && norm_key == norm_query;

            let prefilter = if identical {
                100
            } else {
                match self.config.prefilter {
                    Scorer::TokenSet => token_set_ratio(&norm_key, &norm_query),
                    Scorer::Simple => simple_ratio(&norm_key, &norm_query),
                }
            };
            if prefilter < self.config.prefilter_threshold {
                continue;
            }

            let score = if identical {
                if first_identical.is_none() {
                    first_identical = Some(candidates.len());
                }
                100
            } else {
                token_set_ratio(&entry.name, &query)
            };
            candidates.push(Suggestion {
                entry: entry.clone(),
                score,
            });
        }

        if candidates.is_empty() {
            tracing::debug!(%query, "no candidates cleared the pre-filter");
            return Resolution::NoMatch;
        }

        // Strictly greater keeps the first-seen candidate on ties.
        let best = first_identical.unwrap_or_else(|| {
            let mut best = 0;
            for (i, candidate) in candidates.iter().enumerate() {
                if candidate.score > candidates[best].score {
                    best = i;
                }
            }
            best
        });

        if self.accepts(candidates[best].score) {
            let Suggestion { entry, score } = candidates.swap_remove(best);
            tracing::debug!(%query, matched = %entry.name, score, "query resolved");
            return Resolution::Matched {
                entry,
                score,
                detail: None,
            };
        }

        // Stable sort: equal scores stay in catalog order.
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(MAX_SUGGESTIONS);
        tracing::debug!(%query, suggestions = candidates.len(), "no direct match");
        Resolution::Suggestions(candidates)
    }

    fn accepts(&self, score: Score) -> bool {
        if self.config.inclusive_acceptance {
            score >= self.config.acceptance_threshold
        } else {
            score > self.config.acceptance_threshold
        }
    }

    fn rewrite<'q>(&self, query: &'q str) -> Cow<'q, str> {
        let mut out = Cow::Borrowed(query);
        for (re, replacement) in &self.rewrites {
            if let Cow::Owned(s) = re.replace_all(&out, replacement.as_str()) {
                out = Cow::Owned(s);
            }
        }
        out
    }
}
