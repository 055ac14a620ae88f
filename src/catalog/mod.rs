//! In-memory reference catalogs: canonical entity name → detail page.
//!
//! A [`Catalog`] is built once (usually by scraping a listing page through a
//! [`CatalogSource`]) and is read-only afterwards. Refreshing means building a
//! new value, never mutating one in place, so a catalog can be shared across
//! threads without locking.
//!
//! Iteration order is the order entries were first seen on the listing page;
//! the resolver relies on it for tie-breaking.

pub mod detail;
pub mod scrape;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatalogResult;
use crate::normalize::normalize;

pub use detail::{EntryDetail, GameReport, RegionStatus};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One catalog row: the canonical display name and its detail-page URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub reference: String,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable, insertion-ordered mapping from entity name to [`CatalogEntry`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from `(name, reference)` rows.
    ///
    /// Names are unique. A repeated name keeps its first position and takes
    /// the later reference, matching how a listing scrape overwrites rows.
    /// Rows whose name normalizes to nothing ("-", "@ 3.60GHz") are dropped.
    pub fn from_entries(rows: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut index = HashMap::new();
        for row in rows {
            if normalize(&row.name).is_empty() {
                tracing::debug!(name = %row.name, "skipping catalog row with an empty key");
                continue;
            }
            match index.get(&row.name) {
                Some(&pos) => entries[pos] = row,
                None => {
                    index.insert(row.name.clone(), entries.len());
                    entries.push(row);
                }
            }
        }
        Self { entries, index }
    }

    /// Look up an entry by its exact canonical name.
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Which upstream listing a catalog is scraped from.
///
/// The kind selects both the listing parser and the detail-page probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// PassMark CPU list; detail metric is the single-thread rating.
    PassmarkCpu,
    /// PassMark video card list; detail metric is the G3D mark.
    PassmarkGpu,
    /// PCSX2 wiki "Complete List of Games"; detail is a compatibility report.
    Pcsx2Wiki,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassmarkCpu => write!(f, "passmark-cpu"),
            Self::PassmarkGpu => write!(f, "passmark-gpu"),
            Self::Pcsx2Wiki => write!(f, "pcsx2-wiki"),
        }
    }
}

/// Anything that can produce a catalog. Called once at startup.
pub trait CatalogSource {
    fn fetch(&self) -> CatalogResult<Catalog>;
}
