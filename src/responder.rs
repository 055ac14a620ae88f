//! Bot variants behind one interface.
//!
//! Every bot answers a term with a reply segment. Catalog bots (CPU, GPU,
//! wiki) differ only in their catalog, resolver thresholds, tier table and
//! wording, so they share [`CatalogResponder`]. The helper bot is a fixed
//! keyword table.

use std::collections::BTreeMap;

use crate::catalog::{Catalog, CatalogEntry, EntryDetail, SourceKind};
use crate::compose::Composer;
use crate::config::{CatalogBotConfig, HelpBotConfig};
use crate::error::{CatalogResult, ConfigResult, TransportResult};
use crate::resolve::{EntityResolver, Resolution};

/// One rendered reply segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub body: String,
    /// The segment quotes a benchmark rating, so the rating disclaimer
    /// applies to the whole reply.
    pub rated: bool,
}

/// A bot reachable through a summon phrase.
pub trait Responder {
    fn phrase(&self) -> &str;

    /// Example invocation, quoted when the phrase has no argument.
    fn usage(&self) -> &str;

    /// Reply segment for one term.
    fn respond(&self, term: &str) -> TransportResult<Segment>;

    /// Appended once per reply when any segment is `rated`.
    fn appendix(&self) -> Option<&str> {
        None
    }
}

// ── Detail probes ───────────────────────────────────────────────────────

/// Looks up the detail of a matched entry.
pub trait DetailProbe {
    fn probe(&self, entry: &CatalogEntry) -> CatalogResult<EntryDetail>;
}

impl DetailProbe for SourceKind {
    fn probe(&self, entry: &CatalogEntry) -> CatalogResult<EntryDetail> {
        self.fetch_detail(&entry.reference)
    }
}

// ── CatalogResponder ────────────────────────────────────────────────────

/// Resolve, probe, compose.
pub struct CatalogResponder {
    name: String,
    phrase: String,
    usage: String,
    catalog: Catalog,
    resolver: EntityResolver,
    composer: Composer,
    probe: Box<dyn DetailProbe>,
    appendix: Option<String>,
}

impl CatalogResponder {
    pub fn new(
        name: impl Into<String>,
        phrase: impl Into<String>,
        usage: impl Into<String>,
        catalog: Catalog,
        resolver: EntityResolver,
        composer: Composer,
        probe: Box<dyn DetailProbe>,
    ) -> Self {
        Self {
            name: name.into(),
            phrase: phrase.into(),
            usage: usage.into(),
            catalog,
            resolver,
            composer,
            probe,
            appendix: None,
        }
    }

    /// Build from configuration, probing detail pages over HTTP.
    pub fn from_config(config: &CatalogBotConfig, catalog: Catalog) -> ConfigResult<Self> {
        let resolver = EntityResolver::new(config.resolver.clone())?;
        let composer = Composer::new(config.reply.clone(), config.tiers.clone(), &config.usage);
        let responder = Self::new(
            &config.name,
            &config.phrase,
            &config.usage,
            catalog,
            resolver,
            composer,
            Box::new(config.source),
        );
        Ok(match &config.appendix {
            Some(text) => responder.with_appendix(text),
            None => responder,
        })
    }

    pub fn with_appendix(mut self, appendix: impl Into<String>) -> Self {
        self.appendix = Some(appendix.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve `term` and, on a match, attach the entry's detail.
    pub fn resolve(&self, term: &str) -> TransportResult<Resolution> {
        let (entry, score) = match self.resolver.resolve(term, &self.catalog) {
            Resolution::Matched { entry, score, .. } => (entry, score),
            other => {
                tracing::info!(bot = %self.name, query = term, "no direct match");
                return Ok(other);
            }
        };
        tracing::info!(bot = %self.name, query = term, matched = %entry.name, score, "match found");
        let detail = self.probe.probe(&entry)?;
        Ok(Resolution::Matched {
            entry,
            score,
            detail: Some(detail),
        })
    }

    pub fn compose(&self, term: &str, resolution: &Resolution) -> String {
        self.composer.compose(term, resolution)
    }
}

impl Responder for CatalogResponder {
    fn phrase(&self) -> &str {
        &self.phrase
    }

    fn usage(&self) -> &str {
        &self.usage
    }

    fn respond(&self, term: &str) -> TransportResult<Segment> {
        let resolution = self.resolve(term)?;
        let rated = matches!(
            resolution,
            Resolution::Matched {
                detail: Some(EntryDetail::Metric(_)),
                ..
            }
        );
        Ok(Segment {
            body: self.compose(term, &resolution),
            rated,
        })
    }

    fn appendix(&self) -> Option<&str> {
        self.appendix.as_deref()
    }
}

// ── HelpResponder ───────────────────────────────────────────────────────

/// Fixed replies keyed by lower-cased keyword.
pub struct HelpResponder {
    phrase: String,
    usage: String,
    commands: BTreeMap<String, String>,
    fallback: String,
}

impl HelpResponder {
    /// `fallback` names the keyword answered for unknown input.
    pub fn new(
        phrase: impl Into<String>,
        usage: impl Into<String>,
        commands: BTreeMap<String, String>,
        fallback: impl Into<String>,
    ) -> Self {
        let commands = commands
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self {
            phrase: phrase.into(),
            usage: usage.into(),
            commands,
            fallback: fallback.into().trim().to_lowercase(),
        }
    }

    pub fn from_config(config: &HelpBotConfig) -> Self {
        Self::new(
            &config.phrase,
            &config.usage,
            config.commands.clone(),
            &config.fallback,
        )
    }

    fn keyword_list(&self) -> String {
        let keywords: Vec<String> = self
            .commands
            .keys()
            .map(|k| format!("`{} {k}`", self.phrase))
            .collect();
        format!("I respond to: {}", keywords.join(", "))
    }
}

impl Responder for HelpResponder {
    fn phrase(&self) -> &str {
        &self.phrase
    }

    fn usage(&self) -> &str {
        &self.usage
    }

    fn respond(&self, term: &str) -> TransportResult<Segment> {
        let key = term.trim().to_lowercase();
        let body = match self.commands.get(&key) {
            Some(text) => text.clone(),
            None => {
                tracing::debug!(keyword = %key, "unknown help keyword");
                self.commands
                    .get(&self.fallback)
                    .cloned()
                    .unwrap_or_else(|| self.keyword_list())
            }
        };
        Ok(Segment { body, rated: false })
    }
}
