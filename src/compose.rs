//! Reply composition: resolution results rendered as forum markdown.
//!
//! Composition is pure. The same query and [`Resolution`] always render the
//! same text, and every outcome renders something, so a summoned bot never
//! stays silent.

use serde::{Deserialize, Serialize};

use crate::catalog::{EntryDetail, GameReport};
use crate::error::{ConfigError, ConfigResult};
use crate::resolve::{MAX_SUGGESTIONS, Resolution, Suggestion};

/// Joins the per-term segments of one invocation.
pub const REPLY_SEPARATOR: &str = "\n\n---\n\n";

// ── Tiers ───────────────────────────────────────────────────────────────

/// One step of a tier table: metrics at or above `min` earn `label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub min: i64,
    pub label: String,
}

impl Tier {
    pub fn new(min: i64, label: impl Into<String>) -> Self {
        Self {
            min,
            label: label.into(),
        }
    }
}

/// A step function from metric to label, sorted ascending by `min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tier>", into = "Vec<Tier>")]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Build a table. Order of `tiers` does not matter; it must not be empty.
    pub fn new(mut tiers: Vec<Tier>) -> ConfigResult<Self> {
        if tiers.is_empty() {
            return Err(ConfigError::Invalid {
                message: "tier table must have at least one tier".into(),
            });
        }
        tiers.sort_by_key(|t| t.min);
        Ok(Self { tiers })
    }

    /// Label of the greatest tier whose `min` is at or below `metric`.
    ///
    /// Metrics below every tier (PassMark reports unrated parts as `-1`)
    /// fall into the lowest tier.
    pub fn classify(&self, metric: i64) -> &str {
        let reached = self.tiers.partition_point(|t| t.min <= metric);
        let index = reached.saturating_sub(1);
        &self.tiers[index].label
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

impl TryFrom<Vec<Tier>> for TierTable {
    type Error = ConfigError;

    fn try_from(tiers: Vec<Tier>) -> ConfigResult<Self> {
        Self::new(tiers)
    }
}

impl From<TierTable> for Vec<Tier> {
    fn from(table: TierTable) -> Self {
        table.tiers
    }
}

// ── Templates ───────────────────────────────────────────────────────────

/// The wording that differs between bots. Everything structural (bold
/// wrappers, link syntax, suggestion layout) is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTemplate {
    /// What the bot looks up, for the apology: "CPU", "GPU", "game".
    pub noun: String,
    /// Bold label in front of the metric link, e.g. "CPU STR".
    pub metric_label: String,
    /// Link text after the metric value, e.g. "CPU Benchmark Page".
    pub page_label: String,
    /// Describes the suggestion list: "potential matches", "wiki results".
    pub results_label: String,
    /// What the user should retry with: "models", "game names".
    pub retry_noun: String,
    /// Link text for the catalog source in apologies and suggestions.
    pub source_label: String,
    /// Link target for the catalog source.
    pub source_url: String,
    /// Printed under every metric reply, e.g. the minimum requirements.
    pub requirements: Option<String>,
}

impl Default for ReplyTemplate {
    fn default() -> Self {
        Self {
            noun: "item".into(),
            metric_label: "Score".into(),
            page_label: "Details Page".into(),
            results_label: "potential matches".into(),
            retry_noun: "names".into(),
            source_label: "source list".into(),
            source_url: String::new(),
            requirements: None,
        }
    }
}

// ── Composer ────────────────────────────────────────────────────────────

/// Renders resolutions for one bot.
#[derive(Debug, Clone)]
pub struct Composer {
    template: ReplyTemplate,
    tiers: Option<TierTable>,
    /// Example invocation, shown in the suggestion footer.
    usage: String,
}

impl Composer {
    pub fn new(template: ReplyTemplate, tiers: Option<TierTable>, usage: impl Into<String>) -> Self {
        Self {
            template,
            tiers,
            usage: usage.into(),
        }
    }

    pub fn template(&self) -> &ReplyTemplate {
        &self.template
    }

    pub fn tiers(&self) -> Option<&TierTable> {
        self.tiers.as_ref()
    }

    /// Render the reply segment for `query`.
    pub fn compose(&self, query: &str, result: &Resolution) -> String {
        match result {
            Resolution::Matched { entry, detail, .. } => match detail {
                Some(EntryDetail::Metric(metric)) => {
                    self.render_metric(&entry.name, &entry.reference, *metric)
                }
                Some(EntryDetail::Compatibility(report)) => {
                    render_game_report(&entry.name, &entry.reference, report)
                }
                None => format!("### [{}]({})", entry.name, entry.reference),
            },
            Resolution::Suggestions(candidates) => self.render_suggestions(query, candidates),
            Resolution::NoMatch => self.render_apology(query),
        }
    }

    fn render_metric(&self, name: &str, reference: &str, metric: i64) -> String {
        let t = &self.template;
        let mut out = format!(
            "### **{name}**\n\n**{}:** [{metric} ({})]({reference})",
            t.metric_label, t.page_label
        );
        if let Some(tiers) = &self.tiers {
            out.push_str(&format!("\n\n**Performance:** {}", tiers.classify(metric)));
        }
        if let Some(requirements) = &t.requirements {
            out.push_str(&format!("\n\n{requirements}"));
        }
        out
    }

    fn render_suggestions(&self, query: &str, candidates: &[Suggestion]) -> String {
        let t = &self.template;
        let shown = &candidates[..candidates.len().min(MAX_SUGGESTIONS)];
        if shown.is_empty() {
            return self.render_apology(query);
        }

        let mut out = format!(
            "No direct match found for **{query}**, displaying {} {}:\n\n",
            shown.len(),
            t.results_label
        );
        for s in shown {
            out.push_str(&format!("[{}]({})\n\n", s.entry.name, s.entry.reference));
        }
        out.push_str(&format!(
            "Feel free to ask me again (`{}`) with these {} or visit [{}]({}) directly!",
            self.usage, t.retry_noun, t.source_label, t.source_url
        ));
        out
    }

    fn render_apology(&self, query: &str) -> String {
        let t = &self.template;
        format!(
            "I'm sorry, I couldn't find any information on **{query}**.\n\n\
             Please feel free to try again; perhaps you had a spelling mistake, \
             or your {} does not exist in the [{}]({}).",
            t.noun, t.source_label, t.source_url
        )
    }
}

/// Reply for a summon phrase with nothing after it.
pub fn usage_reply(usage: &str) -> String {
    format!("I need a search term to work with! Please try `{usage}`")
}

// ── Compatibility reports ───────────────────────────────────────────────

fn render_game_report(name: &str, reference: &str, report: &GameReport) -> String {
    let mut out = format!("## [{name}]({reference})\n\n");
    match compatibility_table(report) {
        Some(table) => {
            out.push_str("#### **Compatibility table**\n\n");
            out.push_str(&table);
        }
        None => out.push_str("No compatibility information found"),
    }

    if report.active_issues.is_empty() && report.fixed_issues.is_empty() {
        out.push_str("\n\nNo active or fixed issues found.");
        return out;
    }
    for (heading, issues) in [
        ("Active issues", &report.active_issues),
        ("Fixed issues", &report.fixed_issues),
    ] {
        if issues.is_empty() {
            continue;
        }
        out.push_str(&format!("\n\n**{heading}:**\n\n"));
        for issue in issues {
            out.push_str(&format!("* {issue}\n"));
        }
    }
    out
}

/// Markdown table: one row per region, one column per OS. The header comes
/// from the first region's OS list, with a blank cell above the region names.
fn compatibility_table(report: &GameReport) -> Option<String> {
    let first = report.regions.first()?;

    let mut header = vec![" ".to_string()];
    header.extend(first.statuses.iter().map(|(os, _)| os.clone()));

    let mut out = table_row(&header);
    out.push_str(&table_row(&vec!["---".to_string(); header.len()]));
    for region in &report.regions {
        let mut row = vec![format!("**{}**", region.region)];
        row.extend(region.statuses.iter().map(|(_, state)| state.clone()));
        out.push_str(&table_row(&row));
    }
    Some(out)
}

fn table_row(cells: &[String]) -> String {
    format!("|{}|\n", cells.join("|"))
}
