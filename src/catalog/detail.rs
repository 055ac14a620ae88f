//! Detail-page probes: the per-entity data a reply needs beyond name and link.
//!
//! PassMark pages yield a single numeric metric that the composer classifies
//! against a tier table. PCSX2 wiki pages yield a compatibility report.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::SourceKind;
use super::scrape::{element_text, fetch_page};
use crate::error::{CatalogError, CatalogResult};

/// Data scraped from a matched entity's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryDetail {
    /// Benchmark score (single-thread rating, G3D mark).
    Metric(i64),
    /// Per-region emulator compatibility plus known issues.
    Compatibility(GameReport),
}

/// Compatibility status of one game region across operating systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStatus {
    /// Region code, e.g. "NTSC-U".
    pub region: String,
    /// `(os, state)` pairs in page order; state is "N/A" when unrated.
    pub statuses: Vec<(String, String)>,
}

/// Everything the wiki reply renders for a game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameReport {
    pub regions: Vec<RegionStatus>,
    pub active_issues: Vec<String>,
    pub fixed_issues: Vec<String>,
}

impl SourceKind {
    /// Fetch and parse the detail page at `reference`.
    pub fn fetch_detail(self, reference: &str) -> CatalogResult<EntryDetail> {
        let html = fetch_page(reference)?;
        self.parse_detail(&html, reference)
    }

    /// Parse an already-fetched detail page.
    pub fn parse_detail(self, html: &str, url: &str) -> CatalogResult<EntryDetail> {
        let document = Html::parse_document(html);
        match self {
            Self::PassmarkCpu => parse_single_thread_rating(&document, url).map(EntryDetail::Metric),
            Self::PassmarkGpu => parse_g3d_mark(&document, url).map(EntryDetail::Metric),
            Self::Pcsx2Wiki => Ok(EntryDetail::Compatibility(parse_game_report(&document))),
        }
    }
}

// ---------------------------------------------------------------------------
// PassMark
// ---------------------------------------------------------------------------

fn detail_pane<'a>(document: &'a Html, url: &str) -> CatalogResult<ElementRef<'a>> {
    let pane = Selector::parse("div.right-desc").expect("static selector must parse");
    document
        .select(&pane)
        .next()
        .ok_or_else(|| CatalogError::Layout {
            url: url.into(),
            message: "no div.right-desc".into(),
        })
}

/// CPU pages: `<strong>Single Thread Rating:</strong> 2345<br>`. The rating is
/// the text node right after the first `<strong>`.
fn parse_single_thread_rating(document: &Html, url: &str) -> CatalogResult<i64> {
    let pane = detail_pane(document, url)?;
    let strong = Selector::parse("strong").expect("static selector must parse");
    let text = pane
        .select(&strong)
        .next()
        .and_then(|el| el.next_sibling())
        .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
        .unwrap_or_default();
    parse_metric(&text).ok_or_else(|| CatalogError::Layout {
        url: url.into(),
        message: format!("no single thread rating in {text:?}"),
    })
}

/// GPU pages: the G3D mark is the second `<span>` in the pane.
fn parse_g3d_mark(document: &Html, url: &str) -> CatalogResult<i64> {
    let pane = detail_pane(document, url)?;
    let span = Selector::parse("span").expect("static selector must parse");
    let text = pane.select(&span).nth(1).map(element_text).unwrap_or_default();
    parse_metric(&text).ok_or_else(|| CatalogError::Layout {
        url: url.into(),
        message: format!("no G3D mark in {text:?}"),
    })
}

/// Digits of a score like " 2,345 " or "12345*". Leading `-` is honoured.
pub fn parse_metric(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let negative = trimmed.starts_with('-');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

// ---------------------------------------------------------------------------
// PCSX2 wiki
// ---------------------------------------------------------------------------

/// Compatibility tables have a `<th>Region NTSC-U:</th>` header per region and
/// `<td>Windows Status:</td><td><b>Playable</b></td>` rows below it. Issues
/// live under the "Known Issues" heading as a title element followed by a
/// `<ul>` whose first item reads "Status: Active" or "Status: Fixed".
fn parse_game_report(document: &Html) -> GameReport {
    GameReport {
        regions: parse_regions(document),
        ..parse_issues(document)
    }
}

fn parse_regions(document: &Html) -> Vec<RegionStatus> {
    let th = Selector::parse("th").expect("static selector must parse");
    let td = Selector::parse("td").expect("static selector must parse");
    let bold = Selector::parse("b").expect("static selector must parse");

    let mut regions = Vec::new();
    for header in document.select(&th) {
        let text = element_text(header);
        let Some(region) = text
            .strip_prefix("Region")
            .and_then(|rest| rest.strip_suffix(':'))
            .map(str::trim)
        else {
            continue;
        };

        let Some(body) = header
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tbody")
        else {
            continue;
        };

        let mut statuses = Vec::new();
        for cell in body.select(&td) {
            let label = element_text(cell);
            let Some(os) = label.strip_suffix("Status:") else {
                continue;
            };
            let state = cell
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "td")
                .and_then(|value| value.select(&bold).next())
                .map(element_text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "N/A".to_string());
            statuses.push((os.trim().to_string(), state));
        }

        regions.push(RegionStatus {
            region: region.to_string(),
            statuses,
        });
    }
    regions
}

fn parse_issues(document: &Html) -> GameReport {
    let anchor = Selector::parse("span#Known_Issues").expect("static selector must parse");
    let li = Selector::parse("li").expect("static selector must parse");

    let mut report = GameReport::default();
    let Some(heading) = document
        .select(&anchor)
        .next()
        .and_then(|span| span.parent())
        .and_then(ElementRef::wrap)
    else {
        return report;
    };

    let mut previous: Option<ElementRef<'_>> = None;
    for el in heading.next_siblings().filter_map(ElementRef::wrap) {
        let name = el.value().name();
        if name == "h2" {
            break;
        }
        if name == "ul" {
            let status = el.select(&li).next().map(element_text).unwrap_or_default();
            let title = previous.map(element_text).unwrap_or_default();
            match status.as_str() {
                "Status: Active" if !title.is_empty() => report.active_issues.push(title),
                "Status: Fixed" if !title.is_empty() => report.fixed_issues.push(title),
                _ => {}
            }
        }
        previous = Some(el);
    }
    report
}
