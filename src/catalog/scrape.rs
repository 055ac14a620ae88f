//! Listing-page scrapers that populate catalogs.
//!
//! Parsing is split from fetching: `parse_listing` is a pure HTML → `Catalog`
//! function (tested against inline fixtures), while [`HttpListing`] wraps it
//! with a `ureq` GET.

use std::io::Read;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use super::{Catalog, CatalogEntry, CatalogSource, SourceKind};
use crate::error::{CatalogError, CatalogResult};

/// Listing and detail pages are slow; PassMark's CPU list is several MB.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("pcsx2-helper-bot/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// GET `url` and return the body as text.
pub fn fetch_page(url: &str) -> CatalogResult<String> {
    let agent = ureq::AgentBuilder::new()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build();

    let response = agent.get(url).call().map_err(|e| CatalogError::Fetch {
        url: url.into(),
        message: e.to_string(),
    })?;

    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|e| CatalogError::Fetch {
            url: url.into(),
            message: format!("read body: {e}"),
        })?;
    Ok(body)
}

/// A catalog scraped from a listing page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpListing {
    pub kind: SourceKind,
    pub url: String,
}

impl HttpListing {
    pub fn new(kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

impl CatalogSource for HttpListing {
    fn fetch(&self) -> CatalogResult<Catalog> {
        tracing::info!(source = %self.kind, url = %self.url, "fetching catalog listing");
        let html = fetch_page(&self.url)?;
        let catalog = parse_listing(self.kind, &html, &self.url)?;
        tracing::info!(source = %self.kind, entries = catalog.len(), "catalog built");
        Ok(catalog)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a listing page of the given kind. `page_url` anchors relative links.
pub fn parse_listing(kind: SourceKind, html: &str, page_url: &str) -> CatalogResult<Catalog> {
    let document = Html::parse_document(html);
    let catalog = match kind {
        SourceKind::PassmarkCpu => parse_passmark(&document, page_url, "cpu_lookup", "cpu", true)?,
        SourceKind::PassmarkGpu => {
            parse_passmark(&document, page_url, "video_lookup", "gpu", false)?
        }
        SourceKind::Pcsx2Wiki => parse_wiki_games(&document, page_url)?,
    };
    if catalog.is_empty() {
        return Err(CatalogError::Empty {
            url: page_url.into(),
        });
    }
    Ok(catalog)
}

/// PassMark lists share one layout: `table#cputable`, one row per model, the
/// first cell holding an anchor to a `*_lookup.php` page. Lookup links are
/// rewritten to the canonical detail page (`cpu_lookup` → `cpu`).
///
/// CPU cells carry the stock clock ("Core i7-4790K @ 4.00GHz"); with
/// `cell_text` the name is the cell text cut at `" @"`, otherwise the anchor
/// text.
fn parse_passmark(
    document: &Html,
    page_url: &str,
    lookup: &str,
    canonical: &str,
    cell_text: bool,
) -> CatalogResult<Catalog> {
    let table = Selector::parse("table#cputable").expect("static selector must parse");
    let rows = Selector::parse("tr").expect("static selector must parse");

    let table = document
        .select(&table)
        .next()
        .ok_or_else(|| CatalogError::Layout {
            url: page_url.into(),
            message: "no table#cputable".into(),
        })?;

    let root = site_root(page_url);
    let entries = table.select(&rows).filter_map(|row| {
        // Header rows have no <td>.
        let cell = first_cell(row)?;
        let anchor = first_anchor(cell)?;
        let href = anchor.value().attr("href")?;

        let name = if cell_text {
            let text = element_text(cell);
            text.split(" @").next().unwrap_or_default().trim().to_string()
        } else {
            element_text(anchor)
        };
        if name.is_empty() {
            return None;
        }
        let link = join_url(root, &href.replace(lookup, canonical));
        Some(CatalogEntry::new(name, link))
    });
    Ok(entries.collect())
}

/// The wiki's game table: `table.wikitable`, first cell anchor with the title
/// in its `title` attribute. Hidden region-only rows have no anchor and are
/// skipped.
fn parse_wiki_games(document: &Html, page_url: &str) -> CatalogResult<Catalog> {
    let table = Selector::parse("table.wikitable").expect("static selector must parse");
    let rows = Selector::parse("tr").expect("static selector must parse");

    let table = document
        .select(&table)
        .next()
        .ok_or_else(|| CatalogError::Layout {
            url: page_url.into(),
            message: "no table.wikitable".into(),
        })?;

    let root = site_root(page_url);
    let entries = table.select(&rows).filter_map(|row| {
        let cell = first_cell(row)?;
        let anchor = first_anchor(cell)?;
        let title = anchor.value().attr("title")?.trim();
        let href = anchor.value().attr("href")?;
        if title.is_empty() {
            return None;
        }
        Some(CatalogEntry::new(title, join_url(root, href)))
    });
    Ok(entries.collect())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn first_cell(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
}

fn first_anchor(cell: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let anchor = Selector::parse("a[href]").expect("static selector must parse");
    cell.select(&anchor).next()
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// `https://host/path?q` → `https://host`.
pub(crate) fn site_root(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => &url[..after_scheme + i],
        None => url,
    }
}

/// Resolve `href` against a site root. Absolute hrefs pass through.
pub(crate) fn join_url(root: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{root}/{}", href.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU_LIST: &str = r#"
    <html><body>
    <table id="cputable"><thead><tr><th>CPU Name</th><th>CPU Mark</th></tr></thead>
    <tbody>
      <tr><td><a href="cpu_lookup.php?cpu=Intel+Core+i7-4790K+%40+4.00GHz&amp;id=2275">Intel Core i7-4790K @ 4.00GHz</a></td><td>8,065</td></tr>
      <tr><td><a href="cpu_lookup.php?cpu=AMD+Ryzen+5+3600&amp;id=3481">AMD Ryzen 5 3600</a></td><td>17,800</td></tr>
    </tbody></table>
    </body></html>"#;

    const GPU_LIST: &str = r#"
    <table id="cputable"><tbody>
      <tr><th>Videocard Name</th></tr>
      <tr><td><a href="video_lookup.php?gpu=GeForce+GTX+1080&amp;id=3502">GeForce GTX 1080</a></td></tr>
      <tr><td><a href="video_lookup.php?gpu=Radeon+RX+580&amp;id=3736">Radeon RX 580</a></td></tr>
    </tbody></table>"#;

    const WIKI_LIST: &str = r#"
    <table class="wikitable"><tbody>
      <tr><th>Title</th><th>Region</th></tr>
      <tr><td><a href="/Shadow_of_the_Colossus" title="Shadow of the Colossus">Shadow of the Colossus</a></td><td>NTSC-U</td></tr>
      <tr style="display:none"><td>PAL</td></tr>
      <tr><td><a href="/Okami" title="Okami">Ōkami</a></td><td>PAL</td></tr>
    </tbody></table>"#;

    #[test]
    fn parses_passmark_cpu_list() {
        let catalog = parse_listing(
            SourceKind::PassmarkCpu,
            CPU_LIST,
            "https://www.cpubenchmark.net/cpu_list.php",
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        let entry = catalog.get("Intel Core i7-4790K").unwrap();
        assert_eq!(
            entry.reference,
            "https://www.cpubenchmark.net/cpu.php?cpu=Intel+Core+i7-4790K+%40+4.00GHz&id=2275"
        );
        assert!(catalog.get("AMD Ryzen 5 3600").is_some());
    }

    #[test]
    fn parses_passmark_gpu_list_skipping_header_row() {
        let catalog = parse_listing(
            SourceKind::PassmarkGpu,
            GPU_LIST,
            "https://www.videocardbenchmark.net/gpu_list.php",
        )
        .unwrap();
        let names: Vec<_> = catalog.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["GeForce GTX 1080", "Radeon RX 580"]);
        assert_eq!(
            catalog.get("Radeon RX 580").unwrap().reference,
            "https://www.videocardbenchmark.net/gpu.php?gpu=Radeon+RX+580&id=3736"
        );
    }

    #[test]
    fn parses_wiki_titles_and_skips_hidden_rows() {
        let catalog = parse_listing(
            SourceKind::Pcsx2Wiki,
            WIKI_LIST,
            "https://wiki.pcsx2.net/Complete_List_of_Games",
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("Okami").unwrap().reference,
            "https://wiki.pcsx2.net/Okami"
        );
    }

    #[test]
    fn missing_table_is_a_layout_error() {
        let err = parse_listing(SourceKind::PassmarkCpu, "<html></html>", "https://x.test/")
            .unwrap_err();
        assert!(matches!(err, CatalogError::Layout { .. }));
    }

    #[test]
    fn empty_table_is_reported() {
        let err = parse_listing(
            SourceKind::PassmarkGpu,
            r#"<table id="cputable"><tr><th>x</th></tr></table>"#,
            "https://x.test/list",
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Empty { .. }));
    }

    #[test]
    fn url_helpers() {
        assert_eq!(site_root("https://wiki.pcsx2.net/Complete_List_of_Games"), "https://wiki.pcsx2.net");
        assert_eq!(site_root("https://example.com"), "https://example.com");
        assert_eq!(join_url("https://a.test", "/b"), "https://a.test/b");
        assert_eq!(join_url("https://a.test", "c.php"), "https://a.test/c.php");
        assert_eq!(join_url("https://a.test", "https://z.test/x"), "https://z.test/x");
    }
}
