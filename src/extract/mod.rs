pub mod css;
pub mod microdata;
pub mod sites;
pub mod structured;
pub mod text;

pub use sites::SiteRegistry;

use crate::fetch::FetchedPage;
use crate::model::RawCandidate;
use scraper::Html;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Whether a scan stops at the first strategy that yields candidates or
/// runs every strategy and unions the results. Some sites need the
/// union: their structured data covers only part of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Fast,
    Union,
}

/// Everything an extraction run needs beyond the page itself. The site
/// registry is injected here rather than living in module state.
pub struct ExtractContext<'a> {
    pub overrides: &'a BTreeMap<String, Vec<String>>,
    pub registry: &'a SiteRegistry,
}

/// Runs the strategy cascade in trust order: structured data, then
/// microdata, then site-specific rules, then CSS guessing, then text
/// mining as the last resort.
pub fn extract_candidates(
    page: &FetchedPage,
    ctx: &ExtractContext<'_>,
    mode: ScanMode,
) -> Vec<RawCandidate> {
    let doc = Html::parse_document(&page.html);

    let strategies: [(&str, Box<dyn FnOnce() -> Vec<RawCandidate> + '_>); 5] = [
        (
            "structured",
            Box::new(|| structured::extract(&doc, &page.url)),
        ),
        (
            "microdata",
            Box::new(|| microdata::extract(&doc, &page.url)),
        ),
        (
            "site_specific",
            Box::new(|| sites::extract(ctx.registry, &doc, &page.url)),
        ),
        (
            "css_heuristic",
            Box::new(|| css::extract(&doc, &page.url, ctx.overrides)),
        ),
        (
            "text_mining",
            Box::new(|| text::extract(&page.html, &page.url)),
        ),
    ];

    let mut all: Vec<RawCandidate> = Vec::new();
    for (name, run) in strategies {
        let found = run();
        if found.is_empty() {
            continue;
        }
        debug!(url = %page.url, strategy = name, candidates = found.len(), "strategy yielded candidates");
        all.extend(found);
        if mode == ScanMode::Fast {
            break;
        }
    }

    all
}

/// Decodes entities and collapses runs of whitespace; extracted fields
/// all pass through here.
pub(crate) fn clean_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn absolutize_url(base: &str, value: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }

    if let Ok(base_url) = Url::parse(base)
        && let Ok(joined) = base_url.join(value)
    {
        return joined.to_string();
    }

    value.to_string()
}
