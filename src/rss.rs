use crate::extract::clean_text;
use crate::model::{ExtractionMethod, RawCandidate};
use anyhow::{Context, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

/// Feed items skip strategy extraction entirely: titles, links and
/// published dates drop straight into the scorer under the same
/// contract as scraped candidates.
pub fn parse_feed(xml: &str, feed_url: &str) -> Result<Vec<RawCandidate>> {
    let cleaned = scrub_entities(xml);
    let rss: Rss = from_str(&cleaned).context("failed to parse rss feed")?;

    let mut out = Vec::with_capacity(rss.channel.items.len());
    for item in rss.channel.items {
        let title = item
            .title
            .as_deref()
            .map(clean_text)
            .unwrap_or_default();
        if title.is_empty() {
            debug!(%feed_url, "skipping feed item with no title");
            continue;
        }

        out.push(RawCandidate {
            title,
            description: item
                .description
                .as_deref()
                .map(clean_text)
                .filter(|v| !v.is_empty()),
            start_text: item.pub_date.clone().filter(|v| !v.trim().is_empty()),
            location_text: None,
            price_text: None,
            image_url: None,
            category: item
                .categories
                .iter()
                .map(|v| clean_text(v))
                .find(|v| !v.is_empty()),
            link: item.link.clone().filter(|v| !v.trim().is_empty()),
            source_url: feed_url.to_string(),
            method: ExtractionMethod::Feed,
        });
    }

    Ok(out)
}

/// HTML entities that are undefined in XML break the parser before we
/// ever see the items; swap the common ones out first.
fn scrub_entities(xml: &str) -> String {
    xml.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
