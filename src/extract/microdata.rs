use super::structured::EVENT_TYPES;
use super::{absolutize_url, clean_text};
use crate::model::{ExtractionMethod, RawCandidate};
use scraper::{ElementRef, Html, Selector};

/// Inline itemscope/itemprop annotations: the lighter-weight cousin of
/// ld+json, same type vocabulary.
pub fn extract(doc: &Html, url: &str) -> Vec<RawCandidate> {
    let Ok(scope_selector) = Selector::parse("[itemscope][itemtype]") else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for scope in doc.select(&scope_selector) {
        let Some(itemtype) = scope.value().attr("itemtype") else {
            continue;
        };
        if !is_event_itemtype(itemtype) {
            continue;
        }

        let Some(title) = prop_value(&scope, "name", &["content"]) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let link = prop_value(&scope, "url", &["href", "content"])
            .filter(|v| !v.is_empty())
            .map(|v| absolutize_url(url, &v));

        out.push(RawCandidate {
            title,
            description: prop_value(&scope, "description", &["content"]).filter(|v| !v.is_empty()),
            start_text: prop_value(&scope, "startDate", &["content", "datetime"])
                .filter(|v| !v.is_empty()),
            location_text: location_value(&scope),
            price_text: prop_value(&scope, "price", &["content"]).filter(|v| !v.is_empty()),
            image_url: prop_value(&scope, "image", &["src", "content", "href"])
                .filter(|v| !v.is_empty())
                .map(|v| absolutize_url(url, &v)),
            category: itemtype_label(itemtype),
            link,
            source_url: url.to_string(),
            method: ExtractionMethod::Microdata,
        });
    }

    out
}

fn is_event_itemtype(itemtype: &str) -> bool {
    itemtype
        .split_whitespace()
        .filter_map(|ty| ty.trim_end_matches('/').rsplit('/').next())
        .any(|name| EVENT_TYPES.contains(&name))
}

fn itemtype_label(itemtype: &str) -> Option<String> {
    itemtype
        .split_whitespace()
        .filter_map(|ty| ty.trim_end_matches('/').rsplit('/').next())
        .find(|name| EVENT_TYPES.contains(name) && *name != "Event")
        .map(ToString::to_string)
}

/// `content`/`datetime`/`href`-style attributes carry the canonical
/// value when present; visible text is the fallback.
fn prop_value(scope: &ElementRef<'_>, prop: &str, attrs: &[&str]) -> Option<String> {
    let selector = Selector::parse(&format!(r#"[itemprop="{prop}"]"#)).ok()?;
    let element = scope.select(&selector).next()?;

    for attr in attrs {
        if let Some(value) = element.value().attr(attr) {
            let value = clean_text(value);
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

/// The location prop is usually its own nested Place scope; prefer its
/// declared name, then its address, then whatever text it holds.
fn location_value(scope: &ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse(r#"[itemprop="location"]"#).ok()?;
    let element = scope.select(&selector).next()?;

    for inner_prop in ["name", "address"] {
        let inner = Selector::parse(&format!(r#"[itemprop="{inner_prop}"]"#)).ok()?;
        if let Some(found) = element.select(&inner).next() {
            let text = clean_text(&found.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}
