use super::{absolutize_url, clean_text};
use crate::model::{ExtractionMethod, RawCandidate};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// schema.org types accepted as events. Anything else in a block
/// (organizations, breadcrumbs, products) is ignored.
pub(crate) const EVENT_TYPES: &[&str] = &[
    "Event",
    "SportsEvent",
    "MusicEvent",
    "TheaterEvent",
    "BusinessEvent",
    "EducationEvent",
    "Festival",
    "ComedyEvent",
];

/// Embedded ld+json event blocks. The highest-trust strategy: the page
/// author declared the event machine-readably. A malformed block is
/// skipped without aborting the rest of the page.
pub fn extract(doc: &Html, url: &str) -> Vec<RawCandidate> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for script in doc.select(&selector) {
        let payload = script.text().collect::<String>();
        let value: Value = match serde_json::from_str(payload.trim()) {
            Ok(value) => value,
            Err(err) => {
                debug!(%url, error = %err, "skipping malformed ld+json block");
                continue;
            }
        };

        for item in event_nodes(&value) {
            if let Some(candidate) = map_event(item, url) {
                out.push(candidate);
            }
        }
    }

    out
}

/// A block's payload may be a single object, an array of objects, or a
/// `@graph` wrapper; events can sit at any of those levels.
fn event_nodes(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(event_nodes).collect(),
        Value::Object(obj) => {
            if let Some(graph) = obj.get("@graph") {
                return event_nodes(graph);
            }
            if declares_event_type(value) {
                vec![value]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn declares_event_type(item: &Value) -> bool {
    match item.get("@type") {
        Some(Value::String(ty)) => EVENT_TYPES.contains(&ty.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|ty| EVENT_TYPES.contains(&ty)),
        _ => false,
    }
}

fn map_event(item: &Value, page_url: &str) -> Option<RawCandidate> {
    let title = string_field(item, "name")?;
    if title.is_empty() {
        return None;
    }

    let link = string_field(item, "url")
        .filter(|v| !v.is_empty())
        .map(|v| absolutize_url(page_url, &v));

    Some(RawCandidate {
        title,
        description: string_field(item, "description").filter(|v| !v.is_empty()),
        start_text: string_field(item, "startDate").filter(|v| !v.is_empty()),
        location_text: location_field(item.get("location")),
        price_text: offers_price(item.get("offers")),
        image_url: image_field(item.get("image")).map(|v| absolutize_url(page_url, &v)),
        category: string_field(item, "eventType")
            .or_else(|| type_label(item))
            .filter(|v| v.as_str() != "Event"),
        link,
        source_url: page_url.to_string(),
        method: ExtractionMethod::Structured,
    })
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(clean_text)
}

fn type_label(item: &Value) -> Option<String> {
    match item.get("@type") {
        Some(Value::String(ty)) => Some(ty.clone()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .next()
            .map(ToString::to_string),
        _ => None,
    }
}

/// `location` may be a plain string, a Place object with a name, or a
/// Place whose only useful data is its postal address.
fn location_field(location: Option<&Value>) -> Option<String> {
    let location = location?;
    match location {
        Value::String(name) => Some(clean_text(name)).filter(|v| !v.is_empty()),
        Value::Array(items) => items.iter().find_map(|item| location_field(Some(item))),
        Value::Object(_) => {
            if let Some(name) = string_field(location, "name").filter(|v| !v.is_empty()) {
                return Some(name);
            }
            let address = location.get("address")?;
            match address {
                Value::String(text) => Some(clean_text(text)).filter(|v| !v.is_empty()),
                Value::Object(_) => {
                    let parts: Vec<String> = ["streetAddress", "addressLocality", "addressRegion"]
                        .into_iter()
                        .filter_map(|key| string_field(address, key))
                        .filter(|v| !v.is_empty())
                        .collect();
                    if parts.is_empty() {
                        None
                    } else {
                        Some(parts.join(", "))
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// `offers` may be one Offer or a list; the first priced entry wins.
fn offers_price(offers: Option<&Value>) -> Option<String> {
    let offers = offers?;
    match offers {
        Value::Array(items) => items.iter().find_map(|item| offers_price(Some(item))),
        Value::Object(_) => {
            let price = match offers.get("price") {
                Some(Value::String(text)) => clean_text(text),
                Some(Value::Number(n)) => n.to_string(),
                _ => return None,
            };
            if price.is_empty() {
                return None;
            }
            match offers.get("priceCurrency").and_then(Value::as_str) {
                Some(currency) if !currency.is_empty() => Some(format!("{price} {currency}")),
                _ => Some(price),
            }
        }
        _ => None,
    }
}

fn image_field(image: Option<&Value>) -> Option<String> {
    let image = image?;
    match image {
        Value::String(url) => Some(clean_text(url)).filter(|v| !v.is_empty()),
        Value::Array(items) => items.iter().find_map(|item| image_field(Some(item))),
        Value::Object(_) => image
            .get("url")
            .and_then(Value::as_str)
            .map(clean_text)
            .filter(|v| !v.is_empty()),
        _ => None,
    }
}
