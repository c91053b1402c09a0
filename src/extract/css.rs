use super::{absolutize_url, clean_text};
use crate::model::{ExtractionMethod, RawCandidate};
use crate::normalize::detect_date_fragment;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::warn;

/// Container guesses, most specific first. The first selector that
/// matches anything on the page wins so nested generic matches don't
/// double-count the same markup.
const CONTAINER_SELECTORS: &[&str] = &[
    ".event",
    ".event-item",
    ".event-card",
    ".event-listing",
    "article.event",
    "li.vevent",
    ".calendar-event",
    ".calendar-item",
    "[class*=event-]",
    ".listing-item",
];

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    ".event-title",
    ".title",
    "[class*=title]",
    "a",
];

const DATE_SELECTORS: &[&str] = &[
    "time",
    "[datetime]",
    ".event-date",
    ".date",
    "[class*=date]",
    "[class*=when]",
];

const LOCATION_SELECTORS: &[&str] = &[
    ".venue",
    ".location",
    "[class*=venue]",
    "[class*=location]",
    ".address",
    "[class*=where]",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".description",
    ".summary",
    "[class*=desc]",
    "[class*=excerpt]",
    "p",
];

const PRICE_SELECTORS: &[&str] = &[".price", ".cost", "[class*=price]", "[class*=ticket]"];

pub(crate) const EVENT_KEYWORDS: &[&str] = &[
    "concert",
    "festival",
    "workshop",
    "show",
    "gala",
    "fundraiser",
    "meeting",
    "meetup",
    "exhibition",
    "performance",
    "market",
    "fair",
    "conference",
    "party",
    "screening",
    "lecture",
    "class",
    "tour",
    "night",
    "live",
    "open mic",
    "trivia",
];

/// Generic container/selector guessing for pages with no machine-
/// readable markup. Field extraction walks ordered fallback lists;
/// caller overrides replace a field's list wholesale, and an override
/// with a bad selector falls back to the defaults for that field.
pub fn extract(doc: &Html, url: &str, overrides: &BTreeMap<String, Vec<String>>) -> Vec<RawCandidate> {
    let fields = FieldSelectors::build(overrides);

    let Some(containers) = find_containers(doc, overrides) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for container in containers {
        let Some(title) = first_text(&container, &fields.title) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let container_text = clean_text(&container.text().collect::<Vec<_>>().join(" "));
        let start_text = date_value(&container, &fields.date)
            .or_else(|| detect_date_fragment(&container_text));

        if !looks_like_event(&title, start_text.as_deref()) {
            continue;
        }

        let description = first_text(&container, &fields.description)
            .filter(|v| !v.is_empty() && *v != title);

        out.push(RawCandidate {
            title,
            description,
            start_text,
            location_text: first_text(&container, &fields.location).filter(|v| !v.is_empty()),
            price_text: first_text(&container, &fields.price).filter(|v| !v.is_empty()),
            image_url: first_attr(&container, "img", "src").map(|v| absolutize_url(url, &v)),
            category: None,
            link: first_attr(&container, "a", "href").map(|v| absolutize_url(url, &v)),
            source_url: url.to_string(),
            method: ExtractionMethod::CssHeuristic,
        });
    }

    out
}

struct FieldSelectors {
    title: Vec<Selector>,
    date: Vec<Selector>,
    location: Vec<Selector>,
    description: Vec<Selector>,
    price: Vec<Selector>,
}

impl FieldSelectors {
    fn build(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        Self {
            title: field_selectors("title", TITLE_SELECTORS, overrides),
            date: field_selectors("date", DATE_SELECTORS, overrides),
            location: field_selectors("location", LOCATION_SELECTORS, overrides),
            description: field_selectors("description", DESCRIPTION_SELECTORS, overrides),
            price: field_selectors("price", PRICE_SELECTORS, overrides),
        }
    }
}

fn field_selectors(
    field: &str,
    defaults: &[&str],
    overrides: &BTreeMap<String, Vec<String>>,
) -> Vec<Selector> {
    if let Some(patterns) = overrides.get(field) {
        let mut parsed = Vec::with_capacity(patterns.len());
        let mut valid = true;
        for pattern in patterns {
            match Selector::parse(pattern) {
                Ok(selector) => parsed.push(selector),
                Err(err) => {
                    warn!(field, pattern = %pattern, error = ?err, "invalid selector override; using defaults for this field");
                    valid = false;
                    break;
                }
            }
        }
        if valid && !parsed.is_empty() {
            return parsed;
        }
    }

    defaults
        .iter()
        .filter_map(|pattern| Selector::parse(pattern).ok())
        .collect()
}

fn find_containers<'a>(
    doc: &'a Html,
    overrides: &BTreeMap<String, Vec<String>>,
) -> Option<Vec<ElementRef<'a>>> {
    for selector in field_selectors("container", CONTAINER_SELECTORS, overrides) {
        let matched: Vec<ElementRef<'a>> = doc.select(&selector).collect();
        if !matched.is_empty() {
            return Some(matched);
        }
    }
    None
}

fn first_text(container: &ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    for selector in selectors {
        if let Some(element) = container.select(selector).next() {
            let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// A `datetime` attribute beats visible text when both exist.
fn date_value(container: &ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    for selector in selectors {
        if let Some(element) = container.select(selector).next() {
            if let Some(attr) = element.value().attr("datetime") {
                let attr = clean_text(attr);
                if !attr.is_empty() {
                    return Some(attr);
                }
            }
            let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn first_attr(container: &ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    container
        .select(&parsed)
        .find_map(|el| el.value().attr(attr))
        .map(ToString::to_string)
        .filter(|v| !v.is_empty())
}

/// Cheap "looks like an event" gate: an event keyword in the title, or
/// an extracted date, or at least three words of title.
fn looks_like_event(title: &str, start_text: Option<&str>) -> bool {
    let lower = title.to_lowercase();
    if EVENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }
    if start_text.is_some_and(|v| !v.is_empty()) {
        return true;
    }
    title.split_whitespace().count() >= 3
}
