use super::clean_text;
use super::css::EVENT_KEYWORDS;
use crate::model::{ExtractionMethod, RawCandidate};
use crate::normalize::detect_date_fragment;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Hard cap: text mining is the noisiest strategy, so it is never
/// allowed to contribute more than a handful of candidates.
const MAX_RESULTS: usize = 3;

/// How many lines below a heading are searched for its date.
const FORWARD_WINDOW: usize = 4;

static CHROME_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|nav|header|footer)\b[^>]*>.*?</(?:script|style|nav|header|footer)>")
        .expect("chrome block regex must be valid")
});

/// Last-resort line scanning: find short ALL-CAPS or Title-Case lines
/// that mention an event keyword, then look a few lines ahead for a
/// date-like token.
pub fn extract(html: &str, url: &str) -> Vec<RawCandidate> {
    let stripped = CHROME_BLOCKS.replace_all(html, " ");
    let doc = Html::parse_document(&stripped);
    let text = doc
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join("\n");

    let lines: Vec<String> = text
        .lines()
        .map(clean_text)
        .filter(|line| !line.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for (index, line) in lines.iter().enumerate() {
        if out.len() >= MAX_RESULTS {
            break;
        }
        if !is_heading_line(line) {
            continue;
        }

        let window_end = (index + 1 + FORWARD_WINDOW).min(lines.len());
        let Some(date_text) = lines[index + 1..window_end]
            .iter()
            .find_map(|below| detect_date_fragment(below))
        else {
            continue;
        };

        if !seen.insert(line.to_lowercase()) {
            continue;
        }

        out.push(RawCandidate {
            title: line.clone(),
            description: None,
            start_text: Some(date_text),
            location_text: None,
            price_text: None,
            image_url: None,
            category: None,
            link: None,
            source_url: url.to_string(),
            method: ExtractionMethod::TextMining,
        });
    }

    out
}

fn is_heading_line(line: &str) -> bool {
    let len = line.chars().count();
    if !(4..=80).contains(&len) {
        return false;
    }

    let lower = line.to_lowercase();
    if !EVENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return false;
    }

    is_all_caps(line) || is_title_case(line)
}

fn is_all_caps(line: &str) -> bool {
    let mut letters = 0usize;
    for c in line.chars() {
        if c.is_alphabetic() {
            letters += 1;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    letters >= 3
}

fn is_title_case(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 2 {
        return false;
    }

    let capitalized = words
        .iter()
        .filter(|word| word.chars().next().is_some_and(char::is_uppercase))
        .count();

    // Small connectives ("at", "of") keep their lowercase in real
    // headings, so demand most words capitalized, not all.
    capitalized * 3 >= words.len() * 2
}
