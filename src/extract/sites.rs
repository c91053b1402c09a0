use super::clean_text;
use crate::config::{KnownEventRule, LoadedSource};
use crate::model::{ExtractionMethod, RawCandidate};
use scraper::Html;
use tracing::debug;

/// Hand-coded rules for a small allow-list of partner domains, built
/// from source configs and handed to the orchestrator explicitly.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    entries: Vec<DomainRules>,
}

#[derive(Debug, Clone)]
struct DomainRules {
    domain_fragment: String,
    events: Vec<KnownEventRule>,
}

impl SiteRegistry {
    pub fn from_sources(sources: &[LoadedSource]) -> Self {
        let mut entries = Vec::new();
        for source in sources {
            if source.config.site.events.is_empty() {
                continue;
            }
            let Some(domain) = source.config.source.domain.as_deref() else {
                debug!(
                    source = %source.config.source.key,
                    "site rules declared without source.domain; skipping"
                );
                continue;
            };
            entries.push(DomainRules {
                domain_fragment: domain.to_lowercase(),
                events: source.config.site.events.clone(),
            });
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rules_for(&self, url: &str) -> impl Iterator<Item = &KnownEventRule> {
        let url = url.to_lowercase();
        self.entries
            .iter()
            .filter(move |entry| url.contains(&entry.domain_fragment))
            .flat_map(|entry| entry.events.iter())
    }
}

/// A rule fires only when the page still shows both the title phrase
/// and the expected date phrase, so a redesigned or rescheduled page
/// yields nothing instead of stale data. Dates are hand-verified, which
/// is why this method shares the top scoring bonus.
pub fn extract(registry: &SiteRegistry, doc: &Html, url: &str) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    let mut page_text: Option<String> = None;

    for rule in registry.rules_for(url) {
        let text = page_text.get_or_insert_with(|| {
            clean_text(&doc.root_element().text().collect::<Vec<_>>().join(" ")).to_lowercase()
        });

        if !text.contains(&rule.title.to_lowercase())
            || !text.contains(&rule.date_phrase.to_lowercase())
        {
            continue;
        }

        out.push(RawCandidate {
            title: rule.title.clone(),
            description: None,
            start_text: Some(rule.date.clone()),
            location_text: rule.location.clone(),
            price_text: None,
            image_url: None,
            category: None,
            link: rule.url.clone(),
            source_url: url.to_string(),
            method: ExtractionMethod::SiteSpecific,
        });
    }

    out
}
