use anyhow::Result;
use evscout::config::{LoadedSource, SourceConfig};
use evscout::extract::{
    ExtractContext, ScanMode, SiteRegistry, css, extract_candidates, microdata, structured, text,
};
use evscout::fetch::FetchedPage;
use evscout::model::ExtractionMethod;
use scraper::Html;
use std::collections::BTreeMap;
use std::path::PathBuf;

const PAGE_URL: &str = "https://venue.example.org/events";

fn loaded(toml_text: &str) -> Result<LoadedSource> {
    let config: SourceConfig = toml::from_str(toml_text)?;
    Ok(LoadedSource {
        path: PathBuf::from("test.toml"),
        config,
    })
}

#[test]
fn structured_walks_graph_wrappers_and_skips_malformed_blocks() {
    let html = r#"<html><head>
      <script type="application/ld+json">{ this is not json</script>
      <script type="application/ld+json">
        {"@graph": [
          {"@type": "Organization", "name": "The Venue"},
          {"@type": "MusicEvent", "name": "Harbor Lights Festival",
           "startDate": "2027-09-18T17:00:00",
           "location": {"@type": "Place", "name": "North Pier"},
           "offers": [{"@type": "Offer", "price": 25, "priceCurrency": "USD"}],
           "url": "/festival"}
        ]}
      </script>
    </head><body></body></html>"#;

    let doc = Html::parse_document(html);
    let found = structured::extract(&doc, PAGE_URL);

    assert_eq!(found.len(), 1);
    let event = &found[0];
    assert_eq!(event.title, "Harbor Lights Festival");
    assert_eq!(event.method, ExtractionMethod::Structured);
    assert_eq!(event.location_text.as_deref(), Some("North Pier"));
    assert_eq!(event.price_text.as_deref(), Some("25 USD"));
    assert_eq!(
        event.link.as_deref(),
        Some("https://venue.example.org/festival")
    );
    assert_eq!(event.category.as_deref(), Some("MusicEvent"));
}

#[test]
fn structured_ignores_non_event_types() {
    let html = r#"<html><head><script type="application/ld+json">
      {"@type": "Product", "name": "Gift Card", "offers": {"price": "50"}}
    </script></head><body></body></html>"#;

    let doc = Html::parse_document(html);
    assert!(structured::extract(&doc, PAGE_URL).is_empty());
}

#[test]
fn microdata_prefers_machine_attributes_over_text() {
    let html = r#"<html><body>
      <div itemscope itemtype="https://schema.org/TheaterEvent">
        <h2 itemprop="name">The Tempest</h2>
        <time itemprop="startDate" datetime="2027-10-02T19:30:00">October 2nd at 7:30</time>
        <div itemprop="location" itemscope itemtype="https://schema.org/Place">
          <span itemprop="name">Civic Playhouse</span>
        </div>
        <p itemprop="description">The resident company closes its season with Shakespeare's late romance.</p>
      </div>
    </body></html>"#;

    let doc = Html::parse_document(html);
    let found = microdata::extract(&doc, PAGE_URL);

    assert_eq!(found.len(), 1);
    let event = &found[0];
    assert_eq!(event.title, "The Tempest");
    assert_eq!(event.method, ExtractionMethod::Microdata);
    assert_eq!(event.start_text.as_deref(), Some("2027-10-02T19:30:00"));
    assert_eq!(event.location_text.as_deref(), Some("Civic Playhouse"));
    assert_eq!(event.category.as_deref(), Some("TheaterEvent"));
}

#[test]
fn site_rules_require_both_title_and_date_phrase() -> Result<()> {
    let source = loaded(
        r#"
        [source]
        key = "partner.townhall"
        name = "Town Hall"
        domain = "townhall.example.org"

        [fetch]
        mode = "inline"
        inline_data = "<html></html>"

        [[site.events]]
        title = "Annual Budget Forum"
        date_phrase = "April 12"
        date = "2027-04-12"
        location = "Council Chambers"
        "#,
    )?;
    let registry = SiteRegistry::from_sources(std::slice::from_ref(&source));

    let matching = Html::parse_document(
        "<html><body><h1>Annual Budget Forum</h1><p>Join us April 12 at 6pm.</p></body></html>",
    );
    let found = evscout::extract::sites::extract(
        &registry,
        &matching,
        "https://townhall.example.org/agenda",
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].method, ExtractionMethod::SiteSpecific);
    assert_eq!(found[0].start_text.as_deref(), Some("2027-04-12"));

    // Same page, wrong domain: the rule must not fire.
    assert!(
        evscout::extract::sites::extract(&registry, &matching, "https://other.example.org/agenda")
            .is_empty()
    );

    // Right domain, but the date phrase is gone (page was rescheduled).
    let rescheduled = Html::parse_document(
        "<html><body><h1>Annual Budget Forum</h1><p>New date to be announced.</p></body></html>",
    );
    assert!(
        evscout::extract::sites::extract(
            &registry,
            &rescheduled,
            "https://townhall.example.org/agenda"
        )
        .is_empty()
    );

    Ok(())
}

#[test]
fn css_containers_gate_on_event_likeness() {
    let html = r#"<html><body>
      <div class="event-item">
        <h3>Soup Night</h3>
        <span class="date">June 5, 2027</span>
      </div>
      <div class="event-item">
        <h3>Menu</h3>
      </div>
    </body></html>"#;

    let doc = Html::parse_document(html);
    let found = css::extract(&doc, PAGE_URL, &BTreeMap::new());

    // "Menu" has no keyword, no date, and fewer than three words.
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Soup Night");
    assert_eq!(found[0].start_text.as_deref(), Some("June 5, 2027"));
}

#[test]
fn invalid_selector_override_falls_back_to_defaults() {
    let html = r#"<html><body>
      <div class="event-item">
        <h3>Soup Night</h3>
        <span class="date">June 5, 2027</span>
      </div>
    </body></html>"#;

    let mut overrides = BTreeMap::new();
    overrides.insert("title".to_string(), vec!["]] broken [[".to_string()]);

    let doc = Html::parse_document(html);
    let found = css::extract(&doc, PAGE_URL, &overrides);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Soup Night");
}

#[test]
fn container_override_redirects_extraction() {
    let html = r#"<html><body>
      <section class="happenings">
        <h2>Harvest Fair</h2>
        <span class="date">October 9, 2027</span>
      </section>
    </body></html>"#;

    let mut overrides = BTreeMap::new();
    overrides.insert("container".to_string(), vec!["section.happenings".to_string()]);

    let doc = Html::parse_document(html);
    let found = css::extract(&doc, PAGE_URL, &overrides);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Harvest Fair");
}

#[test]
fn text_mining_is_capped_and_needs_a_nearby_date() {
    let html = r#"<html><body><main>
      <p>SPRING CONCERT</p><p>March 20, 2027</p>
      <p>SUMMER FESTIVAL</p><p>June 21, 2027</p>
      <p>AUTUMN MARKET</p><p>September 22, 2027</p>
      <p>WINTER SHOW</p><p>December 21, 2027</p>
      <p>ORPHAN WORKSHOP HEADLINE</p><p>No date follows this one.</p>
    </main></body></html>"#;

    let found = text::extract(html, PAGE_URL);

    assert_eq!(found.len(), 3);
    for event in &found {
        assert_eq!(event.method, ExtractionMethod::TextMining);
        assert!(event.start_text.is_some());
    }
}

#[test]
fn fast_mode_stops_at_first_strategy_union_runs_all() -> Result<()> {
    let html = r#"<html><head>
      <script type="application/ld+json">
        {"@type": "Event", "name": "Harbor Lights Festival", "startDate": "2027-09-18"}
      </script>
    </head><body>
      <div class="event-item">
        <h3>Moonlight Paddle Tour</h3>
        <span class="date">August 14, 2027</span>
      </div>
    </body></html>"#;

    let page = FetchedPage {
        url: PAGE_URL.to_string(),
        html: html.to_string(),
    };
    let registry = SiteRegistry::default();
    let overrides = BTreeMap::new();
    let ctx = ExtractContext {
        overrides: &overrides,
        registry: &registry,
    };

    let fast = extract_candidates(&page, &ctx, ScanMode::Fast);
    assert_eq!(fast.len(), 1);
    assert_eq!(fast[0].method, ExtractionMethod::Structured);

    let union = extract_candidates(&page, &ctx, ScanMode::Union);
    assert!(union.len() >= 2);
    assert!(
        union
            .iter()
            .any(|c| c.method == ExtractionMethod::CssHeuristic)
    );

    Ok(())
}
