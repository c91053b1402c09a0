use anyhow::Result;
use evscout::model::ExtractionMethod;
use evscout::rss::parse_feed;

const FEED_URL: &str = "https://town.example.org/bulletin/feed.xml";

#[test]
fn feed_items_become_feed_candidates() -> Result<()> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
    <rss version="2.0">
      <channel>
        <title>Town Bulletin</title>
        <item>
          <title>City Hall Open House Tour</title>
          <link>https://town.example.org/bulletin/open-house</link>
          <description>Guided tours of the restored council chambers.</description>
          <pubDate>06 Sep 2027 10:00:00 GMT</pubDate>
          <category>Community</category>
        </item>
        <item>
          <title>   </title>
          <link>https://town.example.org/bulletin/untitled</link>
        </item>
      </channel>
    </rss>"#;

    let found = parse_feed(xml, FEED_URL)?;

    assert_eq!(found.len(), 1);
    let item = &found[0];
    assert_eq!(item.title, "City Hall Open House Tour");
    assert_eq!(item.method, ExtractionMethod::Feed);
    assert_eq!(item.source_url, FEED_URL);
    assert_eq!(item.start_text.as_deref(), Some("06 Sep 2027 10:00:00 GMT"));
    assert_eq!(item.category.as_deref(), Some("Community"));
    assert_eq!(
        item.link.as_deref(),
        Some("https://town.example.org/bulletin/open-house")
    );

    Ok(())
}

#[test]
fn html_entities_do_not_break_the_parser() -> Result<()> {
    let xml = r#"<?xml version="1.0"?>
    <rss version="2.0">
      <channel>
        <item>
          <title>Dinner&nbsp;&ndash;&nbsp;Harvest Tasting Menu Night</title>
          <pubDate>15 Oct 2027 18:00:00 GMT</pubDate>
        </item>
      </channel>
    </rss>"#;

    let found = parse_feed(xml, FEED_URL)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Dinner - Harvest Tasting Menu Night");

    Ok(())
}

#[test]
fn malformed_xml_is_an_error_not_a_panic() {
    assert!(parse_feed("<rss><channel><item>", FEED_URL).is_err());
}
