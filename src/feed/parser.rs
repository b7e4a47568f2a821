use std::borrow::Cow;

use chrono::{DateTime, Utc};
use feed_rs::model::Link;
use feed_rs::parser;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

/// One entry of a parsed feed, with explicit optional fields.
///
/// Summary text precedence: `summary_html` when non-empty, then
/// `content_html`, then nothing (see [`FeedEntry::raw_summary_html`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    /// Entry title; empty when the feed omits it
    pub title: String,
    /// Permalink of the entry
    pub link: Option<String>,
    /// Published timestamp, falling back to the updated timestamp
    pub published: Option<DateTime<Utc>>,
    /// RSS `<description>` / Atom `<summary>`
    pub summary_html: Option<String>,
    /// RSS `<content:encoded>` / Atom `<content>`
    pub content_html: Option<String>,
}

impl FeedEntry {
    /// Raw HTML to summarize: the summary, else the content body, else `""`.
    pub fn raw_summary_html(&self) -> &str {
        self.summary_html
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.content_html.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("")
    }
}

/// Result of parsing raw feed bytes. Parsing never fails outright: a document
/// that is not a well-formed feed is flagged `malformed` and carries whatever
/// entries could be salvaged.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// The strict parse failed; `entries` came from the salvage pass
    pub malformed: bool,
    /// Why the strict parse failed
    pub error: Option<String>,
    /// The feed's own site link (RSS channel `<link>`, Atom alternate link)
    pub site_link: Option<String>,
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
}

impl ParsedFeed {
    /// Well-formedness and non-emptiness decision.
    ///
    /// A malformed document with nothing salvaged is invalid. Otherwise the
    /// feed is valid, except that `strict` also requires at least one entry.
    pub fn is_valid(&self, strict: bool) -> bool {
        if self.entries.is_empty() {
            !(self.malformed || strict)
        } else {
            true
        }
    }
}

/// Parses raw bytes as RSS, Atom or JSON Feed.
///
/// Bytes are handed to the parser undecoded so an encoding declared in the
/// XML prolog is honored.
pub fn parse_feed(bytes: &[u8]) -> ParsedFeed {
    match parser::parse(bytes) {
        Ok(feed) => ParsedFeed {
            malformed: false,
            error: None,
            site_link: preferred_link(&feed.links),
            entries: feed.entries.into_iter().map(convert_entry).collect(),
        },
        Err(e) => {
            let (site_link, entries) = salvage(bytes);
            tracing::debug!(
                error = %e,
                salvaged = entries.len(),
                "Feed failed strict parse, salvaged entries"
            );
            ParsedFeed {
                malformed: true,
                error: Some(e.to_string()),
                site_link,
                entries,
            }
        }
    }
}

fn convert_entry(entry: feed_rs::model::Entry) -> FeedEntry {
    FeedEntry {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        link: preferred_link(&entry.links),
        published: entry.published.or(entry.updated),
        summary_html: entry.summary.map(|s| s.content),
        content_html: entry.content.and_then(|c| c.body),
    }
}

/// First `alternate` (or rel-less) link, else the first link of any kind.
fn preferred_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

// ============================================================================
// Salvage Pass
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Published,
    Updated,
    Summary,
    Content,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"pubDate" | b"published" | b"issued" | b"date" => Some(Self::Published),
            b"updated" | b"modified" => Some(Self::Updated),
            b"description" | b"summary" => Some(Self::Summary),
            b"encoded" | b"content" => Some(Self::Content),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PendingEntry {
    entry: FeedEntry,
    updated: Option<DateTime<Utc>>,
}

impl PendingEntry {
    fn finish(mut self) -> FeedEntry {
        self.entry.published = self.entry.published.or(self.updated);
        self.entry
    }
}

/// Recovers every `<item>`/`<entry>` closed before the first fatal syntax
/// error. Bad entity escapes are kept verbatim instead of aborting.
fn salvage(bytes: &[u8]) -> (Option<String>, Vec<FeedEntry>) {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut site_link = None;
    let mut pending: Option<PendingEntry> = None;
    let mut field: Option<(Field, Vec<u8>)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"item" | b"entry" => {
                        pending = Some(PendingEntry::default());
                        field = None;
                    }
                    name if field.is_none() => {
                        if let Some(f) = Field::from_local_name(name) {
                            if f == Field::Link {
                                take_link_href(&e, pending.as_mut(), &mut site_link);
                            }
                            field = Some((f, name.to_vec()));
                            text.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"link" => {
                take_link_href(&e, pending.as_mut(), &mut site_link);
            }
            Ok(Event::Text(t)) if field.is_some() => {
                text.push_str(&unescape_lenient(&t));
            }
            Ok(Event::CData(c)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"item" | b"entry" => {
                        if let Some(done) = pending.take() {
                            entries.push(done.finish());
                        }
                        field = None;
                    }
                    name if field.as_ref().is_some_and(|(_, open)| open.as_slice() == name) => {
                        if let Some((f, _)) = field.take() {
                            let value = std::mem::take(&mut text);
                            assign_field(f, value, pending.as_mut(), &mut site_link);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Salvage stopped at XML error"
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    (site_link, entries)
}

fn assign_field(
    field: Field,
    value: String,
    pending: Option<&mut PendingEntry>,
    site_link: &mut Option<String>,
) {
    let value = value.trim().to_owned();
    let Some(p) = pending else {
        if field == Field::Link && site_link.is_none() && !value.is_empty() {
            *site_link = Some(value);
        }
        return;
    };

    match field {
        Field::Title => p.entry.title = value,
        Field::Link => {
            if p.entry.link.is_none() && !value.is_empty() {
                p.entry.link = Some(value);
            }
        }
        Field::Published => {
            p.entry.published = p.entry.published.or(parse_timestamp(&value));
        }
        Field::Updated => p.updated = p.updated.or(parse_timestamp(&value)),
        Field::Summary => p.entry.summary_html = Some(value),
        Field::Content => p.entry.content_html = Some(value),
    }
}

/// Atom-style `<link href="..." rel="alternate"/>`.
fn take_link_href(
    e: &BytesStart<'_>,
    pending: Option<&mut PendingEntry>,
    site_link: &mut Option<String>,
) {
    let href = match e.try_get_attribute("href") {
        Ok(Some(attr)) => match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        },
        _ => return,
    };

    let is_alternate = match e.try_get_attribute("rel") {
        Ok(Some(rel)) => rel.value.as_ref() == b"alternate",
        _ => true,
    };
    if !is_alternate || href.trim().is_empty() {
        return;
    }

    let slot = match pending {
        Some(p) => &mut p.entry.link,
        None => site_link,
    };
    if slot.is_none() {
        *slot = Some(href.trim().to_owned());
    }
}

fn unescape_lenient<'a>(t: &'a BytesText<'a>) -> Cow<'a, str> {
    match t.unescape() {
        Ok(s) => s,
        Err(_) => String::from_utf8_lossy(t).into_owned().into(),
    }
}

/// RFC 2822 (`pubDate`) or RFC 3339 (Atom, Dublin Core) timestamps.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <link>https://example.com/</link>
    <item>
        <title>First</title>
        <link>https://example.com/1</link>
        <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
        <description>&lt;p&gt;Hello&lt;/p&gt;</description>
    </item>
    <item>
        <title>Second</title>
        <link>https://example.com/2</link>
    </item>
</channel></rss>"#;

    const VALID_ATOM: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Blog</title>
  <link href="https://example.com/feed.xml" rel="self"/>
  <link href="https://example.com/" rel="alternate"/>
  <entry>
    <id>1</id>
    <title>Atom Post</title>
    <link href="https://example.com/post/1"/>
    <updated>2024-01-02T08:30:00+02:00</updated>
    <content type="html">&lt;b&gt;Body&lt;/b&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_entries_in_order() {
        let parsed = parse_feed(VALID_RSS.as_bytes());

        assert!(!parsed.malformed);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].title, "First");
        assert_eq!(parsed.entries[1].title, "Second");
        assert_eq!(
            parsed.entries[0].link.as_deref(),
            Some("https://example.com/1")
        );
        assert_eq!(
            parsed.entries[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(parsed.entries[0].summary_html.as_deref(), Some("<p>Hello</p>"));
        assert_eq!(parsed.entries[1].published, None);
        assert!(parsed
            .site_link
            .as_deref()
            .unwrap()
            .starts_with("https://example.com"));
    }

    #[test]
    fn test_parse_atom_uses_updated_and_alternate_link() {
        let parsed = parse_feed(VALID_ATOM.as_bytes());

        assert!(!parsed.malformed);
        assert_eq!(parsed.entries.len(), 1);
        let entry = &parsed.entries[0];
        assert_eq!(entry.title, "Atom Post");
        assert_eq!(entry.link.as_deref(), Some("https://example.com/post/1"));
        assert_eq!(
            entry.published,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 6, 30, 0).unwrap())
        );
        assert_eq!(entry.raw_summary_html(), "<b>Body</b>");
        assert_eq!(parsed.site_link.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_html_page_is_malformed_and_empty() {
        let parsed = parse_feed(b"<html><body><p>Just a page</p></body></html>");
        assert!(parsed.malformed);
        assert!(parsed.error.is_some());
        assert!(parsed.entries.is_empty());
        assert!(!parsed.is_valid(false));
        assert!(!parsed.is_valid(true));
    }

    #[test]
    fn test_empty_channel_strictness() {
        let parsed = parse_feed(br#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#);
        assert!(!parsed.malformed);
        assert!(parsed.entries.is_empty());
        assert!(parsed.is_valid(false));
        assert!(!parsed.is_valid(true));
    }

    #[test]
    fn test_truncated_feed_salvages_completed_items() {
        let bytes = br#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<link>https://example.com/</link>
<item><title>Tom & Jerry</title><link>https://example.com/1</link><pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate></item>
<item><title>Cut off</title><link>https://exa"#;

        let parsed = parse_feed(bytes);
        assert!(!parsed.entries.is_empty());
        assert_eq!(parsed.entries[0].link.as_deref(), Some("https://example.com/1"));
        assert!(parsed.is_valid(false));
        assert!(parsed.is_valid(true));
    }

    #[test]
    fn test_salvage_tolerates_bad_entities() {
        let bytes = br#"<rss><channel>
<link>https://example.com/</link>
<item>
  <title>Fish &amp; chips & peas</title>
  <link>https://example.com/fish</link>
  <description><![CDATA[<p>Crispy</p>]]></description>
  <dc:date>2024-03-01T09:00:00Z</dc:date>
</item>
<item><title>Broken</title></itm>
</channel></rss>"#;

        let (site_link, entries) = salvage(bytes);
        assert_eq!(site_link.as_deref(), Some("https://example.com/"));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].title.starts_with("Fish"));
        assert!(entries[0].title.contains("peas"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/fish"));
        assert_eq!(entries[0].summary_html.as_deref(), Some("<p>Crispy</p>"));
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_salvage_atom_links() {
        let bytes = br#"<feed>
  <link href="https://example.com/feed" rel="self"/>
  <link href="https://example.com/" rel="alternate"/>
  <entry>
    <title>A</title>
    <link href="https://example.com/a" rel="alternate"/>
    <updated>2024-05-05T05:05:05Z</updated>
  </entry>
  <entry><title>unterminated"#;

        let (site_link, entries) = salvage(bytes);
        assert_eq!(site_link.as_deref(), Some("https://example.com/"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/a"));
        assert!(entries[0].published.is_some());
    }

    #[test]
    fn test_published_preferred_over_updated_in_salvage() {
        let bytes = br#"<feed><entry>
<updated>2024-01-02T00:00:00Z</updated>
<published>2024-01-01T00:00:00Z</published>
</entry></feed>"#;
        let (_, entries) = salvage(bytes);
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_raw_summary_precedence() {
        let entry = FeedEntry {
            summary_html: Some(String::new()),
            content_html: Some("body".into()),
            ..FeedEntry::default()
        };
        assert_eq!(entry.raw_summary_html(), "body");
        assert_eq!(FeedEntry::default().raw_summary_html(), "");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("Mon, 01 Jan 2024 12:00:00 +0000").is_some());
        assert!(parse_timestamp(" 2024-01-01T12:00:00Z ").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
