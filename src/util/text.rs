use std::borrow::Cow;

use scraper::{ElementRef, Html, Node};

use crate::feed::FeedEntry;

/// Appended when a summary is cut short.
pub const ELLIPSIS: char = '…';

/// Default summary length used by the ingestion pipeline.
pub const DEFAULT_SUMMARY_LIMIT: usize = 500;

/// Re-parse rounds for text that still holds markup after extraction
/// (entity-encoded tags, raw-text elements, tags spliced together).
const MAX_MARKUP_PASSES: usize = 8;

/// Elements that separate words when rendered. Inline elements (`b`, `a`,
/// `span`, ...) are removed without a separator so "Hello <b>world</b>."
/// stays "Hello world.".
const BOUNDARY_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "iframe", "img",
    "li", "ol", "p", "picture", "pre", "section", "source", "table", "td", "th", "tr", "ul",
    "video",
];

/// Converts a feed entry's HTML body into a plain-text summary of at most
/// `char_limit` characters (plus one ellipsis when truncated).
///
/// The raw HTML is the entry's summary, falling back to its first content
/// body. Entities are decoded, markup and embedded images are stripped,
/// whitespace is collapsed, and an over-long result is cut at the last
/// sentence-ending period inside the limit (or hard-cut when there is none).
///
/// # Examples
///
/// ```
/// use feedscout::feed::FeedEntry;
/// use feedscout::util::clean_summary;
///
/// let entry = FeedEntry {
///     title: "A & B".into(),
///     summary_html: Some("<p>Hello <b>world</b>.</p>".into()),
///     ..FeedEntry::default()
/// };
/// assert_eq!(clean_summary(&entry, 500), "Hello world.");
/// ```
pub fn clean_summary(entry: &FeedEntry, char_limit: usize) -> String {
    summarize_html(entry.raw_summary_html(), char_limit)
}

/// Normalizes an HTML fragment into a bounded plain-text summary.
pub fn summarize_html(raw: &str, char_limit: usize) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let text = strip_markup(&decoded);
    let text = strip_control_chars(&text);
    let text = collapse_whitespace(&text);

    if text.is_empty() {
        return String::new();
    }

    truncate_at_sentence(&text, char_limit)
}

/// Extracts the text of an HTML fragment. Block-level elements become a
/// single space; inline elements vanish. Comments and script/style bodies
/// are dropped.
fn strip_markup(html: &str) -> String {
    let mut text = extract_text(html);

    for _ in 0..MAX_MARKUP_PASSES {
        if !text.contains('<') {
            break;
        }
        let next = extract_text(&text);
        if next == text {
            break;
        }
        text = next;
    }

    text
}

fn extract_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    push_children_text(fragment.root_element(), &mut out);
    out
}

fn push_children_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            push_element_text(child_element, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

fn push_element_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style") {
        return;
    }

    let boundary = is_boundary(name);
    if boundary {
        out.push(' ');
    }
    push_children_text(element, out);
    if boundary {
        out.push(' ');
    }
}

fn is_boundary(tag: &str) -> bool {
    BOUNDARY_ELEMENTS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(tag))
}

/// Collapses every run of whitespace to one space and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to `char_limit` characters, preferring the last period inside
/// the limit, and appends [`ELLIPSIS`]. Text within the limit is returned as-is.
fn truncate_at_sentence(text: &str, char_limit: usize) -> String {
    let byte_limit = match text.char_indices().nth(char_limit) {
        Some((idx, _)) => idx,
        None => return text.to_owned(),
    };

    let head = &text[..byte_limit];
    let kept = match head.rfind('.') {
        Some(cut) => &head[..=cut],
        None => head.trim_end(),
    };

    let mut out = String::with_capacity(kept.len() + ELLIPSIS.len_utf8());
    out.push_str(kept);
    out.push(ELLIPSIS);
    out
}

/// Truncates to at most `max_chars` characters without splitting a code point.
///
/// ```
/// use feedscout::util::truncate_chars;
///
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// assert_eq!(truncate_chars("short", 250), "short");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(s[..idx].to_owned()),
        None => Cow::Borrowed(s),
    }
}

/// Removes control characters other than tab, newline and carriage return.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| c.is_control() && !matches!(c, '\t' | '\n' | '\r');

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_stripped(c)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use regex::Regex;

    fn entry_with_summary(html: &str) -> FeedEntry {
        FeedEntry {
            summary_html: Some(html.to_owned()),
            ..FeedEntry::default()
        }
    }

    fn has_markup(s: &str) -> bool {
        Regex::new(r"<[^>]+>").unwrap().is_match(s)
    }

    #[test]
    fn test_inline_tags_and_entities() {
        let entry = FeedEntry {
            title: "A & B".into(),
            summary_html: Some("<p>Hello <b>world</b>.</p>".into()),
            ..FeedEntry::default()
        };
        assert_eq!(clean_summary(&entry, 500), "Hello world.");
    }

    #[test]
    fn test_strips_html_and_truncates() {
        let entry = entry_with_summary(
            "<div><p>This <b>is</b> <i>HTML</i> &amp; <span>more</span>. \
             <img src='x.jpg'/>Another sentence with extra words.</p></div>",
        );
        let result = clean_summary(&entry, 40);

        assert!(!has_markup(&result));
        assert!(!result.contains("&amp;"));
        assert!(result.chars().count() <= 41);
        assert_eq!(result, "This is HTML & more.…");
    }

    #[test]
    fn test_block_tags_separate_words() {
        let entry = entry_with_summary("<p>First</p><p>Second</p>line<br/>break<img src=x>end");
        assert_eq!(clean_summary(&entry, 500), "First Second line break end");
    }

    #[test]
    fn test_falls_back_to_content() {
        let entry = FeedEntry {
            content_html: Some("<div>From content</div>".into()),
            ..FeedEntry::default()
        };
        assert_eq!(clean_summary(&entry, 500), "From content");
    }

    #[test]
    fn test_summary_preferred_over_content() {
        let entry = FeedEntry {
            summary_html: Some("summary".into()),
            content_html: Some("content".into()),
            ..FeedEntry::default()
        };
        assert_eq!(clean_summary(&entry, 500), "summary");
    }

    #[test]
    fn test_empty_summary_falls_back_to_content() {
        let entry = FeedEntry {
            summary_html: Some(String::new()),
            content_html: Some("content".into()),
            ..FeedEntry::default()
        };
        assert_eq!(clean_summary(&entry, 500), "content");
    }

    #[test]
    fn test_no_body_is_empty() {
        assert_eq!(clean_summary(&FeedEntry::default(), 500), "");
    }

    #[test]
    fn test_markup_only_is_empty() {
        let entry = entry_with_summary("<p> <img src='a.png'/> </p>");
        assert_eq!(clean_summary(&entry, 500), "");
    }

    #[test]
    fn test_encoded_markup_is_stripped() {
        let entry = entry_with_summary("&lt;p&gt;Escaped &lt;em&gt;markup&lt;/em&gt;&lt;/p&gt;");
        assert_eq!(clean_summary(&entry, 500), "Escaped markup");
    }

    #[test]
    fn test_script_and_comments_removed() {
        let entry =
            entry_with_summary("<script>var x = 1;</script>Visible<!-- hidden --> text<style>p{}</style>");
        assert_eq!(clean_summary(&entry, 500), "Visible text");
    }

    #[test]
    fn test_spliced_tags_are_removed() {
        assert!(!has_markup(&summarize_html("<<b>i>text", 500)));
    }

    #[test]
    fn test_quoted_attribute_with_angle_bracket() {
        let html = r#"<p><a title="a>b" href="/x">Link</a> text</p>"#;
        assert_eq!(summarize_html(html, 500), "Link text");
    }

    #[test]
    fn test_raw_text_element_body_is_reparsed() {
        let html = "<title><b>Bold</b> inside</title> after";
        let out = summarize_html(html, 500);
        assert!(!has_markup(&out));
        assert_eq!(out, "Bold inside after");
    }

    #[test]
    fn test_literal_less_than_kept() {
        assert_eq!(summarize_html("1 &lt; 2 and 3 > 2", 500), "1 < 2 and 3 > 2");
    }

    #[test]
    fn test_control_chars_do_not_leave_double_spaces() {
        assert_eq!(summarize_html("a \u{7} b", 500), "a b");
        assert_eq!(summarize_html("\u{1b} edge \u{7}", 500), "edge");
    }

    #[test]
    fn test_truncates_at_last_period() {
        let text = "One two. Three four five six seven";
        assert_eq!(summarize_html(text, 20), "One two.…");
    }

    #[test]
    fn test_hard_truncates_without_period() {
        let text = "alpha beta gamma delta";
        assert_eq!(summarize_html(text, 11), "alpha beta…");
    }

    #[test]
    fn test_exact_limit_not_truncated() {
        assert_eq!(summarize_html("12345", 5), "12345");
    }

    #[test]
    fn test_multibyte_truncation() {
        let text = "ñandú ñandú ñandú";
        let result = summarize_html(text, 8);
        assert_eq!(result, "ñandú ña…");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(
            summarize_html("  lots\n\n of \t space\u{a0}here  ", 500),
            "lots of space here"
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert!(matches!(truncate_chars("abc", 3), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_control_chars() {
        assert!(matches!(strip_control_chars("clean\ttext\n"), Cow::Borrowed(_)));
        assert_eq!(strip_control_chars("bel\x07 esc\x1b del\x7f"), "bel esc del");
    }

    fn html_fragment() -> impl Strategy<Value = String> {
        let token = prop_oneof![
            "[a-zA-Z]{1,12}",
            Just(" ".to_owned()),
            Just(". ".to_owned()),
            Just("&amp; ".to_owned()),
            "<[a-z]{1,6}>",
            "</[a-z]{1,6}>",
            Just("<img src='pic.jpg'/>".to_owned()),
        ];
        prop::collection::vec(token, 0..60).prop_map(|tokens| tokens.concat())
    }

    proptest! {
        #[test]
        fn prop_summary_is_bounded(html in html_fragment(), limit in 0usize..120) {
            let out = summarize_html(&html, limit);
            prop_assert!(out.chars().count() <= limit + 1);
        }

        #[test]
        fn prop_summary_has_no_markup_or_escaped_ampersand(html in html_fragment(), limit in 0usize..120) {
            let out = summarize_html(&html, limit);
            prop_assert!(!has_markup(&out));
            prop_assert!(!out.contains("&amp;"));
        }

        #[test]
        fn prop_truncation_prefers_period(prefix in "[a-z]{1,20}", tail in "[a-z]{30,60}") {
            let text = format!("{prefix}. {tail}");
            let limit = prefix.len() + 10;
            let out = summarize_html(&text, limit);
            prop_assert_eq!(out, format!("{prefix}.…"));
        }
    }
}
