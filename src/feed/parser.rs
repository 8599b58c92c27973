use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::util::sanitize_description;

/// Hard cap on the stored description preview, in characters.
const MAX_DESCRIPTION_CHARS: usize = 500;

/// One normalized entry extracted from a feed.
///
/// Serialized camelCase to match the archive layout consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Dedup key: the feed's native identifier, or a synthesized one.
    pub id: String,
    pub title: String,
    pub link: String,
    /// Tag-stripped, whitespace-collapsed preview, at most 500 chars.
    pub description: String,
    pub pub_date: DateTime<Utc>,
    /// The feed source that produced this item.
    pub feed_url: String,
}

/// Feed dialect, decided once per document by a structural probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Rss,
    Atom,
}

impl Dialect {
    fn entry_tag(self) -> &'static [u8] {
        match self {
            Dialect::Rss => b"item",
            Dialect::Atom => b"entry",
        }
    }
}

/// Fields collected from a single `<item>`/`<entry>` element.
///
/// `text` holds the first text content seen per qualified tag name, in
/// document order, at any nesting depth within the entry: the lookup the
/// fallback chains run against. `link_href` is the `href` attribute of the
/// first `link` element, the Atom special case.
#[derive(Default)]
struct EntryFields {
    text: Vec<(String, String)>,
    link_href: Option<String>,
    saw_link: bool,
}

impl EntryFields {
    fn record(&mut self, name: String, text: String) {
        if !self.text.iter().any(|(n, _)| *n == name) {
            self.text.push((name, text));
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    /// Ordered fallback chain: the first candidate with non-blank text wins.
    fn first_non_empty(&self, candidates: &[&str]) -> Option<&str> {
        candidates
            .iter()
            .find_map(|name| self.get(name).map(str::trim).filter(|t| !t.is_empty()))
    }

    /// Captures the `href` of the first `link` element; later links are
    /// ignored even when the first one had no `href`.
    fn capture_link_href(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) {
        if self.saw_link {
            return;
        }
        self.saw_link = true;
        for attr in e.attributes() {
            match attr {
                Ok(attr) if attr.key.as_ref() == b"href" => {
                    match attr.decode_and_unescape_value(reader.decoder()) {
                        Ok(v) => self.link_href = Some(v.into_owned()),
                        Err(err) => {
                            tracing::debug!(error = %err, "Skipping undecodable link href")
                        }
                    }
                    return;
                }
                Ok(_) => {}
                Err(err) => tracing::debug!(error = %err, "Skipping malformed attribute"),
            }
        }
    }

    fn into_item(self, dialect: Dialect, feed_url: &str) -> Item {
        let title = self.first_non_empty(&["title"]).unwrap_or("Untitled");

        let link = match self.first_non_empty(&["link"]) {
            Some(text) => text,
            // Atom expresses links as <link href="..."/> rather than text
            None if dialect == Dialect::Atom => {
                self.link_href.as_deref().map(str::trim).unwrap_or("")
            }
            None => "",
        };

        let description = self
            .first_non_empty(&["description", "summary", "content", "itunes:summary"])
            .map(|raw| sanitize_description(raw, MAX_DESCRIPTION_CHARS))
            .unwrap_or_default();

        let raw_date = self.first_non_empty(&["pubDate", "published", "updated"]);
        let pub_date = raw_date.map(parse_date).unwrap_or_else(Utc::now);

        let id = derive_id(self.first_non_empty(&["guid", "id"]), link, raw_date, title);

        Item {
            id,
            title: title.to_string(),
            link: link.to_string(),
            description,
            pub_date,
            feed_url: feed_url.to_string(),
        }
    }
}

/// Derives the dedup identity for an entry. Pure: same fields, same id.
///
/// The native identifier (RSS `guid`, Atom `id`) wins when present.
/// Otherwise the id is link + raw date string + title. A dateless entry
/// contributes an empty date component, never the current time, which
/// would mint a fresh id on every run and defeat dedup.
fn derive_id(native_id: Option<&str>, link: &str, raw_date: Option<&str>, title: &str) -> String {
    match native_id {
        Some(native) => native.to_string(),
        None => format!("{}{}{}", link, raw_date.unwrap_or(""), title),
    }
}

/// Parses a date field as RFC 2822 (RSS convention) then RFC 3339 (Atom
/// convention), defaulting to the current time when neither fits.
fn parse_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Structural dialect probe: any `item` element means RSS; failing that,
/// any `entry` element means Atom. A document with neither has no entries.
fn detect_dialect(xml: &str) -> Option<Dialect> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut saw_entry = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"item" => return Some(Dialect::Rss),
                b"entry" => saw_entry = true,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    saw_entry.then_some(Dialect::Atom)
}

/// Converts raw feed XML into normalized items, best-effort.
///
/// Never fails: unknown structure yields an empty result, and an XML error
/// mid-document ends extraction with whatever entries were completed.
/// Field extraction per entry runs the ordered fallback chains, so missing
/// and vendor-aliased tags degrade instead of rejecting the entry.
pub fn parse_feed(xml: &str, feed_url: &str) -> Vec<Item> {
    let Some(dialect) = detect_dialect(xml) else {
        return Vec::new();
    };
    let entry_tag = dialect.entry_tag();

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut items = Vec::new();
    let mut entry: Option<EntryFields> = None;
    // Open child elements of the current entry, innermost last. Text nodes
    // append to every open buffer so a tag's text includes its descendants'.
    let mut open: Vec<(String, String)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if let Some(fields) = entry.as_mut() {
                    let name = qualified_name(&e);
                    if name == "link" {
                        fields.capture_link_href(&e, &reader);
                    }
                    open.push((name, String::new()));
                } else if e.name().as_ref() == entry_tag {
                    entry = Some(EntryFields::default());
                    open.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(fields) = entry.as_mut() {
                    let name = qualified_name(&e);
                    if name == "link" {
                        fields.capture_link_href(&e, &reader);
                    }
                    fields.record(name, String::new());
                }
            }
            Ok(Event::Text(t)) => {
                if entry.is_some() && !open.is_empty() {
                    match t.unescape() {
                        Ok(text) => {
                            for (_, acc) in open.iter_mut() {
                                acc.push_str(&text);
                            }
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "Skipping undecodable text node")
                        }
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if entry.is_some() && !open.is_empty() {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    for (_, acc) in open.iter_mut() {
                        acc.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => {
                if entry.is_some() && e.name().as_ref() == entry_tag && open.is_empty() {
                    if let Some(done) = entry.take() {
                        items.push(done.into_item(dialect, feed_url));
                    }
                } else if let Some(fields) = entry.as_mut() {
                    if let Some((name, text)) = open.pop() {
                        fields.record(name, text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::warn!(
                    feed = %feed_url,
                    error = %err,
                    parsed = items.len(),
                    "Malformed feed XML, keeping entries parsed so far"
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    items
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}
