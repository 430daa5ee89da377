//! Parsing of WebDAV `207 Multi-Status` bodies returned by PROPFIND

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Request body asking for the properties the engine needs
pub(crate) const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:displayname/>
        <D:getcontentlength/>
        <D:getlastmodified/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

/// One `<response>` element, with the raw (still encoded) href
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct PropfindEntry {
    pub href: String,
    pub display_name: Option<String>,
    pub content_length: Option<u64>,
    pub is_collection: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Props {
    display_name: Option<String>,
    content_length: Option<u64>,
    is_collection: bool,
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Href,
    DisplayName,
    ContentLength,
    LastModified,
    Status,
}

/// Parser state for one multistatus document
#[derive(Default)]
struct MultistatusState {
    entries: Vec<PropfindEntry>,
    current: Option<PropfindEntry>,
    response_ok: bool,
    props: Option<Props>,
    propstat_ok: bool,
    field: Option<Field>,
}

impl MultistatusState {
    fn start(&mut self, local_name: &[u8]) {
        match local_name {
            b"response" => {
                self.current = Some(PropfindEntry::default());
                self.response_ok = true;
            }
            b"propstat" => {
                self.props = Some(Props::default());
                self.propstat_ok = true;
            }
            b"href" => self.field = Some(Field::Href),
            b"displayname" => self.field = Some(Field::DisplayName),
            b"getcontentlength" => self.field = Some(Field::ContentLength),
            b"getlastmodified" => self.field = Some(Field::LastModified),
            b"status" => self.field = Some(Field::Status),
            b"collection" => self.mark_collection(),
            _ => {}
        }
    }

    fn mark_collection(&mut self) {
        if let Some(props) = self.props.as_mut() {
            props.is_collection = true;
        }
    }

    fn text(&mut self, text: String) {
        let Some(active) = self.field else { return };
        match active {
            Field::Href => {
                if let Some(entry) = self.current.as_mut() {
                    entry.href = text;
                }
            }
            Field::Status => {
                let ok = status_is_success(&text);
                if self.props.is_some() {
                    self.propstat_ok = ok;
                } else {
                    self.response_ok = ok;
                }
            }
            Field::DisplayName => {
                if let Some(props) = self.props.as_mut() {
                    props.display_name = Some(text);
                }
            }
            Field::ContentLength => {
                if let Some(props) = self.props.as_mut() {
                    props.content_length = text.trim().parse().ok();
                }
            }
            Field::LastModified => {
                if let Some(props) = self.props.as_mut() {
                    props.last_modified = DateTime::parse_from_rfc2822(text.trim())
                        .ok()
                        .map(|d| d.with_timezone(&Utc));
                }
            }
        }
    }

    fn end(&mut self, local_name: &[u8]) {
        match local_name {
            b"propstat" => {
                if let (Some(done), Some(entry)) = (self.props.take(), self.current.as_mut()) {
                    if self.propstat_ok {
                        entry.display_name = done.display_name.or(entry.display_name.take());
                        entry.content_length = done.content_length.or(entry.content_length);
                        entry.is_collection |= done.is_collection;
                        entry.last_modified = done.last_modified.or(entry.last_modified);
                    }
                }
            }
            b"response" => {
                if let Some(entry) = self.current.take() {
                    if self.response_ok && !entry.href.is_empty() {
                        self.entries.push(entry);
                    }
                }
            }
            _ => self.field = None,
        }
    }
}

/// Parses a multistatus document. Namespace prefixes are ignored; only
/// properties reported under a 2xx `<propstat>` are used, and responses
/// carrying a non-2xx response-level status are dropped. Text and CDATA
/// content are read the same way.
pub(crate) fn parse_multistatus(xml: &str) -> Result<Vec<PropfindEntry>, anyhow::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut state = MultistatusState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => state.start(e.local_name().as_ref()),
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    state.mark_collection();
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| anyhow!("malformed text in PROPFIND response: {e}"))?;
                state.text(text.into_owned());
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8(c.into_inner().into_owned())
                    .map_err(|e| anyhow!("malformed CDATA in PROPFIND response: {e}"))?;
                state.text(text);
            }
            Ok(Event::End(e)) => state.end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!(
                    "malformed PROPFIND response at position {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
    }

    Ok(state.entries)
}

/// `HTTP/1.1 200 OK` style status line check
fn status_is_success(line: &str) -> bool {
    line.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .is_some_and(|code| (200..300).contains(&code))
}
