//! PROPFIND multistatus parsing.
//!
//! The parser is event-driven and matches on local element names, so it
//! accepts any namespace prefix a server happens to emit (`d:`, `D:`, or
//! none). Per-property `propstat` status codes are ignored; a missing
//! property falls back to its default.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{zero_time, DavError, DavResult};

/// One `<response>` element, fields still in wire form.
#[derive(Debug)]
pub(crate) struct PropfindEntry {
    pub href: String,
    pub is_dir: bool,
    pub size: i64,
    pub mtime: DateTime<Utc>,
    pub etag: String,
}

impl PropfindEntry {
    fn new() -> Self {
        Self {
            href: String::new(),
            is_dir: false,
            size: 0,
            mtime: zero_time(),
            etag: String::new(),
        }
    }
}

/// Parse a multistatus body into raw response entries.
pub(crate) fn parse_multistatus(body: &str) -> DavResult<Vec<PropfindEntry>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut saw_multistatus = false;
    let mut current: Option<PropfindEntry> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Err(e) => {
                return Err(DavError::Protocol(format!("malformed multistatus: {e}")));
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                let name = local_name(start.local_name().as_ref());
                match name.as_str() {
                    "multistatus" => saw_multistatus = true,
                    "response" => current = Some(PropfindEntry::new()),
                    "collection" => {
                        if let Some(entry) = current.as_mut() {
                            entry.is_dir = true;
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Empty(start)) => {
                if local_name(start.local_name().as_ref()) == "collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_dir = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| DavError::Protocol(format!("bad text content: {e}")))?;
                text.push_str(&value);
            }
            Ok(Event::CData(t)) => {
                text.push_str(&String::from_utf8_lossy(&t));
            }
            Ok(Event::End(end)) => {
                let name = local_name(end.local_name().as_ref());
                if let Some(entry) = current.as_mut() {
                    match name.as_str() {
                        "href" => entry.href = text.trim().to_string(),
                        "getcontentlength" => {
                            entry.size = text.trim().parse().unwrap_or(0);
                        }
                        "getlastmodified" => {
                            entry.mtime = parse_last_modified(text.trim());
                        }
                        "getetag" => {
                            entry.etag = text.trim().trim_matches('"').to_string();
                        }
                        _ => {}
                    }
                }
                if name == "response" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                text.clear();
            }
            Ok(_) => {}
        }
    }

    if !saw_multistatus {
        return Err(DavError::Protocol(
            "response body is not a multistatus document".to_string(),
        ));
    }

    Ok(entries)
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

/// Parse a `getlastmodified` value: RFC1123, then RFC1123Z, else the epoch.
fn parse_last_modified(raw: &str) -> DateTime<Utc> {
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S GMT") {
        return t.and_utc();
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S %z") {
        return t.with_timezone(&Utc);
    }
    zero_time()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns">
  <d:response>
    <d:href>/remote.php/dav/files/alice/Notes/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
        <d:getlastmodified>Mon, 01 Jan 2024 10:00:00 GMT</d:getlastmodified>
        <d:getetag>"dir-etag-1"</d:getetag>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/files/alice/Notes/a.txt</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>10</d:getcontentlength>
        <d:getlastmodified>Mon, 01 Jan 2024 10:00:00 +0000</d:getlastmodified>
        <d:getetag>"file-etag-1"</d:getetag>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn test_parses_directories_and_files() {
        let entries = parse_multistatus(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        let dir = &entries[0];
        assert_eq!(dir.href, "/remote.php/dav/files/alice/Notes/");
        assert!(dir.is_dir);
        assert_eq!(dir.size, 0);
        assert_eq!(dir.etag, "dir-etag-1");

        let file = &entries[1];
        assert!(!file.is_dir);
        assert_eq!(file.size, 10);
        assert_eq!(file.etag, "file-etag-1");
        assert_eq!(file.mtime, dir.mtime);
    }

    #[test]
    fn test_accepts_unprefixed_elements() {
        let body = r#"<multistatus xmlns="DAV:">
          <response>
            <href>/files/bob/x.bin</href>
            <propstat><prop>
              <getcontentlength>7</getcontentlength>
              <getetag>abc</getetag>
            </prop></propstat>
          </response>
        </multistatus>"#;

        let entries = parse_multistatus(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 7);
        assert_eq!(entries[0].etag, "abc");
    }

    #[test]
    fn test_unparseable_fields_fall_back_to_defaults() {
        let body = r#"<d:multistatus xmlns:d="DAV:">
          <d:response>
            <d:href>/files/alice/broken</d:href>
            <d:propstat><d:prop>
              <d:getcontentlength>not-a-number</d:getcontentlength>
              <d:getlastmodified>yesterday-ish</d:getlastmodified>
            </d:prop></d:propstat>
          </d:response>
        </d:multistatus>"#;

        let entries = parse_multistatus(body).unwrap();
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].mtime, zero_time());
        assert_eq!(entries[0].etag, "");
    }

    #[test]
    fn test_malformed_xml_is_a_protocol_error() {
        let err = parse_multistatus("<d:multistatus><unclosed").unwrap_err();
        assert!(matches!(err, DavError::Protocol(_)));
    }

    #[test]
    fn test_non_multistatus_body_is_a_protocol_error() {
        let err = parse_multistatus("<html><body>login</body></html>").unwrap_err();
        assert!(matches!(err, DavError::Protocol(_)));
    }

    #[test]
    fn test_rfc1123z_parsing() {
        let t = parse_last_modified("Mon, 01 Jan 2024 11:00:00 +0100");
        assert_eq!(t.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }
}
