//! Remote path normalization and URL building
//!
//! Every path handed to the engine is first reduced to a single canonical
//! form: the empty string for the root, otherwise one leading `/`, no
//! trailing `/`, no backslashes and no empty segments. URLs are produced by
//! percent-encoding each segment of that form exactly once.
//!
//! Inside the engine paths hold exact remote names, as [`decode_path`]
//! resolves them from caller input and as listings report them. Those are
//! never normalized again, since trimming would change the names.

use reqwest::Url;

use crate::error::TransferError;

/// Normalizes a user supplied path into the canonical remote form.
///
/// ```
/// use webdav_sync::path::normalize;
///
/// assert_eq!(normalize(" docs\\reports//2024/ "), "/docs/reports/2024");
/// assert_eq!(normalize("/"), "");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut normalized = normalize_once(raw);
    // Trimming can expose a new trailing separator, so repeat until stable.
    loop {
        let again = normalize_once(&normalized);
        if again == normalized {
            return normalized;
        }
        normalized = again;
    }
}

fn normalize_once(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for segment in raw
        .trim()
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
    {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Builds the full URL of `raw_path` under `base_url`.
///
/// Each segment is percent-encoded as UTF-8 bytes, with spaces as `%20`.
/// Segments that are already in encoded form are kept as they are, so
/// encoding the output of a previous call yields the same URL.
pub fn encode_url(base_url: &str, raw_path: &str) -> Result<String, TransferError> {
    let mut url = checked_base(base_url)?.to_string();
    for segment in normalize(raw_path).split('/').filter(|s| !s.is_empty()) {
        url.push('/');
        url.push_str(&encode_segment(segment));
    }
    Ok(url)
}

/// Builds the URL of a path made of exact remote names.
///
/// Unlike [`encode_url`] the path is taken as is and every segment is
/// escaped, so a name that happens to look encoded still round-trips.
pub(crate) fn path_url(base_url: &str, path: &str) -> Result<String, TransferError> {
    let mut url = checked_base(base_url)?.to_string();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        url.push('/');
        url.push_str(&escape(segment));
    }
    Ok(url)
}

fn checked_base(base_url: &str) -> Result<&str, TransferError> {
    let base = base_url.trim().trim_end_matches('/');
    let parsed = Url::parse(base).map_err(|e| TransferError::UrlEncoding {
        input: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(TransferError::UrlEncoding {
            input: base_url.to_string(),
            reason: "base URL cannot carry a path".to_string(),
        });
    }
    Ok(base)
}

/// Resolves caller input to the exact remote names it refers to.
///
/// The path is normalized and every segment already in encoded form is
/// decoded once, so `/my%20docs` and `/my docs` name the same directory.
/// A segment is kept as given when it does not decode to a valid name.
///
/// ```
/// use webdav_sync::path::decode_path;
///
/// assert_eq!(decode_path("my%20docs/100%/"), "/my docs/100%");
/// ```
pub fn decode_path(raw: &str) -> String {
    let mut out = String::new();
    for segment in normalize(raw).split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        match decode_segment(segment) {
            Some(decoded) => out.push_str(&decoded),
            None => out.push_str(segment),
        }
    }
    out
}

/// Canonical form of a path made of exact remote names.
///
/// Empty segments are dropped but nothing is trimmed, so names with
/// leading or trailing whitespace survive.
pub fn canonical(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Joins two already formed path components with exactly one `/` between them.
pub fn combine(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Last segment of a path, or the empty string for the root.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Everything before the last segment; empty when there is no parent.
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Decodes `%XX` triplets. Invalid triplets are kept literally and invalid
/// UTF-8 is replaced, so this never fails.
pub fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    String::from_utf8_lossy(&decode_bytes(input)).into_owned()
}

fn decode_bytes(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[index + 1]), hex_value(bytes[index + 2])) {
                decoded.push((hi << 4) | lo);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    decoded
}

fn decode_segment(segment: &str) -> Option<String> {
    if !segment.contains('%') || !is_encoded(segment) {
        return None;
    }
    String::from_utf8(decode_bytes(segment))
        .ok()
        .filter(|decoded| !decoded.is_empty() && !decoded.contains('/'))
}

fn encode_segment(segment: &str) -> String {
    if is_encoded(segment) {
        segment.to_string()
    } else {
        escape(segment)
    }
}

fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() * 3);
    for &byte in segment.as_bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// True when every byte is unreserved or part of a valid `%XX` triplet.
fn is_encoded(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                let valid = index + 2 < bytes.len()
                    && hex_value(bytes[index + 1]).is_some()
                    && hex_value(bytes[index + 2]).is_some();
                if !valid {
                    return false;
                }
                index += 3;
            }
            byte if is_unreserved(byte) => index += 1,
            _ => return false,
        }
    }
    true
}

// Form-encoding safe set: everything else is escaped.
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'*')
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
