//! Destination file name derivation
//!
//! A zone file is saved as `<last URL path segment>.gz` unless the server names
//! it in a well-formed `Content-Disposition` header. Either way the result is
//! reduced to a bare file name so it can never escape the destination
//! directory.

use std::path::Path;

use url::Url;

use crate::constants::files;

/// Pick the file name for a response from `url`
///
/// Returns `None` when neither the header nor the URL yields a usable name.
pub fn resolve_file_name(url: &Url, content_disposition: Option<&str>) -> Option<String> {
    if let Some(name) = content_disposition.and_then(content_disposition_file_name) {
        return Some(name);
    }
    default_file_name(url)
}

/// `<last path segment>.gz`, e.g. `https://host/czds/downloads/com.zone` -> `com.zone.gz`
pub fn default_file_name(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let name = sanitize_file_name(&decoded)?;
    Some(format!("{}{}", name, files::DEFAULT_EXTENSION))
}

/// Extract the `filename` parameter of a `Content-Disposition` value
///
/// The value must start with a disposition type (`attachment`, `inline`);
/// anything else is treated as malformed and ignored. An RFC 5987
/// `filename*` parameter wins over a plain `filename`.
pub fn content_disposition_file_name(value: &str) -> Option<String> {
    let mut parts = value.split(';').map(str::trim);

    let disposition = parts.next()?;
    if disposition.is_empty() || !disposition.chars().all(is_token_char) {
        tracing::debug!("Ignoring malformed Content-Disposition: {}", value);
        return None;
    }

    let mut plain = None;
    let mut extended = None;
    for part in parts {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(unquote(raw.trim())),
            "filename*" => extended = decode_extended(raw.trim()),
            _ => {}
        }
    }

    extended
        .or(plain)
        .and_then(|name| sanitize_file_name(&name))
}

/// Reduce a server- or URL-supplied name to its final path component
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." || last.chars().any(char::is_control) {
        return None;
    }

    Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Strip surrounding quotes and backslash escapes from a parameter value
fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `charset'lang'percent-encoded` (RFC 5987)
fn decode_extended(raw: &str) -> Option<String> {
    let (_, encoded) = raw.rsplit_once('\'')?;
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}
