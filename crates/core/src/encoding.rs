// Response-charset classification and canonical re-encoding.
//
// Inspects response metadata (and, as a secondary signal, document markup) to
// decide a source charset, and re-encodes engine-decoded text into canonical
// UTF-8.

use std::collections::HashMap;
use std::sync::LazyLock;

use chromiumoxide::Page;
use encoding_rs::Encoding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BrowserError, Result};

// Matches content-type headers of the HTML family, vendor suffixes tolerated.
static HTML_MIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:html|xhtml\+xml)\s*$").expect("static regex"));
static CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*([^;]+?)\s*;\s*.*?charset\s*=\s*"?([^;\s"]+)"?"#).expect("static regex")
});

/// Byte length, MIME type, and text encoding declared by a navigation
/// response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharsetMeta {
    pub content_length: u64,
    pub mime: String,
    pub charset: String,
}

/// Classify a response's headers (keyed by lower-cased header name) into
/// charset metadata.
///
/// A missing `Content-Length` returns `None`: without a byte-length contract
/// no charset resolution is attempted. Everything else that is malformed is a
/// protocol violation worth surfacing, never silently ignored.
pub fn classify_response(headers: &HashMap<String, String>) -> Result<Option<CharsetMeta>> {
    let Some(raw_length) = headers.get("content-length") else {
        debug!(target = "restock", "content-length header missing");
        return Ok(None);
    };
    let content_length: u64 = raw_length.trim().parse().map_err(|_| {
        BrowserError::InvalidHeader(format!("invalid content-length: {raw_length:?}"))
    })?;

    let content_type = headers
        .get("content-type")
        .ok_or_else(|| BrowserError::InvalidHeader("missing content-type".to_string()))?;
    let caps = CONTENT_TYPE.captures(content_type).ok_or_else(|| {
        BrowserError::InvalidHeader(format!("invalid content-type: {content_type:?}"))
    })?;

    let mime = caps[1].to_ascii_lowercase();
    if !HTML_MIME.is_match(&mime) {
        return Err(BrowserError::InvalidHeader(format!(
            "non-HTML content-type: {content_type:?}"
        )));
    }

    let charset = caps[2].to_string();
    if Encoding::for_label(charset.as_bytes()).is_none() {
        return Err(BrowserError::UnsupportedCharset(charset));
    }

    Ok(Some(CharsetMeta {
        content_length,
        mime,
        charset,
    }))
}

/// Re-encode engine-decoded text into canonical UTF-8.
///
/// The engine has already decoded the transport bytes using the declared
/// charset; when the origin actually sent UTF-8 bytes under a non-UTF-8
/// declaration, the DOM carries mojibake. Encoding that text back under the
/// declared charset recovers the original bytes, which are then decoded as
/// UTF-8. Applied exactly once per extraction: a second application corrupts
/// already-canonical text.
pub fn reencode(text: &str, charset: &str) -> Result<String> {
    let encoding = Encoding::for_label(charset.as_bytes())
        .ok_or_else(|| BrowserError::UnsupportedCharset(charset.to_string()))?;

    let (bytes, _, _) = encoding.encode(text);
    let (decoded, _) = encoding_rs::UTF_8.decode_without_bom_handling(&bytes);
    Ok(decoded.into_owned())
}

/// Probe the document for a `<meta charset>` or
/// `<meta http-equiv="Content-Type">` declaration.
///
/// Secondary signal only; the main extraction path relies on response headers.
pub async fn detect_meta_charset(page: &Page) -> Result<Option<String>> {
    let Ok(meta) = page
        .find_element(r#"meta[charset], meta[http-equiv="Content-Type"]"#)
        .await
    else {
        return Ok(None);
    };

    let mut charset = meta.attribute("charset").await?;
    if charset.is_none() {
        if let Some(content) = meta.attribute("content").await? {
            charset = CONTENT_TYPE
                .captures(&content)
                .map(|caps| caps[2].to_string());
        }
    }

    let Some(charset) = charset else {
        return Ok(None);
    };
    if Encoding::for_label(charset.as_bytes()).is_none() {
        return Err(BrowserError::UnsupportedCharset(charset));
    }
    Ok(Some(charset))
}
