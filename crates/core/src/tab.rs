// Tab lifecycle: navigation, main-document response capture, and
// charset-aware DOM extraction.

use std::collections::HashMap;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use futures_util::StreamExt;
use tracing::debug;
use url::Url;

use crate::encoding::{self, CharsetMeta};
use crate::error::{BrowserError, Result};

/// How long to keep waiting for the main-document response event once the
/// navigation itself has settled.
const RESPONSE_EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval for observing a page going away.
const LIVENESS_POLL: Duration = Duration::from_millis(250);

/// Main-document response observed for a navigation.
#[derive(Debug, Clone)]
pub struct NavResponse {
    pub url: String,
    pub status: i64,
    pub status_text: String,
    /// Response headers, keyed by lower-cased header name.
    pub headers: HashMap<String, String>,
    pub mime_type: String,
}

impl NavResponse {
    /// Whether the status is in the success range (2xx/3xx).
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.status)
    }

    fn from_event(event: &EventResponseReceived) -> Self {
        let headers = serde_json::to_value(&event.response.headers)
            .map(|value| headers_to_map(&value))
            .unwrap_or_default();
        Self {
            url: event.response.url.clone(),
            status: event.response.status,
            status_text: event.response.status_text.clone(),
            headers,
            mime_type: event.response.mime_type.clone(),
        }
    }
}

/// Flatten a JSON header object into a map keyed by lower-cased header name.
fn headers_to_map(value: &serde_json::Value) -> HashMap<String, String> {
    let Some(object) = value.as_object() else {
        return HashMap::new();
    };
    object
        .iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.to_ascii_lowercase(), value)
        })
        .collect()
}

/// One browser tab bound to a navigation lifecycle.
///
/// State (`last_response`, `charset_meta`) is only coherent between one
/// completed operation and the next; drive a tab from a single task at a time.
#[derive(Debug)]
pub struct Tab {
    page: Page,
    last_response: Option<NavResponse>,
    charset_meta: Option<CharsetMeta>,
}

impl Tab {
    /// Wrap a page, classifying the navigation response when one exists.
    pub(crate) fn attach(page: Page, response: Option<NavResponse>) -> Result<Self> {
        let charset_meta = match &response {
            Some(response) => encoding::classify_response(&response.headers)?,
            None => None,
        };
        Ok(Self {
            page,
            last_response: response,
            charset_meta,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn last_response(&self) -> Option<&NavResponse> {
        self.last_response.as_ref()
    }

    pub fn charset_meta(&self) -> Option<&CharsetMeta> {
        self.charset_meta.as_ref()
    }

    /// Navigate `page` to `url` and wait until the DOM is parsed (not full
    /// resource load).
    ///
    /// A response is mandatory; SSL errors, invalid URLs, engine timeouts,
    /// unreachable hosts, and main-resource load failures all surface as
    /// [`BrowserError::Navigation`]. A status outside the success range is
    /// [`BrowserError::HttpStatus`]: an error page is never scraped.
    pub async fn goto_page(page: &Page, url: &Url) -> Result<NavResponse> {
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                source: anyhow::Error::msg(e.to_string()),
            })?;

        page.goto(url.as_str())
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                source: anyhow::Error::msg(e.to_string()),
            })?;
        let _ = page.wait_for_navigation().await;

        let document = tokio::time::timeout(RESPONSE_EVENT_TIMEOUT, async {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    return Some(event);
                }
                debug!(
                    target = "restock",
                    url = %event.response.url,
                    "skipping non-document response"
                );
            }
            None
        })
        .await
        .ok()
        .flatten();

        let Some(event) = document else {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                source: anyhow::anyhow!("page received no response"),
            });
        };

        let response = NavResponse::from_event(&event);
        if !response.ok() {
            return Err(BrowserError::HttpStatus {
                url: url.to_string(),
                status: response.status,
                status_text: response.status_text,
            });
        }
        Ok(response)
    }

    /// Navigate this tab and recompute its charset metadata.
    ///
    /// The metadata is cleared before the navigation is attempted, so a failed
    /// navigation never leaves a stale-success value behind.
    pub async fn goto(&mut self, url: &Url) -> Result<&NavResponse> {
        self.last_response = None;
        self.charset_meta = None;

        let response = Self::goto_page(&self.page, url).await?;
        let stored = self.last_response.insert(response);
        self.charset_meta = encoding::classify_response(&stored.headers)?;
        Ok(stored)
    }

    /// Extract `innerHTML` of the single element matching `selector`,
    /// re-encoded to canonical UTF-8.
    pub async fn inner_html(&self, selector: &str) -> Result<String> {
        self.extract(selector, ExtractKind::Html).await
    }

    /// Extract `innerText` of the single element matching `selector`,
    /// re-encoded to canonical UTF-8.
    pub async fn inner_text(&self, selector: &str) -> Result<String> {
        self.extract(selector, ExtractKind::Text).await
    }

    async fn extract(&self, selector: &str, kind: ExtractKind) -> Result<String> {
        let meta = self.charset_meta.as_ref().ok_or(BrowserError::NotReady)?;

        // The element handle is scoped to this call and released on drop,
        // success or failure alike.
        let element =
            self.page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::ElementNotFound {
                    selector: selector.to_string(),
                })?;

        let raw = match kind {
            ExtractKind::Html => element.inner_html().await?,
            ExtractKind::Text => element.inner_text().await?,
        }
        .unwrap_or_default();

        encoding::reencode(&raw, &meta.charset)
    }

    /// Close the underlying page.
    pub async fn dispose(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum ExtractKind {
    Html,
    Text,
}

/// Resolve once the page has gone away (closed by us, the user, or the remote
/// end). A closed target fails its next command, which is the only close
/// signal CDP gives the page handle itself.
pub async fn wait_page_closed(page: &Page) {
    loop {
        if page.url().await.is_err() {
            return;
        }
        tokio::time::sleep(LIVENESS_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_map_lowercases_names() {
        let value = serde_json::json!({
            "Content-Type": "text/html; charset=utf-8",
            "Content-Length": "512",
            "X-Frame-Options": "DENY",
        });
        let map = headers_to_map(&value);
        assert_eq!(
            map.get("content-type").map(String::as_str),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(map.get("content-length").map(String::as_str), Some("512"));
        assert_eq!(map.get("x-frame-options").map(String::as_str), Some("DENY"));
    }

    #[test]
    fn headers_map_tolerates_non_string_values() {
        let value = serde_json::json!({ "Retry-After": 120 });
        let map = headers_to_map(&value);
        assert_eq!(map.get("retry-after").map(String::as_str), Some("120"));
    }

    #[test]
    fn headers_map_of_non_object_is_empty() {
        assert!(headers_to_map(&serde_json::json!(null)).is_empty());
        assert!(headers_to_map(&serde_json::json!([1, 2])).is_empty());
    }

    #[test]
    fn success_range_is_2xx_and_3xx() {
        let mut response = NavResponse {
            url: "https://example.com/".into(),
            status: 200,
            status_text: "OK".into(),
            headers: HashMap::new(),
            mime_type: "text/html".into(),
        };
        assert!(response.ok());
        response.status = 304;
        assert!(response.ok());
        response.status = 404;
        assert!(!response.ok());
        response.status = 500;
        assert!(!response.ok());
        response.status = 199;
        assert!(!response.ok());
    }
}
