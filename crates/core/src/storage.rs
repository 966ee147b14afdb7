// Cookie and StorageState types for session persistence.
//
// The storage state is the opaque JSON blob that lets a later process resume a
// logged-in browsing context: cookies plus per-origin localStorage entries.

use chromiumoxide::cdp::browser_protocol::network::{
    Cookie as CdpCookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use serde::{Deserialize, Serialize};

use crate::error::{BrowserError, Result};

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    #[serde(rename = "None")]
    None,
    #[default]
    #[serde(rename = "Lax")]
    Lax,
    #[serde(rename = "Strict")]
    Strict,
}

/// A browser cookie as stored in the session blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,

    pub value: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Unix timestamp in seconds. Absent for session cookies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: Some(domain.into()),
            path: None,
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
        }
    }

    /// Convert a wire cookie into its persisted form.
    pub(crate) fn from_cdp(cookie: CdpCookie) -> Self {
        Self {
            name: cookie.name,
            value: cookie.value,
            domain: Some(cookie.domain),
            path: Some(cookie.path),
            // The wire encodes session cookies as a negative expiry.
            expires: (cookie.expires >= 0.0).then_some(cookie.expires),
            http_only: Some(cookie.http_only),
            secure: Some(cookie.secure),
            same_site: cookie.same_site.map(|s| match s {
                CookieSameSite::Strict => SameSite::Strict,
                CookieSameSite::Lax => SameSite::Lax,
                CookieSameSite::None => SameSite::None,
            }),
        }
    }

    /// Convert the persisted form back into a wire cookie parameter.
    pub(crate) fn to_cdp_param(&self) -> Result<CookieParam> {
        let mut builder = CookieParam::builder()
            .name(self.name.clone())
            .value(self.value.clone());
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(expires) = self.expires {
            builder = builder.expires(TimeSinceEpoch::new(expires));
        }
        if let Some(http_only) = self.http_only {
            builder = builder.http_only(http_only);
        }
        if let Some(secure) = self.secure {
            builder = builder.secure(secure);
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(match same_site {
                SameSite::Strict => CookieSameSite::Strict,
                SameSite::Lax => CookieSameSite::Lax,
                SameSite::None => CookieSameSite::None,
            });
        }
        builder
            .build()
            .map_err(|e| BrowserError::InvalidHeader(format!("invalid stored cookie: {e}")))
    }
}

/// One localStorage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageEntry {
    pub name: String,
    pub value: String,
}

/// localStorage entries for a single origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    /// The origin URL, e.g. "https://example.com".
    pub origin: String,
    pub local_storage: Vec<LocalStorageEntry>,
}

/// Complete serialized browser storage state.
///
/// Read in full before the session starts when resuming; written in full
/// (best-effort, not atomic) by the save-on-close hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    pub cookies: Vec<Cookie>,
    pub origins: Vec<OriginState>,
}

impl StorageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads storage state from a JSON file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves storage state to a JSON file.
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
