// Launch configuration for a browser session.

use std::path::PathBuf;

use crate::storage::StorageState;

/// Geographic coordinates reported to pages that request geolocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Launch options for a [`BrowserSession`](crate::BrowserSession).
///
/// Every option is independently optional; geolocation permission is granted
/// to the context only when `geolocation` is set.
#[derive(Debug, Clone, Default)]
pub struct BrowserOpts {
    /// Launch without a GUI.
    pub headless: bool,
    pub geolocation: Option<Geolocation>,
    /// IANA timezone id, e.g. "Europe/Berlin".
    pub timezone_id: Option<String>,
    /// URL patterns (`*` wildcards) whose in-flight resource requests are
    /// aborted at the network-routing layer.
    pub abort_loading: Vec<String>,
    /// Storage state applied when the context launches (session resume).
    pub storage_state: Option<StorageState>,
    /// When set, the context's storage state is serialized to this path once
    /// the tab opened by `new_tab` closes.
    pub storage_state_save_path: Option<PathBuf>,
}

impl BrowserOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn geolocation(mut self, latitude: f64, longitude: f64) -> Self {
        self.geolocation = Some(Geolocation {
            latitude,
            longitude,
        });
        self
    }

    pub fn timezone_id(mut self, id: impl Into<String>) -> Self {
        self.timezone_id = Some(id.into());
        self
    }

    pub fn abort_loading(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.abort_loading = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn storage_state(mut self, state: StorageState) -> Self {
        self.storage_state = Some(state);
        self
    }

    pub fn storage_state_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_state_save_path = Some(path.into());
        self
    }
}
