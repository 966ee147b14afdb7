// Browser session: exclusive ownership of one persistent execution context,
// tab creation, and save-on-close session persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chromiumoxide::browser::HeadlessMode;
use chromiumoxide::cdp::browser_protocol::browser::{
    GrantPermissionsParams, PermissionType, SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::{
    MediaFeature, SetEmulatedMediaParams, SetGeolocationOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, SetBlockedUrLsParams, SetBypassServiceWorkerParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::storage::{GetCookiesParams, SetCookiesParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BrowserOpts;
use crate::error::{BrowserError, Result};
use crate::profile::ProfileDir;
use crate::storage::{Cookie, OriginState, StorageState};
use crate::tab::{self, Tab};

const VIEWPORT_WIDTH: u32 = 1920;
const VIEWPORT_HEIGHT: u32 = 1080;
const DEVICE_SCALE_FACTOR: f64 = 2.0;
const GEOLOCATION_ACCURACY: f64 = 100.0;

const LAUNCH_ARGS: [&str; 8] = [
    "--no-first-run",
    "--no-sandbox",
    "--no-default-browser-check",
    "--enable-gpu-rasterization",
    "--enable-gpu-compositing",
    "--enable-gpu",
    "--enable-webgl",
    "--enable-accelerated-2d-canvas",
];

/// Owns one persistent browser execution context and the tabs created in it.
///
/// At most one context is live per session object; `start` tears down any
/// previous context before relaunching. Only the most recently opened tab is
/// tracked: orchestration logic driving several tabs at once must retain its
/// own [`Tab`] values (see [`BrowserSession::take_active_tab`]).
pub struct BrowserSession {
    opts: BrowserOpts,
    profile: Arc<ProfileDir>,
    browser: Arc<Mutex<Option<Browser>>>,
    handler_task: Option<JoinHandle<()>>,
    save_task: Option<JoinHandle<()>>,
    tab: Option<Tab>,
}

impl BrowserSession {
    pub fn new(opts: BrowserOpts, profile: Arc<ProfileDir>) -> Self {
        Self {
            opts,
            profile,
            browser: Arc::new(Mutex::new(None)),
            handler_task: None,
            save_task: None,
            tab: None,
        }
    }

    /// Launch the execution context, tearing down any previous one first.
    ///
    /// Restart is never additive: calling `start` twice leaves exactly one
    /// live context and no leaked tabs.
    pub async fn start(&mut self) -> Result<()> {
        if self.browser.lock().await.is_some() {
            info!(
                target = "restock",
                "session already started; tearing down previous context"
            );
            self.dispose().await;
        }

        let mut builder = BrowserConfig::builder()
            .user_data_dir(self.profile.path())
            .viewport(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                device_scale_factor: Some(DEVICE_SCALE_FACTOR),
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .args(LAUNCH_ARGS);
        builder = if self.opts.headless {
            builder.headless_mode(HeadlessMode::New)
        } else {
            builder.with_head()
        };
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The handler drives the CDP websocket; nothing completes until it is
        // polled, so it runs as its own task for the context's lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!(target = "restock", "browser event loop closed");
                    break;
                }
            }
        });

        // Location permission is coupled 1:1 to a configured geolocation.
        if self.opts.geolocation.is_some() {
            browser
                .execute(GrantPermissionsParams {
                    permissions: vec![PermissionType::Geolocation],
                    origin: None,
                    browser_context_id: None,
                })
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
        }

        let deny_downloads = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Deny)
            .build()
            .map_err(BrowserError::Launch)?;
        browser
            .execute(deny_downloads)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        if let Some(state) = &self.opts.storage_state {
            if !state.cookies.is_empty() {
                let cookies = state
                    .cookies
                    .iter()
                    .map(Cookie::to_cdp_param)
                    .collect::<Result<Vec<_>>>()?;
                info!(
                    target = "restock",
                    cookies = cookies.len(),
                    "applying resumed session cookies"
                );
                browser
                    .execute(SetCookiesParams {
                        cookies,
                        browser_context_id: None,
                    })
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?;
            }
        }

        *self.browser.lock().await = Some(browser);
        self.handler_task = Some(handler_task);
        info!(
            target = "restock",
            profile = %self.profile.path().display(),
            headless = self.opts.headless,
            "browser context started"
        );
        Ok(())
    }

    /// Open a new tab; when `url` is given, navigate it before returning.
    ///
    /// Navigation failure propagates to the caller. When a storage-state save
    /// path is configured, a one-shot watcher is registered: the context's
    /// storage state is serialized to that path once this tab's page closes.
    pub async fn new_tab(&mut self, url: Option<&Url>) -> Result<&mut Tab> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard.as_ref().ok_or(BrowserError::NotStarted)?;
            browser.new_page("about:blank").await?
        };
        self.apply_page_overrides(&page).await?;

        let tab = match url {
            Some(url) => {
                let response = Tab::goto_page(&page, url).await?;
                Tab::attach(page.clone(), Some(response))?
            }
            None => Tab::attach(page.clone(), None)?,
        };

        if let Some(path) = self.opts.storage_state_save_path.clone() {
            self.spawn_save_on_close(page, path);
        }

        Ok(self.tab.insert(tab))
    }

    /// The most recently opened tab, if any.
    pub fn active_tab(&mut self) -> Option<&mut Tab> {
        self.tab.as_mut()
    }

    /// Hand ownership of the tracked tab to the caller (multi-tab flows).
    pub fn take_active_tab(&mut self) -> Option<Tab> {
        self.tab.take()
    }

    /// Number of pages currently hosted by the context.
    pub async fn open_pages(&self) -> Result<usize> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::NotStarted)?;
        Ok(browser.pages().await?.len())
    }

    /// Tear down the context: close every page, let the save watcher finish,
    /// close the browser, clear references.
    ///
    /// Individual page-close failures are logged, never raised. Safe to call
    /// when never started, and safe to call repeatedly.
    pub async fn dispose(&mut self) {
        self.tab = None;

        {
            let guard = self.browser.lock().await;
            if let Some(browser) = guard.as_ref() {
                match browser.pages().await {
                    Ok(pages) => {
                        for page in pages {
                            if let Err(err) = page.close().await {
                                debug!(
                                    target = "restock",
                                    error = %err,
                                    "page close failed during teardown"
                                );
                            }
                        }
                    }
                    Err(err) => {
                        debug!(
                            target = "restock",
                            error = %err,
                            "page enumeration failed during teardown"
                        );
                    }
                }
            }
        }

        // The watcher observes the pages we just closed; wait for its write
        // to finish before the browser goes away.
        if let Some(save) = self.save_task.take() {
            if let Err(err) = save.await {
                warn!(target = "restock", error = %err, "session save task aborted");
            }
        }

        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(err) = browser.close().await {
                warn!(target = "restock", error = %err, "browser close failed");
            }
        }

        if let Some(handler) = self.handler_task.take() {
            handler.abort();
        }
    }

    /// Apply per-page environment overrides before the page is used.
    async fn apply_page_overrides(&self, page: &Page) -> Result<()> {
        page.execute(EnableParams::default()).await?;
        page.execute(SetIgnoreCertificateErrorsParams::new(true))
            .await?;
        page.execute(SetBypassServiceWorkerParams::new(true)).await?;
        page.execute(SetEmulatedMediaParams {
            media: None,
            features: Some(vec![MediaFeature {
                name: "prefers-reduced-motion".to_string(),
                value: "reduce".to_string(),
            }]),
        })
        .await?;

        if let Some(geo) = self.opts.geolocation {
            page.execute(
                SetGeolocationOverrideParams::builder()
                    .latitude(geo.latitude)
                    .longitude(geo.longitude)
                    .accuracy(GEOLOCATION_ACCURACY)
                    .build(),
            )
            .await?;
        }
        if let Some(timezone_id) = &self.opts.timezone_id {
            page.execute(SetTimezoneOverrideParams::new(timezone_id.clone()))
                .await?;
        }
        if !self.opts.abort_loading.is_empty() {
            page.execute(SetBlockedUrLsParams::new(self.opts.abort_loading.clone()))
                .await?;
        }
        if let Some(state) = &self.opts.storage_state {
            if let Some(script) = local_storage_seed_script(&state.origins)? {
                page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                    .await?;
            }
        }
        Ok(())
    }

    /// Register the one-shot save-on-close watcher for a tab's page.
    ///
    /// `dispose` awaits the handle, so the state write completes (or fails
    /// observably in the log) before teardown finishes.
    fn spawn_save_on_close(&mut self, page: Page, path: PathBuf) {
        let browser = Arc::clone(&self.browser);
        let origins = self
            .opts
            .storage_state
            .as_ref()
            .map(|state| state.origins.clone())
            .unwrap_or_default();

        self.save_task = Some(tokio::spawn(async move {
            tab::wait_page_closed(&page).await;
            info!(
                target = "restock",
                path = %path.display(),
                "tab closed, saving session state"
            );
            match save_storage_state(&browser, origins, &path).await {
                Ok(state) => {
                    info!(
                        target = "restock",
                        cookies = state.cookies.len(),
                        path = %path.display(),
                        "session state saved"
                    );
                }
                Err(err) => {
                    warn!(
                        target = "restock",
                        error = %err,
                        path = %path.display(),
                        "failed to save session state"
                    );
                }
            }
        }));
    }
}

/// Capture the context's cookies and persist them with the carried-over
/// origins. Cookies are read browser-wide: the page that triggered the save
/// is already gone.
async fn save_storage_state(
    browser: &Mutex<Option<Browser>>,
    origins: Vec<OriginState>,
    path: &Path,
) -> Result<StorageState> {
    let guard = browser.lock().await;
    let browser = guard.as_ref().ok_or(BrowserError::NotStarted)?;
    let cookies = browser
        .execute(GetCookiesParams::default())
        .await?
        .result
        .cookies;

    let state = StorageState {
        cookies: cookies.into_iter().map(Cookie::from_cdp).collect(),
        origins,
    };
    state.to_file(path)?;
    Ok(state)
}

/// Script installed on every new document that seeds localStorage for
/// matching origins. CDP cannot write another origin's storage directly, so
/// resumed origins are replayed as the page commits.
fn local_storage_seed_script(origins: &[OriginState]) -> Result<Option<String>> {
    if origins.is_empty() {
        return Ok(None);
    }

    let mut seeds: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
    for origin in origins {
        let entries = seeds.entry(origin.origin.as_str()).or_default();
        for entry in &origin.local_storage {
            entries.insert(entry.name.as_str(), entry.value.as_str());
        }
    }
    let seeds = serde_json::to_string(&seeds)?;

    Ok(Some(format!(
        r#"(() => {{
  const seeds = {seeds};
  const entries = seeds[window.location.origin];
  if (!entries) return;
  for (const [key, value] of Object.entries(entries)) {{
    try {{ window.localStorage.setItem(key, value); }} catch (_) {{}}
  }}
}})();"#
    )))
}
