//! restock: persistent browser sessions for availability watching
//!
//! This crate owns a single long-lived Chromium execution context over CDP,
//! opens tabs bound to navigation lifecycles, classifies HTTP responses to
//! determine a safe text encoding, and re-encodes extracted DOM content into
//! canonical UTF-8 regardless of the origin server's declared charset. Session
//! state (cookies, localStorage) can be persisted on tab close and resumed
//! later.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use restock::{BrowserOpts, BrowserSession, ProfileDir};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = Arc::new(ProfileDir::create()?);
//!     let opts = BrowserOpts::new()
//!         .headless(true)
//!         .timezone_id("Europe/Berlin");
//!
//!     let mut session = BrowserSession::new(opts, profile);
//!     session.start().await?;
//!
//!     let url = Url::parse("https://shop.example/product/42")?;
//!     let tab = session.new_tab(Some(&url)).await?;
//!     let availability = tab.inner_text("#availability").await?;
//!     println!("{availability}");
//!
//!     session.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! Navigations and extractions against the same tab must not be issued
//! concurrently; state is only coherent between one completed operation and
//! the next. Independent tabs may be driven in parallel, but the session
//! tracks only the most recently opened one.

pub mod config;
pub mod encoding;
pub mod error;
pub mod profile;
pub mod session;
pub mod storage;
pub mod tab;

pub use config::{BrowserOpts, Geolocation};
pub use encoding::{CharsetMeta, classify_response, detect_meta_charset, reencode};
pub use error::{BrowserError, Result};
pub use profile::ProfileDir;
pub use session::BrowserSession;
pub use storage::{Cookie, LocalStorageEntry, OriginState, StorageState};
pub use tab::{NavResponse, Tab, wait_page_closed};
