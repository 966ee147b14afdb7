use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// `start()` was never called on the session.
    #[error("browser session has not been started")]
    NotStarted,

    #[error("page could not load in browser: {url}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("page status ({status}) \"{status_text}\" for url: {url}")]
    HttpStatus {
        url: String,
        status: i64,
        status_text: String,
    },

    /// Response metadata was present but malformed; charset-dependent
    /// extraction cannot proceed safely.
    #[error("response has invalid header: {0}")]
    InvalidHeader(String),

    #[error("charset \"{0}\" is not supported by the host text codec")]
    UnsupportedCharset(String),

    /// Extraction was attempted before charset metadata exists.
    #[error("charset metadata is missing; has the page finished loading?")]
    NotReady,

    #[error("no element match for selector: {selector}")]
    ElementNotFound { selector: String },

    #[error("browser protocol error: {0}")]
    Cdp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}
