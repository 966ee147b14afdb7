use std::sync::Arc;

use anyhow::{Context, Result};
use restock::{BrowserOpts, BrowserSession, ProfileDir};
use tracing::info;
use url::Url;

/// Navigate to `url` and print one element's content, normalized to UTF-8.
pub async fn run(opts: BrowserOpts, url: &str, selector: &str, html: bool) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("invalid url: {url}"))?;
    info!(target = "restock", url = %url, selector, html, "extracting");

    let profile = Arc::new(ProfileDir::create().context("failed to create profile directory")?);
    let mut session = BrowserSession::new(opts, profile);
    let result = run_inner(&mut session, &url, selector, html).await;
    session.dispose().await;

    let content = result?;
    println!("{content}");
    Ok(())
}

async fn run_inner(
    session: &mut BrowserSession,
    url: &Url,
    selector: &str,
    html: bool,
) -> Result<String> {
    session.start().await?;
    let tab = session.new_tab(Some(url)).await?;
    let content = if html {
        tab.inner_html(selector).await?
    } else {
        tab.inner_text(selector).await?
    };
    Ok(content)
}
