use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use restock::{BrowserOpts, BrowserSession, ProfileDir, StorageState};
use tracing::info;

use crate::shutdown;

/// Open the browser with (optionally) a prior session and keep it alive until
/// the login tab closes or the process is told to stop. The session state is
/// saved by the tab-close hook when a save path is configured.
pub async fn run(
    mut opts: BrowserOpts,
    resume_from: Option<PathBuf>,
    save_to: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = resume_from {
        let state = StorageState::from_file(&path)
            .with_context(|| format!("failed to read session file: {}", path.display()))?;
        info!(
            target = "restock",
            cookies = state.cookies.len(),
            origins = state.origins.len(),
            path = %path.display(),
            "resuming session"
        );
        opts = opts.storage_state(state);
    }
    if let Some(path) = save_to {
        opts = opts.storage_state_save_path(path);
    }

    let profile = Arc::new(ProfileDir::create().context("failed to create profile directory")?);
    let mut session = BrowserSession::new(opts, profile);
    let result = run_inner(&mut session).await;
    session.dispose().await;
    result
}

async fn run_inner(session: &mut BrowserSession) -> Result<()> {
    session.start().await?;
    let tab = session.new_tab(None).await?;
    info!(
        target = "restock",
        "browser open; log in to your accounts and close the tab when done"
    );

    let page = tab.page().clone();
    tokio::select! {
        _ = shutdown::wait_for_shutdown() => {}
        _ = restock::wait_page_closed(&page) => {
            info!(target = "restock", "tab closed, shutting down");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resume_with_missing_file_fails_before_launch() {
        let err = run(
            BrowserOpts::new(),
            Some(PathBuf::from("/nonexistent/session.json")),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to read session file"));
    }

    #[tokio::test]
    async fn resume_with_malformed_file_fails_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let err = run(BrowserOpts::new(), Some(path), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read session file"));
    }
}
