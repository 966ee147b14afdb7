pub mod extract;
pub mod session;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::config;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let opts = config::browser_opts(&cli);

    match cli.command {
        Commands::Create { session_file } => session::run(opts, None, Some(session_file)).await,
        Commands::Resume { session_file } => {
            session::run(opts, Some(session_file.clone()), Some(session_file)).await
        }
        Commands::Test => test::run(opts).await,
        Commands::Extract {
            url,
            selector,
            html,
        } => extract::run(opts, &url, &selector, html).await,
    }
}
