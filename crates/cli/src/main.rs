use clap::Parser;
use restock_cli::{cli::Cli, commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose > 0);

    if let Err(err) = commands::dispatch(cli).await {
        error!(target = "restock", error = %err, "command failed");
        std::process::exit(1);
    }
}
