// Runtime configuration: CLI flags and environment assembled into launch
// options.

use restock::BrowserOpts;

use crate::cli::Cli;

pub fn browser_opts(cli: &Cli) -> BrowserOpts {
    let mut opts = BrowserOpts::new().headless(cli.headless);

    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        opts = opts.geolocation(lat, lon);
    }
    if let Some(timezone) = &cli.timezone {
        opts = opts.timezone_id(timezone);
    }
    if !cli.block.is_empty() {
        opts = opts.abort_loading(cli.block.clone());
    }

    opts
}
