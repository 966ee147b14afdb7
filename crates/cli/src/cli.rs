use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "restock")]
#[command(about = "Availability watcher - persistent browser sessions from the command line")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run the browser without a visible window
    #[arg(long, global = true)]
    pub headless: bool,

    /// Latitude reported to pages that request geolocation
    #[arg(long, global = true, env = "RESTOCK_LAT", requires = "lon")]
    pub lat: Option<f64>,

    /// Longitude reported to pages that request geolocation
    #[arg(long, global = true, env = "RESTOCK_LON", requires = "lat")]
    pub lon: Option<f64>,

    /// IANA timezone id applied to the browser context
    #[arg(long, global = true, env = "RESTOCK_TIMEZONE", value_name = "TZ")]
    pub timezone: Option<String>,

    /// Abort in-flight requests whose URL matches PATTERN (repeatable, * wildcards)
    #[arg(long = "block", global = true, value_name = "PATTERN")]
    pub block: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a fresh browser for manual login; save the session state to a file
    /// once the tab is closed
    Create {
        /// File to write the serialized session state to
        session_file: PathBuf,
    },

    /// Resume a saved session; state is saved back to the same file on tab close
    Resume {
        /// File holding a previously saved session state
        session_file: PathBuf,
    },

    /// Open fingerprint diagnostic pages to inspect the browser configuration
    Test,

    /// Navigate to a URL and print one element's content as UTF-8
    Extract {
        url: String,
        /// CSS selector matching exactly one element
        selector: String,
        /// Print innerHTML instead of innerText
        #[arg(long)]
        html: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create_command() {
        let cli = Cli::try_parse_from(["restock", "create", "/tmp/session.json"]).unwrap();
        match cli.command {
            Commands::Create { session_file } => {
                assert_eq!(session_file, PathBuf::from("/tmp/session.json"));
            }
            _ => panic!("Expected Create command"),
        }
    }

    #[test]
    fn parse_resume_command() {
        let cli = Cli::try_parse_from(["restock", "resume", "data/session.json"]).unwrap();
        match cli.command {
            Commands::Resume { session_file } => {
                assert_eq!(session_file, PathBuf::from("data/session.json"));
            }
            _ => panic!("Expected Resume command"),
        }
    }

    #[test]
    fn parse_extract_command() {
        let cli = Cli::try_parse_from([
            "restock",
            "extract",
            "https://shop.example/p/42",
            "#availability",
            "--html",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract {
                url,
                selector,
                html,
            } => {
                assert_eq!(url, "https://shop.example/p/42");
                assert_eq!(selector, "#availability");
                assert!(html);
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn geolocation_flags_require_each_other() {
        assert!(Cli::try_parse_from(["restock", "--lat", "52.52", "test"]).is_err());
        assert!(Cli::try_parse_from(["restock", "--lon", "13.4", "test"]).is_err());

        let cli =
            Cli::try_parse_from(["restock", "--lat", "52.52", "--lon", "13.4", "test"]).unwrap();
        assert_eq!(cli.lat, Some(52.52));
        assert_eq!(cli.lon, Some(13.4));
    }

    #[test]
    fn block_flag_is_repeatable() {
        let cli = Cli::try_parse_from([
            "restock",
            "--block",
            "*.doubleclick.net/*",
            "--block",
            "*.hotjar.com/*",
            "test",
        ])
        .unwrap();
        assert_eq!(cli.block.len(), 2);
    }

    #[test]
    fn verbose_flag_counts() {
        let cli = Cli::try_parse_from(["restock", "-vv", "test"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn invalid_command_fails() {
        assert!(Cli::try_parse_from(["restock", "frobnicate"]).is_err());
    }
}
