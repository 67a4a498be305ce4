use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use mailprobe::{AuthLookupOptions, Config};

#[derive(Parser, Debug)]
#[command(name = "mailprobe-cli")]
#[command(about = "Check whether mailboxes exist without sending mail", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// greylist database (created if missing)
    #[arg(long, global = true, default_value = "mailprobe-greylist.db")]
    pub db: PathBuf,

    /// nameserver IP to query (repeatable, defaults to 8.8.8.8 and 1.1.1.1)
    #[arg(long = "nameserver", global = true)]
    pub nameservers: Vec<String>,

    /// domain announced in EHLO
    #[arg(long, global = true)]
    pub helo: Option<String>,

    /// extra DKIM selector to look up (repeatable)
    #[arg(long = "dkim-selector", global = true)]
    pub dkim_selectors: Vec<String>,

    /// file caching the disposable-domain list between runs
    #[arg(long, global = true)]
    pub disposable_snapshot: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify addresses given as arguments or on stdin
    Verify {
        emails: Vec<String>,

        /// read addresses from stdin (one per line)
        #[arg(long)]
        stdin: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,

        /// write the report to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Retry greylisted addresses until interrupted
    Worker {
        /// seconds between passes
        #[arg(long, default_value_t = 120)]
        interval: u64,
    },
    /// Show the greylist queue
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

impl Cli {
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        if !self.nameservers.is_empty() {
            config.resolver.nameservers = self.nameservers.clone();
        }
        if let Some(helo) = &self.helo {
            config.probe.helo_domain = helo.clone();
        }
        if !self.dkim_selectors.is_empty() {
            config.auth = AuthLookupOptions::new().with_dkim_selectors(self.dkim_selectors.iter());
        }
        config.disposable.snapshot_path = self.disposable_snapshot.clone();
        if let Commands::Worker { interval } = self.cmd {
            config.retry.poll_interval = Duration::from_secs(interval.max(1));
        }
        config
    }
}
