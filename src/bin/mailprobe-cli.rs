#[path = "mailprobe-cli/args.rs"]
mod args;
#[path = "mailprobe-cli/output.rs"]
mod output;

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mailprobe::{DnsResolver, GreylistStore, RetryScheduler, SmtpProber, Verifier};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands};
use crate::output::{any_invalid, print_status, write_reports};

/// Entries listed by `status`.
const STATUS_PREVIEW: u32 = 20;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config();

    let store = GreylistStore::open(&cli.db)
        .await
        .with_context(|| format!("open greylist database {}", cli.db.display()))?;

    let mut failed = false;
    match cli.cmd {
        Commands::Verify {
            emails,
            stdin,
            format,
            out,
        } => {
            let mut inputs = emails;
            if stdin {
                for line in io::stdin().lock().lines() {
                    let line = line.context("read stdin")?;
                    let line = line.trim();
                    if !line.is_empty() {
                        inputs.push(line.to_string());
                    }
                }
            }
            if inputs.is_empty() {
                bail!("no address given (pass them as arguments or use --stdin)");
            }

            let verifier =
                Verifier::from_config(&config, store.clone()).context("build verifier")?;
            let mut rows = Vec::with_capacity(inputs.len());
            for input in &inputs {
                rows.push(verifier.verify(input).await);
            }
            write_reports(&rows, format, out.as_deref())?;
            failed = any_invalid(&rows);
        }
        Commands::Worker { .. } => {
            let resolver =
                Arc::new(DnsResolver::new(&config.resolver).context("build DNS resolver")?);
            let prober =
                SmtpProber::new(config.probe.clone(), resolver).context("build SMTP prober")?;
            let scheduler = RetryScheduler::new(store.clone(), Arc::new(prober), config.retry.clone());
            let cancel = CancellationToken::new();
            let handle = scheduler.spawn(cancel.clone());

            tokio::signal::ctrl_c()
                .await
                .context("listen for Ctrl-C")?;
            info!("interrupt received, stopping retry scheduler");
            cancel.cancel();
            handle.await.context("retry scheduler task")?;
        }
        Commands::Status => {
            let count = store.count().await.context("count greylist entries")?;
            let upcoming = store
                .fetch_due_at(i64::MAX, STATUS_PREVIEW)
                .await
                .context("list greylist entries")?;
            print_status(count, &upcoming);
        }
    }

    store.close().await;
    if failed {
        std::process::exit(2);
    }
    Ok(())
}
