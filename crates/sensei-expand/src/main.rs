//! CLI entry point for the cidr-sensei address expander.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use sensei_core::{build_ranges, expand, split_cidr_list};
use sensei_expand::config::{ExpandConfig, LogFormat, Overrides};
use sensei_expand::output::write_output;
use sensei_expand::shutdown::{cancel_after, cancel_on_signal};

const EXAMPLES: &str = "Examples:
  cidr-sensei --cidr \"10.0.0.0/8,172.16.0.0/12,192.168.0.0/16\" --parallel --concurrency 100 --output json";

#[derive(Parser)]
#[command(name = "cidr-sensei")]
#[command(about = "Expand a comma-separated list of CIDR blocks into a list of IPs")]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Comma-separated list of CIDR blocks to expand.
    #[arg(long)]
    cidr: String,

    /// Output format: terminal, csv, or json.
    #[arg(short, long)]
    output: Option<String>,

    /// Expand with a pool of parallel workers.
    #[arg(long)]
    parallel: bool,

    /// Number of parallel workers (values <= 0 use the default of 100).
    #[arg(long, allow_negative_numbers = true)]
    concurrency: Option<i64>,

    /// Lookup algorithm: binary-search or interval-tree.
    #[arg(long)]
    algorithm: Option<String>,

    /// Directory for csv and json output files.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Stop the expansion after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Config file prefix (default: cidr-sensei).
    #[arg(short, long, default_value = "cidr-sensei")]
    config: String,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            output: self.output.clone(),
            parallel: self.parallel,
            concurrency: self.concurrency,
            algorithm: self.algorithm.clone(),
            output_dir: self.output_dir.clone(),
            timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ExpandConfig::load(&cli.config)?.merge(cli.overrides());
    init_tracing(config.log_format);

    if cli.cidr.trim().is_empty() {
        anyhow::bail!("the --cidr flag is required");
    }

    let settings = config.resolve()?;
    let ranges = build_ranges(&split_cidr_list(&cli.cidr))?;

    tracing::info!(
        ranges = ranges.len(),
        mode = %settings.options.mode,
        algorithm = %settings.options.algorithm,
        concurrency = settings.options.concurrency,
        output = %settings.format,
        "Starting expansion"
    );

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());
    if let Some(timeout) = settings.timeout {
        cancel_after(cancel.clone(), timeout);
    }

    let started = Instant::now();
    let expansion = expand(ranges, &settings.options, cancel.clone()).await?;
    cancel.cancel();

    if expansion.is_cancelled() {
        eprintln!(
            "Expansion cancelled, keeping {} addresses produced so far",
            expansion.len()
        );
    }

    match write_output(
        settings.format,
        &expansion.addresses,
        &cli.cidr,
        &settings.output_dir,
    ) {
        Ok(Some(path)) => eprintln!("Wrote {} addresses to {}", expansion.len(), path.display()),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to write output");
            eprintln!("Error writing output: {e}");
        }
    }

    eprintln!(
        "Took {:.2} seconds to complete.",
        started.elapsed().as_secs_f64()
    );

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
