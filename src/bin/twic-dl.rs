use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use twic_dl::{
    CombineReport, Config, FetchReport, Harvester, IndexReport, Result, StageStatus,
    shutdown_signal,
};

#[derive(Parser, Debug)]
#[command(
    name = "twic-dl",
    version,
    about = "Harvest The Week in Chess archive into one PGN database"
)]
struct Cli {
    /// JSON configuration file; flags and environment variables override its values.
    #[arg(long, short, global = true, env = "TWIC_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the index page and write one metadata record per issue.
    Extract(ExtractArgs),
    /// Download every archive that is not on disk yet.
    Fetch(FetchArgs),
    /// Merge downloaded archives into the master database.
    Combine(CombineArgs),
    /// Extract, fetch and combine in one go.
    Run {
        #[command(flatten)]
        extract: ExtractArgs,
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        combine: CombineArgs,
    },
}

#[derive(Args, Debug)]
struct PathArgs {
    /// Directory holding one JSON record per issue.
    #[arg(long, global = true, env = "TWIC_DL_METADATA_DIR")]
    metadata_dir: Option<PathBuf>,

    /// Directory holding downloaded archives.
    #[arg(long, global = true, env = "TWIC_DL_ARCHIVE_DIR")]
    archive_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Index page to parse.
    #[arg(long, env = "TWIC_DL_SOURCE_URL")]
    source_url: Option<String>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Number of concurrent downloads.
    #[arg(long, short = 'j', env = "TWIC_DL_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Total attempts per archive, including the first.
    #[arg(long, env = "TWIC_DL_ATTEMPTS")]
    attempts: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "TWIC_DL_TIMEOUT")]
    timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct CombineArgs {
    /// Master database to create or extend.
    #[arg(long, short, env = "TWIC_DL_OUTPUT")]
    output: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = &self.paths.metadata_dir {
            config.index.metadata_dir = dir.clone();
        }
        if let Some(dir) = &self.paths.archive_dir {
            config.fetch.archive_dir = dir.clone();
        }

        match &self.command {
            Command::Extract(extract) => extract.apply(&mut config),
            Command::Fetch(fetch) => fetch.apply(&mut config),
            Command::Combine(combine) => combine.apply(&mut config),
            Command::Run {
                extract,
                fetch,
                combine,
            } => {
                extract.apply(&mut config);
                fetch.apply(&mut config);
                combine.apply(&mut config);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

impl ExtractArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.source_url {
            config.index.source_url = url.clone();
        }
    }
}

impl FetchArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.concurrency {
            config.fetch.max_concurrent = n;
        }
        if let Some(n) = self.attempts {
            config.fetch.retry.max_attempts = n;
        }
        if let Some(secs) = self.timeout {
            config.fetch.request_timeout = std::time::Duration::from_secs(secs);
        }
    }
}

impl CombineArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.output {
            config.combine.output_path = path.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tokio::select! {
        result = execute(&cli) => match result {
            Ok(StageStatus::Success) => ExitCode::SUCCESS,
            Ok(StageStatus::PartialFailure) => ExitCode::from(2),
            Err(e) => {
                tracing::error!(error = %e, "twic-dl failed");
                eprintln!("error: {e}");
                ExitCode::from(1)
            }
        },
        _ = shutdown_signal() => {
            eprintln!("interrupted; rerun the same command to resume");
            ExitCode::from(130)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "twic_dl=debug" } else { "twic_dl=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn execute(cli: &Cli) -> Result<StageStatus> {
    let config = cli.load_config()?;
    let harvester = Harvester::new(config)?;

    let status = match cli.command {
        Command::Extract(_) => {
            let report = harvester.extract_index().await?;
            print_index(&report);
            report.status()
        }
        Command::Fetch(_) => {
            let report = harvester.fetch_archives().await?;
            print_fetch(&report, harvester.config());
            report.status()
        }
        Command::Combine(_) => {
            let report = harvester.combine_archives().await?;
            print_combine(&report);
            report.status()
        }
        Command::Run { .. } => {
            let report = harvester.run().await?;
            print_index(&report.index);
            print_fetch(&report.fetch, harvester.config());
            print_combine(&report.combine);
            report.status()
        }
    };
    Ok(status)
}

fn print_index(report: &IndexReport) {
    println!(
        "index: {} records saved to {}, {} rows skipped",
        report.records.len(),
        report.metadata_dir.display(),
        report.warnings.len()
    );
    for warning in &report.warnings {
        println!("  row {}: {}", warning.row, warning.reason);
    }
}

fn print_fetch(report: &FetchReport, config: &Config) {
    println!(
        "fetch: {} total, {} downloaded, {} skipped, {} without link, {} failed ({})",
        report.total,
        report.succeeded,
        report.skipped,
        report.missing_link,
        report.failed,
        config.fetch.archive_dir.display()
    );
    for failure in &report.failures {
        println!(
            "  issue {} after {} attempts: {}",
            failure.ordinal, failure.attempts, failure.error
        );
    }
}

fn print_combine(report: &CombineReport) {
    println!(
        "combine: {} merged, {} already present, {} skipped, {} issues, {} bytes in {}",
        report.merged,
        report.already_merged,
        report.skipped.len(),
        report.total_records,
        report.final_size,
        report.output_path.display()
    );
    for skip in &report.skipped {
        println!("  {}: {}", skip.path.display(), skip.reason);
    }
}
