use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use avian_flu_clusters::cluster::{DEFAULT_CLUSTERS, DEFAULT_SEED, KMeansConfig};
use avian_flu_clusters::config::ConfigLoader;
use avian_flu_clusters::domain::{DEFAULT_MAX_RESULTS, DEFAULT_QUERY, Query};
use avian_flu_clusters::error::{FetchError, FluError};
use avian_flu_clusters::ncbi::{EntrezHttpClient, FetcherOptions};
use avian_flu_clusters::output::{JsonOutput, LogProgress, OutputMode, SummaryOutput};
use avian_flu_clusters::pipeline::Pipeline;
use avian_flu_clusters::plot::{self, ScatterPlot};

#[derive(Parser)]
#[command(name = "avian-flu")]
#[command(about = "Fetch avian influenza GenBank metadata from NCBI, cluster strains by host and plot them")]
#[command(version, author)]
struct Cli {
    /// Entrez search expression.
    #[arg(long, default_value = DEFAULT_QUERY)]
    query: String,

    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,

    #[arg(long, default_value_t = DEFAULT_CLUSTERS)]
    clusters: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Path to credentials.json; defaults to the first one found in the usual locations.
    #[arg(long)]
    credentials: Option<Utf8PathBuf>,

    #[arg(long, default_value_t = 0)]
    retries: usize,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Skip the plot window.
    #[arg(long)]
    no_plot: bool,

    /// Print the clustered table as JSON.
    #[arg(long, conflicts_with = "summary")]
    json: bool,

    /// Print a per-cluster summary.
    #[arg(long)]
    summary: bool,
}

impl Cli {
    fn output_mode(&self) -> Option<OutputMode> {
        if self.json {
            Some(OutputMode::Json)
        } else if self.summary {
            Some(OutputMode::Summary)
        } else {
            None
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<FluError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FluError) -> u8 {
    match error {
        FluError::Config(_) => 2,
        FluError::Fetch(FetchError::InvalidQuery(_)) => 2,
        FluError::Fetch(_) => 3,
        FluError::Parse(_) => 4,
        FluError::Cluster(_) => 5,
        FluError::Plot(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let query: Query = cli.query.parse().map_err(FluError::from)?;
    let credentials = ConfigLoader::resolve(cli.credentials.as_deref()).map_err(FluError::from)?;

    let options = FetcherOptions {
        max_retries: cli.retries,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    };
    let client = EntrezHttpClient::new(credentials, options)?;
    let clustering = KMeansConfig {
        clusters: cli.clusters,
        seed: cli.seed,
        ..KMeansConfig::default()
    };
    let pipeline = Pipeline::new(client, clustering);

    let result = pipeline.run(&query, cli.max_results, &LogProgress)?;

    match cli.output_mode() {
        Some(OutputMode::Json) => JsonOutput::print_run(&result).into_diagnostic()?,
        Some(OutputMode::Summary) => SummaryOutput::print_run(&result).into_diagnostic()?,
        None => {}
    }

    if !cli.no_plot {
        tracing::info!("visualizing clusters");
        let scatter = ScatterPlot::from_table(&result.table);
        plot::show(&scatter).map_err(FluError::from)?;
    }
    Ok(())
}
