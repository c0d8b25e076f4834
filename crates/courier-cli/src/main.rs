//! courier binary: resolve the job configuration, run one job to a terminal
//! state, and map the error taxonomy to process exit codes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use courier_client::{HttpDownloader, JobRunner, McpSession, SessionConfig};
use courier_types::config::JobConfig;
use courier_types::config_loader;
use courier_types::errors::CourierError;
use courier_types::protocol::JobReport;

#[derive(Parser)]
#[command(
    name = "courier",
    about = "Submit a job to a remote tool server, poll it to completion, and fetch the artifact",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single job to completion.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the YAML job file.
    #[arg(long, short)]
    config: PathBuf,

    /// Override the server endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Override the output path (file or directory).
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Override the poll interval in seconds.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Override the maximum number of status checks.
    #[arg(long)]
    max_polls: Option<u32>,

    /// Extra header as NAME:VALUE (repeatable).
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Override the parameter name carrying the job id.
    #[arg(long)]
    id_param: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => match run(args).await {
            Ok(report) => {
                match serde_json::to_string_pretty(&report) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(_) => println!("{report:?}"),
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!("{err}");
                ExitCode::from(exit_code(&err))
            }
        },
    }
}

async fn run(args: RunArgs) -> Result<JobReport, CourierError> {
    let mut config = config_loader::load_job_file(&args.config)?;
    apply_overrides(&mut config, &args)?;
    config_loader::validate(&config)?;

    let session = McpSession::new(SessionConfig {
        endpoint: config.endpoint.clone(),
        headers: config.headers.clone(),
        connect_timeout: Duration::from_secs(config.http.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.http.request_timeout_secs),
    })?;
    let downloader = HttpDownloader::new()?;

    let mut runner = JobRunner::new(session, downloader, config);
    runner.run().await
}

/// Fold command-line overrides into the loaded job config.
fn apply_overrides(config: &mut JobConfig, args: &RunArgs) -> Result<(), CourierError> {
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(interval) = args.poll_interval {
        config.poll.interval_secs = interval;
    }
    if let Some(max) = args.max_polls {
        config.poll.max_attempts = max;
    }
    if let Some(id_param) = &args.id_param {
        config.id_param = id_param.clone();
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        config.headers.insert(name, value);
    }
    Ok(())
}

/// Parse a NAME:VALUE header argument.
fn parse_header(raw: &str) -> Result<(String, String), CourierError> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(CourierError::Config(format!(
            "invalid header '{raw}': expected NAME:VALUE"
        )));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(CourierError::Config(format!(
            "invalid header '{raw}': empty name"
        )));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Map the error taxonomy to process exit codes.
fn exit_code(err: &CourierError) -> u8 {
    match err {
        CourierError::Config(_) => 2,
        CourierError::Protocol(_) | CourierError::Serialization(_) => 3,
        CourierError::Extraction { .. } => 4,
        CourierError::JobFailed { .. } => 5,
        CourierError::JobTimeout { .. } => 6,
        CourierError::Download(_) => 7,
    }
}
