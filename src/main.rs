use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use otter_transcribe::otter::{AudioFile, OtterClient};
use otter_transcribe::{output, utils, Cli, Config, ReqwestTransport, TranscriptionPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "otter_transcribe=debug,transcribe=debug"
    } else {
        "otter_transcribe=info,transcribe=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // stdout is reserved for the transcript URL
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    utils::check_file_accessible(&cli.file)?;

    let config = Config::resolve(&cli.credential_args())?;
    let credentials = config.credentials()?;

    let transport = ReqwestTransport::new(Duration::from_secs(cli.timeout))
        .context("Failed to build HTTP client")?;
    let client = OtterClient::new(Arc::new(transport), &cli.base_url)
        .with_context(|| format!("Invalid service URL: {}", cli.base_url))?
        .with_api_timeout(Duration::from_secs(cli.timeout));
    let pipeline = TranscriptionPipeline::new(client).with_progress(!cli.quiet);

    let session = pipeline
        .login(credentials)
        .await
        .context("Unable to log in with the provided credentials")?;

    if cli.write_config {
        config.save().context("Unable to write config file")?;
        tracing::info!("Saved credentials to {}", config.path.display());
    }

    let file = AudioFile::open(&cli.file)
        .await
        .with_context(|| format!("Unable to open file {}", cli.file.display()))?;

    tracing::info!(file = file.name(), bytes = ?file.length(), "Found file");

    let result = pipeline.upload_speech(&session, file).await?;

    tracing::info!("Transcript URL: {}", result.transcript_url);
    output::print_to_console(&result, &cli.format)?;

    Ok(())
}
