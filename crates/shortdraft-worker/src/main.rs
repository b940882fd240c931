//! Short-form draft generator binary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shortdraft_worker::{
    drive_store, AppConfig, BatchOrchestrator, DraftPipeline, LocalRunResult, ProcessingContext, UploadTarget,
};

#[derive(Debug, Parser)]
#[command(name = "shortdraft", version, about = "Generate short-form video drafts from long-form videos")]
struct Cli {
    /// Video file, or transcript JSON with --from-transcript
    input: Option<PathBuf>,

    /// Directory receiving the draft, subtitle and transcript
    output_dir: Option<PathBuf>,

    /// Treat INPUT as a transcript saved by an earlier run
    #[arg(long)]
    from_transcript: bool,

    /// Process the next unprocessed video from Google Drive
    #[arg(long, conflicts_with_all = ["input", "from_transcript", "upload"])]
    drive_batch: bool,

    /// Input Drive folder URL or id (defaults to INPUT_DRIVE_FOLDER)
    #[arg(long, requires = "drive_batch")]
    input_drive_folder: Option<String>,

    /// Output Drive folder URL or id (defaults to OUTPUT_DRIVE_FOLDER)
    #[arg(long, requires = "drive_batch")]
    output_drive_folder: Option<String>,

    /// Upload the draft and subtitle to Google Drive
    #[arg(long)]
    upload: bool,

    /// Drive folder for --upload (defaults to GOOGLE_DRIVE_UPLOAD_FOLDER_ID)
    #[arg(long, requires = "upload")]
    upload_folder_id: Option<String>,

    /// Print the full error chain on failure
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let verbose = cli.verbose;
    let outcome = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, aborting");
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            if verbose {
                for cause in e.chain().skip(1) {
                    eprintln!("  caused by: {}", cause);
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "shortdraft=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    let ctx = ProcessingContext::from_config(&config).context("building processing context")?;

    if cli.drive_batch {
        return run_batch(cli, &config, ctx).await;
    }

    let (Some(input), Some(output_dir)) = (cli.input.as_deref(), cli.output_dir.as_deref()) else {
        bail!("INPUT and OUTPUT_DIR are required unless --drive-batch is given");
    };

    let mut pipeline = DraftPipeline::new(ctx);
    if cli.upload {
        let Some(folder_id) = cli.upload_folder_id.or_else(|| config.upload_folder_id.clone()) else {
            bail!("--upload needs --upload-folder-id or GOOGLE_DRIVE_UPLOAD_FOLDER_ID");
        };
        let store = drive_store(&config).context("connecting to Google Drive")?;
        pipeline = pipeline.with_upload(UploadTarget { store, folder_id });
    }

    info!(input = %input.display(), output_dir = %output_dir.display(), "Starting local run");
    let outcome = if cli.from_transcript {
        pipeline.run_transcript(input, output_dir).await
    } else {
        pipeline.run_video(input, output_dir).await
    };
    let result = outcome.with_context(|| format!("processing {}", input.display()))?;

    print_summary(&result);
    Ok(())
}

async fn run_batch(cli: Cli, config: &AppConfig, ctx: ProcessingContext) -> anyhow::Result<()> {
    let input = cli
        .input_drive_folder
        .or_else(|| config.input_drive_folder.clone())
        .context("--input-drive-folder or INPUT_DRIVE_FOLDER is required")?;
    let output = cli
        .output_drive_folder
        .or_else(|| config.output_drive_folder.clone())
        .context("--output-drive-folder or OUTPUT_DRIVE_FOLDER is required")?;

    let store = drive_store(config).context("connecting to Google Drive")?;
    let result = BatchOrchestrator::new(ctx, store).run_once(&input, &output).await;

    if result.is_idle() {
        println!("No unprocessed videos found");
        return Ok(());
    }

    if let (Some(item), Some(outputs)) = (&result.processed_item, &result.output_locations) {
        println!("Processed {}", item.display_name);
        println!("  draft:      {}", outputs.draft);
        println!("  subtitle:   {}", outputs.subtitle);
        println!("  transcript: {}", outputs.transcript);
        println!("  video:      {}", outputs.video);
    }

    match result.error {
        Some(descriptor) if !result.succeeded => {
            let mut message = descriptor.to_string();
            if cli.verbose {
                for cause in &descriptor.chain {
                    message.push_str(&format!("\n  caused by: {}", cause));
                }
            }
            bail!(message)
        }
        _ => Ok(()),
    }
}

fn print_summary(result: &LocalRunResult) {
    println!("Generated {} scripts", result.script_count);
    println!("  draft:    {}", result.draft_path.display());
    println!("  subtitle: {}", result.subtitle_path.display());
    if let Some(transcript) = &result.transcript_path {
        println!("  transcript: {}", transcript.display());
    }
    for link in &result.uploaded {
        println!("  uploaded: {}", link);
    }
}
