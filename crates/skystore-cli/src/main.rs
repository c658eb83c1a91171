use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use serde::Serialize;
use skystore_api_client::ApiClient;
use skystore_cli::{failure_lines, init_tracing, LogFormat};
use skystore_core::models::{ReconstructionJob, ScanSummary};
use skystore_core::WorkstreamConfig;
use skystore_storage::{create_storage, Storage};
use skystore_workstreams::bootstrap::{self, CONNECT_ATTEMPTS, CONNECT_DELAY};
use skystore_workstreams::{
    DropboxScanner, HttpReconstructionModel, ReconstructionPipeline, RetryPolicy,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_ERROR_LEN: usize = 120;

#[derive(Parser)]
#[command(name = "skystore", about = "SkyStore dropbox scan and reconstruction workstreams")]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register every file under the dropbox prefix as an asset
    ScanDropbox {
        /// Override DROPBOX_PREFIX
        #[arg(long)]
        prefix: Option<String>,
        /// Override SCAN_CONCURRENCY
        #[arg(long)]
        concurrency: Option<usize>,
        /// Flight to associate every created asset with
        #[arg(long)]
        flight_uuid: Option<String>,
        /// Repeat the scan every N seconds until Ctrl-C
        #[arg(long)]
        every: Option<u64>,
    },
    /// Run the reconstruction model over a batch of images and upload its outputs
    Reconstruct {
        /// Image keys, in model input order
        #[arg(long = "image", num_args = 1..)]
        images: Vec<String>,
        /// Use every image under this prefix instead of explicit keys
        #[arg(long, conflicts_with = "images")]
        image_prefix: Option<String>,
        /// Prefix the output tensors are written under
        #[arg(long, default_value = "vggt_results")]
        output_prefix: String,
        /// Build the final point cloud from the point head instead of the depth map
        #[arg(long)]
        use_point_map: bool,
    },
    /// Wait for the bucket and create the working prefixes
    InitBucket {
        /// Connection attempts before giving up
        #[arg(long, default_value_t = CONNECT_ATTEMPTS)]
        attempts: u32,
        /// Seconds between connection attempts
        #[arg(long, default_value_t = CONNECT_DELAY.as_secs())]
        delay_secs: u64,
    },
    /// Upload the images of a local directory
    UploadImages {
        /// Directory to read images from
        dir: PathBuf,
        /// Destination prefix
        #[arg(long, default_value = "test_images")]
        prefix: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", s);
    Ok(())
}

fn report_scan(summary: &ScanSummary) -> anyhow::Result<()> {
    print_json(summary)?;
    for line in failure_lines(summary, MAX_ERROR_LEN) {
        eprintln!("failed: {}", line);
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
}

/// Image keys directly or transitively under `prefix`, sorted.
async fn image_keys_under(storage: &dyn Storage, prefix: &str) -> anyhow::Result<Vec<String>> {
    let objects: Vec<_> = storage
        .list(prefix)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list images under {}", prefix))?;

    let mut keys: Vec<String> = objects
        .into_iter()
        .map(|object| object.key)
        .filter(|key| bootstrap::is_image_file(Path::new(key)))
        .collect();
    keys.sort();
    Ok(keys)
}

async fn scan_dropbox(
    config: &WorkstreamConfig,
    storage: Arc<dyn Storage>,
    every: Option<u64>,
) -> anyhow::Result<()> {
    config.api.validate().context("Invalid Asset API configuration")?;
    let client = ApiClient::from_config(&config.api).context("Failed to build API client")?;
    let scanner = DropboxScanner::new(
        storage,
        Arc::new(client),
        &config.scan,
        RetryPolicy::from_config(&config.retry),
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let Some(every) = every else {
        let summary = scanner.run(&cancel).await.context("Dropbox scan failed")?;
        report_scan(&summary)?;
        if !summary.success {
            anyhow::bail!(
                "{} of {} files were not registered",
                summary.failed_assets + summary.not_collected,
                summary.files_processed
            );
        }
        return Ok(());
    };

    let interval = Duration::from_secs(every.max(1));
    tracing::info!(interval_secs = interval.as_secs(), "Starting scheduled dropbox scans");
    loop {
        match scanner.run(&cancel).await {
            Ok(summary) => report_scan(&summary)?,
            Err(e) => tracing::error!(error = %e, "Dropbox scan failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Scheduled dropbox scans stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = WorkstreamConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let storage = create_storage(&config.storage)
        .await
        .context("Failed to create storage backend")?;

    match cli.command {
        Commands::ScanDropbox {
            prefix,
            concurrency,
            flight_uuid,
            every,
        } => {
            if let Some(mut prefix) = prefix {
                if !prefix.ends_with('/') {
                    prefix.push('/');
                }
                config.scan.dropbox_prefix = prefix;
            }
            if let Some(concurrency) = concurrency {
                anyhow::ensure!(concurrency > 0, "--concurrency must be at least 1");
                config.scan.concurrency = concurrency;
            }
            if flight_uuid.is_some() {
                config.scan.flight_uuid = flight_uuid;
            }
            scan_dropbox(&config, storage, every).await?;
        }
        Commands::Reconstruct {
            images,
            image_prefix,
            output_prefix,
            use_point_map,
        } => {
            let image_keys = match image_prefix {
                Some(prefix) => image_keys_under(storage.as_ref(), &prefix).await?,
                None => images,
            };
            anyhow::ensure!(!image_keys.is_empty(), "No images to reconstruct");

            let model = HttpReconstructionModel::from_config(&config.reconstruction)
                .context("Failed to set up the reconstruction model")?;
            let pipeline = ReconstructionPipeline::new(storage, Arc::new(model));
            let job = ReconstructionJob {
                image_keys,
                output_prefix: output_prefix.trim_end_matches('/').to_string(),
                use_point_map: use_point_map || config.reconstruction.use_point_map,
            };

            let report = pipeline.run(&job).await.context("Reconstruction failed")?;
            print_json(&report)?;
        }
        Commands::InitBucket {
            attempts,
            delay_secs,
        } => {
            let created = bootstrap::init_bucket(
                storage.as_ref(),
                RetryPolicy::fixed(attempts, Duration::from_secs(delay_secs)),
            )
            .await
            .context("Bucket initialization failed")?;
            print_json(&serde_json::json!({
                "bucket": storage.bucket(),
                "created": created,
            }))?;
        }
        Commands::UploadImages { dir, prefix } => {
            let keys = bootstrap::upload_images(storage.as_ref(), &dir, prefix.trim_end_matches('/'))
                .await
                .with_context(|| format!("Failed to upload images from {}", dir.display()))?;
            print_json(&keys)?;
        }
    }

    Ok(())
}
