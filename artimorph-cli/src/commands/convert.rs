//! Convert command - turn an image into a 3D model.

use std::path::PathBuf;
use std::time::Duration;

use artimorph::config::{ConfigFile, ConversionSettings, SettingsOverrides};
use artimorph::conversion::{ConversionAttempt, ConversionError, ConversionRequest};
use artimorph::store::ModelStore;
use clap::{Args, ValueEnum};
use console::style;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Declared image encoding.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    Jpg,
    Png,
    Webp,
}

impl FormatArg {
    fn as_str(self) -> &'static str {
        match self {
            FormatArg::Jpg => "jpg",
            FormatArg::Png => "png",
            FormatArg::Webp => "webp",
        }
    }
}

/// Arguments for the convert command.
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Image file to convert (JPEG, PNG or WebP)
    pub image: PathBuf,

    /// Declare the image format instead of detecting it
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// API key (overrides ARTIMORPH_API_KEY and config)
    #[arg(long)]
    pub api_key: Option<String>,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory to save the model into
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Seconds between status checks
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Give up after this many seconds of polling
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Run the convert command.
pub fn run(args: ConvertArgs, config: &ConfigFile) -> Result<(), CliError> {
    let bytes = std::fs::read(&args.image).map_err(|source| CliError::ReadImage {
        path: args.image.clone(),
        source,
    })?;
    let request = match args.format {
        Some(format) => ConversionRequest::with_format(bytes, format.as_str())?,
        None => ConversionRequest::from_bytes(bytes)?,
    };

    let settings = ConversionSettings::resolve(
        config,
        SettingsOverrides {
            api_key: args.api_key,
            base_url: args.base_url,
            models_dir: args.models_dir,
            poll_interval: args.poll_interval,
            timeout: args.timeout,
        },
    )?;
    let api = settings.api_client()?;
    let store = ModelStore::open(&settings.models_dir)?;

    println!("ArtiMorph v{}", artimorph::VERSION);
    println!("Image:  {} ({})", args.image.display(), request.format());
    println!("Models: {}", store.root().display());
    println!();
    println!("Press Ctrl+C to cancel");
    println!();

    info!(image = %args.image.display(), format = %request.format(), "Starting conversion");

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    ctrlc::set_handler(move || cancel_on_signal.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let attempt = ConversionAttempt::new(api, store, settings.poll, request);
    let asset = runtime.block_on(async {
        let bar = progress_bar();
        bar.set_message("uploading");

        let mut stream = attempt.spawn(&cancel);
        while let Some(item) = stream.next().await {
            match item {
                Ok(snapshot) => {
                    bar.set_position(snapshot.progress as u64);
                    bar.set_message(snapshot.status.to_string());
                }
                Err(e) => {
                    bar.abandon_with_message(style("failed").red().to_string());
                    return Err(CliError::from(e));
                }
            }
        }

        bar.finish_with_message(style("done").green().to_string());
        stream
            .asset()
            .cloned()
            .ok_or(CliError::Conversion(ConversionError::Cancelled))
    })?;

    println!();
    println!(
        "{} {}",
        style("Saved model:").green().bold(),
        asset.path.display()
    );
    println!("Task:        {}", asset.task_id);
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let template = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
    )
    .map(|s| s.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(template);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
