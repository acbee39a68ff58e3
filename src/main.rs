//! Pyramid Tiler - cut large images into multi-resolution tile pyramids.
//!
//! This binary converts batches of images and validates finished tilesets.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyramid_tiler::{
    config::{Cli, Command, ConvertConfig, ValidateConfig},
    validate_tileset, Converter, RasterProcessor, TilerConfig, TilesetInfo, TilingError,
    TilingScheme,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.log_filter());

    match cli.command {
        Command::Convert(config) => run_convert(config).await,
        Command::Validate(config) => run_validate(config),
    }
}

// =============================================================================
// Convert Command
// =============================================================================

async fn run_convert(config: ConvertConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    let tiler_config = match config.tiler_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Converting {} image(s) to {} ({}x{} {} tiles, {} at a time)",
        config.images.len(),
        config.scheme,
        tiler_config.tile_width,
        tiler_config.tile_height,
        tiler_config.format.extension(),
        config.jobs
    );

    // Each conversion runs on a blocking worker; the semaphore caps how many
    // are in flight at once.
    let semaphore = Arc::new(Semaphore::new(config.jobs));
    let mut handles = Vec::with_capacity(config.images.len());
    for image in &config.images {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Worker pool closed: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let job = ConvertJob {
            scheme: config.scheme,
            config: tiler_config.clone(),
            image: image.clone(),
            output: config.output.clone(),
            validate: config.validate,
        };
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job.run()
        });
        handles.push((image.clone(), handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut failures = 0usize;
    for (image, handle) in handles {
        match handle.await {
            Ok(Ok(info)) => results.push(info),
            Ok(Err(e)) => {
                error!("{}: {}", image.display(), e);
                failures += 1;
            }
            Err(e) => {
                error!("{}: worker failed: {}", image.display(), e);
                failures += 1;
            }
        }
    }

    if config.json {
        match serde_json::to_string_pretty(&results) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Could not serialize results: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        for info in &results {
            print_summary(info);
        }
    }

    info!(
        "Converted {} of {} image(s)",
        results.len(),
        config.images.len()
    );
    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Everything one worker needs to convert one image.
struct ConvertJob {
    scheme: TilingScheme,
    config: TilerConfig,
    image: PathBuf,
    output: Option<PathBuf>,
    validate: bool,
}

impl ConvertJob {
    fn run(self) -> Result<TilesetInfo, TilingError> {
        let processor = RasterProcessor::new(&self.config);
        let converter = Converter::new(self.scheme, self.config, processor);
        let info = converter.convert(&self.image, self.output.as_deref())?;

        if self.validate {
            let report = validate_tileset(&info.output, Some(self.scheme))?;
            info!(
                "Validated {}: {} tiles present",
                info.output.display(),
                report.tiles_checked
            );
        }
        Ok(info)
    }
}

fn print_summary(info: &TilesetInfo) {
    println!(
        "{} -> {} ({}, {}x{}, {} zoom levels, {} tiles, {} ms)",
        info.source.display(),
        info.output.display(),
        info.scheme,
        info.image_width,
        info.image_height,
        info.zoom_levels,
        info.total_tiles,
        info.elapsed_ms
    );
}

// =============================================================================
// Validate Command
// =============================================================================

fn run_validate(config: ValidateConfig) -> ExitCode {
    match validate_tileset(&config.tileset, config.scheme) {
        Ok(report) => {
            println!(
                "✓ {}: complete {} tileset, {} zoom levels, {} tiles",
                config.tileset.display(),
                report.scheme,
                report.zoom_levels,
                report.tiles_checked
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ {}: {}", config.tileset.display(), e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(env_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
