// ABOUTME: fitsync CLI - incremental Strava-to-FitTrackee synchronization
// ABOUTME: Token setup, sync, bulk download/upload, and destructive bulk delete
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//!
//! Usage:
//! ```bash
//! # One-time interactive token setup for both providers
//! fitsync setup-tokens
//!
//! # Transfer activities newer than the latest FitTrackee workout
//! fitsync sync
//!
//! # Download every Strava activity as GPX files
//! fitsync download-all --output-folder ./gpx
//!
//! # Upload a folder of GPX files to FitTrackee
//! fitsync upload-all --input-folder ./gpx
//!
//! # Delete every workout on the FitTrackee instance (asks first)
//! fitsync delete-all
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fitsync::config::Config;
use fitsync::lock::InstanceLock;
use fitsync::oauth::TerminalPrompt;
use fitsync::providers::fittrackee::FitTrackeeClient;
use fitsync::providers::strava::StravaClient;
use fitsync::providers::{sport_map, ActivitySource, WorkoutDestination};
use fitsync::{sync, track};
use futures_util::StreamExt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(
    name = "fitsync",
    about = "Incremental Strava-to-FitTrackee activity synchronization",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output verbosity: 0 = warnings, 1 = info, 2 = debug
    #[arg(short, long, global = true, default_value_t = 1)]
    verbosity: u8,
}

#[non_exhaustive]
#[derive(Subcommand)]
enum Command {
    /// Set up initial token authentication for both providers
    SetupTokens,

    /// Transfer Strava activities not yet present in FitTrackee
    Sync,

    /// Download all Strava activities as GPX files
    DownloadAll {
        /// Folder to store the generated GPX files in
        #[arg(long, default_value = "./gpx")]
        output_folder: PathBuf,
    },

    /// Upload all GPX files in a folder as FitTrackee workouts
    UploadAll {
        /// Folder to read GPX files from
        #[arg(long, default_value = "./gpx")]
        input_folder: PathBuf,
    },

    /// Delete every workout on the FitTrackee instance
    DeleteAll,

    /// Upload a single GPX file to FitTrackee
    UploadSingle {
        /// Path of the GPX file to upload
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt().with_env_filter(level).init();

    let config = Config::from_env()?;
    let lock = InstanceLock::acquire(&config.lock_file)
        .context("another fitsync instance appears to be running")?;

    let result = tokio::select! {
        result = run_command(cli.command, &config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; shutting down");
            Ok(())
        }
    };

    if let Err(e) = lock.release() {
        warn!("Failed to release instance lock: {e}");
    }
    result
}

async fn run_command(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::SetupTokens => {
            info!("Setting up Strava tokens...");
            strava_client(config).ensure_authorized().await?;
            info!("Setting up FitTrackee tokens...");
            fittrackee_client(config).ensure_authorized().await?;
            Ok(())
        }
        Command::Sync => {
            let source = strava_client(config);
            let destination = fittrackee_client(config);
            source.ensure_authorized().await?;
            destination.ensure_authorized().await?;
            let summary = sync::run(&source, &destination).await?;
            info!(
                "Processed {} Strava activities ({summary})",
                summary.processed()
            );
            Ok(())
        }
        Command::DownloadAll { output_folder } => {
            download_all(&strava_client(config), &output_folder).await
        }
        Command::UploadAll { input_folder } => {
            upload_all(&fittrackee_client(config), &input_folder).await
        }
        Command::DeleteAll => delete_all(&fittrackee_client(config)).await,
        Command::UploadSingle { path } => {
            upload_file(&fittrackee_client(config), &path).await?;
            Ok(())
        }
    }
}

fn strava_client(config: &Config) -> StravaClient {
    StravaClient::new(&config.strava, Box::new(TerminalPrompt))
}

fn fittrackee_client(config: &Config) -> FitTrackeeClient {
    FitTrackeeClient::new(
        &config.fittrackee,
        &config.fittrackee_host,
        Box::new(TerminalPrompt),
    )
}

/// Download every activity as a GPX file, skipping files that already
/// exist so an interrupted run can resume across quota days.
async fn download_all(source: &StravaClient, output_folder: &Path) -> Result<()> {
    std::fs::create_dir_all(output_folder)
        .with_context(|| format!("cannot create {}", output_folder.display()))?;

    let mut processed = 0u32;
    let mut activities = source.activities_since(chrono::DateTime::UNIX_EPOCH);
    while let Some(next) = activities.next().await {
        let activity = next?;
        processed += 1;
        if !activity.has_geo_data() {
            warn!("Activity {} does not have GPS data, skipping!", activity.id);
            continue;
        }
        let output_file = output_folder.join(track::file_name(&activity));
        if output_file.exists() {
            debug!("Output {} already exists, skipping!", output_file.display());
            continue;
        }
        let payload = match source.fetch_track(&activity).await {
            Ok(payload) => payload,
            Err(e) if e.is_per_item() => {
                warn!("Skipping activity {}: {e}", activity.id);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Writing activity gpx to {}", output_file.display());
        std::fs::write(&output_file, track::to_xml(&payload)?)?;
        info!("Processed {processed} activities");
    }
    Ok(())
}

/// Upload every GPX file in a folder. Does not check for duplicates.
async fn upload_all(destination: &FitTrackeeClient, input_folder: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(input_folder)
        .with_context(|| format!("cannot read {}", input_folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "gpx"))
        .collect();
    files.sort();

    info!("Uploading {} GPX files", files.len());
    for path in &files {
        if let Err(e) = upload_file(destination, path).await {
            warn!("Skipping {}: {e}", path.display());
        }
    }
    Ok(())
}

async fn upload_file(destination: &FitTrackeeClient, path: &Path) -> Result<()> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("gpx file {} was not found", path.display()))?;
    let payload = track::parse(&xml)?;
    let sport = sport_map::destination_sport(&payload.sport).with_context(|| {
        format!(
            "activity type {:?} has no destination sport mapping",
            payload.sport
        )
    })?;
    debug!("POSTing {} to FitTrackee", path.display());
    destination.upload(&payload, sport).await?;
    Ok(())
}

async fn delete_all(destination: &FitTrackeeClient) -> Result<()> {
    let workouts = destination.all_workouts().await?;
    println!(
        "This will delete all {} workouts in the configured FitTrackee instance!",
        workouts.len()
    );
    if !confirm()? {
        println!("Action was cancelled due to user input");
        return Ok(());
    }
    for workout in &workouts {
        destination.delete_workout(&workout.id).await?;
    }
    info!("Deleted {} workouts", workouts.len());
    Ok(())
}

/// Interactive yes/no confirmation before destructive actions.
fn confirm() -> io::Result<bool> {
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "Are you sure you want to do this? [y]es or [n]o: ")?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        match line.trim().to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => writeln!(stdout, "\n Invalid option. Please enter a valid option.")?,
        }
    }
}
