//! Command-line front end: convert sidecar pairs, inspect single sidecars.

mod batch;
mod xmp;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cropshift_core::translate::EDIT_MODEL_ATTRIBUTE;
use cropshift_core::{
    decode_edit_model, extract_crop, ns, read_crop, read_frame, AttributeSource, CropRegion,
    FrameSize, Orientation, Translation,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::xmp::XmpDocument;

#[derive(Debug, Parser)]
#[command(name = "cropshift", version)]
#[command(about = "Translate crop and rotation edits between XMP sidecar dialects")]
struct Cli {
    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge vendor crops into matching destination sidecars
    Convert {
        /// Vendor sidecar, or a directory of them
        source: PathBuf,
        /// Destination sidecar, or a directory paired by filename
        destination: PathBuf,
    },
    /// Print the crop state a sidecar carries
    Inspect {
        /// Sidecar in either dialect
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Convert {
            source,
            destination,
        } => convert(&source, &destination),
        Command::Inspect { path } => inspect(&path),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cropshift=debug,cropshift_core=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cropshift=info,cropshift_core=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn convert(source: &Path, destination: &Path) -> Result<()> {
    if source.is_file() && destination.is_file() {
        match batch::convert_pair(source, destination)? {
            Translation::Merged(attributes) => {
                info!(
                    "merged {} crop attributes into {}",
                    attributes.len(),
                    destination.display()
                );
            }
            Translation::Cleared => {
                info!("cleared stale crop attributes in {}", destination.display());
            }
            Translation::NoCropPresent => {
                info!(
                    "{} carries no crop metadata, destination untouched",
                    source.display()
                );
            }
        }
        Ok(())
    } else if source.is_dir() && destination.is_dir() {
        let summary = batch::convert_directory(source, destination)?;
        if summary.failed > 0 {
            bail!(
                "{} of {} source sidecars failed",
                summary.failed,
                summary.total()
            );
        }
        Ok(())
    } else {
        bail!("source and destination must both be files or both be directories");
    }
}

/// Report the crop state of a single sidecar, whichever dialect it is in.
fn inspect(path: &Path) -> Result<()> {
    let document = XmpDocument::load(path)?;
    println!("{}", path.display());

    if let Some(raw) = document.attribute(ns::NITRO, EDIT_MODEL_ATTRIBUTE) {
        let model = decode_edit_model(&raw).context("decoding nitro:EditModel")?;
        let fallback = document
            .attribute(ns::TIFF, "Orientation")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map(Orientation::from);
        match extract_crop(&model, fallback)? {
            Some(extracted) if extracted.region.has_crop => {
                print_region("vendor crop", &extracted.region, Some(extracted.frame));
            }
            Some(extracted) => {
                println!("vendor crop: explicitly disabled (frame {})", extracted.frame);
            }
            None => println!("vendor crop: no crop record"),
        }
        return Ok(());
    }

    match read_crop(&document)? {
        Some(region) => {
            let frame = read_frame(&document)?;
            print_region("camera-raw crop", &region, frame);
        }
        None => println!("no crop metadata in either dialect"),
    }
    Ok(())
}

fn print_region(label: &str, region: &CropRegion, frame: Option<FrameSize>) {
    println!("{label}:");
    if let Some(frame) = frame {
        println!("  frame:    {frame}");
    }
    println!("  origin:   ({:.6}, {:.6})", region.origin_x, region.origin_y);
    println!("  size:     {:.6} x {:.6}", region.width, region.height);
    println!("  rotation: {:.6} deg", region.rotation_degrees);
}
