//! Sidecar pairing and directory conversion.
//!
//! A pair is one vendor sidecar and one destination sidecar for the same
//! image. In directory mode every `*.xmp` under the source directory is
//! paired with the same filename under the destination directory; source
//! files without a destination partner are skipped with a warning. The
//! tool updates destination sidecars, it never creates them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cropshift_core::{translate_crop, Translation};
use tracing::{debug, info, warn};

use crate::xmp::XmpDocument;

/// Outcome counts for a directory run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Pairs where crop attributes were written.
    pub merged: usize,
    /// Pairs where stale crop attributes were removed.
    pub cleared: usize,
    /// Pairs whose source carries no crop metadata.
    pub no_crop: usize,
    /// Source sidecars with no destination partner.
    pub skipped: usize,
    /// Pairs that failed to translate.
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.merged + self.cleared + self.no_crop + self.skipped + self.failed
    }
}

/// Translate one sidecar pair, writing the destination back only when its
/// content actually changed.
pub fn convert_pair(source_path: &Path, destination_path: &Path) -> Result<Translation> {
    let source = XmpDocument::load(source_path)?;
    let mut destination = XmpDocument::load(destination_path)?;
    if !destination.has_description() {
        bail!(
            "{} has no rdf:Description element to merge into",
            destination_path.display()
        );
    }

    let original = destination.content().to_string();
    let outcome = translate_crop(&source, &mut destination)
        .with_context(|| format!("translating {}", source_path.display()))?;

    if destination.content() != original {
        destination.save(destination_path)?;
        debug!("wrote {}", destination_path.display());
    }
    Ok(outcome)
}

/// Translate every source `*.xmp` that has a same-named destination
/// sidecar. One failing pair does not stop the rest.
pub fn convert_directory(source_dir: &Path, destination_dir: &Path) -> Result<BatchSummary> {
    let mut sources: Vec<PathBuf> = fs::read_dir(source_dir)
        .with_context(|| format!("reading {}", source_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_xmp(path))
        .collect();
    sources.sort();

    let mut summary = BatchSummary::default();
    if sources.is_empty() {
        info!("no XMP sidecars in {}", source_dir.display());
        return Ok(summary);
    }
    info!("found {} source sidecars", sources.len());

    for source_path in &sources {
        let Some(file_name) = source_path.file_name() else {
            continue;
        };
        let name = file_name.to_string_lossy();
        let destination_path = destination_dir.join(file_name);
        if !destination_path.exists() {
            warn!("{name}: no destination sidecar, skipping");
            summary.skipped += 1;
            continue;
        }

        match convert_pair(source_path, &destination_path) {
            Ok(Translation::Merged(attributes)) => {
                info!("{name}: merged {} crop attributes", attributes.len());
                summary.merged += 1;
            }
            Ok(Translation::Cleared) => {
                info!("{name}: cleared stale crop");
                summary.cleared += 1;
            }
            Ok(Translation::NoCropPresent) => {
                debug!("{name}: no crop metadata");
                summary.no_crop += 1;
            }
            Err(error) => {
                warn!("{name}: {error:#}");
                summary.failed += 1;
            }
        }
    }

    info!(
        "{} merged, {} cleared, {} without crops, {} skipped, {} failed",
        summary.merged, summary.cleared, summary.no_crop, summary.skipped, summary.failed
    );
    Ok(summary)
}

fn is_xmp(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xmp"))
}
