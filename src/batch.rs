//! Batch processing for the CLI
//!
//! Runs the pipeline over many inputs with bounded concurrency and applies
//! the fallback policy per input.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::pipeline::{Pipeline, ProcessedImage};
use crate::source::ImageSource;
use crate::strip::StripError;

/// File extensions picked up when an input is a directory
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// Where results go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Write `<name>.png` files into a directory
    Directory(PathBuf),
    /// Return data URIs for the caller to print
    DataUri,
}

/// Result for one input
#[derive(Debug)]
pub enum ItemOutcome {
    /// Written to a file, or rendered as a data URI
    Processed { output: String },
    /// Processing failed; the original stands in
    FellBack { output: String, error: StripError },
    /// Processing failed and no fallback was allowed or possible
    Failed { error: StripError },
}

/// One input and what happened to it
#[derive(Debug)]
pub struct BatchItem {
    pub source: ImageSource,
    pub outcome: ItemOutcome,
}

/// Batch results in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Processed { .. }))
    }

    pub fn fell_back(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::FellBack { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

/// Expand CLI inputs: directories become their image files, sorted
pub fn collect_inputs(inputs: &[String]) -> std::io::Result<Vec<ImageSource>> {
    let mut sources = Vec::new();

    for input in inputs {
        let source = ImageSource::parse(input);
        match source.as_path() {
            Some(dir) if dir.is_dir() => {
                let mut files = Vec::new();
                for entry in std::fs::read_dir(dir)? {
                    let path = entry?.path();
                    if path.is_file() && has_image_extension(&path) {
                        files.push(path);
                    }
                }
                files.sort();
                sources.extend(files.into_iter().map(ImageSource::Path));
            }
            _ => sources.push(source),
        }
    }

    Ok(sources)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Base name for the output file of `source`
fn output_stem(source: &ImageSource, index: usize) -> String {
    let stem = match source {
        ImageSource::Path(p) => p.file_stem().map(|s| s.to_string_lossy().into_owned()),
        ImageSource::Url(u) => u
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem).to_string()),
        ImageSource::DataUri(_) | ImageSource::Bytes(_) => None,
    };

    stem.filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("image-{}", index + 1))
}

/// File names reserved for one input in directory mode
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputNames {
    /// `<stem>.png` for the processed image
    processed: String,
    /// `<stem>.<original ext>` for a fallback copy; file sources only
    original: Option<String>,
}

impl OutputNames {
    fn for_stem(stem: &str, source: &ImageSource) -> Self {
        let original = source.as_path().map(|p| match p.extension() {
            Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
            None => stem.to_string(),
        });
        Self {
            processed: format!("{}.png", stem),
            original,
        }
    }

    /// Lowercased so names differing only in case collide
    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.processed)
            .chain(self.original.as_ref())
            .map(|n| n.to_lowercase())
    }
}

/// Output file names, in input order.
///
/// No name is shared between inputs, whether it ends up holding a processed
/// image or a fallback copy.
fn output_names(sources: &[ImageSource]) -> Vec<OutputNames> {
    let mut taken = HashSet::new();
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let base = output_stem(source, i);
            let mut suffix = 1usize;
            loop {
                let stem = if suffix == 1 {
                    base.clone()
                } else {
                    format!("{}-{}", base, suffix)
                };
                let names = OutputNames::for_stem(&stem, source);
                if names.keys().all(|k| !taken.contains(&k)) {
                    taken.extend(names.keys());
                    break names;
                }
                suffix += 1;
            }
        })
        .collect()
}

/// Process every source with at most `config.effective_jobs()` in flight
pub async fn run_batch(sources: Vec<ImageSource>, config: &Config, mode: OutputMode) -> BatchReport {
    if let OutputMode::Directory(dir) = &mode {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "could not create output directory");
        }
    }

    let pipeline = Arc::new(Pipeline::new(config.to_pipeline_options()));
    let permits = Arc::new(Semaphore::new(config.effective_jobs()));
    let names = output_names(&sources);
    let fallback = config.fallback;

    let mut tasks = JoinSet::new();
    for (index, (source, names)) in sources.into_iter().zip(names).enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let permits = Arc::clone(&permits);
        let mode = mode.clone();

        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            let result = pipeline.process(&source).await;
            let outcome = settle(&source, &names, result, &mode, fallback).await;
            (index, BatchItem { source, outcome })
        });
    }

    let mut items = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(item) => items.push(item),
            Err(e) => warn!(error = %e, "batch task aborted"),
        }
    }
    items.sort_by_key(|(index, _)| *index);

    let report = BatchReport {
        items: items.into_iter().map(|(_, item)| item).collect(),
    };
    info!(
        processed = report.processed(),
        fallback = report.fell_back(),
        failed = report.failed(),
        "batch finished"
    );
    report
}

async fn settle(
    source: &ImageSource,
    names: &OutputNames,
    result: Result<ProcessedImage, StripError>,
    mode: &OutputMode,
    fallback: bool,
) -> ItemOutcome {
    let error = match result {
        Ok(processed) => {
            return match write_processed(&processed, names, mode).await {
                Ok(output) => ItemOutcome::Processed { output },
                Err(e) => ItemOutcome::Failed {
                    error: StripError::Encode(format!("could not write output: {}", e)),
                },
            };
        }
        Err(error) => error,
    };

    if !fallback || !error.is_fallback_eligible() {
        return ItemOutcome::Failed { error };
    }

    warn!(source = %source, error = %error, "could not process image, using original");
    match write_original(source, names, mode).await {
        Ok(output) => ItemOutcome::FellBack { output, error },
        Err(e) => {
            warn!(source = %source, error = %e, "could not copy original");
            ItemOutcome::Failed { error }
        }
    }
}

async fn write_processed(
    processed: &ProcessedImage,
    names: &OutputNames,
    mode: &OutputMode,
) -> std::io::Result<String> {
    match mode {
        OutputMode::DataUri => Ok(processed.data_uri()),
        OutputMode::Directory(dir) => {
            let path = dir.join(&names.processed);
            tokio::fs::write(&path, &processed.png).await?;
            Ok(path.display().to_string())
        }
    }
}

/// Put the unprocessed original where the processed image would have gone.
///
/// File sources are copied under their reserved name, keeping the original
/// extension. Other sources are reported by reference only.
async fn write_original(
    source: &ImageSource,
    names: &OutputNames,
    mode: &OutputMode,
) -> std::io::Result<String> {
    match (mode, source, &names.original) {
        (OutputMode::DataUri, _, _) => Ok(source.original_reference()),
        (OutputMode::Directory(dir), ImageSource::Path(path), Some(name)) if path.is_file() => {
            let target = dir.join(name);
            tokio::fs::copy(path, &target).await?;
            Ok(target.display().to_string())
        }
        (OutputMode::Directory(_), _, _) => Ok(source.original_reference()),
    }
}
