//! Async load-and-process pipeline
//!
//! One call runs `load → decode → strip → encode` for a single source:
//!
//! ```text
//! Idle → Loading → Decoded → Processing → Encoded
//!           └──────────┴──────────┴──────→ Failed
//! ```
//!
//! Loading and decoding are the only suspension point and are bounded by a
//! timeout. Decoding and pixel work run on the blocking pool so the async
//! runtime keeps serving other calls. Calls share no mutable state.

use reqwest::Client;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::source::ImageSource;
use crate::strip::{
    decode_rgba, encode_png, to_data_uri, LoadCause, Result, StripError, StripOptions, StripStats,
    WhiteBackgroundStripper, PNG_MIME,
};

/// Default load + decode timeout in seconds
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;

/// Default source size limit in bytes (32 MB)
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 32 * 1024 * 1024;

/// Default maximum width or height in pixels
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

// ============ Stages ============

/// Lifecycle of a single pipeline call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStage {
    #[default]
    Idle,
    /// Fetching and decoding the source
    Loading,
    /// Pixel grid is in memory
    Decoded,
    /// Stripping and encoding
    Processing,
    /// Finished with a processed image
    Encoded,
    /// Finished without one
    Failed,
}

impl ProcessingStage {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStage::Idle => "Idle",
            ProcessingStage::Loading => "Loading",
            ProcessingStage::Decoded => "Decoded",
            ProcessingStage::Processing => "Processing",
            ProcessingStage::Encoded => "Encoded",
            ProcessingStage::Failed => "Failed",
        }
    }

    /// Check if no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStage::Encoded | ProcessingStage::Failed)
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer for stage transitions
pub trait StageCallback: Send + Sync {
    fn on_stage(&self, stage: ProcessingStage);
}

/// Callback that ignores every transition
pub struct SilentStages;

impl StageCallback for SilentStages {
    fn on_stage(&self, _stage: ProcessingStage) {}
}

// ============ Cancellation ============

/// Cancels an in-flight call before its pixel step runs
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// ============ Options & Results ============

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pixel transform options
    pub strip: StripOptions,
    /// Upper bound on how long a caller waits for fetch + decode.
    ///
    /// On expiry the call fails at once, but a decode already running on the
    /// blocking pool keeps its thread until it finishes and its result is
    /// dropped. This bounds the wait, not the decoder's CPU time.
    pub load_timeout: Duration,
    /// Largest encoded source accepted
    pub max_source_bytes: u64,
    /// Largest width or height accepted
    pub max_dimension: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strip: StripOptions::default(),
            load_timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl PipelineOptions {
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.strip.threshold = threshold;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_max_source_bytes(mut self, limit: u64) -> Self {
        self.max_source_bytes = limit;
        self
    }

    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.strip.parallel = parallel;
        self
    }
}

/// A successfully processed image, owned by the caller
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// PNG-encoded result
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stats: StripStats,
}

impl ProcessedImage {
    /// `data:image/png;base64,...` for direct use as an image source
    pub fn data_uri(&self) -> String {
        to_data_uri(&self.png, PNG_MIME)
    }

    /// Write the PNG bytes to `path`
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.png)
    }
}

/// What a renderer should display for a source
#[derive(Debug, Clone)]
pub enum DisplayImage {
    Processed(ProcessedImage),
    Original(ImageSource),
}

impl DisplayImage {
    pub fn is_processed(&self) -> bool {
        matches!(self, DisplayImage::Processed(_))
    }

    /// Image reference to assign to a display surface
    pub fn src(&self) -> String {
        match self {
            DisplayImage::Processed(p) => p.data_uri(),
            DisplayImage::Original(s) => s.original_reference(),
        }
    }
}

// ============ Pipeline ============

/// Load-and-process pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: Client,
    options: PipelineOptions,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_client(Client::new(), options)
    }

    /// Reuse an existing HTTP client
    pub fn with_client(client: Client, options: PipelineOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process one source
    pub async fn process(&self, source: &ImageSource) -> Result<ProcessedImage> {
        self.process_with_progress(source, None, &SilentStages).await
    }

    /// Process one source, reporting stages and honoring `cancel`
    pub async fn process_with_progress(
        &self,
        source: &ImageSource,
        cancel: Option<&CancelToken>,
        progress: &dyn StageCallback,
    ) -> Result<ProcessedImage> {
        let source_ref = source.to_string();
        let result = self.run(source, &source_ref, cancel, progress).await;

        match &result {
            Ok(processed) => {
                enter(progress, &source_ref, ProcessingStage::Encoded);
                info!(
                    source = %source_ref,
                    width = processed.width,
                    height = processed.height,
                    stripped = processed.stats.stripped_pixels,
                    "stripped white background"
                );
            }
            Err(e) => {
                enter(progress, &source_ref, ProcessingStage::Failed);
                debug!(source = %source_ref, error = %e, "processing failed");
            }
        }

        result
    }

    /// Process one source, falling back to the original reference on failure.
    ///
    /// Always resolves with something displayable.
    pub async fn process_or_original(&self, source: &ImageSource) -> DisplayImage {
        match self.process(source).await {
            Ok(processed) => DisplayImage::Processed(processed),
            Err(e) => {
                warn!(source = %source, error = %e, "could not process image, using original");
                DisplayImage::Original(source.clone())
            }
        }
    }

    /// Count the pixels `process` would strip, without encoding anything
    pub async fn inspect(&self, source: &ImageSource) -> Result<StripStats> {
        let source_ref = source.to_string();
        let timeout = self.options.load_timeout;
        let image = tokio::time::timeout(timeout, self.load(source, &source_ref))
            .await
            .map_err(|_| StripError::load(&source_ref, LoadCause::Timeout(timeout)))??;
        Ok(WhiteBackgroundStripper::detect(&image, &self.options.strip))
    }

    async fn run(
        &self,
        source: &ImageSource,
        source_ref: &str,
        cancel: Option<&CancelToken>,
        progress: &dyn StageCallback,
    ) -> Result<ProcessedImage> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(StripError::Cancelled);
        }

        enter(progress, source_ref, ProcessingStage::Loading);

        let timeout = self.options.load_timeout;
        let load = tokio::time::timeout(timeout, self.load(source, source_ref));
        let loaded = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(StripError::Cancelled),
                res = load => res,
            },
            None => load.await,
        };
        let image = loaded
            .map_err(|_| StripError::load(source_ref, LoadCause::Timeout(timeout)))??;

        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(StripError::Cancelled);
        }

        enter(progress, source_ref, ProcessingStage::Decoded);
        enter(progress, source_ref, ProcessingStage::Processing);

        let options = self.options.strip.clone();
        tokio::task::spawn_blocking(move || -> Result<ProcessedImage> {
            let (width, height) = image.dimensions();
            let (stripped, stats) = WhiteBackgroundStripper::strip(&image, &options);
            let png = encode_png(&stripped)?;
            Ok(ProcessedImage {
                png,
                width,
                height,
                stats,
            })
        })
        .await
        .map_err(|e| StripError::Encode(format!("processing task failed: {}", e)))?
    }

    async fn load(&self, source: &ImageSource, source_ref: &str) -> Result<image::RgbaImage> {
        let bytes = source
            .fetch(&self.client, self.options.max_source_bytes)
            .await?;

        let owned_ref = source_ref.to_string();
        let max_dimension = self.options.max_dimension;
        tokio::task::spawn_blocking(move || decode_rgba(&bytes, &owned_ref, Some(max_dimension)))
            .await
            .map_err(|e| StripError::read(source_ref, format!("decode task failed: {}", e)))?
    }
}

fn enter(progress: &dyn StageCallback, source_ref: &str, stage: ProcessingStage) {
    debug!(source = %source_ref, %stage, "pipeline stage");
    progress.on_stage(stage);
}

/// Load, strip and encode `source` with a fresh pipeline
pub async fn load_and_process(
    source: &ImageSource,
    options: &PipelineOptions,
) -> Result<ProcessedImage> {
    Pipeline::new(options.clone()).process(source).await
}

/// Like [`load_and_process`], but always yields something to display
pub async fn process_or_original(source: &ImageSource, options: &PipelineOptions) -> DisplayImage {
    Pipeline::new(options.clone()).process_or_original(source).await
}
