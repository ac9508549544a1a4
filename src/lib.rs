//! logo-matte - strip near-white backgrounds from images
//!
//! Loads an image from a file, URL, data URI or memory, makes every pixel
//! whose red, green and blue channels all exceed a threshold transparent, and
//! hands back a PNG (or `data:image/png;base64,` URI) of the same size.
//!
//! ```no_run
//! use logo_matte::{process_or_original, ImageSource, PipelineOptions};
//!
//! # async fn demo() {
//! let logo = ImageSource::parse("images/logo.png");
//! let shown = process_or_original(&logo, &PipelineOptions::default()).await;
//! let src = shown.src(); // processed data URI, or the original reference
//! # let _ = src;
//! # }
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod strip;

pub use batch::{collect_inputs, run_batch, BatchItem, BatchReport, ItemOutcome, OutputMode};
pub use cli::{CheckArgs, Cli, Commands, CommonArgs, StripArgs};
pub use config::{CliOverrides, Config, ConfigError};
pub use pipeline::{
    load_and_process, process_or_original, CancelToken, DisplayImage, Pipeline, PipelineOptions,
    ProcessedImage, ProcessingStage, SilentStages, StageCallback,
};
pub use source::ImageSource;
pub use strip::{
    is_whiteish, strip_white_background, LoadCause, StripError, StripOptions, StripStats,
    WhiteBackgroundStripper, DEFAULT_THRESHOLD,
};

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGS: i32 = 2;
    pub const INPUT_NOT_FOUND: i32 = 3;
    pub const PROCESSING_FAILED: i32 = 4;
}
