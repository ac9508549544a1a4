//! Strip module for white background removal
//!
//! # Features
//!
//! - **Whiteness masking** ([`whiteness`]) - Make near-white pixels transparent
//! - **Codec** ([`codec`]) - Decode sources into RGBA, encode PNG and data URIs

pub mod codec;
pub mod whiteness;
mod types;

// Re-export public API
pub use codec::{decode_data_uri, decode_rgba, encode_png, to_data_uri, PNG_MIME};

pub use whiteness::{
    is_whiteish, strip_white_background, StripOptions, StripOptionsBuilder, StripStats,
    WhiteBackgroundStripper, DEFAULT_THRESHOLD, PURE_WHITE_THRESHOLD,
};

pub use types::{LoadCause, Result, StripError};
