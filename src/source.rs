//! Image source references
//!
//! An [`ImageSource`] is the opaque reference a caller hands to the pipeline:
//! a local file, a remote URL, an embedded `data:` URI or bytes it already
//! holds. Fetching turns any of them into encoded bytes.

use reqwest::Client;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::strip::{decode_data_uri, to_data_uri, LoadCause, Result, StripError};

/// Shown in place of long data URI payloads in logs
const DATA_URI_PREVIEW_LEN: usize = 32;

/// Reference to an encoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file
    Path(PathBuf),
    /// `http://` or `https://` resource
    Url(String),
    /// `data:<mime>;base64,<payload>`
    DataUri(String),
    /// Encoded bytes already in memory
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Classify a string reference
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        let lower = trimmed.get(..8).unwrap_or(trimmed).to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageSource::Url(trimmed.to_string())
        } else if lower.starts_with("data:") {
            ImageSource::DataUri(trimmed.to_string())
        } else {
            ImageSource::Path(PathBuf::from(trimmed))
        }
    }

    /// Whether fetching touches the network
    pub fn is_remote(&self) -> bool {
        matches!(self, ImageSource::Url(_))
    }

    /// Local file path, if any
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ImageSource::Path(p) => Some(p),
            _ => None,
        }
    }

    /// The reference a renderer would use to show this source unprocessed
    pub fn original_reference(&self) -> String {
        match self {
            ImageSource::Path(p) => p.display().to_string(),
            ImageSource::Url(u) => u.clone(),
            ImageSource::DataUri(d) => d.clone(),
            ImageSource::Bytes(b) => {
                let mime = image::guess_format(b)
                    .map(|f| f.to_mime_type())
                    .unwrap_or("application/octet-stream");
                to_data_uri(b, mime)
            }
        }
    }

    /// Retrieve the encoded bytes, enforcing `max_bytes`
    pub async fn fetch(&self, client: &Client, max_bytes: u64) -> Result<Vec<u8>> {
        let source_ref = self.to_string();
        let bytes = match self {
            ImageSource::Path(path) => fetch_file(path, max_bytes)
                .await
                .map_err(|cause| StripError::load(&source_ref, cause))?,
            ImageSource::Url(url) => fetch_url(client, url, max_bytes)
                .await
                .map_err(|cause| StripError::load(&source_ref, cause))?,
            ImageSource::DataUri(uri) => {
                let (_, bytes) =
                    decode_data_uri(uri).map_err(|cause| StripError::load(&source_ref, cause))?;
                check_size(bytes.len() as u64, max_bytes)
                    .map_err(|cause| StripError::load(&source_ref, cause))?;
                bytes
            }
            ImageSource::Bytes(bytes) => {
                check_size(bytes.len() as u64, max_bytes)
                    .map_err(|cause| StripError::load(&source_ref, cause))?;
                bytes.clone()
            }
        };

        debug!(source = %source_ref, bytes = bytes.len(), "fetched image source");
        Ok(bytes)
    }
}

impl From<&str> for ImageSource {
    fn from(reference: &str) -> Self {
        ImageSource::parse(reference)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(p) => write!(f, "{}", p.display()),
            ImageSource::Url(u) => write!(f, "{}", u),
            ImageSource::DataUri(d) if d.len() > DATA_URI_PREVIEW_LEN => {
                let cut = d
                    .char_indices()
                    .nth(DATA_URI_PREVIEW_LEN)
                    .map_or(d.len(), |(i, _)| i);
                write!(f, "{}... ({} chars)", &d[..cut], d.len())
            }
            ImageSource::DataUri(d) => write!(f, "{}", d),
            ImageSource::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

fn check_size(size: u64, limit: u64) -> std::result::Result<(), LoadCause> {
    if size > limit {
        Err(LoadCause::TooLarge { size, limit })
    } else {
        Ok(())
    }
}

async fn fetch_file(path: &Path, max_bytes: u64) -> std::result::Result<Vec<u8>, LoadCause> {
    let meta = tokio::fs::metadata(path).await.map_err(io_cause)?;
    check_size(meta.len(), max_bytes)?;
    tokio::fs::read(path).await.map_err(io_cause)
}

async fn fetch_url(
    client: &Client,
    url: &str,
    max_bytes: u64,
) -> std::result::Result<Vec<u8>, LoadCause> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoadCause::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadCause::Status(status.as_u16()));
    }

    let declared = response.content_length();
    if let Some(len) = declared {
        check_size(len, max_bytes)?;
    }

    // Length-less and chunked bodies are cut off as soon as they pass the limit
    let mut body = Vec::with_capacity(declared.unwrap_or(0).min(max_bytes) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| LoadCause::Http(e.to_string()))?
    {
        check_size((body.len() + chunk.len()) as u64, max_bytes)?;
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn io_cause(e: std::io::Error) -> LoadCause {
    if e.kind() == ErrorKind::NotFound {
        LoadCause::NotFound
    } else {
        LoadCause::Io(e.to_string())
    }
}
