//! Decode and encode helpers around the stripper
//!
//! Decoding sorts failures into the two fallback classes: bytes that are not
//! a readable image at all ([`StripError::Load`]) and images that were
//! recognized but whose pixel buffer cannot be produced ([`StripError::Read`]).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageError, ImageFormat, ImageReader, Limits, RgbaImage};
use std::io::Cursor;

use super::types::{LoadCause, Result, StripError};

/// MIME type of everything this crate encodes
pub const PNG_MIME: &str = "image/png";

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Decode encoded image bytes into an RGBA pixel grid.
///
/// Images without an alpha channel are widened with alpha 255. Images wider
/// or taller than `max_dimension` are refused before their pixels are
/// allocated.
pub fn decode_rgba(bytes: &[u8], source_ref: &str, max_dimension: Option<u32>) -> Result<RgbaImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StripError::load(source_ref, LoadCause::Io(e.to_string())))?;

    if reader.format().is_none() {
        return Err(StripError::load(
            source_ref,
            LoadCause::Decode("unrecognized image format".to_string()),
        ));
    }

    if let Some(max) = max_dimension {
        let mut limits = Limits::default();
        limits.max_image_width = Some(max);
        limits.max_image_height = Some(max);
        reader.limits(limits);
    }

    let decoded = reader.decode().map_err(|e| classify(e, source_ref))?;
    let rgba = decoded.to_rgba8();

    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(StripError::read(
            source_ref,
            format!("image has no pixels ({}x{})", width, height),
        ));
    }

    Ok(rgba)
}

fn classify(err: ImageError, source_ref: &str) -> StripError {
    match err {
        ImageError::Decoding(e) => StripError::load(source_ref, LoadCause::Decode(e.to_string())),
        ImageError::IoError(e) => StripError::load(source_ref, LoadCause::Io(e.to_string())),
        ImageError::Unsupported(e) => StripError::read(source_ref, e.to_string()),
        ImageError::Limits(e) => StripError::read(source_ref, e.to_string()),
        other => StripError::read(source_ref, other.to_string()),
    }
}

/// Losslessly encode an RGBA image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| StripError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Wrap encoded bytes as a `data:<mime>;base64,` URI
pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("{}{}{},{}", DATA_PREFIX, mime, BASE64_MARKER, STANDARD.encode(bytes))
}

/// Split a base64 data URI into its MIME type and decoded payload
pub fn decode_data_uri(uri: &str) -> std::result::Result<(String, Vec<u8>), LoadCause> {
    let rest = uri
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| LoadCause::InvalidDataUri("missing data: prefix".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadCause::InvalidDataUri("missing ',' separator".to_string()))?;

    let mime = header.strip_suffix(BASE64_MARKER).ok_or_else(|| {
        LoadCause::InvalidDataUri("only base64 data URIs are supported".to_string())
    })?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| LoadCause::InvalidDataUri(e.to_string()))?;

    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    fn sample() -> RgbaImage {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 1, Rgba([12, 34, 56, 0]));
        image
    }

    #[test]
    fn test_png_is_lossless() {
        let image = sample();
        let png = encode_png(&image).unwrap();
        let decoded = decode_rgba(&png, "mem", None).unwrap();
        assert_eq!(decoded.as_raw(), image.as_raw());
    }

    #[test]
    fn test_rgb_source_gets_opaque_alpha() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let mut buf = Cursor::new(Vec::new());
        rgb.write_to(&mut buf, ImageFormat::Png).unwrap();

        let decoded = decode_rgba(buf.get_ref(), "mem", None).unwrap();
        assert!(decoded.pixels().all(|p| p.0 == [1, 2, 3, 255]));
    }

    #[test]
    fn test_garbage_is_load_error() {
        let err = decode_rgba(b"definitely not an image", "junk", None).unwrap_err();
        assert!(matches!(
            err,
            StripError::Load {
                cause: LoadCause::Decode(_),
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_png_is_load_error() {
        let png = encode_png(&sample()).unwrap();
        let err = decode_rgba(&png[..png.len() / 2], "cut", None).unwrap_err();
        assert!(matches!(err, StripError::Load { .. }));
    }

    #[test]
    fn test_oversized_image_is_read_error() {
        let png = encode_png(&RgbaImage::new(8, 8)).unwrap();
        let err = decode_rgba(&png, "big", Some(4)).unwrap_err();
        assert!(matches!(err, StripError::Read { .. }));

        assert!(decode_rgba(&png, "big", Some(8)).is_ok());
    }

    #[test]
    fn test_data_uri_round_trip() {
        let uri = to_data_uri(&[1, 2, 3, 250], PNG_MIME);
        assert!(uri.starts_with("data:image/png;base64,"));

        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![1, 2, 3, 250]);
    }

    #[test]
    fn test_data_uri_rejects_malformed() {
        assert!(matches!(
            decode_data_uri("image/png;base64,AAAA"),
            Err(LoadCause::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64"),
            Err(LoadCause::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(LoadCause::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,!!!"),
            Err(LoadCause::InvalidDataUri(_))
        ));
    }
}
