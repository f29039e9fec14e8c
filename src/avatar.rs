//! Avatar image normalization.
//!
//! Uploads arrive as jpg/jpeg/png and are stored in one canonical shape: a
//! 250x250 PNG. Decoding and resizing run inline as part of the upload
//! request; the result is the only form ever persisted or served.

use image::{imageops::FilterType, ImageFormat};
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Cursor;

use crate::error::AppError;

/// Upper bound on an uploaded avatar file, in bytes.
pub const MAX_AVATAR_BYTES: usize = 1_000_000;

/// Side length of the stored avatar, in pixels.
pub const AVATAR_DIMENSION: u32 = 250;

lazy_static! {
    // Accepted upload filename extensions, case-insensitive.
    static ref AVATAR_FILENAME_REGEX: Regex = Regex::new(r"(?i)\.(jpg|jpeg|png)$").unwrap();
}

/// Whether an uploaded filename carries one of the accepted extensions.
pub fn is_supported_filename(filename: &str) -> bool {
    AVATAR_FILENAME_REGEX.is_match(filename)
}

/// Decodes an uploaded image, resizes it to exactly 250x250, and re-encodes it
/// as PNG.
///
/// Undecodable bytes are the client's problem (400); an encoding failure on
/// our side is not (500).
pub fn normalize_avatar(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AppError::Validation(format!("Unreadable image: {}", e)))?;

    let resized = decoded.resize_exact(AVATAR_DIMENSION, AVATAR_DIMENSION, FilterType::Lanczos3);

    let mut output = Cursor::new(Vec::new());
    resized
        .write_to(&mut output, ImageFormat::Png)
        .map_err(|e| AppError::Upstream(format!("Failed to encode avatar: {}", e)))?;

    Ok(output.into_inner())
}
