// SPDX-License-Identifier: GPL-3.0-only

//! Image encoding for rendered frames
//!
//! This module handles encoding rendered images to:
//! - PNG (lossless, default for exports)
//! - JPEG (with quality control)

use crate::errors::StorageError;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// PNG format (lossless compression)
    #[default]
    Png,
    /// JPEG format (lossy compression)
    Jpeg,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Png => "png",
            EncodingFormat::Jpeg => "jpg",
        }
    }

    /// Format matching a file extension, if supported
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(EncodingFormat::Png),
            "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
            _ => None,
        }
    }
}

/// Encoding quality settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encoder for rendered frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageEncoder {
    pub format: EncodingFormat,
    pub quality: EncodingQuality,
}

impl ImageEncoder {
    pub fn new(format: EncodingFormat, quality: EncodingQuality) -> Self {
        Self { format, quality }
    }

    /// Encode an image into memory
    pub fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, StorageError> {
        let data = match self.format {
            EncodingFormat::Jpeg => encode_jpeg(image, self.quality)?,
            EncodingFormat::Png => encode_png(image)?,
        };
        debug!(size = data.len(), format = ?self.format, "Encoding complete");
        Ok(data)
    }

    /// Encode and write to `path`, creating parent directories
    pub fn save(&self, image: &RgbImage, path: &Path) -> Result<(), StorageError> {
        let data = self.encode(image)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(path, &data).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), bytes = data.len(), "Image saved");
        Ok(())
    }
}

/// Encode image as JPEG
fn encode_jpeg(image: &RgbImage, quality: EncodingQuality) -> Result<Vec<u8>, StorageError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());

    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| StorageError::Encoding(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}

/// Encode image as PNG
fn encode_png(image: &RgbImage) -> Result<Vec<u8>, StorageError> {
    let mut buffer = Vec::new();

    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| StorageError::Encoding(format!("PNG encoding failed: {}", e)))?;

    Ok(buffer)
}
