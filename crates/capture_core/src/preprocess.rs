//! Image preprocessing module
//!
//! Vision models read small captures poorly, so images are brought up to a
//! minimum pixel size before submission:
//! - Payloads over a size threshold are treated as adequate and untouched
//! - Images already meeting the pixel floor are untouched
//! - Anything smaller is upscaled proportionally and re-encoded as JPEG
//!
//! Preparation never fails from the caller's point of view: on any decode or
//! encode problem the original payload is handed back.

use crate::decoder::{decode_base64_image, encode_data_url, DecodeError};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Errors raised internally while preparing an image
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("image has zero width or height")]
    ZeroSized,
    #[error("upscaling to {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
}

/// Outcome of [`ImagePreparator::try_prepare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    /// Encoded payload is already over the size threshold
    AlreadyLarge,
    /// Pixel dimensions already meet the floor
    LargeEnough { width: u32, height: u32 },
    /// Image was upscaled and re-encoded as a JPEG data URL
    Upscaled {
        data_url: String,
        width: u32,
        height: u32,
    },
}

/// Ensures images meet minimum size requirements before analysis
#[derive(Debug, Clone)]
pub struct ImagePreparator {
    /// Encoded length (bytes) above which an image is considered adequate
    pub adequate_len: usize,
    /// Minimum width in pixels
    pub min_width: u32,
    /// Minimum height in pixels
    pub min_height: u32,
    /// JPEG quality (1-100) used when re-encoding
    pub jpeg_quality: u8,
    /// Largest pixel count an upscaled image may reach
    pub max_pixels: u64,
}

impl Default for ImagePreparator {
    fn default() -> Self {
        Self {
            adequate_len: 100_000,
            min_width: 800,
            min_height: 600,
            jpeg_quality: 95,
            max_pixels: 4096 * 4096,
        }
    }
}

impl ImagePreparator {
    /// Return the payload, upscaled if it is below the pixel floor
    pub fn prepare(&self, image: &str) -> String {
        match self.try_prepare(image) {
            Ok(Preparation::Upscaled { data_url, .. }) => data_url,
            Ok(_) | Err(_) => image.to_string(),
        }
    }

    /// Like [`prepare`](Self::prepare) but reports what happened
    pub fn try_prepare(&self, image: &str) -> Result<Preparation, PrepareError> {
        if image.len() > self.adequate_len {
            return Ok(Preparation::AlreadyLarge);
        }

        let bytes = decode_base64_image(image)?;
        let decoded = image::load_from_memory(&bytes)?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(PrepareError::ZeroSized);
        }
        if width >= self.min_width && height >= self.min_height {
            return Ok(Preparation::LargeEnough { width, height });
        }

        let (new_width, new_height) = self.target_dimensions(width, height);
        // Thin strips scale to enormous targets; refuse before allocating
        if new_width as u64 * new_height as u64 > self.max_pixels {
            return Err(PrepareError::TooLarge {
                width: new_width,
                height: new_height,
                max_pixels: self.max_pixels,
            });
        }
        let resized = decoded.resize_exact(new_width, new_height, FilterType::Lanczos3);

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
        let mut encoded = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(
            &mut encoded,
            self.jpeg_quality,
        ))?;

        Ok(Preparation::Upscaled {
            data_url: encode_data_url("image/jpeg", &encoded),
            width: new_width,
            height: new_height,
        })
    }

    /// Dimensions after scaling up until both floors are met
    ///
    /// The aspect ratio is preserved up to rounding; images never shrink.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = (self.min_width as f64 / width as f64)
            .max(self.min_height as f64 / height as f64)
            .max(1.0);
        (
            (width as f64 * scale).round() as u32,
            (height as f64 * scale).round() as u32,
        )
    }
}
