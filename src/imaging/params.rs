//! Parameter types for a transform.
//!
//! These structs describe *what* the codec engine should produce. The
//! [`calculations`](super::calculations) module fills in the geometry, the
//! [`encode_options`](super::encode_options) table supplies encoder knobs, and
//! the [`backend`](super::backend) does the pixel work.
//!
//! ## Types
//!
//! - [`ResizePolicy`]: `Fit` (aspect-preserving, center-cropped) or `Stretch`.
//! - [`CropRect`]: region of the upright source frame that gets resampled.
//! - [`TargetGeometry`]: exact output size plus the source crop.
//! - [`EncodeKey`] / [`EncodeOptions`]: per-format integer encoder settings.
//! - [`TransformSpec`]: everything the codec needs besides the buffers.

use super::format::ContainerFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePolicy {
    /// Preserve aspect ratio, cover the box, center-crop the overflow.
    #[default]
    Fit,
    /// Scale each axis independently to the exact box.
    Stretch,
}

impl ResizePolicy {
    pub fn from_stretch_flag(stretch: bool) -> Self {
        if stretch { Self::Stretch } else { Self::Fit }
    }
}

/// A rectangle in source pixel coordinates.
///
/// Edges are fractional: the resampler takes sub-pixel crops, so a Fit crop
/// keeps the exact aspect ratio of the target instead of the nearest whole
/// pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: f64::from(width),
            height: f64::from(height),
        }
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Resolved output geometry for one transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGeometry {
    /// Output width, always > 0.
    pub width: u32,
    /// Output height, always > 0.
    pub height: u32,
    pub policy: ResizePolicy,
    /// Part of the (upright) source that is resampled into the output.
    pub crop: CropRect,
}

/// Encoder setting names. Each belongs to one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeKey {
    /// JPEG quality, 1-100.
    JpegQuality,
    /// PNG zlib effort, 0-9.
    PngCompression,
    /// WebP quality, 1-100.
    WebpQuality,
    /// GIF quantizer speed, 1-30 (1 = best palette).
    GifSpeed,
}

/// Integer encoder settings for one output format.
///
/// Always replaced as a whole; there is no per-key merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodeOptions(BTreeMap<EncodeKey, i32>);

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: EncodeKey, value: i32) -> Self {
        self.0.insert(key, value);
        self
    }

    pub fn get(&self, key: EncodeKey) -> Option<i32> {
        self.0.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EncodeKey, i32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Everything the codec's transform call needs apart from the buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub geometry: TargetGeometry,
    pub target: ContainerFormat,
    pub options: EncodeOptions,
    pub normalize_orientation: bool,
}
