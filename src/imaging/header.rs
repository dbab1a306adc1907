//! Header metadata extracted without a full pixel decode.

use image::metadata::Orientation as ImageOrientation;
use std::time::Duration;

/// EXIF orientation, named by the transform needed to display it upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    /// Rotate 90° clockwise, then flip horizontally (EXIF 5).
    Transpose,
    Rotate90,
    /// Rotate 270° clockwise, then flip horizontally (EXIF 7).
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Whether displaying upright exchanges width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    pub(crate) fn to_image(self) -> ImageOrientation {
        match self {
            Self::Normal => ImageOrientation::NoTransforms,
            Self::FlipHorizontal => ImageOrientation::FlipHorizontal,
            Self::Rotate180 => ImageOrientation::Rotate180,
            Self::FlipVertical => ImageOrientation::FlipVertical,
            Self::Transpose => ImageOrientation::Rotate90FlipH,
            Self::Rotate90 => ImageOrientation::Rotate90,
            Self::Transverse => ImageOrientation::Rotate270FlipH,
            Self::Rotate270 => ImageOrientation::Rotate270,
        }
    }
}

impl From<ImageOrientation> for Orientation {
    fn from(value: ImageOrientation) -> Self {
        match value {
            ImageOrientation::NoTransforms => Self::Normal,
            ImageOrientation::FlipHorizontal => Self::FlipHorizontal,
            ImageOrientation::Rotate180 => Self::Rotate180,
            ImageOrientation::FlipVertical => Self::FlipVertical,
            ImageOrientation::Rotate90FlipH => Self::Transpose,
            ImageOrientation::Rotate90 => Self::Rotate90,
            ImageOrientation::Rotate270FlipH => Self::Transverse,
            ImageOrientation::Rotate270 => Self::Rotate270,
        }
    }
}

/// Stored dimensions, orientation and animation length of an encoded image.
///
/// `width`/`height` are the stored (pre-orientation) frame size. A zero
/// `duration` means a static image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub duration: Duration,
    pub frame_count: u32,
}

impl ImageHeader {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            orientation: Orientation::Normal,
            duration: Duration::ZERO,
            frame_count: 1,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_animation(mut self, frame_count: u32, duration: Duration) -> Self {
        self.frame_count = frame_count;
        self.duration = duration;
        self
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Dimensions as displayed: swapped for 90°/270° orientations when
    /// `normalize` is set, stored dimensions otherwise.
    pub fn display_dimensions(&self, normalize: bool) -> (u32, u32) {
        if normalize && self.orientation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}
