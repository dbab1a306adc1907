//! Geometry resolution: pure dimension math, no I/O and no pixels.

use super::header::ImageHeader;
use super::params::{CropRect, ResizePolicy, TargetGeometry};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("source image has zero width or height")]
    EmptySource,
    #[error("{width}x{height} exceeds the {max}px intermediate buffer limit")]
    ExceedsLimit { width: u32, height: u32, max: u32 },
    #[error("{frames} animation frames exceed the limit of {max}")]
    TooManyFrames { frames: u32, max: u32 },
}

/// Stock cap on frames decoded from one animated source.
pub const DEFAULT_MAX_FRAMES: u32 = 1000;

/// Fill in requested dimensions that were left at 0.
///
/// Both zero → the source size. One zero → derived from the source aspect
/// ratio so the other side is honored without distortion.
///
/// # Examples
/// ```
/// # use imgops::imaging::resolve_dimensions;
/// assert_eq!(resolve_dimensions((4000, 3000), (800, 0)), (800, 600));
/// assert_eq!(resolve_dimensions((4000, 3000), (0, 0)), (4000, 3000));
/// ```
pub fn resolve_dimensions(source: (u32, u32), requested: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    match requested {
        (0, 0) => source,
        (0, h) => (scale_side(h, src_w, src_h), h),
        (w, 0) => (w, scale_side(w, src_h, src_w)),
        (w, h) => (w, h),
    }
}

/// `side * numer / denom`, rounded, never below 1.
fn scale_side(side: u32, numer: u32, denom: u32) -> u32 {
    let denom = u64::from(denom.max(1));
    let scaled = (u64::from(side) * u64::from(numer) + denom / 2) / denom;
    scaled.clamp(1, u64::from(u32::MAX)) as u32
}

/// Largest centered region of `source` with the aspect ratio of `target`.
///
/// Resampling this region to `target` is the same as scaling the source to
/// cover the target box and trimming the overflow evenly from both sides.
/// The trimmed side is fractional so the region's aspect ratio is exactly
/// the target's.
pub fn calculate_center_crop(source: (u32, u32), target: (u32, u32)) -> CropRect {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    // Compare src_w/src_h with tgt_w/tgt_h without floating point.
    let src_wider = u64::from(src_w) * u64::from(tgt_h) > u64::from(tgt_w) * u64::from(src_h);

    let (src_w, src_h) = (f64::from(src_w), f64::from(src_h));
    let (tgt_w, tgt_h) = (f64::from(tgt_w), f64::from(tgt_h));
    if src_wider {
        // Height is kept, width is trimmed.
        let width = (src_h * tgt_w / tgt_h).min(src_w);
        CropRect {
            left: (src_w - width) / 2.0,
            top: 0.0,
            width,
            height: src_h,
        }
    } else {
        // Width is kept, height is trimmed.
        let height = (src_w * tgt_h / tgt_w).min(src_h);
        CropRect {
            left: 0.0,
            top: (src_h - height) / 2.0,
            width: src_w,
            height,
        }
    }
}

/// Compute the exact output size and source crop for a request.
///
/// `normalize_orientation` decides whether the geometry is expressed for the
/// upright image (90°/270° orientations swap the source basis).
pub fn resolve(
    header: &ImageHeader,
    requested_width: u32,
    requested_height: u32,
    policy: ResizePolicy,
    normalize_orientation: bool,
) -> Result<TargetGeometry, GeometryError> {
    let source = header.display_dimensions(normalize_orientation);
    if source.0 == 0 || source.1 == 0 {
        return Err(GeometryError::EmptySource);
    }

    let (width, height) = resolve_dimensions(source, (requested_width, requested_height));
    let crop = match policy {
        ResizePolicy::Fit => calculate_center_crop(source, (width, height)),
        ResizePolicy::Stretch => CropRect::full(source.0, source.1),
    };

    Ok(TargetGeometry {
        width,
        height,
        policy,
        crop,
    })
}

/// Reject frames that would not fit in a `max` × `max` intermediate buffer.
pub fn check_limit(width: u32, height: u32, max: u32) -> Result<(), GeometryError> {
    if width > max || height > max {
        return Err(GeometryError::ExceedsLimit { width, height, max });
    }
    Ok(())
}

/// Reject animations with more than `max` frames.
pub fn check_frames(frames: u32, max: u32) -> Result<(), GeometryError> {
    if frames > max {
        return Err(GeometryError::TooManyFrames { frames, max });
    }
    Ok(())
}
