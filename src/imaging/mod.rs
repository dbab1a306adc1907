//! Image processing: format detection, geometry, buffers, codec engine.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Detect** | `image::guess_format` (magic bytes only) |
//! | **Header** | `image` per-format decoders; frame timing from a container walk |
//! | **Resize + crop** | `fast_image_resize` Lanczos3 |
//! | **Encode** | `image` JPEG / PNG / GIF encoders, `webp` (libwebp) for lossy WebP |
//!
//! The module is split into:
//! - **Format / Header**: container recognition and header metadata
//! - **Animation**: frame count and delays without decoding pixels
//! - **Calculations**: pure geometry resolution (unit testable)
//! - **Parameters**: data structures describing a transform
//! - **Encode options**: per-extension encoder settings table
//! - **Buffers**: bounded scratch frame and output buffer
//! - **Backend**: [`Codec`] / [`Decoder`] traits + [`RustCodec`]

mod animation;
pub mod backend;
pub mod buffers;
mod calculations;
pub mod encode_options;
pub mod format;
pub mod header;
mod params;
pub mod rust_backend;

pub use backend::{Codec, CodecError, Decoder};
pub use buffers::{OutputBuffer, ScratchBuffer, TransformBuffers};
pub use calculations::{
    DEFAULT_MAX_FRAMES, GeometryError, calculate_center_crop, check_frames, check_limit, resolve,
    resolve_dimensions,
};
pub use encode_options::EncodeOptionsTable;
pub use format::ContainerFormat;
pub use header::{ImageHeader, Orientation};
pub use params::{CropRect, EncodeKey, EncodeOptions, ResizePolicy, TargetGeometry, TransformSpec};
pub use rust_backend::RustCodec;
