//! Codec engine seam.
//!
//! The [`Codec`] trait recognizes a buffer and hands back a [`Decoder`]
//! handle; the handle reads the header and performs the one-shot
//! resize + re-encode. Releasing the handle is dropping it, so every exit
//! path of the caller (early return, `?`, normal completion) frees the decode
//! context without explicit close calls.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec).

use super::buffers::TransformBuffers;
use super::calculations::GeometryError;
use super::format::ContainerFormat;
use super::header::ImageHeader;
use super::params::TransformSpec;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unrecognized image format")]
    UnrecognizedFormat,
    #[error("malformed {format} header: {reason}")]
    MalformedHeader {
        format: ContainerFormat,
        reason: String,
    },
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("resize failed: {0}")]
    Resize(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode limit exceeded: {0}")]
    Limit(#[from] GeometryError),
    #[error("encoded image does not fit the {limit}-byte output buffer")]
    OutputBufferTooSmall { limit: usize },
}

/// Format recognition entry point. Shared across threads.
pub trait Codec: Sync {
    /// Cheap magic-byte check; no pixel decode.
    fn detect<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn Decoder + 'a>, CodecError>;
}

impl<C: Codec + ?Sized> Codec for &C {
    fn detect<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn Decoder + 'a>, CodecError> {
        (**self).detect(bytes)
    }
}

/// A decode context bound to one input buffer. Dropping it releases it.
pub trait Decoder {
    fn format(&self) -> ContainerFormat;

    /// Label for logs and default output type, e.g. `"JPEG"`.
    fn description(&self) -> &'static str {
        self.format().description()
    }

    /// Structural parse of the container header.
    fn header(&mut self) -> Result<ImageHeader, CodecError>;

    /// Resize and re-encode into `buffers.output`. On error the output
    /// buffer contents are unspecified and must not be delivered.
    fn transform(
        &mut self,
        spec: &TransformSpec,
        buffers: &mut TransformBuffers,
    ) -> Result<(), CodecError>;
}
