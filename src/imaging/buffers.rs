//! Transform buffers: a bounded scratch frame and the encoded output.
//!
//! The scratch buffer holds the resampled RGBA frame before it is encoded.
//! Its ceiling is fixed at construction from the maximum intermediate
//! dimension, never from the source header, so a hostile header cannot push
//! memory past `max_dimension² × 4` bytes. Memory is committed lazily up to
//! that ceiling and kept for the next frame.
//!
//! The output buffer receives encoder bytes. With a fixed ceiling, a write
//! past the end marks the buffer as overflowed and fails; nothing is ever
//! truncated. A growable buffer just keeps growing.
//!
//! Both are owned by one invocation at a time. A caller that runs many
//! transforms can keep a [`TransformBuffers`] around to amortize allocation.

use super::calculations::{GeometryError, check_limit};
use std::io;

/// RGBA8.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
    max_dimension: u32,
}

impl ScratchBuffer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            buf: Vec::new(),
            max_dimension,
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Bytes currently committed.
    pub fn allocated(&self) -> usize {
        self.buf.len()
    }

    /// A `width × height` RGBA frame. Fails before allocating if either side
    /// exceeds the maximum dimension.
    pub fn frame(&mut self, width: u32, height: u32) -> Result<&mut [u8], GeometryError> {
        check_limit(width, height, self.max_dimension)?;
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        if self.buf.len() < len {
            log::debug!(
                "growing scratch buffer {} -> {} bytes",
                self.buf.len(),
                len
            );
            self.buf.resize(len, 0);
        }
        Ok(&mut self.buf[..len])
    }
}

#[derive(Debug)]
pub struct OutputBuffer {
    buf: Vec<u8>,
    /// `None` for a growable buffer.
    limit: Option<usize>,
    overflowed: bool,
}

impl OutputBuffer {
    /// Pre-sized buffer that refuses to grow past `capacity`.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            limit: Some(capacity),
            overflowed: false,
        }
    }

    /// Pre-sized buffer that grows as needed.
    pub fn growable(initial: usize) -> Self {
        Self {
            buf: Vec::with_capacity(initial),
            limit: None,
            overflowed: false,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether a write was refused since the last [`reset`](Self::reset).
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop contents, keep the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl io::Write for OutputBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.limit
            && self.buf.len() + data.len() > limit
        {
            self.overflowed = true;
            return Err(io::Error::other(format!(
                "output buffer full ({limit} bytes)"
            )));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Scratch and output buffers for one invocation.
#[derive(Debug)]
pub struct TransformBuffers {
    pub scratch: ScratchBuffer,
    pub output: OutputBuffer,
}

impl TransformBuffers {
    /// `grow_output` chooses between a growable and a fixed output buffer.
    pub fn new(max_dimension: u32, output_bytes: usize, grow_output: bool) -> Self {
        let output = if grow_output {
            OutputBuffer::growable(output_bytes)
        } else {
            OutputBuffer::fixed(output_bytes)
        };
        Self {
            scratch: ScratchBuffer::new(max_dimension),
            output,
        }
    }
}
