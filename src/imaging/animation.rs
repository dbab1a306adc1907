//! Frame count and timing read from container structure.
//!
//! Each parser walks blocks or chunks and reads only the per-frame control
//! fields; no LZW, zlib or VP8 data is touched, so the cost is linear in the
//! file size and independent of the canvas size.
//!
//! | Format | Frame marker | Delay field |
//! |---|---|---|
//! | GIF | image descriptor (`0x2C`) | graphic control extension, centiseconds |
//! | APNG | `fcTL` chunk | `delay_num / delay_den` seconds (den 0 = 100) |
//! | WebP | `ANMF` chunk | 24-bit milliseconds |
//!
//! A truncated tail ends the walk: frames that were fully described before
//! it still count.

use super::format::ContainerFormat;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("unknown GIF block 0x{0:02x}")]
    UnknownGifBlock(u8),
    #[error("{0} frame control field is too short")]
    ShortFrameControl(ContainerFormat),
}

/// Frames and total display time of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTiming {
    pub frames: u32,
    pub duration: Duration,
}

impl FrameTiming {
    fn push(&mut self, delay: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.duration += delay;
    }
}

/// Walk the container. JPEG and still containers report zero frames.
pub fn scan(bytes: &[u8], format: ContainerFormat) -> Result<FrameTiming, ScanError> {
    match format {
        ContainerFormat::Gif => scan_gif(bytes),
        ContainerFormat::Png => scan_apng(bytes),
        ContainerFormat::WebP => scan_webp(bytes),
        ContainerFormat::Jpeg => Ok(FrameTiming::default()),
    }
}

// ---------------------------------------------------------------------------
// GIF: header (6) + logical screen descriptor (7) + optional global color
// table, then blocks until the trailer (0x3B).
// ---------------------------------------------------------------------------

fn scan_gif(data: &[u8]) -> Result<FrameTiming, ScanError> {
    let mut timing = FrameTiming::default();
    let Some(&packed) = data.get(10) else {
        return Ok(timing);
    };
    let mut pos = 13 + color_table_len(packed);
    let mut pending_delay = 0u16;

    while let Some(&introducer) = data.get(pos) {
        match introducer {
            0x21 => {
                let Some(&label) = data.get(pos + 1) else { break };
                // Graphic control extension: 04 <packed> <delay lo> <delay hi> ...
                if label == 0xF9
                    && let Some(block) = data.get(pos + 2..pos + 7)
                    && block[0] >= 4
                {
                    pending_delay = u16::from_le_bytes([block[2], block[3]]);
                }
                let Some(next) = skip_sub_blocks(data, pos + 2) else { break };
                pos = next;
            }
            0x2C => {
                // Descriptor: 2C x(2) y(2) w(2) h(2) packed, then the LZW
                // minimum code size byte and the data sub-blocks.
                let Some(&packed) = data.get(pos + 9) else { break };
                let table_end = pos + 10 + color_table_len(packed);
                let Some(next) = skip_sub_blocks(data, table_end + 1) else { break };
                timing.push(Duration::from_millis(u64::from(pending_delay) * 10));
                pending_delay = 0;
                pos = next;
            }
            0x3B => break,
            other => return Err(ScanError::UnknownGifBlock(other)),
        }
    }
    Ok(timing)
}

fn color_table_len(packed: u8) -> usize {
    if packed & 0x80 == 0 {
        0
    } else {
        3 << ((packed & 0x07) + 1)
    }
}

/// Position just past the zero-length terminator, or `None` if it is missing.
fn skip_sub_blocks(data: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = usize::from(*data.get(pos)?);
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += len;
    }
}

// ---------------------------------------------------------------------------
// APNG: signature (8), then length(4) type(4) data crc(4) chunks. Every
// animation frame, including a default image that takes part, has one fcTL.
// ---------------------------------------------------------------------------

fn scan_apng(data: &[u8]) -> Result<FrameTiming, ScanError> {
    let mut timing = FrameTiming::default();
    for (kind, body) in chunks(data, 8, ChunkOrder::BigEndian) {
        match kind {
            b"fcTL" => {
                // seq(4) w(4) h(4) x(4) y(4) delay_num(2) delay_den(2) ...
                let fields = body
                    .get(20..24)
                    .ok_or(ScanError::ShortFrameControl(ContainerFormat::Png))?;
                let num = u64::from(u16::from_be_bytes([fields[0], fields[1]]));
                let den = match u16::from_be_bytes([fields[2], fields[3]]) {
                    0 => 100,
                    d => u64::from(d),
                };
                timing.push(Duration::from_nanos(num * 1_000_000_000 / den));
            }
            b"IEND" => break,
            _ => {}
        }
    }
    Ok(timing)
}

// ---------------------------------------------------------------------------
// WebP: "RIFF" size "WEBP" (12), then fourcc(4) size(4 LE) payload chunks,
// each padded to an even length. Only ANMF chunks are frames.
// ---------------------------------------------------------------------------

fn scan_webp(data: &[u8]) -> Result<FrameTiming, ScanError> {
    let mut timing = FrameTiming::default();
    for (kind, body) in chunks(data, 12, ChunkOrder::Riff) {
        if kind == b"ANMF" {
            // x(3) y(3) w-1(3) h-1(3) duration(3) flags(1) frame data
            let field = body
                .get(12..15)
                .ok_or(ScanError::ShortFrameControl(ContainerFormat::WebP))?;
            let millis = u32::from_le_bytes([field[0], field[1], field[2], 0]);
            timing.push(Duration::from_millis(u64::from(millis)));
        }
    }
    Ok(timing)
}

#[derive(Clone, Copy)]
enum ChunkOrder {
    /// PNG: big-endian length before the type, CRC after the data.
    BigEndian,
    /// RIFF: type before a little-endian length, data padded to even.
    Riff,
}

/// Iterate `(type, data)` chunks starting at `start`; stops at the first
/// chunk that does not fit.
fn chunks(data: &[u8], start: usize, order: ChunkOrder) -> impl Iterator<Item = (&[u8], &[u8])> {
    let mut pos = start;
    std::iter::from_fn(move || {
        let head = data.get(pos..pos + 8)?;
        let (kind, len) = match order {
            ChunkOrder::BigEndian => (
                &head[4..8],
                u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize,
            ),
            ChunkOrder::Riff => (
                &head[0..4],
                u32::from_le_bytes([head[4], head[5], head[6], head[7]]) as usize,
            ),
        };
        let body_start = pos + 8;
        let body = data.get(body_start..body_start.checked_add(len)?)?;
        pos = match order {
            ChunkOrder::BigEndian => body_start + len + 4,
            ChunkOrder::Riff => body_start + len + (len & 1),
        };
        Some((kind, body))
    })
}
