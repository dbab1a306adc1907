//! Shared test utilities: synthetic images encoded in memory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let bytes = encode_test_image(&gradient_rgb(64, 48), ContainerFormat::Png);
//! assert_eq!(decode_dimensions(&bytes), (64, 48));
//! ```

use crate::imaging::ContainerFormat;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{Delay, DynamicImage, ExtendedColorType, Frame, ImageEncoder, Rgb, RgbImage, RgbaImage};

// =========================================================================
// Pixel fixtures
// =========================================================================

pub fn solid_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 140, 200])))
}

pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

// =========================================================================
// Encoding
// =========================================================================

/// Encode `image` in `format` with the `image` crate's encoders.
pub fn encode_test_image(image: &DynamicImage, format: ContainerFormat) -> Vec<u8> {
    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    let mut out = Vec::new();
    match format {
        ContainerFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, 90)
            .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
            .unwrap(),
        ContainerFormat::Png => PngEncoder::new(&mut out)
            .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
            .unwrap(),
        ContainerFormat::WebP => WebPEncoder::new_lossless(&mut out)
            .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
            .unwrap(),
        ContainerFormat::Gif => {
            let rgba = image.to_rgba8();
            GifEncoder::new(&mut out)
                .encode(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                .unwrap();
        }
    }
    out
}

/// An animated GIF of `frames` frames, each shown for `delay_ms`.
pub fn encode_animated_gif(width: u32, height: u32, frames: u32, delay_ms: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        let frames = (0..frames).map(|i| {
            let buffer = animation_frame(width, height, i);
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    out
}

/// A distinct opaque frame for animation fixtures.
fn animation_frame(width: u32, height: u32, index: u32) -> RgbaImage {
    let shade = (index * 60 % 256) as u8;
    RgbaImage::from_fn(width, height, |x, _| {
        image::Rgba([shade, (x % 256) as u8, 255 - shade, 255])
    })
}

/// A GIF with a `screen_w`×`screen_h` logical screen and `frames` 1×1
/// frames of 10 ms each, assembled block by block.
pub fn tiny_frame_gif(screen_w: u16, screen_h: u16, frames: u32) -> Vec<u8> {
    let mut out = b"GIF89a".to_vec();
    out.extend_from_slice(&screen_w.to_le_bytes());
    out.extend_from_slice(&screen_h.to_le_bytes());
    // Two-entry global color table, background 0, no aspect ratio.
    out.extend_from_slice(&[0x80, 0x00, 0x00]);
    out.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
    for i in 0..frames {
        // Graphic control extension, 1 cs delay.
        out.extend_from_slice(&[0x21, 0xF9, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00]);
        let x = (i % u32::from(screen_w)) as u16;
        out.push(0x2C);
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.push(0x00);
        // LZW minimum code size 2; clear, index 1, end of information.
        out.extend_from_slice(&[0x02, 0x02, 0x4C, 0x01, 0x00]);
    }
    out.push(0x3B);
    out
}

/// An APNG of `frames` frames, each shown for `delay_ms`. Every frame is a
/// still PNG from the `image` encoder re-wrapped as `IDAT` or `fdAT`.
pub fn encode_apng(width: u32, height: u32, frames: u32, delay_ms: u16) -> Vec<u8> {
    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
    let mut sequence = 0u32;
    for i in 0..frames {
        let mut still = Vec::new();
        PngEncoder::new(&mut still)
            .write_image(
                animation_frame(width, height, i).as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
            .unwrap();
        let data: Vec<u8> = png_chunks(&still)
            .filter(|(kind, _)| kind == b"IDAT")
            .flat_map(|(_, body)| body.to_vec())
            .collect();

        if i == 0 {
            let (_, ihdr) = png_chunks(&still).next().unwrap();
            write_png_chunk(&mut out, b"IHDR", ihdr);
            let mut actl = frames.to_be_bytes().to_vec();
            actl.extend_from_slice(&0u32.to_be_bytes());
            write_png_chunk(&mut out, b"acTL", &actl);
        }

        let mut fctl = sequence.to_be_bytes().to_vec();
        for field in [width, height, 0, 0] {
            fctl.extend_from_slice(&field.to_be_bytes());
        }
        fctl.extend_from_slice(&delay_ms.to_be_bytes());
        fctl.extend_from_slice(&1000u16.to_be_bytes());
        fctl.extend_from_slice(&[0, 0]);
        write_png_chunk(&mut out, b"fcTL", &fctl);
        sequence += 1;

        if i == 0 {
            write_png_chunk(&mut out, b"IDAT", &data);
        } else {
            let mut fdat = sequence.to_be_bytes().to_vec();
            fdat.extend_from_slice(&data);
            write_png_chunk(&mut out, b"fdAT", &fdat);
            sequence += 1;
        }
    }
    write_png_chunk(&mut out, b"IEND", &[]);
    out
}

fn png_chunks(png: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut pos = 8;
    std::iter::from_fn(move || {
        let len = u32::from_be_bytes(png.get(pos..pos + 4)?.try_into().ok()?) as usize;
        let kind: [u8; 4] = png.get(pos + 4..pos + 8)?.try_into().ok()?;
        let body = png.get(pos + 8..pos + 8 + len)?;
        pos += 12 + len;
        Some((kind, body))
    })
}

fn write_png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32(kind, data).to_be_bytes());
}

fn crc32(kind: &[u8], data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in kind.iter().chain(data) {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { 0xEDB8_8320 ^ (crc >> 1) } else { crc >> 1 };
        }
    }
    crc ^ 0xFFFF_FFFF
}

/// An animated WebP of `frames` lossless frames, each shown for `delay_ms`.
/// The `VP8L` bitstreams come from the `image` encoder and are wrapped in
/// `ANMF` chunks behind a `VP8X` + `ANIM` preamble.
pub fn encode_animated_webp(width: u32, height: u32, frames: u32, delay_ms: u32) -> Vec<u8> {
    let mut body = b"WEBP".to_vec();
    // Animation and alpha flags, then the canvas size minus one.
    let mut vp8x = vec![0x12, 0, 0, 0];
    vp8x.extend_from_slice(&u24(width - 1));
    vp8x.extend_from_slice(&u24(height - 1));
    write_riff_chunk(&mut body, b"VP8X", &vp8x);
    // Transparent background, loop forever.
    write_riff_chunk(&mut body, b"ANIM", &[0, 0, 0, 0, 0, 0]);

    for i in 0..frames {
        let mut still = Vec::new();
        WebPEncoder::new_lossless(&mut still)
            .write_image(
                animation_frame(width, height, i).as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
            .unwrap();
        let bitstream = vp8l_chunk(&still);

        let mut anmf = Vec::new();
        for field in [0, 0, width - 1, height - 1, delay_ms] {
            anmf.extend_from_slice(&u24(field));
        }
        anmf.push(0);
        anmf.extend_from_slice(bitstream);
        write_riff_chunk(&mut body, b"ANMF", &anmf);
    }

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// The whole `VP8L` chunk (header, payload, padding) of a still WebP.
fn vp8l_chunk(webp: &[u8]) -> &[u8] {
    let mut pos = 12;
    loop {
        let len = u32::from_le_bytes(webp[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let end = pos + 8 + len + (len & 1);
        if &webp[pos..pos + 4] == b"VP8L" {
            return &webp[pos..end.min(webp.len())];
        }
        pos = end;
    }
}

fn write_riff_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(kind);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

fn u24(value: u32) -> [u8; 3] {
    let [a, b, c, _] = value.to_le_bytes();
    [a, b, c]
}

/// Decode with the `image` crate and return the frame size.
pub fn decode_dimensions(bytes: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(bytes).unwrap();
    (image.width(), image.height())
}
