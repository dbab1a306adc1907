//! Pure Rust codec engine.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Detect | magic bytes via `image::guess_format` |
//! | Header | per-format `image` decoders (`dimensions`, `orientation`) |
//! | Frame count / duration | container walk (`imaging::animation`), no pixel decode |
//! | Decode | `image::ImageReader` / `AnimationDecoder` with `Limits` capped at the max dimension |
//! | Orientation | `DynamicImage::apply_orientation` |
//! | Resize + crop | `fast_image_resize` Lanczos3 into the scratch buffer |
//! | Encode → JPEG / PNG / GIF | `image::codecs::*` encoders writing into the output buffer |
//! | Encode → WebP | `webp::Encoder` (libwebp, lossy at `webp_quality`) |
//!
//! Animations are streamed: one decoded frame at a time is resampled and
//! handed to the GIF encoder, so memory does not depend on the frame count.

use super::animation;
use super::backend::{Codec, CodecError, Decoder};
use super::buffers::{OutputBuffer, ScratchBuffer, TransformBuffers};
use super::calculations::{DEFAULT_MAX_FRAMES, check_frames, check_limit};
use super::format::ContainerFormat;
use super::header::{ImageHeader, Orientation};
use super::params::{EncodeKey, EncodeOptions, TargetGeometry, TransformSpec};
use fast_image_resize as fr;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngDecoder, PngEncoder};
use image::codecs::webp::WebPDecoder;
use image::{
    AnimationDecoder, DynamicImage, ExtendedColorType, Frame, Frames, ImageDecoder, ImageEncoder,
    ImageError, ImageReader, ImageResult, Limits, RgbaImage,
};
use std::io::{Cursor, Write};
use std::ops::RangeInclusive;

const DEFAULT_JPEG_QUALITY: i32 = 75;
const DEFAULT_PNG_COMPRESSION: i32 = 6;
const DEFAULT_WEBP_QUALITY: i32 = 75;
const DEFAULT_GIF_SPEED: i32 = 10;

/// Codec engine backed by the `image`, `webp` and `fast_image_resize` crates.
///
/// `max_dimension` bounds the frames it is willing to decode; headers of
/// larger images are still read, but their pixels are never decoded.
/// `max_frames` bounds how many frames of an animation are re-encoded.
#[derive(Debug, Clone, Copy)]
pub struct RustCodec {
    max_dimension: u32,
    max_frames: u32,
}

impl RustCodec {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }

    pub fn with_max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = max_frames;
        self
    }
}

impl Codec for RustCodec {
    fn detect<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn Decoder + 'a>, CodecError> {
        let format = ContainerFormat::detect(bytes).ok_or(CodecError::UnrecognizedFormat)?;
        log::trace!("acquired {format} decoder for {} bytes", bytes.len());
        Ok(Box::new(RustDecoder {
            bytes,
            format,
            max_dimension: self.max_dimension,
            max_frames: self.max_frames,
            header: None,
        }))
    }
}

/// Decode context over a borrowed input buffer.
pub struct RustDecoder<'a> {
    bytes: &'a [u8],
    format: ContainerFormat,
    max_dimension: u32,
    max_frames: u32,
    header: Option<ImageHeader>,
}

impl Drop for RustDecoder<'_> {
    fn drop(&mut self) {
        log::trace!("released {} decoder", self.format);
    }
}

impl Decoder for RustDecoder<'_> {
    fn format(&self) -> ContainerFormat {
        self.format
    }

    fn header(&mut self) -> Result<ImageHeader, CodecError> {
        if let Some(header) = self.header {
            return Ok(header);
        }
        let header = read_header(self.bytes, self.format).map_err(|e| {
            CodecError::MalformedHeader {
                format: self.format,
                reason: e.to_string(),
            }
        })?;
        self.header = Some(header);
        Ok(header)
    }

    fn transform(
        &mut self,
        spec: &TransformSpec,
        buffers: &mut TransformBuffers,
    ) -> Result<(), CodecError> {
        let header = self.header()?;
        let max = self.max_dimension.min(buffers.scratch.max_dimension());
        check_limit(header.width, header.height, max)?;
        buffers.output.reset();

        let result = if header.is_animated() && spec.target == ContainerFormat::Gif {
            self.transform_animation(&header, spec, max, buffers)
        } else {
            self.transform_still(&header, spec, max, buffers)
        };

        match result {
            Err(_) if buffers.output.overflowed() => Err(CodecError::OutputBufferTooSmall {
                limit: buffers.output.limit().unwrap_or(usize::MAX),
            }),
            Ok(()) if buffers.output.overflowed() => Err(CodecError::OutputBufferTooSmall {
                limit: buffers.output.limit().unwrap_or(usize::MAX),
            }),
            other => other,
        }
    }
}

impl<'a> RustDecoder<'a> {
    fn transform_still(
        &self,
        header: &ImageHeader,
        spec: &TransformSpec,
        max_dimension: u32,
        buffers: &mut TransformBuffers,
    ) -> Result<(), CodecError> {
        let mut image = self.decode_first_frame(max_dimension)?;
        if spec.normalize_orientation {
            image.apply_orientation(header.orientation.to_image());
        }

        let geometry = &spec.geometry;
        let frame = resample(image.into_rgba8(), geometry, &mut buffers.scratch)?;
        encode_still(frame, geometry, spec, &mut buffers.output)
    }

    /// Frame-by-frame resize of an animated source into an animated GIF.
    ///
    /// Only the frame being resampled is decoded; the encoder writes each
    /// one to the output buffer before the next is pulled.
    fn transform_animation(
        &self,
        header: &ImageHeader,
        spec: &TransformSpec,
        max_dimension: u32,
        buffers: &mut TransformBuffers,
    ) -> Result<(), CodecError> {
        let geometry = &spec.geometry;
        check_frames(header.frame_count, self.max_frames)?;
        log::debug!(
            "streaming {} frames to {}x{}",
            header.frame_count,
            geometry.width,
            geometry.height
        );

        let frames = self
            .frames(decode_limits(max_dimension))
            .map_err(decode_error)?;
        let speed = option_in(&spec.options, EncodeKey::GifSpeed, 1..=30, DEFAULT_GIF_SPEED);
        let mut encoder = GifEncoder::new_with_speed(&mut buffers.output, speed);
        encoder.set_repeat(Repeat::Infinite).map_err(encode_error)?;

        let mut count = 0u32;
        for frame in frames {
            count += 1;
            check_frames(count, self.max_frames)?;
            let frame = frame.map_err(decode_error)?;
            let delay = frame.delay();
            let mut image = DynamicImage::ImageRgba8(frame.into_buffer());
            if spec.normalize_orientation {
                image.apply_orientation(header.orientation.to_image());
            }
            let pixels = resample(image.into_rgba8(), geometry, &mut buffers.scratch)?;
            let buffer = RgbaImage::from_raw(geometry.width, geometry.height, pixels.to_vec())
                .ok_or_else(|| CodecError::Resize("resized frame has the wrong length".into()))?;
            encoder
                .encode_frame(Frame::from_parts(buffer, 0, 0, delay))
                .map_err(encode_error)?;
        }
        Ok(())
    }

    fn decode_first_frame(&self, max_dimension: u32) -> Result<DynamicImage, CodecError> {
        let mut reader = ImageReader::with_format(Cursor::new(self.bytes), self.format.image_format());
        reader.limits(decode_limits(max_dimension));
        reader.decode().map_err(decode_error)
    }

    /// Lazy frame iterator over the input; nothing is decoded until pulled.
    fn frames(&self, limits: Limits) -> ImageResult<Frames<'a>> {
        let cursor = Cursor::new(self.bytes);
        match self.format {
            ContainerFormat::Gif => {
                let mut decoder = GifDecoder::new(cursor)?;
                decoder.set_limits(limits)?;
                Ok(decoder.into_frames())
            }
            ContainerFormat::Png => {
                let mut decoder = PngDecoder::new(cursor)?;
                decoder.set_limits(limits)?;
                Ok(decoder.apng()?.into_frames())
            }
            ContainerFormat::WebP => {
                let mut decoder = WebPDecoder::new(cursor)?;
                decoder.set_limits(limits)?;
                Ok(decoder.into_frames())
            }
            ContainerFormat::Jpeg => {
                let mut reader = ImageReader::with_format(cursor, image::ImageFormat::Jpeg);
                reader.limits(limits);
                let frame = Frame::new(reader.decode()?.into_rgba8());
                Ok(Frames::new(Box::new(std::iter::once(Ok(frame)))))
            }
        }
    }
}

fn decode_limits(max_dimension: u32) -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    limits
}

fn read_header(bytes: &[u8], format: ContainerFormat) -> ImageResult<ImageHeader> {
    let cursor = Cursor::new(bytes);
    let header = match format {
        ContainerFormat::Jpeg => return still_header(&mut JpegDecoder::new(cursor)?),
        ContainerFormat::Png => {
            let mut decoder = PngDecoder::new(cursor)?;
            let header = still_header(&mut decoder)?;
            if !decoder.is_apng()? {
                return Ok(header);
            }
            header
        }
        ContainerFormat::Gif => still_header(&mut GifDecoder::new(cursor)?)?,
        ContainerFormat::WebP => {
            let mut decoder = WebPDecoder::new(cursor)?;
            let header = still_header(&mut decoder)?;
            if !decoder.has_animation() {
                return Ok(header);
            }
            header
        }
    };

    let timing = animation::scan(bytes, format)
        .map_err(|e| ImageError::IoError(std::io::Error::other(e)))?;
    if timing.frames > 1 {
        Ok(header.with_animation(timing.frames, timing.duration))
    } else {
        Ok(header)
    }
}

fn still_header(decoder: &mut impl ImageDecoder) -> ImageResult<ImageHeader> {
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageError::IoError(std::io::Error::other(
            "zero-sized image",
        )));
    }
    let orientation = decoder
        .orientation()
        .map(Orientation::from)
        .unwrap_or_default();
    Ok(ImageHeader::new(width, height).with_orientation(orientation))
}

/// Resample the crop region of `rgba` into a scratch frame of the target size.
///
/// Takes the decoded frame by value so its pixels move into the resizer
/// without a copy.
fn resample<'s>(
    rgba: RgbaImage,
    geometry: &TargetGeometry,
    scratch: &'s mut ScratchBuffer,
) -> Result<&'s mut [u8], CodecError> {
    let (src_w, src_h) = rgba.dimensions();
    let src = fr::images::Image::from_vec_u8(src_w, src_h, rgba.into_raw(), fr::PixelType::U8x4)
        .map_err(|e| CodecError::Resize(format!("source buffer: {e}")))?;

    let frame = scratch.frame(geometry.width, geometry.height)?;
    {
        let mut dst = fr::images::Image::from_slice_u8(
            geometry.width,
            geometry.height,
            &mut *frame,
            fr::PixelType::U8x4,
        )
        .map_err(|e| CodecError::Resize(format!("scratch buffer: {e}")))?;

        let crop = geometry.crop;
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3))
            .crop(crop.left, crop.top, crop.width, crop.height);
        fr::Resizer::new()
            .resize(&src, &mut dst, &options)
            .map_err(|e| CodecError::Resize(e.to_string()))?;
    }
    Ok(frame)
}

fn encode_still(
    frame: &mut [u8],
    geometry: &TargetGeometry,
    spec: &TransformSpec,
    output: &mut OutputBuffer,
) -> Result<(), CodecError> {
    let (width, height) = (geometry.width, geometry.height);
    let options = &spec.options;

    match spec.target {
        ContainerFormat::Jpeg => {
            let quality = option_in(options, EncodeKey::JpegQuality, 1..=100, DEFAULT_JPEG_QUALITY);
            let len = rgba_to_rgb_in_place(frame);
            JpegEncoder::new_with_quality(output, quality as u8)
                .write_image(&frame[..len], width, height, ExtendedColorType::Rgb8)
                .map_err(encode_error)
        }
        ContainerFormat::Png => {
            let level = option_in(options, EncodeKey::PngCompression, 0..=9, DEFAULT_PNG_COMPRESSION);
            PngEncoder::new_with_quality(output, png_compression(level), PngFilter::Adaptive)
                .write_image(frame, width, height, ExtendedColorType::Rgba8)
                .map_err(encode_error)
        }
        ContainerFormat::WebP => {
            let quality = option_in(options, EncodeKey::WebpQuality, 1..=100, DEFAULT_WEBP_QUALITY);
            let encoded = webp::Encoder::from_rgba(frame, width, height).encode(quality as f32);
            output
                .write_all(&encoded)
                .map_err(|e| CodecError::Encode(e.to_string()))
        }
        ContainerFormat::Gif => {
            let speed = option_in(options, EncodeKey::GifSpeed, 1..=30, DEFAULT_GIF_SPEED);
            GifEncoder::new_with_speed(output, speed)
                .encode(frame, width, height, ExtendedColorType::Rgba8)
                .map_err(encode_error)
        }
    }
}

/// Look up an option, clamped into its valid range.
fn option_in(options: &EncodeOptions, key: EncodeKey, range: RangeInclusive<i32>, default: i32) -> i32 {
    options
        .get(key)
        .map_or(default, |v| v.clamp(*range.start(), *range.end()))
}

fn png_compression(level: i32) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Pack RGBA pixels to RGB in place, returning the RGB length.
fn rgba_to_rgb_in_place(buf: &mut [u8]) -> usize {
    let pixels = buf.len() / 4;
    for i in 0..pixels {
        buf.copy_within(i * 4..i * 4 + 3, i * 3);
    }
    pixels * 3
}

fn decode_error(e: ImageError) -> CodecError {
    CodecError::Decode(e.to_string())
}

fn encode_error(e: ImageError) -> CodecError {
    CodecError::Encode(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::calculations::{GeometryError, resolve};
    use crate::imaging::params::ResizePolicy;
    use crate::test_helpers::{
        decode_dimensions, encode_animated_gif, encode_animated_webp, encode_apng,
        encode_test_image, gradient_rgb, solid_rgb, tiny_frame_gif,
    };

    fn spec_for(header: &ImageHeader, w: u32, h: u32, target: ContainerFormat) -> TransformSpec {
        TransformSpec {
            geometry: resolve(header, w, h, ResizePolicy::Fit, true).unwrap(),
            target,
            options: EncodeOptions::new(),
            normalize_orientation: true,
        }
    }

    fn transform(
        bytes: &[u8],
        w: u32,
        h: u32,
        target: ContainerFormat,
        buffers: &mut TransformBuffers,
    ) -> Result<ImageHeader, CodecError> {
        let codec = RustCodec::new(buffers.scratch.max_dimension());
        transform_with(&codec, bytes, w, h, target, EncodeOptions::new(), buffers)
    }

    fn transform_with(
        codec: &RustCodec,
        bytes: &[u8],
        w: u32,
        h: u32,
        target: ContainerFormat,
        options: EncodeOptions,
        buffers: &mut TransformBuffers,
    ) -> Result<ImageHeader, CodecError> {
        let mut decoder = codec.detect(bytes)?;
        let header = decoder.header()?;
        let spec = TransformSpec {
            options,
            ..spec_for(&header, w, h, target)
        };
        decoder.transform(&spec, buffers)?;
        Ok(header)
    }

    fn output_header(buffers: &TransformBuffers) -> ImageHeader {
        RustCodec::new(8192)
            .detect(buffers.output.as_bytes())
            .unwrap()
            .header()
            .unwrap()
    }

    #[test]
    fn garbage_is_unrecognized() {
        let codec = RustCodec::new(8192);
        assert!(matches!(
            codec.detect(b"\x00\x01\x02 not an image at all"),
            Err(CodecError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn corrupt_png_detects_but_header_is_malformed() {
        let mut bytes = encode_test_image(&solid_rgb(16, 16), ContainerFormat::Png);
        bytes.truncate(12);
        bytes.extend_from_slice(b"garbage garbage garbage");

        let codec = RustCodec::new(8192);
        let mut decoder = codec.detect(&bytes).unwrap();
        assert_eq!(decoder.format(), ContainerFormat::Png);
        assert!(matches!(
            decoder.header(),
            Err(CodecError::MalformedHeader {
                format: ContainerFormat::Png,
                ..
            })
        ));
    }

    #[test]
    fn corrupt_jpeg_header_is_malformed() {
        let bytes = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00 then nonsense".to_vec();
        let codec = RustCodec::new(8192);
        let mut decoder = codec.detect(&bytes).unwrap();
        assert!(matches!(
            decoder.header(),
            Err(CodecError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn header_reports_dimensions_for_each_format() {
        let codec = RustCodec::new(8192);
        for format in ContainerFormat::ALL {
            let bytes = encode_test_image(&gradient_rgb(40, 30), format);
            let mut decoder = codec.detect(&bytes).unwrap();
            let header = decoder.header().unwrap();
            assert_eq!((header.width, header.height), (40, 30), "{format}");
            assert_eq!(header.orientation, Orientation::Normal);
            assert!(!header.is_animated());
            assert_eq!(decoder.description(), format.description());
        }
    }

    #[test]
    fn animated_gif_header_has_duration() {
        let bytes = encode_animated_gif(20, 10, 3, 100);
        let codec = RustCodec::new(8192);
        let header = codec.detect(&bytes).unwrap().header().unwrap();
        assert_eq!(header.frame_count, 3);
        assert!((header.duration_secs() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn apng_header_has_frames_and_duration() {
        let bytes = encode_apng(16, 8, 4, 40);
        let header = RustCodec::new(8192).detect(&bytes).unwrap().header().unwrap();
        assert_eq!((header.width, header.height), (16, 8));
        assert_eq!(header.frame_count, 4);
        assert!((header.duration_secs() - 0.16).abs() < 1e-6);
    }

    #[test]
    fn animated_webp_header_has_frames_and_duration() {
        let bytes = encode_animated_webp(16, 8, 3, 70);
        let header = RustCodec::new(8192).detect(&bytes).unwrap().header().unwrap();
        assert_eq!((header.width, header.height), (16, 8));
        assert_eq!(header.frame_count, 3);
        assert!((header.duration_secs() - 0.21).abs() < 1e-6);
    }

    #[test]
    fn many_frames_on_a_large_screen_are_counted_without_decoding() {
        let bytes = tiny_frame_gif(4096, 4096, 48);
        let header = RustCodec::new(8192).detect(&bytes).unwrap().header().unwrap();
        assert_eq!((header.width, header.height), (4096, 4096));
        assert_eq!(header.frame_count, 48);
    }

    #[test]
    fn jpeg_downscale_fit() {
        let bytes = encode_test_image(&gradient_rgb(400, 300), ContainerFormat::Jpeg);
        let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
        transform(&bytes, 200, 100, ContainerFormat::Jpeg, &mut buffers).unwrap();
        assert_eq!(decode_dimensions(buffers.output.as_bytes()), (200, 100));
    }

    #[test]
    fn png_square_to_tall_crop() {
        let bytes = encode_test_image(&gradient_rgb(500, 500), ContainerFormat::Png);
        let mut buffers = TransformBuffers::new(8192, 4 << 20, false);
        transform(&bytes, 300, 600, ContainerFormat::Png, &mut buffers).unwrap();
        assert_eq!(decode_dimensions(buffers.output.as_bytes()), (300, 600));
    }

    #[test]
    fn transcode_to_every_format() {
        let bytes = encode_test_image(&gradient_rgb(64, 48), ContainerFormat::Png);
        for target in ContainerFormat::ALL {
            let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
            transform(&bytes, 32, 0, target, &mut buffers).unwrap();
            let out = buffers.output.as_bytes();
            assert_eq!(ContainerFormat::detect(out), Some(target));
            assert_eq!(decode_dimensions(out), (32, 24), "{target}");
        }
    }

    #[test]
    fn same_size_round_trip_keeps_dimensions() {
        for format in ContainerFormat::ALL {
            let bytes = encode_test_image(&gradient_rgb(33, 17), format);
            let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
            let header = transform(&bytes, 0, 0, format, &mut buffers).unwrap();
            assert_eq!(
                decode_dimensions(buffers.output.as_bytes()),
                (header.width, header.height),
                "{format}"
            );
        }
    }

    #[test]
    fn small_fixed_output_buffer_is_reported() {
        let bytes = encode_test_image(&gradient_rgb(128, 128), ContainerFormat::Png);
        let mut buffers = TransformBuffers::new(8192, 64, false);
        let err = transform(&bytes, 0, 0, ContainerFormat::Png, &mut buffers).unwrap_err();
        assert!(matches!(err, CodecError::OutputBufferTooSmall { limit: 64 }));
    }

    #[test]
    fn growable_output_buffer_grows() {
        let bytes = encode_test_image(&gradient_rgb(128, 128), ContainerFormat::Png);
        let mut buffers = TransformBuffers::new(8192, 64, true);
        transform(&bytes, 0, 0, ContainerFormat::Png, &mut buffers).unwrap();
        assert!(buffers.output.len() > 64);
    }

    #[test]
    fn source_larger_than_max_dimension_is_refused() {
        let bytes = encode_test_image(&solid_rgb(80, 20), ContainerFormat::Png);
        let mut buffers = TransformBuffers::new(64, 1 << 20, false);
        let err = transform(&bytes, 10, 10, ContainerFormat::Png, &mut buffers).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Limit(GeometryError::ExceedsLimit { width: 80, .. })
        ));
        assert_eq!(buffers.scratch.allocated(), 0);
    }

    #[test]
    fn animated_gif_stays_animated() {
        let bytes = encode_animated_gif(40, 20, 4, 50);
        let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
        transform(&bytes, 20, 10, ContainerFormat::Gif, &mut buffers).unwrap();

        let out = output_header(&buffers);
        assert_eq!((out.width, out.height), (20, 10));
        assert_eq!(out.frame_count, 4);
    }

    #[test]
    fn apng_and_animated_webp_become_animated_gifs() {
        for (name, bytes) in [
            ("apng", encode_apng(32, 16, 4, 40)),
            ("webp", encode_animated_webp(32, 16, 3, 70)),
        ] {
            let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
            let source = transform(&bytes, 16, 8, ContainerFormat::Gif, &mut buffers).unwrap();
            let out = output_header(&buffers);
            assert_eq!(ContainerFormat::detect(buffers.output.as_bytes()), Some(ContainerFormat::Gif));
            assert_eq!((out.width, out.height), (16, 8), "{name}");
            assert_eq!(out.frame_count, source.frame_count, "{name}");
            assert!((out.duration_secs() - source.duration_secs()).abs() < 0.011, "{name}");
        }
    }

    #[test]
    fn animation_is_streamed_through_one_scratch_frame() {
        let bytes = tiny_frame_gif(64, 64, 6);
        let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
        transform(&bytes, 16, 16, ContainerFormat::Gif, &mut buffers).unwrap();

        assert_eq!(output_header(&buffers).frame_count, 6);
        assert_eq!(buffers.scratch.allocated(), 16 * 16 * 4);
    }

    #[test]
    fn frame_cap_stops_animated_transform() {
        let bytes = tiny_frame_gif(64, 64, 6);
        let codec = RustCodec::new(8192).with_max_frames(4);
        let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
        let err = transform_with(
            &codec,
            &bytes,
            16,
            16,
            ContainerFormat::Gif,
            EncodeOptions::new(),
            &mut buffers,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CodecError::Limit(GeometryError::TooManyFrames { frames: 6, max: 4 })
        ));
        assert_eq!(buffers.scratch.allocated(), 0);

        // The cap only applies when the animation is kept.
        transform_with(
            &codec,
            &bytes,
            16,
            16,
            ContainerFormat::Png,
            EncodeOptions::new(),
            &mut buffers,
        )
        .unwrap();
    }

    #[test]
    fn webp_quality_selects_lossy_size() {
        let bytes = encode_test_image(&gradient_rgb(128, 96), ContainerFormat::Png);
        let codec = RustCodec::new(8192);
        let encode = |quality| {
            let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
            let options = EncodeOptions::new().with(EncodeKey::WebpQuality, quality);
            transform_with(&codec, &bytes, 0, 0, ContainerFormat::WebP, options, &mut buffers)
                .unwrap();
            buffers.output.into_bytes()
        };

        let low = encode(10);
        let high = encode(95);
        // Lossy bitstream, not VP8L.
        assert_eq!(&low[12..16], b"VP8 ");
        assert!(low.len() < high.len(), "{} >= {}", low.len(), high.len());
        assert_eq!(decode_dimensions(&low), (128, 96));
    }

    #[test]
    fn animated_gif_to_png_uses_first_frame() {
        let bytes = encode_animated_gif(40, 20, 4, 50);
        let mut buffers = TransformBuffers::new(8192, 1 << 20, false);
        transform(&bytes, 20, 10, ContainerFormat::Png, &mut buffers).unwrap();
        assert_eq!(decode_dimensions(buffers.output.as_bytes()), (20, 10));
    }

    #[test]
    fn rgba_packs_to_rgb() {
        let mut buf = vec![1, 2, 3, 255, 4, 5, 6, 255];
        let len = rgba_to_rgb_in_place(&mut buf);
        assert_eq!(&buf[..len], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn options_are_clamped_to_range() {
        let opts = EncodeOptions::new().with(EncodeKey::JpegQuality, 250);
        assert_eq!(option_in(&opts, EncodeKey::JpegQuality, 1..=100, 75), 100);
        assert_eq!(option_in(&opts, EncodeKey::GifSpeed, 1..=30, 10), 10);
    }
}
