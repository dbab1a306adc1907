//! # imgops
//!
//! Resize, crop and re-encode a single image from a local file or a URL.
//!
//! # Architecture: One Linear Pipeline
//!
//! ```text
//! acquire  path | URL     →  encoded bytes
//! detect   magic bytes    →  decoder handle (JPEG, PNG, GIF, WebP)
//! header   container      →  width, height, orientation, duration
//! resolve  request        →  exact target size + source crop rectangle
//! transform                →  resized, re-encoded bytes in the output buffer
//! ```
//!
//! Every step is fallible and the first failure ends the run with a
//! [`pipeline::PipelineError`] naming the stage it came from. No step keeps
//! state between runs, so one [`pipeline::Pipeline`] can be shared by many
//! threads.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Local file reads and remote GETs through an injected HTTP client |
//! | [`imaging`] | Format detection, header parsing, geometry, buffers, the codec engine |
//! | [`pipeline`] | Orchestrates the steps and owns the decoder's lifetime |
//! | [`config`] | Optional `imgops.toml`: limits, fetch timeouts, encoder tables |
//! | [`output`] | CLI output naming, collision-safe writes, console formatting |
//!
//! # Design Decisions
//!
//! ## Bounded Memory
//!
//! Intermediate frames live in a scratch buffer whose ceiling is fixed by
//! `limits.max_dimension`, not by what the header claims. Sources or targets
//! larger than that fail with a geometry error before any pixels are
//! decoded. The output buffer either has a fixed ceiling (overflow is an
//! error, never a truncated file) or grows on demand.
//!
//! ## Injected Collaborators
//!
//! The codec engine ([`imaging::Codec`]) and the HTTP client
//! ([`source::HttpFetch`]) are traits passed in at construction. Tests swap
//! in recording doubles; the binary uses [`imaging::RustCodec`] and one shared
//! [`source::ReqwestFetcher`].
//!
//! ## Codecs
//!
//! Decoding and JPEG/PNG/GIF encoding use the `image` crate; WebP output is
//! lossy through the `webp` crate (libwebp, built from source by its sys
//! crate). Resampling uses `fast_image_resize` (Lanczos3).
//!
//! Animated inputs kept as GIF are streamed one frame at a time, and their
//! frame count comes from the container without decoding pixels, so
//! `limits.max_frames` is enforced before any frame is decoded.

pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod source;

#[cfg(test)]
pub(crate) mod test_helpers;
