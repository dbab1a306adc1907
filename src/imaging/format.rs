//! Container format recognition.
//!
//! Detection only looks at the leading magic bytes (via
//! [`image::guess_format`]) and never decodes pixels. Anything the `image`
//! crate recognizes but this crate does not compile a codec for is reported
//! as unrecognized.

use image::ImageFormat;

/// Container formats the codec engine can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 4] = [Self::Jpeg, Self::Png, Self::Gif, Self::WebP];

    /// Recognize a buffer by its magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    /// Look up a format from a file extension (`.png`, `JPG`, `webp`, ...).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Human-readable label, e.g. `"JPEG"`.
    pub fn description(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::WebP => "WEBP",
        }
    }

    /// Canonical lowercase extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::WebP => ImageFormat::WebP,
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Lowercase, strip a leading dot, and fold `jpg` into `jpeg`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext == "jpg" { "jpeg".to_string() } else { ext }
}
