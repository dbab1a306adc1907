//! CLI output: file naming, collision-safe writes, console formatting.
//!
//! # Output Format
//!
//! ```text
//! file type: GIF
//! 400x300 px
//! duration: 1.25 s
//! resized to 200x150 (fit)
//! image written to resized.gif
//! ```
//!
//! The duration line appears only for animated sources.
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{ContainerFormat, ResizePolicy};
use crate::pipeline::TransformOutput;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("output file already exists: {0}")]
    Collision(PathBuf),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Naming
// ============================================================================

/// `resized.<ext>`, taking `<ext>` from the input name when it has one.
pub fn default_output_name(source_extension: Option<&str>, detected: ContainerFormat) -> PathBuf {
    let ext = source_extension
        .filter(|e| !e.is_empty())
        .unwrap_or(detected.extension());
    PathBuf::from(format!("resized.{ext}"))
}

/// Per-run output path for the load harness: `<i>-<name>` when `runs > 1`.
pub fn run_output_path(base: &Path, run: usize, runs: usize) -> PathBuf {
    if runs <= 1 {
        return base.to_path_buf();
    }
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{run}-{name}"))
}

// ============================================================================
// Writing
// ============================================================================

/// Write `bytes` to a new file. Never overwrites; the file is read-only
/// (0400) on unix.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o400);
    }

    let io_err = |source: io::Error| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = options.open(path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => OutputError::Collision(path.to_path_buf()),
        _ => io_err(e),
    })?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        // A half-written file must not survive.
        if let Err(cleanup) = std::fs::remove_file(path) {
            log::warn!("could not remove partial {}: {cleanup}", path.display());
        }
        return Err(io_err(e));
    }
    log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

// ============================================================================
// Console
// ============================================================================

fn policy_label(policy: ResizePolicy) -> &'static str {
    match policy {
        ResizePolicy::Fit => "fit",
        ResizePolicy::Stretch => "stretch",
    }
}

/// Source description and resolved geometry for one run.
pub fn format_summary(output: &TransformOutput) -> Vec<String> {
    let header = &output.header;
    let geometry = &output.geometry;
    let mut lines = vec![
        format!("file type: {}", output.description()),
        format!("{}x{} px", header.width, header.height),
    ];
    if !header.duration.is_zero() {
        lines.push(format!("duration: {:.2} s", header.duration_secs()));
    }
    lines.push(format!(
        "resized to {}x{} ({})",
        geometry.width,
        geometry.height,
        policy_label(geometry.policy)
    ));
    if output.target != output.source_format {
        lines.push(format!("converted to {}", output.target.description()));
    }
    lines
}

pub fn format_written(path: &Path) -> String {
    format!("image written to {}", path.display())
}

pub fn print_summary(output: &TransformOutput) {
    for line in format_summary(output) {
        println!("{}", line);
    }
}

pub fn print_written(path: &Path) {
    println!("{}", format_written(path));
}
