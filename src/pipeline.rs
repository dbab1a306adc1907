//! Pipeline orchestration: acquire → detect → header → geometry → transform.
//!
//! ```text
//! Idle → Acquiring → Detecting → HeaderRead → GeometryResolved → Transforming → Done
//!   │        │           │            │                │               │
//!   └────────┴───────────┴────────────┴────────────────┴───────────────┴──→ Failed
//! ```
//!
//! Steps run strictly in order and the first failure ends the run. The
//! returned [`PipelineError`] names the stage it came from.
//!
//! The decoder handle is scoped to [`Pipeline::run_with_buffers`]: it is
//! dropped (released) on every exit path and always before the output bytes
//! are handed back.

use crate::config::{LimitsConfig, PipelineConfig};
use crate::imaging::{
    Codec, CodecError, ContainerFormat, EncodeOptionsTable, GeometryError, ImageHeader,
    ResizePolicy, TargetGeometry, TransformBuffers, TransformSpec, check_frames, check_limit,
    resolve,
};
use crate::source::{AcquireError, HttpFetch, Source, SourceAcquirer};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Acquiring,
    Detecting,
    HeaderRead,
    GeometryResolved,
    Transforming,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Detecting => "detecting",
            Self::HeaderRead => "header read",
            Self::GeometryResolved => "geometry resolved",
            Self::Transforming => "transforming",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error(transparent)]
    Acquisition(AcquireError),
    #[error("unrecognized image format")]
    UnrecognizedFormat,
    #[error("malformed {format} header: {reason}")]
    MalformedHeader {
        format: ContainerFormat,
        reason: String,
    },
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("transform failed: {0}")]
    Transform(CodecError),
}

impl PipelineError {
    /// The step that produced this error. Never `Done` or `Failed`: those
    /// are terminal states, not steps.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Usage(_) => Stage::Idle,
            Self::Acquisition(_) => Stage::Acquiring,
            Self::UnrecognizedFormat => Stage::Detecting,
            Self::MalformedHeader { .. } => Stage::HeaderRead,
            Self::Geometry(_) => Stage::GeometryResolved,
            Self::Transform(_) => Stage::Transforming,
        }
    }
}

impl From<AcquireError> for PipelineError {
    fn from(err: AcquireError) -> Self {
        if err.is_usage() {
            Self::Usage(err.to_string())
        } else {
            Self::Acquisition(err)
        }
    }
}

/// One caller request. Exactly one of `input` / `remote_input` must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub input: Option<PathBuf>,
    pub remote_input: Option<String>,
    /// Target extension (`.png`, `jpg`, ...). `None` keeps the input format.
    pub output_type: Option<String>,
    /// 0 = derive from the source.
    pub width: u32,
    /// 0 = derive from the source.
    pub height: u32,
    pub policy: ResizePolicy,
    pub normalize_orientation: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            input: None,
            remote_input: None,
            output_type: None,
            width: 0,
            height: 0,
            policy: ResizePolicy::Fit,
            normalize_orientation: true,
        }
    }
}

/// A finished run: the encoded image plus what was learned on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    /// Input container format.
    pub source_format: ContainerFormat,
    pub header: ImageHeader,
    pub geometry: TargetGeometry,
    /// Output container format.
    pub target: ContainerFormat,
}

impl TransformOutput {
    /// Format label of the input, e.g. `"JPEG"`.
    pub fn description(&self) -> &'static str {
        self.source_format.description()
    }
}

/// Everything but the bytes; those stay in the caller's buffer.
#[derive(Debug)]
struct Completed {
    source_format: ContainerFormat,
    header: ImageHeader,
    geometry: TargetGeometry,
    target: ContainerFormat,
}

/// Logs state transitions.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    fn enter(&mut self, next: Stage) {
        log::debug!("pipeline: {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// The orchestrator. Holds only immutable collaborators, so one instance can
/// serve concurrent runs from several threads.
pub struct Pipeline<C, F> {
    codec: C,
    acquirer: SourceAcquirer<F>,
    encode_options: EncodeOptionsTable,
    limits: LimitsConfig,
}

impl<C: Codec, F: HttpFetch> Pipeline<C, F> {
    pub fn new(codec: C, fetcher: F, config: &PipelineConfig) -> Self {
        Self {
            codec,
            acquirer: SourceAcquirer::new(fetcher),
            encode_options: config.encode_table(),
            limits: config.limits.clone(),
        }
    }

    /// Replace the encode-options table.
    pub fn with_encode_options(mut self, table: EncodeOptionsTable) -> Self {
        self.encode_options = table;
        self
    }

    /// Fresh buffers sized from the configured limits.
    pub fn buffers(&self) -> TransformBuffers {
        TransformBuffers::new(
            self.limits.max_dimension,
            self.limits.output_buffer_bytes,
            self.limits.grow_output,
        )
    }

    /// Run one request with buffers owned by this invocation.
    pub fn run(&self, request: &Request) -> Result<TransformOutput, PipelineError> {
        let mut buffers = self.buffers();
        let done = self.execute(request, &mut buffers)?;
        Ok(done.into_output(buffers.output.into_bytes()))
    }

    /// Run one request reusing caller-owned buffers. On error the output
    /// buffer is cleared so no partial encode is observable.
    pub fn run_with_buffers(
        &self,
        request: &Request,
        buffers: &mut TransformBuffers,
    ) -> Result<TransformOutput, PipelineError> {
        match self.execute(request, buffers) {
            Ok(done) => Ok(done.into_output(buffers.output.as_bytes().to_vec())),
            Err(err) => {
                buffers.output.reset();
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        request: &Request,
        buffers: &mut TransformBuffers,
    ) -> Result<Completed, PipelineError> {
        self.execute_tracked(request, buffers, &mut Progress::new())
    }

    /// Run the steps, then move `progress` to `Done` or `Failed`.
    fn execute_tracked(
        &self,
        request: &Request,
        buffers: &mut TransformBuffers,
        progress: &mut Progress,
    ) -> Result<Completed, PipelineError> {
        let result = self.steps(request, buffers, progress);
        match &result {
            Ok(done) => {
                progress.enter(Stage::Done);
                log::debug!("pipeline: {} bytes of {}", buffers.output.len(), done.target);
            }
            Err(err) => {
                progress.enter(Stage::Failed);
                log::debug!("pipeline: {} step failed: {err}", err.stage());
            }
        }
        result
    }

    fn steps(
        &self,
        request: &Request,
        buffers: &mut TransformBuffers,
        progress: &mut Progress,
    ) -> Result<Completed, PipelineError> {
        // Idle: caller mistakes, before any I/O.
        let source = Source::from_options(request.input.clone(), request.remote_input.clone())?;
        let requested_target = match &request.output_type {
            Some(ext) => Some(
                ContainerFormat::from_extension(ext)
                    .ok_or_else(|| PipelineError::Usage(format!("unsupported output type '{ext}'")))?,
            ),
            None => None,
        };

        progress.enter(Stage::Acquiring);
        let blob = self.acquirer.acquire(&source)?;

        progress.enter(Stage::Detecting);
        let mut decoder = self.codec.detect(&blob).map_err(|e| match e {
            CodecError::UnrecognizedFormat => PipelineError::UnrecognizedFormat,
            other => PipelineError::Transform(other),
        })?;
        let source_format = decoder.format();

        progress.enter(Stage::HeaderRead);
        let header = decoder.header().map_err(|e| match e {
            CodecError::MalformedHeader { format, reason } => {
                PipelineError::MalformedHeader { format, reason }
            }
            other => PipelineError::MalformedHeader {
                format: source_format,
                reason: other.to_string(),
            },
        })?;
        log::info!(
            "{source}: {} {}x{}{}",
            decoder.description(),
            header.width,
            header.height,
            if header.is_animated() {
                format!(", {:.2}s animation", header.duration_secs())
            } else {
                String::new()
            }
        );

        progress.enter(Stage::GeometryResolved);
        let max = buffers.scratch.max_dimension();
        check_limit(header.width, header.height, max)?;
        let geometry = resolve(
            &header,
            request.width,
            request.height,
            request.policy,
            request.normalize_orientation,
        )?;
        check_limit(geometry.width, geometry.height, max)?;
        let target = requested_target.unwrap_or(source_format);
        if header.is_animated() && target == ContainerFormat::Gif {
            check_frames(header.frame_count, self.limits.max_frames)?;
        }
        log::info!(
            "resolved {}x{} ({:?})",
            geometry.width,
            geometry.height,
            geometry.policy
        );

        progress.enter(Stage::Transforming);
        let extension = request
            .output_type
            .clone()
            .unwrap_or_else(|| target.extension().to_string());
        let spec = TransformSpec {
            geometry,
            target,
            options: self.encode_options.select(&extension),
            normalize_orientation: request.normalize_orientation,
        };
        decoder
            .transform(&spec, buffers)
            .map_err(PipelineError::Transform)?;
        drop(decoder);
        log::info!("encoded {} bytes as {}", buffers.output.len(), target);

        Ok(Completed {
            source_format,
            header,
            geometry,
            target,
        })
    }
}

impl Completed {
    fn into_output(self, bytes: Vec<u8>) -> TransformOutput {
        TransformOutput {
            bytes,
            source_format: self.source_format,
            header: self.header,
            geometry: self.geometry,
            target: self.target,
        }
    }
}
