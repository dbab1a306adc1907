use clap::Parser;
use imgops::config;
use imgops::imaging::{ResizePolicy, RustCodec};
use imgops::output::{self, OutputError};
use imgops::pipeline::{Pipeline, PipelineError, Request};
use imgops::source::{HttpFetch, ReqwestFetcher, Source};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

fn version_string() -> &'static str {
    let hash = env!("IMGOPS_GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}@{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "imgops")]
#[command(about = "Resize, crop and re-encode an image")]
#[command(long_about = "\
Resize, crop and re-encode an image

Reads one image (JPEG, PNG, GIF or WebP) from a file or a URL, resizes it and
writes the result to a new file. Existing files are never overwritten.

Sizing:
  --width 800               height follows the source aspect ratio
  --width 300 --height 600  scaled to cover the box, overflow cropped evenly
  ... --stretch             exact box, aspect ratio ignored
  (no size)                 source size

The output format follows the --output extension; without --output the
input format is kept and the file is named resized.<input extension>.

Run 'imgops --gen-config' to print a documented imgops.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Local input image
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Remote input image URL
    #[arg(long)]
    remote_input: Option<String>,

    /// Output file; its extension selects the output format
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Output width in pixels (0 = from source)
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Output height in pixels (0 = from source)
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// Ignore the source aspect ratio instead of cropping
    #[arg(long)]
    stretch: bool,

    /// Run the whole pipeline N times in parallel (load testing)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a stock imgops.toml with all options documented
    #[arg(long)]
    gen_config: bool,
}

/// Failure of one run, pipeline or file write.
#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?;
    let fetcher = ReqwestFetcher::new(&config.fetch)?;
    let codec =
        RustCodec::new(config.limits.max_dimension).with_max_frames(config.limits.max_frames);
    let pipeline = Pipeline::new(codec, fetcher, &config);

    let source_extension = Source::from_options(cli.input.clone(), cli.remote_input.clone())
        .ok()
        .and_then(|source| source.extension());
    let request = Request {
        input: cli.input,
        remote_input: cli.remote_input,
        output_type: cli
            .output
            .as_deref()
            .and_then(Path::extension)
            .map(|ext| ext.to_string_lossy().into_owned()),
        width: cli.width,
        height: cli.height,
        policy: ResizePolicy::from_stretch_flag(cli.stretch),
        normalize_orientation: config.normalize_orientation,
    };
    let job = Job {
        pipeline: &pipeline,
        request: &request,
        output: cli.output.as_deref(),
        source_extension: source_extension.as_deref(),
        runs: cli.runs as usize,
    };

    if job.runs == 1 {
        job.run(0)?;
        return Ok(());
    }

    init_thread_pool(&config.processing);
    let failures: usize = (0..job.runs)
        .into_par_iter()
        .map(|i| match job.run(i) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("run {i}: {e}");
                1
            }
        })
        .sum();
    if failures > 0 {
        return Err(format!("{failures} of {} runs failed", job.runs).into());
    }
    Ok(())
}

/// One CLI invocation, possibly repeated by the load harness.
struct Job<'a, F> {
    pipeline: &'a Pipeline<RustCodec, F>,
    request: &'a Request,
    output: Option<&'a Path>,
    source_extension: Option<&'a str>,
    runs: usize,
}

impl<F: HttpFetch> Job<'_, F> {
    fn run(&self, index: usize) -> Result<(), RunError> {
        let result = self.pipeline.run(self.request)?;
        let base = match self.output {
            Some(path) => path.to_path_buf(),
            None => output::default_output_name(self.source_extension, result.source_format),
        };
        let path = output::run_output_path(&base, index, self.runs);
        output::write_output(&path, &result.bytes)?;
        if self.runs == 1 {
            output::print_summary(&result);
        }
        output::print_written(&path);
        Ok(())
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
