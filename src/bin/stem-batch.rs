use clap::{Args, Parser, Subcommand};
use std::{fs, path::PathBuf, process, time::Duration};
use stem_batch_core::{
    config, run_cleanup_stage, run_fetch_stage, set_batch_progress_callback, types::DEFAULT_MODEL,
    BatchProgress, CleanupOptions, FetchOptions, GateMode, HttpFetcher, ManifestColumns, Outcome,
    StageReport, ToolConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stem-batch")]
#[command(about = "Batch fetch audio and strip background music", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download included manifest entries and resample them
    Fetch {
        /// Manifest file or directory of *.csv manifests
        #[arg(short, long)]
        manifest: PathBuf,

        #[arg(short, long, default_value = "data/audio_files")]
        output: PathBuf,

        #[command(flatten)]
        columns: ColumnArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Separate vocals from every audio file in a directory
    Clean {
        #[arg(short, long, default_value = "data/audio_files")]
        input: PathBuf,

        #[arg(short, long, default_value = "data/cleaned_audio")]
        output: PathBuf,

        #[command(flatten)]
        cleanup: CleanupArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Fetch, then clean what was fetched
    Run {
        #[arg(short, long)]
        manifest: PathBuf,

        /// Where fetched audio lands; input of the clean stage
        #[arg(long, default_value = "data/audio_files")]
        fetched: PathBuf,

        #[arg(short, long, default_value = "data/cleaned_audio")]
        output: PathBuf,

        #[command(flatten)]
        columns: ColumnArgs,

        #[command(flatten)]
        cleanup: CleanupArgs,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Clone)]
struct ColumnArgs {
    #[arg(long, default_value = "file_name")]
    id_column: String,

    #[arg(long, default_value = "url")]
    url_column: String,

    /// Column holding the true/false inclusion flag
    #[arg(long, default_value = "Music")]
    include_column: String,
}

#[derive(Args, Clone)]
struct CleanupArgs {
    #[arg(long, env = config::MODEL_VAR, default_value = DEFAULT_MODEL)]
    model: String,

    /// Run the separation engine on the GPU
    #[arg(long)]
    gpu: bool,

    #[arg(long, default_value_t = 1)]
    channels: u16,

    /// Comma separated list of input extensions
    #[arg(long, value_delimiter = ',', default_values = ["wav", "mp3"])]
    extensions: Vec<String>,

    /// Only look at files directly inside the input directory
    #[arg(long)]
    no_recursive: bool,
}

#[derive(Args, Clone)]
struct CommonArgs {
    #[arg(long, default_value_t = stem_batch_core::types::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Concurrent workers (default: available parallelism, minus one for clean)
    #[arg(short, long)]
    jobs: Option<usize>,

    #[arg(long, default_value_t = stem_batch_core::types::DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Only treat a target as done if it parses as WAV
    #[arg(long)]
    verify_wav: bool,

    /// Kill an external tool after this many seconds
    #[arg(long, env = config::TOOL_TIMEOUT_VAR)]
    tool_timeout: Option<u64>,

    #[arg(long, env = config::DEMUCS_BIN_VAR, default_value = "demucs")]
    demucs_bin: PathBuf,

    #[arg(long, env = config::FFMPEG_BIN_VAR, default_value = "ffmpeg")]
    ffmpeg_bin: PathBuf,

    /// Pass external tool output through to the console
    #[arg(long)]
    show_tool_output: bool,

    /// Write the stage reports as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Exit non-zero if any item failed
    #[arg(long)]
    fail_on_error: bool,

    #[arg(short, long)]
    quiet: bool,
}

impl CommonArgs {
    fn gate(&self) -> GateMode {
        if self.verify_wav {
            GateMode::ValidWav
        } else {
            GateMode::Exists
        }
    }

    fn tools(&self, cleanup: Option<&CleanupArgs>) -> ToolConfig {
        let mut tools = ToolConfig {
            demucs_bin: self.demucs_bin.clone(),
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            timeout: self.tool_timeout.map(Duration::from_secs),
            show_output: self.show_tool_output,
            ..ToolConfig::default()
        };
        if let Some(c) = cleanup {
            tools.model_name = c.model.clone();
            tools.use_gpu = c.gpu;
        }
        tools
    }
}

impl From<ColumnArgs> for ManifestColumns {
    fn from(c: ColumnArgs) -> Self {
        ManifestColumns {
            identity: c.id_column,
            url: c.url_column,
            include: c.include_column,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Fetch {
            manifest,
            output,
            columns,
            common,
        } => handle_fetch(manifest, output, columns, &common).and_then(|r| finish(&[r], &common)),
        Commands::Clean {
            input,
            output,
            cleanup,
            common,
        } => handle_clean(input, output, &cleanup, &common).and_then(|r| finish(&[r], &common)),
        Commands::Run {
            manifest,
            fetched,
            output,
            columns,
            cleanup,
            common,
        } => handle_fetch(manifest, fetched.clone(), columns, &common).and_then(|fetch| {
            let clean = handle_clean(fetched, output, &cleanup, &common)?;
            finish(&[fetch, clean], &common)
        }),
    };

    match result {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_fetch(
    manifest: PathBuf,
    output: PathBuf,
    columns: ColumnArgs,
    common: &CommonArgs,
) -> Result<StageReport, Box<dyn std::error::Error>> {
    if !manifest.exists() {
        return Err(format!("Manifest not found: {}", manifest.display()).into());
    }
    if !common.quiet {
        setup_progress_callbacks();
    }

    let opts = FetchOptions {
        manifest_path: manifest,
        output_dir: output,
        columns: columns.into(),
        chunk_size: common.chunk_size,
        jobs: common.jobs,
        sample_rate: common.sample_rate,
        gate: common.gate(),
    };

    let fetcher = HttpFetcher::new()?;
    let resampler = common.tools(None).resampler();
    Ok(run_fetch_stage(&opts, &fetcher, &resampler)?)
}

fn handle_clean(
    input: PathBuf,
    output: PathBuf,
    cleanup: &CleanupArgs,
    common: &CommonArgs,
) -> Result<StageReport, Box<dyn std::error::Error>> {
    if !input.is_dir() {
        return Err(format!("Input directory not found: {}", input.display()).into());
    }
    if !common.quiet {
        setup_progress_callbacks();
    }

    let opts = CleanupOptions {
        input_dir: input,
        output_dir: output,
        extensions: cleanup
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect(),
        recursive: !cleanup.no_recursive,
        chunk_size: common.chunk_size,
        jobs: common.jobs,
        sample_rate: common.sample_rate,
        channels: Some(cleanup.channels),
        gate: common.gate(),
    };

    let tools = common.tools(Some(cleanup));
    let engine = tools.separation_engine();
    let resampler = tools.resampler();
    Ok(run_cleanup_stage(&opts, &engine, &resampler)?)
}

/// Writes the optional JSON report; returns false when `--fail-on-error`
/// applies.
fn finish(reports: &[StageReport], common: &CommonArgs) -> Result<bool, Box<dyn std::error::Error>> {
    if let Some(path) = &common.report {
        fs::write(path, serde_json::to_string_pretty(reports)?)?;
    }
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    Ok(!(common.fail_on_error && failed > 0))
}

fn setup_progress_callbacks() {
    set_batch_progress_callback(|progress| match progress {
        BatchProgress::StageStarted { stage, found, chunks } => {
            println!("🎵 {stage}: {found} files found, {chunks} batches");
        }
        BatchProgress::ChunkStarted { index, total, size } => {
            println!("⏳ Processing batch {index}/{total} ({size} files)");
        }
        BatchProgress::ItemFinished { identity, outcome } => match outcome {
            Outcome::Completed => println!("✅ Done: {identity}"),
            Outcome::Skipped => println!("⏭  Skipping {identity}, already exists."),
            Outcome::Failed { reason, .. } => println!("❌ Failed {identity}: {reason}"),
        },
        BatchProgress::ChunkFinished {
            index,
            total,
            completed,
            skipped,
            failed,
        } => {
            println!(
                "📦 Batch {index}/{total} finished: {completed} done, {skipped} skipped, {failed} failed"
            );
        }
        BatchProgress::StageFinished(report) => {
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("Stage:     {}", report.stage);
            println!("Found:     {}", report.found);
            println!("Completed: {}", report.completed);
            println!("Skipped:   {}", report.skipped);
            println!("Failed:    {}", report.failed);
        }
    });
}
