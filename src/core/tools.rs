//! Adapters for the external separation engine and resample tool.
//!
//! The engine owns its output layout (see [`SeparationLayout`]); this module
//! is the only place that knows about it and moves its result onto the
//! canonical one-file-per-identity path.

use std::{
    ffi::OsString,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{
    error::{BatchError, Result},
    io::paths::{resample_temp_path, SeparationLayout, OUTPUT_EXTENSION},
};

const SEPARATION_TOOL: &str = "separation engine";
const RESAMPLE_TOOL: &str = "resample tool";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Two-stem (vocals / everything else) source separation.
pub trait SeparationEngine: Sync {
    fn model_name(&self) -> &str;

    /// Runs the engine on `input`, writing its layout under `output_dir`.
    fn run(&self, input: &Path, output_dir: &Path) -> Result<()>;
}

/// Rewrites audio to a sample rate and optional channel count.
pub trait Resampler: Sync {
    fn render(&self, input: &Path, output: &Path, sample_rate: u32, channels: Option<u16>) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct DemucsCli {
    pub program: PathBuf,
    pub model_name: String,
    pub use_gpu: bool,
    pub timeout: Option<Duration>,
    pub show_output: bool,
}

impl SeparationEngine for DemucsCli {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn run(&self, input: &Path, output_dir: &Path) -> Result<()> {
        let mut args: Vec<OsString> = vec![
            "-n".into(),
            self.model_name.clone().into(),
            "--two-stems=vocals".into(),
        ];
        if self.use_gpu {
            args.push("-d".into());
            args.push("cuda".into());
        }
        args.push(input.into());
        args.push("-o".into());
        args.push(output_dir.into());

        let status = run_tool(&self.program, &args, self.timeout, self.show_output)?;
        check_status(&self.program, status)
    }
}

#[derive(Clone, Debug)]
pub struct FfmpegCli {
    pub program: PathBuf,
    pub timeout: Option<Duration>,
    pub show_output: bool,
}

impl Resampler for FfmpegCli {
    fn render(&self, input: &Path, output: &Path, sample_rate: u32, channels: Option<u16>) -> Result<()> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.into(),
            "-ar".into(),
            sample_rate.to_string().into(),
        ];
        if let Some(ch) = channels {
            args.push("-ac".into());
            args.push(ch.to_string().into());
        }
        // The temp output has no audio extension, so name the container.
        args.push("-f".into());
        args.push(OUTPUT_EXTENSION.into());
        args.push(output.into());

        let status = run_tool(&self.program, &args, self.timeout, self.show_output)?;
        check_status(&self.program, status)
    }
}

/// Spawns `program` and blocks until it exits, or kills it once `timeout`
/// elapses.
pub fn run_tool(
    program: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
    show_output: bool,
) -> Result<ExitStatus> {
    let output = || {
        if show_output {
            Stdio::inherit()
        } else {
            Stdio::null()
        }
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(output())
        .stderr(output())
        .spawn()
        .map_err(|e| BatchError::tool(program.display().to_string(), format!("could not start: {e}")))?;

    let Some(limit) = timeout else {
        return child.wait().map_err(|e| waiting_failed(program, e));
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|e| waiting_failed(program, e))? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BatchError::tool(
                program.display().to_string(),
                format!("timed out after {}s", limit.as_secs_f32()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn waiting_failed(program: &Path, e: std::io::Error) -> BatchError {
    BatchError::tool(program.display().to_string(), format!("wait failed: {e}"))
}

fn check_status(program: &Path, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(BatchError::tool(
            program.display().to_string(),
            format!("exited with {status}"),
        ))
    }
}

/// Runs the engine and returns its layout for `identity` once `vocals.wav`
/// is present. The engine's own exit status is only logged; a missing
/// vocals stream is the failure signal.
pub fn separate(
    engine: &dyn SeparationEngine,
    input: &Path,
    output_dir: &Path,
    identity: &str,
) -> Result<SeparationLayout> {
    let layout = SeparationLayout::new(output_dir, engine.model_name(), identity);

    let run = engine.run(input, output_dir);
    if let Err(e) = &run {
        warn!(identity, error = %e, "separation engine reported an error");
    }

    if layout.vocals().is_file() {
        return Ok(layout);
    }

    let mut reason = format!("no vocals stream at {}", layout.vocals().display());
    if let Err(e) = run {
        reason.push_str(&format!(" ({e})"));
    }
    Err(BatchError::tool(SEPARATION_TOOL, reason))
}

/// Resamples `path` in place. The tool writes a hidden sibling which replaces
/// the original only if it was actually produced; otherwise `path` is left
/// untouched.
pub fn resample(
    resampler: &dyn Resampler,
    path: &Path,
    sample_rate: u32,
    channels: Option<u16>,
) -> Result<()> {
    let tmp = resample_temp_path(path);
    remove_if_exists(&tmp)?;

    let run = resampler.render(path, &tmp, sample_rate, channels);

    let produced = fs::metadata(&tmp).map(|m| m.is_file() && m.len() > 0).unwrap_or(false);
    if !produced {
        remove_if_exists(&tmp)?;
        let mut reason = format!("no output for {}", path.display());
        if let Err(e) = run {
            reason.push_str(&format!(" ({e})"));
        }
        return Err(BatchError::tool(RESAMPLE_TOOL, reason));
    }

    if let Err(e) = &run {
        warn!(path = %path.display(), error = %e, "resample tool reported an error but wrote output");
    }

    fs::rename(&tmp, path).map_err(BatchError::fs(path))?;
    Ok(())
}

/// Moves the engine's `vocals.wav` onto `target`, drops the residual stream
/// and the per-item directory, then resamples `target` in place.
pub fn canonicalize_vocals(
    layout: &SeparationLayout,
    target: &Path,
    resampler: &dyn Resampler,
    sample_rate: u32,
    channels: Option<u16>,
) -> Result<()> {
    let vocals = layout.vocals();
    fs::rename(&vocals, target).map_err(BatchError::fs(&vocals))?;

    remove_if_exists(&layout.residual())?;

    match fs::remove_dir_all(layout.item_dir()) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(BatchError::fs(layout.item_dir())(e)),
    }

    resample(resampler, target, sample_rate, channels)
}

/// Removes `output_dir/<model>` if the engine left it empty.
pub fn prune_engine_root(output_dir: &Path, model_name: &str) {
    let dir = output_dir.join(model_name);
    if !dir.is_dir() {
        return;
    }
    if let Err(e) = fs::remove_dir(&dir) {
        debug!(dir = %dir.display(), error = %e, "engine output root not removed");
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BatchError::fs(path)(e)),
    }
}
