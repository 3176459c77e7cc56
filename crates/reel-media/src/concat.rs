//! FFmpeg concat-demuxer merge.
//!
//! Segment clips come from the same generation model with identical codec
//! parameters, so merging is a stream copy through the concat demuxer — no
//! re-encode. The merge is atomic from the caller's perspective: on any
//! failure no usable output artifact is produced.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Options for a concat merge.
#[derive(Debug, Clone)]
pub struct ConcatOptions {
    /// Timeout in seconds; the FFmpeg process is killed when exceeded.
    pub timeout_secs: u64,
    /// FFmpeg log level.
    pub log_level: String,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            log_level: "error".to_string(),
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Build the FFmpeg argument list for a concat stream copy.
fn build_args(list_path: &Path, output: &Path, options: &ConcatOptions) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-v".to_string(),
        options.log_level.clone(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Concatenate video files in order with a stream copy.
pub async fn concat_copy(
    inputs: &[PathBuf],
    output: impl AsRef<Path>,
    options: &ConcatOptions,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::EmptyInput);
    }

    check_ffmpeg()?;

    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Concat demuxer list file; kept alive until FFmpeg exits.
    let mut list_file = tempfile::NamedTempFile::new()?;
    for input in inputs {
        // Forward slashes and quoting keep the demuxer parser happy.
        let path = input.to_string_lossy().replace('\\', "/");
        writeln!(list_file, "file '{}'", path)?;
    }
    list_file.flush()?;

    let args = build_args(list_file.path(), output, options);
    debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

    let child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    wait_for_completion(child, options.timeout_secs).await?;

    if !tokio::fs::try_exists(output).await? {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg exited successfully but produced no output",
            None,
        ));
    }

    Ok(())
}

/// Wait for the FFmpeg process, draining stderr and killing it on timeout.
async fn wait_for_completion(mut child: Child, timeout_secs: u64) -> MediaResult<()> {
    let stderr = child.stderr.take();

    // Drain stderr concurrently so the child never blocks on a full pipe.
    let stderr_task = tokio::spawn(async move {
        let mut captured = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut captured).await;
        }
        captured
    });

    let status = match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await
    {
        Ok(result) => result?,
        Err(_) => {
            warn!(
                "FFmpeg timed out after {} seconds, killing process",
                timeout_secs
            );
            let _ = child.kill().await;
            let _ = stderr_task.await;
            return Err(MediaError::Timeout(timeout_secs));
        }
    };

    let captured = stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(MediaError::ffmpeg_failed(
            captured.trim().to_string(),
            status.code(),
        ))
    }
}
