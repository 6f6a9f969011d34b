use crate::services::error::PipelineError;
use crate::services::staging::StagingArea;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Lossless concatenation of ordered segment files through ffmpeg's concat
/// demuxer (`-c copy`, no re-encode).
#[derive(Debug, Clone)]
pub struct Merger {
    ffmpeg_path: PathBuf,
}

impl Merger {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Joins `inputs` in the given order into `merged<ext>` inside the staging
    /// area. Callers only invoke this for two or more segments.
    pub async fn merge(
        &self,
        staging: &mut StagingArea,
        inputs: &[PathBuf],
    ) -> Result<PathBuf, PipelineError> {
        let manifest = staging.track("concat_list.txt");
        tokio::fs::write(&manifest, build_manifest(inputs)).await?;

        let ext = inputs
            .first()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| ".mp4".to_string());
        let output = staging.track(&format!("merged{}", ext));

        tracing::info!("🔗 Merging {} segments into {}", inputs.len(), output.display());

        let result = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&manifest)
            .arg("-c")
            .arg("copy")
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::MergeFailed {
                exit_code: None,
                stderr: format!("failed to start {}: {}", self.ffmpeg_path.display(), e),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            tracing::error!("FFmpeg merge error: {}", stderr);
            return Err(PipelineError::MergeFailed {
                exit_code: result.status.code(),
                stderr,
            });
        }

        Ok(output)
    }
}

/// One `file '<path>'` line per input, in order. Single quotes inside a
/// path are written as `'\''`.
pub fn build_manifest(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", escape_path(p)))
        .collect()
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}
