use crate::services::audio_format::AudioFormat;
use crate::services::error::PipelineError;
use bytes::{Bytes, BytesMut};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// One ffmpeg invocation: strip video, encode audio, write to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub input_path: PathBuf,
    pub codec: &'static str,
    pub container_format: &'static str,
}

impl TranscodeJob {
    pub fn new(input_path: PathBuf, format: AudioFormat) -> Self {
        Self {
            input_path,
            codec: format.codec(),
            container_format: format.container(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: PathBuf,
}

impl Transcoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Starts ffmpeg. The child is killed if the returned process is dropped
    /// before it exits.
    pub fn spawn(&self, job: &TranscodeJob) -> Result<TranscodeProcess, PipelineError> {
        tracing::info!(
            "🎵 Running FFmpeg on {} (codec={}, format={})",
            job.input_path.display(),
            job.codec,
            job.container_format
        );

        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&job.input_path)
            .arg("-vn")
            .arg("-acodec")
            .arg(job.codec)
            .arg("-f")
            .arg(job.container_format)
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn ffmpeg: {}", e);
                PipelineError::TranscodeFailed {
                    exit_code: None,
                    stderr: format!("failed to start {}: {}", self.ffmpeg_path.display(), e),
                }
            })?;

        let stdout = child.stdout.take().ok_or_else(|| PipelineError::TranscodeFailed {
            exit_code: None,
            stderr: "ffmpeg stdout was not captured".to_string(),
        })?;

        // Drained on its own task so a chatty stderr can never fill the pipe
        // and stall stdout.
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(drain(stderr)));

        Ok(TranscodeProcess {
            child,
            stdout,
            stderr_task,
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        tracing::warn!("Failed to read ffmpeg stderr: {}", e);
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

/// A running transcode. Read stdout with [`next_chunk`](Self::next_chunk)
/// until it returns `None`, then call [`finish`](Self::finish) to learn
/// whether the output is valid.
#[derive(Debug)]
pub struct TranscodeProcess {
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
}

impl TranscodeProcess {
    /// Reads up to `chunk_size` bytes of stdout. `Ok(None)` at end-of-stream.
    pub async fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Bytes>, PipelineError> {
        let mut buf = BytesMut::with_capacity(chunk_size);
        let n = (&mut self.stdout)
            .take(chunk_size as u64)
            .read_buf(&mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }

    /// Awaits the exit status. Non-zero exit invalidates any output already read.
    pub async fn finish(mut self) -> Result<(), PipelineError> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            if !stderr.is_empty() {
                tracing::warn!("FFmpeg reported: {}", stderr);
            }
            return Ok(());
        }

        tracing::error!("FFmpeg error: {}", stderr);
        Err(PipelineError::TranscodeFailed {
            exit_code: status.code(),
            stderr,
        })
    }

    /// Whole-buffer mode: accumulate all of stdout, then check the exit status.
    pub async fn collect(mut self, chunk_size: usize) -> Result<Bytes, PipelineError> {
        let mut audio = BytesMut::new();
        loop {
            audio.reserve(chunk_size);
            if self.stdout.read_buf(&mut audio).await? == 0 {
                break;
            }
        }
        self.finish().await?;
        Ok(audio.freeze())
    }
}
