use thiserror::Error;

/// Failures of the audio extraction pipeline.
///
/// Subprocess variants carry the exit code (`None` when the process was
/// killed by a signal or never started) and whatever it wrote to stderr.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid audio format '{0}'. Allowed: mp3, wav, flac")]
    InvalidFormat(String),

    #[error("Invalid video path: {0}")]
    InvalidPath(String),

    #[error("Video not found: {0}")]
    SourceNotFound(String),

    #[error("Video segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Staging area unavailable: {0}")]
    StagingUnavailable(#[source] std::io::Error),

    #[error("FFmpeg merge failed (exit code {}): {stderr}", display_code(.exit_code))]
    MergeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("FFmpeg failed (exit code {}): {stderr}", display_code(.exit_code))]
    TranscodeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}
