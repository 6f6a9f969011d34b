#![cfg(unix)]

mod common;

use async_trait::async_trait;
use audio_extract_service::services::error::PipelineError;
use audio_extract_service::services::extraction::{
    AudioExtractor, AudioPayload, DeliveryMode, ExtractionRequest,
};
use audio_extract_service::services::storage::{
    LocalStorageService, StorageError, StorageService,
};
use common::{TestEnv, fake_output, process_alive, wait_for_exit};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;

/// Claims `vanishing` exists but reports it missing at download time, as if
/// it were deleted between the probe and the download.
struct VanishingStore {
    inner: LocalStorageService,
    vanishing: String,
}

#[async_trait]
impl StorageService for VanishingStore {
    async fn object_exists(&self, bucket: &str, key: &str) -> anyhow::Result<bool> {
        if key == self.vanishing {
            return Ok(true);
        }
        self.inner.object_exists(bucket, key).await
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError> {
        if key == self.vanishing {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }
        self.inner.download_to(bucket, key, dest).await
    }

    fn backend_name(&self) -> &'static str {
        "vanishing"
    }
}

async fn collect_stream(extractor: &AudioExtractor, request: &ExtractionRequest) -> Vec<u8> {
    let mut stream = extractor.extract_stream(request).await.unwrap();
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn test_stream_and_buffer_modes_are_byte_identical() {
    let mut env = TestEnv::new();
    // Tiny chunks so the streamed output spans many reads.
    env.config.stream_chunk_size = 5;
    env.config.buffer_chunk_size = 7;
    env.put("videos", "movie.mp4", b"first-segment-bytes|");
    env.put("videos", "movie.mp4.part2", b"second-segment-bytes|");
    env.put("videos", "movie.mp4.part3", b"third");
    let extractor = env.extractor();

    for format in ["mp3", "wav", "flac"] {
        let request = ExtractionRequest::new("videos", "movie.mp4", format).unwrap();

        let streamed = collect_stream(&extractor, &request).await;
        let buffered = extractor.extract_bytes(&request).await.unwrap();

        assert_eq!(streamed, buffered.to_vec());
        assert_eq!(
            streamed,
            fake_output(format, b"first-segment-bytes|second-segment-bytes|third")
        );
    }

    assert!(env.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_streamed_chunks_respect_chunk_size() {
    let mut env = TestEnv::new();
    env.config.stream_chunk_size = 4;
    env.put("videos", "clip.mp4", b"0123456789abcdef");
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "clip.mp4", "wav").unwrap();

    let mut stream = extractor.extract_stream(&request).await.unwrap();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(!chunk.is_empty());
        assert!(chunk.len() <= 4);
    }
}

#[tokio::test]
async fn test_extract_dispatches_on_delivery_mode() {
    let env = TestEnv::new();
    env.put("videos", "clip.mp4", b"xyz");
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "clip.mp4", "mp3").unwrap();

    match extractor.extract(&request, DeliveryMode::Buffer).await.unwrap() {
        AudioPayload::Buffer(bytes) => assert_eq!(bytes.to_vec(), fake_output("mp3", b"xyz")),
        other => panic!("expected a buffer, got {:?}", other),
    }

    match extractor.extract(&request, DeliveryMode::Stream).await.unwrap() {
        AudioPayload::Stream(_) => {}
        other => panic!("expected a stream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dropping_stream_mid_flight_cleans_up() {
    let env = TestEnv::new();
    env.put("videos", "endless.mp4", b"slow video");
    env.put("videos", "endless.mp4.part2", b"more");
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "endless.mp4", "mp3").unwrap();

    let mut stream = extractor.extract_stream(&request).await.unwrap();
    for _ in 0..3 {
        let chunk = stream.next().await.unwrap().unwrap();
        assert!(!chunk.is_empty());
    }

    let dirs = env.staging_dirs();
    assert_eq!(dirs.len(), 1);
    let staged: Vec<_> = std::fs::read_dir(&dirs[0]).unwrap().collect();
    assert!(!staged.is_empty());
    let pid = env.slow_pid().expect("transcoder should have recorded its pid");
    assert!(process_alive(pid));

    drop(stream);

    assert!(env.staging_dirs().is_empty());
    assert!(!dirs[0].exists());
    assert!(wait_for_exit(pid).await, "ffmpeg {} outlived its stream", pid);
}

#[tokio::test]
async fn test_segment_vanishing_before_download() {
    let env = TestEnv::new();
    env.put("videos", "movie.mp4", b"AAA");
    let store = Arc::new(VanishingStore {
        inner: LocalStorageService::new(env.data.path()),
        vanishing: "movie.mp4.part2".to_string(),
    });
    let extractor = AudioExtractor::new(store, &env.config);
    let request = ExtractionRequest::new("videos", "movie.mp4", "mp3").unwrap();

    let err = extractor.extract_bytes(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::SegmentNotFound(ref key) if key == "movie.mp4.part2"));

    let err = match extractor.extract_stream(&request).await {
        Err(e) => e,
        Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
    };
    assert!(matches!(err, PipelineError::SegmentNotFound(_)));

    assert!(env.staging_dirs().is_empty());
    assert!(env.transcode_log().is_none());
}

#[tokio::test]
async fn test_merge_failure_reports_stderr_and_cleans_up() {
    let env = TestEnv::new();
    env.put("videos", "movie.mp4", b"AAA");
    env.put("videos", "movie.mp4.part2", b"badpart");
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "movie.mp4", "flac").unwrap();

    match extractor.extract_bytes(&request).await {
        Err(PipelineError::MergeFailed { exit_code, stderr }) => {
            assert_eq!(exit_code, Some(1));
            assert!(stderr.contains("Impossible to open"));
        }
        other => panic!("expected MergeFailed, got {:?}", other.map(|b| b.len())),
    }

    assert!(env.staging_dirs().is_empty());
    assert!(env.transcode_log().is_none());
}

#[tokio::test]
async fn test_transcode_failure_carries_exit_code() {
    let env = TestEnv::new();
    env.put("videos", "broken.mp4", b"corrupt");
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "broken.mp4", "wav").unwrap();

    match extractor.extract_stream(&request).await {
        Err(PipelineError::TranscodeFailed { exit_code, stderr }) => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(stderr, "Invalid data found when processing input");
        }
        Err(other) => panic!("expected TranscodeFailed, got {:?}", other),
        Ok(_) => panic!("expected TranscodeFailed, got a stream"),
    }

    assert!(env.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_late_failure_ends_stream_with_error() {
    let env = TestEnv::new();
    env.put("videos", "halfway.mp4", b"partial");
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "halfway.mp4", "mp3").unwrap();

    let mut stream = extractor.extract_stream(&request).await.unwrap();
    let mut data = Vec::new();
    let mut failure = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => data.extend_from_slice(&chunk),
            Err(e) => failure = Some(e),
        }
    }

    assert_eq!(data, b"partial-output");
    assert!(matches!(failure, Some(PipelineError::TranscodeFailed { .. })));
    assert!(env.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_missing_source_never_creates_staging() {
    let env = TestEnv::new();
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "nothing.mp4", "mp3").unwrap();

    let err = extractor.extract_bytes(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::SourceNotFound(_)));
    assert!(env.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_unusable_staging_root() {
    let mut env = TestEnv::new();
    env.put("videos", "clip.mp4", b"abc");
    let blocker = env.staging.path().join("occupied");
    std::fs::write(&blocker, b"not a directory").unwrap();
    env.config.staging_root = blocker;
    let extractor = env.extractor();
    let request = ExtractionRequest::new("videos", "clip.mp4", "mp3").unwrap();

    let err = extractor.extract_bytes(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::StagingUnavailable(_)));
}

#[test]
fn test_invalid_format_fails_before_any_io() {
    // No store, no filesystem: construction alone rejects the format.
    for format in ["ogg", "aac", "MP3", ""] {
        let err = ExtractionRequest::new("videos", "clip.mp4", format).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFormat(ref f) if f == format));
    }
}
