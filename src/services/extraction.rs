use crate::config::AppConfig;
use crate::services::audio_format::AudioFormat;
use crate::services::error::PipelineError;
use crate::services::merger::Merger;
use crate::services::segments::{SegmentSet, resolve_segments};
use crate::services::staging::StagingArea;
use crate::services::storage::StorageService;
use crate::services::transcoder::{TranscodeJob, TranscodeProcess, Transcoder};
use crate::utils::validation::{validate_bucket_name, validate_object_key};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

/// Transcoder output delivered chunk by chunk, in order. Finite and not
/// restartable.
pub type AudioStream = BoxStream<'static, Result<Bytes, PipelineError>>;

/// How the audio reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Forward chunks as ffmpeg produces them
    Stream,
    /// Accumulate the whole output, then respond once
    Buffer,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" | "streaming" => Ok(Self::Stream),
            "buffer" | "buffered" | "whole" => Ok(Self::Buffer),
            other => Err(format!("unknown delivery mode '{}'", other)),
        }
    }
}

/// A validated extraction request. The format is checked before any store
/// or filesystem access happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub bucket_name: String,
    pub object_path: String,
    pub audio_format: AudioFormat,
}

impl ExtractionRequest {
    pub fn new(
        bucket_name: impl Into<String>,
        object_path: impl Into<String>,
        audio_format: &str,
    ) -> Result<Self, PipelineError> {
        let audio_format: AudioFormat = audio_format.parse()?;
        let bucket_name = bucket_name.into();
        let object_path = object_path.into();

        validate_bucket_name(&bucket_name).map_err(|e| PipelineError::InvalidPath(e.to_string()))?;
        validate_object_key(&object_path).map_err(|e| PipelineError::InvalidPath(e.to_string()))?;

        Ok(Self {
            bucket_name,
            object_path,
            audio_format,
        })
    }
}

/// Runs the download → merge → transcode pipeline for one request at a time
/// per call; calls share nothing but the store client.
pub struct AudioExtractor {
    storage: Arc<dyn StorageService>,
    merger: Merger,
    transcoder: Transcoder,
    staging_root: PathBuf,
    stream_chunk_size: usize,
    buffer_chunk_size: usize,
}

impl AudioExtractor {
    pub fn new(storage: Arc<dyn StorageService>, config: &AppConfig) -> Self {
        Self {
            storage,
            merger: Merger::new(&config.ffmpeg_path),
            transcoder: Transcoder::new(&config.ffmpeg_path),
            staging_root: config.staging_root.clone(),
            stream_chunk_size: config.stream_chunk_size.max(1),
            buffer_chunk_size: config.buffer_chunk_size.max(1),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    /// Whole-buffer mode. The staging area is gone by the time this returns,
    /// whatever the outcome.
    pub async fn extract_bytes(&self, request: &ExtractionRequest) -> Result<Bytes, PipelineError> {
        let (staging, input) = self.prepare(request).await?;

        let job = TranscodeJob::new(input, request.audio_format);
        let result = match self.transcoder.spawn(&job) {
            Ok(process) => process.collect(self.buffer_chunk_size).await,
            Err(e) => Err(e),
        };
        staging.close().await;

        let audio = result?;
        info!(
            "✅ Audio extraction complete, size: {:.2} MB",
            audio.len() as f64 / (1024.0 * 1024.0)
        );
        Ok(audio)
    }

    /// Streaming mode. The first chunk is read before returning, so a
    /// transcoder that fails without producing output surfaces here as an
    /// error instead of as an empty 200. Later failures end the stream with
    /// an `Err` item.
    ///
    /// The returned stream owns the staging area and the ffmpeg child;
    /// dropping it early kills ffmpeg and removes the staged files.
    pub async fn extract_stream(&self, request: &ExtractionRequest) -> Result<AudioStream, PipelineError> {
        let (staging, input) = self.prepare(request).await?;

        let job = TranscodeJob::new(input, request.audio_format);
        let process = match self.transcoder.spawn(&job) {
            Ok(process) => process,
            Err(e) => {
                staging.close().await;
                return Err(e);
            }
        };

        let mut output = stream_output(process, staging, self.stream_chunk_size);
        match output.next().await {
            Some(Ok(first)) => Ok(stream::once(async move { Ok(first) }).chain(output).boxed()),
            Some(Err(e)) => Err(e),
            None => Ok(stream::empty().boxed()),
        }
    }

    pub async fn extract(
        &self,
        request: &ExtractionRequest,
        mode: DeliveryMode,
    ) -> Result<AudioPayload, PipelineError> {
        match mode {
            DeliveryMode::Stream => self.extract_stream(request).await.map(AudioPayload::Stream),
            DeliveryMode::Buffer => self.extract_bytes(request).await.map(AudioPayload::Buffer),
        }
    }

    /// Everything upstream of the transcoder: source check, segment
    /// resolution, download and merge. On error the staging area has
    /// already been closed.
    async fn prepare(&self, request: &ExtractionRequest) -> Result<(StagingArea, PathBuf), PipelineError> {
        let bucket = request.bucket_name.as_str();
        let key = request.object_path.as_str();
        info!("🎬 Video path resolved: {}/{}", bucket, key);

        if !self.storage.object_exists(bucket, key).await? {
            error!("Video file not found: {}/{}", bucket, key);
            return Err(PipelineError::SourceNotFound(key.to_string()));
        }

        let segments = resolve_segments(self.storage.as_ref(), bucket, key).await?;
        info!("📦 Found {} segment(s) for {}", segments.len(), key);

        let mut staging = StagingArea::open(&self.staging_root).await?;
        match self.stage(&mut staging, bucket, &segments).await {
            Ok(input) => Ok((staging, input)),
            Err(e) => {
                staging.close().await;
                Err(e)
            }
        }
    }

    async fn stage(
        &self,
        staging: &mut StagingArea,
        bucket: &str,
        segments: &SegmentSet,
    ) -> Result<PathBuf, PipelineError> {
        let mut local = Vec::with_capacity(segments.len());
        for (index, key) in segments.keys().iter().enumerate() {
            let path = staging
                .download(self.storage.as_ref(), bucket, key, index + 1)
                .await?;
            local.push(path);
        }

        match local.as_slice() {
            [single] => Ok(single.clone()),
            _ => self.merger.merge(staging, &local).await,
        }
    }
}

/// Either the complete output or a lazy sequence of chunks
pub enum AudioPayload {
    Buffer(Bytes),
    Stream(AudioStream),
}

impl std::fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioPayload::Buffer(bytes) => f.debug_tuple("Buffer").field(&bytes.len()).finish(),
            AudioPayload::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

fn stream_output(process: TranscodeProcess, staging: StagingArea, chunk_size: usize) -> AudioStream {
    async_stream::stream! {
        // Declared before the child so that on drop ffmpeg is killed first,
        // then the staged files go.
        let staging = staging;
        let mut process = process;
        let mut sent = 0usize;

        loop {
            match process.next_chunk(chunk_size).await {
                Ok(Some(chunk)) => {
                    sent += chunk.len();
                    yield Ok(chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed reading ffmpeg output after {} bytes: {}", sent, e);
                    drop(process);
                    staging.close().await;
                    yield Err(e);
                    return;
                }
            }
        }

        let outcome = process.finish().await;
        staging.close().await;
        match outcome {
            Ok(()) => info!(
                "✅ Audio stream finished sending, size: {:.2} MB",
                sent as f64 / (1024.0 * 1024.0)
            ),
            Err(e) => {
                error!("Transcode failed after {} bytes were produced: {}", sent, e);
                yield Err(e);
            }
        }
    }
    .boxed()
}
