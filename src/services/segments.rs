use crate::services::error::PipelineError;
use crate::services::storage::StorageService;

/// Ordered object keys that together make up one video: the base key, then
/// `<key>.part2`, `<key>.part3`, ... up to the first missing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSet {
    keys: Vec<String>,
}

impl SegmentSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Never true; a set always holds at least the base object.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub fn part_key(object_path: &str, index: usize) -> String {
    format!("{}.part{}", object_path, index)
}

/// Probes `<object_path>.partN` for N = 2, 3, ... and stops at the first
/// absent part. A probe that errors (as opposed to reporting "not found")
/// aborts resolution so a flaky store cannot silently truncate the video.
pub async fn resolve_segments(
    storage: &dyn StorageService,
    bucket: &str,
    object_path: &str,
) -> Result<SegmentSet, PipelineError> {
    let mut keys = vec![object_path.to_string()];

    for index in 2.. {
        let key = part_key(object_path, index);
        let exists = storage.object_exists(bucket, &key).await.map_err(|e| {
            tracing::error!("Segment probe failed for {}/{}: {}", bucket, key, e);
            PipelineError::Storage(e.context(format!("probing segment {}", key)))
        })?;

        if !exists {
            break;
        }
        keys.push(key);
    }

    Ok(SegmentSet { keys })
}
