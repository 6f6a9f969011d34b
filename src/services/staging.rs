use crate::services::error::PipelineError;
use crate::services::storage::{StorageError, StorageService};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Request-scoped working directory for downloaded segments and the merged
/// container.
///
/// [`StagingArea::close`] removes every tracked file, then the directory.
/// If the area is dropped instead (client disconnect, or `close` itself being
/// cancelled), the `TempDir` removes the directory and its contents.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl StagingArea {
    /// Creates `audio-extract-XXXXXX` under `root`. The root is canonicalized
    /// so every path handed out is absolute.
    pub async fn open(root: &Path) -> Result<Self, PipelineError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(PipelineError::StagingUnavailable)?;
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(PipelineError::StagingUnavailable)?;

        let dir = tempfile::Builder::new()
            .prefix("audio-extract-")
            .tempdir_in(&root)
            .map_err(PipelineError::StagingUnavailable)?;

        tracing::debug!("Staging area created: {}", dir.path().display());
        Ok(Self {
            dir,
            files: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserves `name` inside the area and registers it for cleanup before
    /// anything is written there.
    pub fn track(&mut self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        self.files.push(path.clone());
        path
    }

    /// Downloads one segment into the area. `index` keeps local names in
    /// discovery order.
    pub async fn download(
        &mut self,
        storage: &dyn StorageService,
        bucket: &str,
        key: &str,
        index: usize,
    ) -> Result<PathBuf, PipelineError> {
        let local = self.track(&format!("segment_{:03}{}", index, extension_of(key)));

        match storage.download_to(bucket, key, &local).await {
            Ok(bytes) => {
                tracing::info!("📥 Downloaded {}/{} ({} bytes)", bucket, key, bytes);
                Ok(local)
            }
            Err(StorageError::NotFound(_)) => {
                tracing::error!("Segment disappeared before download: {}/{}", bucket, key);
                Err(PipelineError::SegmentNotFound(key.to_string()))
            }
            Err(StorageError::Other(e)) => Err(PipelineError::Storage(e)),
        }
    }

    /// Removes every tracked file, then the directory. Failures are logged
    /// and never returned.
    pub async fn close(self) {
        for file in &self.files {
            if let Err(e) = tokio::fs::remove_file(file).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove staged file {}: {}", file.display(), e);
                }
            }
        }

        let StagingArea { dir, .. } = self;
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!("Staging area removed: {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove staging area {}: {}", path.display(), e),
        }
    }
}

/// `.mp4` for `clips/a.mp4` and `clips/a.mp4.part2`; empty when the key has none
fn extension_of(key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    let base = match name.rfind(".part") {
        Some(idx) if name[idx + 5..].chars().all(|c| c.is_ascii_digit()) && idx + 5 < name.len() => {
            &name[..idx]
        }
        _ => name,
    };

    Path::new(base)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
