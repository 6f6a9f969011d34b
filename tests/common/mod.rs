#![allow(dead_code)]

use audio_extract_service::config::{AppConfig, StorageBackend};
use audio_extract_service::services::extraction::{AudioExtractor, DeliveryMode};
use audio_extract_service::services::storage::{LocalStorageService, StorageService};
use audio_extract_service::{AppState, create_app};
use axum::Router;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

/// Stand-in for ffmpeg.
///
/// concat mode: appends the manifest to `<staging_root>/concat.log` and
/// writes the listed files, in order, to the output path. Relative entries
/// resolve against the manifest's directory, as the real concat demuxer
/// does. A listed file starting with `badpart` fails the merge.
///
/// transcode mode: appends the input path to `<staging_root>/transcode.log`,
/// then by input content:
///   `corrupt...` exits 1 with no output,
///   `partial...` prints `partial-output` then exits 1,
///   `slow...`    records its pid in `<staging_root>/slow.pid`, then prints
///                `slowchunk` forever,
///   otherwise    prints `FAKE-<format>:` followed by the input bytes.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
input=""
fmt=""
out=""
prev=""
for arg in "$@"; do
  case "$prev" in
    -i) input="$arg" ;;
    -f) fmt="$arg" ;;
  esac
  prev="$arg"
  out="$arg"
done

if [ "$fmt" = "concat" ]; then
  cat "$input" >> "$(dirname "$(dirname "$out")")/concat.log"
  : > "$out"
  while IFS= read -r line; do
    path=${line#file \'}
    path=${path%\'}
    case "$path" in
      /*) ;;
      *) path="$(dirname "$input")/$path" ;;
    esac
    if [ "$(head -c 7 "$path")" = "badpart" ]; then
      echo "Impossible to open '$path'" >&2
      exit 1
    fi
    cat "$path" >> "$out"
  done < "$input"
  exit 0
fi

echo "$input" >> "$(dirname "$(dirname "$input")")/transcode.log"

case "$(head -c 7 "$input")" in
  corrupt)
    echo "Invalid data found when processing input" >&2
    exit 1
    ;;
  partial)
    printf 'partial-output'
    echo "Error while decoding stream #0:1" >&2
    exit 1
    ;;
esac

if [ "$(head -c 4 "$input")" = "slow" ]; then
  echo $$ > "$(dirname "$(dirname "$input")")/slow.pid"
  while :; do
    printf 'slowchunk'
    sleep 0.05
  done
fi

printf 'FAKE-%s:' "$fmt"
cat "$input"
"#;

static FAKE_FFMPEG_DIR: OnceLock<TempDir> = OnceLock::new();

/// Written once per test binary, before any test can spawn it.
pub fn fake_ffmpeg() -> PathBuf {
    let dir = FAKE_FFMPEG_DIR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, FAKE_FFMPEG).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    });
    dir.path().join("ffmpeg")
}

pub struct TestEnv {
    pub data: TempDir,
    pub staging: TempDir,
    pub config: AppConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let data = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();

        let config = AppConfig {
            storage_backend: StorageBackend::Local,
            minio_data_path: data.path().to_path_buf(),
            staging_root: staging.path().to_path_buf(),
            ffmpeg_path: fake_ffmpeg(),
            ..AppConfig::default()
        };

        Self {
            data,
            staging,
            config,
        }
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.config.delivery_mode = mode;
        self
    }

    pub fn put(&self, bucket: &str, key: &str, content: &[u8]) {
        let path = self.data.path().join(bucket).join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn storage(&self) -> Arc<dyn StorageService> {
        Arc::new(LocalStorageService::new(self.data.path()))
    }

    pub fn extractor(&self) -> AudioExtractor {
        AudioExtractor::new(self.storage(), &self.config)
    }

    pub fn app(&self) -> Router {
        create_app(AppState {
            extractor: Arc::new(self.extractor()),
            config: self.config.clone(),
        })
    }

    /// Staging directories currently on disk
    pub fn staging_dirs(&self) -> Vec<PathBuf> {
        staging_dirs_in(self.staging.path())
    }

    pub fn concat_log(&self) -> Option<String> {
        std::fs::read_to_string(self.staging.path().join("concat.log")).ok()
    }

    pub fn transcode_log(&self) -> Option<String> {
        std::fs::read_to_string(self.staging.path().join("transcode.log")).ok()
    }

    /// Pid of the endless transcoder, once it has started
    pub fn slow_pid(&self) -> Option<u32> {
        std::fs::read_to_string(self.staging.path().join("slow.pid"))
            .ok()
            .and_then(|pid| pid.trim().parse().ok())
    }
}

/// A zombie counts as exited: it has been killed but not yet reaped.
pub fn process_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .is_some_and(|state| state != 'Z' && state != 'X'),
        Err(_) => false,
    }
}

/// Polls for up to two seconds.
pub async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..100 {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    false
}

pub fn staging_dirs_in(root: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(root)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("audio-extract-"))
        })
        .collect()
}

pub fn fake_output(format: &str, input: &[u8]) -> Vec<u8> {
    let mut out = format!("FAKE-{}:", format).into_bytes();
    out.extend_from_slice(input);
    out
}
