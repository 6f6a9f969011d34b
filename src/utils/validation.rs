use std::borrow::Cow;
use std::path::{Component, Path};
use validator::ValidationError;

fn invalid(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

/// Object keys must be relative and must not climb out of their bucket,
/// since the local backend maps them straight onto the filesystem.
pub fn validate_object_key(key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(invalid("EMPTY_PATH", "video_path must not be empty".to_string()));
    }

    if key.contains('\0') {
        return Err(invalid("INVALID_PATH", "video_path contains a NUL byte".to_string()));
    }

    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(invalid(
                    "PATH_TRAVERSAL",
                    format!("video_path '{}' must not contain '..'", key),
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(
                    "ABSOLUTE_PATH",
                    format!("video_path '{}' must be relative to the bucket", key),
                ));
            }
        }
    }

    Ok(())
}

/// Bucket names are a single path segment.
pub fn validate_bucket_name(bucket: &str) -> Result<(), ValidationError> {
    if bucket.trim().is_empty() {
        return Err(invalid("EMPTY_BUCKET", "bucket_name must not be empty".to_string()));
    }

    if bucket == "." || bucket == ".." || bucket.contains(['/', '\\', '\0']) {
        return Err(invalid(
            "INVALID_BUCKET",
            format!("bucket_name '{}' is not a valid bucket", bucket),
        ));
    }

    Ok(())
}
