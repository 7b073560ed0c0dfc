//! Per-request upload storage.
//!
//! Each request gets its own uniquely named temporary file. The file lives
//! exactly as long as the `ScopedUpload` value: dropping it deletes the file
//! on every exit path, including errors and panics unwinding through the
//! blocking task.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// An uploaded image held in a private temporary file.
pub struct ScopedUpload {
    file: NamedTempFile,
    original_name: String,
}

impl ScopedUpload {
    /// Write `bytes` to a fresh temp file in `dir`.
    pub fn store(dir: &Path, original_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let suffix = extension_suffix(original_name);
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            file,
            original_name: original_name.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }
}

/// Keep a short alphanumeric extension from the client's file name for
/// readability in the upload dir. Decoding never relies on it.
fn extension_suffix(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_writes_bytes_and_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = ScopedUpload::store(dir.path(), "scan.PNG", b"image-bytes").unwrap();
        let path = upload.path().to_path_buf();

        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"image-bytes");
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(upload.original_name(), "scan.PNG");

        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_uploads_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScopedUpload::store(dir.path(), "image.jpg", b"first").unwrap();
        let b = ScopedUpload::store(dir.path(), "image.jpg", b"second").unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"first");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"second");
    }

    #[test]
    fn store_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads").join("today");
        let upload = ScopedUpload::store(&nested, "x.png", b"data").unwrap();
        assert!(upload.path().starts_with(&nested));
    }

    #[test]
    fn suspicious_extensions_are_dropped() {
        assert_eq!(extension_suffix("photo.jpeg"), ".jpeg");
        assert_eq!(extension_suffix("noext"), "");
        assert_eq!(extension_suffix("../../etc/passwd"), "");
        assert_eq!(extension_suffix("a.p/ng"), "");
        assert_eq!(extension_suffix("archive.verylongext"), "");
    }
}
