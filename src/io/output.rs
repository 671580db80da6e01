use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{PipelineError, Result};

/// File name prefix of every rendered document
pub const OUTPUT_PREFIX: &str = "all_products";

/// Timestamp layout used in output file names
const FILE_TIMESTAMP_FORMAT: &str = "%d_%m_%Y_%H_%M_%S";

/// Name of the document rendered at `at`, e.g. `all_products_05_03_2024_09_07_02.docx`
pub fn output_file_name(at: &NaiveDateTime) -> String {
    format!("{}_{}.docx", OUTPUT_PREFIX, at.format(FILE_TIMESTAMP_FORMAT))
}

/// Full path of the document rendered at `at` inside `output_dir`
pub fn output_path(output_dir: &Path, at: &NaiveDateTime) -> PathBuf {
    output_dir.join(output_file_name(at))
}

/// Write a rendered document, creating the parent directory if needed.
///
/// An existing file at `path` is replaced.
pub fn write_document(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_failed = |source: std::io::Error| PipelineError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_failed)?;
    }
    std::fs::write(path, bytes).map_err(write_failed)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn sample_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 7, 2)
            .unwrap()
    }

    #[test]
    fn test_output_file_name_is_zero_padded() {
        assert_eq!(
            output_file_name(&sample_time()),
            "all_products_05_03_2024_09_07_02.docx"
        );
    }

    #[test]
    fn test_write_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(&dir.path().join("output"), &sample_time());

        write_document(&path, b"first").unwrap();
        write_document(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = write_document(&blocker.join("out.docx"), b"x").unwrap_err();
        assert!(matches!(err, PipelineError::WriteFailed { .. }));
    }
}
