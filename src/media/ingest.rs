/// Image ingestion
///
/// A batch of files is decoded and compressed concurrently; the caller
/// receives a single report once every file has finished, so a partial
/// batch is never persisted.
use std::path::{Path, PathBuf};

use super::codec::{compress_bytes, compress_data_url, CompressOptions};
use crate::error::{NoteVaultError, Result};

/// Outcome of one ingestion batch, in input order
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Compressed data URLs of the files that worked
    pub images: Vec<String>,
    /// `(file name, reason)` for files that were skipped
    pub failures: Vec<(String, String)>,
}

/// Whether a batch can go ahead or needs the user to accept large files
#[derive(Debug, Clone, PartialEq)]
pub enum Intake {
    Ready(Vec<PathBuf>),
    NeedsConfirmation { paths: Vec<PathBuf>, oversized: usize },
}

/// Check file sizes against the warning threshold.
///
/// Files whose size cannot be read are not counted as oversized; the
/// read failure is reported by ingestion itself.
pub fn plan_intake(paths: Vec<PathBuf>, threshold: u64) -> Intake {
    let oversized = paths
        .iter()
        .filter(|path| {
            std::fs::metadata(path)
                .map(|meta| meta.len() > threshold)
                .unwrap_or(false)
        })
        .count();

    if oversized > 0 {
        Intake::NeedsConfirmation { paths, oversized }
    } else {
        Intake::Ready(paths)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Read, decode and compress one file
pub fn ingest_file(path: &Path, opts: &CompressOptions) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| NoteVaultError::io(path, e))?;
    compress_bytes(&bytes, opts)
}

/// Ingest a batch concurrently and join on all of them
pub async fn ingest_files(paths: Vec<PathBuf>, opts: CompressOptions) -> IngestReport {
    let tasks = paths.into_iter().map(|path| async move {
        let label = file_label(&path);
        let outcome = tokio::task::spawn_blocking(move || ingest_file(&path, &opts))
            .await
            .map_err(|e| format!("Task join error: {}", e))
            .and_then(|result| result.map_err(|e| e.user_message()));
        (label, outcome)
    });

    let mut report = IngestReport::default();
    for (label, outcome) in futures::future::join_all(tasks).await {
        match outcome {
            Ok(data_url) => report.images.push(data_url),
            Err(reason) => {
                log::warn!("Skipping image {}: {}", label, reason);
                report.failures.push((label, reason));
            }
        }
    }

    log::info!(
        "Ingested {} images ({} failed)",
        report.images.len(),
        report.failures.len()
    );
    report
}

/// Re-encode stored images with `opts`, concurrently.
///
/// Takes and returns `(image id, data URL)` pairs in input order;
/// images that fail to re-encode are left out.
pub async fn shrink_images(images: Vec<(String, String)>, opts: CompressOptions) -> Vec<(String, String)> {
    let tasks = images.into_iter().map(|(id, url)| async move {
        let outcome = tokio::task::spawn_blocking(move || compress_data_url(&url, &opts))
            .await
            .map_err(|e| format!("Task join error: {}", e))
            .and_then(|result| result.map_err(|e| e.user_message()));
        (id, outcome)
    });

    let mut smaller = Vec::new();
    for (id, outcome) in futures::future::join_all(tasks).await {
        match outcome {
            Ok(url) => smaller.push((id, url)),
            Err(reason) => log::warn!("Could not shrink image {}: {}", id, reason),
        }
    }
    smaller
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::codec::{decode_data_url, natural_size, tests::png_data_url};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let (_, bytes) = decode_data_url(&png_data_url(width, height)).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn opts() -> CompressOptions {
        CompressOptions {
            max_width: 50,
            max_height: 50,
            quality: 80,
        }
    }

    #[test]
    fn test_plan_intake_flags_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_png(dir.path(), "small.png", 4, 4);
        let big = dir.path().join("big.bin");
        std::fs::write(&big, vec![0u8; 2048]).unwrap();

        assert_eq!(
            plan_intake(vec![small.clone()], 1024),
            Intake::Ready(vec![small.clone()])
        );
        match plan_intake(vec![small, big], 1024) {
            Intake::NeedsConfirmation { paths, oversized } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(oversized, 1);
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ingest_skips_failures_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_png(dir.path(), "a.png", 200, 100);
        let broken = dir.path().join("b.png");
        std::fs::write(&broken, b"not a png").unwrap();
        let missing = dir.path().join("missing.png");
        let last = write_png(dir.path(), "c.png", 10, 20);

        let report = ingest_files(vec![first, broken, missing, last], opts()).await;

        assert_eq!(report.images.len(), 2);
        assert_eq!(natural_size(&report.images[0]).unwrap(), (50, 25));
        assert_eq!(natural_size(&report.images[1]).unwrap(), (10, 20));
        let failed: Vec<_> = report.failures.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(failed, vec!["b.png", "missing.png"]);
    }

    #[tokio::test]
    async fn test_shrink_images_skips_unreadable() {
        let images = vec![
            ("a".to_string(), png_data_url(200, 100)),
            ("b".to_string(), "data:broken".to_string()),
            ("c".to_string(), png_data_url(30, 60)),
        ];

        let smaller = shrink_images(images, opts()).await;

        let ids: Vec<_> = smaller.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(natural_size(&smaller[0].1).unwrap(), (50, 25));
        assert_eq!(natural_size(&smaller[1].1).unwrap(), (25, 50));
    }
}
