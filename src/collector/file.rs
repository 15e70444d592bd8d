//! Local file backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::collector::{Data, DataCollector, DataPublisher, StorageError, StorageResult};
use crate::observability::metrics;

const BACKEND: &str = "file";

/// Reads a single file as one [`Data`] entry.
#[derive(Debug, Clone)]
pub struct FileDataCollector {
    path: PathBuf,
}

impl FileDataCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataCollector for FileDataCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let source = self.path.display().to_string();
        tracing::debug!(path = %source, "Collecting configuration file");

        let result = match tokio::fs::read(&self.path).await {
            Ok(value) if value.is_empty() => Err(StorageError::Empty { origin: source }),
            Ok(value) => Ok(vec![Data {
                source,
                value,
                revision: 0,
            }]),
            Err(e) => Err(StorageError::Io {
                path: source,
                source: e,
            }),
        };
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Replaces a file's content through a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct FileDataPublisher {
    path: PathBuf,
}

impl FileDataPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temporary_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!(".{name}.tmp"))
    }

    async fn write(&self, data: &[u8]) -> StorageResult<()> {
        let temporary = self.temporary_path();
        tokio::fs::write(&temporary, data)
            .await
            .map_err(|e| StorageError::Io {
                path: temporary.display().to_string(),
                source: e,
            })?;
        tokio::fs::rename(&temporary, &self.path)
            .await
            .map_err(|e| StorageError::Io {
                path: self.path.display().to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl DataPublisher for FileDataPublisher {
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        if revision != 0 {
            return Err(StorageError::RevisionUnsupported {
                target: self.path.display().to_string(),
            });
        }

        let result = self.write(data).await;
        metrics::record_publish(BACKEND, &result);
        if result.is_ok() {
            tracing::info!(path = %self.path.display(), bytes = data.len(), "Configuration file written");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.yaml");
        std::fs::write(&path, "wal:\n  dir: /tmp\n").unwrap();

        let data = FileDataCollector::new(&path).collect().await.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].source, path.display().to_string());
        assert_eq!(data[0].revision, 0);
    }

    #[tokio::test]
    async fn test_collect_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "").unwrap();

        let err = FileDataCollector::new(&path).collect().await.unwrap_err();
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn test_collect_missing_file() {
        let err = FileDataCollector::new("/definitely/not/here.yaml")
            .collect()
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[tokio::test]
    async fn test_publish_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.yaml");
        std::fs::write(&path, "old: 1\n").unwrap();

        FileDataPublisher::new(&path).publish(0, b"new: 2\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new: 2\n");
        assert!(!dir.path().join(".cluster.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn test_publish_with_revision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileDataPublisher::new(dir.path().join("c.yaml"))
            .publish(3, b"x: 1\n")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RevisionUnsupported { .. }));
    }
}
