//! YAML decoding and encoding decorators.

use async_trait::async_trait;

use crate::collector::{
    Collector, ConfigPublisher, DataCollector, DataPublisher, StorageError, StorageResult,
};
use crate::tree::{PathConfig, Value};

/// Decode a document whose root must be a map. Empty and null documents are empty trees.
fn decode(origin: &str, data: &[u8]) -> StorageResult<PathConfig> {
    let config = PathConfig::from_yaml(data).map_err(|e| StorageError::Decode {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    match config.root() {
        Value::Mapping(_) => Ok(config),
        other => Err(StorageError::Decode {
            origin: origin.to_string(),
            message: format!("expected a map at the document root, got {}", other.type_name()),
        }),
    }
}

/// Collects a tree from in-memory YAML bytes.
#[derive(Debug, Clone)]
pub struct YamlCollector {
    data: Vec<u8>,
}

impl YamlCollector {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl Collector for YamlCollector {
    async fn collect(&self) -> StorageResult<PathConfig> {
        decode("yaml", &self.data)
    }
}

/// Decodes every [`crate::collector::Data`] of a raw collector and merges them.
///
/// Entries are ordered by source; for any path, the first entry defining it wins.
pub struct YamlDataMergeCollector {
    collector: Box<dyn DataCollector>,
}

impl YamlDataMergeCollector {
    pub fn new(collector: Box<dyn DataCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Collector for YamlDataMergeCollector {
    async fn collect(&self) -> StorageResult<PathConfig> {
        let mut data = self.collector.collect().await?;
        if data.is_empty() {
            return Err(StorageError::Empty {
                origin: "collected data".to_string(),
            });
        }
        data.sort_by(|a, b| a.source.cmp(&b.source));

        let mut config = PathConfig::new();
        for entry in &data {
            let decoded = decode(&entry.source, &entry.value)?;
            config.merge(&decoded);
        }
        Ok(config)
    }
}

/// Encodes a tree as YAML and hands it to a raw publisher unconditionally.
pub struct YamlConfigPublisher {
    publisher: Box<dyn DataPublisher>,
}

impl YamlConfigPublisher {
    pub fn new(publisher: Box<dyn DataPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ConfigPublisher for YamlConfigPublisher {
    async fn publish(&self, config: &PathConfig) -> StorageResult<()> {
        let yaml = config.to_yaml().map_err(|e| StorageError::Decode {
            origin: "configuration".to_string(),
            message: e.to_string(),
        })?;
        self.publisher.publish(0, yaml.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::collector::Data;

    struct StaticCollector(Vec<Data>);

    #[async_trait]
    impl DataCollector for StaticCollector {
        async fn collect(&self) -> StorageResult<Vec<Data>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default, Clone)]
    struct RecordingPublisher(Arc<Mutex<Vec<(i64, Vec<u8>)>>>);

    #[async_trait]
    impl DataPublisher for RecordingPublisher {
        async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
            self.0.lock().unwrap().push((revision, data.to_vec()));
            Ok(())
        }
    }

    fn data(source: &str, value: &str) -> Data {
        Data {
            source: source.to_string(),
            value: value.as_bytes().to_vec(),
            revision: 1,
        }
    }

    #[tokio::test]
    async fn test_yaml_collector() {
        let config = YamlCollector::new("wal:\n  dir: /tmp\n").collect().await.unwrap();
        assert_eq!(config.get(&["wal", "dir"]).unwrap(), &Value::from("/tmp"));
    }

    #[tokio::test]
    async fn test_yaml_collector_reports_decode_error() {
        let err = YamlCollector::new("a: [").collect().await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_merge_order_is_by_source() {
        let collector = YamlDataMergeCollector::new(Box::new(StaticCollector(vec![
            data("/tt/config/b", "x: from-b\ny: from-b\n"),
            data("/tt/config/a", "x: from-a\n"),
        ])));

        let config = collector.collect().await.unwrap();
        assert_eq!(config.get(&["x"]).unwrap(), &Value::from("from-a"));
        assert_eq!(config.get(&["y"]).unwrap(), &Value::from("from-b"));
    }

    #[tokio::test]
    async fn test_merge_names_broken_source() {
        let collector = YamlDataMergeCollector::new(Box::new(StaticCollector(vec![data(
            "/tt/config/broken",
            "a: [",
        )])));
        let err = collector.collect().await.unwrap_err();
        assert!(err.to_string().contains("/tt/config/broken"));
    }

    #[tokio::test]
    async fn test_merge_rejects_scalar_root() {
        let collector = YamlDataMergeCollector::new(Box::new(StaticCollector(vec![
            data("/tt/config/a", "wal:\n  dir: x\n"),
            data("/tt/config/b", "just a scalar\n"),
        ])));
        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { ref origin, .. } if origin == "/tt/config/b"));
    }

    #[tokio::test]
    async fn test_merge_rejects_sequence_root() {
        let collector = YamlDataMergeCollector::new(Box::new(StaticCollector(vec![
            data("/tt/config/a", "wal:\n  dir: x\n"),
            data("/tt/config/c", "- 1\n- 2\n"),
        ])));
        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { ref origin, .. } if origin == "/tt/config/c"));
        assert!(err.to_string().contains("expected a map"));
    }

    #[tokio::test]
    async fn test_null_document_is_empty_tree() {
        let collector = YamlDataMergeCollector::new(Box::new(StaticCollector(vec![
            data("/tt/config/a", "wal:\n  dir: x\n"),
            data("/tt/config/b", "~\n"),
        ])));
        let config = collector.collect().await.unwrap();
        assert_eq!(config.get(&["wal", "dir"]).unwrap(), &Value::from("x"));
    }

    #[tokio::test]
    async fn test_yaml_collector_rejects_scalar_root() {
        let err = YamlCollector::new("42\n").collect().await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_merge_of_nothing_is_empty() {
        let collector = YamlDataMergeCollector::new(Box::new(StaticCollector(vec![])));
        assert!(collector.collect().await.unwrap_err().is_empty());
    }

    #[tokio::test]
    async fn test_publisher_encodes_unconditionally() {
        let recorder = RecordingPublisher::default();
        let publisher = YamlConfigPublisher::new(Box::new(recorder.clone()));
        let mut config = PathConfig::new();
        config.set(&["wal", "dir"], "/tmp").unwrap();

        publisher.publish(&config).await.unwrap();

        let published = recorder.0.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, 0);
        assert_eq!(
            PathConfig::from_yaml(&published[0].1).unwrap(),
            config
        );
    }
}
