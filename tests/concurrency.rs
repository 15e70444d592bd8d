//! Optimistic concurrency of publishes against a shared keyspace.

use std::sync::Arc;
use std::time::Duration;

use cluster_config::collector::{
    CollectorFactory, Connection, DataCollector, DataPublisher, Location, PublisherFactory,
    StorageError,
};
use cluster_config::etcd::{
    EtcdAllDataPublisher, EtcdKeyCollector, EtcdKeyDataPublisher, IntegrityEtcdAllDataPublisher,
    KvClient, MemoryKv,
};
use cluster_config::storage::{MemoryStorage, StorageKeyDataPublisher};

mod common;
use common::InterferingKv;

#[tokio::test]
async fn test_concurrent_key_publishes_one_wins() {
    let kv = Arc::new(MemoryKv::new());
    kv.put("/tt/config/a", b"wal:\n  dir: base\n").await.unwrap();
    let revision = kv.get("/tt/config/a", false).await.unwrap()[0].mod_revision;

    let first = EtcdKeyDataPublisher::new(kv.clone(), common::PREFIX, "a", common::TIMEOUT);
    let second = EtcdKeyDataPublisher::new(kv.clone(), common::PREFIX, "a", common::TIMEOUT);

    let (r1, r2) = tokio::join!(
        first.publish(revision, b"wal:\n  dir: first\n"),
        second.publish(revision, b"wal:\n  dir: second\n"),
    );

    let winner: &[u8] = match (&r1, &r2) {
        (Ok(()), Err(e)) if e.is_wrong_revision() => b"wal:\n  dir: first\n",
        (Err(e), Ok(())) if e.is_wrong_revision() => b"wal:\n  dir: second\n",
        other => panic!("expected exactly one winner, got {:?}", other),
    };

    let data = EtcdKeyCollector::new(kv.clone(), common::PREFIX, "a", common::TIMEOUT)
        .collect()
        .await
        .unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].value, winner);
}

#[tokio::test]
async fn test_stale_revision_is_not_retried() {
    let storage = Arc::new(MemoryStorage::new());
    let publisher = StorageKeyDataPublisher::new(storage.clone(), common::PREFIX, "a", common::TIMEOUT);

    publisher.publish(0, b"v: 1\n").await.unwrap();
    publisher.publish(0, b"v: 2\n").await.unwrap();

    let err = publisher.publish(1, b"v: 3\n").await.unwrap_err();
    assert!(err.is_wrong_revision());
    assert!(err.to_string().contains("/tt/config/a"));
}

#[tokio::test]
async fn test_all_publish_retries_until_stale_keys_settle() {
    let kv = Arc::new(InterferingKv::new("/tt/config/b", 3));
    kv.put("/tt/config/a", b"a: 1\n").await.unwrap();
    kv.put("/tt/config/b", b"b: 1\n").await.unwrap();

    let publisher = EtcdAllDataPublisher::new(kv.clone(), common::PREFIX, common::TIMEOUT);
    publisher.publish(0, b"wal:\n  dir: all\n").await.unwrap();

    assert_eq!(kv.commits(), 4);
    assert_eq!(kv.inner.keys().unwrap(), vec!["/tt/config/all".to_string()]);
}

#[tokio::test]
async fn test_integrity_all_publish_retries_with_fresh_reads() {
    let kv = Arc::new(InterferingKv::new("/tt/sig/old", 2));
    kv.put("/tt/config/old", b"old: 1\n").await.unwrap();
    kv.put("/tt/hashes/sha256/old", b"h").await.unwrap();
    kv.put("/tt/sig/old", b"s").await.unwrap();

    let publisher = IntegrityEtcdAllDataPublisher::new(
        kv.clone(),
        common::PREFIX,
        common::TIMEOUT,
        common::sha256_signer(),
    );
    publisher.publish(0, b"wal:\n  dir: all\n").await.unwrap();

    assert_eq!(kv.commits(), 3);
    assert_eq!(
        kv.inner.keys().unwrap(),
        vec![
            "/tt/config/all".to_string(),
            "/tt/hashes/sha256/all".to_string(),
            "/tt/sig/all".to_string(),
        ]
    );

    let client: Arc<dyn KvClient> = kv.clone();
    let data = CollectorFactory::with_integrity(common::sha256_checker())
        .data_collector(
            &Connection::Etcd(client),
            &Location::new(common::PREFIX, "", common::TIMEOUT),
        )
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(data[0].value, b"wal:\n  dir: all\n");
}

#[tokio::test(start_paused = true)]
async fn test_all_publish_gives_up_at_deadline() {
    let kv = Arc::new(InterferingKv::forever("/tt/config/b", Duration::from_millis(100)));
    kv.inner.put("/tt/config/b", b"b: 1\n").await.unwrap();

    let publisher = EtcdAllDataPublisher::new(kv.clone(), common::PREFIX, Duration::from_secs(1));
    let err = publisher.publish(0, b"all: 1\n").await.unwrap_err();

    assert!(matches!(err, StorageError::Timeout { .. }), "got {:?}", err);
    assert!(kv.commits() >= 1);
    assert_eq!(
        kv.inner.keys().unwrap(),
        vec!["/tt/config/b".to_string()],
        "nothing is committed after the deadline"
    );
}

#[tokio::test]
async fn test_all_publish_rejects_revision() {
    let location = Location::new(common::PREFIX, "", common::TIMEOUT);
    let client: Arc<dyn KvClient> = Arc::new(MemoryKv::new());
    let publisher = PublisherFactory::new()
        .data_publisher(&Connection::Etcd(client), &location)
        .unwrap();

    let err = publisher.publish(5, b"all: 1\n").await.unwrap_err();
    assert!(matches!(err, StorageError::RevisionUnsupported { .. }));
}
