//! Configuration from environment variables.

use async_trait::async_trait;

use crate::collector::{Collector, StorageError, StorageResult};
use crate::tree::PathConfig;

/// Scalar configuration paths that may be set from the environment.
pub const ENV_PATHS: &[&str] = &[
    "app.file",
    "app.module",
    "config.reload",
    "console.enabled",
    "console.socket",
    "database.hot_standby",
    "database.instance_uuid",
    "database.mode",
    "database.replicaset_uuid",
    "database.txn_isolation",
    "database.txn_timeout",
    "database.use_mvcc_engine",
    "failover.call_timeout",
    "failover.connect_timeout",
    "failover.lease_interval",
    "failover.probe_interval",
    "failover.renew_interval",
    "fiber.io_collect_interval",
    "fiber.too_long_threshold",
    "fiber.worker_pool_threads",
    "iproto.advertise.client",
    "iproto.net_msg_max",
    "iproto.readahead",
    "iproto.threads",
    "isolated",
    "log.file",
    "log.format",
    "log.level",
    "log.nonblock",
    "log.pipe",
    "log.to",
    "memtx.allocator",
    "memtx.max_tuple_size",
    "memtx.memory",
    "memtx.min_tuple_size",
    "memtx.slab_alloc_factor",
    "memtx.sort_threads",
    "process.background",
    "process.coredump",
    "process.pid_file",
    "process.strip_core",
    "process.title",
    "process.username",
    "process.work_dir",
    "replication.anon",
    "replication.bootstrap_strategy",
    "replication.connect_timeout",
    "replication.election_mode",
    "replication.election_timeout",
    "replication.failover",
    "replication.sync_lag",
    "replication.sync_timeout",
    "replication.synchro_quorum",
    "replication.synchro_timeout",
    "replication.timeout",
    "security.auth_type",
    "security.disable_guest",
    "sharding.bucket_count",
    "sharding.weight",
    "snapshot.by.interval",
    "snapshot.by.wal_size",
    "snapshot.count",
    "snapshot.dir",
    "sql.cache_size",
    "vinyl.cache",
    "vinyl.dir",
    "vinyl.memory",
    "vinyl.read_threads",
    "vinyl.write_threads",
    "wal.cleanup_delay",
    "wal.dir",
    "wal.max_size",
    "wal.mode",
];

/// Maps a configuration path to an environment variable name.
pub type EnvFormatter = Box<dyn Fn(&[&str]) -> String + Send + Sync>;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// `TT_` style names: `prefix` followed by the upper-cased path joined with `_`.
pub fn default_formatter(prefix: impl Into<String>) -> EnvFormatter {
    let prefix = prefix.into();
    Box::new(move |path: &[&str]| format!("{}{}", prefix, path.join("_").to_uppercase()))
}

/// Builds a tree from the variables present in the environment.
///
/// Values are stored as strings; the schema validators coerce them later.
pub struct EnvCollector {
    formatter: EnvFormatter,
    lookup: Lookup,
}

impl EnvCollector {
    pub fn new(formatter: EnvFormatter) -> Self {
        Self::with_lookup(formatter, |name| std::env::var(name).ok())
    }

    /// Use `lookup` instead of the process environment.
    pub fn with_lookup<F>(formatter: EnvFormatter, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            formatter,
            lookup: Box::new(lookup),
        }
    }
}

#[async_trait]
impl Collector for EnvCollector {
    async fn collect(&self) -> StorageResult<PathConfig> {
        let mut config = PathConfig::new();
        for dotted in ENV_PATHS {
            let path: Vec<&str> = dotted.split('.').collect();
            let name = (self.formatter)(&path);
            let Some(value) = (self.lookup)(&name) else {
                continue;
            };
            tracing::debug!(variable = %name, path = %dotted, "Configuration from environment");
            config
                .set(path.as_slice(), value)
                .map_err(|e| StorageError::Decode {
                    origin: name.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(config)
    }
}
