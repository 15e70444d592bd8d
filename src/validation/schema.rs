//! Shipped configuration schema.
//!
//! A versioned list of the Tarantool 3.x configuration paths checked by
//! [`crate::validation::validate`]. Regenerate it when the target schema changes.

use std::sync::OnceLock;

use crate::tree::Value;
use crate::validation::validators::*;
use crate::validation::SchemaPath;

/// Version of the database configuration schema this list follows.
pub const SCHEMA_VERSION: &str = "3.2";

fn any() -> Box<dyn Validator> {
    Box::new(AnyValidator)
}

fn string() -> Box<dyn Validator> {
    Box::new(StringValidator)
}

fn boolean() -> Box<dyn Validator> {
    Box::new(BooleanValidator)
}

fn integer() -> Box<dyn Validator> {
    Box::new(IntegerValidator)
}

fn number() -> Box<dyn Validator> {
    Box::new(NumberValidator)
}

fn one_of(values: &[&str]) -> Box<dyn Validator> {
    Box::new(AllowedValidator::new(
        string(),
        values.iter().map(|v| Value::from(*v)).collect(),
    ))
}

fn array(item: Box<dyn Validator>) -> Box<dyn Validator> {
    Box::new(ArrayValidator::new(item))
}

fn record(fields: Vec<(&str, Box<dyn Validator>)>) -> Box<dyn Validator> {
    Box::new(RecordValidator::new(fields))
}

fn map(value: Box<dyn Validator>) -> Box<dyn Validator> {
    Box::new(MapValidator::new(string(), value))
}

fn either(validators: Vec<Box<dyn Validator>>) -> Box<dyn Validator> {
    Box::new(SequenceValidator::new(validators))
}

fn uri_params() -> Box<dyn Validator> {
    record(vec![
        ("transport", one_of(&["plain", "ssl"])),
        ("ssl_ca_file", string()),
        ("ssl_cert_file", string()),
        ("ssl_key_file", string()),
        ("ssl_ciphers", string()),
        ("ssl_password", string()),
        ("ssl_password_file", string()),
    ])
}

fn peer() -> Box<dyn Validator> {
    record(vec![
        ("uri", string()),
        ("login", string()),
        ("password", string()),
        ("params", uri_params()),
    ])
}

fn privileges() -> Box<dyn Validator> {
    array(record(vec![
        ("permissions", array(string())),
        ("universe", boolean()),
        ("spaces", array(string())),
        ("functions", array(string())),
        ("sequences", array(string())),
        ("lua_eval", boolean()),
        ("lua_call", array(string())),
        ("sql", array(string())),
    ]))
}

fn build() -> Vec<SchemaPath> {
    let log_levels = [
        "fatal", "syserror", "error", "crit", "warn", "info", "verbose", "debug",
    ];

    vec![
        SchemaPath::new("app.file", string()),
        SchemaPath::new("app.module", string()),
        SchemaPath::new("app.cfg", map(any())),
        SchemaPath::new("config.reload", one_of(&["auto", "manual"])),
        SchemaPath::new("console.enabled", boolean()),
        SchemaPath::new("console.socket", string()),
        SchemaPath::new(
            "credentials.roles",
            map(record(vec![
                ("privileges", privileges()),
                ("roles", array(string())),
            ])),
        ),
        SchemaPath::new(
            "credentials.users",
            map(record(vec![
                (
                    "password",
                    either(vec![
                        string(),
                        record(vec![
                            ("plain", string()),
                            ("sha1", string()),
                            ("sha256", string()),
                        ]),
                    ]),
                ),
                ("privileges", privileges()),
                ("roles", array(string())),
            ])),
        ),
        SchemaPath::new("database.instance_uuid", string()),
        SchemaPath::new("database.replicaset_uuid", string()),
        SchemaPath::new("database.hot_standby", boolean()),
        SchemaPath::new("database.mode", one_of(&["ro", "rw"])),
        SchemaPath::new("database.txn_timeout", number()),
        SchemaPath::new(
            "database.txn_isolation",
            one_of(&["read-committed", "read-confirmed", "best-effort"]),
        ),
        SchemaPath::new("database.use_mvcc_engine", boolean()),
        SchemaPath::new("failover.call_timeout", number()),
        SchemaPath::new("failover.connect_timeout", number()),
        SchemaPath::new("failover.lease_interval", number()),
        SchemaPath::new("failover.probe_interval", number()),
        SchemaPath::new("failover.renew_interval", number()),
        SchemaPath::new("failover.stateboard.keepalive_interval", number()),
        SchemaPath::new("failover.stateboard.renew_interval", number()),
        SchemaPath::new("fiber.io_collect_interval", number()),
        SchemaPath::new("fiber.too_long_threshold", number()),
        SchemaPath::new("fiber.worker_pool_threads", integer()),
        SchemaPath::new("fiber.slice.err", number()),
        SchemaPath::new("fiber.slice.warn", number()),
        SchemaPath::new("iproto.advertise.client", string()),
        SchemaPath::new("iproto.advertise.peer", peer()),
        SchemaPath::new("iproto.advertise.sharding", peer()),
        SchemaPath::new(
            "iproto.listen",
            array(record(vec![("uri", string()), ("params", uri_params())])),
        ),
        SchemaPath::new("iproto.net_msg_max", integer()),
        SchemaPath::new("iproto.readahead", integer()),
        SchemaPath::new("iproto.threads", integer()),
        SchemaPath::new("isolated", boolean()),
        SchemaPath::new("labels", map(string())),
        SchemaPath::new("log.to", one_of(&["stderr", "file", "pipe", "syslog"])),
        SchemaPath::new("log.file", string()),
        SchemaPath::new("log.pipe", string()),
        SchemaPath::new("log.format", one_of(&["plain", "json"])),
        SchemaPath::new("log.level", either(vec![integer(), one_of(&log_levels)])),
        SchemaPath::new("log.modules", map(either(vec![integer(), one_of(&log_levels)]))),
        SchemaPath::new("log.nonblock", boolean()),
        SchemaPath::new("log.syslog.identity", string()),
        SchemaPath::new("log.syslog.facility", string()),
        SchemaPath::new("log.syslog.server", string()),
        SchemaPath::new("memtx.allocator", one_of(&["small", "system"])),
        SchemaPath::new("memtx.max_tuple_size", integer()),
        SchemaPath::new("memtx.memory", integer()),
        SchemaPath::new("memtx.min_tuple_size", integer()),
        SchemaPath::new("memtx.slab_alloc_factor", number()),
        SchemaPath::new("memtx.slab_alloc_granularity", integer()),
        SchemaPath::new("memtx.sort_threads", integer()),
        SchemaPath::new("process.background", boolean()),
        SchemaPath::new("process.coredump", boolean()),
        SchemaPath::new("process.pid_file", string()),
        SchemaPath::new("process.strip_core", boolean()),
        SchemaPath::new("process.title", string()),
        SchemaPath::new("process.username", string()),
        SchemaPath::new("process.work_dir", string()),
        SchemaPath::new("replication.anon", boolean()),
        SchemaPath::new(
            "replication.bootstrap_strategy",
            one_of(&["auto", "config", "supervised", "legacy", "native"]),
        ),
        SchemaPath::new("replication.connect_timeout", number()),
        SchemaPath::new(
            "replication.election_mode",
            one_of(&["off", "voter", "manual", "candidate"]),
        ),
        SchemaPath::new("replication.election_timeout", number()),
        SchemaPath::new(
            "replication.election_fencing_mode",
            one_of(&["off", "soft", "strict"]),
        ),
        SchemaPath::new(
            "replication.failover",
            one_of(&["off", "manual", "election", "supervised"]),
        ),
        SchemaPath::new("replication.peers", array(string())),
        SchemaPath::new("replication.skip_conflict", boolean()),
        SchemaPath::new("replication.sync_lag", number()),
        SchemaPath::new("replication.sync_timeout", number()),
        SchemaPath::new("replication.synchro_quorum", either(vec![integer(), string()])),
        SchemaPath::new("replication.synchro_timeout", number()),
        SchemaPath::new("replication.threads", integer()),
        SchemaPath::new("replication.timeout", number()),
        SchemaPath::new("roles", array(string())),
        SchemaPath::new("roles_cfg", map(any())),
        SchemaPath::new("security.auth_delay", number()),
        SchemaPath::new("security.auth_retries", integer()),
        SchemaPath::new("security.auth_type", one_of(&["chap-sha1", "pap-sha256"])),
        SchemaPath::new("security.disable_guest", boolean()),
        SchemaPath::new("security.password_enforce_digits", boolean()),
        SchemaPath::new("security.password_enforce_lowercase", boolean()),
        SchemaPath::new("security.password_enforce_specialchars", boolean()),
        SchemaPath::new("security.password_enforce_uppercase", boolean()),
        SchemaPath::new("security.password_history_length", integer()),
        SchemaPath::new("security.password_lifetime_days", integer()),
        SchemaPath::new("security.password_min_length", integer()),
        SchemaPath::new("security.secure_erasing", boolean()),
        SchemaPath::new("sharding.bucket_count", integer()),
        SchemaPath::new("sharding.discovery_mode", one_of(&["on", "off", "once"])),
        SchemaPath::new("sharding.failover_ping_timeout", number()),
        SchemaPath::new("sharding.lock", boolean()),
        SchemaPath::new("sharding.rebalancer_disbalance_threshold", number()),
        SchemaPath::new("sharding.rebalancer_max_receiving", integer()),
        SchemaPath::new("sharding.rebalancer_max_sending", integer()),
        SchemaPath::new(
            "sharding.rebalancer_mode",
            one_of(&["auto", "manual", "off"]),
        ),
        SchemaPath::new(
            "sharding.roles",
            array(one_of(&["router", "storage", "rebalancer"])),
        ),
        SchemaPath::new("sharding.sched_move_quota", integer()),
        SchemaPath::new("sharding.sched_ref_quota", integer()),
        SchemaPath::new("sharding.shard_index", string()),
        SchemaPath::new("sharding.sync_timeout", number()),
        SchemaPath::new("sharding.weight", number()),
        SchemaPath::new("sharding.zone", integer()),
        SchemaPath::new("snapshot.by.interval", number()),
        SchemaPath::new("snapshot.by.wal_size", integer()),
        SchemaPath::new("snapshot.count", integer()),
        SchemaPath::new("snapshot.dir", string()),
        SchemaPath::new("snapshot.snap_io_rate_limit", number()),
        SchemaPath::new("sql.cache_size", integer()),
        SchemaPath::new("vinyl.bloom_fpr", number()),
        SchemaPath::new("vinyl.cache", integer()),
        SchemaPath::new("vinyl.defer_deletes", boolean()),
        SchemaPath::new("vinyl.dir", string()),
        SchemaPath::new("vinyl.max_tuple_size", integer()),
        SchemaPath::new("vinyl.memory", integer()),
        SchemaPath::new("vinyl.page_size", integer()),
        SchemaPath::new("vinyl.range_size", integer()),
        SchemaPath::new("vinyl.read_threads", integer()),
        SchemaPath::new("vinyl.run_count_per_level", integer()),
        SchemaPath::new("vinyl.run_size_ratio", number()),
        SchemaPath::new("vinyl.timeout", number()),
        SchemaPath::new("vinyl.write_threads", integer()),
        SchemaPath::new("wal.cleanup_delay", number()),
        SchemaPath::new("wal.dir", string()),
        SchemaPath::new("wal.dir_rescan_delay", number()),
        SchemaPath::new("wal.max_size", integer()),
        SchemaPath::new("wal.mode", one_of(&["none", "write", "fsync"])),
        SchemaPath::new("wal.queue_max_size", integer()),
    ]
}

/// The shipped schema, built on first use.
pub fn tarantool_schema() -> &'static [SchemaPath] {
    static SCHEMA: OnceLock<Vec<SchemaPath>> = OnceLock::new();
    SCHEMA.get_or_init(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::PathConfig;
    use crate::validation::validate;

    #[test]
    fn test_paths_are_unique() {
        let schema = tarantool_schema();
        let mut paths: Vec<String> = schema.iter().map(|rule| rule.path.join(".")).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), schema.len());
    }

    #[test]
    fn test_valid_instance_config() {
        let config = PathConfig::from_yaml(
            br#"
wal:
  dir: /var/lib/tarantool/wal
  mode: fsync
iproto:
  listen:
    - uri: 127.0.0.1:3301
      params:
        transport: plain
credentials:
  users:
    admin:
      password: secret
      roles: [super]
    replicator:
      password:
        sha256: abc
      privileges:
        - permissions: [read, write]
          spaces: [bands]
log:
  level: 5
replication:
  failover: manual
  synchro_quorum: "N / 2 + 1"
"#,
        )
        .unwrap();
        assert!(validate(&config, tarantool_schema()).is_ok());
    }

    #[test]
    fn test_invalid_instance_config() {
        let config = PathConfig::from_yaml(
            br#"
wal:
  mode: sometimes
iproto:
  listen:
    - uri: 127.0.0.1:3301
      params:
        transport: carrier-pigeon
memtx:
  memory: a lot
"#,
        )
        .unwrap();

        let err = validate(&config, tarantool_schema()).unwrap_err();
        let paths: Vec<String> = err.leaves().into_iter().map(|(p, _)| p.join(".")).collect();
        assert_eq!(
            paths,
            vec!["iproto.listen.0.params.transport", "memtx.memory", "wal.mode"]
        );
    }
}
