//! Key layout under a cluster prefix, shared by the network backends.
//!
//! ```text
//! <prefix>/config/<key>          configuration value ("all" for the whole document)
//! <prefix>/hashes/<alg>/<key>    one hash per algorithm
//! <prefix>/sig/<key>             signature
//! ```

/// Key of the whole-document value.
pub const ALL_KEY: &str = "all";

fn base(prefix: &str) -> &str {
    prefix.trim_end_matches('/')
}

pub fn config_prefix(prefix: &str) -> String {
    format!("{}/config/", base(prefix))
}

pub fn hashes_prefix(prefix: &str) -> String {
    format!("{}/hashes/", base(prefix))
}

pub fn sig_prefix(prefix: &str) -> String {
    format!("{}/sig/", base(prefix))
}

pub fn config_key(prefix: &str, key: &str) -> String {
    format!("{}{}", config_prefix(prefix), key)
}

pub fn hash_key(prefix: &str, algorithm: &str, key: &str) -> String {
    format!("{}{}/{}", hashes_prefix(prefix), algorithm, key)
}

pub fn sig_key(prefix: &str, key: &str) -> String {
    format!("{}{}", sig_prefix(prefix), key)
}

/// Name of the value stored at `key`, relative to the config namespace.
pub fn config_name<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(config_prefix(prefix).as_str())
}

/// Algorithm and value name of the hash stored at `key`.
pub fn hash_owner<'a>(prefix: &str, key: &'a str) -> Option<(&'a str, &'a str)> {
    key.strip_prefix(hashes_prefix(prefix).as_str())?.split_once('/')
}

/// Value name of the signature stored at `key`.
pub fn sig_owner<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(sig_prefix(prefix).as_str())
}
