//! Namespace key derivation.

/// Prefix of the key holding a namespace's version counter.
pub const CONTROL_KEY_PREFIX: &str = "__ns_";

/// Version a namespace starts at.
pub const INITIAL_VERSION: u64 = 1;

/// Key under which the version counter of `namespace` lives.
pub fn control_key(namespace: &str) -> String {
    format!("{}{}", CONTROL_KEY_PREFIX, namespace)
}

/// Backend key for `key` in `namespace` at `version`.
pub fn effective_key(namespace: &str, version: u64, key: &str) -> String {
    format!("__{}_{}_{}", namespace, version, key)
}

/// Parse a stored version counter. Only plain decimal digits are accepted.
pub fn parse_version(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}
