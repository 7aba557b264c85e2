//! Deterministic run fingerprint.

use crate::config::BacktestConfig;

/// BLAKE3 over the canonical JSON serialization of the config. Stable
/// across builds and platforms, so two runs with the same configuration
/// share an id.
pub fn config_fingerprint(config: &BacktestConfig) -> String {
    let canonical = serde_json::to_string(config).unwrap_or_default();
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}
