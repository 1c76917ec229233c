// In: src/config.rs

//! The single source of truth for buffer pool configuration.
//!
//! This module defines `PoolConfig`, which is designed to be created once at
//! the application boundary (e.g., from a worker's TOML/JSON settings) and
//! handed to each `BufferPool`/`SharedPool` at construction time, instead of
//! scattering tuning knobs through the pooling code.

use serde::{Deserialize, Serialize};

/// Largest pooled power-of-two size class when none is configured: 64 KiB arrays.
pub const DEFAULT_MAX_SIZE_CLASS: u8 = 16;

/// Tuning knobs for a [`BufferPool`](crate::buffer::pool::BufferPool).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Largest power-of-two size class the pool will retain. Requests above
    /// `1 << max_size_class` bytes are satisfied with an exact-size allocation
    /// that is dropped on recycle rather than kept.
    pub max_size_class: u8,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size_class: DEFAULT_MAX_SIZE_CLASS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_serde() {
        let config = PoolConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: PoolConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: PoolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_size_class, DEFAULT_MAX_SIZE_CLASS);
    }
}
