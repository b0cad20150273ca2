//! Device memory statistics reported after a fit.

use serde::{Deserialize, Serialize};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One allocator counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub peak: u64,
}

/// Counters split by allocator pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounters {
    #[serde(default)]
    pub small_pool: Counter,
    #[serde(default)]
    pub large_pool: Counter,
}

/// Subset of the CUDA caching-allocator statistics, as a nested map.
///
/// Devices without allocator statistics report an empty map, which reads as
/// all-zero counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMemory {
    #[serde(default)]
    pub reserved_bytes: PoolCounters,
}

impl DeviceMemory {
    /// Peak reserved memory over both pools, in GiB.
    pub fn peak_reserved_gb(&self) -> f64 {
        let bytes = self.reserved_bytes.small_pool.peak + self.reserved_bytes.large_pool.peak;
        bytes as f64 / BYTES_PER_GIB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_sums_both_pools() {
        let stats: DeviceMemory = serde_json::from_value(serde_json::json!({
            "reserved_bytes": {
                "all": {"current": 7, "peak": 9},
                "small_pool": {"current": 1, "peak": 512 * 1024 * 1024},
                "large_pool": {"current": 1, "peak": 3u64 * 1024 * 1024 * 1024}
            },
            "allocated_bytes": {"all": {"peak": 1}}
        }))
        .unwrap();
        assert_eq!(stats.peak_reserved_gb(), 3.5);
    }

    #[test]
    fn test_empty_stats_read_as_zero() {
        let stats: DeviceMemory = serde_json::from_str("{}").unwrap();
        assert_eq!(stats.peak_reserved_gb(), 0.0);
    }
}
