//! Placement Selector
//!
//! Chooses the aggregate with the most free capacity for a new share.
//! Selection is capacity-only; ties go to the aggregate listed first by the
//! controller so repeated placement under identical conditions is stable.

use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Aggregate name to free capacity in bytes, in controller order
pub type PoolCapacities = IndexMap<String, u64>;

/// Pick the aggregate with the maximum free capacity
pub fn select_pool(pools: &PoolCapacities, vserver: &str) -> Result<String> {
    let mut best: Option<(&String, u64)> = None;
    for (name, &free) in pools {
        match best {
            Some((_, best_free)) if free <= best_free => {}
            _ => best = Some((name, free)),
        }
    }
    best.map(|(name, _)| name.clone())
        .ok_or_else(|| Error::NoPoolsAvailable {
            vserver: vserver.to_string(),
        })
}

/// Free capacity left after holding back `reserved_percentage` percent
pub fn usable_capacity(free: u64, reserved_percentage: u8) -> u64 {
    let reserved = u128::from(free) * u128::from(reserved_percentage.min(100)) / 100;
    free - reserved as u64
}

/// Apply the reserved percentage to every aggregate of a capacity table
pub fn apply_reserve(pools: &PoolCapacities, reserved_percentage: u8) -> PoolCapacities {
    pools
        .iter()
        .map(|(name, &free)| (name.clone(), usable_capacity(free, reserved_percentage)))
        .collect()
}

/// Multiplier resolution used for sizing, in parts per million
const MULTIPLIER_SCALE: u128 = 1_000_000;

/// Container size in GiB for a requested share size
///
/// The multiplier is rounded to six decimals and applied in integer
/// arithmetic, so `100 × 1.1` is exactly 110.
pub fn container_size_gb(share_size: u64, multiplier: f64) -> u64 {
    if multiplier <= 1.0 {
        return share_size;
    }
    let scaled = (multiplier * MULTIPLIER_SCALE as f64).round() as u128;
    let size = (u128::from(share_size) * scaled).div_ceil(MULTIPLIER_SCALE);
    u64::try_from(size).unwrap_or(u64::MAX)
}
