//! Cohort function for percentage-based rollout gating
//!
//! Each device id maps to a stable bucket in [0, 100). A build with
//! `rollout_percent = p` is visible to exactly the devices whose bucket is
//! below `p`, so raising the percent only ever adds devices to the eligible
//! set and never removes one.

use crate::identity::DeviceId;
use sha2::{Digest, Sha256};

/// Map a device id to its stable cohort bucket in [0, 100).
///
/// SHA-256 of the raw id bytes, first 8 bytes interpreted as a big-endian
/// u64, reduced modulo 100. Deterministic, uniformly distributed, and
/// independent of any rollout state.
pub fn cohort(device_id: &DeviceId) -> u8 {
    let digest = Sha256::digest(device_id.as_str().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

/// Eligibility predicate: is `device_id` inside the rollout at `percent`?
///
/// Monotone in `percent`: for a fixed device, eligibility can only flip
/// false -> true as the percent rises.
pub fn eligible(device_id: &DeviceId, rollout_percent: u8) -> bool {
    cohort(device_id) < rollout_percent
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cohort_is_deterministic() {
        let id = DeviceId::new("abc123");
        let first = cohort(&id);
        for _ in 0..10 {
            assert_eq!(cohort(&id), first);
        }
    }

    #[test]
    fn test_cohort_in_range() {
        for i in 0..500 {
            let id = DeviceId::new(format!("device-{i}"));
            assert!(cohort(&id) < 100);
        }
    }

    #[test]
    fn test_percent_bounds() {
        let id = DeviceId::new("any-device");
        // 0 percent: nobody is eligible.
        assert!(!eligible(&id, 0));
        // 100 percent: everybody is eligible.
        assert!(eligible(&id, 100));
    }

    #[test]
    fn test_roughly_uniform_distribution() {
        // 10k synthetic ids across 100 buckets: each bucket should land
        // near 100. A wide tolerance keeps this robust while still catching
        // a broken reduction (e.g. modulo over a single byte).
        let mut buckets = [0u32; 100];
        for i in 0..10_000 {
            let id = DeviceId::new(format!("fleet-node-{i:05}"));
            buckets[cohort(&id) as usize] += 1;
        }
        for (bucket, count) in buckets.iter().enumerate() {
            assert!(
                (40..=200).contains(count),
                "bucket {bucket} has {count} devices, expected near 100"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_cohort_stable(id in "[a-zA-Z0-9:-]{1,64}") {
            let device = DeviceId::new(id);
            prop_assert_eq!(cohort(&device), cohort(&device));
        }

        #[test]
        fn prop_eligibility_is_monotone(id in "[a-zA-Z0-9:-]{1,64}", p1 in 0u8..=100, p2 in 0u8..=100) {
            let device = DeviceId::new(id);
            let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
            // eligible at lo implies eligible at hi
            prop_assert!(!eligible(&device, lo) || eligible(&device, hi));
        }
    }
}
