// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! HIP (Historical Inverse Probability) estimator for dense HLL arrays.
//!
//! The HIP estimator maintains an accumulator that tracks the historical
//! sequence of register updates and is the most accurate estimator while
//! the sketch only receives in-order updates. Once a merge or a
//! deserialized register array makes the history unknown, estimation
//! falls back to the composite estimator built from the KxQ sums.

use crate::hll::harmonic;

// RSE factors for dense estimates: sqrt(ln 2) while HIP is valid,
// sqrt(3 ln 2 - 1) for the composite estimator.
const HIP_RSE_FACTOR: f64 = 0.832_554_611_157_697_8;
const NON_HIP_RSE_FACTOR: f64 = 1.039_846_609_621_545;

/// HIP estimator with KxQ registers.
///
/// This struct encapsulates all estimation-related state and logic,
/// allowing it to be composed into the three dense register arrays.
#[derive(Debug, Clone)]
pub struct HipEstimator {
    /// HIP estimator accumulator
    hip_accum: f64,
    /// KxQ register for values < 32
    kxq0: f64,
    /// KxQ register for values >= 32
    kxq1: f64,
    /// Out-of-order flag: when true, HIP updates are skipped
    out_of_order: bool,
}

impl PartialEq for HipEstimator {
    fn eq(&self, other: &Self) -> bool {
        // f64 state is bit-identical after a binary round trip.
        self.hip_accum == other.hip_accum
            && self.kxq0 == other.kxq0
            && self.kxq1 == other.kxq1
            && self.out_of_order == other.out_of_order
    }
}

impl HipEstimator {
    /// Create a new HIP estimator for a sketch with 2^lg_config_k registers.
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1u64 << lg_config_k;
        Self {
            hip_accum: 0.0,
            // All registers start at 0, so kxq0 = k * (1/2^0) = k.
            kxq0: k as f64,
            kxq1: 0.0,
            out_of_order: false,
        }
    }

    /// Update the estimator when a register changes from old_value to new_value.
    ///
    /// Must be called BEFORE the register array itself is rewritten: the
    /// HIP increment uses the pre-update KxQ sums.
    pub fn update(&mut self, lg_config_k: u8, old_value: u8, new_value: u8) {
        let k = (1u64 << lg_config_k) as f64;

        if !self.out_of_order {
            self.hip_accum += k / (self.kxq0 + self.kxq1);
        }

        // KxQ stays maintained regardless of the out-of-order flag.
        self.update_kxq(old_value, new_value);
    }

    fn update_kxq(&mut self, old_value: u8, new_value: u8) {
        if old_value < 32 {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }

        if new_value < 32 {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// Get the current cardinality estimate.
    ///
    /// Dispatches to either HIP or the composite estimator based on the
    /// out-of-order flag.
    pub fn estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        if self.out_of_order {
            self.composite_estimate(lg_config_k, cur_min, num_at_cur_min)
        } else {
            self.hip_accum
        }
    }

    /// Raw HLL estimate: `correction * k^2 / (kxq0 + kxq1)` with the
    /// small-k correction factors.
    fn raw_estimate(&self, lg_config_k: u8) -> f64 {
        let k = (1u64 << lg_config_k) as f64;

        let correction_factor = match lg_config_k {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / k),
        };

        (correction_factor * k * k) / (self.kxq0 + self.kxq1)
    }

    /// Linear counting estimate for small cardinalities, based on the
    /// number of registers still at zero.
    fn bitmap_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let k = 1u32 << lg_config_k;

        // Registers are unhit only while cur_min is still zero.
        let num_unhit = if cur_min == 0 { num_at_cur_min } else { 0 };

        if num_unhit == 0 {
            // Saturated bit vector, linear counting no longer informative.
            return k as f64 * (k as f64 / 0.5).ln();
        }

        let num_hit = k - num_unhit;
        harmonic::bitmap_estimate(k, num_hit)
    }

    /// Composite estimate used when the update history is out of order.
    ///
    /// Blends the raw HLL estimate with linear counting for small
    /// cardinalities, switching on the empirical crossover thresholds.
    pub fn composite_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let raw_est = self.raw_estimate(lg_config_k);

        let k = 1u64 << lg_config_k;
        if raw_est > (3 * k) as f64 {
            return raw_est;
        }

        let lin_est = self.bitmap_estimate(lg_config_k, cur_min, num_at_cur_min);

        // Averaging reduces the bias of a hard threshold comparison.
        let avg_est = (raw_est + lin_est) / 2.0;

        let crossover = match lg_config_k {
            4 => 0.718,
            5 => 0.672,
            _ => 0.64,
        };

        if avg_est > crossover * k as f64 {
            raw_est
        } else {
            lin_est
        }
    }

    /// Relative error at `num_std_dev` standard deviations.
    pub fn relative_error(lg_config_k: u8, out_of_order: bool, num_std_dev: u8) -> f64 {
        let factor = if out_of_order {
            NON_HIP_RSE_FACTOR
        } else {
            HIP_RSE_FACTOR
        };
        let k = (1u64 << lg_config_k) as f64;
        num_std_dev as f64 * factor / k.sqrt()
    }

    /// Get the HIP accumulator value.
    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    /// Get the kxq0 register value.
    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    /// Get the kxq1 register value.
    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    /// Check if this estimator is in out-of-order mode.
    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }

    /// Set the out-of-order flag.
    ///
    /// Set to true after a register-wise merge or when deserializing a
    /// sketch whose flag was set. The HIP accumulator is retained so a
    /// round trip reproduces the serialized state, but it is no longer
    /// consulted for estimates.
    pub fn set_out_of_order(&mut self, ooo: bool) {
        self.out_of_order = ooo;
    }

    /// Set the HIP accumulator directly.
    pub fn set_hip_accum(&mut self, value: f64) {
        self.hip_accum = value;
    }

    /// Set the kxq0 register directly.
    pub fn set_kxq0(&mut self, value: f64) {
        self.kxq0 = value;
    }

    /// Set the kxq1 register directly.
    pub fn set_kxq1(&mut self, value: f64) {
        self.kxq1 = value;
    }

    /// Recompute the KxQ sums from a full register scan.
    pub fn rebuild_kxq(&mut self, lg_config_k: u8, registers: impl Iterator<Item = u8>) {
        let k = 1u64 << lg_config_k;
        let mut kxq0 = 0.0;
        let mut kxq1 = 0.0;
        let mut count = 0u64;
        for value in registers {
            count += 1;
            if value < 32 {
                kxq0 += inv_pow2(value);
            } else {
                kxq1 += inv_pow2(value);
            }
        }
        debug_assert_eq!(count, k, "register scan must cover all slots");
        self.kxq0 = kxq0;
        self.kxq1 = kxq1;
    }
}

/// Compute 1 / 2^value.
#[inline]
fn inv_pow2(value: u8) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_initialization() {
        let est = HipEstimator::new(10); // 1024 registers
        assert_eq!(est.hip_accum(), 0.0);
        assert_eq!(est.kxq0(), 1024.0);
        assert_eq!(est.kxq1(), 0.0);
        assert!(!est.is_out_of_order());
    }

    #[test]
    fn test_estimator_update() {
        let mut est = HipEstimator::new(8); // 256 registers

        est.update(8, 0, 10);

        assert!(est.hip_accum() > 0.0);
        assert!(est.kxq0() < 256.0);
        assert_eq!(est.kxq1(), 0.0);
    }

    #[test]
    fn test_kxq_split_across_32() {
        let mut est = HipEstimator::new(8);

        est.update(8, 0, 10);
        let kxq0_after_10 = est.kxq0();
        assert_eq!(est.kxq1(), 0.0);

        // From 10 to 50 crosses the 32 boundary.
        est.update(8, 10, 50);
        assert!(est.kxq0() < kxq0_after_10);
        assert!(est.kxq1() > 0.0);
        assert!(est.kxq1() < 1e-10);
    }

    #[test]
    fn test_out_of_order_freezes_hip_not_kxq() {
        let mut est = HipEstimator::new(10);

        est.update(10, 0, 5);
        let hip_before = est.hip_accum();
        assert!(hip_before > 0.0);

        est.set_out_of_order(true);
        assert!(est.is_out_of_order());
        assert_eq!(est.hip_accum(), hip_before);

        let kxq0_before = est.kxq0();
        est.update(10, 5, 10);
        assert_eq!(est.hip_accum(), hip_before);
        assert_ne!(est.kxq0(), kxq0_before);
    }

    #[test]
    fn test_rebuild_kxq_matches_incremental() {
        let mut est = HipEstimator::new(4);
        let mut registers = [0u8; 16];
        for (slot, value) in [(0u32, 3u8), (5, 7), (9, 40), (15, 1)] {
            est.update(4, registers[slot as usize], value);
            registers[slot as usize] = value;
        }

        let mut rebuilt = HipEstimator::new(4);
        rebuilt.rebuild_kxq(4, registers.iter().copied());

        assert!((rebuilt.kxq0() - est.kxq0()).abs() < 1e-12);
        assert!((rebuilt.kxq1() - est.kxq1()).abs() < 1e-20);
    }

    #[test]
    fn test_relative_error_factors() {
        let hip = HipEstimator::relative_error(12, false, 1);
        let ooo = HipEstimator::relative_error(12, true, 1);
        assert!(hip < ooo);
        assert!(
            HipEstimator::relative_error(12, false, 3) > HipEstimator::relative_error(12, false, 1)
        );
    }

    #[test]
    fn test_inv_pow2() {
        assert_eq!(inv_pow2(0), 1.0);
        assert_eq!(inv_pow2(1), 0.5);
        assert_eq!(inv_pow2(10), 1.0 / 1024.0);
        assert!(inv_pow2(63) > 0.0);
    }
}
