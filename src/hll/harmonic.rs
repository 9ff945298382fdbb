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

//! Harmonic-number based linear counting for sparse register arrays.

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

// Below this, summation is both exact and cheap; above, the asymptotic
// expansion is accurate to well under 1e-12.
const NUM_EXACT_HARMONIC_NUMBERS: u64 = 40;

/// Returns the x-th harmonic number, `sum(1/i for i in 1..=x)`.
fn harmonic_number(x: u64) -> f64 {
    if x < NUM_EXACT_HARMONIC_NUMBERS {
        let mut sum = 0.0;
        for i in 1..=x {
            sum += 1.0 / i as f64;
        }
        return sum;
    }
    let xf = x as f64;
    let inv_sq = 1.0 / (xf * xf);
    xf.ln() + EULER_MASCHERONI + 1.0 / (2.0 * xf) - inv_sq * (1.0 / 12.0 - inv_sq / 120.0)
}

/// Bitmap (linear counting) cardinality estimate.
///
/// Given a bit vector of `bit_vector_length` positions of which
/// `num_bits_set` are set, returns the refined coupon-collector estimate
/// `n * (H(n) - H(n - c))`.
pub(crate) fn bitmap_estimate(bit_vector_length: u32, num_bits_set: u32) -> f64 {
    debug_assert!(num_bits_set <= bit_vector_length);
    let n = bit_vector_length as u64;
    let unhit = (bit_vector_length - num_bits_set) as u64;
    bit_vector_length as f64 * (harmonic_number(n) - harmonic_number(unhit))
}
