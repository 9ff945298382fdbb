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

//! Serialization constants for frequency sketches.
//!
//! Layout (little-endian):
//!
//! ```text
//! byte 0: preamble size in longs (1 empty, 4 non-empty)
//! byte 1: serialization version (1)
//! byte 2: family id (10)
//! byte 3: lg max map size
//! byte 4: lg current map size
//! byte 5: flags (empty 0x4)
//! bytes 8-11:  active item count (u32)
//! bytes 16-23: stream weight (i64)
//! bytes 24-31: offset (i64)
//! ```
//!
//! The preamble is followed by the active values and then the active
//! keys, positionally paired.

/// Serialization version.
pub(crate) const SER_VER: u8 = 1;

/// Preamble longs for an empty sketch.
pub(crate) const PREAMBLE_LONGS_EMPTY: u8 = 1;
/// Preamble longs for a non-empty sketch.
pub(crate) const PREAMBLE_LONGS_NONEMPTY: u8 = 4;

/// Empty flag bit, shared position with the HLL flag byte.
pub(crate) const EMPTY_FLAG_MASK: u8 = 4;
