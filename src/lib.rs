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

//! Probabilistic sketches for approximate stream analytics.
//!
//! Each sketch answers one query about an unbounded stream in sub-linear
//! memory:
//!
//! - [`hll`]: HyperLogLog cardinality estimation with three dense
//!   register packings, a list/set warm-up ladder, and a union operator.
//! - [`frequencies`]: Misra-Gries frequent items over a reverse-purge
//!   hash map, for i64 and generic hashable keys.
//! - [`countmin`]: Count-Min frequency estimation with signed weights.
//!
//! All sketches serialize to fixed little-endian layouts; a sketch
//! written by one process deserializes identically in another.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod codec;
pub mod common;
pub mod countmin;
pub mod error;
pub mod frequencies;
pub mod hll;

mod hash;
