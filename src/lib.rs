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

//! Shuffle-stage batch processing for windowed stream operators.
//!
//! A shuffled batch is regrouped by (shuffle partition, window instance),
//! each partition's state is awaited before it is computed, and the progress
//! of every origin partition is persisted as a monotonic offset watermark.

/// Error types.
pub mod error;
/// Processor configuration.
pub mod config;
/// Message envelope and window instance model.
pub mod message;
/// Offset ordering and watermark values.
pub mod offset;
/// Batch orchestration.
pub mod processor;
/// Regrouping of shuffled batches.
pub mod regroup;
/// Replaying recorded batches.
pub mod replay;
/// Partition state load tracking.
pub mod state;
/// Watermark storage.
pub mod storage;
/// Watermark advancement.
pub mod watermark;
/// Window collaborator contracts.
pub mod window;

/// Test utilities.
#[cfg(test)]
pub mod test_utils;

pub use error::{Result, ShuffleError};
pub use processor::{BatchOutcome, ShuffleBatchProcessor};
