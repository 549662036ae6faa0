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

//! Durable storage of origin offset watermarks.

mod memory;

pub use memory::MemoryWatermarkStore;

use crate::error::Result;
use crate::offset::Watermark;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::future::Future;
use tokio::sync::OwnedMutexGuard;

/// Identifies one watermark: the progress of an origin partition as seen by
/// one operator on one shuffle partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatermarkKey {
    pub shuffle_partition_id: String,
    pub operator_name: String,
    pub origin_partition_id: String,
}

impl WatermarkKey {
    pub fn new(
        shuffle_partition_id: impl Into<String>,
        operator_name: impl Into<String>,
        origin_partition_id: impl Into<String>,
    ) -> Self {
        Self {
            shuffle_partition_id: shuffle_partition_id.into(),
            operator_name: operator_name.into(),
            origin_partition_id: origin_partition_id.into(),
        }
    }
}

impl Display for WatermarkKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/{}/{}/{}",
            self.shuffle_partition_id, self.operator_name, self.origin_partition_id
        )
    }
}

/// A key-value store for watermarks.
///
/// Reads and writes are individually atomic. A read-compare-write sequence on
/// one key must be run while holding that key's [`Lock`].
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Retrieve the stored watermark, `None` if nothing was stored yet.
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>>;

    /// Replace the stored watermark.
    async fn put_watermark(&self, key: WatermarkKey, watermark: Watermark) -> Result<()>;

    /// Acquire the lock guarding `key`. Writers of other keys are not blocked.
    async fn lock(&self, key: &WatermarkKey) -> Result<Box<dyn Lock>>;
}

/// A lock held on a storage key.
#[async_trait]
pub trait Lock: Send + Sync {
    async fn unlock(&mut self);
}

#[async_trait]
impl<T: Send + Sync> Lock for OwnedMutexGuard<T> {
    async fn unlock(&mut self) {}
}

/// Run `op` while holding `lock`, releasing it afterwards whatever the outcome.
pub async fn with_lock<Out, F: Future<Output = Out>>(mut lock: Box<dyn Lock>, op: F) -> Out {
    let result = op.await;
    lock.unlock().await;
    result
}
