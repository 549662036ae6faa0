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

use crate::error::Result;
use crate::offset::Watermark;
use crate::storage::{Lock, WatermarkKey, WatermarkStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type KeyLock = Arc<Mutex<()>>;

/// A [`WatermarkStore`] implementation that keeps watermarks in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWatermarkStore {
    watermarks: Arc<DashMap<WatermarkKey, Watermark>>,
    locks: Arc<DashMap<WatermarkKey, KeyLock>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored watermarks, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<WatermarkKey, Watermark> {
        self.watermarks
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>> {
        Ok(self.watermarks.get(key).map(|e| e.value().clone()))
    }

    async fn put_watermark(&self, key: WatermarkKey, watermark: Watermark) -> Result<()> {
        self.watermarks.insert(key, watermark);
        Ok(())
    }

    async fn lock(&self, key: &WatermarkKey) -> Result<Box<dyn Lock>> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        Ok(Box::new(lock.lock_owned().await))
    }
}
