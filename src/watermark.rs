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

//! Advancement of per-origin-partition offset watermarks.

use crate::error::{Result, ShuffleError};
use crate::message::Message;
use crate::offset::{greater_than, Watermark};
use crate::storage::{with_lock, WatermarkKey, WatermarkStore};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Persists how far each origin partition has been processed.
pub struct OffsetWatermarkUpdater {
    store: Arc<dyn WatermarkStore>,
}

impl OffsetWatermarkUpdater {
    pub fn new(store: Arc<dyn WatermarkStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn WatermarkStore> {
        &self.store
    }

    /// Advances the stored watermark of every origin partition in `messages`
    /// to the highest offset seen for it, if that is ahead of what is stored.
    ///
    /// Returns the number of watermarks written.
    pub async fn advance(
        &self,
        shuffle_partition_id: &str,
        operator_name: &str,
        messages: &[Message],
    ) -> Result<usize> {
        let highest = highest_origin_offsets(messages)?;

        let mut advanced = 0;
        for (origin_partition_id, candidate) in highest {
            let key = WatermarkKey::new(
                shuffle_partition_id,
                operator_name,
                origin_partition_id,
            );
            let lock = self.store.lock(&key).await?;
            let written = with_lock(lock, async {
                let stored = self.store.get_watermark(&key).await?;
                let forward = match &stored {
                    None => true,
                    Some(stored) => stored.is_behind(&candidate)?,
                };
                if forward {
                    debug!(
                        "Advancing watermark {key} from {} to {candidate}",
                        stored
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<none>".to_string())
                    );
                    self.store.put_watermark(key.clone(), candidate).await?;
                }
                Ok::<bool, ShuffleError>(forward)
            })
            .await?;
            if written {
                advanced += 1;
            }
        }

        Ok(advanced)
    }
}

/// Highest origin offset per origin partition. The width flag of the last
/// message seen for a partition wins; a mix of widths is logged.
fn highest_origin_offsets(messages: &[Message]) -> Result<BTreeMap<String, Watermark>> {
    let mut observed: BTreeMap<String, (Vec<String>, bool)> = BTreeMap::new();
    for message in messages {
        let origin = message.origin()?;
        let entry = observed
            .entry(origin.partition_id.clone())
            .or_insert_with(|| (Vec::new(), origin.offset_is_wide));
        if entry.1 != origin.offset_is_wide {
            warn!(
                "Inconsistent offset width for origin partition {} at offset {}, using the latest",
                origin.partition_id, origin.offset
            );
            entry.1 = origin.offset_is_wide;
        }
        entry.0.push(origin.offset);
    }

    let mut highest = BTreeMap::new();
    for (origin_partition_id, (offsets, is_wide)) in observed {
        let mut max: Option<String> = None;
        for offset in offsets {
            let higher = match &max {
                None => true,
                Some(current) => greater_than(&offset, current, is_wide)?,
            };
            if higher {
                max = Some(offset);
            }
        }
        if let Some(offset) = max {
            highest.insert(origin_partition_id, Watermark::new(offset, is_wide));
        }
    }
    Ok(highest)
}
