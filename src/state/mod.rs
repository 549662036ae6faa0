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

//! Partition state load tracking.
//!
//! Window state for a partition is loaded asynchronously, out of band, when the
//! partition is assigned. [`PartitionStateGate`] makes the shuffle path wait for
//! that load before any computation touches the partition.

mod memory;

pub use memory::MemoryStateLoader;

use crate::config::ShuffleConfig;
use crate::error::{Result, ShuffleError};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type LoadFuture = BoxFuture<'static, std::result::Result<(), String>>;

/// Completion handle of an in-flight state load. Clones observe the same load.
#[derive(Clone)]
pub struct LoadSignal {
    inner: Shared<LoadFuture>,
}

impl LoadSignal {
    pub fn new<F>(load: F) -> Self
    where
        F: Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        Self {
            inner: load.boxed().shared(),
        }
    }

    /// A signal that has already completed successfully.
    pub fn ready() -> Self {
        Self::new(futures::future::ready(Ok(())))
    }

    /// A signal that has already failed with `reason`.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(futures::future::ready(Err(reason)))
    }

    /// Waits for the load to finish. Dropping the returned future does not
    /// cancel the load for other waiters.
    pub async fn wait(&self) -> std::result::Result<(), String> {
        self.inner.clone().await
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.peek().is_some()
    }

    /// Whether the load has finished successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(self.inner.peek(), Some(Ok(())))
    }
}

impl Debug for LoadSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadSignal")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Registry of in-flight partition state loads.
pub trait StateLoader: Send + Sync {
    /// Snapshot of the partitions with a registered load and their signals.
    fn load_signals(&self) -> HashMap<String, LoadSignal>;
}

/// Owned table of partitions whose state is known to be loaded.
///
/// Marking is a one-way, idempotent upgrade, so concurrent markers never
/// conflict.
#[derive(Debug, Default)]
pub struct PartitionLoadTable {
    loaded: RwLock<HashSet<String>>,
}

impl PartitionLoadTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, partition_id: &str) -> bool {
        self.loaded.read().contains(partition_id)
    }

    pub fn mark_loaded(&self, partition_id: &str) {
        if !self.is_loaded(partition_id) {
            self.loaded.write().insert(partition_id.to_owned());
        }
    }

    pub fn mark_all_loaded<I, S>(&self, partition_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut loaded = self.loaded.write();
        loaded.extend(partition_ids.into_iter().map(Into::into));
    }

    /// Drops the loaded marker, e.g. after the partition was revoked so a
    /// later reassignment waits for a fresh load.
    pub fn forget(&self, partition_id: &str) -> bool {
        self.loaded.write().remove(partition_id)
    }

    /// Loaded partitions in ascending order.
    pub fn loaded_partitions(&self) -> Vec<String> {
        let mut partitions: Vec<String> = self.loaded.read().iter().cloned().collect();
        partitions.sort();
        partitions
    }
}

/// Blocks the shuffle path until a partition's state has been loaded.
pub struct PartitionStateGate {
    loaded: Arc<PartitionLoadTable>,
    loader: Arc<dyn StateLoader>,
    timeout: Duration,
    loader_queries: AtomicUsize,
}

impl PartitionStateGate {
    pub fn new(
        loaded: Arc<PartitionLoadTable>,
        loader: Arc<dyn StateLoader>,
        timeout: Duration,
    ) -> Self {
        Self {
            loaded,
            loader,
            timeout,
            loader_queries: AtomicUsize::new(0),
        }
    }

    pub fn from_config(
        config: &ShuffleConfig,
        loaded: Arc<PartitionLoadTable>,
        loader: Arc<dyn StateLoader>,
    ) -> Self {
        Self::new(loaded, loader, config.state_load_timeout)
    }

    pub fn load_table(&self) -> &Arc<PartitionLoadTable> {
        &self.loaded
    }

    /// Number of times the gate had to consult the loader registry.
    pub fn loader_queries(&self) -> usize {
        self.loader_queries.load(Ordering::Relaxed)
    }

    /// Returns once `partition_id`'s state is loaded, or fails if the pending
    /// load fails or does not finish within the configured timeout.
    ///
    /// A successful wait marks every partition of the same cohort as loaded,
    /// along with any other registered partition whose load already
    /// succeeded. Partitions with a pending or failed load are left alone.
    pub async fn ensure_loaded(&self, partition_id: &str) -> Result<()> {
        if self.loaded.is_loaded(partition_id) {
            return Ok(());
        }

        self.loader_queries.fetch_add(1, Ordering::Relaxed);
        let signal = match self.loader.load_signals().remove(partition_id) {
            Some(signal) => signal,
            None => {
                debug!("No pending state load for partition {partition_id}");
                self.loaded.mark_loaded(partition_id);
                return Ok(());
            }
        };

        debug!(
            "Waiting up to {:?} for state of partition {partition_id} to load",
            self.timeout
        );
        match tokio::time::timeout(self.timeout, signal.wait()).await {
            Ok(Ok(())) => {
                let cohort: Vec<String> = self
                    .loader
                    .load_signals()
                    .into_iter()
                    .filter(|(_, signal)| signal.is_loaded())
                    .map(|(partition_id, _)| partition_id)
                    .collect();
                info!(
                    "State of partition {partition_id} loaded, marking {} partitions of its cohort as loaded",
                    cohort.len()
                );
                self.loaded.mark_all_loaded(cohort);
                self.loaded.mark_loaded(partition_id);
                Ok(())
            }
            Ok(Err(reason)) => Err(ShuffleError::LoadFailure {
                partition_id: partition_id.to_owned(),
                reason,
            }),
            Err(_) => Err(ShuffleError::LoadTimeout {
                partition_id: partition_id.to_owned(),
                timeout: self.timeout,
            }),
        }
    }
}
