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

use super::{LoadSignal, StateLoader};
use dashmap::DashMap;
use log::debug;
use std::collections::HashMap;
use std::future::Future;

/// A [`StateLoader`] kept in process memory.
///
/// Loads are registered per cohort: every partition submitted together shares
/// one signal.
#[derive(Debug, Default)]
pub struct MemoryStateLoader {
    signals: DashMap<String, LoadSignal>,
}

impl MemoryStateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `load` as the pending state load of every partition in
    /// `partition_ids` and returns the shared signal.
    pub fn register_cohort<I, S, F>(&self, partition_ids: I, load: F) -> LoadSignal
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        let signal = LoadSignal::new(load);
        for partition_id in partition_ids {
            let partition_id = partition_id.into();
            debug!("Registering state load for partition {partition_id}");
            self.signals.insert(partition_id, signal.clone());
        }
        signal
    }

    pub fn register(&self, partition_id: impl Into<String>, signal: LoadSignal) {
        self.signals.insert(partition_id.into(), signal);
    }

    pub fn remove(&self, partition_id: &str) -> Option<LoadSignal> {
        self.signals.remove(partition_id).map(|(_, signal)| signal)
    }

    /// Partitions currently holding a registered load.
    pub fn partition_ids(&self) -> Vec<String> {
        self.signals.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl StateLoader for MemoryStateLoader {
    fn load_signals(&self) -> HashMap<String, LoadSignal> {
        self.signals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
