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

//! Contracts of the window collaborators the shuffle processor delegates to.

use crate::error::Result;
use crate::message::{Message, WindowInstance};
use async_trait::async_trait;
use log::debug;

/// The aggregation side of a window operator.
#[async_trait]
pub trait WindowOperator: Send + Sync {
    /// Folds a regrouped sub-batch into the state of `instance` on `partition_id`.
    async fn compute(
        &self,
        messages: &[Message],
        instance: &WindowInstance,
        partition_id: &str,
    ) -> Result<()>;

    /// Called once the sub-batch has been computed and its watermarks saved,
    /// so the operator can record its per-partition processing context.
    async fn record_progress(
        &self,
        partition_id: &str,
        instance: &WindowInstance,
        messages: &[Message],
    ) -> Result<()>;
}

/// Receives a snapshot of every sub-batch before it is computed.
///
/// Failures are reported back but never abort processing.
pub trait DiagnosticObserver: Send + Sync {
    fn record(
        &self,
        operator_name: &str,
        messages: &[Message],
        instance: &WindowInstance,
    ) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DiagnosticObserver for NoopObserver {
    fn record(&self, _: &str, _: &[Message], _: &WindowInstance) -> Result<()> {
        Ok(())
    }
}

/// Writes one debug line per sub-batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl DiagnosticObserver for LoggingObserver {
    fn record(
        &self,
        operator_name: &str,
        messages: &[Message],
        instance: &WindowInstance,
    ) -> Result<()> {
        let offsets: Vec<&str> = messages.iter().map(|m| m.header.offset.as_str()).collect();
        debug!(
            "[{operator_name}] shuffle receive for window instance {} ({} .. {}): {} messages, offsets {:?}",
            instance.id(),
            instance.start_time,
            instance.end_time,
            messages.len(),
            offsets
        );
        Ok(())
    }
}
