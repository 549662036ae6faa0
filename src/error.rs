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

//! Shuffle processor error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    io, result,
    time::Duration,
};

/// Result type alias for shuffle processing operations.
pub type Result<T> = result::Result<T, ShuffleError>;

/// Errors raised while processing a shuffled batch.
#[derive(Debug)]
pub enum ShuffleError {
    /// Partition state did not finish loading within the bound.
    LoadTimeout {
        partition_id: String,
        timeout: Duration,
    },
    /// The async state loader reported a failure for the partition.
    LoadFailure {
        partition_id: String,
        reason: String,
    },
    /// Watermark read or write failed.
    Storage(String),
    /// Window computation failed for the group (partition_id, window_instance_id).
    Compute {
        partition_id: String,
        window_instance_id: String,
        reason: String,
    },
    /// A message carried a value that could not be interpreted, e.g. an
    /// offset that does not parse under its declared width.
    DataCorruption(String),
    /// Configuration error with invalid settings.
    Configuration(String),
    /// I/O operation error.
    IoError(io::Error),
    /// General error with a descriptive message.
    General(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
}

impl ShuffleError {
    /// Whether redelivering the same batch later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShuffleError::LoadTimeout { .. }
                | ShuffleError::Storage(_)
                | ShuffleError::IoError(_)
        )
    }

    /// Wraps a collaborator failure with the key of the group being computed.
    pub fn compute(
        partition_id: impl Into<String>,
        window_instance_id: impl Into<String>,
        cause: impl Display,
    ) -> Self {
        ShuffleError::Compute {
            partition_id: partition_id.into(),
            window_instance_id: window_instance_id.into(),
            reason: cause.to_string(),
        }
    }
}

impl From<io::Error> for ShuffleError {
    fn from(e: io::Error) -> Self {
        ShuffleError::IoError(e)
    }
}

impl From<serde_json::Error> for ShuffleError {
    fn from(e: serde_json::Error) -> Self {
        ShuffleError::DataCorruption(format!("malformed message json: {e}"))
    }
}

impl Display for ShuffleError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ShuffleError::LoadTimeout {
                partition_id,
                timeout,
            } => {
                write!(
                    f,
                    "State load timeout: partition {partition_id} not loaded within {timeout:?}"
                )
            }
            ShuffleError::LoadFailure {
                partition_id,
                reason,
            } => {
                write!(
                    f,
                    "State load failure: check remote with partition {partition_id} failed: {reason}"
                )
            }
            ShuffleError::Storage(desc) => write!(f, "Storage error: {desc}"),
            ShuffleError::Compute {
                partition_id,
                window_instance_id,
                reason,
            } => {
                write!(
                    f,
                    "Window compute error for partition {partition_id}, \
                window instance {window_instance_id}: {reason}"
                )
            }
            ShuffleError::DataCorruption(desc) => {
                write!(f, "Data corruption: {desc}")
            }
            ShuffleError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            ShuffleError::IoError(desc) => write!(f, "IO error: {desc}"),
            ShuffleError::General(desc) => write!(f, "General error: {desc}"),
            ShuffleError::Internal(desc) => {
                write!(f, "Internal shuffle error: {desc}")
            }
        }
    }
}

impl Error for ShuffleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ShuffleError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
