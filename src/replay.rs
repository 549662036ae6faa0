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

//! Loading of recorded shuffle batches from JSON.

use crate::error::{Result, ShuffleError};
use crate::message::Message;
use std::path::Path;

/// Parses a JSON array of messages.
pub fn parse_batch(json: &str) -> Result<Vec<Message>> {
    Ok(serde_json::from_str(json)?)
}

/// Reads a JSON array of messages from `path`.
pub fn load_batch(path: impl AsRef<Path>) -> Result<Vec<Message>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        ShuffleError::IoError(std::io::Error::new(
            e.kind(),
            format!("cannot read batch file {}: {e}", path.display()),
        ))
    })?;
    parse_batch(&json)
}
