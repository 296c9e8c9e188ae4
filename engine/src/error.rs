//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Engine error taxonomy
//!
//! Per-agent errors never propagate out of that agent's loop; only
//! `Configuration` aborts the process, and only at startup.

use thiserror::Error;

/// Engine-wide error taxonomy
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal at startup: invalid personality table, config file, or wiring
    #[error("configuration error: {0}")]
    Configuration(String),

    /// External collaborator unavailable; the agent skips this tick and
    /// retries on the next one
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    /// Agent lacks the energy or coins the chosen action requires
    #[error("insufficient resources: {0}")]
    ResourceInsufficient(String),

    /// Failed to save or load agent or wallet state
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Stable kind tag for structured log records
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration",
            EngineError::TransientExternal(_) => "transient_external",
            EngineError::ResourceInsufficient(_) => "resource_insufficient",
            EngineError::Persistence(_) => "persistence",
        }
    }

    /// Retryable on a later tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::TransientExternal(_) | EngineError::Persistence(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
