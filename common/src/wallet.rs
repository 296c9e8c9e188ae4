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

//! Opaque wallet handles
//!
//! Only the engine's wallet ledger ever holds custodial key material. The
//! rest of the system works with `WalletHandle`, which carries the on-chain
//! address and owning agent id and nothing else, so key bytes cannot leak
//! through logs or serialization of agent state.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};

/// Public on-chain address of a custodial wallet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to an agent's custodial wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletHandle {
    agent_id: AgentId,
    address: WalletAddress,
}

impl WalletHandle {
    pub fn new(agent_id: AgentId, address: WalletAddress) -> Self {
        Self { agent_id, address }
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }
}

impl std::fmt::Display for WalletHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.agent_id, self.address)
    }
}
