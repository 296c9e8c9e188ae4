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

//! Custodial wallet ledger
//!
//! Sole owner of per-agent key material. Everything outside this module
//! works with opaque `WalletHandle`s; key bytes are never logged,
//! serialized into agent state, or exposed through the handle.

use crate::chain::{ChainClient, ChainError, FundingSource, KeyCustodian};
use crate::error::EngineError;
use crate::persistence::{with_retry, WorldStore};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hollowmere_common::{AgentId, WalletAddress, WalletHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Custodial key bytes
///
/// Debug output is redacted; the only way out of this type is the encoded
/// form used at the persistence boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode from the persisted base64 form
    pub fn from_encoded(encoded: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self(BASE64.decode(encoded)?))
    }

    /// Encoded form for the persistence boundary
    pub fn encoded(&self) -> String {
        BASE64.encode(&self.0)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial(<redacted>)")
    }
}

/// Persisted custodial wallet state for one agent
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub agent_id: AgentId,
    pub address: WalletAddress,
    pub key: KeyMaterial,
    pub last_known_balance: u64,
    pub updated_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn handle(&self) -> WalletHandle {
        WalletHandle::new(self.agent_id, self.address.clone())
    }
}

/// Per-agent custodial wallet lifecycle
pub struct WalletLedger {
    store: Arc<dyn WorldStore>,
    custodian: Arc<dyn KeyCustodian>,
    chain: Arc<dyn ChainClient>,
    funding: Arc<dyn FundingSource>,
    funding_timeout: Duration,
    /// Per-agent guards: wallet operations for one id are serialized while
    /// distinct ids proceed concurrently
    guards: DashMap<AgentId, Arc<Mutex<()>>>,
}

impl WalletLedger {
    const SAVE_ATTEMPTS: u32 = 3;

    pub fn new(
        store: Arc<dyn WorldStore>,
        custodian: Arc<dyn KeyCustodian>,
        chain: Arc<dyn ChainClient>,
        funding: Arc<dyn FundingSource>,
        funding_timeout: Duration,
    ) -> Self {
        Self {
            store,
            custodian,
            chain,
            funding,
            funding_timeout,
            guards: DashMap::new(),
        }
    }

    fn guard(&self, agent_id: AgentId) -> Arc<Mutex<()>> {
        self.guards
            .entry(agent_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn chain_error(error: ChainError) -> EngineError {
        EngineError::TransientExternal(error.to_string())
    }

    /// Return the persisted wallet for the agent, creating and persisting
    /// one if none exists. Idempotent per agent id.
    pub async fn ensure_wallet(&self, agent_id: AgentId) -> Result<WalletHandle, EngineError> {
        let guard = self.guard(agent_id);
        let _lock = guard.lock().await;

        if let Some(record) = self.store.load_wallet(agent_id).await? {
            tracing::debug!("Reusing persisted wallet {} for agent {}", record.address, agent_id);
            return Ok(record.handle());
        }

        let (address, key) = self
            .custodian
            .create_key()
            .await
            .map_err(Self::chain_error)?;
        let record = WalletRecord {
            agent_id,
            address,
            key,
            last_known_balance: 0,
            updated_at: Utc::now(),
        };
        with_retry("save_wallet", Self::SAVE_ATTEMPTS, || {
            self.store.save_wallet(&record)
        })
        .await?;

        tracing::info!("Created wallet {} for agent {}", record.address, agent_id);
        Ok(record.handle())
    }

    /// Query the external ledger for the wallet's balance
    ///
    /// Transient network failures are retryable, not fatal.
    pub async fn current_balance(&self, handle: &WalletHandle) -> Result<u64, EngineError> {
        self.chain
            .balance(handle.address())
            .await
            .map_err(Self::chain_error)
    }

    /// Top the wallet up to at least `minimum`
    ///
    /// Returns `Ok(true)` once the balance covers the minimum, `Ok(false)`
    /// when the funding transfer failed or was not confirmed in time. A
    /// failure never destroys the wallet record; the agent is simply
    /// excluded from funded actions until the next attempt.
    pub async fn ensure_funded(
        &self,
        handle: &WalletHandle,
        minimum: u64,
    ) -> Result<bool, EngineError> {
        let guard = self.guard(handle.agent_id());
        let _lock = guard.lock().await;

        let balance = self
            .chain
            .balance(handle.address())
            .await
            .map_err(Self::chain_error)?;
        if balance >= minimum {
            self.record_balance(handle.agent_id(), balance).await;
            return Ok(true);
        }

        let shortfall = minimum - balance;
        tracing::info!(
            "Requesting {} funding for agent {} wallet {}",
            shortfall,
            handle.agent_id(),
            handle.address()
        );

        let outcome =
            tokio::time::timeout(self.funding_timeout, self.funding.fund(handle.address(), shortfall))
                .await;
        match outcome {
            Ok(Ok(())) => {
                let funded_balance = self
                    .chain
                    .balance(handle.address())
                    .await
                    .unwrap_or(minimum);
                self.record_balance(handle.agent_id(), funded_balance).await;
                Ok(true)
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    "Funding failed for agent {} wallet {}: {}",
                    handle.agent_id(),
                    handle.address(),
                    error
                );
                Ok(false)
            }
            Err(_elapsed) => {
                tracing::warn!(
                    "Funding confirmation for agent {} timed out after {:?}",
                    handle.agent_id(),
                    self.funding_timeout
                );
                Ok(false)
            }
        }
    }

    /// Best-effort update of the persisted last-known balance
    async fn record_balance(&self, agent_id: AgentId, balance: u64) {
        let record = match self.store.load_wallet(agent_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!("Skipping balance record for agent {}: {}", agent_id, error);
                return;
            }
        };
        let updated = WalletRecord {
            last_known_balance: balance,
            updated_at: Utc::now(),
            ..record
        };
        if let Err(error) = self.store.save_wallet(&updated).await {
            tracing::warn!("Failed to record balance for agent {}: {}", agent_id, error);
        }
    }
}
