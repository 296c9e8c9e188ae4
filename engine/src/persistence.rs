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

//! Persistent store for agents and wallet records
//!
//! The engine resumes from this store on restart instead of recreating
//! agents and wallets. `PgWorldStore` is the Postgres implementation;
//! `MemoryWorldStore` backs tests and database-less local runs.

use crate::error::EngineError;
use crate::wallet::{KeyMaterial, WalletRecord};
use async_trait::async_trait;
use chrono::Utc;
use hollowmere_common::{Agent, AgentId, AgentState, Personality, Vitals, WalletAddress};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store consumed at startup and on every lifecycle transition
#[async_trait]
pub trait WorldStore: Send + Sync {
    async fn load_agent(&self, id: AgentId) -> Result<Option<Agent>, EngineError>;
    async fn save_agent(&self, agent: &Agent) -> Result<(), EngineError>;
    async fn load_wallet(&self, id: AgentId) -> Result<Option<WalletRecord>, EngineError>;
    async fn save_wallet(&self, record: &WalletRecord) -> Result<(), EngineError>;
    async fn list_agents(&self) -> Result<Vec<Agent>, EngineError>;
}

/// Retry a persistence operation with doubling backoff before giving up
///
/// On final failure the error is returned and the caller leaves the agent in
/// its last known good state.
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    attempts: u32,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, EngineError>>,
{
    let mut delay = Duration::from_millis(100);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation,
                    attempt,
                    attempts,
                    error
                );
                last_error = Some(error);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| EngineError::Persistence(format!("{} failed with no attempts", operation))))
}

/// Postgres-backed store
pub struct PgWorldStore {
    pool: PgPool,
}

impl PgWorldStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn agent_from_row(
        id: Uuid,
        row: (String, String, String, f32, f32, i64, String, bool),
    ) -> Result<Agent, EngineError> {
        let (name, personality, location, health, energy, coins, state, funded) = row;
        let personality = Personality::from_str(&personality).ok_or_else(|| {
            EngineError::Persistence(format!("unknown personality '{}' for agent {}", personality, id))
        })?;
        let state = AgentState::from_str(&state).ok_or_else(|| {
            EngineError::Persistence(format!("unknown state '{}' for agent {}", state, id))
        })?;
        Ok(Agent {
            id: AgentId(id),
            name,
            personality,
            location,
            vitals: Vitals::new(health, energy),
            coins: coins.max(0) as u64,
            state,
            funded,
            wallet: None,
        })
    }
}

#[async_trait]
impl WorldStore for PgWorldStore {
    async fn load_agent(&self, id: AgentId) -> Result<Option<Agent>, EngineError> {
        let row: Option<(String, String, String, f32, f32, i64, String, bool)> = sqlx::query_as(
            "SELECT name, personality, location, health, energy, coins, state, funded
             FROM hollowmere.agents WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(format!("Failed to load agent {}: {}", id, e)))?;

        row.map(|row| Self::agent_from_row(id.as_uuid(), row)).transpose()
    }

    async fn save_agent(&self, agent: &Agent) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO hollowmere.agents
             (id, name, personality, location, health, energy, coins, state, funded, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
             ON CONFLICT (id)
             DO UPDATE SET
                name = EXCLUDED.name,
                personality = EXCLUDED.personality,
                location = EXCLUDED.location,
                health = EXCLUDED.health,
                energy = EXCLUDED.energy,
                coins = EXCLUDED.coins,
                state = EXCLUDED.state,
                funded = EXCLUDED.funded,
                updated_at = NOW()",
        )
        .bind(agent.id.as_uuid())
        .bind(&agent.name)
        .bind(agent.personality.as_str())
        .bind(&agent.location)
        .bind(agent.vitals.health())
        .bind(agent.vitals.energy())
        .bind(agent.coins as i64)
        .bind(agent.state.as_str())
        .bind(agent.funded)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(format!("Failed to save agent {}: {}", agent.id, e)))?;

        Ok(())
    }

    async fn load_wallet(&self, id: AgentId) -> Result<Option<WalletRecord>, EngineError> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT address, key_material, balance
             FROM hollowmere.wallets WHERE agent_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(format!("Failed to load wallet for {}: {}", id, e)))?;

        row.map(|(address, key, balance)| {
            let key = KeyMaterial::from_encoded(&key).map_err(|e| {
                EngineError::Persistence(format!("Corrupt key material for {}: {}", id, e))
            })?;
            Ok(WalletRecord {
                agent_id: id,
                address: WalletAddress::new(address),
                key,
                last_known_balance: balance.max(0) as u64,
                updated_at: Utc::now(),
            })
        })
        .transpose()
    }

    async fn save_wallet(&self, record: &WalletRecord) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO hollowmere.wallets (agent_id, address, key_material, balance, updated_at)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (agent_id)
             DO UPDATE SET balance = EXCLUDED.balance, updated_at = NOW()",
        )
        .bind(record.agent_id.as_uuid())
        .bind(record.address.as_str())
        .bind(record.key.encoded())
        .bind(record.last_known_balance as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to save wallet for {}: {}",
                record.agent_id, e
            ))
        })?;

        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, EngineError> {
        let rows: Vec<(Uuid, String, String, String, f32, f32, i64, String, bool)> =
            sqlx::query_as(
                "SELECT id, name, personality, location, health, energy, coins, state, funded
                 FROM hollowmere.agents ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Persistence(format!("Failed to list agents: {}", e)))?;

        rows.into_iter()
            .map(|(id, name, personality, location, health, energy, coins, state, funded)| {
                Self::agent_from_row(
                    id,
                    (name, personality, location, health, energy, coins, state, funded),
                )
            })
            .collect()
    }
}

/// In-memory store for tests and database-less local runs
#[derive(Default)]
pub struct MemoryWorldStore {
    agents: RwLock<HashMap<AgentId, Agent>>,
    wallets: RwLock<HashMap<AgentId, WalletRecord>>,
    /// Number of upcoming save operations to fail, for exercising retry paths
    fail_saves: AtomicU32,
}

impl MemoryWorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` save operations fail
    pub fn fail_next_saves(&self, count: u32) {
        self.fail_saves.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn wallet_count(&self) -> usize {
        self.wallets.read().await.len()
    }
}

#[async_trait]
impl WorldStore for MemoryWorldStore {
    async fn load_agent(&self, id: AgentId) -> Result<Option<Agent>, EngineError> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn save_agent(&self, agent: &Agent) -> Result<(), EngineError> {
        if self.take_injected_failure() {
            return Err(EngineError::Persistence("injected save failure".to_string()));
        }
        self.agents.write().await.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn load_wallet(&self, id: AgentId) -> Result<Option<WalletRecord>, EngineError> {
        Ok(self.wallets.read().await.get(&id).cloned())
    }

    async fn save_wallet(&self, record: &WalletRecord) -> Result<(), EngineError> {
        if self.take_injected_failure() {
            return Err(EngineError::Persistence("injected save failure".to_string()));
        }
        self.wallets
            .write()
            .await
            .insert(record.agent_id, record.clone());
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, EngineError> {
        Ok(self.agents.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hollowmere_common::Personality;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryWorldStore::new();
        let agent = Agent::new("Wick", Personality::Industrious, "crossroads");
        let id = agent.id;

        store.save_agent(&agent).await.unwrap();
        let loaded = store.load_agent(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Wick");
        assert_eq!(loaded.personality, Personality::Industrious);

        assert!(store.load_agent(AgentId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_injected_failures() {
        let store = MemoryWorldStore::new();
        let agent = Agent::new("Tilda", Personality::Nomadic, "mirefen");
        store.fail_next_saves(2);

        let result = with_retry("save_agent", 3, || store.save_agent(&agent)).await;
        tokio_test::assert_ok!(result);
        assert_eq!(store.agent_count().await, 1);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_attempts() {
        let store = MemoryWorldStore::new();
        let agent = Agent::new("Moss", Personality::Martial, "ironreach");
        store.fail_next_saves(5);

        let result = with_retry("save_agent", 3, || store.save_agent(&agent)).await;
        assert!(matches!(result, Err(EngineError::Persistence(_))));
        assert_eq!(store.agent_count().await, 0);
    }
}
