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

//! Integration tests for the custodial wallet ledger

use async_trait::async_trait;
use hollowmere_common::{AgentId, WalletAddress};
use hollowmere_engine::chain::{ChainClient, ChainError, FundingSource, KeyCustodian};
use hollowmere_engine::persistence::MemoryWorldStore;
use hollowmere_engine::wallet::{KeyMaterial, WalletLedger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct SlowCustodian {
    created: AtomicUsize,
}

impl SlowCustodian {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            created: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl KeyCustodian for SlowCustodian {
    async fn create_key(&self) -> Result<(WalletAddress, KeyMaterial), ChainError> {
        // Window for a racing caller to observe a missing wallet
        tokio::time::sleep(Duration::from_millis(10)).await;
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok((
            WalletAddress::new(format!("hm1qrace{:04}", n)),
            KeyMaterial::new(vec![n as u8; 32]),
        ))
    }
}

struct FlakyChain {
    available: bool,
}

#[async_trait]
impl ChainClient for FlakyChain {
    async fn balance(&self, _address: &WalletAddress) -> Result<u64, ChainError> {
        if self.available {
            Ok(1_000)
        } else {
            Err(ChainError::Network("connection refused".to_string()))
        }
    }
}

struct NoopFunding;

#[async_trait]
impl FundingSource for NoopFunding {
    async fn fund(&self, _address: &WalletAddress, _amount: u64) -> Result<(), ChainError> {
        Ok(())
    }
}

fn ledger(
    store: Arc<MemoryWorldStore>,
    custodian: Arc<SlowCustodian>,
    chain_available: bool,
) -> Arc<WalletLedger> {
    Arc::new(WalletLedger::new(
        store,
        custodian,
        Arc::new(FlakyChain {
            available: chain_available,
        }),
        Arc::new(NoopFunding),
        Duration::from_secs(1),
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_ensure_wallet_same_agent_creates_one_wallet() {
    let store = Arc::new(MemoryWorldStore::new());
    let custodian = SlowCustodian::new();
    let ledger = ledger(store.clone(), custodian.clone(), true);
    let agent_id = AgentId::generate();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(
            async move { ledger.ensure_wallet(agent_id).await },
        ));
    }

    let mut addresses = Vec::new();
    for handle in handles {
        let wallet = handle.await.expect("join").expect("ensure_wallet");
        addresses.push(wallet.address().clone());
    }

    assert_eq!(custodian.created.load(Ordering::SeqCst), 1);
    assert_eq!(store.wallet_count().await, 1);
    assert!(addresses.iter().all(|a| *a == addresses[0]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wallet_creation_for_distinct_agents_proceeds_concurrently() {
    let store = Arc::new(MemoryWorldStore::new());
    let custodian = SlowCustodian::new();
    let ledger = ledger(store.clone(), custodian.clone(), true);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.ensure_wallet(AgentId::generate()).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("ensure_wallet");
    }

    assert_eq!(custodian.created.load(Ordering::SeqCst), 8);
    assert_eq!(store.wallet_count().await, 8);
}

#[tokio::test]
async fn test_process_restart_reuses_persisted_wallet() {
    let store = Arc::new(MemoryWorldStore::new());
    let custodian = SlowCustodian::new();
    let agent_id = AgentId::generate();

    let first = {
        let ledger = ledger(store.clone(), custodian.clone(), true);
        ledger.ensure_wallet(agent_id).await.expect("first run")
    };

    // Same store, fresh ledger: a restarted process
    let second = {
        let ledger = ledger(store.clone(), custodian.clone(), true);
        ledger.ensure_wallet(agent_id).await.expect("second run")
    };

    assert_eq!(first.address(), second.address());
    assert_eq!(custodian.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_balance_query_failure_is_transient() {
    let store = Arc::new(MemoryWorldStore::new());
    let custodian = SlowCustodian::new();
    let reachable = ledger(store.clone(), custodian.clone(), true);
    let handle = reachable
        .ensure_wallet(AgentId::generate())
        .await
        .expect("wallet");

    let unreachable = ledger(store, custodian, false);
    let error = unreachable
        .current_balance(&handle)
        .await
        .expect_err("network down");
    assert!(error.is_transient());
    assert_eq!(error.kind(), "transient_external");
}
