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

//! External chain collaborators
//!
//! Key generation, balance queries, and funding transfers are delegated to
//! an external custody/funding service; the engine only ever talks to these
//! traits. `HttpChainService` is the HTTP implementation used by the binary.

use crate::wallet::KeyMaterial;
use async_trait::async_trait;
use hollowmere_common::WalletAddress;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Network-level failure; retryable
    #[error("chain network error: {0}")]
    Network(String),

    /// The service understood and refused the request
    #[error("chain request rejected: {0}")]
    Rejected(String),

    /// The funding transfer was not confirmed within the bounded wait
    #[error("funding confirmation timed out after {0:?}")]
    ConfirmationTimeout(Duration),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::Network(_) | ChainError::ConfirmationTimeout(_)
        )
    }
}

/// External capability that creates custodial key material
#[async_trait]
pub trait KeyCustodian: Send + Sync {
    async fn create_key(&self) -> Result<(WalletAddress, KeyMaterial), ChainError>;
}

/// Read-only view of the external ledger/network
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn balance(&self, address: &WalletAddress) -> Result<u64, ChainError>;
}

/// External funding source; resolves once the transfer is confirmed
#[async_trait]
pub trait FundingSource: Send + Sync {
    async fn fund(&self, address: &WalletAddress, amount: u64) -> Result<(), ChainError>;
}

/// HTTP custody/funding service client
pub struct HttpChainService {
    base_url: String,
    client: reqwest::Client,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl HttpChainService {
    pub fn new(base_url: impl Into<String>, confirm_timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChainError::Rejected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            confirm_timeout,
            poll_interval: Duration::from_secs(2),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChainError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if status.is_server_error() {
            Err(ChainError::Network(format!("service returned {}: {}", status, body)))
        } else {
            Err(ChainError::Rejected(format!("service returned {}: {}", status, body)))
        }
    }
}

#[async_trait]
impl KeyCustodian for HttpChainService {
    async fn create_key(&self) -> Result<(WalletAddress, KeyMaterial), ChainError> {
        #[derive(Deserialize)]
        struct CreateKeyResponse {
            address: String,
            key: String,
        }

        let response = self
            .client
            .post(format!("{}/v1/wallets", self.base_url))
            .send()
            .await
            .map_err(|e| ChainError::Network(format!("Request failed: {}", e)))?;
        let response = Self::check_status(response).await?;

        let body: CreateKeyResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Rejected(format!("Failed to parse response: {}", e)))?;

        let key = KeyMaterial::from_encoded(&body.key)
            .map_err(|e| ChainError::Rejected(format!("Malformed key material: {}", e)))?;

        Ok((WalletAddress::new(body.address), key))
    }
}

#[async_trait]
impl ChainClient for HttpChainService {
    async fn balance(&self, address: &WalletAddress) -> Result<u64, ChainError> {
        #[derive(Deserialize)]
        struct BalanceResponse {
            balance: u64,
        }

        let response = self
            .client
            .get(format!(
                "{}/v1/wallets/{}/balance",
                self.base_url,
                address.as_str()
            ))
            .send()
            .await
            .map_err(|e| ChainError::Network(format!("Request failed: {}", e)))?;
        let response = Self::check_status(response).await?;

        let body: BalanceResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Rejected(format!("Failed to parse response: {}", e)))?;

        Ok(body.balance)
    }
}

#[async_trait]
impl FundingSource for HttpChainService {
    async fn fund(&self, address: &WalletAddress, amount: u64) -> Result<(), ChainError> {
        #[derive(Deserialize)]
        struct FundResponse {
            request_id: String,
        }

        #[derive(Deserialize)]
        struct FundStatusResponse {
            confirmed: bool,
        }

        let response = self
            .client
            .post(format!("{}/v1/faucet", self.base_url))
            .json(&serde_json::json!({
                "address": address.as_str(),
                "amount": amount,
            }))
            .send()
            .await
            .map_err(|e| ChainError::Network(format!("Request failed: {}", e)))?;
        let response = Self::check_status(response).await?;

        let submitted: FundResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Rejected(format!("Failed to parse response: {}", e)))?;

        // Poll for confirmation until the bounded deadline passes
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::ConfirmationTimeout(self.confirm_timeout));
            }
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(format!(
                    "{}/v1/faucet/{}",
                    self.base_url, submitted.request_id
                ))
                .send()
                .await
                .map_err(|e| ChainError::Network(format!("Request failed: {}", e)))?;
            let response = Self::check_status(response).await?;

            let status: FundStatusResponse = response
                .json()
                .await
                .map_err(|e| ChainError::Rejected(format!("Failed to parse response: {}", e)))?;
            if status.confirmed {
                return Ok(());
            }
        }
    }
}
