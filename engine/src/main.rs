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

use clap::Parser;
use hollowmere_engine::chain::HttpChainService;
use hollowmere_engine::config::{Arguments, Configuration};
use hollowmere_engine::effects;
use hollowmere_engine::persistence::PgWorldStore;
use hollowmere_engine::personality::PersonalityProfiles;
use hollowmere_engine::scheduler::AgentScheduler;
use hollowmere_engine::wallet::WalletLedger;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        // Try default .env file
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution;
    // an invalid configuration aborts startup with a non-zero exit code
    let config: Configuration = Configuration::load(&arguments.config_file)?;

    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting Hollowmere Denizen Engine...");

    // Initialize the database connection pool
    tracing::info!("Connecting to Database at {}", &config.database.url);
    let database = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;
    let store = Arc::new(PgWorldStore::new(database));
    tracing::info!("Persistent store initialized");

    // External custody/funding service
    let chain_endpoint = config.chain.endpoint.to_string();
    tracing::info!("Using custody/funding service at {}", chain_endpoint);
    let chain_service = Arc::new(HttpChainService::new(
        chain_endpoint,
        config.chain.confirm_timeout(),
    )?);
    let ledger = Arc::new(WalletLedger::new(
        store.clone(),
        chain_service.clone(),
        chain_service.clone(),
        chain_service,
        config.chain.confirm_timeout(),
    ));
    tracing::info!("Wallet ledger initialized");

    // Action routing over the baseline world effects
    let dispatcher = Arc::new(effects::default_dispatcher(&config.engine.locations));

    // Personality table is validated before any agent spawns
    let profiles = PersonalityProfiles::builtin();
    let desired = arguments.agents.unwrap_or(config.engine.target_population);

    let mut scheduler = AgentScheduler::new(
        config.engine.clone(),
        profiles,
        dispatcher,
        ledger,
        store,
    )?;

    if arguments.resume {
        tracing::info!("Resuming world from the persistent store...");
    }
    scheduler.start(desired, arguments.resume).await?;

    // Cooperative shutdown on ctrl-c
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    scheduler.run(shutdown).await?;

    tracing::info!("Hollowmere Denizen Engine stopped");
    Ok(())
}
