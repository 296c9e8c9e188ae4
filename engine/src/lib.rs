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

//! Hollowmere Denizen Engine
//!
//! The autonomous-agent core of the Hollowmere world: an agent scheduler
//! owning a population of independent denizens, each running its own
//! activity loop with randomized timing, personality-weighted decision
//! making, and a durable custodial wallet identity that survives process
//! restarts.

pub mod chain;
pub mod config;
pub mod dispatch;
pub mod effects;
pub mod error;
pub mod persistence;
pub mod personality;
pub mod scheduler;
pub mod selector;
pub mod wallet;

pub use self::error::{EngineError, EngineResult};
