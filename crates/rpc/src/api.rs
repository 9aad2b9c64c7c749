// This file is part of Opguard.
//
// Opguard is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opguard is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opguard.
// If not, see https://www.gnu.org/licenses/.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::U256;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use opguard_sim::{
    precheck,
    reputation::{ReputationEntry, ReputationManager},
    Simulator, SimulatorImpl,
};
use opguard_types::PackedUserOperation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error;

/// Response for an operation that passed every check.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<U256>,
}

#[rpc(server, namespace = "validator")]
pub trait ValidatorApi {
    /// Validates a user operation end to end: structure, gas bounds, and the
    /// simulated validation phase. Rejections come back as the ERC-4337
    /// error codes.
    #[method(name = "validateUserOperation")]
    async fn validate_user_operation(&self, op: Value) -> RpcResult<ValidationResponse>;

    /// Entry point addresses this validator simulates against.
    #[method(name = "supportedEntryPoints")]
    async fn supported_entry_points(&self) -> RpcResult<Vec<String>>;
}

/// Validator API backed by one simulator. The mutex serializes simulations;
/// the shared EVM state and reputation store require it.
pub struct ValidatorApiImpl<R> {
    simulator: Arc<Mutex<SimulatorImpl<R>>>,
}

impl<R: ReputationManager> ValidatorApiImpl<R> {
    pub fn new(simulator: Arc<Mutex<SimulatorImpl<R>>>) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl<R: ReputationManager> ValidatorApiServer for ValidatorApiImpl<R> {
    async fn validate_user_operation(&self, op: Value) -> RpcResult<ValidationResponse> {
        let precheck_result = precheck::validate_user_op_structure(&op);
        if !precheck_result.is_valid {
            return Err(error::structural_error(&precheck_result.errors));
        }
        let op = PackedUserOperation::from_json(&op)
            .map_err(|e| error::structural_error(&[e.to_string()]))?;

        let mut simulator = self.simulator.lock().await;
        precheck::check_verification_gas(&op, simulator.settings())
            .map_err(|e| error::structural_error(&[e]))?;
        let result = simulator.simulate_validation(&op);
        if !result.is_valid {
            return Err(error::simulation_error(&result));
        }
        Ok(ValidationResponse {
            gas_used: result.gas_used,
        })
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<String>> {
        let simulator = self.simulator.lock().await;
        Ok(vec![format!("{:?}", simulator.entry_point())])
    }
}

#[rpc(server, namespace = "debug_bundler")]
pub trait DebugApi {
    /// All reputation entries this validator tracks.
    #[method(name = "dumpReputation")]
    async fn dump_reputation(&self) -> RpcResult<Vec<ReputationEntry>>;

    /// Forgets every tracked entity.
    #[method(name = "clearReputation")]
    async fn clear_reputation(&self) -> RpcResult<String>;
}

pub struct DebugApiImpl<R> {
    reputation: Arc<R>,
}

impl<R: ReputationManager> DebugApiImpl<R> {
    pub fn new(reputation: Arc<R>) -> Self {
        Self { reputation }
    }
}

#[async_trait]
impl<R: ReputationManager> DebugApiServer for DebugApiImpl<R> {
    async fn dump_reputation(&self) -> RpcResult<Vec<ReputationEntry>> {
        Ok(self.reputation.dump())
    }

    async fn clear_reputation(&self) -> RpcResult<String> {
        for entry in self.reputation.dump() {
            self.reputation.clear(entry.address);
        }
        Ok("ok".to_string())
    }
}
