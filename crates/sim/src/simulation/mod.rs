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

//! Validation-phase simulation.
//!
//! The driver runs up to three sub-calls against the embedded EVM, factory
//! deployment, sender `validateUserOp`, and paymaster
//! `validatePaymasterUserOp`, with the step tracer attached for each, then
//! settles reputation for the involved entities.

mod context;
mod environment;
pub mod opcodes;
mod storage;
mod tracer;
mod violation;

use std::sync::Arc;

use ethers::{
    abi::{encode, Token},
    types::{Address, Bytes, U256},
};
#[cfg(test)]
use mockall::automock;
use opguard_types::{
    consts::{VALIDATE_PAYMASTER_USER_OP_SELECTOR, VALIDATE_USER_OP_SELECTOR},
    EntityType, PackedUserOperation,
};
use serde::Serialize;
use tracing::debug;

pub use context::ValidationContext;
pub use environment::{AccountSnapshot, CallOutcome, SimulationEnvironment, StateSnapshot};
pub use storage::{get_storage_restriction, StorageRestriction};
pub use tracer::ValidationTracer;
pub use violation::{SimulationViolation, ViolationOpCode};

use crate::reputation::{ReputationManager, ReputationStatus};

/// Simulation settings.
#[derive(Debug, Copy, Clone)]
pub struct Settings {
    /// Gas bound for each validation sub-call.
    pub sim_gas_limit: u64,
    /// Maximum verification gas limit an operation may declare.
    pub max_verification_gas: u64,
    /// Failure count at which an entity is throttled.
    pub throttle_threshold: u64,
    /// Failure count at which an entity is banned.
    pub ban_threshold: u64,
}

impl Settings {
    pub fn new(
        sim_gas_limit: u64,
        max_verification_gas: u64,
        throttle_threshold: u64,
        ban_threshold: u64,
    ) -> Self {
        Self {
            sim_gas_limit,
            max_verification_gas,
            throttle_threshold,
            ban_threshold,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // generous bound, validation code is expected to stay well under it
            sim_gas_limit: 1_000_000,
            max_verification_gas: 5_000_000,
            throttle_threshold: crate::reputation::THROTTLE_THRESHOLD,
            ban_threshold: crate::reputation::BAN_THRESHOLD,
        }
    }
}

/// Aggregate outcome of simulating one operation.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// True iff no errors and no violations were collected.
    pub is_valid: bool,
    /// Execution and admission errors: reverts, halts, reputation refusals.
    pub errors: Vec<String>,
    /// Rule breaks, in the order the EVM visited them.
    pub violations: Vec<SimulationViolation>,
    /// Total gas used by the phases that ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<U256>,
}

/// Runs validation-phase simulations.
#[cfg_attr(test, automock)]
pub trait Simulator: Send + Sync + 'static {
    /// Simulates the validation phases of an operation that already passed
    /// structural checks.
    fn simulate_validation(&mut self, op: &PackedUserOperation) -> SimulationResult;
}

/// Driver owning the embedded EVM, the reputation store handle, and the
/// settings for one validation pipeline.
pub struct SimulatorImpl<R> {
    entry_point: Address,
    environment: SimulationEnvironment,
    reputation: Arc<R>,
    settings: Settings,
}

impl<R: ReputationManager> SimulatorImpl<R> {
    pub fn new(entry_point: Address, reputation: Arc<R>, settings: Settings) -> Self {
        Self {
            entry_point,
            environment: SimulationEnvironment::new(),
            reputation,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// The embedded EVM state, for seeding code and storage.
    pub fn environment_mut(&mut self) -> &mut SimulationEnvironment {
        &mut self.environment
    }

    fn run_phase(
        &mut self,
        ctx: &mut ValidationContext,
        entity: EntityType,
        to: Address,
        data: Bytes,
    ) -> CallOutcome {
        ctx.set_entity(entity);
        debug!("running {entity} validation phase against {to:?}");
        self.environment.run_call(
            to,
            self.entry_point,
            data,
            self.settings.sim_gas_limit,
            ValidationTracer::new(ctx),
        )
    }
}

impl<R: ReputationManager> Simulator for SimulatorImpl<R> {
    fn simulate_validation(&mut self, op: &PackedUserOperation) -> SimulationResult {
        let factory = op.factory();
        let paymaster = op.paymaster();
        let mut errors = Vec::new();

        // A banned or throttled entity must not get to consume validation
        // CPU, so a flagged participant skips execution entirely.
        let participants = [
            (EntityType::Factory, factory),
            (EntityType::Paymaster, paymaster),
        ];
        for (kind, address) in participants {
            let Some(address) = address else { continue };
            match self.reputation.status(address) {
                ReputationStatus::Ok => {}
                status => errors.push(format!("{kind} {address:?} is {status}")),
            }
        }

        let mut ctx =
            ValidationContext::new(op.sender, self.entry_point, factory, paymaster, false);
        let mut gas_used = None;
        if errors.is_empty() {
            let mut total: u64 = 0;

            if let Some(factory) = factory {
                let outcome =
                    self.run_phase(&mut ctx, EntityType::Factory, factory, op.factory_data());
                total = total.saturating_add(outcome.gas_used);
                if let Some(error) = outcome.error {
                    errors.push(format!("factory: {error}"));
                }
            }

            let outcome = self.run_phase(
                &mut ctx,
                EntityType::Account,
                op.sender,
                validate_user_op_calldata(op),
            );
            total = total.saturating_add(outcome.gas_used);
            if let Some(error) = outcome.error {
                errors.push(format!("account: {error}"));
            }

            if let Some(paymaster) = paymaster {
                let outcome = self.run_phase(
                    &mut ctx,
                    EntityType::Paymaster,
                    paymaster,
                    validate_paymaster_user_op_calldata(op),
                );
                total = total.saturating_add(outcome.gas_used);
                if let Some(error) = outcome.error {
                    errors.push(format!("paymaster: {error}"));
                }
            }

            gas_used = Some(U256::from(total));
        }

        // Reputation settles after all phases so a run never observes its
        // own updates. Only rule violations attributed to the entity count
        // as failures; reverts and halts do not.
        if let Some(factory) = factory {
            self.reputation
                .update(factory, !ctx.has_violations_for(EntityType::Factory));
        }
        if let Some(paymaster) = paymaster {
            self.reputation
                .update(paymaster, !ctx.has_violations_for(EntityType::Paymaster));
        }

        let violations = ctx.into_violations();
        SimulationResult {
            is_valid: errors.is_empty() && violations.is_empty(),
            errors,
            violations,
            gas_used,
        }
    }
}

/// `validateUserOp` calldata: selector, the ABI-encoded packed operation, a
/// zeroed operation hash, and zero missing account funds.
fn validate_user_op_calldata(op: &PackedUserOperation) -> Bytes {
    encode_validation_call(&VALIDATE_USER_OP_SELECTOR, op)
}

/// `validatePaymasterUserOp` calldata, with zero max cost.
fn validate_paymaster_user_op_calldata(op: &PackedUserOperation) -> Bytes {
    encode_validation_call(&VALIDATE_PAYMASTER_USER_OP_SELECTOR, op)
}

fn encode_validation_call(selector: &[u8; 4], op: &PackedUserOperation) -> Bytes {
    let packed_op = Token::Tuple(vec![
        Token::Address(op.sender),
        Token::Uint(op.nonce),
        Token::Bytes(op.init_code.to_vec()),
        Token::Bytes(op.call_data.to_vec()),
        Token::FixedBytes(op.account_gas_limits.as_bytes().to_vec()),
        Token::Uint(op.pre_verification_gas),
        Token::FixedBytes(op.gas_fees.as_bytes().to_vec()),
        Token::Bytes(op.paymaster_and_data.to_vec()),
        Token::Bytes(op.signature.to_vec()),
    ]);
    // The hash argument stays zeroed since hash recovery is out of scope;
    // the final word covers missingAccountFunds and maxCost alike.
    let arguments = encode(&[
        packed_op,
        Token::FixedBytes(vec![0; 32]),
        Token::Uint(U256::zero()),
    ]);
    let mut data = selector.to_vec();
    data.extend(arguments);
    Bytes::from(data)
}
