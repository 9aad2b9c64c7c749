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

use ethers::types::Address;
use opguard_types::EntityType;

use super::violation::SimulationViolation;

/// Mutable record for one simulation run.
///
/// The driver owns the context; the tracer borrows it for the duration of a
/// phase call. Violations are append-only and keep the order in which the
/// EVM visited the offending instructions.
#[derive(Debug)]
pub struct ValidationContext {
    entity: EntityType,
    sender: Address,
    entry_point: Address,
    factory: Option<Address>,
    paymaster: Option<Address>,
    violations: Vec<SimulationViolation>,
    throw_on_violation: bool,
}

impl ValidationContext {
    pub fn new(
        sender: Address,
        entry_point: Address,
        factory: Option<Address>,
        paymaster: Option<Address>,
        throw_on_violation: bool,
    ) -> Self {
        Self {
            entity: EntityType::Account,
            sender,
            entry_point,
            factory,
            paymaster,
            violations: Vec::new(),
            throw_on_violation,
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// Moves to the entity whose phase is about to run. Called only at phase
    /// boundaries, never mid-instruction.
    pub fn set_entity(&mut self, entity: EntityType) {
        debug_assert!(
            entity != EntityType::Factory || self.factory.is_some(),
            "factory phase without a factory"
        );
        debug_assert!(
            entity != EntityType::Paymaster || self.paymaster.is_some(),
            "paymaster phase without a paymaster"
        );
        self.entity = entity;
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub fn factory(&self) -> Option<Address> {
        self.factory
    }

    pub fn paymaster(&self) -> Option<Address> {
        self.paymaster
    }

    /// Appends a violation. Returns true when the caller must abort the
    /// current execution because the context is in throw mode.
    pub fn record_violation(&mut self, violation: SimulationViolation) -> bool {
        self.violations.push(violation);
        self.throw_on_violation
    }

    pub fn violations(&self) -> &[SimulationViolation] {
        &self.violations
    }

    pub fn has_violations_for(&self, entity: EntityType) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.entity() == entity)
    }

    pub fn into_violations(self) -> Vec<SimulationViolation> {
        self.violations
    }
}
