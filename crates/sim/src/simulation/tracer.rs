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

//! Per-instruction enforcement of the validation rules.

use opguard_types::EntityType;
use revm::{
    interpreter::{InstructionResult, Interpreter},
    Database, EVMData, Inspector,
};

use super::{
    context::ValidationContext,
    opcodes::{self, OpcodeRule},
    storage::{self, StorageRestriction},
    violation::{SimulationViolation, ViolationOpCode},
};
use crate::eth;

/// Step hook applying the opcode, creation, and storage rules to every
/// executed instruction.
///
/// The tracer borrows the context for the duration of one EVM call and is
/// dropped when the call returns, so a hook can neither leak past a
/// simulation nor be attached twice.
#[derive(Debug)]
pub struct ValidationTracer<'a> {
    context: &'a mut ValidationContext,
}

impl<'a> ValidationTracer<'a> {
    pub fn new(context: &'a mut ValidationContext) -> Self {
        Self { context }
    }

    /// Applies the rules to one instruction. Returns true when execution
    /// must abort because the context is in throw mode.
    fn check_step(&mut self, op: u8, pc: u64, interp: &Interpreter) -> bool {
        let entity = self.context.entity();
        match opcodes::classify(op) {
            OpcodeRule::Banned => {
                self.context
                    .record_violation(SimulationViolation::BannedOpcode {
                        entity,
                        opcode: ViolationOpCode(op),
                        pc,
                    })
            }
            OpcodeRule::ContractCreation if entity != EntityType::Factory => {
                self.context
                    .record_violation(SimulationViolation::EntityRestriction {
                        entity,
                        opcode: ViolationOpCode(op),
                        pc,
                    })
            }
            OpcodeRule::StorageAccess => {
                // The slot is the top stack element; a missing one is a stack
                // underflow the interpreter reports on its own.
                let Ok(slot) = interp.stack.peek(0) else {
                    return false;
                };
                let accessed_address = eth::from_revm_address(interp.contract.address);
                match storage::get_storage_restriction(self.context, entity, accessed_address) {
                    StorageRestriction::Allowed => false,
                    StorageRestriction::Banned => {
                        self.context
                            .record_violation(SimulationViolation::InvalidStorageAccess {
                                entity,
                                address: accessed_address,
                                slot: eth::word_from_revm_u256(slot),
                                pc,
                            })
                    }
                }
            }
            _ => false,
        }
    }
}

impl<'a, DB: Database> Inspector<DB> for ValidationTracer<'a> {
    fn step(&mut self, interp: &mut Interpreter, _data: &mut EVMData<'_, DB>) -> InstructionResult {
        let op = interp.current_opcode();
        let pc = interp.program_counter() as u64;
        if self.check_step(op, pc, interp) {
            // Throw mode: the first violation aborts the current phase.
            InstructionResult::Revert
        } else {
            InstructionResult::Continue
        }
    }
}
