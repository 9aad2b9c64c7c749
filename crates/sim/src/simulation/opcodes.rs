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

//! Static classification of opcodes for the validation phase.

use revm::interpreter::opcode;

/// How an opcode is treated while validation code runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpcodeRule {
    /// The result depends on block-level or global state, so the validation
    /// outcome could differ between mempool admission and inclusion time.
    Banned,
    /// CREATE and CREATE2, permitted only while factory code runs.
    ContractCreation,
    /// SLOAD and SSTORE, subject to the per-entity storage rules.
    StorageAccess,
    /// No validation-phase restriction.
    Neutral,
}

/// Classifies an opcode.
pub fn classify(op: u8) -> OpcodeRule {
    match op {
        opcode::GASPRICE
        | opcode::BLOCKHASH
        | opcode::COINBASE
        | opcode::TIMESTAMP
        | opcode::NUMBER
        | opcode::DIFFICULTY
        | opcode::GASLIMIT
        | opcode::SELFBALANCE
        | opcode::BASEFEE => OpcodeRule::Banned,
        opcode::CREATE | opcode::CREATE2 => OpcodeRule::ContractCreation,
        opcode::SLOAD | opcode::SSTORE => OpcodeRule::StorageAccess,
        _ => OpcodeRule::Neutral,
    }
}

/// Printable mnemonic for an opcode, `0xNN` when unassigned.
pub fn opcode_name(op: u8) -> String {
    match opcode::OPCODE_JUMPMAP[op as usize] {
        Some(name) => name.to_string(),
        None => format!("0x{op:02x}"),
    }
}
