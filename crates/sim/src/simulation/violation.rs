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

use std::fmt;

use ethers::types::{Address, H256};
use opguard_types::EntityType;
use parse_display::Display;
use serde::{Serialize, Serializer};

use super::opcodes;

/// Opcode cited by a violation, displayed as its mnemonic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ViolationOpCode(pub u8);

impl fmt::Display for ViolationOpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&opcodes::opcode_name(self.0))
    }
}

impl Serialize for ViolationOpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A rule break observed while stepping entity code during validation.
#[derive(Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum SimulationViolation {
    /// An opcode whose result depends on block-level state was executed.
    #[display("{entity} uses banned opcode: {opcode} at pc {pc}")]
    BannedOpcode {
        entity: EntityType,
        opcode: ViolationOpCode,
        pc: u64,
    },
    /// A storage slot was touched that the entity rules do not grant.
    #[display("{entity} accessed forbidden storage slot {slot:?} owned by {address:?} at pc {pc}")]
    InvalidStorageAccess {
        entity: EntityType,
        /// Account whose storage was targeted.
        address: Address,
        slot: H256,
        pc: u64,
    },
    /// Contract creation was attempted outside factory code.
    #[display("{entity} used {opcode} but contract creation is only permitted for the factory")]
    EntityRestriction {
        entity: EntityType,
        opcode: ViolationOpCode,
        pc: u64,
    },
}

impl SimulationViolation {
    /// Entity whose phase was active when the violation was recorded.
    pub fn entity(&self) -> EntityType {
        match self {
            Self::BannedOpcode { entity, .. }
            | Self::InvalidStorageAccess { entity, .. }
            | Self::EntityRestriction { entity, .. } => *entity,
        }
    }

    /// Program counter of the offending instruction.
    pub fn program_counter(&self) -> u64 {
        match self {
            Self::BannedOpcode { pc, .. }
            | Self::InvalidStorageAccess { pc, .. }
            | Self::EntityRestriction { pc, .. } => *pc,
        }
    }
}
