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

//! ERC-4337 RPC error codes and the mapping from simulation outcomes.

use jsonrpsee::types::ErrorObject;
use opguard_sim::simulation::SimulationViolation;
use opguard_sim::SimulationResult;

/// Operation rejected by the entry point or failed structural checks.
pub const ENTRY_POINT_REJECTED_CODE: i32 = -32500;
/// Operation rejected during the paymaster phase.
pub const PAYMASTER_REJECTED_CODE: i32 = -32501;
/// A banned opcode or entity restriction was hit during validation.
pub const OPCODE_VALIDATION_CODE: i32 = -32502;
/// Forbidden storage was accessed during validation.
pub const STORAGE_VALIDATION_CODE: i32 = -32503;
/// A participating entity is throttled.
pub const THROTTLED_ENTITY_CODE: i32 = -32504;
/// A participating entity is banned.
pub const BANNED_ENTITY_CODE: i32 = -32505;
/// The operation signature is invalid. Passed through for callers that run
/// signature recovery; nothing in this engine produces it.
pub const INVALID_SIGNATURE_CODE: i32 = -32506;
/// The operation nonce is invalid. Passed through like the signature code.
pub const INVALID_NONCE_CODE: i32 = -32507;

/// Error for an operation that failed the structural checks.
pub fn structural_error(errors: &[String]) -> ErrorObject<'static> {
    ErrorObject::owned(ENTRY_POINT_REJECTED_CODE, errors.join("; "), None::<bool>)
}

/// Maps a failed simulation onto the ERC-4337 error space. The first
/// violation wins; reputation refusals are recognized by their textual
/// markers.
pub fn simulation_error(result: &SimulationResult) -> ErrorObject<'static> {
    if let Some(violation) = result.violations.first() {
        let code = match violation {
            SimulationViolation::InvalidStorageAccess { .. } => STORAGE_VALIDATION_CODE,
            _ => OPCODE_VALIDATION_CODE,
        };
        return ErrorObject::owned(code, violation.to_string(), None::<bool>);
    }
    let code = if result.errors.iter().any(|e| e.contains("is BANNED")) {
        BANNED_ENTITY_CODE
    } else if result.errors.iter().any(|e| e.contains("is THROTTLED")) {
        THROTTLED_ENTITY_CODE
    } else if result.errors.iter().any(|e| e.starts_with("paymaster")) {
        PAYMASTER_REJECTED_CODE
    } else {
        ENTRY_POINT_REJECTED_CODE
    };
    ErrorObject::owned(code, result.errors.join("; "), None::<bool>)
}

#[cfg(test)]
mod tests {
    use ethers::types::{Address, H256};
    use opguard_types::EntityType;

    use super::*;

    fn failed(errors: Vec<&str>, violations: Vec<SimulationViolation>) -> SimulationResult {
        SimulationResult {
            is_valid: false,
            errors: errors.into_iter().map(str::to_string).collect(),
            violations,
            gas_used: None,
        }
    }

    #[test]
    fn test_banned_opcode_maps_to_opcode_code() {
        let result = failed(
            vec![],
            vec![SimulationViolation::BannedOpcode {
                entity: EntityType::Account,
                opcode: opguard_sim::simulation::ViolationOpCode(0x42),
                pc: 0,
            }],
        );
        let error = simulation_error(&result);
        assert_eq!(error.code(), OPCODE_VALIDATION_CODE);
        assert!(error.message().contains("TIMESTAMP"));
    }

    #[test]
    fn test_storage_violation_maps_to_storage_code() {
        let result = failed(
            vec![],
            vec![SimulationViolation::InvalidStorageAccess {
                entity: EntityType::Paymaster,
                address: Address::zero(),
                slot: H256::zero(),
                pc: 0,
            }],
        );
        assert_eq!(simulation_error(&result).code(), STORAGE_VALIDATION_CODE);
    }

    #[test]
    fn test_reputation_markers_map_to_their_codes() {
        let banned = failed(vec!["paymaster 0x… is BANNED"], vec![]);
        assert_eq!(simulation_error(&banned).code(), BANNED_ENTITY_CODE);

        let throttled = failed(vec!["factory 0x… is THROTTLED"], vec![]);
        assert_eq!(simulation_error(&throttled).code(), THROTTLED_ENTITY_CODE);
    }

    #[test]
    fn test_paymaster_phase_error_maps_to_paymaster_code() {
        let result = failed(vec!["paymaster: execution reverted: 0x"], vec![]);
        assert_eq!(simulation_error(&result).code(), PAYMASTER_REJECTED_CODE);
    }

    #[test]
    fn test_other_errors_map_to_entry_point_code() {
        let result = failed(vec!["account: execution reverted: 0x"], vec![]);
        assert_eq!(simulation_error(&result).code(), ENTRY_POINT_REJECTED_CODE);

        let structural = structural_error(&["missing field nonce".to_string()]);
        assert_eq!(structural.code(), ENTRY_POINT_REJECTED_CODE);
    }
}
