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

//! Per-entity storage access rules.

use ethers::types::Address;
use opguard_types::EntityType;

use super::context::ValidationContext;

/// Outcome of checking one SLOAD/SSTORE against the entity rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageRestriction {
    Allowed,
    Banned,
}

/// Decides whether the active entity may touch storage owned by
/// `accessed_address`. First match wins:
///
/// 1. the entry point itself is exempt,
/// 2. entry-point-owned storage (deposits, stakes) is readable by everyone,
/// 3. the account may touch its own storage,
/// 4. the factory may touch its own storage and the account it deploys,
/// 5. the paymaster may touch its own storage,
/// 6. everything else is banned.
///
/// The check is a pure predicate over slot ownership; associated mapping
/// slots (`keccak256(address || p)`) are not recognized.
pub fn get_storage_restriction(
    context: &ValidationContext,
    entity: EntityType,
    accessed_address: Address,
) -> StorageRestriction {
    match entity {
        EntityType::EntryPoint => StorageRestriction::Allowed,
        _ if accessed_address == context.entry_point() => StorageRestriction::Allowed,
        EntityType::Account if accessed_address == context.sender() => StorageRestriction::Allowed,
        EntityType::Factory
            if Some(accessed_address) == context.factory()
                || accessed_address == context.sender() =>
        {
            StorageRestriction::Allowed
        }
        EntityType::Paymaster if Some(accessed_address) == context.paymaster() => {
            StorageRestriction::Allowed
        }
        _ => StorageRestriction::Banned,
    }
}
