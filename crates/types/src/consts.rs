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

//! Protocol constants.

use ethers::types::Address;

/// Canonical EntryPoint v0.7 deployment address.
pub const ENTRY_POINT_ADDRESS_V0_7: &str = "0x0000000071727De22E5E9d8BAf0edAc6f37da032";

/// Selector of `validateUserOp(PackedUserOperation,bytes32,uint256)`.
pub const VALIDATE_USER_OP_SELECTOR: [u8; 4] = [0x19, 0x82, 0x2f, 0x7c];

/// Selector of `validatePaymasterUserOp(PackedUserOperation,bytes32,uint256)`.
pub const VALIDATE_PAYMASTER_USER_OP_SELECTOR: [u8; 4] = [0x52, 0xb7, 0x51, 0x2c];

/// The EntryPoint address used when none is configured.
pub fn default_entry_point() -> Address {
    ENTRY_POINT_ADDRESS_V0_7
        .parse()
        .expect("entry point constant should be a valid address")
}
