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

//! Pre-verification gas estimation.

use ethers::types::U256;
use opguard_types::PackedUserOperation;

/// Base cost of any transaction.
pub const TRANSACTION_BASE_GAS: u64 = 21_000;

/// Fixed per-operation overhead for carrying it inside a bundle.
pub const USER_OP_BUNDLE_OVERHEAD_GAS: u64 = 5_000;

/// Calldata price of a zero byte.
pub const CALLDATA_ZERO_BYTE_GAS: u64 = 4;

/// Calldata price of a non-zero byte.
pub const CALLDATA_NONZERO_BYTE_GAS: u64 = 16;

/// Lower bound for `preVerificationGas`: the bundler-side cost of carrying
/// the operation that no on-chain gas meter refunds.
pub fn calc_pre_verification_gas(op: &PackedUserOperation) -> U256 {
    let calldata_gas: u64 = op_data_bytes(op)
        .iter()
        .map(|byte| {
            if *byte == 0 {
                CALLDATA_ZERO_BYTE_GAS
            } else {
                CALLDATA_NONZERO_BYTE_GAS
            }
        })
        .sum();
    U256::from(TRANSACTION_BASE_GAS + USER_OP_BUNDLE_OVERHEAD_GAS + calldata_gas)
}

/// The nine operation fields as the flat byte string the estimate prices.
/// Numeric fields count as 32-byte big-endian words.
fn op_data_bytes(op: &PackedUserOperation) -> Vec<u8> {
    let mut nonce = [0u8; 32];
    op.nonce.to_big_endian(&mut nonce);
    let mut pre_verification_gas = [0u8; 32];
    op.pre_verification_gas
        .to_big_endian(&mut pre_verification_gas);
    [
        op.sender.as_bytes(),
        &nonce[..],
        &op.init_code[..],
        &op.call_data[..],
        op.account_gas_limits.as_bytes(),
        &pre_verification_gas[..],
        op.gas_fees.as_bytes(),
        &op.paymaster_and_data[..],
        &op.signature[..],
    ]
    .concat()
}

#[cfg(test)]
mod tests {
    use ethers::types::Bytes;

    use super::*;

    #[test]
    fn test_empty_op_minimum() {
        // 148 zero bytes across the fixed-width fields: sender (20) plus four
        // 32-byte words.
        let op = PackedUserOperation::default();
        assert_eq!(
            calc_pre_verification_gas(&op),
            U256::from(21_000 + 5_000 + 148 * 4)
        );
    }

    #[test]
    fn test_nonzero_bytes_cost_more() {
        let empty = calc_pre_verification_gas(&PackedUserOperation::default());
        let op = PackedUserOperation {
            call_data: Bytes::from(vec![0xff, 0x00, 0xff]),
            ..Default::default()
        };
        // Two non-zero bytes at 16 gas, one zero byte at 4.
        assert_eq!(
            calc_pre_verification_gas(&op),
            empty + U256::from(2 * 16 + 4)
        );
    }

    #[test]
    fn test_declared_value_feeds_its_own_minimum() {
        let op = PackedUserOperation {
            pre_verification_gas: U256::from(30_000),
            ..Default::default()
        };
        // 30000 = 0x7530, two of the word's zero bytes become non-zero.
        let empty = calc_pre_verification_gas(&PackedUserOperation::default());
        assert_eq!(
            calc_pre_verification_gas(&op),
            empty + U256::from(2 * (16 - 4))
        );
        assert!(op.pre_verification_gas > calc_pre_verification_gas(&op));
    }
}
