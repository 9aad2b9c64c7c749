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

use std::str::FromStr;

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// An ERC-4337 v0.7 user operation in its packed on-chain representation.
///
/// The two 32-byte fields each hold a pair of 128-bit values; the unpack
/// accessors split them. `initCode` and `paymasterAndData` declare the
/// factory and paymaster participants by a length prefix.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedUserOperation {
    /// The smart account issuing the operation.
    pub sender: Address,
    /// High 192 bits are the nonce key, low 64 bits the sequence.
    pub nonce: U256,
    /// Either empty or `factory (20 bytes) || factoryData`.
    pub init_code: Bytes,
    /// Data passed to the sender during the execution phase.
    pub call_data: Bytes,
    /// `verificationGasLimit (16 bytes) || callGasLimit (16 bytes)`.
    pub account_gas_limits: H256,
    /// Gas to compensate the bundler for pre-execution work.
    pub pre_verification_gas: U256,
    /// `maxPriorityFeePerGas (16 bytes) || maxFeePerGas (16 bytes)`.
    pub gas_fees: H256,
    /// Either empty or `paymaster (20 bytes) || pmVerificationGasLimit (16)
    /// || pmPostOpGasLimit (16) || paymasterData`.
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Error building a [`PackedUserOperation`] from a loose JSON record.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum UserOperationParseError {
    #[error("user operation must be a JSON object")]
    NotAnObject,
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("invalid field {0}: {1}")]
    InvalidField(&'static str, String),
}

impl PackedUserOperation {
    /// Address of the account factory, when `initCode` declares one.
    pub fn factory(&self) -> Option<Address> {
        Self::get_address_from_field(&self.init_code)
    }

    /// Address of the paymaster, when `paymasterAndData` declares one.
    pub fn paymaster(&self) -> Option<Address> {
        Self::get_address_from_field(&self.paymaster_and_data)
    }

    /// Extracts an address from the beginning of a packed data field.
    ///
    /// Presence is defined by length alone, so an all-zero prefix still
    /// counts as a declared participant.
    pub fn get_address_from_field(data: &Bytes) -> Option<Address> {
        if data.len() < 20 {
            None
        } else {
            Some(Address::from_slice(&data[..20]))
        }
    }

    /// The factory call input, the bytes of `initCode` after the address.
    pub fn factory_data(&self) -> Bytes {
        if self.init_code.len() < 20 {
            Bytes::default()
        } else {
            Bytes::from(self.init_code[20..].to_vec())
        }
    }

    pub fn verification_gas_limit(&self) -> U256 {
        U256::from_big_endian(&self.account_gas_limits.as_bytes()[..16])
    }

    pub fn call_gas_limit(&self) -> U256 {
        U256::from_big_endian(&self.account_gas_limits.as_bytes()[16..])
    }

    pub fn max_priority_fee_per_gas(&self) -> U256 {
        U256::from_big_endian(&self.gas_fees.as_bytes()[..16])
    }

    pub fn max_fee_per_gas(&self) -> U256 {
        U256::from_big_endian(&self.gas_fees.as_bytes()[16..])
    }

    /// High 192 bits of the nonce.
    pub fn nonce_key(&self) -> U256 {
        self.nonce >> 64
    }

    /// Low 64 bits of the nonce.
    pub fn nonce_sequence(&self) -> u64 {
        self.nonce.low_u64()
    }

    /// Builds the typed operation from a loose JSON record.
    ///
    /// Byte fields must be `0x`-prefixed even-length hex. The numeric fields
    /// accept either a JSON integer, a decimal string, or `0x` hex of any
    /// length.
    pub fn from_json(value: &Value) -> Result<Self, UserOperationParseError> {
        let obj = value
            .as_object()
            .ok_or(UserOperationParseError::NotAnObject)?;
        let sender = str_field(obj, "sender")?;
        let sender = Address::from_str(sender)
            .map_err(|e| UserOperationParseError::InvalidField("sender", e.to_string()))?;
        Ok(Self {
            sender,
            nonce: quantity_field(obj, "nonce")?,
            init_code: bytes_field(obj, "initCode")?,
            call_data: bytes_field(obj, "callData")?,
            account_gas_limits: word_field(obj, "accountGasLimits")?,
            pre_verification_gas: quantity_field(obj, "preVerificationGas")?,
            gas_fees: word_field(obj, "gasFees")?,
            paymaster_and_data: bytes_field(obj, "paymasterAndData")?,
            signature: bytes_field(obj, "signature")?,
        })
    }
}

fn str_field<'a>(
    obj: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, UserOperationParseError> {
    obj.get(name)
        .ok_or(UserOperationParseError::MissingField(name))?
        .as_str()
        .ok_or_else(|| UserOperationParseError::InvalidField(name, "expected a string".to_string()))
}

fn quantity_field(
    obj: &Map<String, Value>,
    name: &'static str,
) -> Result<U256, UserOperationParseError> {
    match obj.get(name) {
        None => Err(UserOperationParseError::MissingField(name)),
        Some(Value::Number(n)) => n.as_u64().map(U256::from).ok_or_else(|| {
            UserOperationParseError::InvalidField(name, "expected an unsigned integer".to_string())
        }),
        Some(Value::String(s)) => match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16)
                .map_err(|e| UserOperationParseError::InvalidField(name, e.to_string())),
            None => U256::from_dec_str(s)
                .map_err(|e| UserOperationParseError::InvalidField(name, e.to_string())),
        },
        Some(_) => Err(UserOperationParseError::InvalidField(
            name,
            "expected an integer or a quantity string".to_string(),
        )),
    }
}

fn bytes_field(
    obj: &Map<String, Value>,
    name: &'static str,
) -> Result<Bytes, UserOperationParseError> {
    let text = str_field(obj, name)?;
    let hex_digits = text.strip_prefix("0x").ok_or_else(|| {
        UserOperationParseError::InvalidField(name, "expected a 0x-prefixed hex string".to_string())
    })?;
    hex::decode(hex_digits)
        .map(Bytes::from)
        .map_err(|e| UserOperationParseError::InvalidField(name, e.to_string()))
}

fn word_field(
    obj: &Map<String, Value>,
    name: &'static str,
) -> Result<H256, UserOperationParseError> {
    let bytes = bytes_field(obj, name)?;
    if bytes.len() != 32 {
        return Err(UserOperationParseError::InvalidField(
            name,
            format!("expected 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(H256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_get_address_from_field() {
        let paymaster_and_data: Bytes =
            "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
                .parse()
                .unwrap();
        let address = PackedUserOperation::get_address_from_field(&paymaster_and_data).unwrap();
        assert_eq!(
            address,
            "0x0123456789abcdef0123456789abcdef01234567"
                .parse()
                .unwrap()
        );
    }

    #[test]
    fn test_short_field_has_no_address() {
        let init_code: Bytes = "0x0123456789abcdef".parse().unwrap();
        assert_eq!(PackedUserOperation::get_address_from_field(&init_code), None);
    }

    #[test]
    fn test_all_zero_factory_counts_as_present() {
        let op = PackedUserOperation {
            init_code: Bytes::from(vec![0u8; 20]),
            ..Default::default()
        };
        assert_eq!(op.factory(), Some(Address::zero()));
        assert!(op.factory_data().is_empty());
    }

    #[test]
    fn test_factory_data_strips_the_address() {
        let mut init_code = vec![0xaau8; 20];
        init_code.extend_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x90]);
        let op = PackedUserOperation {
            init_code: Bytes::from(init_code),
            ..Default::default()
        };
        assert_eq!(
            op.factory(),
            Some("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap())
        );
        assert_eq!(
            op.factory_data(),
            Bytes::from(vec![0x12, 0x34, 0x56, 0x78, 0x90])
        );
    }

    #[test]
    fn test_unpack_account_gas_limits() {
        let mut packed = [0u8; 32];
        packed[15] = 0x01; // verificationGasLimit = 1
        packed[31] = 0x02; // callGasLimit = 2
        let op = PackedUserOperation {
            account_gas_limits: H256(packed),
            ..Default::default()
        };
        assert_eq!(op.verification_gas_limit(), U256::from(1));
        assert_eq!(op.call_gas_limit(), U256::from(2));
    }

    #[test]
    fn test_unpack_gas_fees() {
        let mut packed = [0u8; 32];
        packed[15] = 0x0a; // maxPriorityFeePerGas = 10
        packed[30] = 0x01; // maxFeePerGas = 256
        let op = PackedUserOperation {
            gas_fees: H256(packed),
            ..Default::default()
        };
        assert_eq!(op.max_priority_fee_per_gas(), U256::from(10));
        assert_eq!(op.max_fee_per_gas(), U256::from(256));
    }

    #[test]
    fn test_nonce_key_and_sequence() {
        let nonce = (U256::from(7) << 64) | U256::from(42);
        let op = PackedUserOperation {
            nonce,
            ..Default::default()
        };
        assert_eq!(op.nonce_key(), U256::from(7));
        assert_eq!(op.nonce_sequence(), 42);
    }

    #[test]
    fn test_from_json_round_trip() {
        let value = json!({
            "sender": "0x1234567890123456789012345678901234567890",
            "nonce": "0x1",
            "initCode": "0x",
            "callData": "0xb61d27f6",
            "accountGasLimits": format!("0x{}", "00".repeat(32)),
            "preVerificationGas": 50000,
            "gasFees": format!("0x{}", "00".repeat(32)),
            "paymasterAndData": "0x",
            "signature": "0x",
        });
        let op = PackedUserOperation::from_json(&value).unwrap();
        assert_eq!(
            op.sender,
            "0x1234567890123456789012345678901234567890"
                .parse()
                .unwrap()
        );
        assert_eq!(op.nonce, U256::from(1));
        assert_eq!(op.pre_verification_gas, U256::from(50000));
        assert_eq!(op.call_data, Bytes::from(vec![0xb6, 0x1d, 0x27, 0xf6]));
        assert_eq!(op.factory(), None);
        assert_eq!(op.paymaster(), None);
    }

    #[test]
    fn test_from_json_accepts_odd_length_quantity_hex() {
        let value = json!({
            "sender": "0x1234567890123456789012345678901234567890",
            "nonce": "0x123",
            "initCode": "0x",
            "callData": "0x",
            "accountGasLimits": format!("0x{}", "00".repeat(32)),
            "preVerificationGas": "0x0",
            "gasFees": format!("0x{}", "00".repeat(32)),
            "paymasterAndData": "0x",
            "signature": "0x",
        });
        let op = PackedUserOperation::from_json(&value).unwrap();
        assert_eq!(op.nonce, U256::from(0x123));
    }

    #[test]
    fn test_from_json_rejects_missing_field() {
        let value = json!({ "sender": "0x1234567890123456789012345678901234567890" });
        assert_eq!(
            PackedUserOperation::from_json(&value),
            Err(UserOperationParseError::MissingField("nonce"))
        );
    }

    #[test]
    fn test_from_json_rejects_short_gas_limits() {
        let value = json!({
            "sender": "0x1234567890123456789012345678901234567890",
            "nonce": 0,
            "initCode": "0x",
            "callData": "0x",
            "accountGasLimits": "0x00",
            "preVerificationGas": 0,
            "gasFees": format!("0x{}", "00".repeat(32)),
            "paymasterAndData": "0x",
            "signature": "0x",
        });
        assert!(matches!(
            PackedUserOperation::from_json(&value),
            Err(UserOperationParseError::InvalidField("accountGasLimits", _))
        ));
    }
}
