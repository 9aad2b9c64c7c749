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

//! Static checks run before any simulation.

use std::str::FromStr;

use ethers::types::{Address, U256};
use opguard_types::PackedUserOperation;
use serde_json::Value;

use crate::{gas, simulation::Settings};

/// Outcome of the structural checks over a loose JSON record.
#[derive(Clone, Debug, Default)]
pub struct PrecheckResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

const REQUIRED_FIELDS: [&str; 9] = [
    "sender",
    "nonce",
    "initCode",
    "callData",
    "accountGasLimits",
    "preVerificationGas",
    "gasFees",
    "paymasterAndData",
    "signature",
];

const BYTE_FIELDS: [&str; 6] = [
    "initCode",
    "callData",
    "accountGasLimits",
    "gasFees",
    "paymasterAndData",
    "signature",
];

const WORD_FIELDS: [&str; 2] = ["accountGasLimits", "gasFees"];

const QUANTITY_FIELDS: [&str; 2] = ["nonce", "preVerificationGas"];

/// Checks that a loose JSON record is a well-formed packed user operation
/// whose declared pre-verification gas covers the computed minimum.
///
/// Collects every error it can find; never panics, never throws.
pub fn validate_user_op_structure(value: &Value) -> PrecheckResult {
    let mut errors = Vec::new();
    let Some(obj) = value.as_object() else {
        return PrecheckResult {
            is_valid: false,
            errors: vec!["user operation must be a JSON object".to_string()],
        };
    };

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            errors.push(format!("missing field {field}"));
        }
    }

    if let Some(sender) = obj.get("sender") {
        match sender.as_str().map(Address::from_str) {
            Some(Ok(_)) => {}
            _ => errors.push("sender must be a 20-byte hex address".to_string()),
        }
    }

    for field in BYTE_FIELDS {
        let Some(value) = obj.get(field) else {
            continue;
        };
        match value.as_str() {
            Some(text) if is_even_hex(text) => {}
            _ => errors.push(format!("{field} must be 0x-prefixed hex of even length")),
        }
    }

    for field in WORD_FIELDS {
        let Some(text) = obj.get(field).and_then(Value::as_str) else {
            continue;
        };
        if is_even_hex(text) && text.len() != 66 {
            errors.push(format!("{field} must be exactly 32 bytes"));
        }
    }

    for field in QUANTITY_FIELDS {
        let Some(value) = obj.get(field) else {
            continue;
        };
        if !is_quantity(value) {
            errors.push(format!("{field} must be an integer or hex quantity"));
        }
    }

    if errors.is_empty() {
        match PackedUserOperation::from_json(value) {
            Ok(op) => {
                let required = gas::calc_pre_verification_gas(&op);
                if op.pre_verification_gas < required {
                    errors.push(format!(
                        "preVerificationGas {} is below the required minimum {required}",
                        op.pre_verification_gas
                    ));
                }
            }
            Err(error) => errors.push(error.to_string()),
        }
    }

    PrecheckResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Rejects operations declaring more verification gas than the bundler is
/// willing to spend simulating them.
pub fn check_verification_gas(op: &PackedUserOperation, settings: &Settings) -> Result<(), String> {
    let declared = op.verification_gas_limit();
    if declared > U256::from(settings.max_verification_gas) {
        return Err(format!(
            "verificationGasLimit {declared} is above the maximum {}",
            settings.max_verification_gas
        ));
    }
    Ok(())
}

fn is_even_hex(text: &str) -> bool {
    match text.strip_prefix("0x") {
        Some(digits) => digits.len() % 2 == 0 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Integer, decimal string, or hex string of any length.
fn is_quantity(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64().is_some(),
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::H256;
    use serde_json::json;

    use super::*;

    fn well_formed_op() -> Value {
        json!({
            "sender": "0x1234567890123456789012345678901234567890",
            "nonce": 0,
            "initCode": "0x",
            "callData": "0x",
            "accountGasLimits": format!("0x{}", "00".repeat(32)),
            "preVerificationGas": 30000,
            "gasFees": format!("0x{}", "00".repeat(32)),
            "paymasterAndData": "0x",
            "signature": "0x",
        })
    }

    #[test]
    fn test_well_formed_op_is_valid() {
        let result = validate_user_op_structure(&well_formed_op());
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_non_object_is_rejected() {
        let result = validate_user_op_structure(&json!("not an op"));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let result = validate_user_op_structure(&json!({}));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 9);
        assert!(result.errors[0].contains("sender"));
    }

    #[test]
    fn test_bad_sender_is_rejected() {
        let mut op = well_formed_op();
        op["sender"] = json!("0x1234");
        let result = validate_user_op_structure(&op);
        assert!(result.errors.iter().any(|e| e.contains("sender")));
    }

    #[test]
    fn test_odd_length_byte_field_is_rejected() {
        let mut op = well_formed_op();
        op["callData"] = json!("0x123");
        let result = validate_user_op_structure(&op);
        assert!(result.errors.iter().any(|e| e.contains("callData")));
    }

    #[test]
    fn test_non_hex_byte_field_is_rejected() {
        let mut op = well_formed_op();
        op["initCode"] = json!("0xzz");
        let result = validate_user_op_structure(&op);
        assert!(result.errors.iter().any(|e| e.contains("initCode")));
    }

    #[test]
    fn test_short_account_gas_limits_is_rejected() {
        let mut op = well_formed_op();
        op["accountGasLimits"] = json!("0x0000");
        let result = validate_user_op_structure(&op);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("accountGasLimits") && e.contains("32 bytes")));
    }

    #[test]
    fn test_odd_length_quantity_is_accepted() {
        let mut op = well_formed_op();
        op["nonce"] = json!("0x123");
        let result = validate_user_op_structure(&op);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn test_non_quantity_nonce_is_rejected() {
        let mut op = well_formed_op();
        op["nonce"] = json!([1, 2, 3]);
        let result = validate_user_op_structure(&op);
        assert!(result.errors.iter().any(|e| e.contains("nonce")));
    }

    #[test]
    fn test_insufficient_pre_verification_gas_is_rejected() {
        let mut op = well_formed_op();
        op["preVerificationGas"] = json!(100);
        let result = validate_user_op_structure(&op);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("preVerificationGas")));
    }

    #[test]
    fn test_verification_gas_cap() {
        let settings = Settings::default();
        let mut packed = [0u8; 32];
        packed[15] = 0x01; // verificationGasLimit = 1
        let op = PackedUserOperation {
            account_gas_limits: H256(packed),
            ..Default::default()
        };
        assert!(check_verification_gas(&op, &settings).is_ok());

        let mut packed = [0u8; 32];
        packed[8] = 0x01; // far above any reasonable bound
        let op = PackedUserOperation {
            account_gas_limits: H256(packed),
            ..Default::default()
        };
        assert!(check_verification_gas(&op, &settings).is_err());
    }
}
