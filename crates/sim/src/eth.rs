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

//! Conversions between the ethers primitives used on the public surface and
//! the revm primitives used inside the embedded EVM.

use std::str::FromStr;

use anyhow::Context;
use ethers::types::{Address, Bytes, H256};
use revm::primitives::{
    Address as RevmAddress, Bytes as RevmBytes, U256 as RevmU256,
};

/// Parses a `0x`-prefixed hex address.
pub fn parse_address(text: &str) -> anyhow::Result<Address> {
    Address::from_str(text).with_context(|| format!("invalid address {text}"))
}

/// Formats an address as lowercase `0x`-prefixed hex.
pub fn format_address(address: Address) -> String {
    format!("{address:?}")
}

pub(crate) fn to_revm_address(address: Address) -> RevmAddress {
    RevmAddress::from_slice(address.as_bytes())
}

pub(crate) fn from_revm_address(address: RevmAddress) -> Address {
    Address::from_slice(address.as_slice())
}

pub(crate) fn to_revm_bytes(bytes: Bytes) -> RevmBytes {
    RevmBytes::from(bytes.to_vec())
}

pub(crate) fn from_revm_bytes(bytes: RevmBytes) -> Bytes {
    Bytes::from(bytes.to_vec())
}

/// A 32-byte word as the integer revm storage keys and values use.
pub(crate) fn to_revm_slot(word: H256) -> RevmU256 {
    RevmU256::from_be_bytes(word.to_fixed_bytes())
}

/// A revm stack or storage word as a 32-byte big-endian value.
pub(crate) fn word_from_revm_u256(value: RevmU256) -> H256 {
    H256(value.to_be_bytes::<32>())
}
