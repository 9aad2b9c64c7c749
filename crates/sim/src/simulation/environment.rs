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

//! The embedded EVM and its state.

use std::collections::HashMap;

use ethers::types::{Address, Bytes, H256};
use revm::{
    db::InMemoryDB,
    primitives::{keccak256, AccountInfo, Bytecode, ExecutionResult, TransactTo, TxEnv},
    Inspector, EVM,
};
use serde::Deserialize;

use crate::eth;

/// Outcome of one bounded EVM call.
#[derive(Clone, Debug)]
pub struct CallOutcome {
    pub gas_used: u64,
    /// Present when the call reverted, halted, or could not be executed.
    pub error: Option<String>,
}

/// Serialized account state used to seed the environment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StateSnapshot(pub HashMap<Address, AccountSnapshot>);

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    #[serde(default)]
    pub code: Bytes,
    #[serde(default)]
    pub storage: HashMap<H256, H256>,
}

/// Owns the embedded EVM and its state.
///
/// State written by one call (deployments, storage writes) stays visible to
/// later calls against the same environment.
pub struct SimulationEnvironment {
    evm: EVM<InMemoryDB>,
}

impl Default for SimulationEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationEnvironment {
    pub fn new() -> Self {
        let mut evm = EVM::new();
        evm.database(InMemoryDB::default());
        Self { evm }
    }

    fn db_mut(&mut self) -> &mut InMemoryDB {
        self.evm
            .db
            .as_mut()
            .expect("database is installed at construction")
    }

    /// Installs contract code at an address.
    pub fn put_code(&mut self, address: Address, code: Bytes) {
        let code = eth::to_revm_bytes(code);
        let info = AccountInfo {
            code_hash: keccak256(&code),
            code: Some(Bytecode::new_raw(code)),
            ..Default::default()
        };
        self.db_mut()
            .insert_account_info(eth::to_revm_address(address), info);
    }

    /// Code currently installed at an address, if any.
    pub fn code_at(&self, address: Address) -> Option<Bytes> {
        let account = self
            .evm
            .db
            .as_ref()?
            .accounts
            .get(&eth::to_revm_address(address))?;
        account
            .info
            .code
            .as_ref()
            .map(|code| eth::from_revm_bytes(code.bytecode.clone()))
    }

    /// Writes a raw storage slot.
    pub fn put_storage(&mut self, address: Address, slot: H256, value: H256) {
        let address = eth::to_revm_address(address);
        self.db_mut()
            .insert_account_storage(address, eth::to_revm_slot(slot), eth::to_revm_slot(value))
            .expect("in-memory storage insert cannot fail");
    }

    /// Seeds code and storage from a snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &StateSnapshot) {
        for (address, account) in &snapshot.0 {
            if !account.code.is_empty() {
                self.put_code(*address, account.code.clone());
            }
            for (slot, value) in &account.storage {
                self.put_storage(*address, *slot, *value);
            }
        }
    }

    /// Runs one bounded call with the inspector attached for its duration.
    pub fn run_call<I: Inspector<InMemoryDB>>(
        &mut self,
        to: Address,
        caller: Address,
        data: Bytes,
        gas_limit: u64,
        inspector: I,
    ) -> CallOutcome {
        self.evm.env.tx = TxEnv::default();
        self.evm.env.tx.caller = eth::to_revm_address(caller);
        self.evm.env.tx.transact_to = TransactTo::Call(eth::to_revm_address(to));
        self.evm.env.tx.data = eth::to_revm_bytes(data);
        self.evm.env.tx.gas_limit = gas_limit;
        match self.evm.inspect_commit(inspector) {
            Ok(ExecutionResult::Success { gas_used, .. }) => CallOutcome {
                gas_used,
                error: None,
            },
            Ok(ExecutionResult::Revert { gas_used, output }) => CallOutcome {
                gas_used,
                error: Some(format!("execution reverted: 0x{}", hex::encode(&output))),
            },
            Ok(ExecutionResult::Halt { reason, gas_used }) => CallOutcome {
                gas_used,
                error: Some(format!("execution halted: {reason:?}")),
            },
            Err(error) => CallOutcome {
                gas_used: 0,
                error: Some(format!("call rejected: {error:?}")),
            },
        }
    }
}
