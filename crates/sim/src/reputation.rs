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

//! Reputation tracking for factories and paymasters.

use std::collections::HashMap;

use ethers::types::Address;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use parse_display::Display;
use serde::Serialize;

/// Default failure count at which an entity is throttled.
pub const THROTTLE_THRESHOLD: u64 = 2;

/// Default failure count at which an entity is banned.
pub const BAN_THRESHOLD: u64 = 5;

/// Standing of a factory or paymaster with this bundler.
#[derive(Display, Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[display(style = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum ReputationStatus {
    Ok,
    Throttled,
    Banned,
}

/// Counters kept for one observed entity address.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationEntry {
    pub address: Address,
    pub ops_seen: u64,
    pub ops_failed: u64,
    pub status: ReputationStatus,
}

/// Tracks entity behavior across simulations.
///
/// Implementations must be deterministic: status is a pure function of the
/// failure counter, with no clock or decay involved. Entries exist from the
/// first update until an explicit clear.
#[cfg_attr(test, automock)]
pub trait ReputationManager: Send + Sync + 'static {
    /// Standing of an address. Unknown addresses are OK.
    fn status(&self, address: Address) -> ReputationStatus;

    /// Records one simulation outcome for an address.
    fn update(&self, address: Address, successful: bool);

    /// Drops the entry for an address.
    fn clear(&self, address: Address);

    /// Counters for an address, when it has been seen.
    fn entry(&self, address: Address) -> Option<ReputationEntry>;

    /// All tracked entries.
    fn dump(&self) -> Vec<ReputationEntry>;
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    ops_seen: u64,
    ops_failed: u64,
}

/// In-memory reputation store keyed by entity address.
#[derive(Debug)]
pub struct MemoryReputation {
    throttle_threshold: u64,
    ban_threshold: u64,
    entries: RwLock<HashMap<Address, Counters>>,
}

impl MemoryReputation {
    pub fn new(throttle_threshold: u64, ban_threshold: u64) -> Self {
        Self {
            throttle_threshold,
            ban_threshold,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn status_of(&self, counters: Counters) -> ReputationStatus {
        if counters.ops_failed >= self.ban_threshold {
            ReputationStatus::Banned
        } else if counters.ops_failed >= self.throttle_threshold {
            ReputationStatus::Throttled
        } else {
            ReputationStatus::Ok
        }
    }
}

impl Default for MemoryReputation {
    fn default() -> Self {
        Self::new(THROTTLE_THRESHOLD, BAN_THRESHOLD)
    }
}

impl ReputationManager for MemoryReputation {
    fn status(&self, address: Address) -> ReputationStatus {
        match self.entries.read().get(&address) {
            Some(counters) => self.status_of(*counters),
            None => ReputationStatus::Ok,
        }
    }

    fn update(&self, address: Address, successful: bool) {
        let mut entries = self.entries.write();
        let counters = entries.entry(address).or_default();
        counters.ops_seen += 1;
        if !successful {
            counters.ops_failed += 1;
        }
    }

    fn clear(&self, address: Address) {
        self.entries.write().remove(&address);
    }

    fn entry(&self, address: Address) -> Option<ReputationEntry> {
        let counters = *self.entries.read().get(&address)?;
        Some(ReputationEntry {
            address,
            ops_seen: counters.ops_seen,
            ops_failed: counters.ops_failed,
            status: self.status_of(counters),
        })
    }

    fn dump(&self) -> Vec<ReputationEntry> {
        self.entries
            .read()
            .iter()
            .map(|(address, counters)| ReputationEntry {
                address: *address,
                ops_seen: counters.ops_seen,
                ops_failed: counters.ops_failed,
                status: self.status_of(*counters),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn test_unknown_address_is_ok() {
        let reputation = MemoryReputation::default();
        assert_eq!(reputation.status(addr(1)), ReputationStatus::Ok);
        assert!(reputation.entry(addr(1)).is_none());
    }

    #[test]
    fn test_status_thresholds() {
        let reputation = MemoryReputation::default();
        let address = addr(2);
        reputation.update(address, false);
        assert_eq!(reputation.status(address), ReputationStatus::Ok);
        reputation.update(address, false);
        assert_eq!(reputation.status(address), ReputationStatus::Throttled);
        for _ in 0..3 {
            reputation.update(address, false);
        }
        assert_eq!(reputation.status(address), ReputationStatus::Banned);
    }

    #[test]
    fn test_successful_updates_do_not_fail() {
        let reputation = MemoryReputation::default();
        let address = addr(3);
        for _ in 0..10 {
            reputation.update(address, true);
        }
        let entry = reputation.entry(address).unwrap();
        assert_eq!(entry.ops_seen, 10);
        assert_eq!(entry.ops_failed, 0);
        assert_eq!(entry.status, ReputationStatus::Ok);
    }

    #[test]
    fn test_counters_are_monotonic() {
        let reputation = MemoryReputation::default();
        let address = addr(4);
        let mut last_seen = 0;
        let mut last_failed = 0;
        for i in 0..8 {
            reputation.update(address, i % 2 == 0);
            let entry = reputation.entry(address).unwrap();
            assert!(entry.ops_seen > last_seen);
            assert!(entry.ops_failed >= last_failed);
            last_seen = entry.ops_seen;
            last_failed = entry.ops_failed;
        }
    }

    #[test]
    fn test_clear_removes_entry() {
        let reputation = MemoryReputation::default();
        let address = addr(5);
        for _ in 0..5 {
            reputation.update(address, false);
        }
        assert_eq!(reputation.status(address), ReputationStatus::Banned);
        reputation.clear(address);
        assert_eq!(reputation.status(address), ReputationStatus::Ok);
        assert!(reputation.entry(address).is_none());
    }

    #[test]
    fn test_custom_thresholds() {
        let reputation = MemoryReputation::new(1, 2);
        let address = addr(6);
        reputation.update(address, false);
        assert_eq!(reputation.status(address), ReputationStatus::Throttled);
        reputation.update(address, false);
        assert_eq!(reputation.status(address), ReputationStatus::Banned);
    }

    #[test]
    fn test_dump_lists_all_entries() {
        let reputation = MemoryReputation::default();
        reputation.update(addr(7), true);
        reputation.update(addr(8), false);
        let mut dump = reputation.dump();
        dump.sort_by_key(|entry| entry.address);
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].address, addr(7));
        assert_eq!(dump[1].ops_failed, 1);
    }

    #[test]
    fn test_status_display_matches_error_markers() {
        assert_eq!(ReputationStatus::Banned.to_string(), "BANNED");
        assert_eq!(ReputationStatus::Throttled.to_string(), "THROTTLED");
        assert_eq!(ReputationStatus::Ok.to_string(), "OK");
    }
}
