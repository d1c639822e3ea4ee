//! The per-transaction State Model (§3.2/§4.3): warm sets, transient
//! storage, the refund counter, logs, self-destructs, and the
//! once-per-slot `original_storage` bookkeeping EIP-2200 needs.
//!
//! Snapshotting (§3.4, invariant 4) is implemented as a full clone of this
//! struct's ephemeral maps — simple and obviously correct, in keeping with
//! the Non-goals' explicit deprioritization of throughput over correctness.
//! See `DESIGN.md` for why this was chosen over a delta/journal scheme.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// One emitted LOG0..LOG4 entry (§3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// A `(address, slot)` pair, the unit of EIP-2929 storage-slot warmth and
/// of transient-storage / original-storage keys.
pub type SlotKey = (Address, H256);

/// The reversible portion of per-transaction state: everything a snapshot
/// captures and a revert restores, per §3.4's lifecycle note ("only
/// *original* values and *access-list* baselines are captured and
/// restored" — generalized here to the full ephemeral-state set named in
/// the Entities table of §3.2).
#[derive(Debug, Clone, Default)]
pub struct StateModel {
    /// Per-transaction persistent-storage overlay. Keyed the same as the
    /// `Database`'s storage so that a write here shadows (and, on commit,
    /// is flushed back down to) the backing store. Zero-valued entries are
    /// never stored, per invariant 3.
    storage: HashMap<SlotKey, U256>,
    /// The value observed the first time a slot was written this
    /// transaction (invariant 4). Never updated again once present.
    original_storage: HashMap<SlotKey, U256>,
    /// EIP-1153 transient storage; wiped at transaction start and end.
    transient_storage: HashMap<SlotKey, U256>,
    warm_addresses: HashSet<Address>,
    warm_storage_slots: HashSet<SlotKey>,
    /// Accounts that have received a SELFDESTRUCT this transaction, mapped
    /// to the beneficiary that received the balance sweep.
    selfdestructs: HashMap<Address, Address>,
    /// Subset of `selfdestructs` created within *this* transaction — only
    /// these are actually deleted at transaction end (EIP-6780).
    created_this_tx: HashSet<Address>,
    /// Balances/nonces/code touched this transaction, overlaying the
    /// `Database` the same way `storage` does, so a revert can discard
    /// them without mutating the backing host.
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    codes: HashMap<Address, crate::account::Code>,
    pub refund_counter: i64,
    logs: Vec<LogEntry>,
}

/// A captured baseline, restored verbatim on revert (§3.4) or discarded on
/// success.
#[derive(Debug, Clone)]
pub struct Snapshot {
    inner: StateModel,
}

impl StateModel {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Persistent storage -------------------------------------------------

    /// Reads the overlay first, falling back to `fallback` (the
    /// `Database`, or an ancestor snapshot during pre-warming) on miss.
    pub fn get_storage(&self, address: Address, slot: H256, fallback: U256) -> U256 {
        self.storage.get(&(address, slot)).copied().unwrap_or(fallback)
    }

    /// Records `original` the first time `(address, slot)` is written this
    /// transaction (invariant 4), then applies the write, removing the
    /// entry entirely if `new` is zero (invariant 3).
    pub fn set_storage(&mut self, address: Address, slot: H256, original: U256, new: U256) {
        self.original_storage.entry((address, slot)).or_insert(original);
        if new.is_zero() {
            self.storage.remove(&(address, slot));
        } else {
            self.storage.insert((address, slot), new);
        }
    }

    pub fn original_storage(&self, address: Address, slot: H256, fallback: U256) -> U256 {
        self.original_storage
            .get(&(address, slot))
            .copied()
            .unwrap_or(fallback)
    }

    pub fn storage_overlay(&self) -> impl Iterator<Item = (&SlotKey, &U256)> {
        self.storage.iter()
    }

    /// Every storage slot written this transaction, paired with its final
    /// value (zero if the slot was cleared back out). Sourced from
    /// `original_storage`'s key set rather than `storage`'s, since a slot
    /// written back to zero is removed from `storage` (invariant 3) but
    /// must still be flushed to the `Database` as a clear. Invariant 4
    /// guarantees `original_storage` holds exactly the set of slots
    /// touched this transaction, recorded once each.
    pub fn dirty_storage(&self) -> impl Iterator<Item = (SlotKey, U256)> + '_ {
        self.original_storage
            .keys()
            .map(move |key| (*key, self.storage.get(key).copied().unwrap_or_default()))
    }

    // --- Balances / nonces / code overlay -----------------------------------

    pub fn get_balance(&self, address: Address, fallback: U256) -> U256 {
        self.balances.get(&address).copied().unwrap_or(fallback)
    }

    pub fn set_balance(&mut self, address: Address, value: U256) {
        self.balances.insert(address, value);
    }

    pub fn get_nonce(&self, address: Address, fallback: u64) -> u64 {
        self.nonces.get(&address).copied().unwrap_or(fallback)
    }

    pub fn set_nonce(&mut self, address: Address, value: u64) {
        self.nonces.insert(address, value);
    }

    pub fn get_code(&self, address: Address, fallback: crate::account::Code) -> crate::account::Code {
        self.codes.get(&address).cloned().unwrap_or(fallback)
    }

    pub fn set_code(&mut self, address: Address, code: crate::account::Code) {
        self.codes.insert(address, code);
    }

    pub fn balances_overlay(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.balances.iter()
    }

    pub fn nonces_overlay(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.nonces.iter()
    }

    pub fn codes_overlay(&self) -> impl Iterator<Item = (&Address, &crate::account::Code)> {
        self.codes.iter()
    }

    // --- Transient storage ---------------------------------------------------

    pub fn get_transient(&self, address: Address, slot: H256) -> U256 {
        self.transient_storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_transient(&mut self, address: Address, slot: H256, value: U256) {
        if value.is_zero() {
            self.transient_storage.remove(&(address, slot));
        } else {
            self.transient_storage.insert((address, slot), value);
        }
    }

    // --- Warm sets (EIP-2929) ------------------------------------------------

    /// Marks `address` warm, returning whether it was already warm.
    pub fn warm_address(&mut self, address: Address) -> bool {
        !self.warm_addresses.insert(address)
    }

    pub fn is_warm_address(&self, address: Address) -> bool {
        self.warm_addresses.contains(&address)
    }

    /// Marks a storage slot warm, returning whether it was already warm.
    pub fn warm_slot(&mut self, address: Address, slot: H256) -> bool {
        !self.warm_storage_slots.insert((address, slot))
    }

    pub fn is_warm_slot(&self, address: Address, slot: H256) -> bool {
        self.warm_storage_slots.contains(&(address, slot))
    }

    // --- Self-destructs (EIP-6780) -------------------------------------------

    pub fn mark_created_this_tx(&mut self, address: Address) {
        self.created_this_tx.insert(address);
    }

    pub fn was_created_this_tx(&self, address: Address) -> bool {
        self.created_this_tx.contains(&address)
    }

    pub fn selfdestruct(&mut self, address: Address, beneficiary: Address) {
        self.selfdestructs.insert(address, beneficiary);
    }

    pub fn is_selfdestructed(&self, address: Address) -> bool {
        self.selfdestructs.contains_key(&address)
    }

    /// Addresses to actually delete at transaction end: self-destructed
    /// *and* created within this same transaction (EIP-6780).
    pub fn addresses_to_delete(&self) -> impl Iterator<Item = Address> + '_ {
        self.selfdestructs
            .keys()
            .copied()
            .filter(|addr| self.created_this_tx.contains(addr))
    }

    pub fn all_selfdestructed(&self) -> impl Iterator<Item = Address> + '_ {
        self.selfdestructs.keys().copied()
    }

    // --- Logs -----------------------------------------------------------------

    pub fn append_log(&mut self, log: LogEntry) {
        self.logs.push(log);
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    // --- Refunds ---------------------------------------------------------------

    pub fn add_refund(&mut self, delta: i64) {
        self.refund_counter = self.refund_counter.saturating_add(delta);
    }

    /// The non-negative refund observed at transaction end, per invariant
    /// 10's spirit applied to the refund counter (it can dip while
    /// accumulating negative deltas but never reports negative overall).
    pub fn refund(&self) -> u64 {
        u64::try_from(self.refund_counter.max(0)).unwrap_or(0)
    }

    // --- Snapshot / restore (§3.4, invariant 4) --------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            inner: self.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        *self = snapshot.inner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trip_discards_all_deltas() {
        let mut state = StateModel::new();
        let addr = Address::repeat_byte(1);
        let slot = H256::zero();

        let snapshot = state.snapshot();
        state.set_storage(addr, slot, U256::zero(), U256::from(42));
        state.warm_address(addr);
        state.add_refund(100);
        state.append_log(LogEntry {
            address: addr,
            topics: vec![],
            data: Bytes::new(),
        });

        assert_eq!(state.get_storage(addr, slot, U256::zero()), U256::from(42));
        state.restore(snapshot);
        assert_eq!(state.get_storage(addr, slot, U256::zero()), U256::zero());
        assert!(!state.is_warm_address(addr));
        assert_eq!(state.refund_counter, 0);
        assert!(state.logs().is_empty());
    }

    #[test]
    fn storage_zero_write_removes_entry_from_overlay() {
        let mut state = StateModel::new();
        let addr = Address::repeat_byte(1);
        let slot = H256::zero();
        state.set_storage(addr, slot, U256::zero(), U256::from(7));
        assert_eq!(state.storage_overlay().count(), 1);
        state.set_storage(addr, slot, U256::from(7), U256::zero());
        assert_eq!(state.storage_overlay().count(), 0);
    }

    #[test]
    fn original_storage_recorded_once() {
        let mut state = StateModel::new();
        let addr = Address::repeat_byte(1);
        let slot = H256::zero();
        state.set_storage(addr, slot, U256::from(1), U256::from(2));
        state.set_storage(addr, slot, U256::from(2), U256::from(3));
        assert_eq!(state.original_storage(addr, slot, U256::zero()), U256::from(1));
    }
}
