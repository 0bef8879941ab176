//! Canonical address id tables for one index-construction session
//!
//! Mutation goes through `&mut AddressState`, so a single writer is enforced
//! by the borrow checker; read-only lookups only need `&AddressState` and can
//! be shared across threads.

use crate::types::{RawScript, ScriptType};
use std::collections::HashMap;

/// Outcome of looking up a [`RawScript`]
///
/// `address_num` is 0 when the script has not been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLookupResult {
    pub raw: RawScript,
    pub address_num: u32,
    pub found: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AddressState {
    addresses: HashMap<RawScript, u32>,
    /// Last id handed out per script type; ids start at 1
    counters: [u32; ScriptType::COUNT],
}

impl AddressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_address(&self, raw: &RawScript) -> AddressLookupResult {
        match self.addresses.get(raw) {
            Some(&address_num) => AddressLookupResult { raw: *raw, address_num, found: true },
            None => AddressLookupResult { raw: *raw, address_num: 0, found: false },
        }
    }

    /// Returns `(address_num, is_new)`, inserting the script on a miss
    pub fn resolve_address(&mut self, lookup: AddressLookupResult) -> (u32, bool) {
        if lookup.found {
            return (lookup.address_num, false);
        }
        // The lookup may be stale if the same script was inserted since.
        if let Some(&address_num) = self.addresses.get(&lookup.raw) {
            return (address_num, false);
        }
        let address_num = self.get_new_address_index(lookup.raw.script_type);
        self.addresses.insert(lookup.raw, address_num);
        (address_num, true)
    }

    /// Allocate a fresh id without recording any hash
    pub fn get_new_address_index(&mut self, script_type: ScriptType) -> u32 {
        let counter = &mut self.counters[script_type.slot()];
        *counter += 1;
        *counter
    }

    /// Number of ids allocated so far in `script_type`'s space
    pub fn address_count(&self, script_type: ScriptType) -> u32 {
        self.counters[script_type.slot()]
    }

    /// Number of deduplicated scripts recorded
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
