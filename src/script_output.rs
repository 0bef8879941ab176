//! Resolution of script payloads into canonical address identities

use crate::address_state::AddressState;
use crate::script_data::*;
use crate::types::{Address, AddressKind, RawScript};
use tracing::trace;

/// One resolution attempt for a payload of kind `D::KIND`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput<D> {
    pub data: D,
    pub address_num: u32,
    pub is_new: bool,
}

impl<D: ScriptData> ScriptOutput<D> {
    pub fn new(data: D) -> Self {
        Self { data, address_num: 0, is_new: false }
    }

    /// Dedup key, present only for deduped kinds
    pub fn raw_script(&self) -> Option<RawScript> {
        if !D::KIND.is_deduped() {
            return None;
        }
        self.data.hash().map(|hash| RawScript::new(hash, D::KIND.script_type()))
    }

    /// Assign a canonical id, inserting into `state` on first sight.
    ///
    /// Nested scripts are resolved only when this script is new, so a
    /// repeated script never re-registers its members.
    pub fn resolve(&mut self, state: &mut AddressState) -> (Address, bool) {
        match self.raw_script() {
            Some(raw) => {
                let lookup = state.find_address(&raw);
                (self.address_num, self.is_new) = state.resolve_address(lookup);
            }
            None => {
                self.address_num = state.get_new_address_index(D::KIND.script_type());
                self.is_new = true;
            }
        }

        if self.is_new {
            self.data.resolve(state);
        }
        trace!(address = %self.address(), is_new = self.is_new, "resolved script");
        (self.address(), self.is_new)
    }

    /// Look up the id without touching `state`.
    ///
    /// Unknown deduped scripts and all non-deduped scripts report id 0 and
    /// `is_new = true`.
    pub fn check(&mut self, state: &AddressState) -> (Address, bool) {
        match self.raw_script() {
            Some(raw) => {
                let lookup = state.find_address(&raw);
                self.address_num = lookup.address_num;
                self.is_new = lookup.address_num == 0;
            }
            None => {
                self.address_num = 0;
                self.is_new = true;
            }
        }

        self.data.check(state);
        (self.address(), self.is_new)
    }

    pub fn address(&self) -> Address {
        Address::new(self.address_num, D::KIND)
    }

    pub fn kind(&self) -> AddressKind {
        D::KIND
    }

    pub fn is_valid(&self) -> bool {
        self.data.is_valid()
    }
}

/// A resolved or unresolved output of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyScriptOutput {
    Pubkey(ScriptOutput<PubkeyScript>),
    PubkeyHash(ScriptOutput<PubkeyHashScript>),
    WitnessPubkeyHash(ScriptOutput<WitnessPubkeyHashScript>),
    ScriptHash(ScriptOutput<ScriptHashScript>),
    WitnessScriptHash(ScriptOutput<WitnessScriptHashScript>),
    Multisig(ScriptOutput<MultisigScript>),
    Nonstandard(ScriptOutput<NonstandardScript>),
    NullData(ScriptOutput<NullDataScript>),
}

macro_rules! dispatch {
    ($self:expr, $output:ident => $body:expr) => {
        match $self {
            AnyScriptOutput::Pubkey($output) => $body,
            AnyScriptOutput::PubkeyHash($output) => $body,
            AnyScriptOutput::WitnessPubkeyHash($output) => $body,
            AnyScriptOutput::ScriptHash($output) => $body,
            AnyScriptOutput::WitnessScriptHash($output) => $body,
            AnyScriptOutput::Multisig($output) => $body,
            AnyScriptOutput::Nonstandard($output) => $body,
            AnyScriptOutput::NullData($output) => $body,
        }
    };
}

impl AnyScriptOutput {
    /// Classify an output script.
    ///
    /// Witness programs are only recognized once segwit is active; before
    /// that they fall through to non-standard like any other unmatched script.
    /// A bare multisig whose key counts are inconsistent is still returned as
    /// multisig with `is_valid() == false`.
    pub fn from_script(script_pubkey: &[u8], witness_activated: bool) -> Self {
        if let Ok(data) = PubkeyHashScript::parse(script_pubkey) {
            return AnyScriptOutput::PubkeyHash(ScriptOutput::new(data));
        }
        if let Ok(data) = ScriptHashScript::parse(script_pubkey) {
            return AnyScriptOutput::ScriptHash(ScriptOutput::new(data));
        }
        if witness_activated {
            if let Ok(data) = WitnessPubkeyHashScript::parse(script_pubkey) {
                return AnyScriptOutput::WitnessPubkeyHash(ScriptOutput::new(data));
            }
            if let Ok(data) = WitnessScriptHashScript::parse(script_pubkey) {
                return AnyScriptOutput::WitnessScriptHash(ScriptOutput::new(data));
            }
        }
        if let Ok(data) = PubkeyScript::parse(script_pubkey) {
            return AnyScriptOutput::Pubkey(ScriptOutput::new(data));
        }
        if let Ok(data) = MultisigScript::parse(script_pubkey) {
            return AnyScriptOutput::Multisig(ScriptOutput::new(data));
        }
        if let Ok(data) = NullDataScript::parse(script_pubkey) {
            return AnyScriptOutput::NullData(ScriptOutput::new(data));
        }
        Self::nonstandard(script_pubkey)
    }

    pub fn nonstandard(script: &[u8]) -> Self {
        let data = NonstandardScript { script: script.to_vec() };
        AnyScriptOutput::Nonstandard(ScriptOutput::new(data))
    }

    pub fn resolve(&mut self, state: &mut AddressState) -> (Address, bool) {
        dispatch!(self, output => output.resolve(state))
    }

    pub fn check(&mut self, state: &AddressState) -> (Address, bool) {
        dispatch!(self, output => output.check(state))
    }

    pub fn address(&self) -> Address {
        dispatch!(self, output => output.address())
    }

    pub fn kind(&self) -> AddressKind {
        dispatch!(self, output => output.kind())
    }

    pub fn is_new(&self) -> bool {
        dispatch!(self, output => output.is_new)
    }

    pub fn is_valid(&self) -> bool {
        dispatch!(self, output => output.is_valid())
    }
}

impl From<ScriptOutput<MultisigScript>> for AnyScriptOutput {
    fn from(output: ScriptOutput<MultisigScript>) -> Self {
        AnyScriptOutput::Multisig(output)
    }
}
