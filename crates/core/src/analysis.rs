//! Interfaces to the code-analysis collaborator.
//!
//! The analyser owns disassembly, labels and the notion of which ROM/RAM bank
//! is currently visible. This crate only asks it questions ([`CodeInfo`]) and
//! tells it about bank changes after a restore ([`BankObserver`]).

use serde::{Deserialize, Serialize};

/// A code address qualified by the bank it was observed in.
///
/// `bank` is `None` for addresses in unbanked memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressRef {
    pub bank: Option<u8>,
    pub address: u16,
}

impl AddressRef {
    pub fn new(address: u16) -> Self {
        AddressRef { bank: None, address }
    }

    pub fn in_bank(bank: u8, address: u16) -> Self {
        AddressRef { bank: Some(bank), address }
    }
}

/// Label category as assigned by the analyser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Code,
    Function,
    Data,
    Text,
}

/// A named address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub kind: LabelKind,
}

impl Label {
    pub fn new(name: impl Into<String>, kind: LabelKind) -> Self {
        Label { name: name.into(), kind }
    }
}

/// Read-only queries answered by the code analyser.
pub trait CodeInfo {
    /// Length in bytes of the decoded instruction at `pc`, if known.
    fn instruction_len(&self, pc: u16) -> Option<u8>;

    /// Resolve a physical address to a bank-qualified reference.
    fn address_ref(&self, addr: u16) -> AddressRef {
        AddressRef::new(addr)
    }

    /// Label attached to exactly `addr`, if any.
    fn label_at(&self, addr: u16) -> Option<&Label>;
}

/// Receives bank assignment changes so analysis stays consistent with the
/// memory contents after a restore.
pub trait BankObserver {
    /// ROM bank `bank` is now mapped at 0x0000.
    fn set_rom_bank(&mut self, bank: u8);
    /// RAM bank `bank` is now mapped into 16K slot `slot` (0–3).
    fn set_ram_bank(&mut self, slot: u8, bank: u8);
}
