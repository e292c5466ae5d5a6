//! Processor flags, as saved alongside the PC.
//!
//! The flags occupy the left-hand 13 bits of a PC word (bits 0 to
//! 12).  In the one-word PC format they share the word with an 18-bit
//! PC; in the extended format they occupy a word of their own.
use std::fmt::{self, Debug, Formatter};

use serde::Serialize;

use crate::subword::join_halves;
use crate::word::{Unsigned18Bit, Unsigned36Bit};

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PcFlags(u32);

impl PcFlags {
    pub const OVERFLOW: u32 = 0o400_000;
    pub const CARRY0: u32 = 0o200_000;
    pub const CARRY1: u32 = 0o100_000;
    pub const FLOATING_OVERFLOW: u32 = 0o040_000;
    pub const FIRST_PART_DONE: u32 = 0o020_000;
    pub const USER: u32 = 0o010_000;
    pub const USER_IN_OUT: u32 = 0o004_000;
    pub const PUBLIC: u32 = 0o002_000;
    pub const ADDRESS_FAILURE_INHIBIT: u32 = 0o001_000;
    pub const TRAP2: u32 = 0o000_400;
    pub const TRAP1: u32 = 0o000_200;
    pub const FLOATING_UNDERFLOW: u32 = 0o000_100;
    pub const NO_DIVIDE: u32 = 0o000_040;

    const VALID: u32 = 0o777_740;

    pub const fn empty() -> PcFlags {
        PcFlags(0)
    }

    /// Extract the flags from the left half of a PC word.  Bits 13 to
    /// 17 are not flags and are ignored.
    pub fn from_halfword(h: Unsigned18Bit) -> PcFlags {
        PcFlags(u32::from(h) & PcFlags::VALID)
    }

    pub fn from_bits(bits: u32) -> PcFlags {
        PcFlags(bits & PcFlags::VALID)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn halfword(&self) -> Unsigned18Bit {
        // VALID lies within the low 18 bits.
        Unsigned18Bit::ZERO.bitor(self.0)
    }

    pub fn contains(&self, mask: u32) -> bool {
        self.0 & mask == mask
    }

    pub fn with(self, mask: u32) -> PcFlags {
        PcFlags((self.0 | mask) & PcFlags::VALID)
    }

    pub fn without(self, mask: u32) -> PcFlags {
        PcFlags(self.0 & !mask)
    }

    pub fn user(&self) -> bool {
        self.contains(PcFlags::USER)
    }

    pub fn public(&self) -> bool {
        self.contains(PcFlags::PUBLIC)
    }

    pub fn address_failure_inhibit(&self) -> bool {
        self.contains(PcFlags::ADDRESS_FAILURE_INHIBIT)
    }

    /// The one-word PC format: flags in the left half, PC in the
    /// right half.
    pub fn pc_word(&self, pc: Unsigned18Bit) -> Unsigned36Bit {
        join_halves(self.halfword(), pc)
    }

    /// The flags word of the extended (two-word) PC format.
    pub fn flags_word(&self) -> Unsigned36Bit {
        join_halves(self.halfword(), Unsigned18Bit::ZERO)
    }
}

impl Debug for PcFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const NAMES: [(u32, &str); 13] = [
            (PcFlags::OVERFLOW, "OV"),
            (PcFlags::CARRY0, "CRY0"),
            (PcFlags::CARRY1, "CRY1"),
            (PcFlags::FLOATING_OVERFLOW, "FOV"),
            (PcFlags::FIRST_PART_DONE, "FPD"),
            (PcFlags::USER, "USER"),
            (PcFlags::USER_IN_OUT, "USERIO"),
            (PcFlags::PUBLIC, "PUBLIC"),
            (PcFlags::ADDRESS_FAILURE_INHIBIT, "AFI"),
            (PcFlags::TRAP2, "TRAP2"),
            (PcFlags::TRAP1, "TRAP1"),
            (PcFlags::FLOATING_UNDERFLOW, "FXU"),
            (PcFlags::NO_DIVIDE, "DCK"),
        ];
        let mut names = NAMES
            .iter()
            .filter(|(mask, _)| self.contains(*mask))
            .map(|(_, name)| *name);
        f.write_str("PcFlags{")?;
        if let Some(first) = names.next() {
            f.write_str(first)?;
            for name in names {
                write!(f, " {name}")?;
            }
        }
        f.write_str("}")
    }
}
