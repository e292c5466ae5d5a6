//! The architecturally visible pager registers.
//!
//! Each register keeps its raw value (so that it can be read back)
//! and, where the walkers need one, the physical address derived from
//! it.  The derived address is recomputed on every write.
//!
//! Invalidation of the translation caches after a register write is
//! the responsibility of the paging unit, not of this module.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

/// The four ITS descriptor base registers.  Each holds the physical
/// address of a halfword page table covering half of one address
/// space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dbr {
    /// DBR1: user pages 0-377.
    UserLow,
    /// DBR2: user pages 400-777.
    UserHigh,
    /// DBR3: exec pages 0-377.
    ExecLow,
    /// DBR4: exec pages 400-777.
    ExecHigh,
}

impl Dbr {
    fn index(&self) -> usize {
        match self {
            Dbr::UserLow => 0,
            Dbr::UserHigh => 1,
            Dbr::ExecLow => 2,
            Dbr::ExecHigh => 3,
        }
    }
}

impl Display for Dbr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DBR{}", self.index() + 1)
    }
}

const DBR_OUT_OF_RANGE: ConversionFailed = ConversionFailed::OutOfRange {
    quantity: Quantity::DbrNumber,
    min: 1,
    max: 4,
};

impl TryFrom<u8> for Dbr {
    type Error = ConversionFailed;
    fn try_from(n: u8) -> Result<Dbr, ConversionFailed> {
        match n {
            0 => Err(DBR_OUT_OF_RANGE),
            1 => Ok(Dbr::UserLow),
            2 => Ok(Dbr::UserHigh),
            3 => Ok(Dbr::ExecLow),
            4 => Ok(Dbr::ExecHigh),
            _ => Err(DBR_OUT_OF_RANGE),
        }
    }
}

/// Decodes the operand of the write-user-base instruction (WRUBR, or
/// DATAO PAG on the KL10).
///
/// | Bits  | Meaning                          |
/// | ----- | -------------------------------- |
/// | 0     | select accumulator blocks        |
/// | 2     | load the user base register      |
/// | 6-8   | current accumulator block        |
/// | 9-11  | previous accumulator block       |
/// | 23-35 | physical page of the UPT         |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBaseWord(pub Unsigned36Bit);

impl UserBaseWord {
    const SELECT_AC_BLOCKS: u64 = bit(0);
    const LOAD_USER_BASE: u64 = bit(2);

    pub fn compose(current: u8, previous: u8, page: PhysicalPage) -> UserBaseWord {
        let mut w = Unsigned36Bit::ZERO.bitor(Self::SELECT_AC_BLOCKS | Self::LOAD_USER_BASE);
        w = with_field(w, 6, 8, u64::from(current));
        w = with_field(w, 9, 11, u64::from(previous));
        w = with_field(w, 23, 35, u64::from(page.bits()));
        UserBaseWord(w)
    }

    pub fn selects_ac_blocks(&self) -> bool {
        !(self.0 & Self::SELECT_AC_BLOCKS).is_zero()
    }

    pub fn loads_user_base(&self) -> bool {
        !(self.0 & Self::LOAD_USER_BASE).is_zero()
    }

    pub fn current_block(&self) -> u8 {
        field(self.0, 6, 8) as u8
    }

    pub fn previous_block(&self) -> u8 {
        field(self.0, 9, 11) as u8
    }

    pub fn page(&self) -> PhysicalPage {
        page_field(self.0)
    }
}

fn page_field(w: Unsigned36Bit) -> PhysicalPage {
    // Thirteen bits always make a valid physical page.
    PhysicalPage::try_from(field(w, 23, 35)).unwrap_or(PhysicalPage::MAX)
}

fn address_field(w: Unsigned36Bit) -> PhysicalAddress {
    // Likewise twenty-two bits always make a valid physical address.
    PhysicalAddress::try_from(field(w, 14, 35)).unwrap_or(PhysicalAddress::MAX)
}

#[derive(Debug, Clone)]
pub struct PagerRegisters {
    exec_base: Unsigned36Bit,
    ept_address: PhysicalAddress,
    user_base: PhysicalPage,
    upt_address: PhysicalAddress,
    its_dbr: [PhysicalAddress; 4],
    spt_base: PhysicalAddress,
    cst_base: PhysicalAddress,
    cst_mask: Unsigned36Bit,
    process_use: Unsigned36Bit,
}

impl Default for PagerRegisters {
    fn default() -> PagerRegisters {
        PagerRegisters::new()
    }
}

impl PagerRegisters {
    /// Bit 22 of the exec base register enables paging.
    const PAGER_ENABLE: u64 = bit(22);
    const EXEC_BASE_BITS: u64 = PagerRegisters::PAGER_ENABLE | 0o17_777;

    pub fn new() -> PagerRegisters {
        let zero = PhysicalPage::MIN.address();
        PagerRegisters {
            exec_base: Unsigned36Bit::ZERO,
            ept_address: zero,
            user_base: PhysicalPage::MIN,
            upt_address: zero,
            its_dbr: [zero; 4],
            spt_base: zero,
            cst_base: zero,
            cst_mask: Unsigned36Bit::ZERO,
            process_use: Unsigned36Bit::ZERO,
        }
    }

    /// Set the exec base register.  Bits other than the enable bit
    /// and the EPT page number are ignored.
    pub fn set_exec_base(&mut self, w: Unsigned36Bit) {
        self.exec_base = w & Self::EXEC_BASE_BITS;
        self.ept_address = page_field(self.exec_base).address();
        event!(
            Level::INFO,
            "exec base register set to {:o}: EPT at {}, paging {}",
            self.exec_base,
            self.ept_address,
            if self.pager_enabled() {
                "enabled"
            } else {
                "disabled"
            }
        );
    }

    pub fn exec_base(&self) -> Unsigned36Bit {
        self.exec_base
    }

    pub fn pager_enabled(&self) -> bool {
        !(self.exec_base & Self::PAGER_ENABLE).is_zero()
    }

    pub fn ept_address(&self) -> PhysicalAddress {
        self.ept_address
    }

    pub fn set_user_base(&mut self, page: PhysicalPage) {
        self.user_base = page;
        self.upt_address = page.address();
        event!(
            Level::INFO,
            "user base register set: UPT at {}",
            self.upt_address
        );
    }

    pub fn user_base(&self) -> PhysicalPage {
        self.user_base
    }

    pub fn upt_address(&self) -> PhysicalAddress {
        self.upt_address
    }

    pub fn set_its_dbr(&mut self, dbr: Dbr, w: Unsigned36Bit) {
        let addr = address_field(w);
        event!(Level::INFO, "{} set to {}", dbr, addr);
        self.its_dbr[dbr.index()] = addr;
    }

    pub fn its_dbr(&self, dbr: Dbr) -> PhysicalAddress {
        self.its_dbr[dbr.index()]
    }

    pub fn set_spt_base(&mut self, w: Unsigned36Bit) {
        self.spt_base = address_field(w);
        event!(Level::INFO, "SPT base set to {}", self.spt_base);
    }

    pub fn spt_base(&self) -> PhysicalAddress {
        self.spt_base
    }

    pub fn set_cst_base(&mut self, w: Unsigned36Bit) {
        self.cst_base = address_field(w);
        event!(Level::INFO, "CST base set to {}", self.cst_base);
    }

    /// The address of the core status table, or `None` when the CST
    /// is disabled by a zero base register.
    pub fn cst_base(&self) -> Option<PhysicalAddress> {
        if self.cst_base.bits() == 0 {
            None
        } else {
            Some(self.cst_base)
        }
    }

    pub fn set_cst_mask(&mut self, w: Unsigned36Bit) {
        self.cst_mask = w;
    }

    pub fn cst_mask(&self) -> Unsigned36Bit {
        self.cst_mask
    }

    pub fn set_process_use(&mut self, w: Unsigned36Bit) {
        self.process_use = w;
    }

    pub fn process_use(&self) -> Unsigned36Bit {
        self.process_use
    }
}
