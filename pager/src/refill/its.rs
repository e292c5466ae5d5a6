//! The ITS pager on the KS10.
//!
//! Each address space is split into a low half (pages 0-377) and a
//! high half (pages 400-777), and each half has its own descriptor
//! base register holding the physical address of a table of
//! halfword entries, two to a word:
//!
//! | Bits  | Meaning                                            |
//! | ----- | -------------------------------------------------- |
//! | 0-1   | access: 0 none, 1 read-only, 2 read/write-first, 3 read/write |
//! | 7-17  | physical page                                      |
//!
//! Read/write-first pages are treated as read-only; the operating
//! system upgrades them when the first write faults.
use tracing::{event, Level};

use base::prelude::*;

use super::{
    check_page_exists, halfword_entry, read_table, RefillEngine, Translation, WalkFailure,
    WalkRequest,
};
use crate::config::Generation;
use crate::fault::{FaultKind, Rights};
use crate::registers::{Dbr, PagerRegisters};
use crate::store::PhysicalStore;
use crate::types::Mode;

const HIGH_HALF_FIRST: u32 = 0o400;

#[derive(Debug)]
pub struct ItsWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItsAccess {
    None,
    ReadOnly,
    ReadWriteFirst,
    ReadWrite,
}

struct ItsEntry(u32);

impl ItsEntry {
    fn access(&self) -> ItsAccess {
        match (self.0 >> 16) & 3 {
            0 => ItsAccess::None,
            1 => ItsAccess::ReadOnly,
            2 => ItsAccess::ReadWriteFirst,
            _ => ItsAccess::ReadWrite,
        }
    }

    fn page(&self) -> PhysicalPage {
        // Eleven bits always fit in a physical page number.
        PhysicalPage::try_from(self.0 & 0o3777).unwrap_or(PhysicalPage::MAX)
    }
}

impl RefillEngine for ItsWalker {
    fn generation(&self) -> Generation {
        Generation::ItsKs
    }

    fn walk(
        &self,
        regs: &PagerRegisters,
        mem: &mut dyn PhysicalStore,
        req: &WalkRequest,
    ) -> Result<Translation, WalkFailure> {
        let page = req.address.page().in_section();
        let (dbr, within) = match (req.mode, page < HIGH_HALF_FIRST) {
            (Mode::User, true) => (Dbr::UserLow, page),
            (Mode::User, false) => (Dbr::UserHigh, page - HIGH_HALF_FIRST),
            (Mode::Exec, true) => (Dbr::ExecLow, page),
            (Mode::Exec, false) => (Dbr::ExecHigh, page - HIGH_HALF_FIRST),
        };
        let word = read_table(
            &*mem,
            regs.its_dbr(dbr),
            within >> 1,
            Rights::default(),
            "ITS page table entry",
        )?;
        let entry = ItsEntry(halfword_entry(word, within));
        event!(
            Level::TRACE,
            "ITS {} page {:o} via {}: {:?} page {}",
            req.mode,
            page,
            dbr,
            entry.access(),
            entry.page()
        );
        let rights = match entry.access() {
            ItsAccess::None => {
                return Err(WalkFailure::new(
                    FaultKind::AccessDenied,
                    Rights::default(),
                    format!("{} page {page:o} is not accessible", req.mode),
                ));
            }
            ItsAccess::ReadOnly | ItsAccess::ReadWriteFirst => Rights {
                accessible: true,
                writable: false,
                public: false,
                cacheable: true,
            },
            ItsAccess::ReadWrite => Rights {
                accessible: true,
                writable: true,
                public: false,
                cacheable: true,
            },
        };
        if req.access.is_write() && !rights.writable {
            return Err(WalkFailure::new(
                FaultKind::WriteProtected,
                rights,
                format!("{} page {page:o} is read-only", req.mode),
            ));
        }
        check_page_exists(&*mem, entry.page(), rights)?;
        Ok(Translation {
            page: entry.page(),
            rights,
            install_writable: rights.writable,
        })
    }
}
