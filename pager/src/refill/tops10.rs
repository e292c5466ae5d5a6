//! KI-style paging on the KS10, as used by TOPS-10.
//!
//! Page maps live inside the process tables, two halfword entries to
//! a word with the even page in the left half:
//!
//! | Bits | Meaning        |
//! | ---- | -------------- |
//! | 0    | A (accessible) |
//! | 1    | P (public)     |
//! | 2    | W (writable)   |
//! | 3    | S (software)   |
//! | 4    | C (cacheable)  |
//! | 5-17 | physical page  |
//!
//! User page p is mapped by UPT + p/2.  The exec address space is
//! mapped in three pieces (see [`crate::vectors`]): pages 0-337 by the
//! EPT at 600, pages 340-377 by the per-process area of the UPT at
//! 400, and pages 400-777 by the EPT at 200.
use tracing::{event, Level};

use base::prelude::*;

use super::{
    check_page_exists, halfword_entry, read_table, RefillEngine, Translation, WalkFailure,
    WalkRequest,
};
use crate::config::Generation;
use crate::fault::{FaultKind, Rights};
use crate::registers::PagerRegisters;
use crate::store::PhysicalStore;
use crate::types::Mode;
use crate::vectors::{
    KI_EXEC_HIGH_FIRST, KI_EXEC_HIGH_MAP, KI_EXEC_LOW_MAP, KI_EXEC_PER_PROCESS_FIRST,
    KI_EXEC_PER_PROCESS_MAP, KI_USER_MAP,
};

#[derive(Debug)]
pub struct Tops10Walker;

struct KiEntry(u32);

impl KiEntry {
    const ACCESSIBLE: u32 = 0o400_000;
    const PUBLIC: u32 = 0o200_000;
    const WRITABLE: u32 = 0o100_000;
    const CACHEABLE: u32 = 0o020_000;
    const PAGE: u32 = 0o017_777;

    fn rights(&self) -> Rights {
        Rights {
            accessible: self.0 & Self::ACCESSIBLE != 0,
            writable: self.0 & Self::WRITABLE != 0,
            public: self.0 & Self::PUBLIC != 0,
            cacheable: self.0 & Self::CACHEABLE != 0,
        }
    }

    fn page(&self) -> PhysicalPage {
        // Thirteen bits always fit in a physical page number.
        PhysicalPage::try_from(self.0 & Self::PAGE).unwrap_or(PhysicalPage::MAX)
    }
}

/// The table holding the entry for `page`, and the word index of the
/// entry within it.
fn entry_location(regs: &PagerRegisters, mode: Mode, page: u32) -> (PhysicalAddress, u32, &'static str) {
    match mode {
        Mode::User => (regs.upt_address(), KI_USER_MAP + page / 2, "UPT user map"),
        Mode::Exec if page < KI_EXEC_PER_PROCESS_FIRST => {
            (regs.ept_address(), KI_EXEC_LOW_MAP + page / 2, "EPT exec map")
        }
        Mode::Exec if page < KI_EXEC_HIGH_FIRST => (
            regs.upt_address(),
            KI_EXEC_PER_PROCESS_MAP + (page - KI_EXEC_PER_PROCESS_FIRST) / 2,
            "UPT per-process exec map",
        ),
        Mode::Exec => (
            regs.ept_address(),
            KI_EXEC_HIGH_MAP + (page - KI_EXEC_HIGH_FIRST) / 2,
            "EPT exec map",
        ),
    }
}

impl RefillEngine for Tops10Walker {
    fn generation(&self) -> Generation {
        Generation::Tops10Ks
    }

    fn walk(
        &self,
        regs: &PagerRegisters,
        mem: &mut dyn PhysicalStore,
        req: &WalkRequest,
    ) -> Result<Translation, WalkFailure> {
        let page = req.address.page().in_section();
        let (table, index, what) = entry_location(regs, req.mode, page);
        let word = read_table(&*mem, table, index, Rights::default(), what)?;
        let entry = KiEntry(halfword_entry(word, page));
        let rights = entry.rights();
        event!(
            Level::TRACE,
            "KI {} page {:o}: entry {:06o} -> page {}",
            req.mode,
            page,
            entry.0,
            entry.page()
        );
        if !rights.accessible {
            return Err(WalkFailure::new(
                FaultKind::AccessDenied,
                rights,
                format!("{} page {page:o} is not accessible", req.mode),
            ));
        }
        if req.access.is_write() && !rights.writable {
            return Err(WalkFailure::new(
                FaultKind::WriteProtected,
                rights,
                format!("{} page {page:o} is not writable", req.mode),
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
