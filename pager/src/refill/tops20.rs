//! Multi-section paging on the KL10, as used by TOPS-20.
//!
//! A virtual page is resolved in two stages.  The section number
//! selects a section pointer in the process table (UPT or EPT at 540
//! plus the section), which resolves to the page holding the page
//! map for that section.  The page-within-section then selects a page
//! pointer in that map, which resolves to the physical page.
//!
//! Both kinds of pointer share one format:
//!
//! | Bits  | Meaning                                               |
//! | ----- | ----------------------------------------------------- |
//! | 0-2   | type: 0 no access, 1 immediate, 2 shared, 3 indirect  |
//! | 3     | P (public)                                            |
//! | 4     | W (writable)                                          |
//! | 5     | K (ignored)                                           |
//! | 6     | C (cacheable)                                         |
//! | 12-17 | storage medium (immediate pointers; 0 means in core)  |
//! | 9-17  | page map index (indirect pointers)                    |
//! | 18-35 | SPT index (shared and indirect pointers)              |
//! | 23-35 | physical page (immediate pointers)                    |
//!
//! Entries of the shared pointer table (SPT) hold a storage medium
//! in bits 12-17 and a physical page in bits 23-35.  An indirect
//! pointer names a page through the SPT and a word within that page,
//! which holds the next pointer.
//!
//! The P, W and C bits of every pointer followed are ANDed together.
//!
//! When the core status table (CST) is enabled, every page the walk
//! passes through, and the final page, has its CST entry checked and
//! updated: an entry with a zero age field (bits 0-5) means the page
//! has been aged out, and otherwise the entry becomes
//! `(entry & CSTM) | PUR`.  A write to the final page also sets the
//! modified bit (bit 35).
use tracing::{event, Level};

use base::prelude::*;

use super::{check_page_exists, read_table, RefillEngine, Translation, WalkFailure, WalkRequest};
use crate::config::Generation;
use crate::fault::{FaultKind, Rights};
use crate::registers::PagerRegisters;
use crate::store::PhysicalStore;
use crate::types::Mode;
use crate::vectors::SECTION_POINTERS;

/// Longest chain of indirect pointers followed before the walk is
/// abandoned as an inconsistent table.
pub const INDIRECT_LIMIT: u32 = 64;

const CST_MODIFIED: u64 = 1;

#[derive(Debug)]
pub struct Tops20Walker;

#[derive(Debug, PartialEq, Eq)]
enum PointerType {
    NoAccess,
    Immediate,
    Shared,
    Indirect,
    Undefined(u64),
}

#[derive(Debug, Clone, Copy)]
struct Pointer(Unsigned36Bit);

impl Pointer {
    const PUBLIC: u64 = bit(3);
    const WRITABLE: u64 = bit(4);
    const CACHEABLE: u64 = bit(6);

    fn kind(&self) -> PointerType {
        match field(self.0, 0, 2) {
            0 => PointerType::NoAccess,
            1 => PointerType::Immediate,
            2 => PointerType::Shared,
            3 => PointerType::Indirect,
            n => PointerType::Undefined(n),
        }
    }

    fn rights(&self) -> Rights {
        Rights {
            accessible: true,
            writable: !(self.0 & Self::WRITABLE).is_zero(),
            public: !(self.0 & Self::PUBLIC).is_zero(),
            cacheable: !(self.0 & Self::CACHEABLE).is_zero(),
        }
    }

    fn spt_index(&self) -> u32 {
        field(self.0, 18, 35) as u32
    }

    fn map_index(&self) -> u32 {
        field(self.0, 9, 17) as u32
    }
}

fn storage_medium(w: Unsigned36Bit) -> u64 {
    field(w, 12, 17)
}

fn page_number(w: Unsigned36Bit) -> PhysicalPage {
    // Thirteen bits always fit in a physical page number.
    PhysicalPage::try_from(field(w, 23, 35)).unwrap_or(PhysicalPage::MAX)
}

fn and_rights(a: Rights, b: Rights) -> Rights {
    Rights {
        accessible: a.accessible && b.accessible,
        writable: a.writable && b.writable,
        public: a.public && b.public,
        cacheable: a.cacheable && b.cacheable,
    }
}

/// The state of one walk: where it reads from and the rights it has
/// accumulated so far.
struct Walk<'a> {
    regs: &'a PagerRegisters,
    mem: &'a mut dyn PhysicalStore,
    rights: Rights,
}

impl Walk<'_> {
    fn fail(&self, kind: FaultKind, cause: String) -> WalkFailure {
        WalkFailure::new(kind, self.rights, cause)
    }

    fn in_core(&self, w: Unsigned36Bit, what: &str) -> Result<PhysicalPage, WalkFailure> {
        match storage_medium(w) {
            0 => Ok(page_number(w)),
            medium => Err(self.fail(
                FaultKind::NotInCore,
                format!("{what} {w:012o} names storage medium {medium:o}"),
            )),
        }
    }

    fn shared_page(&self, index: u32) -> Result<PhysicalPage, WalkFailure> {
        let entry = read_table(
            &*self.mem,
            self.regs.spt_base(),
            index,
            self.rights,
            "SPT entry",
        )?;
        self.in_core(entry, "SPT entry")
    }

    /// Check and update the CST entry for `page`.  Returns whether the
    /// page is (now) marked modified; this is always true when the
    /// CST is disabled.
    fn touch(&mut self, page: PhysicalPage, write: bool) -> Result<bool, WalkFailure> {
        let Some(cst) = self.regs.cst_base() else {
            return Ok(true);
        };
        let index = u32::from(page);
        let entry = read_table(&*self.mem, cst, index, self.rights, "CST entry")?;
        if field(entry, 0, 5) == 0 {
            return Err(self.fail(
                FaultKind::Aged,
                format!("CST entry {entry:012o} for page {page} has aged out"),
            ));
        }
        let mut updated = (entry & self.regs.cst_mask()) | self.regs.process_use();
        if write {
            updated = updated | CST_MODIFIED;
        }
        // The entry was read from this address a moment ago.
        if let Some(addr) = cst.checked_add(index) {
            if self.mem.write(addr, updated).is_err() {
                return Err(WalkFailure::non_existent(addr, self.rights, "CST entry"));
            }
        }
        event!(
            Level::TRACE,
            "CST entry for page {} {:012o} -> {:012o}",
            page,
            entry,
            updated
        );
        Ok(!(updated & CST_MODIFIED).is_zero())
    }

    /// Follow a pointer (and any chain of indirect pointers it leads
    /// to) to a physical page.
    fn resolve(&mut self, first: Unsigned36Bit, what: &str) -> Result<PhysicalPage, WalkFailure> {
        let mut pointer = Pointer(first);
        let mut indirections = 0;
        loop {
            event!(Level::TRACE, "{} {:012o}: {:?}", what, pointer.0, pointer.kind());
            match pointer.kind() {
                PointerType::NoAccess => {
                    self.rights.accessible = false;
                    return Err(self.fail(
                        FaultKind::AccessDenied,
                        format!("{what} {:012o} grants no access", pointer.0),
                    ));
                }
                PointerType::Undefined(t) => {
                    return Err(self.fail(
                        FaultKind::IllegalPointer,
                        format!("{what} {:012o} has undefined type {t}", pointer.0),
                    ));
                }
                PointerType::Immediate => {
                    self.rights = and_rights(self.rights, pointer.rights());
                    return self.in_core(pointer.0, what);
                }
                PointerType::Shared => {
                    self.rights = and_rights(self.rights, pointer.rights());
                    return self.shared_page(pointer.spt_index());
                }
                PointerType::Indirect => {
                    self.rights = and_rights(self.rights, pointer.rights());
                    indirections += 1;
                    if indirections > INDIRECT_LIMIT {
                        return Err(self.fail(
                            FaultKind::IllegalPointer,
                            format!("more than {INDIRECT_LIMIT} indirect pointers"),
                        ));
                    }
                    let map = self.shared_page(pointer.spt_index())?;
                    self.touch(map, false)?;
                    let next = read_table(
                        &*self.mem,
                        map.address(),
                        pointer.map_index(),
                        self.rights,
                        "indirect page map entry",
                    )?;
                    pointer = Pointer(next);
                }
            }
        }
    }
}

impl RefillEngine for Tops20Walker {
    fn generation(&self) -> Generation {
        Generation::Tops20Kl
    }

    fn walk(
        &self,
        regs: &PagerRegisters,
        mem: &mut dyn PhysicalStore,
        req: &WalkRequest,
    ) -> Result<Translation, WalkFailure> {
        let section = req.address.section();
        if section >= SECTION_COUNT {
            return Err(WalkFailure::new(
                FaultKind::IllegalSection,
                Rights::default(),
                format!("section {section:o} does not exist"),
            ));
        }
        let process_table = match req.mode {
            Mode::User => regs.upt_address(),
            Mode::Exec => regs.ept_address(),
        };
        let mut walk = Walk {
            regs,
            mem,
            rights: Rights::ALL,
        };
        let section_pointer = read_table(
            &*walk.mem,
            process_table,
            SECTION_POINTERS + section,
            walk.rights,
            "section pointer",
        )?;
        let map = walk.resolve(section_pointer, "section pointer")?;
        walk.touch(map, false)?;
        let page_in_section = req.address.page().in_section();
        let page_pointer = read_table(
            &*walk.mem,
            map.address(),
            page_in_section,
            walk.rights,
            "page pointer",
        )?;
        let page = walk.resolve(page_pointer, "page pointer")?;
        let rights = walk.rights;

        if req.public && !rights.public {
            return Err(walk.fail(
                FaultKind::Proprietary,
                format!("public reference to private page {}", req.address.page()),
            ));
        }
        let write = req.access.is_write();
        if write && !rights.writable {
            return Err(walk.fail(
                FaultKind::WriteProtected,
                format!("page {} is not writable", req.address.page()),
            ));
        }
        check_page_exists(&*walk.mem, page, rights)?;
        let modified = walk.touch(page, write)?;
        Ok(Translation {
            page,
            rights,
            install_writable: rights.writable && (write || modified),
        })
    }
}
