//! Page-table walkers.
//!
//! When a translation cache misses, the paging unit asks the refill
//! engine for the configured hardware generation to resolve the
//! virtual page by walking that generation's page tables in physical
//! memory.  The walkers know nothing of the caches, the fault
//! controller or the address break; they either produce a
//! [`Translation`] or explain why they could not.
//!
//! Each generation's table format is decoded only here.
use std::fmt::Debug;

use tracing::{event, Level};

use base::prelude::*;

use crate::config::Generation;
use crate::fault::{FaultKind, Rights};
use crate::registers::PagerRegisters;
use crate::store::PhysicalStore;
use crate::types::{AccessKind, Mode};

mod its;
mod tops10;
mod tops20;

pub use its::ItsWalker;
pub use tops10::Tops10Walker;
pub use tops20::{Tops20Walker, INDIRECT_LIMIT};

#[derive(Debug, Clone, Copy)]
pub struct WalkRequest {
    pub mode: Mode,
    pub address: VirtualAddress,
    pub access: AccessKind,
    /// True when the executing context is public (KL10 proprietary
    /// protection).
    pub public: bool,
}

/// The result of a successful walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub page: PhysicalPage,
    pub rights: Rights,
    /// Whether the cache entry may be installed writable.  This can
    /// be false for a writable page whose modified bit has not yet
    /// been set, so that the first write comes back through the
    /// walker.
    pub install_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkFailure {
    pub kind: FaultKind,
    pub rights: Rights,
    /// Set for failures which concern a physical address (a table
    /// or page in non-existent memory).
    pub physical: Option<PhysicalAddress>,
    pub cause: String,
}

impl WalkFailure {
    pub fn new(kind: FaultKind, rights: Rights, cause: String) -> WalkFailure {
        WalkFailure {
            kind,
            rights,
            physical: None,
            cause,
        }
    }

    pub fn non_existent(addr: PhysicalAddress, rights: Rights, what: &str) -> WalkFailure {
        WalkFailure {
            kind: FaultKind::NonExistentMemory,
            rights,
            physical: Some(addr),
            cause: format!("{what} at {addr} is in non-existent memory"),
        }
    }
}

pub trait RefillEngine: Debug {
    fn generation(&self) -> Generation;

    fn walk(
        &self,
        regs: &PagerRegisters,
        mem: &mut dyn PhysicalStore,
        req: &WalkRequest,
    ) -> Result<Translation, WalkFailure>;
}

/// Choose the walker for `generation`.
pub fn refill_engine(generation: Generation) -> Box<dyn RefillEngine> {
    match generation {
        Generation::ItsKs => Box::new(ItsWalker),
        Generation::Tops10Ks => Box::new(Tops10Walker),
        Generation::Tops20Kl => Box::new(Tops20Walker),
    }
}

/// Read word `index` of the table at `base`.
pub(crate) fn read_table(
    mem: &dyn PhysicalStore,
    base: PhysicalAddress,
    index: u32,
    rights: Rights,
    what: &str,
) -> Result<Unsigned36Bit, WalkFailure> {
    let addr = match base.checked_add(index) {
        Some(addr) => addr,
        None => {
            return Err(WalkFailure::new(
                FaultKind::NonExistentMemory,
                rights,
                format!("{what} lies beyond the physical address space"),
            ));
        }
    };
    match mem.read(addr) {
        Ok(w) => {
            event!(Level::TRACE, "{} at {} is {:012o}", what, addr, w);
            Ok(w)
        }
        Err(_) => Err(WalkFailure::non_existent(addr, rights, what)),
    }
}

/// Select the halfword entry for `page` from a word holding two
/// entries; the even page is in the left half.
pub(crate) fn halfword_entry(word: Unsigned36Bit, page: u32) -> u32 {
    let half = if page % 2 == 0 {
        left_half(word)
    } else {
        right_half(word)
    };
    u32::from(half)
}

/// Reject a final physical page which lies beyond configured memory.
pub(crate) fn check_page_exists(
    mem: &dyn PhysicalStore,
    page: PhysicalPage,
    rights: Rights,
) -> Result<(), WalkFailure> {
    if mem.contains_page(page) {
        Ok(())
    } else {
        Err(WalkFailure::non_existent(page.address(), rights, "mapped page"))
    }
}
