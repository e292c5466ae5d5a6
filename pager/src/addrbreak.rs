//! The KL10 address break.
//!
//! The program arms the break with a DATAO APR word:
//!
//! | Bits  | Meaning                       |
//! | ----- | ----------------------------- |
//! | 9     | break on instruction fetch    |
//! | 10    | break on data read            |
//! | 11    | break on data write           |
//! | 12    | break on user references only |
//! | 13-35 | virtual address               |
//!
//! The break works through the translation caches: while armed, the
//! watched page has no access bits in either the exec or the user
//! cache, so that every reference to it misses and comes back to the
//! paging unit.  The true access bits are kept here and put back when
//! the break is disarmed.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use crate::cache::{AccessBits, TranslationCaches};
use crate::types::{AccessKind, Map, Mode};

/// More than this many consecutive breaks at one PC stop the machine.
/// Breaks are consecutive while they share a PC: the count starts
/// again only when a break happens at a different PC (or the break is
/// re-armed), and references which do not break leave it alone.
pub const BREAK_STORM_LIMIT: u32 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BreakConditions {
    pub fetch: bool,
    pub read: bool,
    pub write: bool,
    pub user_only: bool,
}

impl BreakConditions {
    const FETCH: u64 = bit(9);
    const READ: u64 = bit(10);
    const WRITE: u64 = bit(11);
    const USER_ONLY: u64 = bit(12);

    pub fn from_word(w: Unsigned36Bit) -> BreakConditions {
        BreakConditions {
            fetch: !(w & Self::FETCH).is_zero(),
            read: !(w & Self::READ).is_zero(),
            write: !(w & Self::WRITE).is_zero(),
            user_only: !(w & Self::USER_ONLY).is_zero(),
        }
    }

    /// True when no kind of reference is watched.  The user-only bit
    /// on its own watches nothing.
    pub fn is_empty(&self) -> bool {
        !(self.fetch || self.read || self.write)
    }

    fn matches(&self, mode: Mode, access: AccessKind) -> bool {
        if self.user_only && mode != Mode::User {
            return false;
        }
        match access {
            AccessKind::Fetch => self.fetch,
            AccessKind::Read => self.read,
            AccessKind::Write => self.write,
        }
    }
}

impl Display for BreakConditions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.fetch, "fetch"),
            (self.read, "read"),
            (self.write, "write"),
            (self.user_only, "user-only"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddressBreak {
    address: VirtualAddress,
    conditions: BreakConditions,
    saved_exec: AccessBits,
    saved_user: AccessBits,
    hits: u32,
    last_hit_pc: Option<VirtualAddress>,
}

impl AddressBreak {
    /// Decode a DATAO APR word and, if it watches anything, take the
    /// access bits of the watched page out of both caches.
    pub fn arm(w: Unsigned36Bit, caches: &mut TranslationCaches) -> Option<AddressBreak> {
        let conditions = BreakConditions::from_word(w);
        // 23 bits always make a virtual address.
        let address = VirtualAddress::try_from(field(w, 13, 35)).unwrap_or(VirtualAddress::MAX);
        if conditions.is_empty() {
            event!(Level::INFO, "address break at {} disarmed by empty conditions", address);
            return None;
        }
        let page = address.page();
        let saved_exec = caches.get_mut(Map::Exec).take_access(page);
        let saved_user = caches.get_mut(Map::User).take_access(page);
        event!(
            Level::INFO,
            "armed address break at {} on {}",
            address,
            conditions
        );
        Some(AddressBreak {
            address,
            conditions,
            saved_exec,
            saved_user,
            hits: 0,
            last_hit_pc: None,
        })
    }

    /// Put the saved access bits back into the caches.
    pub fn disarm(self, caches: &mut TranslationCaches) {
        let page = self.address.page();
        caches.get_mut(Map::Exec).restore_access(page, self.saved_exec);
        caches.get_mut(Map::User).restore_access(page, self.saved_user);
        event!(Level::INFO, "disarmed address break at {}", self.address);
    }

    pub fn address(&self) -> VirtualAddress {
        self.address
    }

    pub fn conditions(&self) -> BreakConditions {
        self.conditions
    }

    pub fn watches(&self, page: VirtualPage) -> bool {
        self.address.page() == page
    }

    /// Whether a reference of this kind to the watched page breaks.
    pub fn matches(&self, mode: Mode, access: AccessKind) -> bool {
        self.conditions.matches(mode, access)
    }

    /// Remember the access bits a refill of the watched page found,
    /// since they are not installed in the cache.
    pub fn record_true_bits(&mut self, map: Map, bits: AccessBits) {
        match map {
            Map::Exec => self.saved_exec = bits,
            Map::User => self.saved_user = bits,
            Map::Physical => (),
        }
    }

    /// Forget the saved access bits; the watched page has been
    /// invalidated.
    pub fn forget_saved(&mut self) {
        self.saved_exec = AccessBits::NONE;
        self.saved_user = AccessBits::NONE;
    }

    pub fn saved(&self, map: Map) -> AccessBits {
        match map {
            Map::Exec => self.saved_exec,
            Map::User => self.saved_user,
            Map::Physical => AccessBits::NONE,
        }
    }

    /// Count a break at `pc`.  Returns the number of consecutive
    /// breaks at that PC as an error once it exceeds
    /// [`BREAK_STORM_LIMIT`].
    pub fn note_hit(&mut self, pc: VirtualAddress) -> Result<(), u32> {
        if self.last_hit_pc == Some(pc) {
            self.hits = self.hits.saturating_add(1);
        } else {
            self.last_hit_pc = Some(pc);
            self.hits = 1;
        }
        if self.hits > BREAK_STORM_LIMIT {
            event!(
                Level::ERROR,
                "{} consecutive address breaks at PC {}",
                self.hits,
                pc
            );
            Err(self.hits)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TranslationEntry;

    fn w(n: u64) -> Unsigned36Bit {
        Unsigned36Bit::try_from(n).unwrap()
    }

    fn va(n: u64) -> VirtualAddress {
        VirtualAddress::try_from(n).unwrap()
    }

    #[test]
    fn test_conditions_decode() {
        // Read and user-only, address 1234.
        let c = BreakConditions::from_word(w(0o000_240_001_234));
        assert!(!c.fetch);
        assert!(c.read);
        assert!(!c.write);
        assert!(c.user_only);
        assert!(c.matches(Mode::User, AccessKind::Read));
        assert!(!c.matches(Mode::Exec, AccessKind::Read));
        assert!(!c.matches(Mode::User, AccessKind::Write));
        assert_eq!(c.to_string(), "read,user-only");
    }

    #[test]
    fn test_empty_conditions_do_not_arm() {
        let mut caches = TranslationCaches::new(512, 16);
        // User-only on its own.
        assert!(AddressBreak::arm(w(0o000_040_001_000), &mut caches).is_none());
    }

    #[test]
    fn test_arm_and_disarm_restore_access() {
        let mut caches = TranslationCaches::new(512, 16);
        let page = va(0o1000).page();
        let frame = PhysicalPage::try_from(5_u32).unwrap();
        caches
            .get_mut(Map::User)
            .install(page, TranslationEntry::new(frame, true));
        let before = caches.get(Map::User).entry(page);

        // Write break at 1000.
        let brk = AddressBreak::arm(w(0o000_100_001_000), &mut caches).expect("armed");
        assert!(brk.watches(page));
        assert!(caches.get(Map::User).lookup(page, AccessKind::Read).is_none());
        assert_eq!(brk.saved(Map::User), before.access());
        brk.disarm(&mut caches);
        assert_eq!(caches.get(Map::User).entry(page), before);
    }

    #[test]
    fn test_forget_saved_prevents_resurrection() {
        let mut caches = TranslationCaches::new(512, 16);
        let page = va(0o1000).page();
        let frame = PhysicalPage::try_from(5_u32).unwrap();
        caches
            .get_mut(Map::Exec)
            .install(page, TranslationEntry::new(frame, true));
        let mut brk = AddressBreak::arm(w(0o000_400_001_000), &mut caches).expect("armed");
        brk.forget_saved();
        brk.disarm(&mut caches);
        assert!(caches.get(Map::Exec).lookup(page, AccessKind::Read).is_none());
    }

    #[test]
    fn test_break_storm() {
        let mut caches = TranslationCaches::new(512, 16);
        let mut brk = AddressBreak::arm(w(0o000_400_001_000), &mut caches).expect("armed");
        for _ in 0..BREAK_STORM_LIMIT {
            assert!(brk.note_hit(va(0o100)).is_ok());
        }
        // A different PC starts the count again.
        assert!(brk.note_hit(va(0o101)).is_ok());
        for _ in 1..BREAK_STORM_LIMIT {
            assert!(brk.note_hit(va(0o101)).is_ok());
        }
        assert_eq!(brk.note_hit(va(0o101)), Err(BREAK_STORM_LIMIT + 1));
    }
}
