//! Translation caches.
//!
//! There is one cache for each of the exec and user address spaces,
//! plus an identity map used for every reference while the pager is
//! disabled.  No replacement policy is modelled; each cache has an
//! entry for every virtual page.
//!
//! An entry which is not valid for read is invalid, and a lookup of
//! an invalid entry is a miss.  A write lookup against an entry which
//! is not valid for write is also a miss, so that the refill can
//! either mark the page modified or report the failure.
use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use crate::types::{AccessKind, Map};

/// The access portion of a translation entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccessBits {
    pub readable: bool,
    pub writable: bool,
}

impl AccessBits {
    pub const NONE: AccessBits = AccessBits {
        readable: false,
        writable: false,
    };

    fn permits(&self, access: AccessKind) -> bool {
        if access.is_write() {
            self.writable
        } else {
            self.readable
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranslationEntry {
    access: AccessBits,
    page: PhysicalPage,
}

impl TranslationEntry {
    pub const INVALID: TranslationEntry = TranslationEntry {
        access: AccessBits::NONE,
        page: PhysicalPage::MIN,
    };

    pub fn new(page: PhysicalPage, writable: bool) -> TranslationEntry {
        TranslationEntry {
            access: AccessBits {
                readable: true,
                writable,
            },
            page,
        }
    }

    /// An entry which remembers its page but permits no access.
    pub fn without_access(page: PhysicalPage) -> TranslationEntry {
        TranslationEntry {
            access: AccessBits::NONE,
            page,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.access.readable
    }

    pub fn access(&self) -> AccessBits {
        self.access
    }

    pub fn page(&self) -> PhysicalPage {
        self.page
    }
}

#[derive(Debug)]
pub struct TranslationCache {
    map: Map,
    entries: Vec<TranslationEntry>,
}

impl TranslationCache {
    pub fn new(map: Map, pages: usize) -> TranslationCache {
        TranslationCache {
            map,
            entries: vec![TranslationEntry::INVALID; pages],
        }
    }

    /// Build the identity map for `memory_pages` pages of physical
    /// memory.  Virtual pages beyond the end of memory stay invalid.
    pub fn physical_identity(pages: usize, memory_pages: usize) -> TranslationCache {
        let mut cache = TranslationCache::new(Map::Physical, pages);
        for (n, entry) in cache.entries.iter_mut().enumerate().take(memory_pages) {
            if let Ok(page) = PhysicalPage::try_from(n as u64) {
                *entry = TranslationEntry::new(page, true);
            }
        }
        cache
    }

    pub fn lookup(&self, page: VirtualPage, access: AccessKind) -> Option<TranslationEntry> {
        match self.entries.get(page.index()) {
            Some(entry) if entry.access.permits(access) => {
                event!(
                    Level::TRACE,
                    "{} cache hit for page {} ({}): {:?}",
                    self.map,
                    page,
                    access,
                    entry
                );
                Some(*entry)
            }
            _ => {
                event!(
                    Level::TRACE,
                    "{} cache miss for page {} ({})",
                    self.map,
                    page,
                    access
                );
                None
            }
        }
    }

    /// The current entry for `page`, valid or not.
    pub fn entry(&self, page: VirtualPage) -> TranslationEntry {
        self.entries
            .get(page.index())
            .copied()
            .unwrap_or(TranslationEntry::INVALID)
    }

    pub fn install(&mut self, page: VirtualPage, entry: TranslationEntry) {
        if let Some(slot) = self.entries.get_mut(page.index()) {
            event!(
                Level::DEBUG,
                "{} cache: page {} -> {:?}",
                self.map,
                page,
                entry
            );
            *slot = entry;
        }
    }

    pub fn invalidate_all(&mut self) {
        event!(Level::DEBUG, "invalidating the whole {} cache", self.map);
        self.entries.fill(TranslationEntry::INVALID);
    }

    /// Invalidate one page.  Returns true if the entry had been valid.
    pub fn invalidate_one(&mut self, page: VirtualPage) -> bool {
        match self.entries.get_mut(page.index()) {
            Some(slot) => {
                let was_valid = slot.is_valid();
                slot.access = AccessBits::NONE;
                was_valid
            }
            None => false,
        }
    }

    /// Remove and return the access bits of `page`, leaving the
    /// physical page number in place.
    pub fn take_access(&mut self, page: VirtualPage) -> AccessBits {
        match self.entries.get_mut(page.index()) {
            Some(slot) => std::mem::replace(&mut slot.access, AccessBits::NONE),
            None => AccessBits::NONE,
        }
    }

    pub fn restore_access(&mut self, page: VirtualPage, access: AccessBits) {
        if let Some(slot) = self.entries.get_mut(page.index()) {
            slot.access = access;
        }
    }

    pub fn valid_entries(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }
}

/// The three translation caches of the paging unit.
#[derive(Debug)]
pub struct TranslationCaches {
    exec: TranslationCache,
    user: TranslationCache,
    physical: TranslationCache,
}

impl TranslationCaches {
    pub fn new(virtual_pages: usize, memory_pages: usize) -> TranslationCaches {
        TranslationCaches {
            exec: TranslationCache::new(Map::Exec, virtual_pages),
            user: TranslationCache::new(Map::User, virtual_pages),
            physical: TranslationCache::physical_identity(virtual_pages, memory_pages),
        }
    }

    pub fn get(&self, map: Map) -> &TranslationCache {
        match map {
            Map::Exec => &self.exec,
            Map::User => &self.user,
            Map::Physical => &self.physical,
        }
    }

    pub fn get_mut(&mut self, map: Map) -> &mut TranslationCache {
        match map {
            Map::Exec => &mut self.exec,
            Map::User => &mut self.user,
            Map::Physical => &mut self.physical,
        }
    }

    /// Invalidate the exec and user caches.  The physical map never
    /// changes.
    pub fn invalidate_paged(&mut self) {
        self.exec.invalidate_all();
        self.user.invalidate_all();
    }

    /// Invalidate one page in both the exec and the user cache.
    pub fn invalidate_page(&mut self, page: VirtualPage) {
        let exec = self.exec.invalidate_one(page);
        let user = self.user.invalidate_one(page);
        event!(
            Level::DEBUG,
            "cleared page {} (exec entry was {}, user entry was {})",
            page,
            if exec { "valid" } else { "invalid" },
            if user { "valid" } else { "invalid" },
        );
    }
}
