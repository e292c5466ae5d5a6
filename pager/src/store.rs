//! Physical memory, as seen by the paging unit.
//!
//! The pager reads page tables, shared pointer tables, core status
//! tables and trap vectors out of physical memory, and writes back
//! core status entries and the page-fail words.  Physical memory is
//! owned by the machine as a whole, so the pager only sees it through
//! the [`PhysicalStore`] trait.
//!
//! A reference to a physical address beyond the end of configured
//! memory is a failure of its own kind; it is never wrapped around or
//! read as zero, because the pager reports it differently from an
//! access-control failure.
use std::error;
use std::fmt::{self, Debug, Display, Formatter};

use conv::ValueFrom;
use tracing::{event, Level};

use base::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOpFailure {
    NonExistent(PhysicalAddress),
}

impl Display for MemoryOpFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            MemoryOpFailure::NonExistent(addr) => {
                write!(f, "physical address {addr:o} is non-existent memory")
            }
        }
    }
}

impl error::Error for MemoryOpFailure {}

pub trait PhysicalStore {
    fn read(&self, addr: PhysicalAddress) -> Result<Unsigned36Bit, MemoryOpFailure>;
    fn write(&mut self, addr: PhysicalAddress, value: Unsigned36Bit) -> Result<(), MemoryOpFailure>;
    /// The configured memory size in words.
    fn size_words(&self) -> usize;

    fn contains_page(&self, page: PhysicalPage) -> bool {
        match usize::value_from(u32::from(page)) {
            Ok(n) => n < self.size_words() / PAGE_SIZE as usize,
            Err(_) => false,
        }
    }
}

/// Main memory held in-process.
pub struct CoreMemory {
    words: Vec<Unsigned36Bit>,
}

impl CoreMemory {
    pub fn new(size_words: usize) -> CoreMemory {
        event!(Level::DEBUG, "allocating {:o} words of core memory", size_words);
        CoreMemory {
            words: vec![Unsigned36Bit::ZERO; size_words],
        }
    }

    fn index(&self, addr: PhysicalAddress) -> Result<usize, MemoryOpFailure> {
        match usize::value_from(addr.bits()) {
            Ok(n) if n < self.words.len() => Ok(n),
            _ => Err(MemoryOpFailure::NonExistent(addr)),
        }
    }
}

impl Debug for CoreMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreMemory")
            .field("size_words", &self.words.len())
            .finish()
    }
}

impl PhysicalStore for CoreMemory {
    fn read(&self, addr: PhysicalAddress) -> Result<Unsigned36Bit, MemoryOpFailure> {
        let n = self.index(addr)?;
        Ok(self.words[n])
    }

    fn write(&mut self, addr: PhysicalAddress, value: Unsigned36Bit) -> Result<(), MemoryOpFailure> {
        let n = self.index(addr)?;
        self.words[n] = value;
        Ok(())
    }

    fn size_words(&self) -> usize {
        self.words.len()
    }
}

/// Holds back the writes a table walk makes until the reference is
/// known to go ahead.  Reads see the held writes.
pub(crate) struct StagedWrites<'a> {
    inner: &'a mut dyn PhysicalStore,
    writes: Vec<(PhysicalAddress, Unsigned36Bit)>,
}

impl<'a> StagedWrites<'a> {
    pub(crate) fn new(inner: &'a mut dyn PhysicalStore) -> StagedWrites<'a> {
        StagedWrites {
            inner,
            writes: Vec::new(),
        }
    }

    /// Apply the held writes, oldest first.
    pub(crate) fn commit(self) -> Result<(), MemoryOpFailure> {
        for (addr, value) in self.writes {
            self.inner.write(addr, value)?;
        }
        Ok(())
    }

    /// Drop the held writes.
    pub(crate) fn discard(self) {
        if !self.writes.is_empty() {
            event!(
                Level::TRACE,
                "discarding {} table write(s)",
                self.writes.len()
            );
        }
    }
}

impl PhysicalStore for StagedWrites<'_> {
    fn read(&self, addr: PhysicalAddress) -> Result<Unsigned36Bit, MemoryOpFailure> {
        match self.writes.iter().rev().find(|(a, _)| *a == addr) {
            Some((_, value)) => Ok(*value),
            None => self.inner.read(addr),
        }
    }

    fn write(&mut self, addr: PhysicalAddress, value: Unsigned36Bit) -> Result<(), MemoryOpFailure> {
        // Non-existent memory fails now, not at commit.
        self.inner.read(addr)?;
        self.writes.push((addr, value));
        Ok(())
    }

    fn size_words(&self) -> usize {
        self.inner.size_words()
    }
}
