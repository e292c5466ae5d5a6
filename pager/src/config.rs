//! Startup configuration of the paging unit.
//!
//! The hardware generation is chosen once, when the machine is
//! built.  It determines which page-table walker is used, how fault
//! words are laid out, how a fault during interrupt delivery is
//! handled and whether the address break facility exists at all.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Generation {
    /// KS10 running the ITS pager (flat halfword tables indexed by
    /// four descriptor base registers).
    ItsKs,
    /// KS10 running KI-style paging as used by TOPS-10.
    Tops10Ks,
    /// KL10 with multi-section paging as used by TOPS-20.
    Tops20Kl,
}

/// The two fault word layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultWordFormat {
    Ks,
    Kl,
}

impl Generation {
    pub const fn all_generations() -> [Generation; 3] {
        [Generation::ItsKs, Generation::Tops10Ks, Generation::Tops20Kl]
    }

    pub fn has_address_break(&self) -> bool {
        matches!(self, Generation::Tops20Kl)
    }

    pub fn supports_extended_addressing(&self) -> bool {
        matches!(self, Generation::Tops20Kl)
    }

    /// On the KS10 a page failure while delivering an interrupt cannot
    /// be reported to the program.
    pub fn fault_in_interrupt_is_fatal(&self) -> bool {
        !matches!(self, Generation::Tops20Kl)
    }

    /// Only the KL10 can be caught in the middle of a single-step
    /// sequence which has side effects that need undoing.
    pub fn undoes_single_step(&self) -> bool {
        matches!(self, Generation::Tops20Kl)
    }

    pub fn fault_word_format(&self) -> FaultWordFormat {
        match self {
            Generation::ItsKs | Generation::Tops10Ks => FaultWordFormat::Ks,
            Generation::Tops20Kl => FaultWordFormat::Kl,
        }
    }

    /// Largest physical memory the processor can address, in words.
    pub fn max_memory_words(&self) -> usize {
        match self {
            Generation::ItsKs | Generation::Tops10Ks => 1 << 20,
            Generation::Tops20Kl => 1 << 22,
        }
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Generation::ItsKs => "its",
            Generation::Tops10Ks => "tops10",
            Generation::Tops20Kl => "tops20",
        })
    }
}

#[derive(Debug)]
pub struct UnknownGeneration(String);

impl Display for UnknownGeneration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown hardware generation '{}' (expected one of its, tops10, tops20)",
            self.0
        )
    }
}

impl Error for UnknownGeneration {}

impl TryFrom<&str> for Generation {
    type Error = UnknownGeneration;
    fn try_from(s: &str) -> Result<Generation, UnknownGeneration> {
        match s {
            "its" => Ok(Generation::ItsKs),
            "tops10" => Ok(Generation::Tops10Ks),
            "tops20" => Ok(Generation::Tops20Kl),
            _ => Err(UnknownGeneration(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ExtendedAddressingUnsupported(Generation),
    NoMemory,
    MemoryNotWholePages(usize),
    MemoryTooLarge { words: usize, limit: usize },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ExtendedAddressingUnsupported(generation) => write!(
                f,
                "extended addressing is not available on the {generation} generation"
            ),
            ConfigError::NoMemory => f.write_str("physical memory size must not be zero"),
            ConfigError::MemoryNotWholePages(words) => write!(
                f,
                "physical memory size {words:o} is not a whole number of {PAGE_SIZE}-word pages"
            ),
            ConfigError::MemoryTooLarge { words, limit } => write!(
                f,
                "physical memory size {words:o} exceeds the addressable limit of {limit:o} words"
            ),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerConfig {
    pub generation: Generation,
    pub extended_addressing: bool,
    pub memory_words: usize,
}

impl PagerConfig {
    pub fn new(generation: Generation, memory_words: usize) -> PagerConfig {
        PagerConfig {
            generation,
            extended_addressing: false,
            memory_words,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extended_addressing && !self.generation.supports_extended_addressing() {
            return Err(ConfigError::ExtendedAddressingUnsupported(self.generation));
        }
        if self.memory_words == 0 {
            return Err(ConfigError::NoMemory);
        }
        if self.memory_words % PAGE_SIZE as usize != 0 {
            return Err(ConfigError::MemoryNotWholePages(self.memory_words));
        }
        let limit = self.generation.max_memory_words();
        if self.memory_words > limit {
            return Err(ConfigError::MemoryTooLarge {
                words: self.memory_words,
                limit,
            });
        }
        Ok(())
    }

    pub fn memory_pages(&self) -> usize {
        self.memory_words / PAGE_SIZE as usize
    }

    /// Number of virtual pages covered by each translation cache.
    pub fn virtual_pages(&self) -> usize {
        let sections = if self.extended_addressing {
            SECTION_COUNT
        } else {
            1
        };
        (sections * PAGES_PER_SECTION) as usize
    }

    /// Whether old and new PCs are stored in the two-word format.
    pub fn two_word_pc(&self) -> bool {
        self.extended_addressing
    }
}
