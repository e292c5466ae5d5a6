//! This crate emulates the paging unit of the KS10 and KL10
//! processors: the translation caches, the page-table walkers for the
//! ITS, TOPS-10 and TOPS-20 page table formats, page-fail traps, the
//! accumulator block switch and the KL10 address break.
//!
//! The execution loop owns a [`PagingUnit`], calls
//! [`PagingUnit::translate`] for every memory reference, and stops the
//! current instruction whenever that returns an [`Unwind`].
#![crate_name = "pager"]

mod acblock;
mod addrbreak;
mod cache;
mod conditions;
mod config;
mod context;
mod diagnostics;
mod diagops;
mod fault;
mod faultctl;
mod refill;
mod registers;
mod store;
mod types;
mod unit;
mod vectors;

pub use acblock::{AccumulatorBlocks, PreviousRoute, ACS_PER_BLOCK, AC_BLOCK_COUNT};
pub use addrbreak::{AddressBreak, BreakConditions, BREAK_STORM_LIMIT};
pub use cache::{AccessBits, TranslationCache, TranslationEntry};
pub use conditions::ProcessorConditions;
pub use config::{ConfigError, FaultWordFormat, Generation, PagerConfig, UnknownGeneration};
pub use context::{ExecutionContext, PendingOperation, StandaloneContext};
pub use diagnostics::ReferenceDiagnostics;
pub use diagops::{SweepKind, SweepScope, MEMORY_CONTROLLER};
pub use fault::{
    probe_success_word, Anomaly, FailingAddress, FaultDescriptor, FaultKind, Rights,
    UnknownFaultKind, Unwind,
};
pub use faultctl::FaultController;
pub use refill::{
    refill_engine, ItsWalker, RefillEngine, Tops10Walker, Tops20Walker, Translation,
    WalkFailure, WalkRequest, INDIRECT_LIMIT,
};
pub use registers::{Dbr, PagerRegisters, UserBaseWord};
pub use store::{CoreMemory, MemoryOpFailure, PhysicalStore};
pub use types::{AccessKind, Map, Mode};
pub use unit::{PagerStatus, PagingUnit};

#[cfg(test)]
mod tests;
