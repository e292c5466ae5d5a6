//! The paging unit: translation caches, refill, faults, accumulator
//! blocks and the address break, behind one object which the
//! execution loop owns.
use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use crate::acblock::AccumulatorBlocks;
use crate::addrbreak::AddressBreak;
use crate::cache::{TranslationCaches, TranslationEntry};
use crate::conditions::ProcessorConditions;
use crate::config::{ConfigError, Generation, PagerConfig};
use crate::context::ExecutionContext;
use crate::diagnostics::ReferenceDiagnostics;
use crate::diagops::{self, SweepKind, SweepScope};
use crate::fault::{
    probe_success_word, Anomaly, FailingAddress, FaultDescriptor, FaultKind, Rights, Unwind,
};
use crate::faultctl::{FaultController, TrapPath};
use crate::refill::{refill_engine, RefillEngine, Translation, WalkRequest};
use crate::registers::{Dbr, PagerRegisters, UserBaseWord};
use crate::store::{MemoryOpFailure, PhysicalStore, StagedWrites};
use crate::types::{AccessKind, Map, Mode};

/// The rights reported for references made with paging disabled.
const UNPAGED_RIGHTS: Rights = Rights {
    accessible: true,
    writable: true,
    public: false,
    cacheable: true,
};

/// A snapshot of the paging unit for front ends.
#[derive(Debug, Clone, Serialize)]
pub struct PagerStatus {
    pub generation: String,
    pub extended_addressing: bool,
    pub pager_enabled: bool,
    pub exec_base: u64,
    pub user_base: u16,
    pub current_ac_block: u8,
    pub previous_ac_block: u8,
    pub valid_exec_entries: usize,
    pub valid_user_entries: usize,
    pub address_break: Option<String>,
    pub conditions: ProcessorConditions,
    pub last_fault: Option<FaultDescriptor>,
}

enum RefillOutcome {
    Resolved(PhysicalAddress),
    Failed(FaultDescriptor),
}

#[derive(Debug)]
pub struct PagingUnit {
    config: PagerConfig,
    regs: PagerRegisters,
    caches: TranslationCaches,
    refill: Box<dyn RefillEngine>,
    faults: FaultController,
    acs: AccumulatorBlocks,
    address_break: Option<AddressBreak>,
    conditions: ProcessorConditions,
}

impl PagingUnit {
    pub fn new(config: PagerConfig) -> Result<PagingUnit, ConfigError> {
        config.validate()?;
        event!(
            Level::INFO,
            "paging unit for {} with {} pages of memory{}",
            config.generation,
            config.memory_pages(),
            if config.extended_addressing {
                ", extended addressing"
            } else {
                ""
            }
        );
        Ok(PagingUnit {
            regs: PagerRegisters::new(),
            caches: TranslationCaches::new(config.virtual_pages(), config.memory_pages()),
            refill: refill_engine(config.generation),
            faults: FaultController::new(&config),
            acs: AccumulatorBlocks::new(),
            address_break: None,
            conditions: ProcessorConditions::default(),
            config,
        })
    }

    /// Return to the power-on state: paging off, registers clear,
    /// accumulator block 0 current and previous.
    pub fn reset(&mut self) {
        event!(Level::INFO, "resetting the paging unit");
        self.regs = PagerRegisters::new();
        self.caches.invalidate_paged();
        self.address_break = None;
        self.acs.select(0, 0);
        self.conditions.clear_all();
        self.faults.reset();
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    pub fn registers(&self) -> &PagerRegisters {
        &self.regs
    }

    fn map_for(&self, mode: Mode) -> Map {
        if self.regs.pager_enabled() {
            Map::from(mode)
        } else {
            Map::Physical
        }
    }

    /// Translate `va` for a reference of kind `access` in `mode`.
    ///
    /// On failure a page-fail trap is delivered (or the machine
    /// stops) and the unwind is returned; the execution loop must
    /// abandon the current instruction.
    pub fn translate(
        &mut self,
        ctx: &mut dyn ExecutionContext,
        mem: &mut dyn PhysicalStore,
        mode: Mode,
        va: VirtualAddress,
        access: AccessKind,
    ) -> Result<PhysicalAddress, Unwind> {
        let map = self.map_for(mode);
        if let Some(entry) = self.caches.get(map).lookup(va.page(), access) {
            return Ok(PhysicalAddress::new(entry.page(), va.offset()));
        }
        match self.resolve(ctx, mem, mode, va, access)? {
            RefillOutcome::Resolved(addr) => Ok(addr),
            RefillOutcome::Failed(fault) => {
                let upt = self.regs.upt_address();
                Err(self.faults.trap(
                    fault,
                    TrapPath {
                        ctx,
                        mem,
                        upt,
                        conditions: &mut self.conditions,
                    },
                ))
            }
        }
    }

    /// Refill the translation for `va` without first consulting the
    /// cache.  A failure traps when `trap_allowed` is true; otherwise
    /// it is recorded (see [`PagingUnit::last_fault`]) and `Ok(None)`
    /// is returned.
    pub fn refill(
        &mut self,
        ctx: &mut dyn ExecutionContext,
        mem: &mut dyn PhysicalStore,
        mode: Mode,
        va: VirtualAddress,
        access: AccessKind,
        trap_allowed: bool,
    ) -> Result<Option<PhysicalAddress>, Unwind> {
        match self.resolve(ctx, mem, mode, va, access)? {
            RefillOutcome::Resolved(addr) => Ok(Some(addr)),
            RefillOutcome::Failed(fault) => {
                let upt = self.regs.upt_address();
                self.faults.declare(
                    fault,
                    trap_allowed,
                    TrapPath {
                        ctx,
                        mem,
                        upt,
                        conditions: &mut self.conditions,
                    },
                )?;
                Ok(None)
            }
        }
    }

    fn unpaged_failure(&mut self, mode: Mode, va: VirtualAddress, access: AccessKind) -> FaultDescriptor {
        self.conditions.raise_non_existent_memory();
        FaultDescriptor {
            address: match PhysicalAddress::try_from(va.bits()) {
                Ok(pa) => FailingAddress::Physical(pa),
                Err(_) => FailingAddress::Virtual(va),
            },
            mode,
            access,
            map: Map::Physical,
            kind: FaultKind::NonExistentMemory,
            rights: Rights::default(),
            cause: format!("unpaged reference to {va} is beyond configured memory"),
        }
    }

    /// Walk the page tables for `va`.
    fn walk(
        &mut self,
        mem: &mut dyn PhysicalStore,
        mode: Mode,
        va: VirtualAddress,
        access: AccessKind,
        public: bool,
    ) -> Result<Translation, FaultDescriptor> {
        let map = Map::from(mode);
        let section = va.section();
        let failure = |kind, rights, address, cause| FaultDescriptor {
            address,
            mode,
            access,
            map,
            kind,
            rights,
            cause,
        };
        if section >= SECTION_COUNT || (section != 0 && !self.config.extended_addressing) {
            return Err(failure(
                FaultKind::IllegalSection,
                Rights::default(),
                FailingAddress::Virtual(va),
                format!("section {section:o} cannot be mapped"),
            ));
        }
        let req = WalkRequest {
            mode,
            address: va,
            access,
            public,
        };
        event!(Level::DEBUG, "refilling {} {} of {}", mode, access, va);
        self.refill.walk(&self.regs, mem, &req).map_err(|f| {
            if f.kind == FaultKind::NonExistentMemory {
                self.conditions.raise_non_existent_memory();
            }
            let address = match f.physical {
                Some(pa) => FailingAddress::Physical(pa),
                None => FailingAddress::Virtual(va),
            };
            failure(f.kind, f.rights, address, f.cause)
        })
    }

    /// Put a translation into the cache.  The watched page of an
    /// armed address break goes in without access bits, and its true
    /// bits are kept by the address break.
    fn install(&mut self, map: Map, page: VirtualPage, t: &Translation) {
        let entry = TranslationEntry::new(t.page, t.install_writable);
        match self.address_break.as_mut() {
            Some(brk) if brk.watches(page) => {
                brk.record_true_bits(map, entry.access());
                self.caches
                    .get_mut(map)
                    .install(page, TranslationEntry::without_access(t.page));
            }
            _ => self.caches.get_mut(map).install(page, entry),
        }
    }

    fn commit_table_writes(
        &mut self,
        staged: StagedWrites<'_>,
        mode: Mode,
        va: VirtualAddress,
        access: AccessKind,
    ) -> Result<(), FaultDescriptor> {
        staged.commit().map_err(|e| {
            self.conditions.raise_non_existent_memory();
            let MemoryOpFailure::NonExistent(pa) = e;
            FaultDescriptor {
                address: FailingAddress::Physical(pa),
                mode,
                access,
                map: Map::from(mode),
                kind: FaultKind::NonExistentMemory,
                rights: Rights::default(),
                cause: e.to_string(),
            }
        })
    }

    fn resolve(
        &mut self,
        ctx: &dyn ExecutionContext,
        mem: &mut dyn PhysicalStore,
        mode: Mode,
        va: VirtualAddress,
        access: AccessKind,
    ) -> Result<RefillOutcome, Unwind> {
        let map = self.map_for(mode);
        let page = va.page();
        if map == Map::Physical {
            return Ok(match self.caches.get(map).lookup(page, access) {
                Some(entry) => RefillOutcome::Resolved(PhysicalAddress::new(entry.page(), va.offset())),
                None => RefillOutcome::Failed(self.unpaged_failure(mode, va, access)),
            });
        }
        let mut staged = StagedWrites::new(mem);
        let t = match self.walk(&mut staged, mode, va, access, ctx.flags().public()) {
            Ok(t) => t,
            Err(fault) => {
                let fault = match self.commit_table_writes(staged, mode, va, access) {
                    Ok(()) => fault,
                    Err(nxm) => nxm,
                };
                return Ok(RefillOutcome::Failed(fault));
            }
        };
        let inhibited = ctx.flags().address_failure_inhibit() || ctx.in_uninterruptible_sequence();
        if let Some(brk) = self.address_break.as_mut() {
            if brk.watches(page) && brk.matches(mode, access) && !inhibited {
                // The reference does not happen, so neither do the
                // core status updates made by the walk.
                staged.discard();
                self.conditions.address_break_hit = true;
                // A write that breaks has not set the modified bit,
                // so the restored entry must send the next write back
                // through the walker.
                let saved = TranslationEntry::new(t.page, t.install_writable && !access.is_write());
                brk.record_true_bits(map, saved.access());
                self.caches
                    .get_mut(map)
                    .install(page, TranslationEntry::without_access(t.page));
                if let Err(hits) = brk.note_hit(ctx.pc()) {
                    let diagnostics =
                        ReferenceDiagnostics::capture(ctx, mode, FailingAddress::Virtual(va), access);
                    return Err(Unwind::Halt(Anomaly::AddressBreakStorm { hits, diagnostics }));
                }
                return Ok(RefillOutcome::Failed(FaultDescriptor {
                    address: FailingAddress::Virtual(va),
                    mode,
                    access,
                    map,
                    kind: FaultKind::AddressBreak,
                    rights: t.rights,
                    cause: format!("address break at {}", brk.address()),
                }));
            }
        }
        if let Err(fault) = self.commit_table_writes(staged, mode, va, access) {
            return Ok(RefillOutcome::Failed(fault));
        }
        self.install(map, page, &t);
        Ok(RefillOutcome::Resolved(PhysicalAddress::new(t.page, va.offset())))
    }

    /// The MAP instruction: report how `va` translates, without
    /// trapping.  The address break is not checked.
    pub fn probe(
        &mut self,
        ctx: &dyn ExecutionContext,
        mem: &mut dyn PhysicalStore,
        mode: Mode,
        va: VirtualAddress,
    ) -> Unsigned36Bit {
        let format = self.config.generation.fault_word_format();
        let map = self.map_for(mode);
        let result = if map == Map::Physical {
            match self.caches.get(map).lookup(va.page(), AccessKind::Read) {
                Some(entry) => Ok(probe_success_word(
                    UNPAGED_RIGHTS,
                    false,
                    PhysicalAddress::new(entry.page(), va.offset()),
                )),
                None => Err(self.unpaged_failure(mode, va, AccessKind::Read)),
            }
        } else {
            self.walk(mem, mode, va, AccessKind::Read, ctx.flags().public())
                .map(|t| {
                    self.install(map, va.page(), &t);
                    probe_success_word(t.rights, true, PhysicalAddress::new(t.page, va.offset()))
                })
        };
        match result {
            Ok(w) => {
                event!(Level::DEBUG, "MAP {} {} -> {:012o}", mode, va, w);
                w
            }
            Err(fault) => {
                let w = fault.probe_failure_word(format);
                event!(Level::DEBUG, "MAP {} {} failed -> {:012o}", mode, va, w);
                self.faults.suppress(fault);
                w
            }
        }
    }

    /// Invalidate every exec and user translation.
    pub fn invalidate_all(&mut self) {
        self.caches.invalidate_paged();
        if let Some(brk) = self.address_break.as_mut() {
            brk.forget_saved();
        }
    }

    /// Clear the translation of the page containing `va` in both the
    /// exec and the user cache (CLRPT).
    pub fn clear_page(&mut self, va: VirtualAddress) {
        let page = va.page();
        self.caches.invalidate_page(page);
        if let Some(brk) = self.address_break.as_mut() {
            if brk.watches(page) {
                brk.forget_saved();
            }
        }
    }

    pub fn select_ac_blocks(&mut self, current: u8, previous: u8) {
        self.acs.select(current, previous);
    }

    pub fn acs(&self) -> &AccumulatorBlocks {
        &self.acs
    }

    pub fn acs_mut(&mut self) -> &mut AccumulatorBlocks {
        &mut self.acs
    }

    /// Arm (or, with an empty condition set, disarm) the address
    /// break from a DATAO APR word.
    pub fn arm_address_break(&mut self, w: Unsigned36Bit) {
        if !self.config.generation.has_address_break() {
            event!(
                Level::WARN,
                "ignoring address break {:012o}: {} has no address break",
                w,
                self.config.generation
            );
            return;
        }
        self.disarm_address_break();
        self.address_break = AddressBreak::arm(w, &mut self.caches);
    }

    pub fn disarm_address_break(&mut self) {
        if let Some(brk) = self.address_break.take() {
            brk.disarm(&mut self.caches);
        }
    }

    pub fn address_break(&self) -> Option<&AddressBreak> {
        self.address_break.as_ref()
    }

    /// WREBR: load the exec base register.  This also turns paging on
    /// or off.
    pub fn write_exec_base(&mut self, w: Unsigned36Bit) {
        self.regs.set_exec_base(w);
        self.invalidate_all();
    }

    pub fn read_exec_base(&self) -> Unsigned36Bit {
        self.regs.exec_base()
    }

    /// WRUBR: select accumulator blocks and/or load the user base
    /// register, as the operand's bits 0 and 2 say.
    pub fn write_user_base(&mut self, w: Unsigned36Bit) {
        let w = UserBaseWord(w);
        if w.selects_ac_blocks() {
            self.select_ac_blocks(w.current_block(), w.previous_block());
        }
        if w.loads_user_base() {
            self.regs.set_user_base(w.page());
            self.invalidate_all();
        }
    }

    pub fn read_user_base(&self) -> Unsigned36Bit {
        UserBaseWord::compose(self.acs.current(), self.acs.previous(), self.regs.user_base()).0
    }

    pub fn write_its_dbr(&mut self, dbr: Dbr, w: Unsigned36Bit) {
        self.regs.set_its_dbr(dbr, w);
        self.invalidate_all();
    }

    pub fn write_spt_base(&mut self, w: Unsigned36Bit) {
        self.regs.set_spt_base(w);
        self.invalidate_all();
    }

    pub fn write_cst_base(&mut self, w: Unsigned36Bit) {
        self.regs.set_cst_base(w);
        self.invalidate_all();
    }

    pub fn write_cst_mask(&mut self, w: Unsigned36Bit) {
        self.regs.set_cst_mask(w);
    }

    pub fn write_process_use(&mut self, w: Unsigned36Bit) {
        self.regs.set_process_use(w);
    }

    pub fn sweep_cache(&mut self, kind: SweepKind, scope: SweepScope) {
        diagops::sweep(kind, scope, &mut self.conditions);
    }

    /// SBDIAG.  Only the KL10 has an SBUS; elsewhere nothing answers.
    pub fn sbus_diagnostic(&self, request: Unsigned36Bit) -> Unsigned36Bit {
        if self.config.generation == Generation::Tops20Kl {
            diagops::sbus_diagnostic(request)
        } else {
            event!(
                Level::WARN,
                "SBDIAG {:012o} on {}, which has no SBUS",
                request,
                self.config.generation
            );
            Unsigned36Bit::ZERO
        }
    }

    pub fn conditions(&self) -> &ProcessorConditions {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut ProcessorConditions {
        &mut self.conditions
    }

    /// The most recent failure, whether or not it trapped.
    pub fn last_fault(&self) -> Option<&FaultDescriptor> {
        self.faults.last_fault()
    }

    pub fn cache_entry(&self, map: Map, page: VirtualPage) -> TranslationEntry {
        self.caches.get(map).entry(page)
    }

    pub fn status(&self) -> PagerStatus {
        PagerStatus {
            generation: self.config.generation.to_string(),
            extended_addressing: self.config.extended_addressing,
            pager_enabled: self.regs.pager_enabled(),
            exec_base: u64::from(self.regs.exec_base()),
            user_base: self.regs.user_base().bits(),
            current_ac_block: self.acs.current(),
            previous_ac_block: self.acs.previous(),
            valid_exec_entries: self.caches.get(Map::Exec).valid_entries(),
            valid_user_entries: self.caches.get(Map::User).valid_entries(),
            address_break: self
                .address_break
                .as_ref()
                .map(|brk| format!("{} on {}", brk.address(), brk.conditions())),
            conditions: self.conditions,
            last_fault: self.faults.last_fault().cloned(),
        }
    }
}
