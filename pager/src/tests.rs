//! Scenario tests for the paging unit as a whole.
use std::cell::RefCell;
use std::rc::Rc;

use test_strategy::proptest;

use base::prelude::*;

use super::*;

const MEMORY_WORDS: usize = 0o40_000;
const EPT_PAGE: u32 = 2;
const UPT_PAGE: u32 = 3;
const SPT: u32 = 0o4000;
const CST: u32 = 0o5000;
const MAP_PAGE: u32 = 6;
const SECOND_MAP_PAGE: u32 = 7;
const TRAP_PC: u64 = 0o1000;

fn w(n: u64) -> Unsigned36Bit {
    Unsigned36Bit::try_from(n).expect("valid test data")
}

fn va(n: u64) -> VirtualAddress {
    VirtualAddress::try_from(n).expect("valid test data")
}

fn pa(n: u32) -> PhysicalAddress {
    PhysicalAddress::try_from(n).expect("valid test data")
}

fn page(n: u32) -> PhysicalPage {
    PhysicalPage::try_from(n).expect("valid test data")
}

fn upt(offset: u32) -> PhysicalAddress {
    pa((UPT_PAGE << 9) + offset)
}

struct Machine {
    unit: PagingUnit,
    mem: CoreMemory,
    ctx: StandaloneContext,
}

impl Machine {
    fn translate(&mut self, mode: Mode, addr: u64, access: AccessKind) -> Result<PhysicalAddress, Unwind> {
        self.unit
            .translate(&mut self.ctx, &mut self.mem, mode, va(addr), access)
    }

    fn user_read(&mut self, addr: u64) -> Result<PhysicalAddress, Unwind> {
        self.translate(Mode::User, addr, AccessKind::Read)
    }

    fn user_write(&mut self, addr: u64) -> Result<PhysicalAddress, Unwind> {
        self.translate(Mode::User, addr, AccessKind::Write)
    }

    fn probe(&mut self, mode: Mode, addr: u64) -> Unsigned36Bit {
        self.unit.probe(&self.ctx, &mut self.mem, mode, va(addr))
    }

    fn user_entry(&self, addr: u64) -> TranslationEntry {
        self.unit.cache_entry(Map::User, va(addr).page())
    }

    fn poke(&mut self, addr: PhysicalAddress, value: u64) {
        self.mem.write(addr, w(value)).expect("test memory exists");
    }

    fn peek(&self, addr: PhysicalAddress) -> u64 {
        u64::from(self.mem.read(addr).expect("test memory exists"))
    }
}

fn user_context() -> StandaloneContext {
    StandaloneContext::new(va(0o100), PcFlags::empty().with(PcFlags::USER))
}

fn new_machine(generation: Generation) -> Machine {
    let mut unit =
        PagingUnit::new(PagerConfig::new(generation, MEMORY_WORDS)).expect("valid configuration");
    let mut mem = CoreMemory::new(MEMORY_WORDS);
    // New PC for page-fail traps.
    mem.write(upt(0o502), w(TRAP_PC)).expect("test memory exists");
    unit.write_exec_base(w(0o020_000 | u64::from(EPT_PAGE)));
    unit.write_user_base(UserBaseWord::compose(0, 0, page(UPT_PAGE)).0);
    Machine {
        unit,
        mem,
        ctx: user_context(),
    }
}

/// A TOPS-10 machine:
///
/// | User page | Maps to | Rights   |
/// | --------- | ------- | -------- |
/// | 0         | 10      | A W      |
/// | 1         | 11      | A        |
/// | 2         | 100     | A W      |
/// | 3         | -       | none     |
fn tops10_machine() -> Machine {
    let mut m = new_machine(Generation::Tops10Ks);
    m.poke(upt(0), 0o500_010_400_011);
    m.poke(upt(1), 0o500_100_000_000);
    m
}

/// A TOPS-20 machine with a core status table:
///
/// | User page | Pointer                                    | Maps to |
/// | --------- | ------------------------------------------ | ------- |
/// | 0         | immediate, W C                             | 10      |
/// | 1         | immediate, C                               | 11      |
/// | 2         | indirect (W C) to a shared pointer (P W C) | 12      |
fn tops20_machine() -> Machine {
    let mut m = new_machine(Generation::Tops20Kl);
    m.unit.write_spt_base(w(u64::from(SPT)));
    m.unit.write_cst_base(w(u64::from(CST)));
    m.unit.write_cst_mask(w(0o777_777_777_700));
    m.unit.write_process_use(w(0o40));
    for n in 0..(MEMORY_WORDS as u32 >> 9) {
        m.poke(pa(CST + n), 0o770_000_000_000);
    }
    let map = MAP_PAGE << 9;
    m.poke(upt(0o540), 0o164_000_000_000 | u64::from(MAP_PAGE));
    m.poke(pa(map), 0o124_000_000_010);
    m.poke(pa(map + 1), 0o104_000_000_011);
    m.poke(pa(map + 2), 0o324_005_000_001);
    m.poke(pa(SPT + 1), u64::from(SECOND_MAP_PAGE));
    m.poke(pa((SECOND_MAP_PAGE << 9) + 5), 0o264_000_000_002);
    m.poke(pa(SPT + 2), 0o12);
    m
}

fn expect_page_fail(result: Result<PhysicalAddress, Unwind>) -> FaultDescriptor {
    match result {
        Err(Unwind::PageFail(fault)) => fault,
        other => panic!("expected a page-fail trap, got {other:?}"),
    }
}

#[test]
fn test_second_reference_hits() {
    let mut m = tops10_machine();
    assert_eq!(m.user_read(0o123), Ok(pa(0o10_123)));
    assert!(m.user_entry(0o123).is_valid());
    // Change the page table behind the cache's back; the cached
    // translation is still used.
    m.poke(upt(0), 0o500_013_400_011);
    assert_eq!(m.user_read(0o123), Ok(pa(0o10_123)));
}

#[test]
fn test_no_stale_hits_after_invalidation() {
    let mut m = tops10_machine();
    assert_eq!(m.user_read(0o123), Ok(pa(0o10_123)));
    m.poke(upt(0), 0o500_013_400_011);
    m.unit.invalidate_all();
    assert!(!m.user_entry(0o123).is_valid());
    assert_eq!(m.user_read(0o123), Ok(pa(0o13_123)));

    // Loading the user base register invalidates too.
    m.poke(upt(0), 0o500_014_400_011);
    m.unit
        .write_user_base(UserBaseWord::compose(0, 0, page(UPT_PAGE)).0);
    assert_eq!(m.user_read(0o123), Ok(pa(0o14_123)));
}

#[test]
fn test_clear_page_is_idempotent() {
    let mut m = tops10_machine();
    m.user_read(0o100).expect("page 0 is mapped");
    m.user_read(0o1100).expect("page 1 is mapped");
    m.unit.clear_page(va(0o100));
    m.unit.clear_page(va(0o100));
    assert!(!m.user_entry(0o100).is_valid());
    assert!(m.user_entry(0o1100).is_valid());
    assert_eq!(m.unit.status().valid_user_entries, 1);
    m.unit.invalidate_all();
    m.unit.invalidate_all();
    assert_eq!(m.unit.status().valid_user_entries, 0);
}

#[test]
fn test_write_to_read_only_page_traps() {
    let mut m = tops10_machine();
    let fault = expect_page_fail(m.user_write(0o1100));
    assert_eq!(fault.kind, FaultKind::WriteProtected);
    // User, A, write reference, paged.
    assert_eq!(m.peek(upt(0o500)), 0o511_000_001_100);
    // Old PC: user flag, PC 100.
    assert_eq!(m.peek(upt(0o501)), 0o010_000_000_100);
    assert_eq!(m.ctx.pc, va(TRAP_PC));
    assert_eq!(m.ctx.flags, PcFlags::empty());
    // A read of the same page still works.
    assert_eq!(m.user_read(0o1100), Ok(pa(0o11_100)));
}

#[test]
fn test_non_existent_memory_is_not_an_access_failure() {
    let mut m = tops10_machine();
    let fault = expect_page_fail(m.user_read(0o3100));
    assert_eq!(fault.kind, FaultKind::AccessDenied);
    assert!(!m.unit.conditions().non_existent_memory);

    let fault = expect_page_fail(m.user_read(0o2000));
    assert_eq!(fault.kind, FaultKind::NonExistentMemory);
    assert_eq!(fault.address, FailingAddress::Physical(pa(0o100_000)));
    assert!(m.unit.conditions().non_existent_memory);
    // Hard failure code 36 with the physical address.
    assert_eq!(m.peek(upt(0o500)), 0o361_000_100_000);
    m.unit.conditions_mut().clear_non_existent_memory();
    assert!(!m.unit.conditions().any());
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Happening {
    Undo(PendingOperation),
    Store(PhysicalAddress),
}

struct RecordingContext {
    inner: StandaloneContext,
    log: Rc<RefCell<Vec<Happening>>>,
}

impl ExecutionContext for RecordingContext {
    fn pending_operation(&self) -> Option<PendingOperation> {
        self.inner.pending_operation()
    }

    fn undo(&mut self, op: PendingOperation) {
        self.log.borrow_mut().push(Happening::Undo(op));
        self.inner.undo(op);
    }

    fn in_interrupt_delivery(&self) -> bool {
        self.inner.in_interrupt_delivery()
    }

    fn pc(&self) -> VirtualAddress {
        self.inner.pc()
    }

    fn flags(&self) -> PcFlags {
        self.inner.flags()
    }

    fn set_pc_and_flags(&mut self, pc: VirtualAddress, flags: PcFlags) {
        self.inner.set_pc_and_flags(pc, flags);
    }
}

struct RecordingStore {
    inner: CoreMemory,
    log: Rc<RefCell<Vec<Happening>>>,
}

impl PhysicalStore for RecordingStore {
    fn read(&self, addr: PhysicalAddress) -> Result<Unsigned36Bit, MemoryOpFailure> {
        self.inner.read(addr)
    }

    fn write(&mut self, addr: PhysicalAddress, value: Unsigned36Bit) -> Result<(), MemoryOpFailure> {
        self.log.borrow_mut().push(Happening::Store(addr));
        self.inner.write(addr, value)
    }

    fn size_words(&self) -> usize {
        self.inner.size_words()
    }
}

#[test]
fn test_undo_runs_once_before_the_fault_word_is_stored() {
    let Machine { mut unit, mem, .. } = tops10_machine();
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut ctx = RecordingContext {
        inner: user_context(),
        log: Rc::clone(&log),
    };
    ctx.inner.pending = Some(PendingOperation::IndirectFetch);
    let mut mem = RecordingStore {
        inner: mem,
        log: Rc::clone(&log),
    };
    let result = unit.translate(&mut ctx, &mut mem, Mode::User, va(0o3100), AccessKind::Read);
    assert!(matches!(result, Err(Unwind::PageFail(_))));
    let log = log.borrow();
    assert_eq!(
        log.as_slice(),
        &[
            Happening::Undo(PendingOperation::IndirectFetch),
            Happening::Store(upt(0o500)),
            Happening::Store(upt(0o501)),
        ]
    );
}

#[test]
fn test_fault_during_interrupt_delivery() {
    let mut m = tops10_machine();
    m.ctx.delivering_interrupt = true;
    assert!(matches!(
        m.user_read(0o3100),
        Err(Unwind::Halt(Anomaly::FaultDuringInterruptDelivery { .. }))
    ));

    let mut m = tops20_machine();
    m.ctx.delivering_interrupt = true;
    assert!(matches!(
        m.user_read(0o3000),
        Err(Unwind::ResumeInterrupt)
    ));
    assert!(m.unit.conditions().page_fail_in_interrupt);
    assert_eq!(m.peek(upt(0o500)), 0);
    assert_eq!(m.ctx.pc, va(0o100));
}

#[test]
fn test_probe_never_traps() {
    let mut m = tops10_machine();
    // Page 3 has no access: user, failure, paged.
    assert_eq!(u64::from(m.probe(Mode::User, 0o3100)), 0o601_000_003_100);
    assert_eq!(m.peek(upt(0o500)), 0);
    assert_eq!(m.ctx.pc, va(0o100));
    assert_eq!(
        m.unit.last_fault().map(|f| f.kind),
        Some(FaultKind::AccessDenied)
    );
    // Page 0: A, W, paged, physical address.
    assert_eq!(u64::from(m.probe(Mode::User, 0o100)), 0o141_000_010_100);
}

#[test]
fn test_refill_without_trap() {
    let mut m = tops10_machine();
    let result = m.unit.refill(
        &mut m.ctx,
        &mut m.mem,
        Mode::User,
        va(0o3100),
        AccessKind::Read,
        false,
    );
    assert!(matches!(result, Ok(None)));
    assert_eq!(m.peek(upt(0o500)), 0);
    let result = m.unit.refill(
        &mut m.ctx,
        &mut m.mem,
        Mode::User,
        va(0o1100),
        AccessKind::Read,
        false,
    );
    assert!(matches!(result, Ok(Some(addr)) if addr == pa(0o11_100)));
}

#[test]
fn test_user_base_read_back() {
    let mut m = tops10_machine();
    let word = UserBaseWord::compose(3, 5, page(UPT_PAGE)).0;
    m.unit.write_user_base(word);
    assert_eq!(m.unit.read_user_base(), word);
    assert_eq!(m.unit.acs().current(), 3);
    assert_eq!(m.unit.acs().previous(), 5);
}

#[test]
fn test_selecting_ac_blocks_alone_keeps_translations() {
    let mut m = tops10_machine();
    m.user_read(0o100).expect("page 0 is mapped");
    // Select blocks 1 and 2 without loading the user base.
    m.unit.write_user_base(w(0o400_120_000_000));
    assert_eq!(m.unit.acs().current(), 1);
    assert_eq!(m.unit.acs().previous(), 2);
    assert!(m.user_entry(0o100).is_valid());
}

#[test]
fn test_ac_blocks_switch_with_paging_off() {
    let mut unit = PagingUnit::new(PagerConfig::new(Generation::ItsKs, MEMORY_WORDS))
        .expect("valid configuration");
    assert!(!unit.status().pager_enabled);
    unit.acs_mut().write(7, w(0o777));
    unit.write_user_base(w(0o400_120_000_000));
    assert_eq!(unit.acs().current(), 1);
    assert_eq!(unit.acs().read_previous(7), Unsigned36Bit::ZERO);
    unit.select_ac_blocks(0, 1);
    assert_eq!(unit.acs().read(7), w(0o777));
}

#[test]
fn test_unpaged_references() {
    let mut unit = PagingUnit::new(PagerConfig::new(Generation::Tops10Ks, MEMORY_WORDS))
        .expect("valid configuration");
    let mut mem = CoreMemory::new(MEMORY_WORDS);
    let mut ctx = user_context();
    assert_eq!(
        unit.translate(&mut ctx, &mut mem, Mode::User, va(0o1234), AccessKind::Write),
        Ok(pa(0o1234))
    );
    let result = unit.translate(&mut ctx, &mut mem, Mode::Exec, va(0o100_000), AccessKind::Read);
    match result {
        Err(Unwind::PageFail(fault)) => {
            assert_eq!(fault.kind, FaultKind::NonExistentMemory);
            assert_eq!(fault.map, Map::Physical);
        }
        other => panic!("expected a page-fail trap, got {other:?}"),
    }
    assert!(unit.conditions().non_existent_memory);
}

#[test]
fn test_its_translation() {
    let mut m = new_machine(Generation::ItsKs);
    m.unit.write_its_dbr(Dbr::UserLow, w(0o4000));
    // Page 0 -> 20 read/write, page 1 -> 21 read-only.
    m.poke(pa(0o4000), 0o600_020_200_021);
    assert_eq!(m.user_write(0o100), Ok(pa(0o20_100)));
    assert_eq!(m.user_read(0o1100), Ok(pa(0o21_100)));
    let fault = expect_page_fail(m.user_write(0o1100));
    assert_eq!(fault.kind, FaultKind::WriteProtected);
}

#[test]
fn test_indirect_to_shared_rights() {
    let mut m = tops20_machine();
    assert_eq!(m.user_read(0o2123), Ok(pa(0o12_123)));
    // A, W, C and paged but not P.
    assert_eq!(u64::from(m.probe(Mode::User, 0o2123)), 0o143_000_012_123);
}

#[test]
fn test_first_write_sets_modified() {
    let mut m = tops20_machine();
    assert_eq!(m.user_read(0o100), Ok(pa(0o10_100)));
    let entry = m.user_entry(0o100);
    assert!(entry.access().readable);
    assert!(!entry.access().writable);
    assert_eq!(m.peek(pa(CST + 0o10)), 0o770_000_000_040);

    assert_eq!(m.user_write(0o100), Ok(pa(0o10_100)));
    assert!(m.user_entry(0o100).access().writable);
    assert_eq!(m.peek(pa(CST + 0o10)), 0o770_000_000_041);
}

#[test]
fn test_write_to_read_only_page_leaves_cst_alone() {
    let mut m = tops20_machine();
    let fault = expect_page_fail(m.user_write(0o1100));
    assert_eq!(fault.kind, FaultKind::WriteProtected);
    assert_eq!(m.peek(pa(CST + 0o11)), 0o770_000_000_000);
    // User, A, write reference, C, paged.
    assert_eq!(m.peek(upt(0o500)), 0o513_000_001_100);
}

#[test]
fn test_aged_page() {
    let mut m = tops20_machine();
    m.poke(pa(CST + 0o10), 0);
    let fault = expect_page_fail(m.user_read(0o100));
    assert_eq!(fault.kind, FaultKind::Aged);
}

#[test]
fn test_proprietary_violation() {
    let mut m = tops20_machine();
    m.ctx.flags = m.ctx.flags.with(PcFlags::PUBLIC);
    let fault = expect_page_fail(m.translate(Mode::User, 0o100, AccessKind::Fetch));
    assert_eq!(fault.kind, FaultKind::Proprietary);
    // User, hard code 21, paged.
    assert_eq!(m.peek(upt(0o500)) >> 27, 0o613);
}

#[test]
fn test_illegal_section_without_extended_addressing() {
    let mut m = tops20_machine();
    let fault = expect_page_fail(m.user_read(0o1_000_100));
    assert_eq!(fault.kind, FaultKind::IllegalSection);
    // User, hard code 24, paged, virtual address 1,,100.
    assert_eq!(m.peek(upt(0o500)), 0o641_001_000_100);
}

#[test]
fn test_cst_mask_write_keeps_translations() {
    let mut m = tops20_machine();
    m.user_read(0o100).expect("page 0 is mapped");
    m.unit.write_cst_mask(Unsigned36Bit::MAX);
    m.unit.write_process_use(Unsigned36Bit::ZERO);
    assert!(m.user_entry(0o100).is_valid());
    m.unit.write_spt_base(w(u64::from(SPT)));
    assert!(!m.user_entry(0o100).is_valid());
}

#[test]
fn test_address_break() {
    let mut m = tops20_machine();
    m.user_read(0o100).expect("page 0 is mapped");
    // Break on fetch, read or write at 100.
    m.unit.arm_address_break(w(0o000_700_000_100));
    assert!(!m.user_entry(0o100).is_valid());

    let fault = expect_page_fail(m.user_read(0o123));
    assert_eq!(fault.kind, FaultKind::AddressBreak);
    assert!(m.unit.conditions().address_break_hit);

    // With address failure inhibit set, the reference completes but
    // the entry stays without access.
    m.ctx.pc = va(0o100);
    m.ctx.flags = m.ctx.flags.with(PcFlags::ADDRESS_FAILURE_INHIBIT);
    assert_eq!(m.user_read(0o123), Ok(pa(0o10_123)));
    assert!(!m.user_entry(0o100).is_valid());

    m.unit.disarm_address_break();
    assert!(m.user_entry(0o100).access().readable);
    m.ctx.flags = m.ctx.flags.without(PcFlags::ADDRESS_FAILURE_INHIBIT);
    assert_eq!(m.user_read(0o123), Ok(pa(0o10_123)));
}

#[test]
fn test_invalidation_clears_saved_break_bits() {
    let mut m = tops20_machine();
    m.user_read(0o100).expect("page 0 is mapped");
    m.unit.arm_address_break(w(0o000_100_000_100));
    m.unit.clear_page(va(0o100));
    m.unit.disarm_address_break();
    assert!(!m.user_entry(0o100).is_valid());
}

#[test]
fn test_address_break_storm_halts() {
    let mut m = tops20_machine();
    m.unit.arm_address_break(w(0o000_200_000_100));
    for _ in 0..BREAK_STORM_LIMIT {
        m.ctx.pc = va(0o200);
        expect_page_fail(m.user_read(0o100));
    }
    m.ctx.pc = va(0o200);
    assert!(matches!(
        m.user_read(0o100),
        Err(Unwind::Halt(Anomaly::AddressBreakStorm { .. }))
    ));
}

#[test]
fn test_storm_count_survives_other_references() {
    let mut m = tops20_machine();
    m.unit.arm_address_break(w(0o000_200_000_100));
    for _ in 0..BREAK_STORM_LIMIT {
        m.ctx.pc = va(0o200);
        expect_page_fail(m.user_read(0o100));
        m.ctx.pc = va(0o201);
        assert_eq!(m.user_read(0o1_000), Ok(pa(0o11_000)));
    }
    m.ctx.pc = va(0o200);
    assert!(matches!(
        m.user_read(0o100),
        Err(Unwind::Halt(Anomaly::AddressBreakStorm { hits, .. })) if hits == BREAK_STORM_LIMIT + 1
    ));
}

#[test]
fn test_break_on_cold_page_then_disarm() {
    let mut m = tops20_machine();
    // Read break at 100; nothing cached yet.
    m.unit.arm_address_break(w(0o000_200_000_100));
    let fault = expect_page_fail(m.user_read(0o123));
    assert_eq!(fault.kind, FaultKind::AddressBreak);
    assert!(!m.user_entry(0o123).is_valid());
    assert_eq!(m.user_entry(0o123).page(), page(0o10));

    m.unit.disarm_address_break();
    assert!(m.user_entry(0o123).is_valid());
    assert_eq!(m.user_entry(0o123).page(), page(0o10));
    assert_eq!(m.user_read(0o123), Ok(pa(0o10_123)));
}

#[test]
fn test_write_break_leaves_cst_alone() {
    let mut m = tops20_machine();
    // Write break at 100.
    m.unit.arm_address_break(w(0o000_100_000_100));
    let fault = expect_page_fail(m.user_write(0o100));
    assert_eq!(fault.kind, FaultKind::AddressBreak);
    assert_eq!(m.peek(pa(CST + 0o10)), 0o770_000_000_000);
    assert_eq!(m.peek(pa(CST + MAP_PAGE)), 0o770_000_000_000);

    // The write never happened, so the page is not yet writable in
    // the cache and the next write sets the modified bit.
    m.unit.disarm_address_break();
    assert!(m.user_entry(0o100).is_valid());
    assert!(!m.user_entry(0o100).access().writable);
    assert_eq!(m.user_write(0o100), Ok(pa(0o10_100)));
    assert_eq!(m.peek(pa(CST + 0o10)), 0o770_000_000_041);
    assert_eq!(m.peek(pa(CST + MAP_PAGE)), 0o770_000_000_040);
}

#[test]
fn test_address_break_ignored_on_ks() {
    let mut m = tops10_machine();
    m.unit.arm_address_break(w(0o000_700_000_100));
    assert!(m.unit.address_break().is_none());
    assert_eq!(m.user_read(0o100), Ok(pa(0o10_100)));
}

#[test]
fn test_sweep_and_sbdiag() {
    let mut m = tops20_machine();
    m.unit
        .sweep_cache(SweepKind::UnloadAndInvalidate, SweepScope::Page(page(0o10)));
    assert!(m.unit.conditions().sweep_done);
    assert_eq!(
        m.unit.sbus_diagnostic(w(MEMORY_CONTROLLER << 31)),
        0o000_120_000_000_u64
    );
    let ks = tops10_machine();
    assert_eq!(ks.unit.sbus_diagnostic(w(MEMORY_CONTROLLER << 31)), 0_u64);
}

#[test]
fn test_reset() {
    let mut m = tops20_machine();
    m.user_read(0o100).expect("page 0 is mapped");
    m.unit.select_ac_blocks(4, 5);
    m.unit.arm_address_break(w(0o000_700_000_100));
    m.unit.reset();
    let status = m.unit.status();
    assert!(!status.pager_enabled);
    assert_eq!(status.valid_user_entries, 0);
    assert_eq!(status.current_ac_block, 0);
    assert!(status.address_break.is_none());
    assert!(status.last_fault.is_none());
}

#[test]
fn test_bad_configurations() {
    let mut config = PagerConfig::new(Generation::Tops10Ks, MEMORY_WORDS);
    config.extended_addressing = true;
    assert!(matches!(
        PagingUnit::new(config),
        Err(ConfigError::ExtendedAddressingUnsupported(Generation::Tops10Ks))
    ));
    assert!(PagingUnit::new(PagerConfig::new(Generation::ItsKs, 0o1001)).is_err());
}

#[test]
fn test_extended_trap() {
    let mut config = PagerConfig::new(Generation::Tops20Kl, MEMORY_WORDS);
    config.extended_addressing = true;
    let mut unit = PagingUnit::new(config).expect("valid configuration");
    let mut mem = CoreMemory::new(MEMORY_WORDS);
    unit.write_exec_base(w(0o020_000 | u64::from(EPT_PAGE)));
    unit.write_user_base(UserBaseWord::compose(0, 0, page(UPT_PAGE)).0);
    mem.write(upt(0o503), w(0o2_003_000)).expect("test memory exists");
    let mut ctx = user_context();
    ctx.pc = va(0o1_000_200);
    // Section 1 has a zero section pointer.
    let result = unit.translate(&mut ctx, &mut mem, Mode::User, va(0o1_000_400), AccessKind::Read);
    assert!(matches!(&result, Err(Unwind::PageFail(f)) if f.kind == FaultKind::AccessDenied));
    assert_eq!(mem.read(upt(0o501)), Ok(w(0o010_000_000_000)));
    assert_eq!(mem.read(upt(0o502)), Ok(w(0o1_000_200)));
    assert_eq!(ctx.pc, va(0o2_003_000));
}

/// Arming and then disarming the address break leaves every cache
/// entry as it was, and a reference made while it was armed leaves the
/// unit translating as if it had never been armed.
#[proptest]
fn test_arm_disarm_round_trip(
    #[strategy(0u64..8)] conditions: u64,
    #[strategy(0u64..3)] watched_page: u64,
    touch_first: bool,
    user_only: bool,
    reference_between: bool,
) {
    let mut m = tops20_machine();
    let mut unarmed = tops20_machine();
    let addr = watched_page << 9;
    if touch_first {
        m.user_read(addr).expect("pages 0-2 are mapped");
        unarmed.user_read(addr).expect("pages 0-2 are mapped");
    }
    let before = m.user_entry(addr);
    let mut word = (conditions << 24) | addr;
    if user_only {
        word |= 1 << 23;
    }
    m.unit.arm_address_break(w(word));
    if reference_between {
        // Breaks or not, depending on the conditions.
        let _ = m.user_read(addr);
    }
    m.unit.disarm_address_break();
    if !reference_between {
        assert_eq!(m.user_entry(addr), before);
    }
    assert_eq!(m.user_read(addr), unarmed.user_read(addr));
    assert_eq!(m.user_entry(addr), unarmed.user_entry(addr));
}
