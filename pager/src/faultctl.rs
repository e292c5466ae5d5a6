//! Decides what happens to a page failure.
//!
//! A failure found while probing (or by any other caller which asked
//! for traps to be suppressed) is simply recorded.  Otherwise the
//! fault controller delivers a page-fail trap: it undoes any
//! partially-completed operation, stores the fault word and the old
//! PC in the user process table, loads the new PC from it, and
//! unwinds to the execution loop.
use tracing::{event, Level};

use base::prelude::*;

use crate::conditions::ProcessorConditions;
use crate::config::{Generation, PagerConfig};
use crate::context::{ExecutionContext, PendingOperation};
use crate::diagnostics::ReferenceDiagnostics;
use crate::fault::{Anomaly, FaultDescriptor, Unwind};
use crate::store::PhysicalStore;
use crate::vectors::{
    NEW_PC_WORD, NEW_PC_WORD_EXTENDED, OLD_FLAGS_WORD_EXTENDED, OLD_PC_WORD,
    OLD_PC_WORD_EXTENDED, PAGE_FAIL_WORD,
};

/// What a trap needs to reach besides the fault itself.
pub(crate) struct TrapPath<'a> {
    pub ctx: &'a mut dyn ExecutionContext,
    pub mem: &'a mut dyn PhysicalStore,
    pub upt: PhysicalAddress,
    pub conditions: &'a mut ProcessorConditions,
}

#[derive(Debug)]
pub struct FaultController {
    generation: Generation,
    two_word_pc: bool,
    last: Option<FaultDescriptor>,
}

impl FaultController {
    pub fn new(config: &PagerConfig) -> FaultController {
        FaultController {
            generation: config.generation,
            two_word_pc: config.two_word_pc(),
            last: None,
        }
    }

    /// The most recent failure, whether or not it trapped.
    pub fn last_fault(&self) -> Option<&FaultDescriptor> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Handle a failure.  When `trap_allowed` is false the failure is
    /// only recorded and `Ok` is returned; the caller reports a soft
    /// failure.  Otherwise a trap is delivered and the unwind is
    /// returned as the error.
    pub(crate) fn declare(
        &mut self,
        fault: FaultDescriptor,
        trap_allowed: bool,
        path: TrapPath<'_>,
    ) -> Result<(), Unwind> {
        if trap_allowed {
            Err(self.trap(fault, path))
        } else {
            self.suppress(fault);
            Ok(())
        }
    }

    /// Record a failure without trapping.
    pub(crate) fn suppress(&mut self, fault: FaultDescriptor) {
        event!(Level::DEBUG, "suppressed trap for {}", fault);
        self.last = Some(fault);
    }

    fn undo_pending(&self, ctx: &mut dyn ExecutionContext) {
        match ctx.pending_operation() {
            Some(PendingOperation::SingleStep) if !self.generation.undoes_single_step() => (),
            Some(op) => {
                event!(Level::DEBUG, "undoing {:?} before page-fail trap", op);
                ctx.undo(op);
            }
            None => (),
        }
    }

    /// Deliver a page-fail trap for `fault`.
    pub(crate) fn trap(&mut self, fault: FaultDescriptor, path: TrapPath<'_>) -> Unwind {
        self.last = Some(fault.clone());
        let TrapPath {
            ctx,
            mem,
            upt,
            conditions,
        } = path;

        // Delivering an interrupt is itself a pending operation, so
        // whether we were doing so has to be known before undoing.
        let in_interrupt = ctx.in_interrupt_delivery();
        self.undo_pending(ctx);

        if in_interrupt {
            if self.generation.fault_in_interrupt_is_fatal() {
                let diagnostics =
                    ReferenceDiagnostics::capture(&*ctx, fault.mode, fault.address, fault.access);
                event!(
                    Level::ERROR,
                    "page failure during interrupt delivery: {}",
                    fault
                );
                return Unwind::Halt(Anomaly::FaultDuringInterruptDelivery { fault, diagnostics });
            }
            event!(
                Level::WARN,
                "page failure during interrupt delivery, resuming interrupt: {}",
                fault
            );
            conditions.page_fail_in_interrupt = true;
            return Unwind::ResumeInterrupt;
        }

        match self.deliver(&fault, ctx, mem, upt) {
            Ok(()) => {
                event!(Level::INFO, "page-fail trap: {}", fault);
                Unwind::PageFail(fault)
            }
            Err(address) => {
                event!(
                    Level::ERROR,
                    "trap vector at {} is non-existent memory",
                    address
                );
                conditions.raise_non_existent_memory();
                Unwind::Halt(Anomaly::TrapVectorUnreachable { address, fault })
            }
        }
    }

    /// Store the fault word and old PC and load the new PC.  Fails
    /// with the first trap vector address which does not exist.
    fn deliver(
        &self,
        fault: &FaultDescriptor,
        ctx: &mut dyn ExecutionContext,
        mem: &mut dyn PhysicalStore,
        upt: PhysicalAddress,
    ) -> Result<(), PhysicalAddress> {
        let word = fault.fault_word(self.generation.fault_word_format());
        store(mem, upt, PAGE_FAIL_WORD, word)?;

        let (pc, flags) = (ctx.pc(), ctx.flags());
        if self.two_word_pc {
            store(mem, upt, OLD_FLAGS_WORD_EXTENDED, flags.flags_word())?;
            store(mem, upt, OLD_PC_WORD_EXTENDED, Unsigned36Bit::from(pc))?;
            let new_pc = load(&*mem, upt, NEW_PC_WORD_EXTENDED)?;
            // Thirty bits always make a virtual address.
            let new_pc = VirtualAddress::try_from(field(new_pc, 6, 35)).unwrap_or(VirtualAddress::MAX);
            ctx.set_pc_and_flags(new_pc, PcFlags::empty());
        } else {
            store(mem, upt, OLD_PC_WORD, flags.pc_word(pc.in_section()))?;
            let new_pc = load(&*mem, upt, NEW_PC_WORD)?;
            let (new_flags, new_pc) = split_halves(new_pc);
            ctx.set_pc_and_flags(
                VirtualAddress::local(new_pc),
                PcFlags::from_halfword(new_flags),
            );
        }
        Ok(())
    }
}

fn vector_address(upt: PhysicalAddress, offset: u32) -> Result<PhysicalAddress, PhysicalAddress> {
    upt.checked_add(offset).ok_or(PhysicalAddress::MAX)
}

fn store(
    mem: &mut dyn PhysicalStore,
    upt: PhysicalAddress,
    offset: u32,
    value: Unsigned36Bit,
) -> Result<(), PhysicalAddress> {
    let addr = vector_address(upt, offset)?;
    event!(Level::TRACE, "trap vector: {} <- {:012o}", addr, value);
    mem.write(addr, value).map_err(|_| addr)
}

fn load(mem: &dyn PhysicalStore, upt: PhysicalAddress, offset: u32) -> Result<Unsigned36Bit, PhysicalAddress> {
    let addr = vector_address(upt, offset)?;
    mem.read(addr).map_err(|_| addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StandaloneContext;
    use crate::fault::{FailingAddress, FaultKind, Rights};
    use crate::store::CoreMemory;
    use crate::types::{AccessKind, Map, Mode};

    const UPT: u32 = 0o1000;

    fn pa(n: u32) -> PhysicalAddress {
        PhysicalAddress::try_from(n).unwrap()
    }

    fn w(n: u64) -> Unsigned36Bit {
        Unsigned36Bit::try_from(n).unwrap()
    }

    fn fault() -> FaultDescriptor {
        FaultDescriptor {
            address: FailingAddress::Virtual(VirtualAddress::try_from(0o1234_u64).unwrap()),
            mode: Mode::User,
            access: AccessKind::Read,
            map: Map::User,
            kind: FaultKind::AccessDenied,
            rights: Rights::default(),
            cause: "test".to_string(),
        }
    }

    fn user_context() -> StandaloneContext {
        StandaloneContext::new(
            VirtualAddress::try_from(0o400_u64).unwrap(),
            PcFlags::empty().with(PcFlags::USER),
        )
    }

    fn declare(
        fc: &mut FaultController,
        ctx: &mut StandaloneContext,
        mem: &mut CoreMemory,
        conditions: &mut ProcessorConditions,
    ) -> Result<(), Unwind> {
        fc.declare(
            fault(),
            true,
            TrapPath {
                ctx,
                mem,
                upt: pa(UPT),
                conditions,
            },
        )
    }

    #[test]
    fn test_suppressed_failure_is_only_recorded() {
        let mut fc = FaultController::new(&PagerConfig::new(Generation::Tops10Ks, 0o4000));
        let mut ctx = user_context();
        let mut mem = CoreMemory::new(0o4000);
        let mut conditions = ProcessorConditions::default();
        let result = fc.declare(
            fault(),
            false,
            TrapPath {
                ctx: &mut ctx,
                mem: &mut mem,
                upt: pa(UPT),
                conditions: &mut conditions,
            },
        );
        assert!(result.is_ok());
        assert_eq!(fc.last_fault(), Some(&fault()));
        assert_eq!(mem.read(pa(UPT + 0o500)), Ok(Unsigned36Bit::ZERO));
        assert_eq!(ctx.pc, VirtualAddress::try_from(0o400_u64).unwrap());
    }

    #[test]
    fn test_one_word_trap() {
        let mut fc = FaultController::new(&PagerConfig::new(Generation::Tops10Ks, 0o4000));
        let mut ctx = user_context();
        ctx.pending = Some(PendingOperation::IndirectFetch);
        let mut mem = CoreMemory::new(0o4000);
        // New PC 2000 with no flags.
        mem.write(pa(UPT + 0o502), w(0o002_000)).unwrap();
        let mut conditions = ProcessorConditions::default();
        match declare(&mut fc, &mut ctx, &mut mem, &mut conditions) {
            Err(Unwind::PageFail(f)) => assert_eq!(f, fault()),
            other => panic!("expected a page-fail trap, got {other:?}"),
        }
        assert_eq!(ctx.undone, vec![PendingOperation::IndirectFetch]);
        // User, paged, address 1234.
        assert_eq!(mem.read(pa(UPT + 0o500)), Ok(w(0o401_000_001_234)));
        assert_eq!(mem.read(pa(UPT + 0o501)), Ok(w(0o010_000_000_400)));
        assert_eq!(ctx.pc, VirtualAddress::try_from(0o2000_u64).unwrap());
        assert_eq!(ctx.flags, PcFlags::empty());
    }

    #[test]
    fn test_two_word_trap() {
        let mut config = PagerConfig::new(Generation::Tops20Kl, 0o4000);
        config.extended_addressing = true;
        let mut fc = FaultController::new(&config);
        let mut ctx = user_context();
        ctx.pc = VirtualAddress::try_from(0o3_000_400_u64).unwrap();
        let mut mem = CoreMemory::new(0o4000);
        mem.write(pa(UPT + 0o503), w(0o2_001_000)).unwrap();
        let mut conditions = ProcessorConditions::default();
        assert!(matches!(
            declare(&mut fc, &mut ctx, &mut mem, &mut conditions),
            Err(Unwind::PageFail(_))
        ));
        assert_eq!(mem.read(pa(UPT + 0o501)), Ok(w(0o010_000_000_000)));
        assert_eq!(mem.read(pa(UPT + 0o502)), Ok(w(0o3_000_400)));
        assert_eq!(ctx.pc, VirtualAddress::try_from(0o2_001_000_u64).unwrap());
        assert_eq!(ctx.flags, PcFlags::empty());
    }

    #[test]
    fn test_single_step_undone_only_on_kl() {
        for (generation, undone) in [
            (Generation::Tops10Ks, false),
            (Generation::Tops20Kl, true),
        ] {
            let mut fc = FaultController::new(&PagerConfig::new(generation, 0o4000));
            let mut ctx = user_context();
            ctx.pending = Some(PendingOperation::SingleStep);
            let mut mem = CoreMemory::new(0o4000);
            let mut conditions = ProcessorConditions::default();
            let _ = declare(&mut fc, &mut ctx, &mut mem, &mut conditions);
            assert_eq!(!ctx.undone.is_empty(), undone, "{generation}");
        }
    }

    #[test]
    fn test_fault_during_interrupt_delivery() {
        let mut mem = CoreMemory::new(0o4000);

        let mut fc = FaultController::new(&PagerConfig::new(Generation::ItsKs, 0o4000));
        let mut ctx = user_context();
        ctx.delivering_interrupt = true;
        ctx.pending = Some(PendingOperation::InterruptDelivery);
        let mut conditions = ProcessorConditions::default();
        assert!(matches!(
            declare(&mut fc, &mut ctx, &mut mem, &mut conditions),
            Err(Unwind::Halt(Anomaly::FaultDuringInterruptDelivery { .. }))
        ));
        assert_eq!(ctx.undone, vec![PendingOperation::InterruptDelivery]);

        let mut fc = FaultController::new(&PagerConfig::new(Generation::Tops20Kl, 0o4000));
        let mut ctx = user_context();
        ctx.delivering_interrupt = true;
        let mut conditions = ProcessorConditions::default();
        assert!(matches!(
            declare(&mut fc, &mut ctx, &mut mem, &mut conditions),
            Err(Unwind::ResumeInterrupt)
        ));
        assert!(conditions.page_fail_in_interrupt);
        // No page-fail word was stored.
        assert_eq!(mem.read(pa(UPT + 0o500)), Ok(Unsigned36Bit::ZERO));
    }

    #[test]
    fn test_unreachable_trap_vector() {
        let mut fc = FaultController::new(&PagerConfig::new(Generation::Tops10Ks, 0o1000));
        let mut ctx = user_context();
        let mut mem = CoreMemory::new(0o1000);
        let mut conditions = ProcessorConditions::default();
        match declare(&mut fc, &mut ctx, &mut mem, &mut conditions) {
            Err(Unwind::Halt(Anomaly::TrapVectorUnreachable { address, .. })) => {
                assert_eq!(address, pa(UPT + 0o500));
            }
            other => panic!("expected a halt, got {other:?}"),
        }
        assert!(conditions.non_existent_memory);
    }
}
