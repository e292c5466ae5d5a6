//! The interface between the paging unit and the execution loop.
//!
//! The pager needs to know a little about what the processor was
//! doing when a reference failed: which partially-completed operation
//! (if any) must be undone before a trap, whether an interrupt is
//! being delivered, and the PC and flags to save.  The execution loop
//! provides this by implementing [`ExecutionContext`].
use base::prelude::*;

/// A partially-completed higher-level operation which must be undone
/// before a page-fail trap is taken, so that the machine looks as if
/// the faulting reference had never been attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingOperation {
    /// Fetching an indirect operand address.
    IndirectFetch,
    /// Executing the body of a trap instruction.
    TrapInstruction,
    /// Delivering an interrupt.
    InterruptDelivery,
    /// Single-stepping an instruction which has side effects (KL10
    /// only).
    SingleStep,
}

pub trait ExecutionContext {
    /// The partially-completed operation in progress, if any.
    fn pending_operation(&self) -> Option<PendingOperation>;
    /// Undo the effects of `op`.
    fn undo(&mut self, op: PendingOperation);
    fn in_interrupt_delivery(&self) -> bool;
    fn pc(&self) -> VirtualAddress;
    fn flags(&self) -> PcFlags;
    fn set_pc_and_flags(&mut self, pc: VirtualAddress, flags: PcFlags);
    /// True while the processor is inside a micro-sequence which
    /// cannot be interrupted.
    fn in_uninterruptible_sequence(&self) -> bool {
        false
    }
}

/// An execution context with no instruction loop behind it.  It
/// records the undo requests and PC changes it receives.  Front ends
/// which only want to exercise the pager use this.
#[derive(Debug, Clone, Default)]
pub struct StandaloneContext {
    pub pc: VirtualAddress,
    pub flags: PcFlags,
    pub pending: Option<PendingOperation>,
    pub delivering_interrupt: bool,
    pub uninterruptible: bool,
    pub undone: Vec<PendingOperation>,
}

impl StandaloneContext {
    pub fn new(pc: VirtualAddress, flags: PcFlags) -> StandaloneContext {
        StandaloneContext {
            pc,
            flags,
            ..StandaloneContext::default()
        }
    }
}

impl ExecutionContext for StandaloneContext {
    fn pending_operation(&self) -> Option<PendingOperation> {
        self.pending
    }

    fn undo(&mut self, op: PendingOperation) {
        self.undone.push(op);
        self.pending = None;
    }

    fn in_interrupt_delivery(&self) -> bool {
        self.delivering_interrupt
    }

    fn pc(&self) -> VirtualAddress {
        self.pc
    }

    fn flags(&self) -> PcFlags {
        self.flags
    }

    fn set_pc_and_flags(&mut self, pc: VirtualAddress, flags: PcFlags) {
        self.pc = pc;
        self.flags = flags;
    }

    fn in_uninterruptible_sequence(&self) -> bool {
        self.uninterruptible
    }
}
