//! Processor status conditions raised by the paging unit.
//!
//! These are the pager's contribution to the processor status word.
//! The execution loop reads them when deciding whether to request an
//! interrupt, and clears them when the program asks it to.
use serde::Serialize;
use tracing::{event, Level};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorConditions {
    /// A page-table walk or a reference touched non-existent memory.
    pub non_existent_memory: bool,
    /// A cache sweep has completed.
    pub sweep_done: bool,
    /// A page failure happened during interrupt delivery (KL10 "in-out
    /// page failure").
    pub page_fail_in_interrupt: bool,
    /// A reference matched the address break.
    pub address_break_hit: bool,
}

impl ProcessorConditions {
    pub fn any(&self) -> bool {
        self.non_existent_memory
            || self.sweep_done
            || self.page_fail_in_interrupt
            || self.address_break_hit
    }

    pub(crate) fn raise_non_existent_memory(&mut self) {
        if !self.non_existent_memory {
            event!(Level::INFO, "raising the non-existent memory condition");
        }
        self.non_existent_memory = true;
    }

    pub fn clear_non_existent_memory(&mut self) {
        self.non_existent_memory = false;
    }

    pub fn clear_sweep_done(&mut self) {
        self.sweep_done = false;
    }

    pub fn clear_page_fail_in_interrupt(&mut self) {
        self.page_fail_in_interrupt = false;
    }

    pub fn clear_address_break_hit(&mut self) {
        self.address_break_hit = false;
    }

    pub fn clear_all(&mut self) {
        *self = ProcessorConditions::default();
    }
}

#[test]
fn test_clear_conditions() {
    let mut c = ProcessorConditions::default();
    assert!(!c.any());
    c.raise_non_existent_memory();
    c.sweep_done = true;
    assert!(c.any());
    c.clear_non_existent_memory();
    assert!(!c.non_existent_memory);
    assert!(c.sweep_done);
    c.clear_all();
    assert!(!c.any());
}
