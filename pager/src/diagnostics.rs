/// Diagnostic information for log messages and fatal stops.
///
/// The real hardware had no accompanying message to go along with a
/// halt, but the emulator does.
use std::fmt::{Display, Formatter};

use base::prelude::*;

use crate::context::ExecutionContext;
use crate::fault::FailingAddress;
use crate::types::{AccessKind, Mode};

/// ReferenceDiagnostics is only for generating debug information.
/// It must not be used for control/execution purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDiagnostics {
    pub pc: VirtualAddress,
    pub flags: PcFlags,
    pub mode: Mode,
    pub address: FailingAddress,
    pub access: AccessKind,
}

impl ReferenceDiagnostics {
    pub fn capture(
        ctx: &dyn ExecutionContext,
        mode: Mode,
        address: FailingAddress,
        access: AccessKind,
    ) -> ReferenceDiagnostics {
        ReferenceDiagnostics {
            pc: ctx.pc(),
            flags: ctx.flags(),
            mode,
            address,
            access,
        }
    }
}

impl Display for ReferenceDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "PC {} (flags {:?}) during {} {} of {}",
            self.pc, self.flags, self.mode, self.access, self.address
        )
    }
}
