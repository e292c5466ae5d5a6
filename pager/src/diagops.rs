//! Diagnostic operations: memory cache sweeps and the SBUS diagnostic
//! function.
//!
//! There is no memory cache to sweep, so sweeps complete as soon as
//! they are started.  Operating systems wait for the sweep-done
//! condition, so it is still raised.
//!
//! Monitors size memory with SBDIAG.  We answer as if a single MF20
//! controller, configured with every block present at the largest
//! size, sat at controller number 10.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use crate::conditions::ProcessorConditions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Invalidate,
    Validate,
    Unload,
    UnloadAndInvalidate,
}

impl Display for SweepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SweepKind::Invalidate => "invalidate",
            SweepKind::Validate => "validate",
            SweepKind::Unload => "unload",
            SweepKind::UnloadAndInvalidate => "unload-and-invalidate",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepScope {
    All,
    Page(PhysicalPage),
}

impl Display for SweepScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SweepScope::All => f.write_str("all pages"),
            SweepScope::Page(page) => write!(f, "page {page}"),
        }
    }
}

pub(crate) fn sweep(kind: SweepKind, scope: SweepScope, conditions: &mut ProcessorConditions) {
    event!(Level::DEBUG, "cache sweep ({}) of {} complete", kind, scope);
    conditions.sweep_done = true;
}

/// The controller number which answers SBDIAG.
pub const MEMORY_CONTROLLER: u64 = 0o10;

const MF20_TYPE: u64 = 5;
const ALL_BLOCKS_PRESENT: u64 = 0o17;
const LARGEST_SIZE: u64 = 0o17;

/// Answer an SBDIAG request.  The request carries the controller
/// number in bits 0-4 and the function in bits 31-35.
pub(crate) fn sbus_diagnostic(request: Unsigned36Bit) -> Unsigned36Bit {
    let controller = field(request, 0, 4);
    let function = field(request, 31, 35);
    let response = if controller != MEMORY_CONTROLLER {
        Unsigned36Bit::ZERO
    } else {
        match function {
            // Status: controller type, no errors.
            0 => with_field(Unsigned36Bit::ZERO, 11, 13, MF20_TYPE),
            // Configuration.
            1 => with_field(
                with_field(Unsigned36Bit::ZERO, 4, 7, ALL_BLOCKS_PRESENT),
                8,
                11,
                LARGEST_SIZE,
            ),
            _ => Unsigned36Bit::ZERO,
        }
    };
    event!(
        Level::DEBUG,
        "SBDIAG controller {:o} function {:o} -> {:012o}",
        controller,
        function,
        response
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(controller: u64, function: u64) -> Unsigned36Bit {
        with_field(
            with_field(Unsigned36Bit::ZERO, 0, 4, controller),
            31,
            35,
            function,
        )
    }

    #[test]
    fn test_sweep_sets_done() {
        let mut conditions = ProcessorConditions::default();
        sweep(SweepKind::Validate, SweepScope::All, &mut conditions);
        assert!(conditions.sweep_done);
    }

    #[test]
    fn test_sbdiag_memory_controller() {
        assert_eq!(sbus_diagnostic(request(0o10, 0)), 0o000_120_000_000_u64);
        assert_eq!(sbus_diagnostic(request(0o10, 1)), 0o036_000_000_000_u64 | 0o001_700_000_000);
        assert_eq!(sbus_diagnostic(request(0o10, 2)), 0_u64);
    }

    #[test]
    fn test_sbdiag_no_other_controllers() {
        assert_eq!(sbus_diagnostic(request(0o11, 0)), 0_u64);
        assert_eq!(sbus_diagnostic(request(0, 1)), 0_u64);
    }
}
