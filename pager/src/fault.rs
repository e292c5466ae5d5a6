//! Page failures, their fault words, and the unwind signal which
//! abandons the current instruction.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

use crate::config::FaultWordFormat;
use crate::diagnostics::ReferenceDiagnostics;
use crate::types::{AccessKind, Map, Mode};

/// Describes why a translation failed.
///
/// The hardware exposes only a few bits of this to the faulting
/// program; the rest is for logging.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum FaultKind {
    /// The page is not accessible at all.
    AccessDenied,
    /// A write to a page which is accessible but not writable.
    WriteProtected,
    /// An executive-context (public) reference to a private page.
    Proprietary,
    /// A table, or the final page, lies beyond configured memory.
    NonExistentMemory,
    /// A section number which cannot be mapped.
    IllegalSection,
    /// A pointer names a page which is not in core.
    NotInCore,
    /// An undefined pointer type, or an indirect chain which never
    /// ends.
    IllegalPointer,
    /// The core status table says the page has been aged out.
    Aged,
    /// The reference matched the armed address break.
    AddressBreak,
}

impl FaultKind {
    pub const fn all_fault_kinds() -> [FaultKind; 9] {
        [
            FaultKind::AccessDenied,
            FaultKind::WriteProtected,
            FaultKind::Proprietary,
            FaultKind::NonExistentMemory,
            FaultKind::IllegalSection,
            FaultKind::NotInCore,
            FaultKind::IllegalPointer,
            FaultKind::Aged,
            FaultKind::AddressBreak,
        ]
    }

    /// The KL10 hard failure code (bits 1-5 of the fault word), if
    /// this kind has one.
    fn kl_hard_code(&self) -> Option<u64> {
        match self {
            FaultKind::Proprietary => Some(0o21),
            FaultKind::AddressBreak => Some(0o23),
            FaultKind::IllegalSection => Some(0o24),
            FaultKind::NonExistentMemory => Some(0o36),
            _ => None,
        }
    }

    fn ks_is_hard(&self) -> bool {
        matches!(self, FaultKind::NonExistentMemory)
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            FaultKind::AccessDenied => "access-denied",
            FaultKind::WriteProtected => "write-protected",
            FaultKind::Proprietary => "proprietary",
            FaultKind::NonExistentMemory => "non-existent-memory",
            FaultKind::IllegalSection => "illegal-section",
            FaultKind::NotInCore => "not-in-core",
            FaultKind::IllegalPointer => "illegal-pointer",
            FaultKind::Aged => "aged",
            FaultKind::AddressBreak => "address-break",
        })
    }
}

#[derive(Debug)]
pub struct UnknownFaultKind(String);

impl Display for UnknownFaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown fault kind '{}'", self.0)
    }
}

impl Error for UnknownFaultKind {}

impl TryFrom<&str> for FaultKind {
    type Error = UnknownFaultKind;
    fn try_from(s: &str) -> Result<FaultKind, UnknownFaultKind> {
        FaultKind::all_fault_kinds()
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| UnknownFaultKind(s.to_owned()))
    }
}

/// The rights accumulated by a page-table walk.  On failure, these
/// are the rights found before the walk stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rights {
    pub accessible: bool,
    pub writable: bool,
    pub public: bool,
    pub cacheable: bool,
}

impl Rights {
    pub const ALL: Rights = Rights {
        accessible: true,
        writable: true,
        public: true,
        cacheable: true,
    };

    pub fn read_only(self) -> Rights {
        Rights {
            writable: false,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailingAddress {
    Virtual(VirtualAddress),
    Physical(PhysicalAddress),
}

impl FailingAddress {
    fn bits(&self) -> u64 {
        match self {
            FailingAddress::Virtual(va) => u64::from(va.bits()),
            FailingAddress::Physical(pa) => u64::from(pa.bits()),
        }
    }
}

impl Display for FailingAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            FailingAddress::Virtual(va) => write!(f, "virtual address {va}"),
            FailingAddress::Physical(pa) => write!(f, "physical address {pa}"),
        }
    }
}

/// Everything known about one page failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultDescriptor {
    pub address: FailingAddress,
    pub mode: Mode,
    pub access: AccessKind,
    pub map: Map,
    pub kind: FaultKind,
    pub rights: Rights,
    pub cause: String,
}

impl Display for FaultDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{} failure on {} {} of {} via the {} map: {}",
            self.kind, self.mode, self.access, self.address, self.map, self.cause
        )
    }
}

impl FaultDescriptor {
    const USER: u64 = bit(0);
    const HARD: u64 = bit(1);
    const ACCESSIBLE: u64 = bit(2);
    const WRITABLE: u64 = bit(3);
    const WRITE_REFERENCE: u64 = bit(5);
    const PUBLIC: u64 = bit(6);
    const CACHEABLE: u64 = bit(7);
    const PAGED: u64 = bit(8);

    /// Build the page-fail word which is stored in the process table.
    ///
    /// KS10 format: bit 0 user, bit 1 hard, bit 2 A, bit 3 W, bit 5
    /// write reference, bit 8 paged, bits 14-35 address.  A hard
    /// failure carries code 36 in bits 0-5.
    ///
    /// KL10 format: bit 0 user, bit 2 A, bit 3 W, bit 5 write
    /// reference, bit 6 P, bit 7 C, bit 8 paged, bits 13-35 address.
    /// A hard failure carries its code in bits 1-5 instead of the
    /// A, W and write reference bits.
    ///
    /// Failures which have no hard code of their own are reported as
    /// soft failures with the rights as the walk found them.  This is
    /// a best guess; a program cannot always tell such failures
    /// apart.
    pub fn fault_word(&self, format: FaultWordFormat) -> Unsigned36Bit {
        let mut w = Unsigned36Bit::ZERO;
        if self.mode == Mode::User {
            w = w | Self::USER;
        }
        if self.map != Map::Physical {
            w = w | Self::PAGED;
        }
        let soft_bits = || {
            let mut bits = 0;
            if self.rights.accessible {
                bits |= Self::ACCESSIBLE;
            }
            if self.rights.writable {
                bits |= Self::WRITABLE;
            }
            if self.access.is_write() {
                bits |= Self::WRITE_REFERENCE;
            }
            bits
        };
        match format {
            FaultWordFormat::Ks => {
                let w = with_field(w, 14, 35, self.address.bits());
                if self.kind.ks_is_hard() {
                    with_field(w, 0, 5, 0o36)
                } else {
                    w | soft_bits()
                }
            }
            FaultWordFormat::Kl => {
                let mut w = with_field(w, 13, 35, self.address.bits());
                if self.rights.public {
                    w = w | Self::PUBLIC;
                }
                if self.rights.cacheable {
                    w = w | Self::CACHEABLE;
                }
                match self.kind.kl_hard_code() {
                    Some(code) => with_field(w, 1, 5, code),
                    None => w | soft_bits(),
                }
            }
        }
    }

    /// The result word of a MAP probe which failed: the fault word,
    /// with the failure bit set.
    pub fn probe_failure_word(&self, format: FaultWordFormat) -> Unsigned36Bit {
        self.fault_word(format) | Self::HARD
    }
}

/// The result word of a successful MAP probe: the rights found, the
/// paged bit and the physical address.
pub fn probe_success_word(
    rights: Rights,
    paged: bool,
    addr: PhysicalAddress,
) -> Unsigned36Bit {
    let mut w = with_field(Unsigned36Bit::ZERO, 14, 35, u64::from(addr.bits()));
    for (present, mask) in [
        (rights.accessible, FaultDescriptor::ACCESSIBLE),
        (rights.writable, FaultDescriptor::WRITABLE),
        (rights.public, FaultDescriptor::PUBLIC),
        (rights.cacheable, FaultDescriptor::CACHEABLE),
        (paged, FaultDescriptor::PAGED),
    ] {
        if present {
            w = w | mask;
        }
    }
    w
}

/// Situations which the hardware could never have reached cleanly,
/// and which therefore stop the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A page failure while delivering an interrupt, on a generation
    /// which cannot report it.
    FaultDuringInterruptDelivery {
        fault: FaultDescriptor,
        diagnostics: ReferenceDiagnostics,
    },
    /// The same instruction kept hitting the address break.
    AddressBreakStorm {
        hits: u32,
        diagnostics: ReferenceDiagnostics,
    },
    /// The trap vector in the user process table could not be
    /// reached.
    TrapVectorUnreachable {
        address: PhysicalAddress,
        fault: FaultDescriptor,
    },
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Anomaly::FaultDuringInterruptDelivery { fault, diagnostics } => write!(
                f,
                "page failure during interrupt delivery ({fault}) at {diagnostics}"
            ),
            Anomaly::AddressBreakStorm { hits, diagnostics } => write!(
                f,
                "{hits} consecutive address breaks at {diagnostics}"
            ),
            Anomaly::TrapVectorUnreachable { address, fault } => write!(
                f,
                "page-fail trap vector at {address} is non-existent memory, while reporting {fault}"
            ),
        }
    }
}

impl Error for Anomaly {}

/// Abandons the current instruction.  The execution loop catches
/// this at its per-instruction boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwind {
    /// A page-fail trap was delivered; the new PC and flags have
    /// already been loaded.
    PageFail(FaultDescriptor),
    /// A page failure during interrupt delivery was recorded as a
    /// status condition; resume the interrupt sequence.
    ResumeInterrupt,
    /// Fatal stop.
    Halt(Anomaly),
}

impl Display for Unwind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Unwind::PageFail(fault) => write!(f, "page-fail trap: {fault}"),
            Unwind::ResumeInterrupt => {
                f.write_str("page failure during interrupt delivery; resuming interrupt")
            }
            Unwind::Halt(anomaly) => write!(f, "halted: {anomaly}"),
        }
    }
}

impl Error for Unwind {}

impl From<Anomaly> for Unwind {
    fn from(anomaly: Anomaly) -> Unwind {
        Unwind::Halt(anomaly)
    }
}
