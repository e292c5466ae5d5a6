//! Virtual and physical addresses, and the pages containing them.
//!
//! A virtual address is 30 bits wide: a 12-bit section number
//! followed by an 18-bit in-section address.  Only sections 0 to 37
//! (octal) can ever be mapped, but larger section numbers are
//! representable so that the pager can report them as illegal.
//!
//! A physical address is 22 bits wide, and a physical page number is
//! the address with the 9-bit page offset removed.
use std::fmt::{self, Debug, Display, Formatter, Octal};

use serde::Serialize;

use crate::error::{ConversionFailed, Quantity};
use crate::word::{Unsigned18Bit, Unsigned36Bit};

/// Number of words in a page.
pub const PAGE_SIZE: u32 = 512;
/// Width of the in-page offset.
pub const PAGE_SHIFT: u32 = 9;
const OFFSET_MASK: u32 = PAGE_SIZE - 1;
/// Number of sections which can be mapped.
pub const SECTION_COUNT: u32 = 0o40;
/// Number of pages in one section.
pub const PAGES_PER_SECTION: u32 = 0o1000;

const VIRTUAL_ADDRESS_BITS: u32 = 30;
const PHYSICAL_ADDRESS_BITS: u32 = 22;
const PHYSICAL_PAGE_BITS: u32 = PHYSICAL_ADDRESS_BITS - PAGE_SHIFT;
const SECTION_BITS: u32 = 12;

const SECTION_TOO_WIDE: ConversionFailed = ConversionFailed::TooWide {
    quantity: Quantity::Section,
    bits: SECTION_BITS,
};

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    pub const MAX: VirtualAddress = VirtualAddress((1 << VIRTUAL_ADDRESS_BITS) - 1);

    pub fn new(section: u32, in_section: Unsigned18Bit) -> Result<VirtualAddress, ConversionFailed> {
        if section >= 1 << SECTION_BITS {
            Err(SECTION_TOO_WIDE)
        } else {
            Ok(VirtualAddress((section << 18) | u32::from(in_section)))
        }
    }

    /// An address in section 0.
    pub fn local(in_section: Unsigned18Bit) -> VirtualAddress {
        VirtualAddress(u32::from(in_section))
    }

    pub fn section(&self) -> u32 {
        self.0 >> 18
    }

    pub fn in_section(&self) -> Unsigned18Bit {
        Unsigned18Bit::ZERO.bitor(self.0 & 0o777_777)
    }

    pub fn page(&self) -> VirtualPage {
        VirtualPage(self.0 >> PAGE_SHIFT)
    }

    pub fn offset(&self) -> u32 {
        self.0 & OFFSET_MASK
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u64> for VirtualAddress {
    type Error = ConversionFailed;
    fn try_from(n: u64) -> Result<VirtualAddress, ConversionFailed> {
        match u32::try_from(n) {
            Ok(bits) if bits <= VirtualAddress::MAX.0 => Ok(VirtualAddress(bits)),
            _ => Err(ConversionFailed::TooWide {
                quantity: Quantity::VirtualAddress,
                bits: VIRTUAL_ADDRESS_BITS,
            }),
        }
    }
}

impl From<VirtualAddress> for Unsigned36Bit {
    fn from(va: VirtualAddress) -> Unsigned36Bit {
        Unsigned36Bit::from(va.0)
    }
}

impl Debug for VirtualAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualAddress({:o},,{:06o})", self.section(), self.in_section())
    }
}

impl Display for VirtualAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.section() == 0 {
            write!(f, "{:06o}", self.in_section())
        } else {
            write!(f, "{:o},,{:06o}", self.section(), self.in_section())
        }
    }
}

/// A virtual page number: the section number followed by the 9-bit
/// page-within-section.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VirtualPage(u32);

impl VirtualPage {
    pub fn new(section: u32, page_in_section: u32) -> Result<VirtualPage, ConversionFailed> {
        if section >= 1 << SECTION_BITS {
            Err(SECTION_TOO_WIDE)
        } else if page_in_section >= PAGES_PER_SECTION {
            Err(ConversionFailed::TooWide {
                quantity: Quantity::PageInSection,
                bits: PAGE_SHIFT,
            })
        } else {
            Ok(VirtualPage((section << PAGE_SHIFT) | page_in_section))
        }
    }

    pub fn section(&self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    pub fn in_section(&self) -> u32 {
        self.0 & (PAGES_PER_SECTION - 1)
    }

    /// Position of this page in a table covering every mappable
    /// section.
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn first_address(&self) -> VirtualAddress {
        VirtualAddress(self.0 << PAGE_SHIFT)
    }
}

impl Debug for VirtualPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({:o},,{:03o})", self.section(), self.in_section())
    }
}

impl Display for VirtualPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    pub const MAX: PhysicalAddress = PhysicalAddress((1 << PHYSICAL_ADDRESS_BITS) - 1);

    pub fn new(page: PhysicalPage, offset: u32) -> PhysicalAddress {
        PhysicalAddress((u32::from(page.0) << PAGE_SHIFT) | (offset & OFFSET_MASK))
    }

    pub fn page(&self) -> PhysicalPage {
        // A 22-bit address always has a 13-bit page number.
        PhysicalPage((self.0 >> PAGE_SHIFT) as u16)
    }

    pub fn offset(&self) -> u32 {
        self.0 & OFFSET_MASK
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// The address `n` words further on, if that is still a physical
    /// address.
    pub fn checked_add(&self, n: u32) -> Option<PhysicalAddress> {
        self.0
            .checked_add(n)
            .filter(|bits| *bits <= PhysicalAddress::MAX.0)
            .map(PhysicalAddress)
    }
}

impl TryFrom<u64> for PhysicalAddress {
    type Error = ConversionFailed;
    fn try_from(n: u64) -> Result<PhysicalAddress, ConversionFailed> {
        match u32::try_from(n) {
            Ok(bits) if bits <= PhysicalAddress::MAX.0 => Ok(PhysicalAddress(bits)),
            _ => Err(ConversionFailed::TooWide {
                quantity: Quantity::PhysicalAddress,
                bits: PHYSICAL_ADDRESS_BITS,
            }),
        }
    }
}

impl TryFrom<u32> for PhysicalAddress {
    type Error = ConversionFailed;
    fn try_from(n: u32) -> Result<PhysicalAddress, ConversionFailed> {
        PhysicalAddress::try_from(u64::from(n))
    }
}

impl From<PhysicalAddress> for Unsigned36Bit {
    fn from(pa: PhysicalAddress) -> Unsigned36Bit {
        Unsigned36Bit::from(pa.0)
    }
}

impl Debug for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({:o})", self.0)
    }
}

impl Display for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08o}", self.0)
    }
}

impl Octal for PhysicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Octal::fmt(&self.0, f)
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PhysicalPage(u16);

impl PhysicalPage {
    pub const MIN: PhysicalPage = PhysicalPage(0);
    pub const MAX: PhysicalPage = PhysicalPage((1 << PHYSICAL_PAGE_BITS) - 1);

    pub fn address(&self) -> PhysicalAddress {
        PhysicalAddress::new(*self, 0)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u64> for PhysicalPage {
    type Error = ConversionFailed;
    fn try_from(n: u64) -> Result<PhysicalPage, ConversionFailed> {
        match u16::try_from(n) {
            Ok(bits) if bits <= PhysicalPage::MAX.0 => Ok(PhysicalPage(bits)),
            _ => Err(ConversionFailed::TooWide {
                quantity: Quantity::PhysicalPage,
                bits: PHYSICAL_PAGE_BITS,
            }),
        }
    }
}

impl TryFrom<u32> for PhysicalPage {
    type Error = ConversionFailed;
    fn try_from(n: u32) -> Result<PhysicalPage, ConversionFailed> {
        PhysicalPage::try_from(u64::from(n))
    }
}

impl From<PhysicalPage> for u32 {
    fn from(p: PhysicalPage) -> u32 {
        p.0.into()
    }
}

impl Debug for PhysicalPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:o})", self.0)
    }
}

impl Display for PhysicalPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}
