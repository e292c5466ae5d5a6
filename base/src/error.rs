//! Failures to narrow a native value into a machine quantity.

use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

/// The machine quantity a native value was being converted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    Word,
    Halfword,
    VirtualAddress,
    Section,
    PageInSection,
    PhysicalAddress,
    PhysicalPage,
    DbrNumber,
}

impl Display for Quantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quantity::Word => "word",
            Quantity::Halfword => "halfword",
            Quantity::VirtualAddress => "virtual address",
            Quantity::Section => "section number",
            Quantity::PageInSection => "page number within a section",
            Quantity::PhysicalAddress => "physical address",
            Quantity::PhysicalPage => "physical page number",
            Quantity::DbrNumber => "DBR number",
        })
    }
}

/// A native value which does not fit the machine quantity it was
/// meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionFailed {
    /// The value needs more than `bits` bits.
    TooWide { quantity: Quantity, bits: u32 },
    /// The quantity only takes the values `min..=max`.
    OutOfRange { quantity: Quantity, min: u64, max: u64 },
}

impl ConversionFailed {
    pub fn quantity(&self) -> Quantity {
        match self {
            ConversionFailed::TooWide { quantity, .. }
            | ConversionFailed::OutOfRange { quantity, .. } => *quantity,
        }
    }
}

impl Error for ConversionFailed {}

impl Display for ConversionFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConversionFailed::TooWide { quantity, bits } => {
                write!(f, "value does not fit in a {bits}-bit {quantity}")
            }
            ConversionFailed::OutOfRange { quantity, min, max } => {
                write!(f, "a {quantity} must be between {min} and {max}")
            }
        }
    }
}

#[test]
fn test_messages_name_the_quantity() {
    let wide = ConversionFailed::TooWide {
        quantity: Quantity::PhysicalPage,
        bits: 13,
    };
    assert_eq!(wide.to_string(), "value does not fit in a 13-bit physical page number");
    assert_eq!(wide.quantity(), Quantity::PhysicalPage);
    let range = ConversionFailed::OutOfRange {
        quantity: Quantity::DbrNumber,
        min: 1,
        max: 4,
    };
    assert_eq!(range.to_string(), "a DBR number must be between 1 and 4");
}
