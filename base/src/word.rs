//! Fixed-width unsigned machine quantities.
//!
//! The machine uses 36-bit words, and most of the pager's registers
//! and table entries are manipulated as whole words or as 18-bit
//! halfwords.  Native integer types are wider than that, so these
//! wrappers keep the value in range and make it explicit at each
//! boundary where a native value is narrowed.
//!
//! Values are printed in octal, because that is how every piece of
//! documentation for the machine presents them.

use std::fmt::{self, Debug, Display, Formatter, Octal};

use serde::Serialize;

pub use super::error::{ConversionFailed, Quantity};


/// Implements conversions from native types which always fit (e.g.
/// `From<u16> for Unsigned18Bit`).
macro_rules! from_native_type_to_self {
    ($SelfT:ident, $($from:ty)*) => {
        $(
            impl From<$from> for $SelfT {
                fn from(n: $from) -> Self {
                    Self { bits: n.into() }
                }
            }
        )*
    }
}

/// Implements conversions to native types which can always hold the
/// value.  We use `as` here because we know more about the range of
/// `bits` than the compiler does (e.g. an 18-bit value always fits in
/// a usize on the platforms we support).
macro_rules! from_self_to_native_type {
    ($SelfT:ident, $($to:ty)*) => {
        $(
            impl From<$SelfT> for $to {
                fn from(n: $SelfT) -> $to {
                    n.bits as $to
                }
            }
        )*
    }
}

/// Implements conversions from native types which may be out of range
/// (e.g. `TryFrom<u64> for Unsigned36Bit`).
macro_rules! try_from_native_type_to_self {
    ($SelfT:ident, $InnerT:ty, $quantity:expr, $($from:ty)*) => {
        $(
            impl TryFrom<$from> for $SelfT {
                type Error = ConversionFailed;
                fn try_from(n: $from) -> Result<Self, ConversionFailed> {
                    match <$InnerT>::try_from(n) {
                        Ok(bits) if bits <= Self::VALUE_BITS => Ok(Self { bits }),
                        _ => Err(ConversionFailed::TooWide {
                            quantity: $quantity,
                            bits: Self::WIDTH,
                        }),
                    }
                }
            }
        )*
    }
}

/// Implements the common functionality of the word types.  `SelfT`
/// is the type being defined, `BITS` its width and `InnerT` the
/// native type holding the value.
macro_rules! unsigned_word_impl {
    ($SelfT:ident, $BITS:expr, $InnerT:ty) => {
        impl $SelfT {
            const MODULUS: $InnerT = (1 << $BITS);
            const VALUE_BITS: $InnerT = Self::MODULUS - 1;

            pub const WIDTH: u32 = $BITS;
            pub const MAX: Self = Self {
                bits: Self::VALUE_BITS,
            };
            pub const ZERO: Self = Self { bits: 0 };
            pub const ONE: Self = Self { bits: 1 };

            /// Build a constant.  An out-of-range `N` fails at
            /// compile time.  This is `pub` so that it can be used by
            /// `u36!()` and `u18!()`.
            pub const fn new<const N: $InnerT>() -> $SelfT {
                type Word = $SelfT;
                struct Checked<const M: $InnerT>;
                impl<const M: $InnerT> Checked<M> {
                    const VALUE: Word = {
                        if M > Word::MAX.bits {
                            panic!("constant is too wide for this word type")
                        } else {
                            Word { bits: M }
                        }
                    };
                }
                Checked::<N>::VALUE
            }

            pub const fn bits(&self) -> $InnerT {
                self.bits
            }

            pub const fn is_zero(&self) -> bool {
                self.bits == 0
            }

            // Trait methods cannot be const, so these work-alikes of
            // BitAnd and BitOr let us form constants at compile time.
            pub const fn and(self, mask: $InnerT) -> Self {
                Self {
                    bits: self.bits & mask,
                }
            }

            pub const fn bitor(self, mask: $InnerT) -> Self {
                Self {
                    bits: (self.bits | mask) & Self::VALUE_BITS,
                }
            }

            pub fn wrapping_add(self, rhs: $SelfT) -> $SelfT {
                Self {
                    bits: self.bits.wrapping_add(rhs.bits) & Self::VALUE_BITS,
                }
            }

            pub fn checked_add(self, rhs: $SelfT) -> Option<$SelfT> {
                self.bits
                    .checked_add(rhs.bits)
                    .and_then(|sum| Self::try_from(sum).ok())
            }
        }

        impl Display for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
                Octal::fmt(&self.bits, f)
            }
        }

        impl Octal for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
                Octal::fmt(&self.bits, f)
            }
        }

        impl Debug for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($SelfT), "{{bits: {:#o}}}"), self.bits)
            }
        }

        impl PartialEq<$InnerT> for $SelfT {
            fn eq(&self, other: &$InnerT) -> bool {
                self.bits == *other
            }
        }

        impl std::ops::Not for $SelfT {
            type Output = Self;
            fn not(self) -> Self {
                Self {
                    bits: (!self.bits) & Self::VALUE_BITS,
                }
            }
        }

        impl std::ops::BitAnd for $SelfT {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self {
                    bits: self.bits & rhs.bits,
                }
            }
        }

        impl std::ops::BitAnd<$InnerT> for $SelfT {
            type Output = Self;
            fn bitand(self, mask: $InnerT) -> Self {
                Self {
                    bits: self.bits & mask,
                }
            }
        }

        impl std::ops::BitOr for $SelfT {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self {
                    bits: self.bits | rhs.bits,
                }
            }
        }

        impl std::ops::BitOr<$InnerT> for $SelfT {
            type Output = Self;
            fn bitor(self, mask: $InnerT) -> Self {
                Self {
                    bits: (self.bits | mask) & Self::VALUE_BITS,
                }
            }
        }

        impl std::ops::BitXor for $SelfT {
            type Output = Self;
            fn bitxor(self, rhs: Self) -> Self {
                Self {
                    bits: self.bits ^ rhs.bits,
                }
            }
        }

        impl std::ops::Shl<u32> for $SelfT {
            type Output = Self;
            fn shl(self, n: u32) -> Self {
                Self {
                    bits: self.bits.checked_shl(n).unwrap_or(0) & Self::VALUE_BITS,
                }
            }
        }

        impl std::ops::Shr<u32> for $SelfT {
            type Output = Self;
            fn shr(self, n: u32) -> Self {
                Self {
                    bits: self.bits.checked_shr(n).unwrap_or(0),
                }
            }
        }
    };
}

/// An 18-bit halfword.  In-section addresses, register halves and
/// the entries of the flat page tables are all halfwords.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned18Bit {
    bits: u32,
}

/// A 36-bit machine word.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned36Bit {
    bits: u64,
}

unsigned_word_impl!(Unsigned18Bit, 18, u32);
unsigned_word_impl!(Unsigned36Bit, 36, u64);

////////////////////////////////////////////////////////////////////////
// Unsigned18Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned18Bit, u8 u16);
from_self_to_native_type!(Unsigned18Bit, u32 u64 usize);
try_from_native_type_to_self!(Unsigned18Bit, u32, Quantity::Halfword, u32 u64 usize);

impl TryFrom<Unsigned36Bit> for Unsigned18Bit {
    type Error = ConversionFailed;
    fn try_from(n: Unsigned36Bit) -> Result<Self, ConversionFailed> {
        Unsigned18Bit::try_from(n.bits)
    }
}

////////////////////////////////////////////////////////////////////////
// Unsigned36Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned36Bit, u8 u16 u32);
from_self_to_native_type!(Unsigned36Bit, u64);
try_from_native_type_to_self!(Unsigned36Bit, u64, Quantity::Word, u64 usize);

impl From<Unsigned18Bit> for Unsigned36Bit {
    fn from(n: Unsigned18Bit) -> Self {
        Self {
            bits: n.bits.into(),
        }
    }
}

impl Unsigned36Bit {
    /// The right (less significant) 18 bits of the word.  This
    /// cannot fail, so it is more convenient than `try_from`.
    pub const fn low_halfword(self) -> Unsigned18Bit {
        Unsigned18Bit {
            bits: (self.bits & 0o777_777) as u32,
        }
    }

    /// The left (more significant) 18 bits of the word.
    pub const fn high_halfword(self) -> Unsigned18Bit {
        Unsigned18Bit {
            bits: ((self.bits >> 18) & 0o777_777) as u32,
        }
    }
}
