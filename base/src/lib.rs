//! The `base` crate defines the machine-word related things which are
//! useful in both the paging unit and other associated tools (for
//! example a front end which wants to display page fault words).  The
//! idea is that such a tool would depend on the base crate but would
//! not need to depend on the pager library itself.

mod address;
mod error;
mod flags;
mod word;

pub mod prelude;
pub mod subword;
pub use crate::word::*;

#[macro_export]
macro_rules! u36 {
    ($n:expr) => {
        $crate::prelude::Unsigned36Bit::new::<{ $n }>()
    };
}

#[macro_export]
macro_rules! u18 {
    ($n:expr) => {
        $crate::prelude::Unsigned18Bit::new::<{ $n }>()
    };
}

#[test]
fn test_u36() {
    use prelude::Unsigned36Bit;
    let m: Unsigned36Bit = u36!(0o777_000_000_000_u64);
    let n: Unsigned36Bit =
        Unsigned36Bit::try_from(0o777_000_000_000_u64).expect("test data should be in range");
    assert_eq!(m, n);
}

#[test]
fn test_u18() {
    use prelude::Unsigned18Bit;
    let p: Unsigned18Bit = u18!(0o400_000);
    let q: Unsigned18Bit =
        Unsigned18Bit::try_from(1u32 << 17).expect("test data should be in range");
    assert_eq!(p, q);
}
