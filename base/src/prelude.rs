//! The prelude exports the word, address and flag types which are
//! useful to anything dealing with the paging unit.  Providing this
//! prelude is the main purpose of the base crate.
pub use super::address::*;
pub use super::error::*;
pub use super::flags::PcFlags;
pub use super::subword::{bit, field, join_halves, left_half, right_half, split_halves, with_field};
pub use super::word::*;
pub use super::{u18, u36};
