//! Layout of the process tables.
//!
//! The exec base register names the page holding the Exec Process
//! Table (EPT) and the user base register names the page holding the
//! User Process Table (UPT).  The pager uses fixed locations within
//! these pages.  Offsets here are in words from the start of the
//! table.
//!
//! # User Process Table
//!
//! | Offset  | Contents                                             |
//! | ------- | ---------------------------------------------------- |
//! | 000-377 | KI-style user page map, two entries per word         |
//! | 400-417 | KI-style exec page map for exec pages 340-377         |
//! | 500     | page-fail word                                       |
//! | 501     | old PC word (one-word format) or old flags (two-word) |
//! | 502     | new PC word (one-word format) or old PC (two-word)    |
//! | 503     | new PC (two-word format)                              |
//! | 540-577 | section pointers for user sections 0-37              |
//!
//! # Exec Process Table
//!
//! | Offset  | Contents                                             |
//! | ------- | ---------------------------------------------------- |
//! | 200-377 | KI-style exec page map for exec pages 400-777         |
//! | 540-577 | section pointers for exec sections 0-37              |
//! | 600-757 | KI-style exec page map for exec pages 0-337           |
//!
//! The ITS pager does not use the process tables for translation,
//! only for the page-fail trap vector.

pub(crate) const PAGE_FAIL_WORD: u32 = 0o500;
pub(crate) const OLD_PC_WORD: u32 = 0o501;
pub(crate) const NEW_PC_WORD: u32 = 0o502;

pub(crate) const OLD_FLAGS_WORD_EXTENDED: u32 = 0o501;
pub(crate) const OLD_PC_WORD_EXTENDED: u32 = 0o502;
pub(crate) const NEW_PC_WORD_EXTENDED: u32 = 0o503;

pub(crate) const SECTION_POINTERS: u32 = 0o540;

pub(crate) const KI_USER_MAP: u32 = 0o000;
pub(crate) const KI_EXEC_PER_PROCESS_MAP: u32 = 0o400;
pub(crate) const KI_EXEC_HIGH_MAP: u32 = 0o200;
pub(crate) const KI_EXEC_LOW_MAP: u32 = 0o600;

/// First exec page mapped through the per-process area of the UPT.
pub(crate) const KI_EXEC_PER_PROCESS_FIRST: u32 = 0o340;
/// First exec page mapped through the high part of the EPT.
pub(crate) const KI_EXEC_HIGH_FIRST: u32 = 0o400;
