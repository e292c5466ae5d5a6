//! Accumulator blocks.
//!
//! The processor has eight blocks of sixteen accumulators.  The
//! current block is held in a live shadow which the execution loop
//! reads and writes; the copy in block storage is stale while the
//! block is current.  References made in the previous context (for
//! example by PXCT) go to the previous block, which is the live
//! shadow when the previous block is also the current one.
use std::fmt::{self, Debug, Formatter};

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

pub const AC_BLOCK_COUNT: usize = 8;
pub const ACS_PER_BLOCK: usize = 16;

type Block = [Unsigned36Bit; ACS_PER_BLOCK];

/// Where previous-context accumulator references go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PreviousRoute {
    /// The previous block is the current block.
    Live,
    /// The previous block is held in block storage.
    Stored(usize),
}

pub struct AccumulatorBlocks {
    stored: [Block; AC_BLOCK_COUNT],
    live: Block,
    current: usize,
    previous: usize,
    previous_route: PreviousRoute,
}

impl Debug for AccumulatorBlocks {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccumulatorBlocks")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("previous_route", &self.previous_route)
            .finish_non_exhaustive()
    }
}

impl Default for AccumulatorBlocks {
    fn default() -> AccumulatorBlocks {
        AccumulatorBlocks::new()
    }
}

fn block_number(n: u8) -> usize {
    usize::from(n) % AC_BLOCK_COUNT
}

fn ac_index(ac: u8) -> usize {
    usize::from(ac) % ACS_PER_BLOCK
}

impl AccumulatorBlocks {
    pub fn new() -> AccumulatorBlocks {
        AccumulatorBlocks {
            stored: [[Unsigned36Bit::ZERO; ACS_PER_BLOCK]; AC_BLOCK_COUNT],
            live: [Unsigned36Bit::ZERO; ACS_PER_BLOCK],
            current: 0,
            previous: 0,
            previous_route: PreviousRoute::Live,
        }
    }

    pub fn current(&self) -> u8 {
        self.current as u8
    }

    pub fn previous(&self) -> u8 {
        self.previous as u8
    }

    pub fn previous_route(&self) -> PreviousRoute {
        self.previous_route
    }

    /// Make `current` the current block and `previous` the previous
    /// block.  Block numbers are taken modulo 8.
    pub fn select(&mut self, current: u8, previous: u8) {
        let current = block_number(current);
        let previous = block_number(previous);
        if current != self.current {
            self.stored[self.current] = self.live;
            self.live = self.stored[current];
            event!(
                Level::DEBUG,
                "switched AC block {} -> {}",
                self.current,
                current
            );
            self.current = current;
        }
        self.previous = previous;
        self.previous_route = if previous == current {
            PreviousRoute::Live
        } else {
            PreviousRoute::Stored(previous)
        };
    }

    /// Read accumulator `ac` (modulo 16) of the current block.
    pub fn read(&self, ac: u8) -> Unsigned36Bit {
        self.live[ac_index(ac)]
    }

    pub fn write(&mut self, ac: u8, value: Unsigned36Bit) {
        self.live[ac_index(ac)] = value;
    }

    /// Read accumulator `ac` of the previous block.
    pub fn read_previous(&self, ac: u8) -> Unsigned36Bit {
        match self.previous_route {
            PreviousRoute::Live => self.live[ac_index(ac)],
            PreviousRoute::Stored(n) => self.stored[n][ac_index(ac)],
        }
    }

    pub fn write_previous(&mut self, ac: u8, value: Unsigned36Bit) {
        match self.previous_route {
            PreviousRoute::Live => self.live[ac_index(ac)] = value,
            PreviousRoute::Stored(n) => self.stored[n][ac_index(ac)] = value,
        }
    }

    /// The contents of block `n` as the program would see them if it
    /// switched to that block now.
    pub fn block_contents(&self, n: u8) -> [Unsigned36Bit; ACS_PER_BLOCK] {
        let n = block_number(n);
        if n == self.current {
            self.live
        } else {
            self.stored[n]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    fn w(n: u64) -> Unsigned36Bit {
        Unsigned36Bit::try_from(n).unwrap()
    }

    #[test]
    fn test_switch_preserves_contents() {
        let mut acs = AccumulatorBlocks::new();
        acs.write(1, w(0o111));
        acs.select(3, 0);
        assert_eq!(acs.read(1), Unsigned36Bit::ZERO);
        acs.write(1, w(0o333));
        assert_eq!(acs.read_previous(1), w(0o111));
        acs.select(0, 3);
        assert_eq!(acs.read(1), w(0o111));
        assert_eq!(acs.read_previous(1), w(0o333));
        assert_eq!(acs.block_contents(3)[1], w(0o333));
    }

    #[test]
    fn test_previous_is_live_when_same_block() {
        let mut acs = AccumulatorBlocks::new();
        acs.select(2, 2);
        assert_eq!(acs.previous_route(), PreviousRoute::Live);
        acs.write_previous(5, w(0o55));
        assert_eq!(acs.read(5), w(0o55));
        acs.select(2, 4);
        assert_eq!(acs.previous_route(), PreviousRoute::Stored(4));
        acs.write_previous(5, w(0o44));
        assert_eq!(acs.read(5), w(0o55));
        assert_eq!(acs.block_contents(4)[5], w(0o44));
    }

    #[test]
    fn test_block_numbers_wrap() {
        let mut acs = AccumulatorBlocks::new();
        acs.select(9, 15);
        assert_eq!(acs.current(), 1);
        assert_eq!(acs.previous(), 7);
    }

    /// Switching to another block and back never changes what the
    /// program sees.
    #[proptest]
    fn test_switch_is_transparent(
        #[strategy(0u8..8)] home: u8,
        #[strategy(0u8..8)] away: u8,
        #[strategy(0u8..16)] ac: u8,
        #[strategy(0u64..(1 << 36))] value: u64,
    ) {
        let mut acs = AccumulatorBlocks::new();
        acs.select(home, home);
        acs.write(ac, w(value));
        acs.select(away, home);
        assert_eq!(acs.read_previous(ac), w(value));
        acs.select(home, away);
        assert_eq!(acs.read(ac), w(value));
    }
}
