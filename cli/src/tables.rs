//! Page tables for a freshly-booted machine.
//!
//! Every generation gets the same picture: section 0 of both the
//! exec and the user address space is mapped one-to-one onto physical
//! memory, page for page, including pages beyond the end of
//! configured memory (references to those fail with non-existent
//! memory).  Pages named as read-only lose write access.
//!
//! | Page | Contents                                     |
//! | ---- | -------------------------------------------- |
//! | 1    | exec process table                           |
//! | 2    | user process table                           |
//! | 3    | TOPS-20 page map, or ITS user tables         |
//! | 4    | ITS exec tables                              |
use std::error::Error;

use tracing::{event, Level};

use base::prelude::*;
use pager::{CoreMemory, Dbr, Generation, PagingUnit, PhysicalStore, UserBaseWord};

pub const EPT_PAGE: u32 = 1;
pub const UPT_PAGE: u32 = 2;
const MAP_PAGE: u32 = 3;
const ITS_EXEC_PAGE: u32 = 4;

/// Where page-fail traps land.
pub const TRAP_PC: u64 = 0o1000;

/// Bit 22 of the exec base register turns paging on.
const PAGER_ENABLE: u64 = 0o020_000;

const PAGES: u32 = 0o1000;

fn store(mem: &mut CoreMemory, addr: u32, value: u64) -> Result<(), Box<dyn Error>> {
    mem.write(PhysicalAddress::try_from(addr)?, Unsigned36Bit::try_from(value)?)?;
    Ok(())
}

/// Store halfword `entry` for `page` in the table at `table`, two
/// entries to a word with the even page on the left.
fn store_halfword(
    mem: &mut CoreMemory,
    table: u32,
    page: u32,
    entry: u64,
) -> Result<(), Box<dyn Error>> {
    let addr = PhysicalAddress::try_from(table + page / 2)?;
    let old = u64::from(mem.read(addr)?);
    let new = if page % 2 == 0 {
        (old & 0o777_777) | (entry << 18)
    } else {
        (old & 0o777_777_000_000) | entry
    };
    store(mem, addr.bits(), new)
}

fn ki_entry(page: u32, writable: bool) -> u64 {
    const ACCESSIBLE: u64 = 0o400_000;
    const WRITABLE: u64 = 0o100_000;
    const CACHEABLE: u64 = 0o020_000;
    let mut entry = ACCESSIBLE | CACHEABLE | u64::from(page);
    if writable {
        entry |= WRITABLE;
    }
    entry
}

fn its_entry(page: u32, writable: bool) -> u64 {
    let access: u64 = if writable { 3 } else { 1 };
    (access << 16) | u64::from(page)
}

fn tops20_entry(page: u32, writable: bool) -> u64 {
    const IMMEDIATE: u64 = 0o100_000_000_000;
    const WRITABLE: u64 = 0o020_000_000_000;
    const CACHEABLE: u64 = 0o002_000_000_000;
    let mut entry = IMMEDIATE | CACHEABLE | u64::from(page);
    if writable {
        entry |= WRITABLE;
    }
    entry
}

fn build_tops10(mem: &mut CoreMemory, read_only: &[u32]) -> Result<(), Box<dyn Error>> {
    let ept = EPT_PAGE << 9;
    let upt = UPT_PAGE << 9;
    for page in 0..PAGES {
        let entry = ki_entry(page, !read_only.contains(&page));
        store_halfword(mem, upt, page, entry)?;
        match page {
            0..=0o337 => store_halfword(mem, ept + 0o600, page, entry)?,
            0o340..=0o377 => store_halfword(mem, upt + 0o400, page - 0o340, entry)?,
            _ => store_halfword(mem, ept + 0o200, page - 0o400, entry)?,
        }
    }
    Ok(())
}

fn build_its(
    unit: &mut PagingUnit,
    mem: &mut CoreMemory,
    read_only: &[u32],
) -> Result<(), Box<dyn Error>> {
    let tables = [
        (Dbr::UserLow, MAP_PAGE << 9, 0),
        (Dbr::UserHigh, (MAP_PAGE << 9) + 0o200, 0o400),
        (Dbr::ExecLow, ITS_EXEC_PAGE << 9, 0),
        (Dbr::ExecHigh, (ITS_EXEC_PAGE << 9) + 0o200, 0o400),
    ];
    for (dbr, table, first) in tables {
        for within in 0..0o400 {
            let page = first + within;
            store_halfword(mem, table, within, its_entry(page, !read_only.contains(&page)))?;
        }
        unit.write_its_dbr(dbr, Unsigned36Bit::try_from(u64::from(table))?);
    }
    Ok(())
}

fn build_tops20(
    unit: &mut PagingUnit,
    mem: &mut CoreMemory,
    read_only: &[u32],
) -> Result<(), Box<dyn Error>> {
    const SECTION_POINTER: u64 = 0o164_000_000_000;
    let map = MAP_PAGE << 9;
    for page in 0..PAGES {
        store(mem, map + page, tops20_entry(page, !read_only.contains(&page)))?;
    }
    // Every section shares the one map when extended addressing is
    // on.
    let sections = if unit.config().extended_addressing {
        SECTION_COUNT
    } else {
        1
    };
    for section in 0..sections {
        let pointer = SECTION_POINTER | u64::from(MAP_PAGE);
        store(mem, (EPT_PAGE << 9) + 0o540 + section, pointer)?;
        store(mem, (UPT_PAGE << 9) + 0o540 + section, pointer)?;
    }
    // No core status table.
    unit.write_cst_base(Unsigned36Bit::ZERO);
    Ok(())
}

/// Build the tables for the unit's generation, set up the page-fail
/// vector and turn paging on.
pub fn build(
    unit: &mut PagingUnit,
    mem: &mut CoreMemory,
    read_only: &[u32],
) -> Result<(), Box<dyn Error>> {
    let generation = unit.config().generation;
    event!(
        Level::DEBUG,
        "building {} page tables, read-only pages {:?}",
        generation,
        read_only
    );
    match generation {
        Generation::ItsKs => build_its(unit, mem, read_only)?,
        Generation::Tops10Ks => build_tops10(mem, read_only)?,
        Generation::Tops20Kl => build_tops20(unit, mem, read_only)?,
    }
    let upt = UPT_PAGE << 9;
    if unit.config().two_word_pc() {
        store(mem, upt + 0o503, TRAP_PC)?;
    } else {
        store(mem, upt + 0o502, TRAP_PC)?;
    }
    let upt_page = PhysicalPage::try_from(UPT_PAGE)?;
    unit.write_exec_base(Unsigned36Bit::try_from(PAGER_ENABLE | u64::from(EPT_PAGE))?);
    unit.write_user_base(UserBaseWord::compose(0, 0, upt_page).0);
    Ok(())
}
