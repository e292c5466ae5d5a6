use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// The privilege context of a memory reference.  Each mode has its
/// own translation cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Exec,
    User,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Exec => "exec",
            Mode::User => "user",
        })
    }
}

/// The kind of a memory reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessKind {
    Fetch,
    Read,
    Write,
}

impl AccessKind {
    pub fn is_write(&self) -> bool {
        matches!(self, AccessKind::Write)
    }
}

impl Display for AccessKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessKind::Fetch => "fetch",
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        })
    }
}

/// Identifies one of the translation maps.  The physical map is used
/// for every reference while the pager is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Map {
    Exec,
    User,
    Physical,
}

impl From<Mode> for Map {
    fn from(mode: Mode) -> Map {
        match mode {
            Mode::Exec => Map::Exec,
            Mode::User => Map::User,
        }
    }
}

impl Display for Map {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Map::Exec => "exec",
            Map::User => "user",
            Map::Physical => "physical",
        })
    }
}
