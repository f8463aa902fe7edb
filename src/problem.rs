// src/problem.rs

//! Semantic transaction problems.
//!
//! A `Problem` is raised against a concrete transaction element during
//! `check()`/`run()` and carries the NEVR pair, ignore flag, and optional
//! payload the filter-flags bitmask inspects to decide whether the
//! transaction may proceed.

use std::fmt;

/// The kind of semantic problem raised against a transaction element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    BadArch,
    BadOs,
    PkgInstalled,
    BadRelocate,
    Requires,
    Conflict,
    NewFileConflict,
    FileConflict,
    OldPackage,
    DiskSpace,
    DiskNodes,
    BadPreTrans,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProblemKind::BadArch => "bad architecture",
            ProblemKind::BadOs => "bad operating system",
            ProblemKind::PkgInstalled => "package already installed",
            ProblemKind::BadRelocate => "invalid relocation",
            ProblemKind::Requires => "unsatisfied dependency",
            ProblemKind::Conflict => "conflicting package",
            ProblemKind::NewFileConflict => "file conflicts with package being installed",
            ProblemKind::FileConflict => "file conflicts with installed package",
            ProblemKind::OldPackage => "older package already installed",
            ProblemKind::DiskSpace => "insufficient disk space",
            ProblemKind::DiskNodes => "insufficient disk inodes",
            ProblemKind::BadPreTrans => "pre-transaction script failed",
        };
        write!(f, "{}", s)
    }
}

/// A single semantic problem raised against a transaction.
///
/// Field names follow the original engine's problem record: a primary
/// NEVR (the package the problem is against), an optional alternate NEVR
/// (the other package involved, for REQUIRES/CONFLICT/FILE_CONFLICT), an
/// optional retrieval key for solve-callback retries, and a free-form
/// string plus an unsigned payload whose meaning depends on `kind`
/// (a missing capability name and a disk-space deficit in bytes, etc).
#[derive(Debug, Clone)]
pub struct Problem {
    pub kind: ProblemKind,
    pub primary_nevr: String,
    pub alternate_nevr: Option<String>,
    pub retrieval_key: Option<String>,
    pub str_data: Option<String>,
    pub num_data: Option<u64>,
    /// Set when a problem-filter flag has waived this specific problem; the
    /// problem stays in the set for diagnostics but does not block `run()`.
    pub ignored: bool,
}

impl Problem {
    pub fn new(kind: ProblemKind, primary_nevr: impl Into<String>) -> Self {
        Self {
            kind,
            primary_nevr: primary_nevr.into(),
            alternate_nevr: None,
            retrieval_key: None,
            str_data: None,
            num_data: None,
            ignored: false,
        }
    }

    pub fn with_alternate(mut self, nevr: impl Into<String>) -> Self {
        self.alternate_nevr = Some(nevr.into());
        self
    }

    pub fn with_str(mut self, s: impl Into<String>) -> Self {
        self.str_data = Some(s.into());
        self
    }

    pub fn with_num(mut self, n: u64) -> Self {
        self.num_data = Some(n);
        self
    }

    pub fn ignore(&mut self) {
        self.ignored = true;
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.primary_nevr)?;
        if let Some(ref alt) = self.alternate_nevr {
            write!(f, " (vs {})", alt)?;
        }
        if let Some(ref s) = self.str_data {
            write!(f, " [{}]", s)?;
        }
        Ok(())
    }
}

/// Bitmask of problem kinds a transaction is willing to proceed past. Named
/// after the original engine's `problemFilterFlags`, kept as a hand-named
/// bit-constant wrapper rather than a `bitflags` type to match the rest of
/// this crate's bitmask fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemFilter(pub u32);

impl ProblemFilter {
    pub const NONE: u32 = 0;
    pub const IGNORE_OS: u32 = 1 << 0;
    pub const IGNORE_ARCH: u32 = 1 << 1;
    pub const REPLACE_PKG: u32 = 1 << 2;
    pub const FORCE_RELOCATE: u32 = 1 << 3;
    pub const REPLACE_NEW_FILES: u32 = 1 << 4;
    pub const REPLACE_OLD_FILES: u32 = 1 << 5;
    pub const OLD_PACKAGE: u32 = 1 << 6;
    pub const DISK_SPACE: u32 = 1 << 7;
    pub const DISK_NODES: u32 = 1 << 8;

    pub fn contains(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn union(self, other: u32) -> Self {
        ProblemFilter(self.0 | other)
    }

    /// Whether this filter waives the given problem kind.
    pub fn waives(&self, kind: ProblemKind) -> bool {
        match kind {
            ProblemKind::BadOs => self.contains(Self::IGNORE_OS),
            ProblemKind::BadArch => self.contains(Self::IGNORE_ARCH),
            ProblemKind::PkgInstalled => self.contains(Self::REPLACE_PKG),
            ProblemKind::BadRelocate => self.contains(Self::FORCE_RELOCATE),
            ProblemKind::NewFileConflict => self.contains(Self::REPLACE_NEW_FILES),
            ProblemKind::FileConflict => self.contains(Self::REPLACE_OLD_FILES),
            ProblemKind::OldPackage => self.contains(Self::OLD_PACKAGE),
            ProblemKind::DiskSpace => self.contains(Self::DISK_SPACE),
            ProblemKind::DiskNodes => self.contains(Self::DISK_NODES),
            ProblemKind::Requires | ProblemKind::Conflict | ProblemKind::BadPreTrans => false,
        }
    }
}

impl Default for ProblemFilter {
    fn default() -> Self {
        ProblemFilter(Self::NONE)
    }
}

/// Applies a filter to a problem set in place, marking waived problems
/// ignored. Returns the count of problems that remain unignored (the count
/// `check()` surfaces to the caller).
pub fn apply_filter(problems: &mut [Problem], filter: &ProblemFilter) -> usize {
    let mut unignored = 0;
    for problem in problems.iter_mut() {
        if filter.waives(problem.kind) {
            problem.ignore();
        } else if !problem.ignored {
            unignored += 1;
        }
    }
    unignored
}
