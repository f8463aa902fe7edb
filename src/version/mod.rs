// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! This module provides version parsing and comparison for RPM-style
//! `[epoch:]version[-release]` strings using the real rpmvercmp algorithm:
//! version and release are split into runs of digits and runs of letters,
//! numeric runs compare numerically (leading zeroes stripped), alphabetic
//! runs compare lexicographically, a numeric run always outranks an
//! alphabetic run at the same position, and `~` sorts before everything,
//! including the end of the string.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Compare two version (or release) fragments using the rpmvercmp algorithm.
///
/// This is the comparison the original engine applies to the `version` and
/// `release` components of an EVR independently, after epochs have already
/// been compared numerically.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    let mut i = 0usize;
    let mut j = 0usize;

    loop {
        while i < ac.len() && !ac[i].is_ascii_alphanumeric() && ac[i] != '~' {
            i += 1;
        }
        while j < bc.len() && !bc[j].is_ascii_alphanumeric() && bc[j] != '~' {
            j += 1;
        }

        let a_tilde = i < ac.len() && ac[i] == '~';
        let b_tilde = j < bc.len() && bc[j] == '~';
        if a_tilde || b_tilde {
            if !a_tilde {
                return Ordering::Greater;
            }
            if !b_tilde {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if i >= ac.len() || j >= bc.len() {
            break;
        }

        let a_isdigit = ac[i].is_ascii_digit();
        let b_isdigit = bc[j].is_ascii_digit();

        let start_i = i;
        if a_isdigit {
            while i < ac.len() && ac[i].is_ascii_digit() {
                i += 1;
            }
        } else {
            while i < ac.len() && ac[i].is_ascii_alphabetic() {
                i += 1;
            }
        }
        let seg_a: String = ac[start_i..i].iter().collect();

        let start_j = j;
        if b_isdigit {
            while j < bc.len() && bc[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while j < bc.len() && bc[j].is_ascii_alphabetic() {
                j += 1;
            }
        }
        let seg_b: String = bc[start_j..j].iter().collect();

        if seg_a.is_empty() || seg_b.is_empty() {
            break;
        }

        if a_isdigit != b_isdigit {
            return if a_isdigit {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if a_isdigit {
            let ta = seg_a.trim_start_matches('0');
            let tb = seg_b.trim_start_matches('0');
            match ta.len().cmp(&tb.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
            match ta.cmp(tb) {
                Ordering::Equal => {}
                ord => return ord,
            }
        } else {
            match seg_a.cmp(&seg_b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
    }

    match (i < ac.len(), j < bc.len()) {
        (false, false) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

/// A parsed RPM version with epoch, version, and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RpmVersion {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4.el8" → epoch=0, version="1.2.3", release=Some("4.el8")
    /// - "1:2.3.4-5.el8" → epoch=1, version="2.3.4", release=Some("5.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch_str, rest) = if let Some(colon_pos) = s.find(':') {
            let (e, r) = s.split_at(colon_pos);
            (e, &r[1..])
        } else {
            ("0", s)
        };

        let epoch = if epoch_str.is_empty() {
            0
        } else {
            epoch_str.parse::<u64>().map_err(|e| {
                Error::InitError(format!("Invalid epoch in version '{}': {}", s, e))
            })?
        };

        let (version, release) = if let Some(dash_pos) = rest.find('-') {
            let (v, r) = rest.split_at(dash_pos);
            (v.to_string(), Some(r[1..].to_string()))
        } else {
            (rest.to_string(), None)
        };

        if version.is_empty() {
            return Err(Error::InitError(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare two RPM versions: epoch numerically, then version and release
    /// via rpmvercmp.
    pub fn compare(&self, other: &RpmVersion) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match rpmvercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let a_release = self.release.as_deref().unwrap_or("");
        let b_release = other.release.as_deref().unwrap_or("");
        rpmvercmp(a_release, b_release)
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-dependency sense bits, matching the original engine's
/// `RPMSENSE_LESS`/`RPMSENSE_GREATER`/`RPMSENSE_EQUAL` header flags. A
/// require/provide/conflict tag pairs a name with one of these plus a
/// version string; `EQUAL` alone is exact match, `LESS | EQUAL` is `<=`,
/// and so on. No bits set (and no version) means "any version".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenseFlags(pub u32);

impl SenseFlags {
    pub const LESS: u32 = 1 << 1;
    pub const GREATER: u32 = 1 << 2;
    pub const EQUAL: u32 = 1 << 3;

    pub fn contains(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Build the `VersionConstraint` this sense/version pair denotes.
    /// An empty version string with no sense bits means "any version".
    pub fn to_constraint(self, version: &str) -> Result<VersionConstraint> {
        if version.is_empty() {
            return Ok(VersionConstraint::Any);
        }
        let v = RpmVersion::parse(version)?;
        let less = self.contains(Self::LESS);
        let greater = self.contains(Self::GREATER);
        let equal = self.contains(Self::EQUAL);
        Ok(match (less, greater, equal) {
            (true, false, false) => VersionConstraint::LessThan(v),
            (true, false, true) => VersionConstraint::LessOrEqual(v),
            (false, true, false) => VersionConstraint::GreaterThan(v),
            (false, true, true) => VersionConstraint::GreaterOrEqual(v),
            (false, false, true) => VersionConstraint::Exact(v),
            _ => VersionConstraint::Exact(v),
        })
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match
    Exact(RpmVersion),
    /// Greater than
    GreaterThan(RpmVersion),
    /// Greater than or equal
    GreaterOrEqual(RpmVersion),
    /// Less than
    LessThan(RpmVersion),
    /// Less than or equal
    LessOrEqual(RpmVersion),
    /// Not equal
    NotEqual(RpmVersion),
    /// Both constraints must be satisfied (for ranges like ">= 1.0, < 2.0")
    And(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a version constraint string
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "< 2.0.0" → LessThan(2.0.0)
    /// - "= 1.5.0" → Exact(1.5.0)
    /// - "> 1.0" → GreaterThan(1.0)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
            if parts.len() == 2 {
                let left = Self::parse(parts[0])?;
                let right = Self::parse(parts[1])?;
                return Ok(VersionConstraint::And(Box::new(left), Box::new(right)));
            }
        }

        if let Some(rest) = s.strip_prefix(">=") {
            let version = RpmVersion::parse(rest.trim())?;
            Ok(VersionConstraint::GreaterOrEqual(version))
        } else if let Some(rest) = s.strip_prefix("<=") {
            let version = RpmVersion::parse(rest.trim())?;
            Ok(VersionConstraint::LessOrEqual(version))
        } else if let Some(rest) = s.strip_prefix("!=") {
            let version = RpmVersion::parse(rest.trim())?;
            Ok(VersionConstraint::NotEqual(version))
        } else if let Some(rest) = s.strip_prefix('>') {
            let version = RpmVersion::parse(rest.trim())?;
            Ok(VersionConstraint::GreaterThan(version))
        } else if let Some(rest) = s.strip_prefix('<') {
            let version = RpmVersion::parse(rest.trim())?;
            Ok(VersionConstraint::LessThan(version))
        } else if let Some(rest) = s.strip_prefix('=') {
            let version = RpmVersion::parse(rest.trim())?;
            Ok(VersionConstraint::Exact(version))
        } else {
            let version = RpmVersion::parse(s)?;
            Ok(VersionConstraint::Exact(version))
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &RpmVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::NotEqual(v) => version != v,
            VersionConstraint::And(left, right) => {
                left.satisfies(version) && right.satisfies(version)
            }
        }
    }

    /// Check if two constraints are compatible (can be satisfied simultaneously)
    pub fn is_compatible_with(&self, other: &VersionConstraint) -> bool {
        match (self, other) {
            (VersionConstraint::Any, _) | (_, VersionConstraint::Any) => true,
            (VersionConstraint::Exact(v1), VersionConstraint::Exact(v2)) => v1 == v2,
            _ => true,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "= {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, "> {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::LessThan(v) => write!(f, "< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!= {}", v),
            VersionConstraint::And(left, right) => write!(f, "{}, {}", left, right),
        }
    }
}
