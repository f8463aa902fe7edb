// src/fsm/hardlink.rs

//! Hard-link-set closure: files sharing the same `(device, inode)` in a
//! package's file list are materialized once, as ordinary content, and every
//! other member is linked to the first via `fs::hard_link` rather than
//! written out separately. A set isn't "closed" until every member named by
//! `nlink` has actually shown up in the file list; if the archive ends (or
//! the package is committed) with members still missing, that's a
//! `MissingHardlink` error rather than a silent partial link.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HardLinkSetError {
    #[error(
        "hard-link set for device {device} inode {inode} closed with {links_left} of {nlink} links missing"
    )]
    MissingHardlink {
        device: u64,
        inode: u64,
        nlink: u32,
        links_left: u32,
    },
}

/// One growing hard-link set: every file entry index sharing `(device,
/// inode)` lands in `filex`, in the order encountered. `creator_index` is
/// the first member seen — the one whose content is actually materialized;
/// every later member just links to it.
#[derive(Debug, Clone)]
pub struct HardLinkSet {
    pub device: u64,
    pub inode: u64,
    pub nlink: u32,
    pub creator_index: Option<usize>,
    pub filex: Vec<usize>,
    pub suffixes: Vec<Option<String>>,
    links_left: u32,
}

impl HardLinkSet {
    pub fn new(device: u64, inode: u64, nlink: u32) -> Self {
        Self {
            device,
            inode,
            nlink,
            creator_index: None,
            filex: Vec::new(),
            suffixes: Vec::new(),
            links_left: nlink,
        }
    }

    /// Record one more member of the set. The first call designates the
    /// creator (the file whose content actually gets materialized);
    /// subsequent calls are links to it.
    pub fn add_member(&mut self, file_index: usize, suffix: Option<String>) {
        if self.creator_index.is_none() {
            self.creator_index = Some(file_index);
        }
        self.filex.push(file_index);
        self.suffixes.push(suffix);
        self.links_left = self.links_left.saturating_sub(1);
    }

    pub fn is_complete(&self) -> bool {
        self.links_left == 0
    }

    pub fn links_left(&self) -> u32 {
        self.links_left
    }

    /// Close the set: succeeds only if every expected link showed up.
    pub fn finish(&self) -> Result<(), HardLinkSetError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(HardLinkSetError::MissingHardlink {
                device: self.device,
                inode: self.inode,
                nlink: self.nlink,
                links_left: self.links_left,
            })
        }
    }
}

/// Groups a package's file entries into hard-link sets by `(device, inode)`,
/// skipping singletons (`nlink <= 1`, which are ordinary files with no
/// links to track).
#[derive(Debug, Default)]
pub struct HardLinkSetTracker {
    sets: HashMap<(u64, u64), HardLinkSet>,
}

impl HardLinkSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file entry. Returns `None` for ordinary files (`nlink <= 1`);
    /// otherwise returns the current state of its set after this member was
    /// recorded.
    pub fn observe(
        &mut self,
        file_index: usize,
        device: u64,
        inode: u64,
        nlink: u32,
        suffix: Option<String>,
    ) -> Option<&HardLinkSet> {
        if nlink <= 1 {
            return None;
        }
        let set = self
            .sets
            .entry((device, inode))
            .or_insert_with(|| HardLinkSet::new(device, inode, nlink));
        set.add_member(file_index, suffix);
        Some(set)
    }

    /// Close every tracked set, collecting every `MissingHardlink` rather
    /// than stopping at the first.
    pub fn finish_all(&self) -> Result<(), Vec<HardLinkSetError>> {
        let errs: Vec<HardLinkSetError> = self
            .sets
            .values()
            .filter_map(|s| s.finish().err())
            .collect();
        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }

    pub fn incomplete_sets(&self) -> impl Iterator<Item = &HardLinkSet> {
        self.sets.values().filter(|s| !s.is_complete())
    }
}
