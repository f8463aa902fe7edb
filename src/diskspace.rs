// src/diskspace.rs

//! Disk-space accounting across mounted filesystems touched by a
//! transaction.
//!
//! Mounted filesystems are enumerated once per transaction (first call to
//! `DiskSpaceTracker::new`) by walking `/proc/mounts` and running `statvfs`
//! on each mount point, mirroring the style of `transaction::planner`'s
//! filesystem walks. Every file the transaction plans to create or replace
//! debits the owning mount's free-block and free-inode counters by one
//! adjusted block count and one inode; a negative running balance raises a
//! `DISKSPACE`/`DISKNODES` problem unless the caller's filter waives it.

use crate::problem::{Problem, ProblemKind};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-mount accounting state.
#[derive(Debug, Clone)]
pub struct MountUsage {
    pub mount_point: PathBuf,
    pub block_size: u64,
    pub free_blocks: i64,
    pub free_inodes: i64,
}

/// Adds a 5% margin to a byte count and converts it to a block count for the
/// given filesystem block size: `ceil(bytes * 21 / 20 / blksize)`.
pub fn adj_fs_blocks(bytes: u64, blksize: u64) -> u64 {
    if blksize == 0 {
        return 0;
    }
    let padded = bytes.saturating_mul(21) / 20;
    (padded + blksize - 1) / blksize
}

/// Tracks disk-space balances across every mounted filesystem a transaction
/// touches.
pub struct DiskSpaceTracker {
    mounts: Vec<MountUsage>,
}

impl DiskSpaceTracker {
    /// Enumerate mounted filesystems and snapshot their current free space.
    pub fn new() -> Self {
        let mounts = Self::enumerate_mounts();
        Self { mounts }
    }

    #[cfg(target_os = "linux")]
    fn enumerate_mounts() -> Vec<MountUsage> {
        let contents = match fs::read_to_string("/proc/mounts") {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut mounts = Vec::new();
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let _device = fields.next();
            let mount_point = match fields.next() {
                Some(m) => m,
                None => continue,
            };

            if let Some(usage) = Self::statvfs_usage(Path::new(mount_point)) {
                mounts.push(usage);
            }
        }
        mounts
    }

    #[cfg(not(target_os = "linux"))]
    fn enumerate_mounts() -> Vec<MountUsage> {
        Vec::new()
    }

    #[cfg(unix)]
    fn statvfs_usage(mount_point: &Path) -> Option<MountUsage> {
        let stat = nix::sys::statvfs::statvfs(mount_point).ok()?;
        Some(MountUsage {
            mount_point: mount_point.to_path_buf(),
            block_size: stat.fragment_size().max(1),
            free_blocks: stat.blocks_available() as i64,
            free_inodes: stat.files_available() as i64,
        })
    }

    #[cfg(not(unix))]
    fn statvfs_usage(_mount_point: &Path) -> Option<MountUsage> {
        None
    }

    /// Find the mount owning `path` — the longest mount-point prefix match.
    fn mount_for<'a>(&'a mut self, path: &Path) -> Option<&'a mut MountUsage> {
        let mut best: Option<usize> = None;
        let mut best_len = 0usize;
        for (i, m) in self.mounts.iter().enumerate() {
            if path.starts_with(&m.mount_point) {
                let len = m.mount_point.as_os_str().len();
                if len >= best_len {
                    best_len = len;
                    best = Some(i);
                }
            }
        }
        best.map(move |i| &mut self.mounts[i])
    }

    /// Debit one file of `size` bytes against the mount owning `path`.
    /// Returns the mount point debited, if any was found (a path outside all
    /// known mounts is silently skipped, same as the original's behavior of
    /// only tracking mounts it could `statvfs`).
    pub fn debit_file(&mut self, path: &Path, size: u64) -> Option<PathBuf> {
        let mount = self.mount_for(path)?;
        let blocks = adj_fs_blocks(size, mount.block_size) as i64;
        mount.free_blocks -= blocks;
        mount.free_inodes -= 1;
        Some(mount.mount_point.clone())
    }

    /// Emit DISKSPACE/DISKNODES problems for every mount whose balance has
    /// gone negative.
    pub fn problems(&self, package_nevr: &str) -> Vec<Problem> {
        let mut problems = Vec::new();
        for mount in &self.mounts {
            if mount.free_blocks < 0 {
                let deficit_bytes = (-mount.free_blocks) as u64 * mount.block_size;
                problems.push(
                    Problem::new(ProblemKind::DiskSpace, package_nevr)
                        .with_str(mount.mount_point.display().to_string())
                        .with_num(deficit_bytes),
                );
            }
            if mount.free_inodes < 0 {
                problems.push(
                    Problem::new(ProblemKind::DiskNodes, package_nevr)
                        .with_str(mount.mount_point.display().to_string())
                        .with_num((-mount.free_inodes) as u64),
                );
            }
        }
        problems
    }

    pub fn mounts(&self) -> &[MountUsage] {
        &self.mounts
    }
}

impl Default for DiskSpaceTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of debited usage per mount, keyed by mount point, for callers
/// that want to report totals without holding the tracker.
pub fn usage_summary(tracker: &DiskSpaceTracker) -> HashMap<PathBuf, (i64, i64)> {
    tracker
        .mounts()
        .iter()
        .map(|m| (m.mount_point.clone(), (m.free_blocks, m.free_inodes)))
        .collect()
}
