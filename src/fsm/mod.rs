// src/fsm/mod.rs

//! File State Machine: drives a single package's files through install or
//! erase, one file at a time, with crash-safe suffix discipline and
//! hard-link-set closure.
//!
//! Grounded on `filesystem::deployer` for path-safety and materialization
//! primitives and on `transaction::mod`'s phase-enum shape for the overall
//! stage progression; this module owns the per-file stage loop those two
//! already approximate piecemeal (backup/stage/apply) but don't name
//! explicitly.

mod hardlink;
mod suffix;

pub use hardlink::{HardLinkSet, HardLinkSetError, HardLinkSetTracker};
pub use suffix::{suffix_for, SuffixReason};

use crate::error::{Error, Result};
use crate::filesystem::FileDeployer;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// FSM stage. The high-level stages (`PKGINSTALL`..`VERIFY`) are the ones
/// the engine actually transitions through; the lower-level ones
/// (`Unlink`..`Chroot`, `NEXT`..`WCLOSE`) name individual syscall-level
/// actions taken within `Process`/`Fini` for diagnostics and crash-recovery
/// log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsmStage {
    Unknown,
    PkgInstall,
    PkgErase,
    PkgBuild,
    PkgCommit,
    PkgUndo,
    Create,
    Init,
    Map,
    MkDirs,
    RmDirs,
    Pre,
    Process,
    Post,
    MkLinks,
    Notify,
    Undo,
    Fini,
    Commit,
    Destroy,
    Verify,
    Unlink,
    Rename,
    Mkdir,
    Rmdir,
    Lsetfcon,
    Chown,
    Lchown,
    Chmod,
    Utime,
    Symlink,
    Link,
    Mkfifo,
    Mknod,
    Lstat,
    Stat,
    Readlink,
    Chroot,
    Next,
    Eat,
    Pos,
    Pad,
    Trailer,
    HRead,
    HWrite,
    DRead,
    DWrite,
    ROpen,
    Read,
    RClose,
    WOpen,
    Write,
    WClose,
}

/// What a given file entry should do in this transaction, per the original
/// action taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileAction {
    Unknown,
    Create,
    CopyIn,
    CopyOut,
    Backup,
    Save,
    AltName,
    Erase,
    Skip,
    SkipNState,
    SkipNetShared,
    SkipColor,
}

impl FileAction {
    /// Actions that require no filesystem work at all.
    pub fn is_noop(self) -> bool {
        matches!(
            self,
            FileAction::Skip
                | FileAction::SkipNState
                | FileAction::SkipNetShared
                | FileAction::SkipColor
        )
    }
}

/// One file entry driven through the FSM.
#[derive(Debug, Clone)]
pub struct FsmFileEntry {
    pub path: std::path::PathBuf,
    pub action: FileAction,
    pub mode: u32,
    pub hash: Option<String>,
    pub symlink_target: Option<String>,
    pub security_context: Option<String>,
    pub device: u64,
    pub inode: u64,
    pub nlink: u32,
}

/// Per-transaction FSM configuration, mirroring the subset of environment
/// flags that change file-level behavior (`NOCONTEXTS`, `NOFDIGESTS`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FsmConfig {
    pub no_contexts: bool,
    pub no_fdigests: bool,
}

/// Hook point for applying a file's security context. Platforms without a
/// security-context backend get the no-op default so the rest of the FSM
/// never special-cases platform.
pub trait SecurityContextApplier: Send + Sync {
    fn apply(&self, path: &Path, context: &str) -> Result<()>;
}

pub struct NoopSecurityContextApplier;
impl SecurityContextApplier for NoopSecurityContextApplier {
    fn apply(&self, _path: &Path, _context: &str) -> Result<()> {
        Ok(())
    }
}

/// Drives one package's file set through install or erase.
pub struct Fsm<'a> {
    deployer: &'a FileDeployer,
    config: FsmConfig,
    context_applier: Box<dyn SecurityContextApplier>,
}

impl<'a> Fsm<'a> {
    pub fn new(deployer: &'a FileDeployer, config: FsmConfig) -> Self {
        Self {
            deployer,
            config,
            context_applier: Box::new(NoopSecurityContextApplier),
        }
    }

    pub fn with_context_applier(mut self, applier: Box<dyn SecurityContextApplier>) -> Self {
        self.context_applier = applier;
        self
    }

    /// PKGINSTALL: drive every entry through INIT -> PROCESS -> NOTIFY,
    /// running FINI/COMMIT once the whole set has landed, or UNDO on the
    /// first failure (leaving already-committed entries from prior
    /// transactions untouched — only this package's in-flight files roll
    /// back). Entries sharing `(device, inode)` are grouped into hard-link
    /// sets first: only the creator gets its content materialized, every
    /// other member is linked to it, and the whole install fails if any
    /// set never closes (MISSING_HARDLINK).
    pub fn install(&self, entries: &[FsmFileEntry]) -> Result<usize> {
        let mut tracker = HardLinkSetTracker::new();
        let mut creator_of: HashMap<usize, usize> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            if entry.nlink > 1 {
                if let Some(set) =
                    tracker.observe(i, entry.device, entry.inode, entry.nlink, None)
                {
                    if let Some(creator) = set.creator_index {
                        creator_of.insert(i, creator);
                    }
                }
            }
        }

        let mut committed = 0;
        for (i, entry) in entries.iter().enumerate() {
            let result = match creator_of.get(&i).copied().filter(|&c| c != i) {
                Some(creator) => self.process_hardlink_member(entry, &entries[creator]),
                None => self.process_install_entry(entry),
            };
            match result {
                Ok(()) => committed += 1,
                Err(e) => {
                    self.undo_install(&entries[..committed])?;
                    return Err(e);
                }
            }
        }

        if let Err(errs) = tracker.finish_all() {
            self.undo_install(&entries[..committed])?;
            return Err(Error::Fsm(format!(
                "MISSING_HARDLINK: {} hard-link set(s) never closed: {}",
                errs.len(),
                errs.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            )));
        }

        Ok(committed)
    }

    /// Link a non-creator member of a hard-link set to its creator's
    /// already-materialized content rather than deploying its own copy.
    fn process_hardlink_member(&self, entry: &FsmFileEntry, creator: &FsmFileEntry) -> Result<()> {
        if entry.action.is_noop() {
            return Ok(());
        }
        let creator_path = self
            .deployer
            .resolve_path(&creator.path.to_string_lossy())?;
        let link_path = self.deployer.resolve_path(&entry.path.to_string_lossy())?;
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if link_path.exists() {
            fs::remove_file(&link_path)?;
        }
        fs::hard_link(&creator_path, &link_path)?;

        if !self.config.no_contexts {
            if let Some(ref ctx) = entry.security_context {
                self.context_applier.apply(&entry.path, ctx)?;
            }
        }
        Ok(())
    }

    fn process_install_entry(&self, entry: &FsmFileEntry) -> Result<()> {
        if entry.action.is_noop() {
            return Ok(());
        }

        let suffix = suffix_for(SuffixReason::Install(entry.action));
        let path = entry.path.to_string_lossy();

        match entry.action {
            FileAction::Create | FileAction::AltName | FileAction::Save => {
                if let Some(ref target) = entry.symlink_target {
                    self.deployer.deploy_symlink(&path, target)?;
                } else {
                    let hash = entry.hash.as_deref().ok_or_else(|| {
                        Error::Fsm(format!("{}: CREATE with no content hash", entry.path.display()))
                    })?;
                    self.deployer.deploy_file(&path, hash, entry.mode)?;
                }
                let _ = suffix;
            }
            FileAction::Backup => {
                // Existing on-disk file is config and differs: caller has
                // already renamed it aside to `.rpmorig`/`.rpmsave` before
                // calling install (suffix discipline lives in the planner,
                // which has the old file's content to diff); this entry
                // just materializes the new file.
                if let Some(hash) = entry.hash.as_deref() {
                    self.deployer.deploy_file(&path, hash, entry.mode)?;
                }
            }
            FileAction::CopyIn | FileAction::CopyOut => {
                if let Some(hash) = entry.hash.as_deref() {
                    self.deployer.deploy_file(&path, hash, entry.mode)?;
                }
            }
            FileAction::Erase => {
                self.deployer.remove_file(&path)?;
            }
            FileAction::Unknown => {
                return Err(Error::Fsm(format!(
                    "{}: UNMAPPED_FILE",
                    entry.path.display()
                )));
            }
            _ => {}
        }

        if !self.config.no_contexts {
            if let Some(ref ctx) = entry.security_context {
                self.context_applier.apply(&entry.path, ctx)?;
            }
        }

        Ok(())
    }

    fn undo_install(&self, committed: &[FsmFileEntry]) -> Result<()> {
        for entry in committed.iter().rev() {
            if entry.action.is_noop() {
                continue;
            }
            let _ = self.deployer.remove_file(&entry.path.to_string_lossy());
        }
        Ok(())
    }

    /// PKGERASE: remove every entry's file, de-escalating setuid/setgid
    /// permissions before unlink so a world-writable setuid binary can't be
    /// raced during removal.
    pub fn erase(&self, entries: &[FsmFileEntry]) -> Result<usize> {
        let mut removed = 0;
        for entry in entries {
            if entry.action.is_noop() {
                continue;
            }
            let path = entry.path.to_string_lossy();
            if let Ok(resolved) = self.deployer.resolve_path(&path) {
                strip_setid_if_needed(&resolved, entry.mode)?;
            }
            self.deployer.remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// If `mode` has the setuid or setgid bit set, chmod the live file to clear
/// them (`mode & 0o777`) before it's unlinked or renamed out from under its
/// path, so no window exists where a privileged bit sits on a file about to
/// disappear.
pub fn strip_setid_if_needed(path: &Path, mode: u32) -> Result<()> {
    if mode & 0o6000 != 0 && path.exists() {
        let perms = fs::Permissions::from_mode(mode & 0o777);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}
