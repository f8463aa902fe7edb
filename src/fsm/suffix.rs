// src/fsm/suffix.rs

//! Suffix discipline: which of the pre-existing file, the incoming file, or
//! neither gets a `.rpmsave`/`.rpmorig`/`.rpmnew` rename (or a working
//! `;tid` suffix while the new content is being materialized) for a given
//! file action.

use super::FileAction;

/// Which install/erase context an action is being evaluated in — the same
/// `FileAction` means a different suffix decision depending on whether it's
/// driving an install or an erase (BACKUP during install preserves the old
/// config as `.rpmorig`; BACKUP during erase preserves it as `.rpmsave`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixReason {
    Install(FileAction),
    Erase(FileAction),
}

/// Suffix decision for one file action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuffixDecision {
    /// Suffix applied to the file already on disk before the new one lands.
    pub existing_suffix: Option<&'static str>,
    /// Suffix applied to the incoming file instead of landing at the bare
    /// path (e.g. `.rpmnew` for ALTNAME).
    pub new_suffix: Option<&'static str>,
    /// Working suffix (`;tid`) used for the temp file while it's being
    /// written, stripped off by a final rename once content is on disk.
    pub working_suffix: Option<&'static str>,
}

/// Look up the suffix discipline for one file action in its install/erase
/// context.
pub fn suffix_for(reason: SuffixReason) -> SuffixDecision {
    match reason {
        SuffixReason::Install(FileAction::Create) => SuffixDecision {
            working_suffix: Some(";tid"),
            ..Default::default()
        },
        SuffixReason::Install(FileAction::Backup) => SuffixDecision {
            existing_suffix: Some(".rpmorig"),
            working_suffix: Some(";tid"),
            ..Default::default()
        },
        SuffixReason::Erase(FileAction::Backup) => SuffixDecision {
            existing_suffix: Some(".rpmsave"),
            ..Default::default()
        },
        SuffixReason::Install(FileAction::AltName) => SuffixDecision {
            new_suffix: Some(".rpmnew"),
            working_suffix: Some(";tid"),
            ..Default::default()
        },
        SuffixReason::Install(FileAction::Save) | SuffixReason::Erase(FileAction::Save) => {
            SuffixDecision {
                existing_suffix: Some(".rpmsave"),
                working_suffix: Some(";tid"),
                ..Default::default()
            }
        }
        SuffixReason::Install(a) | SuffixReason::Erase(a) if a.is_noop() => {
            SuffixDecision::default()
        }
        SuffixReason::Erase(FileAction::Erase) => SuffixDecision::default(),
        _ => SuffixDecision::default(),
    }
}
