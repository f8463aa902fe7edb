// src/lib.rs

//! Conary Package Manager
//!
//! Transaction engine core: header/tag store, archive codec layer, file
//! state machine, dependency solver, and install ordering, backed by a
//! SQLite record store.
//!
//! # Architecture
//!
//! - Database-first: all installed-package state lives in SQLite
//! - Headers: tag-keyed package metadata (name, version, file manifest,
//!   requires/provides)
//! - Troves: record-store rows for installed packages
//! - File-level tracking: SHA-256 hashes via a content-addressed store

pub mod archive;
pub mod compression;
pub mod db;
pub mod diskspace;
mod error;
pub mod filesystem;
pub mod flavor;
pub mod fsm;
pub mod hash;
pub mod header;
pub mod label;
pub mod packages;
pub mod problem;
pub mod progress;
pub mod resolver;
pub mod transaction;
pub mod version;

pub use archive::{ArchiveDialect, ArchiveEntry, ArchiveReader, ArchiveWriter};
pub use diskspace::{adj_fs_blocks, DiskSpaceTracker, MountUsage};
pub use error::{Error, Result};
pub use fsm::{FileAction, Fsm, FsmConfig, FsmStage};
pub use header::{Header, TagId, TagValue, WellKnownTag};
pub use problem::{Problem, ProblemFilter, ProblemKind};
pub use flavor::{ArchSpec, FlavorItem, FlavorOp, FlavorSpec, SystemFlavor};
pub use hash::{Hash, HashAlgorithm, Hasher};
pub use label::{Label, LabelParseError, LabelPath};
pub use progress::{
    CallbackProgress, LogProgress, MultiProgress, ProgressEvent, ProgressStyle, ProgressTracker,
    SilentProgress,
};
pub use resolver::{
    check_requires, order_elements, provides_of, requires_of, Capability, ElementEdge,
    ElementKind, OrderResult, TransactionElement,
};
pub use transaction::{
    AddedElement, ErasedElement, RecoveryOutcome, Transaction, TransactionConfig,
    TransactionEngine, TransactionPlan, TransactionState,
};
