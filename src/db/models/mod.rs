// src/db/models/mod.rs

//! Data models for Conary database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod changeset;
mod dependency;
mod file_entry;
mod flavor;
mod label;
mod provenance;
mod provide_entry;
mod trove;

pub use changeset::{Changeset, ChangesetStatus};
pub use dependency::DependencyEntry;
pub use file_entry::FileEntry;
pub use flavor::Flavor;
pub use label::{LabelEntry, LabelPathEntry, add_to_path, get_label_path, remove_from_path};
pub use provenance::Provenance;
pub use provide_entry::ProvideEntry;
pub use trove::{InstallReason, InstallSource, Trove, TroveType};
