// src/header/tags.rs

//! Static tag-name <-> tag-number table plus a runtime arbitrary-tag band.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// A tag number. Values below `RUNTIME_TAG_BAND_START` are the static,
/// well-known table; values at or above it were registered at runtime via
/// `Header::register_tag` and never appear in the static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub u32);

/// Start of the reserved band for runtime-registered tag names.
pub const RUNTIME_TAG_BAND_START: u32 = 1_000_000;

/// The static, well-known tags a header commonly carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownTag {
    Name,
    Version,
    Release,
    Epoch,
    Arch,
    Os,
    Summary,
    Description,
    BaseNames,
    DirNames,
    DirIndexes,
    FileSizes,
    FileModes,
    FileMTimes,
    FileDigests,
    FileLinkTos,
    FileFlags,
    FileUserName,
    FileGroupName,
    ProvideName,
    ProvideVersion,
    ProvideFlags,
    RequireName,
    RequireVersion,
    RequireFlags,
    ConflictName,
    ObsoleteName,
    PayloadFormat,
    PayloadCompressor,
}

impl WellKnownTag {
    pub fn id(self) -> TagId {
        // Static, stable numbering. Never renumbered once shipped: a
        // header's on-disk tag numbers outlive any given build of this
        // crate.
        TagId(match self {
            WellKnownTag::Name => 1000,
            WellKnownTag::Version => 1001,
            WellKnownTag::Release => 1002,
            WellKnownTag::Epoch => 1003,
            WellKnownTag::Arch => 1022,
            WellKnownTag::Os => 1021,
            WellKnownTag::Summary => 1004,
            WellKnownTag::Description => 1005,
            WellKnownTag::BaseNames => 1117,
            WellKnownTag::DirNames => 1118,
            WellKnownTag::DirIndexes => 1116,
            WellKnownTag::FileSizes => 1028,
            WellKnownTag::FileModes => 1030,
            WellKnownTag::FileMTimes => 1034,
            WellKnownTag::FileDigests => 1035,
            WellKnownTag::FileLinkTos => 1036,
            WellKnownTag::FileFlags => 1037,
            WellKnownTag::FileUserName => 1039,
            WellKnownTag::FileGroupName => 1040,
            WellKnownTag::ProvideName => 1047,
            WellKnownTag::ProvideVersion => 1113,
            WellKnownTag::ProvideFlags => 1112,
            WellKnownTag::RequireName => 1049,
            WellKnownTag::RequireVersion => 1050,
            WellKnownTag::RequireFlags => 1048,
            WellKnownTag::ConflictName => 1054,
            WellKnownTag::ObsoleteName => 1090,
            WellKnownTag::PayloadFormat => 1124,
            WellKnownTag::PayloadCompressor => 1125,
        })
    }
}

fn runtime_registry() -> &'static Mutex<HashMap<String, TagId>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, TagId>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Assigns (or returns the existing) tag id for an arbitrary runtime tag
/// name, hashed into the reserved high band. Stable for the lifetime of the
/// process: the same name always maps to the same id once first registered.
pub fn register_runtime_tag(name: &str) -> TagId {
    let mut registry = runtime_registry().lock().unwrap();
    if let Some(&id) = registry.get(name) {
        return id;
    }

    let next = RUNTIME_TAG_BAND_START + registry.len() as u32;
    let id = TagId(next);
    registry.insert(name.to_string(), id);
    id
}
