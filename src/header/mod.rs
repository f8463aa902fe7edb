// src/header/mod.rs

//! Typed tag -> value dictionary for package metadata, with a `sprintf`-style
//! format-string evaluator.
//!
//! Shape follows `db/models.rs`'s row<->struct discipline (typed getters,
//! explicit serialize/load) and `hash::HashAlgorithm`'s enum-with-methods
//! style. A `Header` owns an in-memory map that may be built up out of
//! order; `serialize` always emits tags in ascending tag-id order so the
//! on-disk form is contiguous even when `load` of that same form re-inserts
//! tags in a different order than they were originally `put`.

mod sprintf;
mod tags;

pub use sprintf::{Extension, ExtensionRegistry};
pub use tags::{TagId, WellKnownTag};

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// A single tag's typed value. One type per tag: a tag is never re-put with
/// a different variant without first `del`-ing it.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    String(String),
    StringArray(Vec<String>),
    Binary(Vec<u8>),
}

impl TagValue {
    fn type_code(&self) -> u8 {
        match self {
            TagValue::Int32(_) => 1,
            TagValue::Int64(_) => 2,
            TagValue::String(_) => 3,
            TagValue::StringArray(_) => 4,
            TagValue::Binary(_) => 5,
        }
    }

    /// Array length, for tags whose invariant requires matching another
    /// tag's count (e.g. a per-file tag against the file count tag).
    pub fn count(&self) -> usize {
        match self {
            TagValue::Int32(v) => v.len(),
            TagValue::Int64(v) => v.len(),
            TagValue::String(_) => 1,
            TagValue::StringArray(v) => v.len(),
            TagValue::Binary(v) => v.len(),
        }
    }
}

/// A header: a typed tag -> value dictionary.
///
/// Invariants enforced by `put`:
/// - one value type per tag (re-putting a tag with a different variant
///   without an intervening `del` is an error, matching the "one type per
///   tag" rule)
/// - `serialize` followed by `load` round-trips every tag exactly
#[derive(Debug, Clone, Default)]
pub struct Header {
    tags: BTreeMap<TagId, TagValue>,
}

impl Header {
    pub fn new() -> Self {
        Self {
            tags: BTreeMap::new(),
        }
    }

    /// Fetch a tag's value.
    pub fn get(&self, tag: TagId) -> Option<&TagValue> {
        self.tags.get(&tag)
    }

    /// Insert or replace a tag's value. Replacing an existing tag with a
    /// value of a different type is rejected, matching the "one type per
    /// tag" header invariant.
    pub fn put(&mut self, tag: TagId, value: TagValue) -> Result<()> {
        if let Some(existing) = self.tags.get(&tag) {
            if existing.type_code() != value.type_code() {
                return Err(Error::Header(format!(
                    "tag {:?} already holds a different value type",
                    tag
                )));
            }
        }
        self.tags.insert(tag, value);
        Ok(())
    }

    /// Remove a tag, if present.
    pub fn del(&mut self, tag: TagId) -> Option<TagValue> {
        self.tags.remove(&tag)
    }

    /// Iterate tags in ascending tag-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&TagId, &TagValue)> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Register a runtime tag name outside the static tag table, hashing it
    /// into a reserved high band so it can never collide with a well-known
    /// tag number.
    pub fn register_tag(name: &str) -> TagId {
        tags::register_runtime_tag(name)
    }

    /// Serialize to the contiguous on-disk wire format: an 8-byte
    /// magic+version, a 4-byte index-entry count, a 4-byte data-section
    /// length, that many 16-byte index entries (tag, type, data offset,
    /// count), then the packed data section itself.
    pub fn serialize(&self) -> Vec<u8> {
        let mut index = Vec::with_capacity(self.tags.len());
        let mut data = Vec::new();

        for (tag, value) in &self.tags {
            let offset = data.len() as u32;
            write_value(&mut data, value);
            index.push((*tag, value.type_code(), offset, value.count() as u32));
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"CNHDR\0\x03\0");
        out.extend_from_slice(&(index.len() as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        for (tag, type_code, offset, count) in &index {
            out.extend_from_slice(&tag.0.to_be_bytes());
            out.extend_from_slice(&[*type_code]);
            out.extend_from_slice(&[0u8; 3]); // padding to keep entries 16 bytes
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        out.extend_from_slice(&data);
        out
    }

    /// Load a header previously produced by `serialize`.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 || &bytes[0..8] != b"CNHDR\0\x03\0" {
            return Err(Error::Header("bad header magic".to_string()));
        }

        let n = u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let data_len = u32::from_be_bytes(bytes[12..16].try_into().unwrap()) as usize;

        let index_start = 16;
        let index_len = n * 16;
        let data_start = index_start + index_len;

        if bytes.len() < data_start + data_len {
            return Err(Error::Header("header truncated".to_string()));
        }

        let data = &bytes[data_start..data_start + data_len];
        let mut header = Header::new();

        for i in 0..n {
            let entry = &bytes[index_start + i * 16..index_start + (i + 1) * 16];
            let tag = TagId(u32::from_be_bytes(entry[0..4].try_into().unwrap()));
            let type_code = entry[4];
            let offset = u32::from_be_bytes(entry[8..12].try_into().unwrap()) as usize;
            let count = u32::from_be_bytes(entry[12..16].try_into().unwrap()) as usize;

            let value = read_value(data, type_code, offset, count)?;
            header.tags.insert(tag, value);
        }

        Ok(header)
    }

    /// Evaluate an `sprintf`-style format string against this header, with
    /// an extension registry supplying computed tags (e.g. "sha1hdr",
    /// "installpath") that aren't stored directly in the tag table.
    pub fn sprintf(&self, fmt: &str, extensions: &ExtensionRegistry) -> Result<String> {
        sprintf::evaluate(self, fmt, extensions)
    }
}

fn write_value(data: &mut Vec<u8>, value: &TagValue) {
    match value {
        TagValue::Int32(v) => {
            for n in v {
                data.extend_from_slice(&n.to_be_bytes());
            }
        }
        TagValue::Int64(v) => {
            for n in v {
                data.extend_from_slice(&n.to_be_bytes());
            }
        }
        TagValue::String(s) => {
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        TagValue::StringArray(arr) => {
            for s in arr {
                data.extend_from_slice(s.as_bytes());
                data.push(0);
            }
        }
        TagValue::Binary(b) => data.extend_from_slice(b),
    }
}

fn read_value(data: &[u8], type_code: u8, offset: usize, count: usize) -> Result<TagValue> {
    match type_code {
        1 => {
            let mut v = Vec::with_capacity(count);
            for i in 0..count {
                let start = offset + i * 4;
                let bytes = data
                    .get(start..start + 4)
                    .ok_or_else(|| Error::Header("int32 tag truncated".to_string()))?;
                v.push(i32::from_be_bytes(bytes.try_into().unwrap()));
            }
            Ok(TagValue::Int32(v))
        }
        2 => {
            let mut v = Vec::with_capacity(count);
            for i in 0..count {
                let start = offset + i * 8;
                let bytes = data
                    .get(start..start + 8)
                    .ok_or_else(|| Error::Header("int64 tag truncated".to_string()))?;
                v.push(i64::from_be_bytes(bytes.try_into().unwrap()));
            }
            Ok(TagValue::Int64(v))
        }
        3 => {
            let rest = data
                .get(offset..)
                .ok_or_else(|| Error::Header("string tag truncated".to_string()))?;
            let end = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::Header("unterminated string tag".to_string()))?;
            let s = String::from_utf8_lossy(&rest[..end]).into_owned();
            Ok(TagValue::String(s))
        }
        4 => {
            let mut arr = Vec::with_capacity(count);
            let mut cursor = offset;
            for _ in 0..count {
                let rest = data
                    .get(cursor..)
                    .ok_or_else(|| Error::Header("string array tag truncated".to_string()))?;
                let end = rest
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| Error::Header("unterminated string in array tag".to_string()))?;
                arr.push(String::from_utf8_lossy(&rest[..end]).into_owned());
                cursor += end + 1;
            }
            Ok(TagValue::StringArray(arr))
        }
        5 => {
            let bytes = data
                .get(offset..offset + count)
                .ok_or_else(|| Error::Header("binary tag truncated".to_string()))?;
            Ok(TagValue::Binary(bytes.to_vec()))
        }
        other => Err(Error::Header(format!("unknown tag type code {}", other))),
    }
}
