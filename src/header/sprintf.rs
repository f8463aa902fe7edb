// src/header/sprintf.rs

//! `sprintf(fmt, tagtable, extensions)`: a small format-string evaluator over
//! a header's tags plus a registry of computed "extension" tags that aren't
//! stored in the tag table directly (e.g. "sha1hdr", "installpath").
//!
//! Format syntax: `%{tagname}` is replaced by the named tag's value (array
//! tags join with ", "); anything else passes through literally. A name not
//! found in either the header or the extension registry is a format error,
//! not a silent blank.

use super::{Header, TagValue, WellKnownTag};
use crate::error::{Error, Result};

/// A computed tag not stored directly in a header's tag table.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;
    fn compute(&self, header: &Header) -> Option<String>;
}

/// A registry of extension tags consulted by `sprintf` when a name isn't a
/// well-known or runtime-registered header tag.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }

    pub fn register(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    fn compute(&self, name: &str, header: &Header) -> Option<String> {
        self.extensions
            .iter()
            .find(|e| e.name() == name)
            .and_then(|e| e.compute(header))
    }
}

fn well_known_by_name(name: &str) -> Option<WellKnownTag> {
    Some(match name.to_ascii_lowercase().as_str() {
        "name" => WellKnownTag::Name,
        "version" => WellKnownTag::Version,
        "release" => WellKnownTag::Release,
        "epoch" => WellKnownTag::Epoch,
        "arch" => WellKnownTag::Arch,
        "os" => WellKnownTag::Os,
        "summary" => WellKnownTag::Summary,
        "description" => WellKnownTag::Description,
        "basenames" => WellKnownTag::BaseNames,
        "dirnames" => WellKnownTag::DirNames,
        "dirindexes" => WellKnownTag::DirIndexes,
        "filesizes" => WellKnownTag::FileSizes,
        "filemodes" => WellKnownTag::FileModes,
        "filemtimes" => WellKnownTag::FileMTimes,
        "filedigests" => WellKnownTag::FileDigests,
        "filelinktos" => WellKnownTag::FileLinkTos,
        "fileflags" => WellKnownTag::FileFlags,
        "fileusername" => WellKnownTag::FileUserName,
        "filegroupname" => WellKnownTag::FileGroupName,
        "providename" => WellKnownTag::ProvideName,
        "provideversion" => WellKnownTag::ProvideVersion,
        "requirename" => WellKnownTag::RequireName,
        "requireversion" => WellKnownTag::RequireVersion,
        "conflictname" => WellKnownTag::ConflictName,
        "obsoletename" => WellKnownTag::ObsoleteName,
        "payloadformat" => WellKnownTag::PayloadFormat,
        "payloadcompressor" => WellKnownTag::PayloadCompressor,
        _ => return None,
    })
}

fn format_value(value: &TagValue) -> String {
    match value {
        TagValue::Int32(v) => v
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        TagValue::Int64(v) => v
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        TagValue::String(s) => s.clone(),
        TagValue::StringArray(v) => v.join(", "),
        TagValue::Binary(b) => hex::encode(b),
    }
}

/// Evaluate `fmt` against `header`, substituting `%{name}` placeholders.
pub fn evaluate(header: &Header, fmt: &str, extensions: &ExtensionRegistry) -> Result<String> {
    let mut out = String::with_capacity(fmt.len());
    let bytes = fmt.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            let end = fmt[i + 2..]
                .find('}')
                .ok_or_else(|| Error::Header(format!("unterminated placeholder in: {}", fmt)))?;
            let name = &fmt[i + 2..i + 2 + end];

            if let Some(tag) = well_known_by_name(name) {
                if let Some(value) = header.get(tag.id()) {
                    out.push_str(&format_value(value));
                } else if let Some(computed) = extensions.compute(name, header) {
                    out.push_str(&computed);
                } else {
                    return Err(Error::Header(format!("tag not present in header: {}", name)));
                }
            } else if let Some(computed) = extensions.compute(name, header) {
                out.push_str(&computed);
            } else {
                return Err(Error::Header(format!("unknown format tag: {}", name)));
            }

            i += 2 + end + 1;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }

    Ok(out)
}
