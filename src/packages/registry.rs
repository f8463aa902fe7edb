// src/packages/registry.rs

//! RPM package format detection.

use crate::error::{Error, Result};
use crate::packages::rpm;
use crate::packages::traits::PackageFormat;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Supported package formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormatType {
    Rpm,
}

impl PackageFormatType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
        }
    }
}

/// Detect the format of a package file.
///
/// Uses magic bytes first, falling back to the `.rpm` extension.
pub fn detect_format(path: impl AsRef<Path>) -> Result<PackageFormatType> {
    let path = path.as_ref();

    if let Ok(mut file) = File::open(path) {
        let mut magic = [0u8; 4];
        if let Ok(n) = file.read(&mut magic) {
            if n >= 4 && magic == [0xED, 0xAB, 0xEE, 0xDB] {
                return Ok(PackageFormatType::Rpm);
            }
        }
    }

    let path_str = path.to_string_lossy().to_lowercase();
    if path_str.ends_with(".rpm") {
        Ok(PackageFormatType::Rpm)
    } else {
        Err(Error::InitError(format!(
            "Unknown package format for file: {}",
            path.display()
        )))
    }
}

/// Parse a package file into a boxed PackageFormat implementation
pub fn parse_package(path: impl AsRef<Path>) -> Result<Box<dyn PackageFormat + Send>> {
    let path = path.as_ref();
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::InitError("Package path contains invalid UTF-8".to_string()))?;

    match detect_format(path)? {
        PackageFormatType::Rpm => Ok(Box::new(rpm::RpmPackage::parse(path_str)?)),
    }
}
