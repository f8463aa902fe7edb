// src/archive/tar.rs

//! ustar dialect, backed by the `tar` crate. 512-byte blocks, octal header
//! fields, GNU LongLink extension for names over 100 bytes, trailer is two
//! all-zero blocks — all handled by the crate; this wrapper only adapts it
//! to the dialect-uniform `ArchiveReader`/`ArchiveWriter` pair and translates
//! its errors into `Error::Archive`.

use super::{hdr_size, ArchiveDialect, ArchiveEntry, ArchiveReader, ArchiveWriter};
use crate::error::Result;
use std::io::{Read, Write};

pub struct TarArchiveReader<R: Read> {
    inner: ::tar::Archive<R>,
}

impl<R: Read> TarArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: ::tar::Archive::new(reader),
        }
    }
}

impl<R: Read> ArchiveReader for TarArchiveReader<R> {
    fn next_entry(&mut self) -> Result<Option<(ArchiveEntry, Vec<u8>)>> {
        let mut entries = self
            .inner
            .entries()
            .map_err(|e| hdr_size(ArchiveDialect::Tar, e.to_string()))?;

        match entries.next() {
            None => Ok(None),
            Some(Ok(mut entry)) => {
                let path = entry
                    .path()
                    .map_err(|e| hdr_size(ArchiveDialect::Tar, e.to_string()))?
                    .to_string_lossy()
                    .into_owned();
                let header = entry.header();
                let mode = header.mode().unwrap_or(0o644);
                let uid = header.uid().unwrap_or(0) as u32;
                let gid = header.gid().unwrap_or(0) as u32;
                let mtime = header.mtime().unwrap_or(0);
                let size = header.size().unwrap_or(0);

                let mut content = Vec::with_capacity(size as usize);
                entry.read_to_end(&mut content)?;

                Ok(Some((
                    ArchiveEntry {
                        name: path,
                        size,
                        mode,
                        mtime,
                        uid,
                        gid,
                        nlink: 1,
                    },
                    content,
                )))
            }
            Some(Err(e)) => Err(hdr_size(ArchiveDialect::Tar, e.to_string())),
        }
    }
}

pub struct TarArchiveWriter<W: Write> {
    inner: ::tar::Builder<W>,
}

impl<W: Write> TarArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: ::tar::Builder::new(writer),
        }
    }
}

impl<W: Write> ArchiveWriter for TarArchiveWriter<W> {
    fn write_entry(&mut self, entry: &ArchiveEntry, content: &[u8]) -> Result<()> {
        let mut header = ::tar::Header::new_ustar();
        header
            .set_path(&entry.name)
            .map_err(|e| hdr_size(ArchiveDialect::Tar, e.to_string()))?;
        header.set_size(entry.size);
        header.set_mode(entry.mode);
        header.set_uid(entry.uid as u64);
        header.set_gid(entry.gid as u64);
        header.set_mtime(entry.mtime);
        header.set_cksum();

        self.inner
            .append(&header, content)
            .map_err(|e| hdr_size(ArchiveDialect::Tar, e.to_string()))?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.inner
            .finish()
            .map_err(|e| hdr_size(ArchiveDialect::Tar, e.to_string()))
    }
}
