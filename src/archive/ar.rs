// src/archive/ar.rs

//! SVR4 `ar` dialect, backed by the `ar` crate: "!<arch>\n" global magic,
//! 60-byte fixed ASCII per-member headers, 2-byte alignment, and the "//"
//! long-name member for names over 16 bytes — all handled by the crate;
//! this wrapper adapts it to the dialect-uniform reader/writer pair.

use super::{hdr_size, ArchiveDialect, ArchiveEntry, ArchiveReader, ArchiveWriter};
use crate::error::Result;
use std::io::{Read, Write};

pub struct ArArchiveReader<R: Read> {
    inner: ::ar::Archive<R>,
}

impl<R: Read> ArArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: ::ar::Archive::new(reader),
        }
    }
}

impl<R: Read> ArchiveReader for ArArchiveReader<R> {
    fn next_entry(&mut self) -> Result<Option<(ArchiveEntry, Vec<u8>)>> {
        match self.inner.next_entry() {
            None => Ok(None),
            Some(Ok(mut entry)) => {
                let name = String::from_utf8_lossy(entry.header().identifier()).into_owned();
                let header = entry.header().clone();
                let mut content = Vec::with_capacity(header.size() as usize);
                entry.read_to_end(&mut content)?;

                Ok(Some((
                    ArchiveEntry {
                        name,
                        size: header.size(),
                        mode: header.mode(),
                        mtime: header.mtime(),
                        uid: header.uid(),
                        gid: header.gid(),
                        nlink: 1,
                    },
                    content,
                )))
            }
            Some(Err(e)) => Err(hdr_size(ArchiveDialect::Ar, e.to_string())),
        }
    }
}

pub struct ArArchiveWriter<W: Write> {
    inner: ::ar::Builder<W>,
}

impl<W: Write> ArArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: ::ar::Builder::new(writer),
        }
    }
}

impl<W: Write> ArchiveWriter for ArArchiveWriter<W> {
    fn write_entry(&mut self, entry: &ArchiveEntry, content: &[u8]) -> Result<()> {
        let mut header = ::ar::Header::new(entry.name.clone().into_bytes(), content.len() as u64);
        header.set_mode(entry.mode);
        header.set_uid(entry.uid);
        header.set_gid(entry.gid);
        header.set_mtime(entry.mtime);

        self.inner
            .append(&header, content)
            .map_err(|e| hdr_size(ArchiveDialect::Ar, e.to_string()))?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        // ar::Builder has no explicit trailer; members are already flushed
        // as they're appended, and there's no end-of-archive sentinel in
        // the SVR4 format besides EOF.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_single_entry() {
        let mut buf = Vec::new();
        {
            let mut writer = Box::new(ArArchiveWriter::new(&mut buf));
            writer
                .write_entry(&ArchiveEntry::new("data.tar.gz", 5), b"hello")
                .unwrap();
            writer.finish().unwrap();
        }

        let mut reader = ArArchiveReader::new(buf.as_slice());
        let (entry, content) = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "data.tar.gz");
        assert_eq!(content, b"hello");
        assert!(reader.next_entry().unwrap().is_none());
    }
}
