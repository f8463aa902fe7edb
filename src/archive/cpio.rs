// src/archive/cpio.rs

//! cpio "newc"/"crc" dialect: magic "070701"/"070702", a 110-byte fixed hex
//! header, NUL-terminated name padded to a 4-byte boundary, then data padded
//! to a 4-byte boundary. End of archive is the "TRAILER!!!" sentinel entry.
//!
//! Reader and writer for the dialect RPM payloads use; the reader side
//! doubles as the read-only iterator package-format callers need for
//! payload extraction.

use super::{bad_header, hdr_size, ArchiveDialect, ArchiveEntry, ArchiveReader, ArchiveWriter};
use crate::error::Result;
use std::io::{Read, Write};

const HEADER_SIZE: usize = 110;
const MAGIC_NEWC: &[u8] = b"070701";
const TRAILER_NAME: &str = "TRAILER!!!";

pub struct CpioArchiveReader<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> CpioArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, done: false }
    }

    fn read_padding(&mut self, len: usize) -> Result<()> {
        let pad = (4 - (len % 4)) % 4;
        if pad > 0 {
            let mut skip = [0u8; 3];
            self.reader.read_exact(&mut skip[..pad])?;
        }
        Ok(())
    }
}

impl<R: Read> ArchiveReader for CpioArchiveReader<R> {
    fn next_entry(&mut self) -> Result<Option<(ArchiveEntry, Vec<u8>)>> {
        if self.done {
            return Ok(None);
        }

        let mut header_buf = [0u8; HEADER_SIZE];
        if let Err(e) = self.reader.read_exact(&mut header_buf) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                self.done = true;
                return Ok(None);
            }
            return Err(e.into());
        }

        let magic = &header_buf[0..6];
        if magic != MAGIC_NEWC && magic != b"070702" {
            return Err(bad_header(
                ArchiveDialect::Cpio,
                format!("bad magic: {:?}", String::from_utf8_lossy(magic)),
            ));
        }

        let parse_hex = |start: usize, len: usize| -> Result<u32> {
            let s = std::str::from_utf8(&header_buf[start..start + len])
                .map_err(|e| hdr_size(ArchiveDialect::Cpio, e.to_string()))?;
            u32::from_str_radix(s, 16).map_err(|e| hdr_size(ArchiveDialect::Cpio, e.to_string()))
        };

        let mode = parse_hex(14, 8)?;
        let uid = parse_hex(22, 8)?;
        let gid = parse_hex(30, 8)?;
        let nlink = parse_hex(38, 8)?;
        let mtime = parse_hex(46, 8)? as u64;
        let filesize = parse_hex(54, 8)? as u64;
        let namesize = parse_hex(94, 8)? as u64;

        let mut name_buf = vec![0u8; namesize as usize];
        self.reader.read_exact(&mut name_buf)?;
        let name = if let Some(b'\0') = name_buf.last().copied() {
            String::from_utf8_lossy(&name_buf[..name_buf.len() - 1]).into_owned()
        } else {
            String::from_utf8_lossy(&name_buf).into_owned()
        };

        self.read_padding(HEADER_SIZE + namesize as usize)?;

        if name == TRAILER_NAME {
            self.done = true;
            return Ok(None);
        }

        let mut content = vec![0u8; filesize as usize];
        self.reader.read_exact(&mut content)?;
        self.read_padding(filesize as usize)?;

        Ok(Some((
            ArchiveEntry {
                name,
                size: filesize,
                mode,
                mtime,
                uid,
                gid,
                nlink,
            },
            content,
        )))
    }
}

pub struct CpioArchiveWriter<W: Write> {
    writer: W,
    written_bytes: u64,
}

impl<W: Write> CpioArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written_bytes: 0,
        }
    }

    fn write_entry_raw(&mut self, name: &str, entry: Option<&ArchiveEntry>, content: &[u8]) -> Result<()> {
        let e = entry.cloned().unwrap_or_else(|| ArchiveEntry::new(name, content.len() as u64));
        let namesize = name.len() as u64 + 1; // + NUL

        let header = format!(
            "070701{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}",
            0u32,       // inode
            e.mode,
            e.uid,
            e.gid,
            e.nlink,
            e.mtime,
            e.size,
            0u32,       // devmajor
            0u32,       // devminor
            0u32,       // rdevmajor
            0u32,       // rdevminor
            namesize,
            0u32,       // checksum (unused in newc)
        );
        debug_assert_eq!(header.len(), HEADER_SIZE);

        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(&[0u8])?;
        self.written_bytes += HEADER_SIZE as u64 + namesize;
        self.pad_to_4(HEADER_SIZE as u64 + namesize)?;

        self.writer.write_all(content)?;
        self.written_bytes += content.len() as u64;
        self.pad_to_4(content.len() as u64)?;

        Ok(())
    }

    fn pad_to_4(&mut self, len: u64) -> Result<()> {
        let pad = (4 - (len % 4)) % 4;
        if pad > 0 {
            self.writer.write_all(&[0u8; 3][..pad as usize])?;
        }
        Ok(())
    }
}

impl<W: Write> ArchiveWriter for CpioArchiveWriter<W> {
    fn write_entry(&mut self, entry: &ArchiveEntry, content: &[u8]) -> Result<()> {
        self.write_entry_raw(&entry.name, Some(entry), content)
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.write_entry_raw(TRAILER_NAME, None, &[])?;
        self.writer.flush()?;
        Ok(())
    }
}
