//! Streamed access to course archives.
//!
//! An archive is an ordered sequence of named byte blobs. [`EntrySource`]
//! yields them one at a time with a reader over the content, and
//! [`EntrySink`] appends them to a new archive. Only the entry being
//! copied is ever resident, so archives larger than memory are fine.
//!
//! The tar backend reads plain and gzip-compressed archives and writes the
//! same compression it read. Headers are re-encoded in GNU format: path,
//! link target, size, mode, ownership, whole-second mtime and device
//! numbers are carried over, other PAX records (sub-second times, extended
//! attributes) are not.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Errors reading or writing an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The input archive is unreadable or corrupt.
    #[error("Cannot read archive: {0}")]
    Read(#[source] io::Error),

    /// The output archive could not be written.
    #[error("Cannot write archive: {0}")]
    Write(#[source] io::Error),
}

impl ArchiveError {
    /// A read error for structurally invalid input.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Read(io::Error::new(io::ErrorKind::InvalidData, message.into()))
    }
}

/// What kind of filesystem object an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    HardLink,
    /// Any other tar entry type, kept by its type byte.
    Other(u8),
}

/// Entry metadata carried unchanged from input to output, apart from
/// `size` when the content is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub mtime: u64,
    pub uid: u64,
    pub gid: u64,
    pub username: Option<String>,
    pub groupname: Option<String>,
    /// Target of a symlink or hard link.
    pub link_name: Option<String>,
    /// Major and minor numbers of a device entry.
    pub device: Option<(u32, u32)>,
}

impl EntryMeta {
    /// Metadata for a regular file, as a test or a synthetic entry needs it.
    pub fn file(path: &str, size: u64) -> Self {
        Self {
            path: path.to_string(),
            kind: EntryKind::File,
            size,
            mode: 0o644,
            mtime: 0,
            uid: 0,
            gid: 0,
            username: None,
            groupname: None,
            link_name: None,
            device: None,
        }
    }
}

/// One entry of an input archive. The reader must be drained (or dropped)
/// before the next entry is requested.
pub struct ArchiveEntry<'a> {
    pub meta: EntryMeta,
    pub reader: Box<dyn Read + 'a>,
}

pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<ArchiveEntry<'a>, ArchiveError>> + 'a>;

/// An ordered container of named byte blobs that can be read once, front
/// to back.
pub trait EntrySource {
    fn entries(&mut self) -> Result<EntryIter<'_>, ArchiveError>;
}

/// An appendable container of named byte blobs.
pub trait EntrySink {
    /// Append one entry. `data` must yield exactly `meta.size` bytes.
    fn write_entry(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<(), ArchiveError>;
}

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ---------------------------------------------------------------------------
// Tar input
// ---------------------------------------------------------------------------

/// Reads entries from a tar stream.
pub struct TarSource<R: Read> {
    archive: tar::Archive<R>,
}

impl<R: Read> TarSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            archive: tar::Archive::new(reader),
        }
    }
}

impl TarSource<Box<dyn Read>> {
    /// Open an archive file, detecting gzip compression from its first bytes.
    pub fn open(path: &Path) -> Result<(Self, Compression), ArchiveError> {
        let file = File::open(path).map_err(ArchiveError::Read)?;
        let mut reader = BufReader::new(file);
        let compression = if reader
            .fill_buf()
            .map_err(ArchiveError::Read)?
            .starts_with(&GZIP_MAGIC)
        {
            Compression::Gzip
        } else {
            Compression::None
        };
        let stream: Box<dyn Read> = match compression {
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            Compression::None => Box::new(reader),
        };
        Ok((Self::new(stream), compression))
    }
}

impl<R: Read> EntrySource for TarSource<R> {
    fn entries(&mut self) -> Result<EntryIter<'_>, ArchiveError> {
        let entries = self.archive.entries().map_err(ArchiveError::Read)?;
        Ok(Box::new(entries.map(tar_entry)))
    }
}

fn tar_entry<'a, R: Read>(
    item: io::Result<tar::Entry<'a, R>>,
) -> Result<ArchiveEntry<'a>, ArchiveError> {
    let entry = item.map_err(ArchiveError::Read)?;
    let header = entry.header();

    let kind = match header.entry_type() {
        tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::File,
        tar::EntryType::Directory => EntryKind::Directory,
        tar::EntryType::Symlink => EntryKind::Symlink,
        tar::EntryType::Link => EntryKind::HardLink,
        other => EntryKind::Other(other.as_byte()),
    };
    let meta = EntryMeta {
        path: lossy(entry.path().map_err(ArchiveError::Read)?),
        kind,
        size: entry.size(),
        mode: header.mode().map_err(ArchiveError::Read)?,
        mtime: header.mtime().map_err(ArchiveError::Read)?,
        uid: header.uid().map_err(ArchiveError::Read)?,
        gid: header.gid().map_err(ArchiveError::Read)?,
        username: header.username().ok().flatten().map(str::to_string),
        groupname: header.groupname().ok().flatten().map(str::to_string),
        link_name: entry
            .link_name()
            .map_err(ArchiveError::Read)?
            .map(lossy),
        device: match kind {
            EntryKind::Other(_) => device_numbers(header),
            _ => None,
        },
    };

    Ok(ArchiveEntry {
        meta,
        reader: Box::new(entry),
    })
}

fn device_numbers(header: &tar::Header) -> Option<(u32, u32)> {
    let major = header.device_major().ok().flatten()?;
    let minor = header.device_minor().ok().flatten()?;
    Some((major, minor))
}

fn lossy(path: Cow<'_, Path>) -> String {
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Tar output
// ---------------------------------------------------------------------------

/// Byte stream under a tar builder, optionally gzip-compressed.
pub enum OutputStream<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> OutputStream<W> {
    pub fn new(inner: W, compression: Compression) -> Self {
        match compression {
            Compression::None => Self::Plain(inner),
            Compression::Gzip => Self::Gzip(GzEncoder::new(inner, flate2::Compression::default())),
        }
    }

    /// Write any compression trailer and return the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(inner) => Ok(inner),
            Self::Gzip(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for OutputStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Appends entries to a tar stream.
pub struct TarSink<W: Write> {
    builder: tar::Builder<W>,
}

impl<W: Write> TarSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            builder: tar::Builder::new(writer),
        }
    }

    /// Write the end-of-archive marker and return the writer.
    pub fn finish(self) -> Result<W, ArchiveError> {
        self.builder.into_inner().map_err(ArchiveError::Write)
    }
}

impl<W: Write> EntrySink for TarSink<W> {
    fn write_entry(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<(), ArchiveError> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(match meta.kind {
            EntryKind::File => tar::EntryType::Regular,
            EntryKind::Directory => tar::EntryType::Directory,
            EntryKind::Symlink => tar::EntryType::Symlink,
            EntryKind::HardLink => tar::EntryType::Link,
            EntryKind::Other(byte) => tar::EntryType::new(byte),
        });
        header.set_mode(meta.mode);
        header.set_mtime(meta.mtime);
        header.set_uid(meta.uid);
        header.set_gid(meta.gid);
        if let Some(username) = &meta.username {
            header.set_username(username).map_err(ArchiveError::Write)?;
        }
        if let Some(groupname) = &meta.groupname {
            header.set_groupname(groupname).map_err(ArchiveError::Write)?;
        }
        if let Some((major, minor)) = meta.device {
            header.set_device_major(major).map_err(ArchiveError::Write)?;
            header.set_device_minor(minor).map_err(ArchiveError::Write)?;
        }

        match (&meta.kind, &meta.link_name) {
            (EntryKind::Symlink | EntryKind::HardLink, Some(target)) => {
                header.set_size(0);
                self.builder
                    .append_link(&mut header, &meta.path, target)
                    .map_err(ArchiveError::Write)
            }
            _ => {
                header.set_size(meta.size);
                let mut limited = data.take(meta.size);
                self.builder
                    .append_data(&mut header, &meta.path, &mut limited)
                    .map_err(ArchiveError::Write)?;
                if limited.limit() > 0 {
                    return Err(ArchiveError::Write(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} ended {} bytes early", meta.path, limited.limit()),
                    )));
                }
                Ok(())
            }
        }
    }
}
