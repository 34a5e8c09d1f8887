//! In-memory tar archive decoder
//!
//! # Usage
//!
//! ## Decoding an archive
//!
//! ```rust
//! use untar_light::tar::Untar;
//!
//! // Two zero blocks: an empty archive
//! let tar_data = vec![0u8; 1024];
//! let entries = Untar::new(&tar_data).untar(None).unwrap();
//! assert!(entries.is_empty());
//! ```
//!
//! ## Walking entries one at a time
//!
//! ```rust
//! use untar_light::tar::Untar;
//!
//! let tar_data = vec![0u8; 1024];
//! for entry in Untar::new(&tar_data) {
//!     let entry = entry.unwrap();
//!     println!("{:?}: {} bytes at {}", entry.name, entry.size, entry.start);
//! }
//! ```
//!
//! ## Working with Headers
//!
//! ```rust
//! use untar_light::tar::{EntryKind, TarHeader};
//!
//! let mut bytes = [0u8; 512];
//! bytes[..8].copy_from_slice(b"file.txt");
//! bytes[124..128].copy_from_slice(b"1750"); // octal
//! bytes[156] = b'0';
//! let header = TarHeader::from_bytes(&bytes, 0).unwrap();
//! assert_eq!(header.size, 1000);
//! assert_eq!(header.kind(), EntryKind::Regular);
//! ```

use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::num::ParseIntError;
use std::ops::Range;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::Serialize;

use crate::content::Content;
use crate::error::{Result, UntarError};
use crate::pax::PaxHeader;

/// Size of a tar record
pub const BLOCK_SIZE: usize = 512;

/// Bytes that must be non-zero for another record to follow
const END_MARKER_LEN: usize = 4;

/// What a header record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Typeflag `'0'` or NUL: a file with content
    Regular,
    /// Typeflag `'g'`: PAX header for every following entry
    GlobalPax,
    /// Typeflag `'x'`: PAX header for the next entry only
    ExtendedPax,
    /// Links, devices, directories, FIFOs, reserved and unknown flags
    Other(u8),
}

impl From<u8> for EntryKind {
    fn from(typeflag: u8) -> Self {
        match typeflag {
            b'0' | 0 => EntryKind::Regular,
            b'g' => EntryKind::GlobalPax,
            b'x' => EntryKind::ExtendedPax,
            flag => EntryKind::Other(flag),
        }
    }
}

// Tar header fields used by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    pub name: String,
    pub size: usize,
    pub mtime: Option<u64>,
    pub typeflag: u8,
    pub magic: String,
    pub prefix: String,
}

impl TarHeader {
    /// Parse a TarHeader from a 512-byte record found at `offset`
    pub fn from_bytes(data: &[u8], offset: usize) -> Result<Self> {
        if data.len() < BLOCK_SIZE {
            return Err(UntarError::Truncated {
                offset,
                needed: BLOCK_SIZE,
                available: data.len(),
            });
        }
        let size = read_tar_u64(data, 124..136)
            .ok()
            .and_then(|size| usize::try_from(size).ok())
            .ok_or_else(|| {
                UntarError::format(
                    offset + 124,
                    format!("invalid size field {:?}", read_tar_str(data, 124..136)),
                )
            })?;
        Ok(TarHeader {
            name: read_tar_str(data, 0..100),
            size,
            mtime: read_tar_u64(data, 136..148).ok(),
            typeflag: data[156],
            magic: read_tar_str(data, 257..263),
            prefix: read_tar_str(data, 345..500),
        })
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from(self.typeflag)
    }

    /// "ustar" magic, POSIX or GNU flavour
    pub fn is_ustar(&self) -> bool {
        self.magic.starts_with("ustar")
    }

    /// Name with the ustar prefix merged in, when there is one
    pub fn full_name(&self) -> String {
        if self.is_ustar() && !self.prefix.is_empty() {
            format!("{}{}", self.prefix.trim(), self.name.trim())
        } else {
            self.name.clone()
        }
    }
}

/// A decoded file: where its content sits in the archive, plus metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    /// `None` once a PAX record removed the name
    pub name: Option<String>,
    /// Offset of the content in the archive
    pub start: usize,
    pub size: usize,
    /// PAX keys other than `path`/`name`, plus the header `mtime`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(skip)]
    pub content: Option<Content>,
}

impl FileEntry {
    pub fn new(name: Option<String>, start: usize, size: usize) -> Self {
        Self {
            name,
            start,
            size,
            attributes: BTreeMap::new(),
            content: None,
        }
    }

    /// Byte range of the content in the archive
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Modification time from the `mtime` attribute.
    ///
    /// PAX stores it as decimal seconds with an optional fraction
    /// (`1700000000.25`); the header stores whole seconds.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        let mtime = self.attribute("mtime")?;
        let (secs, frac) = mtime.split_once('.').unwrap_or((mtime, ""));
        let whole = secs.parse::<i64>().ok()?;
        let nanos = if frac.is_empty() {
            0
        } else {
            let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
            digits.parse::<u32>().ok()?
        };
        // the fraction counts away from zero, chrono's nanos count forward
        if secs.starts_with('-') && nanos > 0 {
            DateTime::from_timestamp(whole - 1, 1_000_000_000 - nanos)
        } else {
            DateTime::from_timestamp(whole, nanos)
        }
    }

    /// Hands the content handle over to the caller
    pub fn take_content(&mut self) -> Option<Content> {
        self.content.take()
    }
}

/// Sequential decoder over an archive held in memory.
///
/// The decoder only reads `archive`. Once it has walked past a record it
/// cannot go back; build a new one to decode again.
#[derive(Debug)]
pub struct Untar<'a> {
    archive: &'a [u8],
    bytes_read: usize,
    global_pax_header: Option<PaxHeader>,
    pax_header: Option<PaxHeader>,
    files_read: usize,
    failed: bool,
}

impl<'a> Untar<'a> {
    pub fn new(archive: &'a [u8]) -> Self {
        Self {
            archive,
            bytes_read: 0,
            global_pax_header: None,
            pax_header: None,
            files_read: 0,
            failed: false,
        }
    }

    /// Whether another record follows: at least 4 bytes remain and they are
    /// not all zero.
    pub fn has_next(&self) -> bool {
        self.archive
            .get(self.bytes_read..)
            .and_then(|rest| rest.get(..END_MARKER_LEN))
            .is_some_and(|marker| marker.iter().any(|&b| b != 0))
    }

    /// Cursor position in the archive
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Number of file entries produced so far
    pub fn files_read(&self) -> usize {
        self.files_read
    }

    /// Reads records until the next file entry.
    ///
    /// PAX headers, links, directories and the like produce no entry and are
    /// skipped. Returns `Ok(None)` at the end of the archive.
    pub fn read_next(&mut self) -> Result<Option<FileEntry>> {
        while self.has_next() {
            let offset = self.bytes_read;
            let available = self.archive.len() - offset;
            let record = self
                .archive
                .get(offset..offset + BLOCK_SIZE)
                .ok_or(UntarError::Truncated {
                    offset,
                    needed: BLOCK_SIZE,
                    available,
                })?;
            let header = TarHeader::from_bytes(record, offset)?;
            self.bytes_read += BLOCK_SIZE;

            let start = self.bytes_read;
            let size = header.size;
            let end = start
                .checked_add(size)
                .filter(|&end| end <= self.archive.len())
                .ok_or(UntarError::Truncated {
                    offset: start,
                    needed: size,
                    available: self.archive.len() - start,
                })?;

            let kind = header.kind();
            trace!("record at {offset}: {kind:?} {:?} ({size} bytes)", header.name);
            match kind {
                EntryKind::Regular => {}
                EntryKind::GlobalPax => {
                    let pax = PaxHeader::parse(self.archive, start, size)?;
                    debug!("global PAX header with {} fields", pax.fields().len());
                    self.global_pax_header = Some(pax);
                }
                EntryKind::ExtendedPax => {
                    self.pax_header = Some(PaxHeader::parse(self.archive, start, size)?);
                }
                EntryKind::Other(flag) => {
                    // a pending local PAX header waits for the next file entry
                    debug!("skipping {:?} (typeflag {:?})", header.name, flag as char);
                }
            }

            // File data is padded to reach a 512 byte boundary
            self.bytes_read = end + padding(size);

            if kind != EntryKind::Regular {
                continue;
            }

            let mut entry = FileEntry::new(Some(header.full_name()), start, size);
            if let Some(mtime) = header.mtime {
                entry.attributes.insert("mtime".to_string(), mtime.to_string());
            }
            if let Some(global) = &self.global_pax_header {
                global.apply(&mut entry);
            }
            if let Some(local) = self.pax_header.take() {
                local.apply(&mut entry);
            }
            self.files_read += 1;
            return Ok(Some(entry));
        }
        Ok(None)
    }

    /// Decodes every remaining entry. When `prefix` is given it is prepended
    /// to each non-empty name.
    pub fn untar(mut self, prefix: Option<&str>) -> Result<Vec<FileEntry>> {
        let mut files = Vec::new();
        while let Some(mut file) = self.read_next()? {
            if let (Some(prefix), Some(name)) = (prefix, file.name.as_mut()) {
                if !prefix.is_empty() && !name.is_empty() {
                    name.insert_str(0, prefix);
                }
            }
            files.push(file);
        }
        debug!("decoded {} files from {} bytes", files.len(), self.archive.len());
        Ok(files)
    }
}

impl Iterator for Untar<'_> {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_next() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Untar<'_> {}

/// Bytes needed after `size` to reach the next record boundary
pub fn padding(size: usize) -> usize {
    (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE
}

fn read_tar_str(data: &[u8], range: Range<usize>) -> String {
    let field = &data[range];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).to_string()
}

fn read_tar_u64(data: &[u8], range: Range<usize>) -> std::result::Result<u64, ParseIntError> {
    let s = read_tar_str(data, range);
    let s = s.trim_matches(|c| c == ' ' || c == '\0');
    if s.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(s, 8)
}
