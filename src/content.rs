//! Content handles for decoded entries.
//!
//! A [`Content`] is created by the side that will consume it. The worker
//! thread never creates one; it returns offsets only and the caller resolves
//! them against its own copy of the archive.

use std::fmt;
use std::sync::Arc;

use log::{trace, warn};

use crate::tar::FileEntry;

/// Owned copy of one entry's bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Content(Arc<[u8]>);

impl Content {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Content as a string, replacing invalid UTF-8
    pub fn to_str_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).to_string()
    }
}

impl From<&[u8]> for Content {
    fn from(bytes: &[u8]) -> Self {
        Content(Arc::from(bytes))
    }
}

impl AsRef<[u8]> for Content {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Content")
            .field(&format_args!("<{} bytes>", self.len()))
            .finish()
    }
}

/// How content handles are attached to decoded entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Copy each entry's byte range out of the archive right away.
    #[default]
    Immediate,
    /// Leave `content` empty; the owner of the archive resolves later.
    Deferred,
}

impl Resolution {
    /// Applies this strategy to `entries`, which must have been decoded from
    /// `archive`.
    pub fn apply(self, archive: &[u8], entries: &mut [FileEntry]) {
        if self == Resolution::Deferred {
            return;
        }
        for entry in entries.iter_mut() {
            resolve(archive, entry);
        }
    }
}

/// Copies `archive[start..start + size]` into the entry's content handle.
///
/// Offsets that fall outside `archive` leave the entry unresolved; this only
/// happens when the entry was decoded from a different buffer.
pub fn resolve(archive: &[u8], entry: &mut FileEntry) {
    let range = entry.range();
    match archive.get(range.clone()) {
        Some(bytes) => {
            trace!("resolved {:?} at {:?}", entry.name, range);
            entry.content = Some(Content::from(bytes));
        }
        None => {
            warn!(
                "entry {:?} range {:?} is outside a {}-byte archive",
                entry.name,
                range,
                archive.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: usize, size: usize) -> FileEntry {
        FileEntry::new(Some("a.txt".to_string()), start, size)
    }

    #[test]
    fn immediate_copies_range() {
        let archive = b"....hello....";
        let mut entries = vec![entry(4, 5)];
        Resolution::Immediate.apply(archive, &mut entries);
        let content = entries[0].content.as_ref().unwrap();
        assert_eq!(content.as_bytes(), b"hello");
        assert_eq!(content.to_str_lossy(), "hello");
    }

    #[test]
    fn deferred_leaves_content_empty() {
        let archive = b"....hello....";
        let mut entries = vec![entry(4, 5)];
        Resolution::Deferred.apply(archive, &mut entries);
        assert!(entries[0].content.is_none());
    }

    #[test]
    fn out_of_range_stays_unresolved() {
        let mut e = entry(10, 10);
        resolve(b"short", &mut e);
        assert!(e.content.is_none());
    }

    #[test]
    fn empty_entry_resolves_to_empty_content() {
        let mut e = entry(3, 0);
        resolve(b"abc", &mut e);
        assert!(e.content.as_ref().unwrap().is_empty());
    }
}
