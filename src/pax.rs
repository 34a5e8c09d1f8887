//! PAX extended headers.
//!
//! A PAX block is a sequence of records of the form `"<len> <key>=<value>\n"`
//! where `<len>` is the decimal length of the whole record, including the
//! length digits themselves and the trailing newline.

use log::trace;

use crate::error::{Result, UntarError};
use crate::tar::FileEntry;

/// One `key=value` record. An empty value is stored as `None` and means
/// "remove this attribute" when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaxField {
    pub key: String,
    pub value: Option<String>,
}

/// Ordered set of PAX overrides, from a `g` (global) or `x` (local) record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaxHeader {
    fields: Vec<PaxField>,
}

impl PaxHeader {
    /// Parses the PAX records in `archive[start..start + length]`.
    ///
    /// Any malformed record fails the whole header: its length is what
    /// locates the record after it.
    pub fn parse(archive: &[u8], start: usize, length: usize) -> Result<Self> {
        let block = start
            .checked_add(length)
            .and_then(|end| archive.get(start..end))
            .ok_or(UntarError::Truncated {
                offset: start,
                needed: length,
                available: archive.len().saturating_sub(start),
            })?;

        let mut fields = Vec::new();
        let mut read = 0;
        while read < length {
            let offset = start + read;
            let rest = &block[read..];

            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| UntarError::format(offset, "PAX record has no length delimiter"))?;
            let record_len = std::str::from_utf8(&rest[..space])
                .ok()
                .and_then(|digits| digits.parse::<usize>().ok())
                .ok_or_else(|| UntarError::format(offset, "PAX record length is not a number"))?;
            if record_len <= space + 1 || record_len > rest.len() {
                return Err(UntarError::format(
                    offset,
                    format!("PAX record length {record_len} out of range"),
                ));
            }

            let body = &rest[space + 1..record_len];
            let body = body.strip_suffix(b"\n").unwrap_or(body);
            let text = String::from_utf8_lossy(body);
            let mut parts = text.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(UntarError::format(
                    offset,
                    format!("PAX record {text:?} is not a single key=value pair"),
                ));
            };

            trace!("pax {key}={value:?}");
            fields.push(PaxField {
                key: key.to_string(),
                value: (!value.is_empty()).then(|| value.to_string()),
            });
            read += record_len;
        }

        Ok(PaxHeader { fields })
    }

    pub fn fields(&self) -> &[PaxField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value of the last record for `key`. `Some(None)` means the key is
    /// present with an empty value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.key == key)
            .map(|f| f.value.as_deref())
    }

    /// Applies the overrides in order. `path` and `name` both target the
    /// entry name; every other key lands in the entry's attributes.
    pub fn apply(&self, entry: &mut FileEntry) {
        for field in &self.fields {
            match field.key.as_str() {
                "path" | "name" => entry.name = field.value.clone(),
                key => match &field.value {
                    Some(value) => {
                        entry.attributes.insert(key.to_string(), value.clone());
                    }
                    None => {
                        entry.attributes.remove(key);
                    }
                },
            }
        }
    }
}
