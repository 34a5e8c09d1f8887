//! Test utilities: builds small tar archives in memory.

use crate::tar::{padding, BLOCK_SIZE};

/// Fixed mtime written into every test header
pub const TEST_MTIME: u64 = 1_700_000_000;

/// Formats one PAX record, computing the self-inclusive length prefix.
pub fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let body = format!(" {key}={value}\n");
    let mut len = body.len() + 1;
    while len.to_string().len() + body.len() != len {
        len += 1;
    }
    format!("{len}{body}").into_bytes()
}

/// Appends header records and content to an archive under construction.
#[derive(Debug, Default)]
pub struct TarBuilder {
    data: Vec<u8>,
}

impl TarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regular file
    pub fn file(self, name: &str, content: &[u8]) -> Self {
        self.entry(name, b'0', content)
    }

    /// Any typeflag, content written as-is
    pub fn entry(self, name: &str, typeflag: u8, content: &[u8]) -> Self {
        self.record(name, "", typeflag, content)
    }

    /// Regular file whose name is split over the ustar prefix field
    pub fn prefixed(self, prefix: &str, name: &str, content: &[u8]) -> Self {
        self.record(name, prefix, b'0', content)
    }

    /// `x` header applying to the next record
    pub fn pax_local(self, records: &[u8]) -> Self {
        self.entry("././@PaxHeader", b'x', records)
    }

    /// `g` header applying to every following record
    pub fn pax_global(self, records: &[u8]) -> Self {
        self.entry("././@PaxHeader", b'g', records)
    }

    /// Adds the two zero blocks that end an archive
    pub fn finish(mut self) -> Vec<u8> {
        self.data.extend_from_slice(&[0u8; 2 * BLOCK_SIZE]);
        self.data
    }

    fn record(mut self, name: &str, prefix: &str, typeflag: u8, content: &[u8]) -> Self {
        self.data
            .extend_from_slice(&create_header(name, prefix, typeflag, content.len()));
        self.data.extend_from_slice(content);
        self.data.resize(self.data.len() + padding(content.len()), 0);
        self
    }
}

fn create_header(name: &str, prefix: &str, typeflag: u8, size: usize) -> [u8; BLOCK_SIZE] {
    let mut data = [0u8; BLOCK_SIZE];
    put(&mut data[0..100], name.as_bytes());
    put(&mut data[100..108], b"0000644\0");
    put(&mut data[108..116], b"0000000\0");
    put(&mut data[116..124], b"0000000\0");
    put(&mut data[124..136], format!("{size:011o}\0").as_bytes());
    put(&mut data[136..148], format!("{TEST_MTIME:011o}\0").as_bytes());
    data[156] = typeflag;
    put(&mut data[257..263], b"ustar\0");
    put(&mut data[263..265], b"00");
    put(&mut data[345..500], prefix.as_bytes());

    // checksum is summed with its own field as spaces
    data[148..156].fill(b' ');
    let checksum: u32 = data.iter().map(|&b| b as u32).sum();
    put(&mut data[148..156], format!("{checksum:06o}\0 ").as_bytes());
    data
}

fn put(field: &mut [u8], bytes: &[u8]) {
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pax_record_length_includes_itself() {
        assert_eq!(pax_record("uname", "alice"), b"15 uname=alice\n");
        let long = pax_record("path", &"n".repeat(95));
        assert_eq!(&long[..4], b"105 ");
        assert_eq!(long.len(), 105);
    }

    #[test]
    fn records_are_block_aligned() {
        let data = TarBuilder::new().file("a", b"abc").finish();
        assert_eq!(data.len(), 512 + 512 + 1024);
        assert_eq!(&data[124..136], b"00000000003\0");
    }
}
