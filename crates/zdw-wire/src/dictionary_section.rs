use crate::error::WireError;
use crate::source::ByteSource;

/// Bytes of value data carried by one chained dictionary entry.
pub const FRAGMENT_LEN: usize = 8;

/// On-disk size of a [`UniqueEntry`].
pub const UNIQUE_ENTRY_LEN: usize = FRAGMENT_LEN + 4;

/// On-disk size of a [`VisitorEntry`].
pub const VISITOR_ENTRY_LEN: usize = 8 + 4;

/// One fragment of a chained ("uniques") dictionary value, v1–8.
///
/// ```text
/// ┌─────────────────┬────────────┐
/// │ chars: [u8; 8]  │ prev: u32  │
/// └─────────────────┴────────────┘
/// ```
///
/// `prev` names the entry holding the preceding fragment of the same
/// value, or 0 for the first fragment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UniqueEntry {
    pub chars: [u8; FRAGMENT_LEN],
    pub prev: u32,
}

impl UniqueEntry {
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] on a short read.
    pub fn read_from(src: &mut ByteSource) -> Result<Self, WireError> {
        let mut chars = [0u8; FRAGMENT_LEN];
        src.read_exact_bytes(&mut chars)?;
        let prev = src.read_u32()?;
        Ok(Self { chars, prev })
    }
}

/// One visitor-ID dictionary entry, v1–7.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisitorEntry {
    pub id: u64,
    /// Earlier occurrence of the same ID; only meaningful to the writer.
    pub prev: u32,
}

impl VisitorEntry {
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] on a short read.
    pub fn read_from(src: &mut ByteSource) -> Result<Self, WireError> {
        let id = src.read_u64()?;
        let prev = src.read_u32()?;
        Ok(Self { id, prev })
    }
}

/// Read the `count:u32` that opens a uniques or visitors section.
///
/// # Errors
///
/// Returns [`WireError::UnexpectedEof`] on a short read.
pub fn read_section_count(src: &mut ByteSource) -> Result<u32, WireError> {
    src.read_u32()
}

/// Read the `size:u64` that opens a flat dictionary chunk (v9+).
///
/// # Errors
///
/// Returns [`WireError::UnexpectedEof`] on a short read.
pub fn read_chunk_size(src: &mut ByteSource) -> Result<u64, WireError> {
    src.read_u64()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_entries() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(b"Ann\0\0\0\0\0");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&77u64.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());

        let mut src = ByteSource::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(read_section_count(&mut src).unwrap(), 2);
        let unique = UniqueEntry::read_from(&mut src).unwrap();
        assert_eq!(&unique.chars[..3], b"Ann");
        assert_eq!(unique.prev, 0);
        let visitor = VisitorEntry::read_from(&mut src).unwrap();
        assert_eq!(visitor, VisitorEntry { id: 77, prev: 1 });
        assert_eq!(
            src.offset(),
            (4 + UNIQUE_ENTRY_LEN + VISITOR_ENTRY_LEN) as u64
        );
    }

    #[test]
    fn truncated_entry() {
        let mut src = ByteSource::from_reader(Cursor::new(b"abcdefgh\x01".to_vec())).unwrap();
        assert!(matches!(
            UniqueEntry::read_from(&mut src),
            Err(WireError::UnexpectedEof { .. })
        ));
    }
}
