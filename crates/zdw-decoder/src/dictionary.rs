use tracing::trace;
use zdw_wire::ByteSource;
use zdw_wire::FormatVersion;
use zdw_wire::dictionary_section::{
    FRAGMENT_LEN, UniqueEntry, VisitorEntry, read_chunk_size, read_section_count,
};

use crate::error::DecodeError;

/// Longest value any dictionary may yield, in bytes.
pub const MAX_VALUE_LEN: usize = 64 * 1024;

/// Longest back-reference chain a chained value may have.
pub const MAX_CHAIN_LINKS: usize = MAX_VALUE_LEN / FRAGMENT_LEN;

/// Size of each memory block backing a flat dictionary chunk.
pub const MEMBLOCK_SIZE: usize = 1024 * 1024;

// Entry counts are never trusted for up-front allocation.
const MAX_RESERVE: usize = 64 * 1024;

// ── Chained dictionary (v1–8) ─────────────────────────────────────────

/// Append-only arena of 8-byte value fragments linked by back-references.
///
/// Index 0 is the sentinel. Real entries are numbered from 1 in file
/// order across the header section and every block section. A row stores
/// the index of a value's **last** fragment; each fragment points at the
/// one before it, and the first fragment points at 0.
///
/// ```text
///   idx:   0        1            2            3
///        ┌──────┬────────────┬────────────┬────────────┐
///        │ ──── │ "Annabell" │ "e\0\0…"   │ "Bo\0…"    │
///        │ prev │ prev=0     │ prev=1     │ prev=0     │
///        └──────┴────────────┴────────────┴────────────┘
///   resolve(2) = "Annabell" + "e" = "Annabelle"
///   resolve(3) = "Bo"
/// ```
#[derive(Clone, Debug)]
pub struct ChainedDictionary {
    entries: Vec<UniqueEntry>,
}

impl Default for ChainedDictionary {
    fn default() -> Self {
        Self {
            entries: vec![UniqueEntry::default()],
        }
    }
}

impl ChainedDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, including the sentinel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when only the sentinel is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn push(&mut self, entry: UniqueEntry) {
        self.entries.push(entry);
    }

    /// Read one `count:u32` section and append its entries.
    ///
    /// # Errors
    ///
    /// Returns the wire error for a short read, or `CorruptedData` if the
    /// arena would outgrow `u32` indices.
    pub fn load_section(&mut self, src: &mut ByteSource) -> Result<u32, DecodeError> {
        let count = read_section_count(src)?;
        if self.entries.len() as u64 + u64::from(count) > u64::from(u32::MAX) {
            return Err(DecodeError::corrupted(format!(
                "uniques section of {count} entries overflows the dictionary"
            )));
        }
        self.entries.reserve((count as usize).min(MAX_RESERVE));
        for _ in 0..count {
            self.entries.push(UniqueEntry::read_from(src)?);
        }
        Ok(count)
    }

    /// Append the value stored at `index` to `out`.
    ///
    /// The first walk validates the chain and measures its depth; the
    /// second writes fragments straight into their final slots in `out`.
    /// The assembled value is cut at its first NUL.
    ///
    /// # Errors
    ///
    /// `CorruptedData` if `index` is out of range, a back-reference does
    /// not point strictly backward, or the chain exceeds
    /// [`MAX_CHAIN_LINKS`].
    pub fn resolve_into(&self, index: u32, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        let index = index as usize;
        if index == 0 {
            return Ok(());
        }
        if index >= self.entries.len() {
            return Err(DecodeError::corrupted(format!(
                "dictionary index {index} out of range ({} entries)",
                self.entries.len()
            )));
        }

        let mut depth = 0usize;
        let mut cur = index;
        while cur != 0 {
            depth += 1;
            if depth > MAX_CHAIN_LINKS {
                return Err(DecodeError::corrupted(format!(
                    "dictionary chain from {index} exceeds {MAX_CHAIN_LINKS} links"
                )));
            }
            let prev = self.entries[cur].prev as usize;
            if prev >= cur {
                return Err(DecodeError::corrupted(format!(
                    "dictionary entry {cur} points forward to {prev}"
                )));
            }
            cur = prev;
        }

        let start = out.len();
        out.resize(start + depth * FRAGMENT_LEN, 0);
        let mut slot = depth;
        let mut cur = index;
        while cur != 0 {
            slot -= 1;
            let at = start + slot * FRAGMENT_LEN;
            let entry = &self.entries[cur];
            out[at..at + FRAGMENT_LEN].copy_from_slice(&entry.chars);
            cur = entry.prev as usize;
        }

        if let Some(nul) = out[start..].iter().position(|&b| b == 0) {
            out.truncate(start + nul);
        }
        Ok(())
    }
}

// ── Visitor dictionary (v1–7) ─────────────────────────────────────────

/// Flat array of visitor IDs. Slot 0 is the sentinel.
#[derive(Clone, Debug)]
pub struct VisitorDictionary {
    ids: Vec<u64>,
}

impl Default for VisitorDictionary {
    fn default() -> Self {
        Self { ids: vec![0] }
    }
}

impl VisitorDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, including the sentinel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.len() == 1
    }

    pub fn push(&mut self, entry: VisitorEntry) {
        self.ids.push(entry.id);
    }

    /// Read one `count:u32` section and append its IDs.
    ///
    /// # Errors
    ///
    /// Returns the wire error for a short read.
    pub fn load_section(&mut self, src: &mut ByteSource) -> Result<u32, DecodeError> {
        let count = read_section_count(src)?;
        self.ids.reserve((count as usize).min(MAX_RESERVE));
        for _ in 0..count {
            self.push(VisitorEntry::read_from(src)?);
        }
        Ok(count)
    }

    /// # Errors
    ///
    /// `CorruptedData` if `index` is not a stored slot.
    pub fn lookup(&self, index: u64) -> Result<u64, DecodeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.ids.get(i))
            .copied()
            .ok_or_else(|| {
                DecodeError::corrupted(format!(
                    "visitor index {index} out of range ({} entries)",
                    self.ids.len()
                ))
            })
    }
}

// ── Flat dictionary (v9+) ─────────────────────────────────────────────

/// One block's dictionary bytes, held in fixed-size memory blocks.
///
/// Values are NUL-terminated and addressed by byte offset; a value may
/// straddle two memory blocks. Each block's chunk replaces the previous
/// one, and the memory blocks are reused across chunks.
#[derive(Debug, Default)]
pub struct FlatDictionary {
    blocks: Vec<Box<[u8]>>,
    len: u64,
}

impl FlatDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes in the current chunk.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replace the chunk with `size` bytes read from `src`.
    ///
    /// # Errors
    ///
    /// Returns the wire error if the stream ends inside the chunk.
    pub fn load(&mut self, src: &mut ByteSource, size: u64) -> Result<(), DecodeError> {
        self.len = 0;
        let mut remaining = size;
        let mut block = 0;
        while remaining > 0 {
            if block == self.blocks.len() {
                self.blocks.push(vec![0u8; MEMBLOCK_SIZE].into_boxed_slice());
            }
            let take = usize::try_from(remaining).map_or(MEMBLOCK_SIZE, |r| r.min(MEMBLOCK_SIZE));
            src.read_exact_bytes(&mut self.blocks[block][..take])?;
            self.len += take as u64;
            remaining -= take as u64;
            block += 1;
        }
        Ok(())
    }

    /// Replace the chunk with in-memory bytes.
    pub fn load_bytes(&mut self, bytes: &[u8]) {
        self.len = 0;
        for (block, piece) in bytes.chunks(MEMBLOCK_SIZE).enumerate() {
            if block == self.blocks.len() {
                self.blocks.push(vec![0u8; MEMBLOCK_SIZE].into_boxed_slice());
            }
            self.blocks[block][..piece.len()].copy_from_slice(piece);
            self.len += piece.len() as u64;
        }
    }

    /// Append the NUL-terminated value at `offset` to `out`.
    ///
    /// # Errors
    ///
    /// `CorruptedData` if `offset` is past the chunk, no NUL follows it,
    /// or the value is longer than [`MAX_VALUE_LEN`].
    pub fn resolve_into(&self, offset: u64, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        if offset == 0 {
            return Ok(());
        }
        if offset >= self.len {
            return Err(DecodeError::corrupted(format!(
                "dictionary offset {offset} out of range ({} bytes)",
                self.len
            )));
        }

        let start = out.len();
        let block_size = MEMBLOCK_SIZE as u64;
        let mut pos = offset;
        while pos < self.len {
            let block = &self.blocks[(pos / block_size) as usize];
            let within = (pos % block_size) as usize;
            let avail = (block_size - pos % block_size).min(self.len - pos) as usize;
            let piece = &block[within..within + avail];

            let found = piece.iter().position(|&b| b == 0);
            let used = found.unwrap_or(avail);
            if out.len() - start + used > MAX_VALUE_LEN {
                return Err(DecodeError::corrupted(format!(
                    "dictionary value at {offset} exceeds {MAX_VALUE_LEN} bytes"
                )));
            }
            out.extend_from_slice(&piece[..used]);
            if found.is_some() {
                return Ok(());
            }
            pos += avail as u64;
        }

        Err(DecodeError::corrupted(format!(
            "dictionary value at {offset} is not NUL-terminated"
        )))
    }

    fn release(&mut self) {
        self.blocks = Vec::new();
        self.len = 0;
    }
}

// ── Store ─────────────────────────────────────────────────────────────

/// Version-selected dictionary state owned by the engine.
#[derive(Debug)]
pub enum DictionaryStore {
    /// v1–8. `visitors` is present for v1–7.
    Chained {
        uniques: ChainedDictionary,
        visitors: Option<VisitorDictionary>,
    },
    /// v9+.
    Flat(FlatDictionary),
}

impl DictionaryStore {
    #[must_use]
    pub fn for_version(version: FormatVersion) -> Self {
        if version.uses_chained_dictionary() {
            Self::Chained {
                uniques: ChainedDictionary::new(),
                visitors: version.uses_visitor_dictionary().then(VisitorDictionary::new),
            }
        } else {
            Self::Flat(FlatDictionary::new())
        }
    }

    /// Read one dictionary section from `src`.
    ///
    /// Chained stores append a uniques section (and a visitors section
    /// when present); flat stores replace their chunk.
    ///
    /// # Errors
    ///
    /// Returns the wire error for a short read, or `CorruptedData`.
    pub fn load_section(&mut self, src: &mut ByteSource) -> Result<(), DecodeError> {
        match self {
            Self::Chained { uniques, visitors } => {
                let added = uniques.load_section(src)?;
                let added_visitors = match visitors {
                    Some(visitors) => visitors.load_section(src)?,
                    None => 0,
                };
                trace!(
                    uniques = added,
                    visitors = added_visitors,
                    total = uniques.len() - 1,
                    "appended chained dictionary section"
                );
            }
            Self::Flat(flat) => {
                let size = read_chunk_size(src)?;
                flat.load(src, size)?;
                trace!(bytes = size, "loaded flat dictionary chunk");
            }
        }
        Ok(())
    }

    /// Append the text value referenced by `stored` to `out`.
    ///
    /// # Errors
    ///
    /// `CorruptedData` for a bad index or offset.
    pub fn resolve_text(&self, stored: u64, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        match self {
            Self::Chained { uniques, .. } => {
                let index = u32::try_from(stored).map_err(|_| {
                    DecodeError::corrupted(format!("dictionary index {stored} out of range"))
                })?;
                uniques.resolve_into(index, out)
            }
            Self::Flat(flat) => flat.resolve_into(stored, out),
        }
    }

    /// Visitor ID stored at `index`.
    ///
    /// # Errors
    ///
    /// `CorruptedData` for a bad index, `Processing` if this file has no
    /// visitor dictionary.
    pub fn resolve_visitor(&self, index: u64) -> Result<u64, DecodeError> {
        match self {
            Self::Chained {
                visitors: Some(visitors),
                ..
            } => visitors.lookup(index),
            _ => Err(DecodeError::Processing(
                "visitor column without a visitor dictionary".into(),
            )),
        }
    }

    /// Entries (chained) or bytes (flat) currently held, for logging.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Chained { uniques, .. } => uniques.len() as u64 - 1,
            Self::Flat(flat) => flat.len(),
        }
    }

    /// Drop every buffer.
    pub fn clear(&mut self) {
        match self {
            Self::Chained { uniques, visitors } => {
                *uniques = ChainedDictionary::new();
                if let Some(visitors) = visitors {
                    *visitors = VisitorDictionary::new();
                }
            }
            Self::Flat(flat) => flat.release(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(bytes: &[u8], prev: u32) -> UniqueEntry {
        let mut chars = [0u8; FRAGMENT_LEN];
        chars[..bytes.len()].copy_from_slice(bytes);
        UniqueEntry { chars, prev }
    }

    fn resolve(dict: &ChainedDictionary, index: u32) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::new();
        dict.resolve_into(index, &mut out).map(|()| out)
    }

    #[test]
    fn chained_walk_assembles_forward() {
        let mut dict = ChainedDictionary::new();
        dict.push(fragment(b"Annabell", 0));
        dict.push(fragment(b"e", 1));
        dict.push(fragment(b"Bo", 0));

        assert_eq!(resolve(&dict, 2).unwrap(), b"Annabelle");
        assert_eq!(resolve(&dict, 1).unwrap(), b"Annabell");
        assert_eq!(resolve(&dict, 3).unwrap(), b"Bo");
        assert_eq!(resolve(&dict, 0).unwrap(), b"");
    }

    #[test]
    fn chained_value_of_exact_fragment_length_keeps_every_byte() {
        let mut dict = ChainedDictionary::new();
        dict.push(fragment(b"12345678", 0));
        dict.push(fragment(b"abcdefgh", 1));
        assert_eq!(resolve(&dict, 2).unwrap(), b"12345678abcdefgh");
    }

    #[test]
    fn chained_appends_after_existing_bytes() {
        let mut dict = ChainedDictionary::new();
        dict.push(fragment(b"xy", 0));
        let mut out = b"ab\t".to_vec();
        dict.resolve_into(1, &mut out).unwrap();
        assert_eq!(out, b"ab\txy");
    }

    #[test]
    fn chained_rejects_out_of_range() {
        let mut dict = ChainedDictionary::new();
        dict.push(fragment(b"a", 0));
        assert!(matches!(
            resolve(&dict, 2),
            Err(DecodeError::CorruptedData { .. })
        ));
    }

    #[test]
    fn chained_rejects_forward_and_self_references() {
        let mut dict = ChainedDictionary::new();
        dict.push(fragment(b"a", 1));
        dict.push(fragment(b"b", 3));
        dict.push(fragment(b"c", 0));
        assert!(resolve(&dict, 1).is_err());
        assert!(resolve(&dict, 2).is_err());
    }

    #[test]
    fn chained_longest_legal_chain() {
        let mut dict = ChainedDictionary::new();
        for i in 0..MAX_CHAIN_LINKS {
            dict.push(fragment(b"zzzzzzzz", i as u32));
        }
        let value = resolve(&dict, MAX_CHAIN_LINKS as u32).unwrap();
        assert_eq!(value.len(), MAX_VALUE_LEN);

        dict.push(fragment(b"z", MAX_CHAIN_LINKS as u32));
        assert!(matches!(
            resolve(&dict, MAX_CHAIN_LINKS as u32 + 1),
            Err(DecodeError::CorruptedData { .. })
        ));
    }

    #[test]
    fn visitor_lookup() {
        let mut dict = VisitorDictionary::new();
        dict.push(VisitorEntry { id: 42, prev: 0 });
        dict.push(VisitorEntry { id: 42, prev: 1 });
        assert_eq!(dict.lookup(1).unwrap(), 42);
        assert_eq!(dict.lookup(2).unwrap(), 42);
        assert!(dict.lookup(3).is_err());
    }

    #[test]
    fn flat_values_by_offset() {
        let mut dict = FlatDictionary::new();
        dict.load_bytes(b"\0Ann\0Bo\0");
        let mut out = Vec::new();
        dict.resolve_into(1, &mut out).unwrap();
        assert_eq!(out, b"Ann");
        out.clear();
        dict.resolve_into(5, &mut out).unwrap();
        assert_eq!(out, b"Bo");
        out.clear();
        dict.resolve_into(0, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn flat_value_crossing_memblocks() {
        let mut bytes = vec![0u8; MEMBLOCK_SIZE - 2];
        bytes.extend_from_slice(b"wxyz\0");
        let mut dict = FlatDictionary::new();
        dict.load_bytes(&bytes);

        let mut out = Vec::new();
        dict.resolve_into((MEMBLOCK_SIZE - 2) as u64, &mut out).unwrap();
        assert_eq!(out, b"wxyz");
    }

    #[test]
    fn flat_rejects_bad_offsets_and_unterminated_values() {
        let mut dict = FlatDictionary::new();
        dict.load_bytes(b"\0abc");
        let mut out = Vec::new();
        assert!(matches!(
            dict.resolve_into(1, &mut out),
            Err(DecodeError::CorruptedData { .. })
        ));
        assert!(matches!(
            dict.resolve_into(4, &mut out),
            Err(DecodeError::CorruptedData { .. })
        ));
    }

    #[test]
    fn flat_rejects_overlong_values() {
        let mut bytes = vec![0u8];
        bytes.extend(std::iter::repeat_n(b'q', MAX_VALUE_LEN + 1));
        bytes.push(0);
        let mut dict = FlatDictionary::new();
        dict.load_bytes(&bytes);
        let mut out = Vec::new();
        assert!(dict.resolve_into(1, &mut out).is_err());
    }

    #[test]
    fn flat_reload_replaces_chunk() {
        let mut dict = FlatDictionary::new();
        dict.load_bytes(b"\0first\0");
        dict.load_bytes(b"\0x\0");
        assert_eq!(dict.len(), 3);
        let mut out = Vec::new();
        assert!(dict.resolve_into(4, &mut out).is_err());
    }

    #[test]
    fn store_selects_encoding_by_version() {
        let v7 = DictionaryStore::for_version(FormatVersion::new(7).unwrap());
        assert!(matches!(
            v7,
            DictionaryStore::Chained {
                visitors: Some(_),
                ..
            }
        ));
        let v8 = DictionaryStore::for_version(FormatVersion::new(8).unwrap());
        assert!(matches!(v8, DictionaryStore::Chained { visitors: None, .. }));
        assert!(v8.resolve_visitor(1).is_err());
        let v9 = DictionaryStore::for_version(FormatVersion::new(9).unwrap());
        assert!(matches!(v9, DictionaryStore::Flat(_)));
    }
}
