//! Front-coded term dictionary.
//!
//! Terms are kept in memory with stable, first-seen handles. Compression
//! happens at serialization time: all terms are globally sorted, grouped
//! into fixed-size blocks, and each non-head entry stores only the length of
//! the prefix it shares with its predecessor plus the remaining suffix. The
//! head of every block is stored verbatim, so decoding an entry replays the
//! block from its head.
//!
//! The serialized layout (spec'd in the crate docs) is:
//!
//! ```text
//! blob:    block_size: u64 | entries: (prefix_len: u8, suffix_len: u16, suffix bytes)*
//! offsets: one u64 per entry, in sorted term order, byte offset within the blob
//! ```
//!
//! Position `i` of the offset table is the canonical handle `i` of the
//! serialized form; deserialization reassigns handles accordingly.

use std::io::Write;

use ahash::AHashMap;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{MyrtusError, Result};

/// Stable numeric identifier for a term.
///
/// Assigned at first insertion and never renumbered for the lifetime of the
/// in-memory structure.
pub type TermHandle = u32;

/// Default number of terms per front-coded block.
pub const DEFAULT_BLOCK_SIZE: usize = 4;

/// Terms longer than this cannot be represented by the `u16` suffix length
/// field.
const MAX_TERM_LEN: usize = u16::MAX as usize;

/// A sorted, deduplicated term set compressed in fixed-size blocks.
#[derive(Debug, Clone)]
pub struct FrontCodedDictionary {
    /// Terms indexed by handle, in handle-assignment order.
    terms: Vec<String>,

    /// Reverse map from term to its handle.
    handles: AHashMap<String, TermHandle>,

    /// Number of terms per block in the serialized form.
    block_size: usize,
}

impl FrontCodedDictionary {
    /// Create an empty dictionary with the given block size.
    ///
    /// A block size of 1 degenerates to storing every entry verbatim.
    pub fn new(block_size: usize) -> Self {
        FrontCodedDictionary {
            terms: Vec::new(),
            handles: AHashMap::new(),
            block_size: block_size.max(1),
        }
    }

    /// The configured block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the dictionary holds no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Insert a term, returning its handle.
    ///
    /// Idempotent: inserting a term that is already present returns the
    /// existing handle. An empty or oversized term is an `InvalidInput`
    /// contract violation and leaves the dictionary untouched.
    pub fn insert(&mut self, term: &str) -> Result<TermHandle> {
        validate_term(term)?;

        if let Some(&handle) = self.handles.get(term) {
            return Ok(handle);
        }

        let handle = self.terms.len() as TermHandle;
        self.terms.push(term.to_string());
        self.handles.insert(term.to_string(), handle);
        Ok(handle)
    }

    /// Look up the handle for a term. A miss is a normal outcome.
    pub fn lookup(&self, term: &str) -> Option<TermHandle> {
        self.handles.get(term).copied()
    }

    /// Resolve a handle back to its term.
    pub fn resolve(&self, handle: TermHandle) -> Result<&str> {
        self.terms
            .get(handle as usize)
            .map(String::as_str)
            .ok_or(MyrtusError::HandleNotFound(handle))
    }

    /// Handles in globally sorted term order.
    ///
    /// This is the canonical order used by serialization: the entry at
    /// position `i` of the returned vector becomes serialized handle `i`.
    pub fn sorted_handles(&self) -> Vec<TermHandle> {
        let mut order: Vec<TermHandle> = (0..self.terms.len() as TermHandle).collect();
        order.sort_by(|&a, &b| self.terms[a as usize].cmp(&self.terms[b as usize]));
        order
    }

    /// Serialize the dictionary into a blob writer and a parallel offset
    /// table writer.
    ///
    /// Terms are globally sorted before block assembly; front-coding quality
    /// depends on lexicographic adjacency, not insertion order. The offset
    /// table carries one `u64` per entry, in sorted term order, addressing
    /// the entry within the blob.
    pub fn serialize<B: Write, O: Write>(&self, mut blob: B, mut offsets: O) -> Result<()> {
        blob.write_u64::<LittleEndian>(self.block_size as u64)?;

        let order = self.sorted_handles();
        let mut offset = std::mem::size_of::<u64>() as u64;
        let mut prev: &[u8] = &[];

        for (rank, &handle) in order.iter().enumerate() {
            let term = self.terms[handle as usize].as_bytes();
            let prefix_len = if rank % self.block_size == 0 {
                0 // block head is stored verbatim
            } else {
                common_prefix_len(prev, term).min(u8::MAX as usize)
            };
            let suffix = &term[prefix_len..];

            offsets.write_u64::<LittleEndian>(offset)?;
            blob.write_u8(prefix_len as u8)?;
            blob.write_u16::<LittleEndian>(suffix.len() as u16)?;
            blob.write_all(suffix)?;

            offset += 1 + 2 + suffix.len() as u64;
            prev = term;
        }

        blob.flush()?;
        offsets.flush()?;
        Ok(())
    }

    /// Reconstruct a dictionary from a serialized blob and offset table.
    ///
    /// Handles are reassigned to sorted rank (the canonical serialized
    /// order). A truncated or structurally inconsistent blob fails with
    /// `MalformedDictionary`; no partial terms are ever returned.
    pub fn deserialize(blob: &[u8], offsets: &[u8]) -> Result<Self> {
        if offsets.len() % 8 != 0 {
            return Err(MyrtusError::malformed_dictionary(format!(
                "offset table length {} is not a multiple of 8",
                offsets.len()
            )));
        }
        let entry_count = offsets.len() / 8;

        let mut cursor = blob;
        let block_size = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| MyrtusError::malformed_dictionary("blob shorter than its header"))?
            as usize;
        if block_size == 0 {
            return Err(MyrtusError::malformed_dictionary("block size of zero"));
        }

        let mut offset_cursor = offsets;
        let mut dict = FrontCodedDictionary::new(block_size);
        let mut pos = std::mem::size_of::<u64>();
        let mut prev: Vec<u8> = Vec::new();

        for rank in 0..entry_count {
            let expected = offset_cursor.read_u64::<LittleEndian>()?;
            if expected != pos as u64 {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "entry {rank}: offset table says {expected}, blob walk says {pos}"
                )));
            }
            if pos + 3 > blob.len() {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "entry {rank} header truncated at byte {pos}"
                )));
            }

            let prefix_len = blob[pos] as usize;
            let suffix_len = u16::from_le_bytes([blob[pos + 1], blob[pos + 2]]) as usize;
            pos += 3;

            if pos + suffix_len > blob.len() {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "entry {rank} suffix truncated at byte {pos}"
                )));
            }
            if rank % block_size == 0 && prefix_len != 0 {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "entry {rank} is a block head but has prefix length {prefix_len}"
                )));
            }
            if prefix_len > prev.len() {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "entry {rank} shares {prefix_len} bytes with a {}-byte predecessor",
                    prev.len()
                )));
            }

            let mut term_bytes = prev[..prefix_len].to_vec();
            term_bytes.extend_from_slice(&blob[pos..pos + suffix_len]);
            pos += suffix_len;

            let term = String::from_utf8(term_bytes).map_err(|_| {
                MyrtusError::malformed_dictionary(format!("entry {rank} is not valid UTF-8"))
            })?;
            if term.is_empty() || term.len() > MAX_TERM_LEN {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "entry {rank} reconstructs to {} bytes",
                    term.len()
                )));
            }

            let handle = dict.insert(&term)?;
            if handle as usize != rank {
                return Err(MyrtusError::malformed_dictionary(format!(
                    "duplicate term at entry {rank}"
                )));
            }
            prev = dict.terms[rank].as_bytes().to_vec();
        }

        if pos != blob.len() {
            return Err(MyrtusError::malformed_dictionary(format!(
                "{} trailing bytes after the last entry",
                blob.len() - pos
            )));
        }

        Ok(dict)
    }
}

impl Default for FrontCodedDictionary {
    fn default() -> Self {
        FrontCodedDictionary::new(DEFAULT_BLOCK_SIZE)
    }
}

/// Check the caller contract for a term: non-empty and short enough for the
/// `u16` suffix length field.
///
/// Callers that commit several terms as one operation validate all of them
/// through this before inserting any, so a bad term never leaves the
/// operation half applied.
pub(crate) fn validate_term(term: &str) -> Result<()> {
    if term.is_empty() {
        return Err(MyrtusError::invalid_input("empty term"));
    }
    if term.len() > MAX_TERM_LEN {
        return Err(MyrtusError::invalid_input(format!(
            "term length {} exceeds the maximum of {MAX_TERM_LEN} bytes",
            term.len()
        )));
    }
    Ok(())
}

/// Length of the byte prefix shared by two terms.
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
