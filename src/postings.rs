//! Posting-list store: gamma-compressed document ID lists in a byte arena.
//!
//! Each handle maps to one span inside an append-only arena. A span is
//! framed as `count: u32 | packed_len: u32 | packed gamma bytes`, so the
//! decoder always stops at the declared posting count instead of scanning
//! into pad bits.
//!
//! Placement policy on merge-insert: if the re-encoded span fits in the
//! previously occupied one it is overwritten in place (trailing slack is
//! kept, the arena is not fully packed); otherwise the new span is appended
//! at the end of the arena and the old one becomes dead space. Dead space is
//! never compacted in this design; a `compact()` pass is the documented
//! extension point for reclaiming it.

use std::collections::BTreeSet;
use std::io::Write;

use ahash::AHashMap;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::gamma;
use crate::dictionary::TermHandle;
use crate::error::{MyrtusError, Result};
use crate::index::DocId;

/// Sentinel in the serialized offset table for a handle with no postings.
pub const NO_SPAN: u64 = u64::MAX;

/// Bytes taken by the `count`/`packed_len` span header.
const SPAN_HEADER_LEN: usize = 8;

/// A span of the arena currently owned by a handle.
#[derive(Debug, Clone, Copy)]
struct Span {
    /// Byte offset of the span header within the arena.
    offset: u64,

    /// Occupied length in bytes, header included. May exceed the encoded
    /// length after an in-place overwrite left trailing slack.
    occupied: u32,

    /// Number of document IDs in the list.
    count: u32,
}

/// Maps dictionary handles to gamma-encoded, gap-delta document ID lists.
#[derive(Debug, Clone, Default)]
pub struct PostingStore {
    /// Append-only backing buffer holding all spans, dead ones included.
    arena: Vec<u8>,

    /// Current span per handle.
    spans: AHashMap<TermHandle, Span>,

    /// Bytes abandoned by spans that were re-appended after growing.
    dead_bytes: u64,
}

impl PostingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        PostingStore::default()
    }

    /// Number of handles that currently have postings.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether no handle has postings.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Size of the backing arena in bytes, dead space included.
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    /// Bytes occupied by spans that are no longer referenced.
    ///
    /// Grows whenever a list is rewritten larger than its old span. Only a
    /// `compact()` pass would reclaim it; none is implemented.
    pub fn dead_bytes(&self) -> u64 {
        self.dead_bytes
    }

    /// Decode the posting list for a handle.
    ///
    /// Returns an empty list for a handle that has no postings yet; that is
    /// a normal outcome, not a fault.
    pub fn lookup(&self, handle: TermHandle) -> Result<Vec<DocId>> {
        match self.spans.get(&handle) {
            Some(span) => self.decode_span(span),
            None => Ok(Vec::new()),
        }
    }

    /// Union newly seen document IDs into the list for a handle.
    ///
    /// The result is re-encoded and either overwrites the old span in place
    /// (when no larger) or is appended at the end of the arena.
    pub fn merge_insert(&mut self, handle: TermHandle, new_ids: &[DocId]) -> Result<()> {
        if new_ids.is_empty() {
            return Ok(());
        }
        if new_ids.iter().any(|&id| id == DocId::MAX) {
            return Err(MyrtusError::invalid_input(
                "document ID u64::MAX is not representable by the gap encoding",
            ));
        }

        let mut ids: BTreeSet<DocId> = match self.spans.get(&handle) {
            Some(span) => self.decode_span(span)?.into_iter().collect(),
            None => BTreeSet::new(),
        };
        ids.extend(new_ids.iter().copied());

        let sorted: Vec<DocId> = ids.into_iter().collect();
        let encoded = encode_ids(&sorted)?;
        let needed = (SPAN_HEADER_LEN + encoded.len()) as u32;

        let in_place = self
            .spans
            .get(&handle)
            .is_some_and(|span| needed <= span.occupied);

        if in_place {
            // Rewrite in place, keeping the occupied length: trailing slack
            // stays allocated to this span.
            if let Some(span) = self.spans.get_mut(&handle) {
                let start = span.offset as usize;
                write_span_at(&mut self.arena[start..], sorted.len() as u32, &encoded);
                span.count = sorted.len() as u32;
            }
        } else {
            if let Some(old) = self.spans.get(&handle) {
                self.dead_bytes += u64::from(old.occupied);
            }
            let offset = self.arena.len() as u64;
            self.arena
                .extend_from_slice(&(sorted.len() as u32).to_le_bytes());
            self.arena
                .extend_from_slice(&(encoded.len() as u32).to_le_bytes());
            self.arena.extend_from_slice(&encoded);
            self.spans.insert(
                handle,
                Span {
                    offset,
                    occupied: needed,
                    count: sorted.len() as u32,
                },
            );
        }

        Ok(())
    }

    /// Serialize the arena and a per-handle offset table.
    ///
    /// `handle_order` lists, for each canonical serialized handle position,
    /// the in-memory handle whose span offset should be written there. A
    /// position whose handle has no span gets the [`NO_SPAN`] sentinel. The
    /// arena is written verbatim, so spans appear in allocation order, not
    /// handle order.
    pub fn serialize<B: Write, O: Write>(
        &self,
        handle_order: &[TermHandle],
        mut blob: B,
        mut offsets: O,
    ) -> Result<()> {
        blob.write_all(&self.arena)?;
        for &handle in handle_order {
            let offset = self
                .spans
                .get(&handle)
                .map(|span| span.offset)
                .unwrap_or(NO_SPAN);
            offsets.write_u64::<LittleEndian>(offset)?;
        }
        blob.flush()?;
        offsets.flush()?;
        Ok(())
    }

    /// Reconstruct a store from a serialized arena and offset table.
    ///
    /// The handle for offset table position `i` is `i` itself (canonical
    /// order). Fails with `MalformedPostings` when a span points outside the
    /// blob or its framing is inconsistent.
    pub fn deserialize(blob: &[u8], offsets: &[u8]) -> Result<Self> {
        if offsets.len() % 8 != 0 {
            return Err(MyrtusError::malformed_postings(format!(
                "offset table length {} is not a multiple of 8",
                offsets.len()
            )));
        }

        let mut spans = AHashMap::new();
        let mut cursor = offsets;
        let entry_count = offsets.len() / 8;

        for handle in 0..entry_count as TermHandle {
            let offset = cursor.read_u64::<LittleEndian>()?;
            if offset == NO_SPAN {
                continue;
            }

            let start = offset as usize;
            if start + SPAN_HEADER_LEN > blob.len() {
                return Err(MyrtusError::malformed_postings(format!(
                    "handle {handle}: span header at offset {offset} past blob end {}",
                    blob.len()
                )));
            }
            let count = u32::from_le_bytes([
                blob[start],
                blob[start + 1],
                blob[start + 2],
                blob[start + 3],
            ]);
            let packed_len = u32::from_le_bytes([
                blob[start + 4],
                blob[start + 5],
                blob[start + 6],
                blob[start + 7],
            ]);
            let end = start + SPAN_HEADER_LEN + packed_len as usize;
            if end > blob.len() {
                return Err(MyrtusError::malformed_postings(format!(
                    "handle {handle}: span at offset {offset} runs to {end}, blob ends at {}",
                    blob.len()
                )));
            }

            spans.insert(
                handle,
                Span {
                    offset,
                    occupied: (SPAN_HEADER_LEN + packed_len as usize) as u32,
                    count,
                },
            );
        }

        Ok(PostingStore {
            arena: blob.to_vec(),
            spans,
            dead_bytes: 0,
        })
    }

    fn decode_span(&self, span: &Span) -> Result<Vec<DocId>> {
        let start = span.offset as usize + SPAN_HEADER_LEN;
        let packed_len = u32::from_le_bytes([
            self.arena[span.offset as usize + 4],
            self.arena[span.offset as usize + 5],
            self.arena[span.offset as usize + 6],
            self.arena[span.offset as usize + 7],
        ]) as usize;
        let packed = &self.arena[start..start + packed_len];
        decode_ids(packed, span.count as usize)
    }
}

/// Gap-encode a strictly increasing ID list into packed gamma bytes.
///
/// Gaps are shifted by +1 before encoding because the gamma code cannot
/// represent zero (the first gap is zero whenever document ID 0 appears).
fn encode_ids(sorted_ids: &[DocId]) -> Result<Vec<u8>> {
    let mut gaps = Vec::with_capacity(sorted_ids.len());
    let mut prev = 0u64;
    for &id in sorted_ids {
        // The first gap of a list starting at u64::MAX would be
        // u64::MAX + 1; merge_insert rejects that ID before decoding, this
        // is the backstop.
        let gap = (id - prev).checked_add(1).ok_or_else(|| {
            MyrtusError::invalid_input(
                "document ID u64::MAX is not representable by the gap encoding",
            )
        })?;
        gaps.push(gap);
        prev = id;
    }
    let bits = gamma::encode_sequence(&gaps)?;
    Ok(gamma::pack(&bits))
}

/// Inverse of [`encode_ids`].
fn decode_ids(packed: &[u8], count: usize) -> Result<Vec<DocId>> {
    let gaps = gamma::decode_sequence(packed, count)?;
    let mut ids = Vec::with_capacity(count);
    let mut prev = 0u64;
    for (i, gap) in gaps.into_iter().enumerate() {
        // A biased gap of 1 means "same ID as the predecessor", which only
        // the first entry (document ID 0) may encode.
        if gap < 2 && i > 0 {
            return Err(MyrtusError::malformed_postings(
                "non-increasing document ID in decoded posting list",
            ));
        }
        prev += gap - 1;
        ids.push(prev);
    }
    Ok(ids)
}

/// Overwrite a span in place at the start of `dest`.
fn write_span_at(dest: &mut [u8], count: u32, encoded: &[u8]) {
    dest[..4].copy_from_slice(&count.to_le_bytes());
    dest[4..8].copy_from_slice(&(encoded.len() as u32).to_le_bytes());
    dest[8..8 + encoded.len()].copy_from_slice(encoded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_missing_is_empty() {
        let store = PostingStore::new();
        assert_eq!(store.lookup(7).unwrap(), Vec::<DocId>::new());
    }

    #[test]
    fn test_merge_insert_sorts_and_dedups() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[5, 1, 3]).unwrap();
        store.merge_insert(0, &[3, 2, 5, 9]).unwrap();
        assert_eq!(store.lookup(0).unwrap(), vec![1, 2, 3, 5, 9]);
    }

    #[test]
    fn test_merge_insert_is_idempotent() {
        let mut store = PostingStore::new();
        for _ in 0..5 {
            store.merge_insert(3, &[10, 20]).unwrap();
        }
        assert_eq!(store.lookup(3).unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_reserved_doc_id_rejected_without_mutation() {
        let mut store = PostingStore::new();
        assert!(matches!(
            store.merge_insert(0, &[u64::MAX]),
            Err(MyrtusError::InvalidInput(_))
        ));
        assert_eq!(store.arena_len(), 0);
        assert!(store.lookup(0).unwrap().is_empty());

        // A mixed batch is rejected as a whole, existing lists untouched.
        store.merge_insert(0, &[5]).unwrap();
        assert!(store.merge_insert(0, &[6, u64::MAX]).is_err());
        assert_eq!(store.lookup(0).unwrap(), vec![5]);
    }

    #[test]
    fn test_doc_id_zero() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[0, 4, 7]).unwrap();
        assert_eq!(store.lookup(0).unwrap(), vec![0, 4, 7]);
    }

    #[test]
    fn test_growth_appends_and_leaves_dead_space() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[1]).unwrap();
        let before = store.arena_len();

        // A much larger gap forces a longer code than the old span can hold.
        store.merge_insert(0, &[1, 1 << 40]).unwrap();
        assert!(store.arena_len() > before);
        assert!(store.dead_bytes() > 0);
        assert_eq!(store.lookup(0).unwrap(), vec![1, 1 << 40]);
    }

    #[test]
    fn test_no_growth_overwrites_in_place() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[1 << 40]).unwrap();
        let before = store.arena_len();

        // Adding a small ID shrinks the big gap; the new encoding fits.
        store.merge_insert(0, &[2]).unwrap();
        assert_eq!(store.arena_len(), before);
        assert_eq!(store.dead_bytes(), 0);
        assert_eq!(store.lookup(0).unwrap(), vec![2, 1 << 40]);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[1, 2, 3]).unwrap();
        store.merge_insert(1, &[10, 30]).unwrap();
        store.merge_insert(2, &[7]).unwrap();

        let mut blob = Vec::new();
        let mut offsets = Vec::new();
        // Canonical order 0..=3, with 3 having no postings.
        store.serialize(&[0, 1, 2, 3], &mut blob, &mut offsets).unwrap();

        let loaded = PostingStore::deserialize(&blob, &offsets).unwrap();
        assert_eq!(loaded.lookup(0).unwrap(), vec![1, 2, 3]);
        assert_eq!(loaded.lookup(1).unwrap(), vec![10, 30]);
        assert_eq!(loaded.lookup(2).unwrap(), vec![7]);
        assert_eq!(loaded.lookup(3).unwrap(), Vec::<DocId>::new());
    }

    #[test]
    fn test_serialize_remaps_handles() {
        let mut store = PostingStore::new();
        store.merge_insert(5, &[100]).unwrap();
        store.merge_insert(9, &[200]).unwrap();

        let mut blob = Vec::new();
        let mut offsets = Vec::new();
        store.serialize(&[9, 5], &mut blob, &mut offsets).unwrap();

        let loaded = PostingStore::deserialize(&blob, &offsets).unwrap();
        assert_eq!(loaded.lookup(0).unwrap(), vec![200]);
        assert_eq!(loaded.lookup(1).unwrap(), vec![100]);
    }

    #[test]
    fn test_truncated_blob_fails() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[1, 100, 10_000]).unwrap();

        let mut blob = Vec::new();
        let mut offsets = Vec::new();
        store.serialize(&[0], &mut blob, &mut offsets).unwrap();

        blob.truncate(blob.len() - 1);
        assert!(matches!(
            PostingStore::deserialize(&blob, &offsets),
            Err(MyrtusError::MalformedPostings(_))
        ));
    }

    #[test]
    fn test_bogus_offset_fails() {
        let mut store = PostingStore::new();
        store.merge_insert(0, &[1]).unwrap();

        let mut blob = Vec::new();
        let mut offsets = Vec::new();
        store.serialize(&[0], &mut blob, &mut offsets).unwrap();

        let bogus = 1_000_000u64.to_le_bytes();
        assert!(matches!(
            PostingStore::deserialize(&blob, &bogus),
            Err(MyrtusError::MalformedPostings(_))
        ));
    }
}
