//! Inverted index builder/merger.
//!
//! Pairs one front-coded dictionary with one posting store, keyed
//! consistently by term handle, and owns the four-artifact on-disk layout:
//!
//! 1. dictionary blob (`lexicon.bin`)
//! 2. term offset table (`term_ptrs.bin`)
//! 3. postings blob (`postings.bin`)
//! 4. postings offset table (`post_ptrs.bin`)
//!
//! The cross-reference between the artifacts: position `i` of the term
//! offset table corresponds to canonical handle `i`, which indexes position
//! `i` of the postings offset table.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ahash::AHashSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dictionary::{DEFAULT_BLOCK_SIZE, FrontCodedDictionary, TermHandle};
use crate::error::{MyrtusError, Result};
use crate::postings::PostingStore;

/// A caller-supplied document identifier. Unique per document, not required
/// to be contiguous. `u64::MAX` is reserved: the +1 bias of the gap
/// encoding cannot represent it.
pub type DocId = u64;

/// Configuration for an inverted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of terms per front-coded dictionary block.
    pub block_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Paths of the four serialized artifacts.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    /// Front-coded dictionary blob.
    pub lexicon: PathBuf,

    /// Term offset table, one `u64` per term in sorted order.
    pub term_offsets: PathBuf,

    /// Gamma-packed postings blob.
    pub postings: PathBuf,

    /// Postings offset table, one `u64` per handle.
    pub posting_offsets: PathBuf,
}

impl IndexPaths {
    /// The four artifacts as sibling files under one directory.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        IndexPaths {
            lexicon: dir.join("lexicon.bin"),
            term_offsets: dir.join("term_ptrs.bin"),
            postings: dir.join("postings.bin"),
            posting_offsets: dir.join("post_ptrs.bin"),
        }
    }
}

/// Statistics about an inverted index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Number of unique terms.
    pub term_count: u64,

    /// Number of handles with at least one posting.
    pub posted_term_count: u64,

    /// Size of the postings arena in bytes, dead space included.
    pub arena_bytes: u64,

    /// Bytes abandoned by posting lists that were rewritten larger.
    pub dead_bytes: u64,
}

/// A compressed inverted index: front-coded dictionary plus gamma-encoded
/// posting lists.
///
/// Documents can be added in any order and any number of times; posting
/// lists have set-union semantics. `finalize` serializes the index to four
/// artifacts and `load` reconstructs it for further lookups or further
/// incremental merges.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    dictionary: FrontCodedDictionary,
    postings: PostingStore,
}

impl InvertedIndex {
    /// Create an empty index.
    pub fn new(config: IndexConfig) -> Self {
        InvertedIndex {
            dictionary: FrontCodedDictionary::new(config.block_size),
            postings: PostingStore::new(),
        }
    }

    /// Add a document's term set.
    ///
    /// Terms are deduplicated for this document: a term contributes at most
    /// one occurrence of `doc_id` to its posting list (presence, not
    /// frequency, is modeled). Reinsertion of the same `(doc_id, term)` pair
    /// is idempotent.
    ///
    /// All-or-nothing: the document ID and the whole term set are validated
    /// before any handle is created or any posting committed, so an invalid
    /// term leaves the index untouched.
    pub fn add_document<I, S>(&mut self, doc_id: DocId, terms: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_doc_ids(&[doc_id])?;

        let mut seen: AHashSet<String> = AHashSet::new();
        let mut unique: Vec<String> = Vec::new();
        for term in terms {
            let term = term.as_ref();
            crate::dictionary::validate_term(term)?;
            if seen.insert(term.to_string()) {
                unique.push(term.to_string());
            }
        }

        for term in &unique {
            let handle = self.dictionary.insert(term)?;
            self.postings.merge_insert(handle, &[doc_id])?;
        }
        Ok(())
    }

    /// Bulk-insert a whole document ID set for one term.
    ///
    /// This is the commit entry point the parallel merge phase uses: one
    /// call per term, each carrying the union of every worker's IDs. The
    /// term and every ID are validated before the dictionary or the posting
    /// store is touched.
    pub fn insert_term_postings(&mut self, term: &str, doc_ids: &[DocId]) -> Result<()> {
        crate::dictionary::validate_term(term)?;
        validate_doc_ids(doc_ids)?;
        let handle = self.dictionary.insert(term)?;
        self.postings.merge_insert(handle, doc_ids)
    }

    /// Look up the documents containing a term.
    ///
    /// A dictionary miss returns an empty list, not an error.
    pub fn search(&self, term: &str) -> Result<Vec<DocId>> {
        match self.dictionary.lookup(term) {
            Some(handle) => self.postings.lookup(handle),
            None => Ok(Vec::new()),
        }
    }

    /// The term dictionary.
    pub fn dictionary(&self) -> &FrontCodedDictionary {
        &self.dictionary
    }

    /// The posting store.
    pub fn postings(&self) -> &PostingStore {
        &self.postings
    }

    /// Current index statistics.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            term_count: self.dictionary.len() as u64,
            posted_term_count: self.postings.len() as u64,
            arena_bytes: self.postings.arena_len() as u64,
            dead_bytes: self.postings.dead_bytes(),
        }
    }

    /// Serialize the index into the four artifacts.
    ///
    /// Both offset tables are written in globally sorted term order, so the
    /// serialized handle of a term is its sorted rank. Output bytes are
    /// therefore reproducible regardless of insertion order. All sinks are
    /// flushed before returning.
    pub fn finalize(&self, paths: &IndexPaths) -> Result<()> {
        debug!(
            "finalizing index: {} terms, {} posted, arena {} bytes ({} dead)",
            self.dictionary.len(),
            self.postings.len(),
            self.postings.arena_len(),
            self.postings.dead_bytes()
        );

        let lexicon = BufWriter::new(fs::File::create(&paths.lexicon)?);
        let term_offsets = BufWriter::new(fs::File::create(&paths.term_offsets)?);
        self.dictionary.serialize(lexicon, term_offsets)?;

        let order = self.dictionary.sorted_handles();
        let postings = BufWriter::new(fs::File::create(&paths.postings)?);
        let posting_offsets = BufWriter::new(fs::File::create(&paths.posting_offsets)?);
        self.postings.serialize(&order, postings, posting_offsets)?;

        info!(
            "index finalized: {} terms to {}",
            self.dictionary.len(),
            paths.lexicon.display()
        );
        Ok(())
    }

    /// Reload an index from its four artifacts.
    ///
    /// The reconstructed index is queryable and accepts further incremental
    /// merges. Structural corruption surfaces as `MalformedDictionary`,
    /// `MalformedPostings`, or `HandleNotFound` (cross-reference breakage).
    pub fn load(paths: &IndexPaths) -> Result<Self> {
        let lexicon = fs::read(&paths.lexicon)?;
        let term_offsets = fs::read(&paths.term_offsets)?;
        let postings_blob = fs::read(&paths.postings)?;
        let posting_offsets = fs::read(&paths.posting_offsets)?;

        let dictionary = FrontCodedDictionary::deserialize(&lexicon, &term_offsets)?;
        let postings = PostingStore::deserialize(&postings_blob, &posting_offsets)?;

        // Cross-reference invariant: both offset tables are indexed by the
        // same canonical handles. A postings entry beyond the term count
        // references a term that does not exist.
        let posting_entries = posting_offsets.len() / 8;
        if posting_entries > dictionary.len() {
            return Err(MyrtusError::HandleNotFound(
                dictionary.len() as TermHandle,
            ));
        }
        if posting_entries < dictionary.len() {
            return Err(MyrtusError::malformed_postings(format!(
                "offset table has {posting_entries} entries for {} terms",
                dictionary.len()
            )));
        }

        info!(
            "index loaded: {} terms from {}",
            dictionary.len(),
            paths.lexicon.display()
        );
        Ok(InvertedIndex {
            dictionary,
            postings,
        })
    }
}

/// Reject the reserved `u64::MAX` document ID before any state mutation.
fn validate_doc_ids(doc_ids: &[DocId]) -> Result<()> {
    if doc_ids.iter().any(|&id| id == DocId::MAX) {
        return Err(MyrtusError::invalid_input(
            "document ID u64::MAX is not representable by the gap encoding",
        ));
    }
    Ok(())
}
