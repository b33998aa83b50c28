//! # Myrtus
//!
//! A compressed, disk-serializable inverted index for Rust.
//!
//! ## Features
//!
//! - Front-coded term dictionary (shared-prefix compression in fixed blocks)
//! - Elias-gamma compressed posting lists (gap encoded, near-entropy optimal)
//! - Incremental merge-insert of new document IDs into existing lists
//! - Parallel ingestion: private per-worker accumulators, deterministic merge
//! - Stable four-artifact on-disk layout with cross-referencing offset tables
//!
//! ## Quick start
//!
//! ```rust
//! use myrtus::index::{IndexConfig, InvertedIndex};
//!
//! let mut index = InvertedIndex::new(IndexConfig::default());
//! index.add_document(1, ["la", "casa", "roja"]).unwrap();
//! index.add_document(2, ["el", "perro", "de", "la", "casa"]).unwrap();
//!
//! assert_eq!(index.search("casa").unwrap(), vec![1, 2]);
//! assert!(index.search("inexistente").unwrap().is_empty());
//! ```

pub mod analysis;
pub mod codec;
pub mod dictionary;
mod error;
pub mod index;
pub mod ingest;
pub mod postings;

// Re-exports for the public API
pub use analysis::{SimpleTokenizer, Tokenizer};
pub use dictionary::{FrontCodedDictionary, TermHandle};
pub use error::{MyrtusError, Result};
pub use index::{DocId, IndexConfig, IndexPaths, IndexStats, InvertedIndex};
pub use ingest::{DocumentFile, IngestConfig, IngestReport, build_index};
pub use postings::PostingStore;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
