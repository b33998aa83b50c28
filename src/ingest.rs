//! Parallel ingestion pipeline.
//!
//! Documents are partitioned across a fixed pool of workers. Each worker
//! owns a private term → document-ID-set accumulator, so the ingest phase
//! needs no cross-worker locking: contention is eliminated by partitioning.
//! Workers tokenize their files in bounded-size chunks, never splitting a
//! token across a chunk boundary.
//!
//! The merge phase unions the distinct terms of all accumulators, sorts
//! them, computes each term's document-ID union in parallel, and commits the
//! results into the global index one term at a time. Committing in sorted
//! term order keeps the final artifacts byte-reproducible regardless of
//! worker count or scheduling.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::thread;

use ahash::AHashMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;
use crate::error::{MyrtusError, Result};
use crate::index::{DocId, IndexConfig, InvertedIndex};

/// Per-worker accumulator: term → set of document IDs.
type Accumulator = AHashMap<String, BTreeSet<DocId>>;

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of worker threads. Zero means one worker per logical CPU.
    pub workers: usize,

    /// Maximum bytes read from a document at a time. Bounds peak memory for
    /// very large documents.
    pub chunk_size: usize,

    /// Abort the whole build on the first document failure instead of
    /// recording it and continuing.
    pub fail_fast: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            workers: 0,
            chunk_size: 8 * 1024 * 1024, // 8MB
            fail_fast: false,
        }
    }
}

/// A document to ingest: caller-supplied ID plus the file holding its
/// content.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    /// Caller-supplied document ID.
    pub doc_id: DocId,

    /// Path of the document content.
    pub path: PathBuf,
}

impl DocumentFile {
    /// Create a document entry.
    pub fn new<P: Into<PathBuf>>(doc_id: DocId, path: P) -> Self {
        DocumentFile {
            doc_id,
            path: path.into(),
        }
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents successfully tokenized and merged.
    pub docs_indexed: u64,

    /// Per-document failures that were isolated and skipped.
    pub failures: Vec<MyrtusError>,
}

/// Build an inverted index over a document collection in parallel.
///
/// Equivalent to a single-threaded pass calling
/// [`InvertedIndex::add_document`] per document: the final term set and
/// per-term document-ID sets are independent of worker count and scheduling.
/// Per-document read failures are recorded in the report and skipped unless
/// `config.fail_fast` is set.
pub fn build_index<T: Tokenizer>(
    documents: &[DocumentFile],
    tokenizer: &T,
    index_config: IndexConfig,
    config: &IngestConfig,
) -> Result<(InvertedIndex, IngestReport)> {
    if config.chunk_size == 0 {
        return Err(MyrtusError::invalid_input("chunk size of zero"));
    }

    let workers = match config.workers {
        0 => num_cpus::get(),
        n => n,
    }
    .min(documents.len())
    .max(1);

    info!(
        "ingesting {} documents with {workers} workers",
        documents.len()
    );

    let (accumulators, mut report) = run_workers(documents, tokenizer, workers, config)?;

    let mut index = InvertedIndex::new(index_config);
    merge_accumulators(&mut index, accumulators)?;

    report.docs_indexed = documents.len() as u64 - report.failures.len() as u64;
    info!(
        "ingest complete: {} documents indexed, {} failed, {} terms",
        report.docs_indexed,
        report.failures.len(),
        index.dictionary().len()
    );
    Ok((index, report))
}

/// Fan documents out to scoped worker threads and collect their private
/// accumulators over a channel.
fn run_workers<T: Tokenizer>(
    documents: &[DocumentFile],
    tokenizer: &T,
    workers: usize,
    config: &IngestConfig,
) -> Result<(Vec<Accumulator>, IngestReport)> {
    let (sender, receiver) = crossbeam_channel::bounded(workers);

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let sender = sender.clone();
            scope.spawn(move || {
                let mut local = Accumulator::new();
                let mut failures = Vec::new();

                // Disjoint strided partition: worker w takes documents
                // w, w + workers, w + 2*workers, ...
                for doc in documents.iter().skip(worker_id).step_by(workers) {
                    match ingest_document(doc, tokenizer, config.chunk_size, &mut local) {
                        Ok(()) => {}
                        Err(err) => {
                            warn!("skipping document {}: {err}", doc.doc_id);
                            failures.push(err);
                            if config.fail_fast {
                                break;
                            }
                        }
                    }
                }

                debug!(
                    "worker {worker_id} done: {} local terms, {} failures",
                    local.len(),
                    failures.len()
                );
                // The receiver outlives every worker; a send cannot fail.
                let _ = sender.send((local, failures));
            });
        }
        drop(sender);

        let mut accumulators = Vec::with_capacity(workers);
        let mut report = IngestReport::default();
        for (local, failures) in receiver {
            accumulators.push(local);
            report.failures.extend(failures);
        }

        if config.fail_fast && !report.failures.is_empty() {
            return Err(report.failures.remove(0));
        }

        Ok((accumulators, report))
    })
}

/// Tokenize one document in bounded chunks into a worker's accumulator.
///
/// Chunks end at the last whitespace boundary so no token is split; the
/// trailing partial token is carried into the next chunk. A chunk with no
/// whitespace at all is processed whole rather than buffered indefinitely.
fn ingest_document<T: Tokenizer>(
    doc: &DocumentFile,
    tokenizer: &T,
    chunk_size: usize,
    local: &mut Accumulator,
) -> Result<()> {
    let mut file =
        File::open(&doc.path).map_err(|err| MyrtusError::worker_io(doc.doc_id, &doc.path, &err))?;

    let mut buf = vec![0u8; chunk_size];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let mut filled = carry.len().min(chunk_size);
        buf[..filled].copy_from_slice(&carry[..filled]);
        carry.clear();

        while filled < chunk_size {
            let read = file
                .read(&mut buf[filled..])
                .map_err(|err| MyrtusError::worker_io(doc.doc_id, &doc.path, &err))?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled == 0 {
            break;
        }

        let at_eof = filled < chunk_size;
        let split = if at_eof {
            filled
        } else {
            match buf[..filled].iter().rposition(|b| b.is_ascii_whitespace()) {
                Some(ws) => ws + 1,
                None => filled, // token longer than the chunk, split it
            }
        };

        let text = String::from_utf8_lossy(&buf[..split]);
        for token in tokenizer.tokenize(&text) {
            local.entry(token).or_default().insert(doc.doc_id);
        }

        carry.extend_from_slice(&buf[split..filled]);
        if at_eof {
            break;
        }
    }

    Ok(())
}

/// Union per-worker accumulators into the global index.
///
/// The distinct term set is sorted for determinism, the per-term document-ID
/// union runs word-parallel, and commits are serialized per term (one commit
/// per term, applied in sorted order).
fn merge_accumulators(index: &mut InvertedIndex, accumulators: Vec<Accumulator>) -> Result<()> {
    let mut terms: BTreeSet<&str> = BTreeSet::new();
    for local in &accumulators {
        terms.extend(local.keys().map(String::as_str));
    }
    let terms: Vec<&str> = terms.into_iter().collect();

    debug!(
        "merging {} distinct terms from {} accumulators",
        terms.len(),
        accumulators.len()
    );

    let merged: Vec<(&str, Vec<DocId>)> = terms
        .par_iter()
        .map(|&term| {
            let mut ids = BTreeSet::new();
            for local in &accumulators {
                if let Some(seen) = local.get(term) {
                    ids.extend(seen.iter().copied());
                }
            }
            (term, ids.into_iter().collect())
        })
        .collect();

    for (term, ids) in merged {
        index.insert_term_postings(term, &ids)?;
    }
    Ok(())
}
