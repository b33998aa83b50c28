use std::fs;

use tempfile::TempDir;

use myrtus::{
    DocId, DocumentFile, IndexConfig, IndexPaths, IngestConfig, InvertedIndex, SimpleTokenizer,
    Tokenizer, build_index,
};

fn write_corpus(dir: &TempDir, doc_count: u64) -> (Vec<DocumentFile>, Vec<(DocId, String)>) {
    let mut docs = Vec::new();
    let mut contents = Vec::new();
    for i in 0..doc_count {
        // Overlapping vocabulary so most terms appear in many documents.
        let text = format!(
            "lorem ipsum dolor sit amet termino{} compartido{} final",
            i % 11,
            i % 5
        );
        let path = dir.path().join(format!("doc{i}.txt"));
        fs::write(&path, &text).unwrap();
        docs.push(DocumentFile::new(i, path));
        contents.push((i, text));
    }
    (docs, contents)
}

#[test]
fn test_parallel_build_equals_sequential_build() {
    let dir = TempDir::new().unwrap();
    let (docs, contents) = write_corpus(&dir, 60);
    let tokenizer = SimpleTokenizer::new();

    let mut sequential = InvertedIndex::new(IndexConfig::default());
    for (doc_id, text) in &contents {
        sequential
            .add_document(*doc_id, tokenizer.tokenize(text))
            .unwrap();
    }

    for workers in [1, 3, 8] {
        let config = IngestConfig {
            workers,
            ..IngestConfig::default()
        };
        let (parallel, report) =
            build_index(&docs, &tokenizer, IndexConfig::default(), &config).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.docs_indexed, 60);

        assert_eq!(parallel.dictionary().len(), sequential.dictionary().len());
        for i in 0..11 {
            let term = format!("termino{i}");
            assert_eq!(
                parallel.search(&term).unwrap(),
                sequential.search(&term).unwrap(),
                "{term} differs with {workers} workers"
            );
        }
        assert_eq!(
            parallel.search("lorem").unwrap(),
            sequential.search("lorem").unwrap()
        );
    }
}

#[test]
fn test_parallel_artifacts_are_byte_identical_across_worker_counts() {
    let dir = TempDir::new().unwrap();
    let (docs, _) = write_corpus(&dir, 30);
    let tokenizer = SimpleTokenizer::new();

    let mut artifact_sets: Vec<Vec<Vec<u8>>> = Vec::new();
    for workers in [1, 2, 6] {
        let config = IngestConfig {
            workers,
            ..IngestConfig::default()
        };
        let (index, _) = build_index(&docs, &tokenizer, IndexConfig::default(), &config).unwrap();

        let out = TempDir::new().unwrap();
        let paths = IndexPaths::in_dir(out.path());
        index.finalize(&paths).unwrap();

        artifact_sets.push(vec![
            fs::read(&paths.lexicon).unwrap(),
            fs::read(&paths.term_offsets).unwrap(),
            fs::read(&paths.postings).unwrap(),
            fs::read(&paths.posting_offsets).unwrap(),
        ]);
    }

    // The merge phase commits in sorted term order, so every artifact,
    // postings blob included, is reproducible regardless of worker count.
    for set in &artifact_sets[1..] {
        assert_eq!(set, &artifact_sets[0]);
    }
}

#[test]
fn test_build_finalize_load_search_end_to_end() {
    let dir = TempDir::new().unwrap();
    let docs = [
        (1u64, "la casa roja"),
        (2, "el perro de la casa"),
        (3, "la casa blanca"),
    ]
    .iter()
    .map(|(doc_id, text)| {
        let path = dir.path().join(format!("doc{doc_id}.txt"));
        fs::write(&path, text).unwrap();
        DocumentFile::new(*doc_id, path)
    })
    .collect::<Vec<_>>();

    let (index, report) = build_index(
        &docs,
        &SimpleTokenizer::new(),
        IndexConfig::default(),
        &IngestConfig::default(),
    )
    .unwrap();
    assert_eq!(report.docs_indexed, 3);

    let out = TempDir::new().unwrap();
    let paths = IndexPaths::in_dir(out.path());
    index.finalize(&paths).unwrap();

    let loaded = InvertedIndex::load(&paths).unwrap();
    assert_eq!(loaded.search("casa").unwrap(), vec![1, 2, 3]);
    assert_eq!(loaded.search("roja").unwrap(), vec![1]);
    assert_eq!(loaded.search("perro").unwrap(), vec![2]);
    assert_eq!(loaded.search("inexistente").unwrap(), Vec::<DocId>::new());
}

#[test]
fn test_small_chunks_match_large_chunks() {
    let dir = TempDir::new().unwrap();
    let (docs, _) = write_corpus(&dir, 10);
    let tokenizer = SimpleTokenizer::new();

    let small = IngestConfig {
        workers: 2,
        chunk_size: 16,
        ..IngestConfig::default()
    };
    let large = IngestConfig {
        workers: 2,
        ..IngestConfig::default()
    };

    let (index_small, _) =
        build_index(&docs, &tokenizer, IndexConfig::default(), &small).unwrap();
    let (index_large, _) =
        build_index(&docs, &tokenizer, IndexConfig::default(), &large).unwrap();

    assert_eq!(
        index_small.dictionary().len(),
        index_large.dictionary().len()
    );
    for term in ["lorem", "ipsum", "dolor", "sit", "amet", "final"] {
        assert_eq!(
            index_small.search(term).unwrap(),
            index_large.search(term).unwrap()
        );
    }
}
