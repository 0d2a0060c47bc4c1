//! askdoc - question answering over your documents with hybrid retrieval.
//!
//! askdoc indexes a directory of PDF, markdown and text files into a
//! versioned passage store with cached embeddings. At query time it runs
//! BM25 keyword retrieval (via [Tantivy](https://github.com/quickwit-oss/tantivy))
//! and dense embedding similarity in parallel, merges both rankings with a
//! configurable fusion strategy, and streams an answer synthesized by a
//! language model with cited sources.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use askdoc::{CorpusStore, QueryEngine, RetrievalOptions};
//! use askdoc::embedder::{OllamaConfig, OllamaEmbeddingClient};
//!
//! let store = CorpusStore::open(Path::new("/var/lib/askdoc")).unwrap();
//! let corpus = store.load().unwrap();
//!
//! let embedder =
//!     OllamaEmbeddingClient::new(OllamaConfig::default()).unwrap();
//! let engine = QueryEngine::new(&corpus, &embedder).unwrap();
//!
//! let retrieval = engine
//!     .retrieve("how do I rotate the api keys?", &RetrievalOptions::default())
//!     .unwrap();
//! for r in &retrieval.results {
//!     let passage = corpus.get(r.passage_id).unwrap();
//!     println!("{} (score: {:.4}) {}", r.passage_id, r.fused_score, passage.source);
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod corpus;
pub mod data_dir;
pub mod dense;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod generation;
pub mod lexical;
pub mod loader;
pub mod passage;
pub mod store;
pub mod synthesizer;

pub use corpus::Corpus;
pub use data_dir::DataDir;
pub use engine::{QueryEngine, Retrieval, RetrievalOptions};
pub use error::{Error, Result};
pub use passage::{Passage, PassageId};
pub use store::CorpusStore;
pub use synthesizer::{AnswerEvent, AnswerStream};
