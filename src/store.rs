//! Persisted corpus storage with versioned swap.
//!
//! Each corpus build is written to its own version directory
//! (`versions/<id>/corpus.redb`) and validated before a `CURRENT` pointer
//! file is atomically replaced to activate it. A failed build never
//! touches the pointer, so the previous corpus stays loadable throughout.
//! Only the passage records and embedding vectors are persisted; the
//! lexical index is rebuilt in memory from passage text at load time.
//!
//! Binary format per embedding entry:
//! - 4 bytes: dimension D (u32 LE)
//! - D * 4 bytes: f32 LE values

use std::path::{Path, PathBuf};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    corpus::Corpus,
    error::{Error, Result},
    passage::Passage,
};

const PASSAGES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("passages");
const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");
const META: TableDefinition<&str, &str> = TableDefinition::new("meta");

/// Header size: 4 bytes dimension.
const HEADER_SIZE: usize = 4;

const CURRENT_FILE: &str = "CURRENT";
const VERSIONS_DIR: &str = "versions";
const DB_FILE: &str = "corpus.redb";

/// Versioned on-disk corpus store rooted at the data directory.
pub struct CorpusStore {
    root: PathBuf,
}

impl CorpusStore {
    /// Open (or initialize) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let versions = root.join(VERSIONS_DIR);
        std::fs::create_dir_all(&versions)
            .map_err(|_| Error::DataDir(versions.clone()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// The active version identifier, if a corpus has been published.
    pub fn current_version(&self) -> Result<Option<String>> {
        let path = self.root.join(CURRENT_FILE);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the active corpus.
    pub fn load(&self) -> Result<Corpus> {
        let version =
            self.current_version()?.ok_or_else(|| Error::NotFound {
                kind: "corpus",
                name: "no version has been published yet".into(),
            })?;
        self.load_version(&version)
    }

    /// Persist a corpus as a new version, validate it, then atomically
    /// repoint `CURRENT`. Stale versions are pruned only after the swap
    /// succeeds.
    pub fn publish(&self, corpus: &Corpus) -> Result<String> {
        let version = self.next_version()?;
        let dir = self.version_dir(&version);
        std::fs::create_dir_all(&dir)
            .map_err(|_| Error::DataDir(dir.clone()))?;

        self.write_version(&dir, corpus)?;

        // Read the new version back before activating it; a corrupt write
        // must never become the active corpus.
        self.load_version(&version)?;

        self.swap_current(&version)?;
        self.prune_stale(&version);

        tracing::info!(
            "published corpus version {version} ({} passages)",
            corpus.len()
        );
        Ok(version)
    }

    fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(VERSIONS_DIR).join(version)
    }

    fn next_version(&self) -> Result<String> {
        let versions = self.root.join(VERSIONS_DIR);
        let mut max = 0u64;
        for entry in std::fs::read_dir(&versions)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(n) = name
                .to_string_lossy()
                .strip_prefix('v')
                .and_then(|s| s.parse::<u64>().ok())
            {
                max = max.max(n);
            }
        }
        Ok(format!("v{:06}", max + 1))
    }

    fn write_version(&self, dir: &Path, corpus: &Corpus) -> Result<()> {
        let db = Database::create(dir.join(DB_FILE))?;
        let txn = db.begin_write()?;
        {
            let mut passages = txn.open_table(PASSAGES)?;
            let mut embeddings = txn.open_table(EMBEDDINGS)?;
            let mut meta = txn.open_table(META)?;

            for (ordinal, passage) in corpus.all().iter().enumerate() {
                let record = serde_json::to_vec(passage).map_err(|e| {
                    Error::Config(format!(
                        "could not serialize passage {}: {e}",
                        passage.id
                    ))
                })?;
                passages.insert(ordinal as u64, record.as_slice())?;

                let vector = corpus.embedding(ordinal);
                let mut bytes =
                    Vec::with_capacity(HEADER_SIZE + vector.len() * 4);
                bytes.extend_from_slice(
                    &(vector.len() as u32).to_le_bytes(),
                );
                bytes.extend_from_slice(bytemuck::cast_slice(vector));
                embeddings.insert(ordinal as u64, bytes.as_slice())?;
            }

            meta.insert("passage_count", corpus.len().to_string().as_str())?;
            meta.insert(
                "dimension",
                corpus.dimension().to_string().as_str(),
            )?;
            meta.insert("embedding_model", corpus.embedding_model())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load a specific version, verifying index integrity.
    pub fn load_version(&self, version: &str) -> Result<Corpus> {
        let db_path = self.version_dir(version).join(DB_FILE);
        if !db_path.exists() {
            return Err(Error::IndexCorrupt(format!(
                "version {version} has no database file"
            )));
        }
        let db = Database::create(db_path)?;
        let txn = db.begin_read()?;

        let meta = txn.open_table(META)?;
        let expected_count: usize = read_meta(&meta, "passage_count")?
            .parse()
            .map_err(|_| {
                Error::IndexCorrupt("passage_count is not a number".into())
            })?;
        let dimension: usize =
            read_meta(&meta, "dimension")?.parse().map_err(|_| {
                Error::IndexCorrupt("dimension is not a number".into())
            })?;
        let model = read_meta(&meta, "embedding_model")?;

        let passages_table = txn.open_table(PASSAGES)?;
        let mut passages: Vec<Passage> = Vec::with_capacity(expected_count);
        for entry in passages_table.iter()? {
            let (_, value) = entry?;
            let passage: Passage = serde_json::from_slice(value.value())
                .map_err(|e| {
                    Error::IndexCorrupt(format!(
                        "unreadable passage record: {e}"
                    ))
                })?;
            passages.push(passage);
        }

        let embeddings_table = txn.open_table(EMBEDDINGS)?;
        let mut embeddings: Vec<Vec<f32>> =
            Vec::with_capacity(expected_count);
        for entry in embeddings_table.iter()? {
            let (_, value) = entry?;
            embeddings.push(decode_embedding(value.value(), dimension)?);
        }

        if passages.len() != expected_count {
            return Err(Error::IndexCorrupt(format!(
                "expected {expected_count} passages, found {}",
                passages.len()
            )));
        }
        if embeddings.len() != passages.len() {
            return Err(Error::IndexCorrupt(format!(
                "{} passages but {} embedding vectors",
                passages.len(),
                embeddings.len()
            )));
        }

        Corpus::build(passages, embeddings, model)
            .map_err(|e| Error::IndexCorrupt(e.to_string()))
    }

    fn swap_current(&self, version: &str) -> Result<()> {
        let tmp = self.root.join(format!("{CURRENT_FILE}.tmp"));
        std::fs::write(&tmp, version)?;
        std::fs::rename(&tmp, self.root.join(CURRENT_FILE))?;
        Ok(())
    }

    fn prune_stale(&self, keep: &str) {
        let versions = self.root.join(VERSIONS_DIR);
        let Ok(entries) = std::fs::read_dir(&versions) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy() != keep
                && std::fs::remove_dir_all(entry.path()).is_err()
            {
                tracing::warn!(
                    "could not prune stale corpus version {}",
                    name.to_string_lossy()
                );
            }
        }
    }
}

impl std::fmt::Debug for CorpusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusStore")
            .field("root", &self.root)
            .finish()
    }
}

fn read_meta(
    table: &impl ReadableTable<&'static str, &'static str>,
    key: &str,
) -> Result<String> {
    Ok(table
        .get(key)?
        .ok_or_else(|| {
            Error::IndexCorrupt(format!("meta key '{key}' is missing"))
        })?
        .value()
        .to_string())
}

fn decode_embedding(bytes: &[u8], expected_dim: usize) -> Result<Vec<f32>> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::IndexCorrupt(
            "embedding entry shorter than its header".into(),
        ));
    }
    let dim = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    if dim != expected_dim {
        return Err(Error::IndexCorrupt(format!(
            "embedding dimension {dim} does not match corpus dimension {expected_dim}"
        )));
    }
    if bytes.len() != HEADER_SIZE + dim * 4 {
        return Err(Error::IndexCorrupt(
            "embedding entry length does not match its dimension".into(),
        ));
    }
    // pod_collect_to_vec copies, so the database value's alignment does
    // not matter.
    Ok(bytemuck::pod_collect_to_vec(&bytes[HEADER_SIZE..]))
}
