use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// A stable passage identifier derived from (source, page, chunk_index).
///
/// The numeric value is what retrievers and the store key on; the short
/// hex form is for human display (e.g. "#a1b2c3").
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PassageId(pub u64);

impl PassageId {
    /// Generate a stable ID from a passage's provenance.
    pub fn new(source: &str, page: Option<u32>, chunk_index: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        page.hash(&mut hasher);
        chunk_index.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Short hex rendering used in result listings.
    pub fn short(&self) -> String {
        format!("{:016x}", self.0)[..6].to_string()
    }
}

impl std::fmt::Display for PassageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short())
    }
}

/// A chunk of source text with provenance metadata, the atomic unit of
/// retrieval. Immutable once created; destroyed only by corpus rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub text: String,
    /// Path of the file this passage came from, as given at ingestion.
    pub source: String,
    /// One-based page number, when the source format has pages.
    pub page: Option<u32>,
}

impl Passage {
    pub fn new(
        text: impl Into<String>,
        source: impl Into<String>,
        page: Option<u32>,
        chunk_index: usize,
    ) -> Self {
        let source = source.into();
        let id = PassageId::new(&source, page, chunk_index);
        Self {
            id,
            text: text.into(),
            source,
            page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = PassageId::new("manual.pdf", Some(3), 0);
        let b = PassageId::new("manual.pdf", Some(3), 0);
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_by_chunk_index() {
        let a = PassageId::new("manual.pdf", Some(3), 0);
        let b = PassageId::new("manual.pdf", Some(3), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn id_differs_by_page() {
        let a = PassageId::new("manual.pdf", Some(1), 0);
        let b = PassageId::new("manual.pdf", Some(2), 0);
        assert_ne!(a, b);
    }

    #[test]
    fn display_has_hash_prefix() {
        let id = PassageId::new("notes.txt", None, 0);
        let s = id.to_string();
        assert!(s.starts_with('#'));
        assert_eq!(s.len(), 7);
    }

    #[test]
    fn passage_new_derives_id_from_provenance() {
        let p = Passage::new("alpha beta", "docs/a.txt", None, 2);
        assert_eq!(p.id, PassageId::new("docs/a.txt", None, 2));
        assert_eq!(p.text, "alpha beta");
        assert_eq!(p.page, None);
    }
}
