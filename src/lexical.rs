//! Lexical retrieval: BM25 keyword scoring over passage text.
//!
//! The index lives in RAM and is rebuilt from the corpus's passage text at
//! load time; only the passage records themselves are persisted. Scoring
//! uses BM25 (term-frequency saturation, inverse document frequency, and
//! passage-length normalization against the corpus average).

use tantivy::{
    Index,
    IndexReader,
    TantivyDocument,
    collector::TopDocs,
    doc,
    query::QueryParser,
    schema::{FAST, Field, STORED, Schema, TextFieldIndexing, TextOptions, Value},
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{
    corpus::Corpus,
    error::{Error, Result},
    fusion::RankedResult,
    passage::PassageId,
};

/// Field names used in the schema.
mod fields {
    pub const PASSAGE_ID: &str = "passage_id";
    pub const ORDINAL: &str = "ordinal";
    pub const TEXT: &str = "text";
}

#[derive(Clone, Copy)]
struct SchemaFields {
    passage_id: Field,
    ordinal: Field,
    text: Field,
}

/// In-memory BM25 index over a corpus's passages.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let passage_id = builder.add_u64_field(fields::PASSAGE_ID, STORED | FAST);
    let ordinal = builder.add_u64_field(fields::ORDINAL, STORED | FAST);

    let text_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default().set_tokenizer("en_stem").set_index_option(
            tantivy::schema::IndexRecordOption::WithFreqsAndPositions,
        ),
    );
    let text = builder.add_text_field(fields::TEXT, text_opts);

    let schema = builder.build();
    (
        schema,
        SchemaFields {
            passage_id,
            ordinal,
            text,
        },
    )
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

impl LexicalIndex {
    /// Build the index from every passage in the corpus.
    pub fn build(corpus: &Corpus) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index);

        let mut writer = index.writer(15_000_000)?;
        for (ordinal, passage) in corpus.all().iter().enumerate() {
            writer.add_document(doc!(
                fields.passage_id => passage.id.0,
                fields.ordinal => ordinal as u64,
                fields.text => passage.text.as_str(),
            ))?;
        }
        writer.commit()?;

        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Search the index with BM25 scoring.
    ///
    /// Returns at most `k` results ordered by descending score; ties are
    /// broken by passage insertion order (earlier wins). A query with no
    /// vocabulary overlap yields an empty list, not an error.
    pub fn search(
        &self,
        query_str: &str,
        k: usize,
    ) -> Result<Vec<RankedResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "result count k must be at least 1".into(),
            ));
        }

        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parser =
            QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (query, _errors) = parser.parse_query_lenient(query_str);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let passage_id = doc
                .get_first(self.fields.passage_id)
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let ordinal = doc
                .get_first(self.fields.ordinal)
                .and_then(|v| v.as_u64())
                .unwrap_or(u64::MAX);
            hits.push((score, ordinal, PassageId(passage_id)));
        }

        // Tantivy's top-docs order is already score-descending, but ties
        // fall back to internal doc addresses; re-sort so equal scores
        // resolve by insertion ordinal.
        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, (score, _, passage_id))| RankedResult {
                passage_id,
                score,
                rank: i + 1,
            })
            .collect())
    }
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex").finish_non_exhaustive()
    }
}
