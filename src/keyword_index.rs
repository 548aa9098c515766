//! In-memory BM25 keyword index over the full corpus.
//!
//! The index is rebuilt from scratch every time it is constructed, from a
//! full scan of the vector index. That is fine for a personal vault of a
//! few thousand notes; past that, build time dominates query time and an
//! incrementally maintained on-disk index would be needed.

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    ReloadPolicy,
    TantivyDocument,
    collector::TopDocs,
    doc,
    query::QueryParser,
    schema::*,
    tokenizer::{
        Language,
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{document::Chunk, error::Result};

/// Field names used in the schema.
pub mod fields {
    pub const ORDINAL: &str = "ordinal";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
}

const TOKENIZER: &str = "en_stem";

/// Smallest writer heap tantivy accepts for a single indexing thread.
const WRITER_HEAP_BYTES: usize = 15_000_000;

#[derive(Clone, Copy)]
struct SchemaFields {
    ordinal: Field,
    title: Field,
    body: Field,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let ordinal = builder.add_u64_field(fields::ORDINAL, STORED | FAST);

    let text_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let title = builder.add_text_field(fields::TITLE, text_opts.clone());
    let body = builder.add_text_field(fields::BODY, text_opts);

    (
        builder.build(),
        SchemaFields {
            ordinal,
            title,
            body,
        },
    )
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build();
    index.tokenizers().register(TOKENIZER, en_stem);
}

/// A keyword index over a fixed snapshot of chunks.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
    chunks: Vec<Chunk>,
}

impl KeywordIndex {
    /// Index every chunk. The position of a chunk in `chunks` is its
    /// corpus order, used to break score ties.
    pub fn build(chunks: Vec<Chunk>) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index);

        let mut writer: IndexWriter =
            index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        for (ordinal, chunk) in chunks.iter().enumerate() {
            writer.add_document(doc!(
                fields.ordinal => ordinal as u64,
                fields.title => chunk.title.as_str(),
                fields.body => chunk.content.as_str(),
            ))?;
        }
        writer.commit()?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        reader.reload()?;

        tracing::debug!(chunks = chunks.len(), "built keyword index");
        Ok(Self {
            index,
            reader,
            fields,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Return at most `k` chunks ranked by BM25, ties broken by corpus
    /// order. Titles are boosted 2x.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let mut parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.title, self.fields.body],
        );
        parser.set_field_boost(self.fields.title, 2.0);
        let (parsed, _errors) = parser.parse_query_lenient(query);

        // Every match is collected so ties at the k-th score are decided by
        // ordinal rather than by segment position.
        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(self.chunks.len()))?;

        let mut scored = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let ordinal = doc
                .get_first(self.fields.ordinal)
                .and_then(|v| v.as_u64())
                .unwrap_or(u64::MAX);
            scored.push((score, ordinal));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .filter_map(|(_, ordinal)| self.chunks.get(ordinal as usize))
            .take(k)
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for KeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordIndex")
            .field("chunks", &self.chunks.len())
            .finish_non_exhaustive()
    }
}
