use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::snippet::SnippetGenerator;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

const WRITER_HEAP_BYTES: usize = 15_000_000;
const SNIPPET_MAX_CHARS: usize = 160;

/// Flattened page record pushed to the full-text index on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub page_id: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// A single search result with relevance score and snippet.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub page_id: String,
    pub title: String,
    pub snippet: String,
    pub score: f32,
}

pub trait FullTextIndex: Send + Sync {
    /// Add the item, replacing any earlier record for the same page.
    fn upsert(&self, item: &SearchItem) -> Result<()>;
    fn delete(&self, page_id: &str) -> Result<()>;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

#[derive(Clone, Copy)]
struct Fields {
    page_id: Field,
    title: Field,
    body: Field,
    tags: Field,
}

/// Full-text search index backed by tantivy.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl SearchIndex {
    /// Open or create an index stored in `path`.
    pub fn new(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let (schema, fields) = build_schema();
        let index = Index::open_or_create(MmapDirectory::open(path)?, schema)?;
        Self::from_index(index, fields)
    }

    /// Create a new SearchIndex backed by RAM (for tests).
    pub fn new_in_memory() -> Result<Self> {
        let (schema, fields) = build_schema();
        Self::from_index(Index::create_in_ram(schema), fields)
    }

    fn from_index(index: Index, fields: Fields) -> Result<Self> {
        let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let fields = Fields {
        page_id: builder.add_text_field("page_id", STRING | STORED),
        title: builder.add_text_field("title", TEXT | STORED),
        body: builder.add_text_field("body", TEXT | STORED),
        tags: builder.add_text_field("tags", TEXT | STORED),
    };
    (builder.build(), fields)
}

impl FullTextIndex for SearchIndex {
    fn upsert(&self, item: &SearchItem) -> Result<()> {
        let f = self.fields;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.delete_term(Term::from_field_text(f.page_id, &item.page_id));
        writer.add_document(doc!(
            f.page_id => item.page_id.as_str(),
            f.title => item.title.as_str(),
            f.body => item.body.as_str(),
            f.tags => item.tags.join(" "),
        ))?;
        self.commit(&mut writer)
    }

    fn delete(&self, page_id: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.delete_term(Term::from_field_text(self.fields.page_id, page_id));
        self.commit(&mut writer)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let f = self.fields;
        let searcher = self.reader.searcher();

        let mut parser = QueryParser::for_index(&self.index, vec![f.title, f.body, f.tags]);
        parser.set_conjunction_by_default();
        parser.set_field_boost(f.title, 3.0);
        let (query, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!("Search query parsed leniently: {:?}", errors);
        }

        let hits = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut snippets = SnippetGenerator::create(&searcher, &*query, f.body)?;
        snippets.set_max_num_chars(SNIPPET_MAX_CHARS);

        let mut results = Vec::with_capacity(hits.len());
        for (score, address) in hits {
            let stored: TantivyDocument = searcher.doc(address)?;
            let text = |field: Field| {
                stored
                    .get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let mut snippet = snippets.snippet_from_doc(&stored);
            snippet.set_snippet_prefix_postfix("<mark>", "</mark>");

            results.push(SearchResult {
                page_id: text(f.page_id),
                title: text(f.title),
                snippet: snippet.to_html(),
                score,
            });
        }
        Ok(results)
    }
}
