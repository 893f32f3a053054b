//! Output schema: the ordered set of top-level fields a source keeps.
//!
//! [`Schema`] is an immutable configuration value; [`SchemaFilter`] wraps it
//! with a hash index for the per-key membership test done while building
//! batches.

use std::collections::HashSet;
use std::sync::Arc;

/// Top-level Article Search fields kept by default.
///
/// See <https://developer.nytimes.com/docs/articlesearch-product/1/routes/articlesearch.json/get>
/// for the other keys a document may carry.
pub const ARTICLE_SEARCH_FIELDS: [&str; 13] = [
    "abstract",
    "web_url",
    "snippet",
    "headline",
    "pub_date",
    "document_type",
    "news_desk",
    "section_name",
    "subsection_name",
    "type_of_material",
    "word_count",
    "uri",
    "_id",
];

/// Ordered, duplicate-free list of field names. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Arc<[String]>,
}

impl Schema {
    /// Build a schema from any list of names. Later duplicates are dropped
    /// so the first occurrence fixes the position.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let fields: Vec<String> = fields
            .into_iter()
            .map(Into::into)
            .filter(|f| seen.insert(f.clone()))
            .collect();
        Schema {
            fields: fields.into(),
        }
    }

    /// The fixed Article Search schema.
    pub fn article_search() -> Self {
        Self::new(ARTICLE_SEARCH_FIELDS)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::article_search()
    }
}

/// Exact, case-sensitive membership test over a [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaFilter {
    schema: Schema,
    index: HashSet<String>,
}

impl SchemaFilter {
    pub fn new(schema: Schema) -> Self {
        let index = schema.fields().iter().cloned().collect();
        SchemaFilter { schema, index }
    }

    /// Whether the top-level `key` should be flattened into the output.
    pub fn is_selected(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// The schema's field names in declaration order. Introspection only;
    /// filtering goes through [`SchemaFilter::is_selected`].
    pub fn fields(&self) -> &[String] {
        self.schema.fields()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl Default for SchemaFilter {
    fn default() -> Self {
        Self::new(Schema::default())
    }
}
