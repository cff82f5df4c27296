//! Core data model: search results and embedding vectors.
//!
//! These types cross the wire in both directions, so their serialized shape
//! is part of the platform contract: a [`SearchResult`] serializes as
//! `{"fields": [{key, content, llm_disabled, show_disabled}, ...]}` and an
//! [`EmbeddingItem`] as `{"embedding": [...], "id": "...", "similarity": n}`.

use serde::{Deserialize, Serialize};

/// One named value inside a search result.
///
/// `key` is expected to be non-empty and stable across results from the same
/// spider. The two flags redact the field from downstream consumers without
/// dropping it: `llm_disabled` excludes it from language-model consumption,
/// `show_disabled` from end-user rendering. Fields are immutable after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultField {
    key: String,
    content: String,
    #[serde(default)]
    llm_disabled: bool,
    #[serde(default)]
    show_disabled: bool,
}

impl SearchResultField {
    /// Builds a field visible to both language models and end users.
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
            llm_disabled: false,
            show_disabled: false,
        }
    }

    /// Marks the field as excluded from language-model consumption.
    pub fn with_llm_disabled(mut self, disabled: bool) -> Self {
        self.llm_disabled = disabled;
        self
    }

    /// Marks the field as excluded from end-user rendering.
    pub fn with_show_disabled(mut self, disabled: bool) -> Self {
        self.show_disabled = disabled;
        self
    }

    /// Column name this field answers for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The matched value.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the field is withheld from language-model consumption.
    pub fn llm_disabled(&self) -> bool {
        self.llm_disabled
    }

    /// Whether the field is withheld from end-user rendering.
    pub fn show_disabled(&self) -> bool {
        self.show_disabled
    }
}

/// One matched record: an ordered sequence of fields.
///
/// Field order is display/consumption order and is preserved end to end.
/// Keys are not required to be unique; consumers treat the first occurrence
/// of a key as authoritative (see [`SearchResult::field`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    fields: Vec<SearchResultField>,
}

impl SearchResult {
    /// Wraps an already-ordered list of fields.
    pub fn new(fields: Vec<SearchResultField>) -> Self {
        Self { fields }
    }

    /// Builds a result from column/value pairs, redacting the named columns.
    ///
    /// Suppression sets the matching redaction flag rather than dropping the
    /// field, so a record always carries every column its spider produced.
    /// Pair order is preserved as field order.
    pub fn from_columns<I, K, V>(
        pairs: I,
        llm_disabled_columns: &[&str],
        show_disabled_columns: &[&str],
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = pairs
            .into_iter()
            .map(|(key, content)| {
                let key = key.into();
                let llm_disabled = llm_disabled_columns.contains(&key.as_str());
                let show_disabled = show_disabled_columns.contains(&key.as_str());
                SearchResultField::new(key, content)
                    .with_llm_disabled(llm_disabled)
                    .with_show_disabled(show_disabled)
            })
            .collect();
        Self { fields }
    }

    /// All fields in display order.
    pub fn fields(&self) -> &[SearchResultField] {
        &self.fields
    }

    /// First field carrying the given key, the authoritative occurrence.
    pub fn field(&self, key: &str) -> Option<&SearchResultField> {
        self.fields.iter().find(|f| f.key() == key)
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchResultField> {
        self.fields.iter()
    }
}

impl IntoIterator for SearchResult {
    type Item = SearchResultField;
    type IntoIter = std::vec::IntoIter<SearchResultField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// A stored embedding vector with its application-side identifier.
///
/// `similarity` is not produced by the owning store: similarity search
/// callers set it after retrieval via [`EmbeddingItem::set_similarity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingItem {
    embedding: Vec<f32>,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    similarity: Option<f32>,
}

impl EmbeddingItem {
    /// Pairs a vector with the identifier it is stored under.
    pub fn new(embedding: Vec<f32>, id: impl Into<String>) -> Self {
        Self {
            embedding,
            id: id.into(),
            similarity: None,
        }
    }

    /// The raw vector.
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Identifier of this vector in the owning application's store.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Vector dimensionality.
    pub fn dim(&self) -> usize {
        self.embedding.len()
    }

    /// Similarity against some query vector, if one has been recorded.
    pub fn similarity(&self) -> Option<f32> {
        self.similarity
    }

    /// Records the similarity score computed for this item.
    pub fn set_similarity(&mut self, similarity: f32) {
        self.similarity = Some(similarity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_roundtrips_through_serialization() {
        let field = SearchResultField::new("name", "Arisa").with_show_disabled(true);
        let json = serde_json::to_string(&field).unwrap();
        let back: SearchResultField = serde_json::from_str(&json).unwrap();
        assert_eq!(back, field);
        assert_eq!(back.key(), "name");
        assert_eq!(back.content(), "Arisa");
        assert!(!back.llm_disabled());
        assert!(back.show_disabled());
    }

    #[test]
    fn field_flags_default_to_false_on_deserialization() {
        let back: SearchResultField =
            serde_json::from_str(r#"{"key":"name","content":"Arisa"}"#).unwrap();
        assert!(!back.llm_disabled());
        assert!(!back.show_disabled());
    }

    #[test]
    fn from_columns_suppresses_by_flagging_not_dropping() {
        let result = SearchResult::from_columns(
            [
                ("name", "Arisa"),
                ("password", "hunter2"),
                ("band", "Poppin'Party"),
            ],
            &["password"],
            &["password", "band"],
        );

        // Every declared column survives, in declaration order.
        assert_eq!(result.len(), 3);
        let keys: Vec<_> = result.iter().map(|f| f.key().to_string()).collect();
        assert_eq!(keys, ["name", "password", "band"]);

        let password = result.field("password").unwrap();
        assert!(password.llm_disabled());
        assert!(password.show_disabled());
        assert_eq!(password.content(), "hunter2");

        let band = result.field("band").unwrap();
        assert!(!band.llm_disabled());
        assert!(band.show_disabled());

        let name = result.field("name").unwrap();
        assert!(!name.llm_disabled());
        assert!(!name.show_disabled());
    }

    #[test]
    fn first_occurrence_of_a_key_is_authoritative() {
        let result = SearchResult::new(vec![
            SearchResultField::new("name", "first"),
            SearchResultField::new("name", "second"),
        ]);
        assert_eq!(result.field("name").unwrap().content(), "first");
    }

    #[test]
    fn result_serializes_as_a_fields_object() {
        let result = SearchResult::from_columns([("name", "Arisa")], &[], &[]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["fields"][0]["key"], "name");
        assert_eq!(value["fields"][0]["content"], "Arisa");
        assert_eq!(value["fields"][0]["llm_disabled"], false);
    }

    #[test]
    fn similarity_is_set_after_retrieval() {
        let mut item = EmbeddingItem::new(vec![0.1, 0.2, 0.3], "doc-1");
        assert_eq!(item.similarity(), None);
        assert_eq!(item.dim(), 3);

        item.set_similarity(0.87);
        assert_eq!(item.similarity(), Some(0.87));

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "doc-1");
        assert!((json["similarity"].as_f64().unwrap() - 0.87).abs() < 1e-6);
    }
}
