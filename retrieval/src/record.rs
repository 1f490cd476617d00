//! Era record model and load-time validation.
//!
//! An era record is the persisted unit for one (concept, era) pair. Records
//! are read leniently: an item missing a required field, or carrying an
//! unusable embedding, is dropped with a warning instead of failing the
//! whole era.

use echoes_embeddings::{Embedded, Embedding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// One embedded example sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleItem {
    /// `<concept>_<era>_<index>`, unique within the era.
    pub id: String,

    /// The example sentence.
    pub text: String,

    /// Era label.
    pub era: String,

    /// Embedding of `text`.
    pub embedding: Embedding,
}

impl Embedded for ExampleItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

/// Metadata stored next to an era's items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraMeta {
    pub concept: String,
    pub era: String,
    pub count: usize,

    /// Model that wrote the example sentences. Absent for corpus-built records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Model that produced the embeddings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

/// All items for one (concept, era) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraRecord {
    pub items: Vec<ExampleItem>,
    pub meta: EraMeta,
}

/// Why a stored item was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("item {index}: {reason}")]
pub struct InvalidItem {
    pub index: usize,
    pub reason: String,
}

impl InvalidItem {
    fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

impl EraRecord {
    /// Create a record, filling `meta.count` from `items`.
    pub fn new(
        concept: impl Into<String>,
        era: impl Into<String>,
        items: Vec<ExampleItem>,
    ) -> Self {
        let meta = EraMeta {
            concept: concept.into(),
            era: era.into(),
            count: items.len(),
            model: None,
            embedding_model: None,
        };
        Self { items, meta }
    }

    /// Set the text and embedding model names.
    pub fn with_models(mut self, model: Option<String>, embedding_model: Option<String>) -> Self {
        self.meta.model = model;
        self.meta.embedding_model = embedding_model;
        self
    }

    /// Era label.
    pub fn era(&self) -> &str {
        &self.meta.era
    }

    /// Rebuild a record from its stored JSON, keeping only valid items.
    ///
    /// `concept` and `era` come from the record's location on disk and take
    /// precedence over whatever the stored metadata says. Fails only when
    /// the document itself is unusable.
    pub fn from_value(concept: &str, era: &str, value: Value) -> Result<Self, String> {
        let Value::Object(mut document) = value else {
            return Err("record is not a JSON object".to_string());
        };

        let raw_items = match document.remove("items") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'items' is not a list".to_string()),
            None => Vec::new(),
        };

        let mut items = Vec::with_capacity(raw_items.len());
        let mut dimension = None;
        for (index, raw) in raw_items.into_iter().enumerate() {
            match validate_item(index, raw, era) {
                Ok(item) => {
                    let expected = *dimension.get_or_insert(item.embedding.len());
                    if item.embedding.len() == expected {
                        items.push(item);
                    } else {
                        let actual = item.embedding.len();
                        warn!(
                            "Skipping invalid item in {concept}/{era}: item {index}: \
                             embedding has {actual} dimensions, expected {expected}"
                        );
                    }
                }
                Err(e) => warn!("Skipping invalid item in {concept}/{era}: {e}"),
            }
        }

        let stored = document
            .remove("meta")
            .and_then(|meta| serde_json::from_value::<EraMeta>(meta).ok());
        let (model, embedding_model) = stored
            .map(|meta| (meta.model, meta.embedding_model))
            .unwrap_or_default();

        Ok(Self::new(concept, era, items).with_models(model, embedding_model))
    }
}

/// Validate one stored item.
///
/// `id` and `text` must be strings, `text` non-blank, and `embedding` a
/// non-empty list of numbers. A missing `era` is filled from the record.
pub fn validate_item(index: usize, value: Value, era: &str) -> Result<ExampleItem, InvalidItem> {
    let Value::Object(mut fields) = value else {
        return Err(InvalidItem::new(index, "not an object"));
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(InvalidItem::new(index, "'id' is not a string")),
        None => return Err(InvalidItem::new(index, "missing required field: id")),
    };

    let text = match fields.remove("text") {
        Some(Value::String(text)) if !text.trim().is_empty() => text,
        Some(Value::String(_)) => {
            return Err(InvalidItem::new(index, format!("item {id} has empty text")));
        }
        Some(_) => return Err(InvalidItem::new(index, "'text' is not a string")),
        None => return Err(InvalidItem::new(index, "missing required field: text")),
    };

    let embedding = match fields.remove("embedding") {
        Some(Value::Array(values)) => parse_embedding(&values).ok_or_else(|| {
            InvalidItem::new(index, format!("item {id} has non-numeric embedding"))
        })?,
        Some(other) => {
            return Err(InvalidItem::new(
                index,
                format!("item {id} has invalid embedding type: {}", json_type(&other)),
            ));
        }
        None => return Err(InvalidItem::new(index, "missing required field: embedding")),
    };
    if embedding.is_empty() {
        return Err(InvalidItem::new(index, format!("item {id} has empty embedding")));
    }

    let era = match fields.remove("era") {
        Some(Value::String(era)) => era,
        _ => era.to_string(),
    };

    Ok(ExampleItem {
        id,
        text,
        era,
        embedding,
    })
}

fn parse_embedding(values: &[Value]) -> Option<Embedding> {
    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
