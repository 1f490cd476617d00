//! Embedding store writer: example sentences in, era records on disk out.

use std::path::PathBuf;
use std::sync::Arc;

use echoes_embeddings::{EmbeddingError, EmbeddingProvider, EmbeddingRequest};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::record::{EraRecord, ExampleItem};
use crate::store::{EraStore, normalize_concept, validate_label};

/// One era record written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenEra {
    pub era: String,
    pub path: PathBuf,
    pub count: usize,
    pub embedding_model: String,
}

/// Embeds example sentences and persists them per (concept, era).
#[derive(Clone)]
pub struct EmbeddingStoreWriter {
    provider: Arc<dyn EmbeddingProvider>,
    store: EraStore,
}

impl EmbeddingStoreWriter {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: EraStore) -> Self {
        Self { provider, store }
    }

    /// The store records are written to.
    pub fn store(&self) -> &EraStore {
        &self.store
    }

    /// The embedding provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed `texts` and write them as the record for (`concept`, `era`).
    ///
    /// Blank texts are skipped. Returns `None`, writing nothing, when no
    /// text is left. `text_model` is recorded as the model that wrote the
    /// sentences.
    pub async fn write_era(
        &self,
        concept: &str,
        era: &str,
        texts: &[String],
        text_model: Option<&str>,
    ) -> Result<Option<WrittenEra>> {
        let concept = normalize_concept(concept)?;
        let era = validate_label("era", era)?;

        let texts: Vec<&str> = texts
            .iter()
            .map(String::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            warn!("No texts for {concept}/{era}, skipping");
            return Ok(None);
        }

        info!("Generating {} embeddings for {concept}/{era}", texts.len());

        let requests = texts.iter().map(|&t| EmbeddingRequest::new(t)).collect();
        let responses = self.provider.embed_batch(requests).await?;
        if responses.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                responses.len()
            ))
            .into());
        }

        let dimension = responses.first().map_or(0, |r| r.embedding.len());
        let embedding_model = responses
            .first()
            .map_or_else(|| self.provider.default_model().to_string(), |r| r.model.clone());

        let mut items = Vec::with_capacity(texts.len());
        for (index, (text, response)) in texts.iter().zip(responses).enumerate() {
            if response.embedding.is_empty() || response.embedding.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: response.embedding.len(),
                }
                .into());
            }
            items.push(ExampleItem {
                id: format!("{concept}_{era}_{index}"),
                text: (*text).to_string(),
                era: era.to_string(),
                embedding: response.embedding,
            });
        }

        let record = EraRecord::new(concept.as_str(), era, items).with_models(
            text_model.map(ToString::to_string),
            Some(embedding_model.clone()),
        );
        let path = self.store.write(&record).await?;

        info!("Created embeddings file: {}", path.display());
        Ok(Some(WrittenEra {
            era: era.to_string(),
            path,
            count: record.items.len(),
            embedding_model,
        }))
    }
}
