//! Timeline building.
//!
//! A timeline walks a concept's eras in file-name order. Each entry carries
//! the items closest to the query and the drift of the era's centroid from
//! the centroid of the nearest preceding era that had data.

use std::sync::Arc;

use echoes_embeddings::{
    EmbeddingProvider, EmbeddingRequest, Embedding, ScoredItem, centroid, top_similar, try_drift,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::record::EraRecord;
use crate::store::{EraLookup, EraStore, normalize_concept};

/// Drift values across eras for one concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub concept: String,
    pub timeline: Vec<TimelineEntry>,

    /// Set when the timeline is empty because the concept does not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TimelineError>,
}

impl Timeline {
    fn concept_not_found(concept: &str) -> Self {
        Self {
            concept: concept.to_string(),
            timeline: Vec::new(),
            error: Some(TimelineError::ConceptNotFound),
        }
    }
}

/// Structured marker for a timeline that could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineError {
    ConceptNotFound,
}

/// One era in a timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub era: String,
    pub top: Vec<ScoredItem>,

    /// `1 - cosine` against `previous_era`; 0.0 for the first era.
    pub drift_from_previous: f32,

    /// Era the drift was measured against.
    pub previous_era: Option<String>,
}

/// Top items for a single era.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EraView {
    pub concept: String,
    pub era: String,
    pub top: Vec<ScoredItem>,
    pub total_items: usize,
}

/// Builds timelines and era views from stored records.
#[derive(Clone)]
pub struct TimelineBuilder {
    store: EraStore,
    provider: Arc<dyn EmbeddingProvider>,
}

impl TimelineBuilder {
    /// `provider` embeds concept names for the `query_*` methods.
    pub fn new(store: EraStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    /// Build the timeline of `concept` ranked against `query`.
    ///
    /// A missing concept yields an empty timeline with
    /// [`TimelineError::ConceptNotFound`].
    pub async fn build_timeline(
        &self,
        concept: &str,
        query: &[f32],
        top_n: usize,
    ) -> Result<Timeline> {
        let concept = normalize_concept(concept)?;
        let Some(eras) = self.store.load_concept(&concept).await? else {
            return Ok(Timeline::concept_not_found(&concept));
        };
        Ok(chain(&concept, eras, query, top_n))
    }

    /// Build the timeline of `concept` ranked against the concept name itself.
    ///
    /// The concept name is only embedded once the concept is known to exist.
    pub async fn query_timeline(&self, concept: &str, top_n: usize) -> Result<Timeline> {
        let concept = normalize_concept(concept)?;
        let Some(eras) = self.store.load_concept(&concept).await? else {
            return Ok(Timeline::concept_not_found(&concept));
        };
        let query = self.embed_concept(&concept).await?;
        Ok(chain(&concept, eras, &query, top_n))
    }

    /// Top items of one era ranked against `query`.
    pub async fn era_view(
        &self,
        concept: &str,
        era: &str,
        query: &[f32],
        top_n: usize,
    ) -> Result<EraLookup<EraView>> {
        let lookup = self.store.load_era(concept, era).await?;
        Ok(lookup.map(|record| view(record, query, top_n)))
    }

    /// Top items of one era ranked against the concept name.
    ///
    /// The concept name is only embedded once the era is known to exist.
    pub async fn query_era_view(
        &self,
        concept: &str,
        era: &str,
        top_n: usize,
    ) -> Result<EraLookup<EraView>> {
        let lookup = self.store.load_era(concept, era).await?;
        let query = match &lookup {
            EraLookup::Found(record) => self.embed_concept(&record.meta.concept).await?,
            _ => Embedding::new(),
        };
        Ok(lookup.map(|record| view(record, &query, top_n)))
    }

    async fn embed_concept(&self, concept: &str) -> Result<Embedding> {
        let response = self.provider.embed(EmbeddingRequest::new(concept)).await?;
        Ok(response.embedding)
    }
}

fn chain(concept: &str, eras: Vec<EraRecord>, query: &[f32], top_n: usize) -> Timeline {
    if eras.is_empty() {
        warn!("No eras found for concept '{concept}'");
    }

    let mut timeline = Vec::with_capacity(eras.len());
    let mut previous: Option<(String, Option<Embedding>)> = None;

    for record in eras {
        let era = record.era().to_string();
        let top = top_similar(query, &record.items, top_n);
        let current = centroid(&record.items);

        let (drift_from_previous, previous_era) = match previous.take() {
            None => (0.0, None),
            Some((label, prev)) => {
                let drift = try_drift(prev.as_deref(), current.as_deref()).unwrap_or_else(|| {
                    warn!("No comparable centroids for {label} -> {era}; reporting no drift");
                    0.0
                });
                (drift, Some(label))
            }
        };
        debug!(
            "{concept}/{era}: {} items, drift {drift_from_previous:.4}",
            record.items.len()
        );

        timeline.push(TimelineEntry {
            era: era.clone(),
            top,
            drift_from_previous,
            previous_era,
        });
        previous = Some((era, current));
    }

    info!("Built timeline for '{concept}' with {} eras", timeline.len());
    Timeline {
        concept: concept.to_string(),
        timeline,
        error: None,
    }
}

fn view(record: EraRecord, query: &[f32], top_n: usize) -> EraView {
    EraView {
        top: top_similar(query, &record.items, top_n),
        total_items: record.items.len(),
        concept: record.meta.concept,
        era: record.meta.era,
    }
}
