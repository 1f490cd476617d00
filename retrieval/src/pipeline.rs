//! Generate → embed → persist.

use std::collections::HashSet;
use std::sync::Arc;

use echoes_etymology::EvolutionGenerator;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::{normalize_concept, validate_label};
use crate::writer::{EmbeddingStoreWriter, WrittenEra};

/// Summary of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Concept the records were written under.
    pub word: String,

    /// Eras that were requested.
    pub eras: Vec<String>,

    /// Records written, in request order.
    pub files: Vec<WrittenEra>,

    pub total_items: usize,

    /// Model that wrote the sentences; `None` for corpus builds.
    pub llm_model: Option<String>,

    pub embedding_model: String,
}

impl BuildReport {
    pub(crate) fn new(
        word: &str,
        eras: Vec<String>,
        llm_model: Option<String>,
        embedding_model: &str,
    ) -> Self {
        Self {
            word: word.to_string(),
            eras,
            files: Vec::new(),
            total_items: 0,
            llm_model,
            embedding_model: embedding_model.to_string(),
        }
    }

    pub(crate) fn push(&mut self, written: WrittenEra) {
        self.total_items += written.count;
        self.embedding_model.clone_from(&written.embedding_model);
        self.files.push(written);
    }

    /// Human-readable one-line summary.
    pub fn message(&self) -> String {
        format!(
            "Created embeddings for {} eras ({} items)",
            self.files.len(),
            self.total_items
        )
    }
}

/// Produces era records for a word from the language model.
pub struct EvolutionPipeline {
    generator: Arc<EvolutionGenerator>,
    writer: EmbeddingStoreWriter,
}

impl EvolutionPipeline {
    pub fn new(generator: Arc<EvolutionGenerator>, writer: EmbeddingStoreWriter) -> Self {
        Self { generator, writer }
    }

    /// Generate examples for `word`, embed them and write one record per era.
    ///
    /// Eras the model returned nothing for are skipped. Labels are checked
    /// before the model is called.
    pub async fn build(
        &self,
        word: &str,
        eras: &[String],
        num_examples: usize,
    ) -> Result<BuildReport> {
        let concept = normalize_concept(word)?;
        let eras = eras
            .iter()
            .map(|era| validate_label("era", era).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let evolution = self.generator.generate(&concept, &eras, num_examples).await?;
        let llm_model = self.generator.model().to_string();

        let mut report = BuildReport::new(
            &concept,
            eras.clone(),
            Some(llm_model.clone()),
            self.writer.provider().default_model(),
        );
        let mut seen = HashSet::new();
        for era in &eras {
            if !seen.insert(era.as_str()) {
                continue;
            }
            let Some(texts) = evolution.get(era) else {
                warn!("No data for era {era}, skipping");
                continue;
            };
            if let Some(written) = self
                .writer
                .write_era(&concept, era, texts, Some(&llm_model))
                .await?
            {
                report.push(written);
            }
        }

        info!("{} for '{concept}'", report.message());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EraStore;
    use crate::writer::tests::LengthProvider;
    use async_trait::async_trait;
    use echoes_etymology::{CompletionRequest, EtymologyError, GenerationClient, GeneratorSettings};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedClient {
        response: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationClient for FixedClient {
        fn model(&self) -> &str {
            "fixed-llm"
        }

        async fn complete(&self, _request: CompletionRequest) -> echoes_etymology::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.to_string())
        }
    }

    fn pipeline(
        root: &std::path::Path,
        response: &'static str,
    ) -> (EvolutionPipeline, Arc<FixedClient>) {
        let client = Arc::new(FixedClient {
            response,
            calls: AtomicUsize::new(0),
        });
        let generator = EvolutionGenerator::new(client.clone(), None, GeneratorSettings::default());
        let provider = Arc::new(LengthProvider::default());
        let writer = EmbeddingStoreWriter::new(provider, EraStore::new(root));
        (EvolutionPipeline::new(Arc::new(generator), writer), client)
    }

    fn eras(labels: &[&str]) -> Vec<String> {
        labels.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_build_writes_one_record_per_returned_era() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _) = pipeline(
            dir.path(),
            r#"{
                "1900s": ["a sealed letter", "a closed study"],
                "1960s": [],
                "2020s": ["cookie banners"]
            }"#,
        );

        let report = pipeline
            .build("Privacy", &eras(&["1900s", "1960s", "2020s", "2050s"]), 2)
            .await
            .unwrap();

        assert_eq!(report.word, "privacy");
        assert_eq!(report.total_items, 3);
        assert_eq!(report.llm_model.as_deref(), Some("fixed-llm"));
        assert_eq!(report.embedding_model, "length-v1");
        let written: Vec<&str> = report.files.iter().map(|f| f.era.as_str()).collect();
        assert_eq!(written, vec!["1900s", "2020s"]);
        assert!(dir.path().join("privacy").join("2020s.json").exists());
        assert!(!dir.path().join("privacy").join("1960s.json").exists());

        let record = EraStore::new(dir.path())
            .load_era("privacy", "1900s")
            .await
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(record.meta.model.as_deref(), Some("fixed-llm"));
        assert_eq!(record.meta.count, 2);
    }

    #[tokio::test]
    async fn test_mixed_case_word_is_queryable_as_given() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _) = pipeline(
            dir.path(),
            r#"{"1900s": ["a sealed letter"], "2020s": ["cookie banners"]}"#,
        );
        pipeline
            .build("Privacy", &eras(&["1900s", "2020s"]), 1)
            .await
            .unwrap();

        let builder = crate::TimelineBuilder::new(
            EraStore::new(dir.path()),
            Arc::new(LengthProvider::default()),
        );
        let timeline = builder.query_timeline("Privacy", 6).await.unwrap();
        assert_eq!(timeline.error, None);
        let eras: Vec<&str> = timeline.timeline.iter().map(|e| e.era.as_str()).collect();
        assert_eq!(eras, vec!["1900s", "2020s"]);
    }

    #[tokio::test]
    async fn test_unsafe_labels_never_reach_the_model() {
        let dir = TempDir::new().unwrap();
        let (pipeline, client) = pipeline(dir.path(), "{}");

        assert!(pipeline.build("../x", &eras(&["1900s"]), 2).await.is_err());
        assert!(pipeline.build("privacy", &eras(&["19/00s"]), 2).await.is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let (pipeline, _) = pipeline(dir.path(), "not json");

        let err = pipeline.build("privacy", &eras(&["1900s"]), 2).await.unwrap_err();
        assert!(matches!(
            err,
            crate::RetrievalError::Etymology(EtymologyError::MalformedResponse(_))
        ));
        assert!(!dir.path().join("privacy").exists());
    }
}
