//! Era records from hand-collected corpus files.
//!
//! Each `<data-dir>/<era>_<concept>.csv` holds one example per line.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::BuildReport;
use crate::store::{normalize_concept, validate_label};
use crate::writer::EmbeddingStoreWriter;

/// Builds era records from line-oriented corpus files.
pub struct CorpusBuilder {
    data_dir: PathBuf,
    writer: EmbeddingStoreWriter,
}

impl CorpusBuilder {
    pub fn new(data_dir: impl Into<PathBuf>, writer: EmbeddingStoreWriter) -> Self {
        Self {
            data_dir: data_dir.into(),
            writer,
        }
    }

    /// Corpus file for (`concept`, `era`).
    pub fn corpus_path(&self, concept: &str, era: &str) -> PathBuf {
        self.data_dir.join(format!("{era}_{concept}.csv"))
    }

    /// Embed and store every era that has a non-empty corpus file.
    pub async fn build(&self, concept: &str, eras: &[String]) -> Result<BuildReport> {
        let concept = validate_label("concept", concept)?;
        let eras = eras
            .iter()
            .map(|era| validate_label("era", era).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let mut report = BuildReport::new(
            &normalize_concept(concept)?,
            eras.clone(),
            None,
            self.writer.provider().default_model(),
        );

        for era in &eras {
            let path = self.corpus_path(concept, era);
            let Some(lines) = read_lines(&path).await? else {
                warn!("Missing data file: {} - skipping era {era}", path.display());
                continue;
            };
            if lines.is_empty() {
                warn!("No lines in {}; skipping", path.display());
                continue;
            }

            info!("Encoding {} texts for {concept} / {era}", lines.len());
            if let Some(written) = self.writer.write_era(concept, era, &lines, None).await? {
                report.push(written);
            }
        }

        info!("{} for '{concept}'", report.message());
        Ok(report)
    }
}

/// Trimmed non-empty lines of `path`, or `None` if the file does not exist.
async fn read_lines(path: &Path) -> Result<Option<Vec<String>>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EraStore;
    use crate::writer::tests::LengthProvider;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_from_corpus_files() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::write(
            data.path().join("1900s_freedom.csv"),
            "Freedom of the seas\n\n  the free press  \n",
        )
        .unwrap();
        std::fs::write(data.path().join("1950s_freedom.csv"), "\n  \n").unwrap();

        let provider = Arc::new(LengthProvider::default());
        let writer = EmbeddingStoreWriter::new(provider, EraStore::new(out.path()));
        let builder = CorpusBuilder::new(data.path(), writer);

        let eras = vec!["1900s".to_string(), "1950s".to_string(), "2020s".to_string()];
        let report = builder.build("freedom", &eras).await.unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.total_items, 2);
        assert_eq!(report.llm_model, None);

        let record = EraStore::new(out.path())
            .load_era("freedom", "1900s")
            .await
            .unwrap()
            .found()
            .unwrap();
        let texts: Vec<&str> = record.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Freedom of the seas", "the free press"]);
        assert_eq!(record.meta.model, None);
        assert_eq!(record.meta.embedding_model.as_deref(), Some("length-v1"));
    }
}
