//! On-disk era storage.
//!
//! Records live at `<root>/<concept>/<era>.json`. Writes go through a
//! temporary file and a rename so readers never observe a partial record.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RetrievalError};
use crate::record::EraRecord;

const RECORD_EXTENSION: &str = "json";

/// Outcome of looking up a single era.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EraLookup<T = EraRecord> {
    Found(T),
    ConceptNotFound { concept: String },
    EraNotFound { concept: String, era: String },
    /// The era file exists but cannot be read as a record.
    Invalid { reason: String },
}

impl<T> EraLookup<T> {
    /// Transform the found value, keeping not-found variants as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> EraLookup<U> {
        match self {
            EraLookup::Found(value) => EraLookup::Found(f(value)),
            EraLookup::ConceptNotFound { concept } => EraLookup::ConceptNotFound { concept },
            EraLookup::EraNotFound { concept, era } => EraLookup::EraNotFound { concept, era },
            EraLookup::Invalid { reason } => EraLookup::Invalid { reason },
        }
    }

    /// The found value, if any.
    pub fn found(self) -> Option<T> {
        match self {
            EraLookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Check that a concept or era label is usable as a single path component.
///
/// Returns the trimmed label.
pub fn validate_label<'a>(kind: &str, label: &'a str) -> Result<&'a str> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(RetrievalError::InvalidInput(format!("{kind} cannot be empty")));
    }
    if trimmed == "." || trimmed.contains(['/', '\\', '\0']) || trimmed.contains("..") {
        return Err(RetrievalError::InvalidInput(format!(
            "{kind} '{label}' must not be '.' or contain path separators or '..'"
        )));
    }
    Ok(trimmed)
}

/// Storage key of a concept: the validated label, lowercased.
///
/// Every read and write of a concept directory goes through this, so a
/// concept built as "Privacy" is found again as "Privacy" or "privacy".
pub fn normalize_concept(concept: &str) -> Result<String> {
    Ok(validate_label("concept", concept)?.to_lowercase())
}

/// Store of era records rooted at one directory.
#[derive(Debug, Clone)]
pub struct EraStore {
    root: PathBuf,
}

impl EraStore {
    /// Create a store. The root is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn concept_dir(&self, concept: &str) -> Result<PathBuf> {
        Ok(self.root.join(normalize_concept(concept)?))
    }

    /// Path of the record for (`concept`, `era`).
    ///
    /// A trailing `.json` on `era` is accepted and ignored.
    pub fn era_path(&self, concept: &str, era: &str) -> Result<PathBuf> {
        let era = era.trim();
        let era = era.strip_suffix(".json").unwrap_or(era);
        let era = validate_label("era", era)?;
        Ok(self
            .concept_dir(concept)?
            .join(format!("{era}.{RECORD_EXTENSION}")))
    }

    /// Persist `record`, replacing any previous record for the same era.
    pub async fn write(&self, record: &EraRecord) -> Result<PathBuf> {
        let path = self.era_path(&record.meta.concept, &record.meta.era)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let content = serde_json::to_string_pretty(record)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(
            "Saved {} items for {}/{}",
            record.items.len(),
            record.meta.concept,
            record.meta.era
        );
        Ok(path)
    }

    /// Load one era.
    ///
    /// Only invalid labels are errors; missing and unreadable data come back
    /// as [`EraLookup`] variants.
    pub async fn load_era(&self, concept: &str, era: &str) -> Result<EraLookup> {
        let concept = normalize_concept(concept)?;
        let concept_dir = self.root.join(&concept);
        let path = self.era_path(&concept, era)?;
        let era = era_label(&path);

        if !fs::try_exists(&concept_dir).await.unwrap_or(false) {
            return Ok(EraLookup::ConceptNotFound { concept });
        }
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(EraLookup::EraNotFound { concept, era });
        }

        Ok(match read_record(&path, &concept, &era).await {
            Ok(record) => EraLookup::Found(record),
            Err(reason) => {
                error!("Failed to load era {era} for {concept}: {reason}");
                EraLookup::Invalid { reason }
            }
        })
    }

    /// Load every era of a concept in file-name order.
    ///
    /// Returns `None` when the concept directory does not exist. Eras that
    /// cannot be read, or that have no valid items, are left out.
    pub async fn load_concept(&self, concept: &str) -> Result<Option<Vec<EraRecord>>> {
        let concept = normalize_concept(concept)?;
        let dir = self.root.join(&concept);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Concept directory not found: {}", dir.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        // Same directory, so path order is file-name order
        files.sort();

        if files.is_empty() {
            warn!("No era files found in {}", dir.display());
        }

        let mut records = Vec::with_capacity(files.len());
        for path in files {
            let era = era_label(&path);
            match read_record(&path, &concept, &era).await {
                Ok(record) if record.items.is_empty() => {
                    warn!("No valid items found in {}", path.display());
                }
                Ok(record) => records.push(record),
                Err(reason) => error!("Failed to load era {era}: {reason}"),
            }
        }

        info!("Loaded {} eras for '{concept}'", records.len());
        Ok(Some(records))
    }
}

fn era_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn read_record(
    path: &Path,
    concept: &str,
    era: &str,
) -> std::result::Result<EraRecord, String> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid JSON in {}: {e}", path.display()))?;
    EraRecord::from_value(concept, era, value)
}
