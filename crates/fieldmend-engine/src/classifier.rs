//! Field type classification
//!
//! Maps each field of a document to a [`SemanticType`] by embedding similarity against
//! the catalogue exemplars. A field is scored twice, once with its `"<field>: <value>"`
//! context and once with the bare field name, and the better score counts. Below the
//! acceptance threshold the field is `Unknown`.
//!
//! Exemplar embeddings are computed on first use and cached for the lifetime of the
//! classifier.

use crate::catalogue::SemanticType;
use crate::document::{value_text, Document};
use crate::embedding::{cosine_similarity, Embedder, EmbeddingError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Best catalogue match for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub semantic_type: SemanticType,
    pub score: f64,
    /// Exemplar that produced the score, if any cleared the threshold.
    pub exemplar: Option<String>,
}

impl FieldMatch {
    fn unknown(score: f64) -> Self {
        Self {
            semantic_type: SemanticType::Unknown,
            score,
            exemplar: None,
        }
    }
}

/// Per-field classification of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    fields: HashMap<String, FieldMatch>,
}

impl Classification {
    /// Type of `field`; fields never classified are `Unknown`.
    pub fn type_of(&self, field: &str) -> SemanticType {
        self.fields
            .get(field)
            .map(|m| m.semantic_type)
            .unwrap_or(SemanticType::Unknown)
    }

    pub fn get(&self, field: &str) -> Option<&FieldMatch> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, m: FieldMatch) {
        self.fields.insert(field.into(), m);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldMatch)> {
        self.fields.iter()
    }
}

struct ExemplarEmbedding {
    semantic_type: SemanticType,
    name: &'static str,
    vector: Vec<f32>,
}

pub struct FieldTypeClassifier {
    embedder: Arc<dyn Embedder>,
    threshold: f64,
    exemplars: RwLock<Option<Arc<Vec<ExemplarEmbedding>>>>,
}

impl FieldTypeClassifier {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
            exemplars: RwLock::new(None),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn exemplar_embeddings(&self) -> Result<Arc<Vec<ExemplarEmbedding>>, EmbeddingError> {
        let cached = self.exemplars.read().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let mut built = Vec::new();
        for (semantic_type, name) in SemanticType::all_exemplars() {
            let vector = self.embedder.embed(name).await?;
            built.push(ExemplarEmbedding {
                semantic_type,
                name,
                vector,
            });
        }
        let built = Arc::new(built);
        *self.exemplars.write() = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Classify every field of `document`. Never fails: embedding errors degrade the
    /// affected fields (or the whole document) to `Unknown`.
    pub async fn classify(&self, document: &Document) -> Classification {
        let mut classification = Classification::default();

        let exemplars = match self.exemplar_embeddings().await {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "exemplar embedding failed; all fields unknown");
                for field in document.field_names() {
                    classification.insert(field.clone(), FieldMatch::unknown(0.0));
                }
                return classification;
            }
        };

        for (field, value) in document.iter() {
            let m = match self.classify_field(field, &value_text(value), &exemplars).await {
                Ok(m) => m,
                Err(err) => {
                    tracing::warn!(field = %field, error = %err, "field embedding failed");
                    FieldMatch::unknown(0.0)
                }
            };
            classification.insert(field.clone(), m);
        }
        classification
    }

    async fn classify_field(
        &self,
        field: &str,
        value: &str,
        exemplars: &[ExemplarEmbedding],
    ) -> Result<FieldMatch, EmbeddingError> {
        let context = self.embedder.embed(&format!("{}: {}", field, value)).await?;
        let name = self.embedder.embed(field).await?;

        let mut best: Option<&ExemplarEmbedding> = None;
        let mut best_score = f64::NEG_INFINITY;
        for exemplar in exemplars {
            let score = cosine_similarity(&context, &exemplar.vector)?
                .max(cosine_similarity(&name, &exemplar.vector)?);
            // Strictly greater: the first exemplar at the maximum wins.
            if score > best_score {
                best_score = score;
                best = Some(exemplar);
            }
        }

        match best {
            Some(e) if best_score > self.threshold => Ok(FieldMatch {
                semantic_type: e.semantic_type,
                score: best_score,
                exemplar: Some(e.name.to_string()),
            }),
            _ => Ok(FieldMatch::unknown(best_score.max(0.0))),
        }
    }
}
