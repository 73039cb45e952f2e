//! Content similarity model: bilingual TF-IDF term vectors joined with
//! standardized numeric product features.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::TrainingError;
use crate::models::{Language, ProductFeatures, Reason, SignalCandidate, UserProfile};
use crate::services::similarity::{top_k, SparseVector};
use crate::services::text::{normalize, TfidfVectorizer};

/// Number of numeric columns appended after the term columns
pub const NUMERIC_FEATURES: usize = 3;

/// Per-column standardization to zero mean and unit variance.
///
/// A column with zero variance is only centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    mean: [f64; NUMERIC_FEATURES],
    std: [f64; NUMERIC_FEATURES],
}

impl FeatureScaler {
    pub fn fit(rows: &[[f64; NUMERIC_FEATURES]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; NUMERIC_FEATURES];
        let mut std = [0.0; NUMERIC_FEATURES];

        for row in rows {
            for (m, value) in mean.iter_mut().zip(row) {
                *m += value / n;
            }
        }
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                std[col] += (value - mean[col]).powi(2) / n;
            }
        }
        for s in &mut std {
            *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
        }

        Self { mean, std }
    }

    pub fn transform(&self, row: &[f64; NUMERIC_FEATURES]) -> [f64; NUMERIC_FEATURES] {
        let mut scaled = [0.0; NUMERIC_FEATURES];
        for col in 0..NUMERIC_FEATURES {
            scaled[col] = (row[col] - self.mean[col]) / self.std[col];
        }
        scaled
    }
}

fn numeric_row(product: &ProductFeatures) -> [f64; NUMERIC_FEATURES] {
    [
        product.price,
        product.vendor_rating,
        product.cultural_relevance,
    ]
}

/// Normalized bilingual document for one product
fn product_document(product: &ProductFeatures) -> String {
    let local = normalize(
        &format!("{} {}", product.name, product.description),
        Language::Uz,
    );
    let secondary = normalize(
        &format!(
            "{} {}",
            product.name_ru.as_deref().unwrap_or_default(),
            product.description_ru.as_deref().unwrap_or_default()
        ),
        Language::Ru,
    );

    match (local.is_empty(), secondary.is_empty()) {
        (false, false) => format!("{local} {secondary}"),
        (false, true) => local,
        _ => secondary,
    }
}

/// Trained content artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureTable")]
pub struct ContentModel {
    vectorizer: TfidfVectorizer,
    scaler: FeatureScaler,
    /// One row per entry of `product_ids`: term columns, then numeric columns
    features: Vec<SparseVector>,
    product_ids: Vec<String>,
    #[serde(skip)]
    rows: HashMap<String, usize>,
}

/// Serialized form of [`ContentModel`], checked before it is served
#[derive(Deserialize)]
struct FeatureTable {
    vectorizer: TfidfVectorizer,
    scaler: FeatureScaler,
    features: Vec<SparseVector>,
    product_ids: Vec<String>,
}

impl TryFrom<FeatureTable> for ContentModel {
    type Error = TrainingError;

    fn try_from(table: FeatureTable) -> Result<Self, Self::Error> {
        let model = Self::from_table(table);
        model.validate()?;
        Ok(model)
    }
}

impl ContentModel {
    fn from_table(table: FeatureTable) -> Self {
        let rows = table
            .product_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self {
            vectorizer: table.vectorizer,
            scaler: table.scaler,
            features: table.features,
            product_ids: table.product_ids,
            rows,
        }
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        self.vectorizer.validate()?;

        if self.features.len() != self.product_ids.len() {
            return Err(TrainingError::InconsistentArtifact(format!(
                "{} products but {} feature rows",
                self.product_ids.len(),
                self.features.len()
            )));
        }
        if self.rows.len() != self.product_ids.len() {
            return Err(TrainingError::InconsistentArtifact(
                "duplicate product ids".to_string(),
            ));
        }
        if !self.features.iter().all(SparseVector::is_well_formed) {
            return Err(TrainingError::InconsistentArtifact(
                "malformed feature row".to_string(),
            ));
        }

        Ok(())
    }

    pub fn train(products: &[ProductFeatures]) -> Result<Self, TrainingError> {
        if products.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }

        let documents: Vec<String> = products.iter().map(product_document).collect();
        let mut vectorizer = TfidfVectorizer::new();
        let term_rows = vectorizer.fit_transform(&documents)?;

        let numeric: Vec<[f64; NUMERIC_FEATURES]> = products.iter().map(numeric_row).collect();
        let scaler = FeatureScaler::fit(&numeric);

        let offset = vectorizer.vocabulary_size();
        let features = term_rows
            .into_iter()
            .zip(&numeric)
            .map(|(terms, row)| {
                let scaled = scaler.transform(row);
                SparseVector::from_sorted(
                    terms
                        .iter()
                        .chain(scaled.iter().enumerate().map(|(i, v)| (offset + i, *v))),
                )
            })
            .collect();

        tracing::info!(
            products = products.len(),
            vocabulary = offset,
            "Content model trained"
        );

        Ok(Self::from_table(FeatureTable {
            vectorizer,
            scaler,
            features,
            product_ids: products.iter().map(|p| p.product_id.clone()).collect(),
        }))
    }

    pub fn product_count(&self) -> usize {
        self.product_ids.len()
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.position(product_id).is_some()
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.rows.get(product_id).copied()
    }

    /// Ranks products against a pseudo-document built from the user's purchase
    /// history and interests. Products with no positive similarity are left out.
    pub fn score(&self, profile: &UserProfile, k: usize) -> Vec<SignalCandidate> {
        let query = profile.interest_terms().collect::<Vec<_>>().join(" ");
        let query = self.vectorizer.transform(&normalize(&query, profile.language));
        if query.is_empty() {
            return Vec::new();
        }

        let similarities = self
            .features
            .iter()
            .enumerate()
            .map(|(index, row)| (index, query.cosine(row)))
            .filter(|(_, similarity)| *similarity > 0.0);

        self.candidates(top_k(similarities, k))
    }

    /// Nearest products to `product_id`, never including the product itself.
    /// `None` when the product was not part of the training corpus.
    pub fn similar(&self, product_id: &str, k: usize) -> Option<Vec<SignalCandidate>> {
        let anchor = self.position(product_id)?;
        let row = &self.features[anchor];

        let similarities = self
            .features
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != anchor)
            .map(|(index, other)| (index, row.cosine(other)));

        Some(self.candidates(top_k(similarities, k)))
    }

    fn candidates(&self, ranked: Vec<(usize, f64)>) -> Vec<SignalCandidate> {
        ranked
            .into_iter()
            .map(|(index, similarity)| {
                SignalCandidate::new(
                    self.product_ids[index].clone(),
                    similarity,
                    Reason::ContentSimilarity,
                )
            })
            .collect()
    }
}
