//! Latent factor model: collaborative filtering over a truncated SVD of the
//! region-weighted user × item rating matrix.

use chrono::{DateTime, Months, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::TrainingError;
use crate::models::{interaction_weight, InteractionRecord, Reason, SignalCandidate};
use crate::services::similarity::{cosine, top_k};

pub const DEFAULT_RANK: usize = 50;
pub const TRAINING_WINDOW_MONTHS: u32 = 6;
pub const NEIGHBOURS: usize = 10;

/// Result of looking a user up in the factor table
#[derive(Debug, PartialEq)]
pub enum FactorLookup<'a> {
    Found { row: usize, factors: &'a [f64] },
    ColdStart,
}

/// Result of scoring a user with the collaborative signal
#[derive(Debug, PartialEq)]
pub enum CollaborativeOutcome {
    Scored(Vec<SignalCandidate>),
    /// The user has no factor vector; the caller takes the fallback path
    ColdStart,
}

/// Trained collaborative artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FactorTables")]
pub struct CollaborativeModel {
    rank: usize,
    user_index: Vec<String>,
    item_index: Vec<String>,
    user_factors: Vec<Vec<f64>>,
    item_factors: Vec<Vec<f64>>,
    /// Weighted observed ratings per user row, `(item column, rating)`
    user_ratings: Vec<Vec<(usize, f64)>>,
    #[serde(skip)]
    user_rows: HashMap<String, usize>,
    #[serde(skip)]
    item_cols: HashMap<String, usize>,
}

/// Serialized form of [`CollaborativeModel`], checked before it is served
#[derive(Deserialize)]
struct FactorTables {
    rank: usize,
    user_index: Vec<String>,
    item_index: Vec<String>,
    user_factors: Vec<Vec<f64>>,
    item_factors: Vec<Vec<f64>>,
    user_ratings: Vec<Vec<(usize, f64)>>,
}

impl TryFrom<FactorTables> for CollaborativeModel {
    type Error = TrainingError;

    fn try_from(tables: FactorTables) -> Result<Self, Self::Error> {
        let model = Self::from_tables(tables);
        model.validate()?;
        Ok(model)
    }
}

fn positions(ids: &[String]) -> HashMap<String, usize> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect()
}

impl CollaborativeModel {
    fn from_tables(tables: FactorTables) -> Self {
        Self {
            user_rows: positions(&tables.user_index),
            item_cols: positions(&tables.item_index),
            rank: tables.rank,
            user_index: tables.user_index,
            item_index: tables.item_index,
            user_factors: tables.user_factors,
            item_factors: tables.item_factors,
            user_ratings: tables.user_ratings,
        }
    }

    /// Every user row needs factors and ratings, every item column needs
    /// factors, and rated columns must exist.
    pub fn validate(&self) -> Result<(), TrainingError> {
        let users = self.user_index.len();
        let items = self.item_index.len();

        if self.user_rows.len() != users || self.item_cols.len() != items {
            return Err(TrainingError::InconsistentArtifact(
                "duplicate user or item ids".to_string(),
            ));
        }
        if self.user_factors.len() != users || self.user_ratings.len() != users {
            return Err(TrainingError::InconsistentArtifact(format!(
                "{users} users but {} factor rows and {} rating rows",
                self.user_factors.len(),
                self.user_ratings.len()
            )));
        }
        if self.item_factors.len() != items {
            return Err(TrainingError::InconsistentArtifact(format!(
                "{items} items but {} factor rows",
                self.item_factors.len()
            )));
        }
        if let Some(col) = self
            .user_ratings
            .iter()
            .flatten()
            .map(|(col, _)| *col)
            .find(|col| *col >= items)
        {
            return Err(TrainingError::InconsistentArtifact(format!(
                "rating refers to item column {col} of {items}"
            )));
        }

        Ok(())
    }

    /// Trains on interactions newer than six months before `now`.
    ///
    /// Each rating is multiplied by the weight of the region it was recorded in;
    /// repeated interactions for the same user/item pair are averaged.
    pub fn train(
        interactions: &[InteractionRecord],
        now: DateTime<Utc>,
        rank: usize,
    ) -> Result<Self, TrainingError> {
        let cutoff = now.checked_sub_months(Months::new(TRAINING_WINDOW_MONTHS));

        let mut cells: BTreeMap<(&str, &str), (f64, u32)> = BTreeMap::new();
        for record in interactions
            .iter()
            .filter(|r| cutoff.map_or(true, |cutoff| r.timestamp > cutoff))
        {
            if !record.rating.is_finite() {
                return Err(TrainingError::MalformedInteraction {
                    user_id: record.user_id.clone(),
                    product_id: record.product_id.clone(),
                    reason: format!("rating {} is not a finite number", record.rating),
                });
            }
            if record.user_id.is_empty() || record.product_id.is_empty() {
                return Err(TrainingError::MalformedInteraction {
                    user_id: record.user_id.clone(),
                    product_id: record.product_id.clone(),
                    reason: "missing user or product identity".to_string(),
                });
            }

            let weighted = record.rating * interaction_weight(&record.region);
            let cell = cells
                .entry((record.user_id.as_str(), record.product_id.as_str()))
                .or_insert((0.0, 0));
            cell.0 += weighted;
            cell.1 += 1;
        }

        if cells.is_empty() {
            return Err(TrainingError::EmptyInteractions);
        }

        let user_index: Vec<String> = cells
            .keys()
            .map(|(user, _)| *user)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let item_index: Vec<String> = cells
            .keys()
            .map(|(_, item)| *item)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let user_rows: HashMap<&str, usize> = user_index
            .iter()
            .enumerate()
            .map(|(i, u)| (u.as_str(), i))
            .collect();
        let item_cols: HashMap<&str, usize> = item_index
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();

        let mut matrix = DMatrix::<f64>::zeros(user_index.len(), item_index.len());
        let mut user_ratings = vec![Vec::new(); user_index.len()];
        for ((user, item), (sum, count)) in &cells {
            let (row, col) = (user_rows[user], item_cols[item]);
            let rating = sum / f64::from(*count);
            matrix[(row, col)] = rating;
            user_ratings[row].push((col, rating));
        }

        let (user_factors, item_factors, rank) = truncated_svd(matrix, rank)?;

        tracing::info!(
            users = user_index.len(),
            items = item_index.len(),
            rank,
            "Collaborative model trained"
        );

        Ok(Self::from_tables(FactorTables {
            rank,
            user_index,
            item_index,
            user_factors,
            item_factors,
            user_ratings,
        }))
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn user_count(&self) -> usize {
        self.user_index.len()
    }

    pub fn item_count(&self) -> usize {
        self.item_index.len()
    }

    pub fn item_factors(&self, product_id: &str) -> Option<&[f64]> {
        let col = *self.item_cols.get(product_id)?;
        self.item_factors.get(col).map(Vec::as_slice)
    }

    pub fn lookup(&self, user_id: &str) -> FactorLookup<'_> {
        match self.user_rows.get(user_id) {
            Some(&row) => FactorLookup::Found {
                row,
                factors: &self.user_factors[row],
            },
            None => FactorLookup::ColdStart,
        }
    }

    /// Ranks items preferred by the ten most similar users.
    ///
    /// A candidate's score is the sum of `similarity × rating` over neighbours
    /// who rated it. Neighbours with non-positive similarity and items the user
    /// already interacted with are skipped.
    pub fn score(&self, user_id: &str, k: usize) -> CollaborativeOutcome {
        let (row, factors) = match self.lookup(user_id) {
            FactorLookup::Found { row, factors } => (row, factors),
            FactorLookup::ColdStart => return CollaborativeOutcome::ColdStart,
        };

        let similarities = self
            .user_factors
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != row)
            .map(|(other, vector)| (other, cosine(factors, vector)));
        let neighbours = top_k(similarities, NEIGHBOURS);

        let seen: HashSet<usize> = self.user_ratings[row].iter().map(|(col, _)| *col).collect();
        let mut scores: BTreeMap<usize, f64> = BTreeMap::new();
        for (neighbour, similarity) in neighbours {
            if similarity <= 0.0 {
                continue;
            }
            for &(col, rating) in &self.user_ratings[neighbour] {
                if rating > 0.0 && !seen.contains(&col) {
                    *scores.entry(col).or_insert(0.0) += similarity * rating;
                }
            }
        }

        let candidates = top_k(scores, k)
            .into_iter()
            .map(|(col, score)| {
                SignalCandidate::new(
                    self.item_index[col].clone(),
                    score,
                    Reason::CollaborativeFiltering,
                )
            })
            .collect();

        CollaborativeOutcome::Scored(candidates)
    }
}

type Factors = (Vec<Vec<f64>>, Vec<Vec<f64>>, usize);

/// Keeps the `rank` largest singular triplets. User factors are `U·Σ`, item
/// factors are the matching rows of `V`.
fn truncated_svd(matrix: DMatrix<f64>, rank: usize) -> Result<Factors, TrainingError> {
    let (n_users, n_items) = matrix.shape();
    let svd = matrix
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or_else(|| TrainingError::Decomposition("SVD did not converge".to_string()))?;
    let u = svd
        .u
        .ok_or_else(|| TrainingError::Decomposition("SVD failed to compute U".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| TrainingError::Decomposition("SVD failed to compute V^T".to_string()))?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .total_cmp(&svd.singular_values[a])
            .then(a.cmp(&b))
    });
    order.truncate(rank.max(1));

    let user_factors = (0..n_users)
        .map(|row| {
            order
                .iter()
                .map(|&c| u[(row, c)] * svd.singular_values[c])
                .collect()
        })
        .collect();
    let item_factors = (0..n_items)
        .map(|col| order.iter().map(|&c| v_t[(c, col)]).collect())
        .collect();

    Ok((user_factors, item_factors, order.len()))
}
