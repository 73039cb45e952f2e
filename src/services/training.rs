//! Offline training pipeline.
//!
//! A run snapshots the interaction window and the active catalog, trains each
//! signal independently on the blocking pool, persists what succeeded and
//! swaps a new [`ModelSet`] into the registry in one step. A signal whose
//! training fails keeps serving its previous artifact.

use chrono::{Months, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::models::Signal;
use crate::services::collaborative::{CollaborativeModel, DEFAULT_RANK, TRAINING_WINDOW_MONTHS};
use crate::services::content::ContentModel;
use crate::services::cultural::CulturalModel;
use crate::services::registry::{ArtifactPayload, ModelRegistry, ModelSet, StoredArtifact};
use crate::store::{ArtifactStore, CatalogStore, InteractionStore};

/// Outcome of one training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub version: u64,
    pub trained: Vec<Signal>,
    pub failed: Vec<(Signal, String)>,
}

impl TrainingReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Trainer {
    catalog: Arc<dyn CatalogStore>,
    interactions: Arc<dyn InteractionStore>,
    artifacts: Arc<dyn ArtifactStore>,
    registry: Arc<ModelRegistry>,
    running: Arc<Mutex<()>>,
    rank: usize,
}

impl Trainer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        interactions: Arc<dyn InteractionStore>,
        artifacts: Arc<dyn ArtifactStore>,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            catalog,
            interactions,
            artifacts,
            registry,
            running: Arc::new(Mutex::new(())),
            rank: DEFAULT_RANK,
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Startup path: serve the persisted artifacts, and run a full training
    /// pass when any of them is missing. A failed pass is logged and the
    /// service keeps whatever loaded.
    pub async fn load_or_train(&self) -> AppResult<()> {
        let mut loaded = Vec::new();
        for signal in Signal::TRAINED {
            match self.artifacts.load(signal).await {
                Ok(Some(artifact)) => loaded.push(artifact),
                Ok(None) => tracing::info!(signal = %signal, "No stored artifact"),
                Err(e) => {
                    tracing::warn!(signal = %signal, error = %e, "Ignoring unreadable artifact")
                }
            }
        }

        let version = loaded.iter().map(|a| a.version).max().unwrap_or(0);
        let set = ModelSet::from_artifacts(version, loaded);
        let complete = set.is_complete();
        self.registry.swap(set).await;

        if complete {
            tracing::info!(version, "Loaded stored model artifacts");
            return Ok(());
        }

        match self.retrain().await {
            Ok(report) if !report.trained.is_empty() => Ok(()),
            Ok(report) => {
                tracing::error!(
                    failed = ?report.failed,
                    "Initial training produced no artifacts, serving without models"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Initial training failed");
                Err(e)
            }
        }
    }

    /// Runs a training pass now. Fails with `Conflict` when one is already
    /// running.
    pub async fn retrain(&self) -> AppResult<TrainingReport> {
        let guard = self.acquire()?;
        let report = self.run().await;
        drop(guard);
        report
    }

    /// Starts a training pass in the background. The conflict check happens
    /// before this returns.
    pub fn spawn_retrain(&self) -> AppResult<JoinHandle<()>> {
        let guard = self.acquire()?;
        let trainer = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = trainer.run().await {
                tracing::error!(error = %e, "Background training failed");
            }
        }))
    }

    /// Retrains every `every`, skipping ticks that overlap a running pass
    pub fn spawn_periodic(&self, every: Duration) -> JoinHandle<()> {
        let trainer = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately; startup already trained
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match trainer.retrain().await {
                    Ok(_) => {}
                    Err(AppError::Conflict(_)) => {
                        tracing::debug!("Training already running, skipping scheduled run")
                    }
                    Err(e) => tracing::error!(error = %e, "Scheduled training failed"),
                }
            }
        })
    }

    fn acquire(&self) -> AppResult<OwnedMutexGuard<()>> {
        self.running
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::Conflict("A training run is already in progress".to_string()))
    }

    async fn run(&self) -> AppResult<TrainingReport> {
        let now = Utc::now();
        let since = now
            .checked_sub_months(Months::new(TRAINING_WINDOW_MONTHS))
            .unwrap_or_default();

        tracing::info!(since = %since, "Training run started");

        let interactions: AppResult<Vec<_>> =
            self.interactions.get_interactions(since).try_collect().await;
        let products = self.catalog.list_active_products().await;

        let rank = self.rank;
        let results = tokio::task::spawn_blocking(move || {
            let collaborative = interactions.and_then(|records| {
                Ok(ArtifactPayload::Collaborative(CollaborativeModel::train(
                    &records, now, rank,
                )?))
            });
            let content = products
                .and_then(|products| Ok(ArtifactPayload::Content(ContentModel::train(&products)?)));
            let cultural = CulturalModel::build()
                .map(ArtifactPayload::Cultural)
                .map_err(AppError::from);
            [
                (Signal::Collaborative, collaborative),
                (Signal::Content, content),
                (Signal::Cultural, cultural),
            ]
        })
        .await
        .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))?;

        let current = self.registry.snapshot().await;
        let version = current.version + 1;
        let mut next = ModelSet {
            version,
            ..(*current).clone()
        };
        let mut report = TrainingReport {
            version,
            trained: Vec::new(),
            failed: Vec::new(),
        };

        for (signal, result) in results {
            match result {
                Ok(payload) => {
                    let artifact = StoredArtifact {
                        version,
                        built_at: now,
                        payload,
                    };
                    if let Err(e) = self.artifacts.save(&artifact).await {
                        tracing::error!(
                            signal = %signal,
                            error = %e,
                            "Failed to persist artifact, serving it from memory only"
                        );
                    }
                    next.insert(artifact.payload);
                    report.trained.push(signal);
                }
                Err(e) => {
                    tracing::error!(signal = %signal, error = %e, "Signal training failed, keeping previous artifact");
                    report.failed.push((signal, e.to_string()));
                }
            }
        }

        if report.trained.is_empty() {
            tracing::error!(failed = ?report.failed, "Training run produced nothing");
            return Ok(TrainingReport {
                version: current.version,
                ..report
            });
        }

        self.registry.swap(next).await;
        tracing::info!(
            version,
            trained = ?report.trained,
            failed = report.failed.len(),
            "Training run finished"
        );
        Ok(report)
    }
}
