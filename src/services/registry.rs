//! Versioned model artifacts and the registry that serves them.
//!
//! Requests take a snapshot of the current [`ModelSet`] and hold it for their
//! whole lifetime; a retrain builds a new set and swaps the pointer, so a
//! request never observes a mix of old and new artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::TrainingError;
use crate::models::Signal;
use crate::services::collaborative::CollaborativeModel;
use crate::services::content::ContentModel;
use crate::services::cultural::CulturalModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "model", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Collaborative(CollaborativeModel),
    Content(ContentModel),
    Cultural(CulturalModel),
}

impl ArtifactPayload {
    pub fn signal(&self) -> Signal {
        match self {
            ArtifactPayload::Collaborative(_) => Signal::Collaborative,
            ArtifactPayload::Content(_) => Signal::Content,
            ArtifactPayload::Cultural(_) => Signal::Cultural,
        }
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        match self {
            ArtifactPayload::Collaborative(model) => model.validate(),
            ArtifactPayload::Content(model) => model.validate(),
            ArtifactPayload::Cultural(model) => model.validate(),
        }
    }
}

/// A persisted artifact. Never modified after it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub payload: ArtifactPayload,
}

impl StoredArtifact {
    pub fn signal(&self) -> Signal {
        self.payload.signal()
    }
}

/// The artifacts in service at one point in time
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    pub version: u64,
    pub collaborative: Option<Arc<CollaborativeModel>>,
    pub content: Option<Arc<ContentModel>>,
    pub cultural: Option<Arc<CulturalModel>>,
}

impl ModelSet {
    pub fn from_artifacts(version: u64, artifacts: impl IntoIterator<Item = StoredArtifact>) -> Self {
        let mut set = ModelSet {
            version,
            ..Default::default()
        };
        for artifact in artifacts {
            set.insert(artifact.payload);
        }
        set
    }

    pub fn insert(&mut self, payload: ArtifactPayload) {
        match payload {
            ArtifactPayload::Collaborative(model) => self.collaborative = Some(Arc::new(model)),
            ArtifactPayload::Content(model) => self.content = Some(Arc::new(model)),
            ArtifactPayload::Cultural(model) => self.cultural = Some(Arc::new(model)),
        }
    }

    pub fn is_loaded(&self, signal: Signal) -> bool {
        match signal {
            Signal::Collaborative => self.collaborative.is_some(),
            Signal::Content => self.content.is_some(),
            Signal::Cultural => self.cultural.is_some(),
            Signal::Popularity => true,
        }
    }

    pub fn is_complete(&self) -> bool {
        Signal::TRAINED.iter().all(|signal| self.is_loaded(*signal))
    }
}

/// Holder of the current model set
#[derive(Debug, Default)]
pub struct ModelRegistry {
    current: RwLock<Arc<ModelSet>>,
}

impl ModelRegistry {
    pub fn new(initial: ModelSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> Arc<ModelSet> {
        self.current.read().await.clone()
    }

    /// Replaces the whole set and returns the one it displaced
    pub async fn swap(&self, next: ModelSet) -> Arc<ModelSet> {
        let next = Arc::new(next);
        let mut current = self.current.write().await;
        tracing::info!(
            from = current.version,
            to = next.version,
            "Model set swapped"
        );
        std::mem::replace(&mut *current, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cultural() -> StoredArtifact {
        StoredArtifact {
            version: 3,
            built_at: Utc::now(),
            payload: ArtifactPayload::Cultural(CulturalModel::build().unwrap()),
        }
    }

    #[test]
    fn test_payload_json_is_tagged_by_signal() {
        let json = serde_json::to_value(cultural()).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["payload"]["signal"], "cultural");
        assert!(json["payload"]["model"].is_object());
    }

    #[test]
    fn test_model_set_from_artifacts() {
        let set = ModelSet::from_artifacts(3, [cultural()]);
        assert!(set.is_loaded(Signal::Cultural));
        assert!(!set.is_loaded(Signal::Collaborative));
        assert!(!set.is_complete());
    }

    #[tokio::test]
    async fn test_snapshot_survives_swap() {
        let registry = ModelRegistry::new(ModelSet::from_artifacts(1, [cultural()]));
        let before = registry.snapshot().await;

        let displaced = registry.swap(ModelSet::from_artifacts(2, [])).await;

        assert_eq!(before.version, 1);
        assert!(before.is_loaded(Signal::Cultural));
        assert!(Arc::ptr_eq(&before, &displaced));
        assert_eq!(registry.snapshot().await.version, 2);
    }
}
