use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::ArtifactStore;
use crate::error::{AppError, AppResult};
use crate::models::Signal;
use crate::services::registry::StoredArtifact;

/// Stores each signal's artifact as `<dir>/<signal>.json`.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// concurrent load sees either the previous artifact or the new one.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, signal: Signal) -> PathBuf {
        self.dir.join(format!("{signal}.json"))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn load(&self, signal: Signal) -> AppResult<Option<StoredArtifact>> {
        let path = self.path_for(signal);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Artifact(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let artifact: StoredArtifact = serde_json::from_str(&json).map_err(|e| {
            AppError::Artifact(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if artifact.signal() != signal {
            return Err(AppError::Artifact(format!(
                "{} holds a {} artifact",
                path.display(),
                artifact.signal()
            )));
        }

        artifact.payload.validate().map_err(|e| {
            AppError::Artifact(format!("Rejected {}: {}", path.display(), e))
        })?;

        Ok(Some(artifact))
    }

    async fn save(&self, artifact: &StoredArtifact) -> AppResult<()> {
        let signal = artifact.signal();
        let path = self.path_for(signal);
        let tmp = self.dir.join(format!(".{signal}.json.tmp"));

        let json = serde_json::to_vec(artifact)
            .map_err(|e| AppError::Artifact(format!("Failed to serialize {signal}: {e}")))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Artifact(format!("Failed to create {}: {}", self.dir.display(), e)))?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::Artifact(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Artifact(format!("Failed to replace {}: {}", path.display(), e)))?;

        tracing::info!(
            signal = %signal,
            version = artifact.version,
            path = %path.display(),
            "Artifact saved"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cultural::CulturalModel;
    use crate::services::registry::ArtifactPayload;
    use chrono::Utc;

    fn cultural_artifact(version: u64) -> StoredArtifact {
        StoredArtifact {
            version,
            built_at: Utc::now(),
            payload: ArtifactPayload::Cultural(CulturalModel::build().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_missing_artifact_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        assert!(store.load(Signal::Content).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_replaces_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("models"));

        store.save(&cultural_artifact(1)).await.unwrap();
        store.save(&cultural_artifact(2)).await.unwrap();

        let loaded = store.load(Signal::Cultural).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert!(!dir.path().join("models/.cultural.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("collaborative.json"), "{not json").unwrap();
        let store = FileArtifactStore::new(dir.path());

        let err = store.load(Signal::Collaborative).await.unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[tokio::test]
    async fn test_artifact_under_wrong_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.save(&cultural_artifact(1)).await.unwrap();
        std::fs::rename(
            dir.path().join("cultural.json"),
            dir.path().join("content.json"),
        )
        .unwrap();

        assert!(store.load(Signal::Content).await.is_err());
    }

    #[tokio::test]
    async fn test_inconsistent_collaborative_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::json!({
            "version": 4,
            "built_at": Utc::now(),
            "payload": {
                "signal": "collaborative",
                "model": {
                    "rank": 1,
                    "user_index": ["u1", "u2"],
                    "item_index": ["tea"],
                    "user_factors": [[1.0]],
                    "item_factors": [[1.0]],
                    "user_ratings": [[[0, 5.0]], [[0, 4.0]]],
                },
            },
        });
        std::fs::write(dir.path().join("collaborative.json"), json.to_string()).unwrap();
        let store = FileArtifactStore::new(dir.path());

        let err = store.load(Signal::Collaborative).await.unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[tokio::test]
    async fn test_cultural_artifact_with_broken_rule_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.save(&cultural_artifact(1)).await.unwrap();

        let path = dir.path().join("cultural.json");
        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        json["payload"]["model"]["events"][0]["multiplier"] = serde_json::json!(1.0);
        std::fs::write(&path, json.to_string()).unwrap();

        let err = store.load(Signal::Cultural).await.unwrap_err();
        assert!(err.to_string().contains("multiplier"));
    }
}
