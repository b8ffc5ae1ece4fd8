//! On-disk artifacts: one `{level}_{target}.json` file per pair holding the
//! canonical bundle and the blake3 digest of its canonical bytes.
//!
//! The digest travels inside the artifact, so replacing a model is a single
//! rename and a reader never sees a new bundle next to an old digest.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use roas_cohort::{Level, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::bundle::ModelBundle;
use crate::canon::{hash_hex, to_canonical_json};
use crate::errors::{ModelError, Result};

/// Persisted envelope; `hash` covers the canonical JSON of `bundle`
#[derive(Debug, Serialize, Deserialize)]
struct Artifact<B> {
    hash: String,
    bundle: B,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, level: Level, target: Target) -> PathBuf {
        self.root.join(format!("{level}_{target}.json"))
    }

    pub fn exists(&self, level: Level, target: Target) -> bool {
        self.artifact_path(level, target).is_file()
    }

    /// Persist `bundle`, replacing any previous artifact. Returns the hash.
    #[instrument(skip(self, bundle), fields(level = %bundle.level, target = %bundle.target))]
    pub fn save(&self, bundle: &ModelBundle) -> Result<String> {
        bundle.validate()?;
        fs::create_dir_all(&self.root)?;

        let hash = hash_hex(bundle.to_canonical_json()?.as_bytes());
        let json = to_canonical_json(&Artifact {
            hash: hash.clone(),
            bundle,
        })?;
        let path = self.artifact_path(bundle.level, bundle.target);
        self.write_atomic(&path, json.as_bytes())?;

        info!(path = %path.display(), hash = %hash, "saved model bundle");
        Ok(hash)
    }

    /// Load and verify the artifact for (level, target)
    #[instrument(skip(self))]
    pub fn load(&self, level: Level, target: Target) -> Result<ModelBundle> {
        let path = self.artifact_path(level, target);
        if !path.is_file() {
            return Err(ModelError::NotTrained { level, target });
        }

        let bytes = fs::read(&path)?;
        let artifact: Artifact<Value> = serde_json::from_slice(&bytes)?;
        // re-canonicalising the parsed tree reproduces the bytes that were hashed
        let actual = hash_hex(to_canonical_json(&artifact.bundle)?.as_bytes());
        if artifact.hash != actual {
            return Err(ModelError::IntegrityMismatch {
                path,
                expected: artifact.hash,
                actual,
            });
        }

        let bundle: ModelBundle = serde_json::from_value(artifact.bundle)?;
        if bundle.level != level || bundle.target != target {
            return Err(ModelError::WrongArtifact {
                level,
                target,
                found_level: bundle.level,
                found_target: bundle.target,
            });
        }
        bundle.validate()?;

        debug!(trees = bundle.ensemble.num_trees(), hash = %actual, "loaded model bundle");
        Ok(bundle)
    }

    /// Pairs with an artifact on disk
    pub fn trained(&self) -> Vec<(Level, Target)> {
        Level::ALL
            .into_iter()
            .flat_map(|level| Target::ALL.into_iter().map(move |target| (level, target)))
            .filter(|&(level, target)| self.exists(level, target))
            .collect()
    }

    // temp file in the same directory, then rename over the destination
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ModelError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::bundle;

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let saved = bundle(Level::Micro, Target::Iap);

        let hash = store.save(&saved).unwrap();
        assert_eq!(hash, saved.hash_hex().unwrap());
        assert_eq!(files_in(dir.path()), vec!["micro_iap.json".to_string()]);

        let loaded = store.load(Level::Micro, Target::Iap).unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(store.trained(), vec![(Level::Micro, Target::Iap)]);
    }

    #[test]
    fn test_digest_travels_with_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let hash = store.save(&bundle(Level::Mid, Target::Iaa)).unwrap();

        let raw: Value =
            serde_json::from_slice(&fs::read(store.artifact_path(Level::Mid, Target::Iaa)).unwrap())
                .unwrap();
        assert_eq!(raw["hash"], Value::String(hash));
        assert_eq!(raw["bundle"]["level"], Value::String("mid".to_string()));
    }

    #[test]
    fn test_absent_artifact_is_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let err = store.load(Level::Macro, Target::Iaa).unwrap_err();
        assert!(matches!(
            err,
            ModelError::NotTrained { level: Level::Macro, target: Target::Iaa }
        ));
    }

    #[test]
    fn test_tampered_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&bundle(Level::Mid, Target::Iaa)).unwrap();

        let path = store.artifact_path(Level::Mid, Target::Iaa);
        let json = fs::read_to_string(&path).unwrap().replace("100000", "900000");
        fs::write(&path, json).unwrap();

        assert!(matches!(
            store.load(Level::Mid, Target::Iaa),
            Err(ModelError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn test_retrain_never_leaves_stale_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let mut b = bundle(Level::Mid, Target::Iaa);
        let first = store.save(&b).unwrap();

        // the single rename of the next save is the only on-disk transition
        b.summary.train_rows = 42;
        let json = to_canonical_json(&Artifact {
            hash: hash_hex(b.to_canonical_json().unwrap().as_bytes()),
            bundle: &b,
        })
        .unwrap();
        store
            .write_atomic(&store.artifact_path(Level::Mid, Target::Iaa), json.as_bytes())
            .unwrap();

        let loaded = store.load(Level::Mid, Target::Iaa).unwrap();
        assert_eq!(loaded.summary.train_rows, 42);
        assert_ne!(loaded.hash_hex().unwrap(), first);
        assert_eq!(files_in(dir.path()), vec!["mid_iaa.json".to_string()]);
    }

    #[test]
    fn test_bare_bundle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let b = bundle(Level::Macro, Target::Iaa);
        fs::write(
            store.artifact_path(Level::Macro, Target::Iaa),
            b.to_canonical_json().unwrap(),
        )
        .unwrap();
        assert!(matches!(
            store.load(Level::Macro, Target::Iaa),
            Err(ModelError::Json(_))
        ));
    }

    #[test]
    fn test_misnamed_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&bundle(Level::Mid, Target::Iap)).unwrap();
        fs::rename(
            store.artifact_path(Level::Mid, Target::Iap),
            store.artifact_path(Level::Mid, Target::Iaa),
        )
        .unwrap();
        assert!(matches!(
            store.load(Level::Mid, Target::Iaa),
            Err(ModelError::WrongArtifact { .. })
        ));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let mut b = bundle(Level::Macro, Target::Iap);
        store.save(&b).unwrap();
        b.summary.train_rows = 99;
        store.save(&b).unwrap();
        assert_eq!(store.load(Level::Macro, Target::Iap).unwrap().summary.train_rows, 99);
    }
}
