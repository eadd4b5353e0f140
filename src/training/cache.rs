use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{CategoricalValues, Fingerprint, SchemaSnapshot};

type Trained = (SchemaSnapshot, CategoricalValues);

/// Per-fingerprint training state. A `tokio::sync::Mutex` per fingerprint
/// serializes `ensure_trained` calls so a second caller waits on the
/// first's in-flight run instead of re-training concurrently (spec §4.3,
/// §5); once the mutex is free the wake caller's own diff check is nearly
/// free since the snapshot was just refreshed. The categorical values
/// sampled during that run are kept alongside the snapshot so later
/// generation requests can reuse them without re-querying the database.
#[derive(Default)]
pub struct TrainingCache {
    locks: DashMap<Fingerprint, Arc<Mutex<Option<Trained>>>>,
}

impl TrainingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, fingerprint: Fingerprint) -> Arc<Mutex<Option<Trained>>> {
        self.locks.entry(fingerprint).or_insert_with(|| Arc::new(Mutex::new(None))).clone()
    }

    /// Runs `f` with exclusive access to `fingerprint`'s last-trained
    /// snapshot, storing whatever snapshot/categorical-values pair `f`
    /// returns on success.
    pub async fn with_exclusive_access<F, Fut>(&self, fingerprint: Fingerprint, f: F) -> Result<(), crate::training::TrainingError>
    where
        F: FnOnce(Option<SchemaSnapshot>) -> Fut,
        Fut: std::future::Future<Output = Result<Option<(SchemaSnapshot, CategoricalValues)>, crate::training::TrainingError>>,
    {
        let slot = self.slot(fingerprint);
        let mut guard = slot.lock().await;
        let old_snapshot = guard.as_ref().map(|(snapshot, _)| snapshot.clone());
        let outcome = f(old_snapshot).await?;
        if let Some(trained) = outcome {
            *guard = Some(trained);
        }
        Ok(())
    }

    pub fn is_trained(&self, fingerprint: Fingerprint) -> bool {
        self.locks.get(&fingerprint).is_some_and(|slot| slot.try_lock().map(|g| g.is_some()).unwrap_or(true))
    }

    /// The categorical values sampled on `fingerprint`'s last successful
    /// training run, if any (spec §4.3, used by SQL generation's
    /// disambiguation section).
    pub fn categorical_values(&self, fingerprint: Fingerprint) -> Option<CategoricalValues> {
        self.locks.get(&fingerprint)?.try_lock().ok()?.as_ref().map(|(_, values)| values.clone())
    }
}
