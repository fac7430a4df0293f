//! Versioned model registry over an [`ArtifactStore`].
//!
//! Each version is one storage unit holding `model.json` (the serialized
//! regressor) and `metadata.json`. The artifact is written and verified
//! before the metadata, and a version only counts as registered once its
//! metadata parses, so readers never observe a half-written version.

use super::feature_builder::FeatureBuilder;
use super::gradient_boosting::GradientBoostedRegressor;
use super::predictor::PricePredictor;
use crate::domain::errors::RegistryError;
use crate::domain::ports::ArtifactStore;
use crate::domain::valuation::feature_schema::FeatureSchema;
use crate::domain::valuation::model_metadata::{ModelMetadata, ModelMetrics, ModelVersion};
use crate::domain::valuation::transaction::TransactionRecord;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

pub const MODEL_FILE: &str = "model.json";
pub const METADATA_FILE: &str = "metadata.json";

/// A registered version with its loaded regressor.
#[derive(Debug)]
pub struct RegisteredModel {
    pub metadata: ModelMetadata,
    pub model: GradientBoostedRegressor,
}

impl RegisteredModel {
    pub fn version(&self) -> &ModelVersion {
        &self.metadata.version
    }

    pub fn schema(&self) -> Option<FeatureSchema> {
        self.metadata.feature_schema()
    }

    /// Price estimate for a single record, encoded with the persisted schema.
    pub fn estimate(&self, record: &TransactionRecord) -> Result<f64> {
        let schema = self
            .schema()
            .ok_or_else(|| anyhow!("Model {} has no feature schema", self.version()))?;
        let features = FeatureBuilder::encode_records(std::slice::from_ref(record), &schema)
            .context("Failed to encode record")?;
        let prediction = self
            .model
            .predict(&features)
            .context("Failed to predict price")?;
        prediction
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Model returned no prediction"))
    }
}

pub struct ModelRegistry {
    store: Arc<dyn ArtifactStore>,
    /// Last issued version timestamp, in microseconds.
    last_issued: Mutex<i64>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            last_issued: Mutex::new(i64::MIN),
        }
    }

    pub fn location(&self) -> String {
        self.store.describe()
    }

    /// Registers `model` under a fresh version.
    ///
    /// The artifact is written first and its presence checked on the store;
    /// metadata (including the schema) is written last. On any failure the
    /// unit is removed, so no version becomes visible.
    pub fn save(
        &self,
        model: &GradientBoostedRegressor,
        metrics: ModelMetrics,
        schema: &FeatureSchema,
        description: &str,
        author: &str,
    ) -> Result<ModelVersion, RegistryError> {
        let (version, timestamp) = self.next_version()?;

        if schema.is_empty() {
            return Err(RegistryError::InvalidSchema {
                version: version.to_string(),
                reason: "feature schema is empty".to_string(),
            });
        }
        if schema.len() != model.n_features() {
            return Err(RegistryError::InvalidSchema {
                version: version.to_string(),
                reason: format!(
                    "schema has {} columns but the model expects {}",
                    schema.len(),
                    model.n_features()
                ),
            });
        }

        let unit = version.as_str();
        let artifact = serde_json::to_vec(model)?;
        if let Err(e) = self.store.write(unit, MODEL_FILE, &artifact) {
            self.discard(unit);
            return Err(RegistryError::Store(e));
        }

        let verified = match self.store.exists(unit, MODEL_FILE) {
            Ok(found) => found,
            Err(e) => {
                warn!("ModelRegistry: could not verify artifact for {}: {}", version, e);
                false
            }
        };
        if !verified {
            self.discard(unit);
            return Err(RegistryError::Persistence {
                version: version.to_string(),
                reason: format!("{} not found on store after write", MODEL_FILE),
            });
        }

        let metadata = ModelMetadata {
            version: version.clone(),
            timestamp,
            author: author.to_string(),
            metrics,
            description: description.to_string(),
            parameters: parameters_of(model)?,
            feature_schema: Some(schema.columns().to_vec()),
            feature_encoding: schema.encoding().cloned(),
        };
        let bytes = serde_json::to_vec_pretty(&metadata)?;
        if let Err(e) = self.store.write(unit, METADATA_FILE, &bytes) {
            self.discard(unit);
            return Err(RegistryError::Store(e));
        }

        info!(
            "ModelRegistry: saved {} ({} features) to {}",
            version,
            schema.len(),
            self.store.describe()
        );
        Ok(version)
    }

    /// All registered versions, newest first. Units without readable
    /// metadata are skipped.
    pub fn list(&self) -> Result<Vec<ModelMetadata>, RegistryError> {
        let mut versions: Vec<ModelMetadata> = self
            .store
            .list_units()?
            .iter()
            .filter_map(|unit| self.read_metadata(unit))
            .collect();

        versions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.version.cmp(&a.version))
        });
        Ok(versions)
    }

    /// Best version by `metric` among those that recorded it.
    ///
    /// `Ok(None)` when no version recorded the metric. When the top-ranked
    /// version cannot be loaded the call fails with
    /// [`RegistryError::ArtifactUnavailable`] instead of falling back to a
    /// lower-ranked version.
    pub fn get_best(
        &self,
        metric: &str,
        lower_is_better: bool,
    ) -> Result<Option<RegisteredModel>, RegistryError> {
        let mut candidates: Vec<(f64, ModelMetadata)> = self
            .list()?
            .into_iter()
            .filter_map(|m| m.metric(metric).map(|value| (value, m)))
            .collect();

        if candidates.is_empty() {
            warn!("ModelRegistry: no registered model has metric '{}'", metric);
            return Ok(None);
        }

        // Stable sort: equal scores keep newest-first order.
        candidates.sort_by(|(a, _), (b, _)| {
            if lower_is_better {
                a.total_cmp(b)
            } else {
                b.total_cmp(a)
            }
        });

        let (score, metadata) = candidates.swap_remove(0);
        info!(
            "ModelRegistry: best model by {} is {} ({:.4})",
            metric, metadata.version, score
        );

        match self.load(&metadata.version) {
            Some(model) => Ok(Some(RegisteredModel { metadata, model })),
            None => Err(RegistryError::ArtifactUnavailable {
                version: metadata.version.to_string(),
            }),
        }
    }

    /// Loads the regressor of `version`. `None` when the artifact is missing
    /// or cannot be decoded.
    pub fn load(&self, version: &ModelVersion) -> Option<GradientBoostedRegressor> {
        let bytes = match self.store.read(version.as_str(), MODEL_FILE) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!("ModelRegistry: artifact for {} not found", version);
                return None;
            }
            Err(e) => {
                error!("ModelRegistry: failed to read artifact for {}: {}", version, e);
                return None;
            }
        };

        match serde_json::from_slice::<GradientBoostedRegressor>(&bytes) {
            Ok(model) => {
                info!(
                    "ModelRegistry: loaded {} ({} stages, {} features)",
                    version,
                    model.n_stages(),
                    model.n_features()
                );
                Some(model)
            }
            Err(e) => {
                error!("ModelRegistry: corrupt artifact for {}: {}", version, e);
                None
            }
        }
    }

    /// Metadata of a registered version.
    pub fn metadata(&self, version: &ModelVersion) -> Option<ModelMetadata> {
        self.read_metadata(version.as_str())
    }

    /// Metadata and regressor of `version`, if both load.
    pub fn load_registered(&self, version: &ModelVersion) -> Option<RegisteredModel> {
        let metadata = self.metadata(version)?;
        let model = self.load(version)?;
        Some(RegisteredModel { metadata, model })
    }

    /// Removes a version. Returns `false` if it was not present.
    pub fn delete(&self, version: &ModelVersion) -> Result<bool, RegistryError> {
        let removed = self.store.remove_unit(version.as_str())?;
        if removed {
            info!("ModelRegistry: deleted {}", version);
        } else {
            debug!("ModelRegistry: {} not present, nothing to delete", version);
        }
        Ok(removed)
    }

    /// Issues a version strictly later than any issued by this registry and
    /// not already present on the store.
    fn next_version(&self) -> Result<(ModelVersion, DateTime<Utc>), RegistryError> {
        let mut last = self
            .last_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut micros = Utc::now().timestamp_micros().max(last.saturating_add(1));
        loop {
            let timestamp = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
                RegistryError::Persistence {
                    version: micros.to_string(),
                    reason: "timestamp out of range".to_string(),
                }
            })?;
            let version = ModelVersion::from_timestamp(timestamp);
            if self.store.list_units()?.iter().any(|u| u == version.as_str()) {
                micros += 1;
                continue;
            }
            *last = micros;
            return Ok((version, timestamp));
        }
    }

    fn read_metadata(&self, unit: &str) -> Option<ModelMetadata> {
        let bytes = match self.store.read(unit, METADATA_FILE) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("ModelRegistry: {} has no metadata, skipping", unit);
                return None;
            }
            Err(e) => {
                warn!("ModelRegistry: failed to read metadata of {}: {}", unit, e);
                return None;
            }
        };

        match serde_json::from_slice::<ModelMetadata>(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("ModelRegistry: corrupt metadata in {}, skipping: {}", unit, e);
                None
            }
        }
    }

    fn discard(&self, unit: &str) {
        if let Err(e) = self.store.remove_unit(unit) {
            error!("ModelRegistry: failed to clean up partial {}: {}", unit, e);
        }
    }
}

fn parameters_of(
    model: &GradientBoostedRegressor,
) -> Result<BTreeMap<String, serde_json::Value>, RegistryError> {
    match serde_json::to_value(model.hyperparameters())? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Ok(BTreeMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::gradient_boosting::{FitOptions, Hyperparameters};
    use crate::application::ml::synthetic::SyntheticMarket;
    use crate::domain::valuation::model_metadata::metric_names;
    use crate::domain::valuation::record_table::RecordTable;
    use crate::infrastructure::repositories::in_memory::InMemoryArtifactStore;
    use std::io;

    fn fitted() -> (GradientBoostedRegressor, FeatureSchema, RecordTable) {
        let records = SyntheticMarket::new(3).generate(80);
        let table = RecordTable::from_records(&records);
        let fitted = FeatureBuilder::fit(&table).unwrap();
        let params = Hyperparameters {
            n_estimators: 10,
            max_depth: 3,
            ..Default::default()
        };
        let (model, _) = GradientBoostedRegressor::fit(
            fitted.matrix.rows(),
            &fitted.targets,
            params,
            FitOptions::default(),
        )
        .unwrap();
        (model, fitted.schema, table)
    }

    fn mape(value: Option<f64>) -> ModelMetrics {
        let mut metrics = ModelMetrics::new();
        metrics.insert(metric_names::MAPE.to_string(), value);
        metrics
    }

    fn registry() -> (ModelRegistry, Arc<InMemoryArtifactStore>) {
        let store = Arc::new(InMemoryArtifactStore::new());
        (ModelRegistry::new(store.clone()), store)
    }

    #[test]
    fn test_save_load_roundtrip_predicts_identically() {
        let (registry, _) = registry();
        let (model, schema, table) = fitted();
        let version = registry
            .save(&model, mape(Some(12.0)), &schema, "first", "tester")
            .unwrap();

        let loaded = registry.load(&version).unwrap();
        let features = FeatureBuilder::transform(&table, &schema, Default::default()).unwrap();
        assert_eq!(
            model.predict(&features.matrix).unwrap(),
            loaded.predict(&features.matrix).unwrap()
        );

        let metadata = registry.metadata(&version).unwrap();
        assert_eq!(metadata.author, "tester");
        assert_eq!(metadata.description, "first");
        assert_eq!(metadata.feature_schema.as_deref(), Some(schema.columns()));
        assert_eq!(metadata.feature_schema(), Some(schema));
        assert_eq!(metadata.parameters["n_estimators"], serde_json::json!(10));
    }

    #[test]
    fn test_rapid_saves_get_distinct_versions() {
        let (registry, _) = registry();
        let (model, schema, _) = fitted();
        let mut versions: Vec<ModelVersion> = (0..20)
            .map(|_| registry.save(&model, mape(None), &schema, "", "t").unwrap())
            .collect();
        versions.sort();
        versions.dedup();
        assert_eq!(versions.len(), 20);
        assert_eq!(registry.list().unwrap().len(), 20);
    }

    #[test]
    fn test_list_is_newest_first() {
        let (registry, _) = registry();
        let (model, schema, _) = fitted();
        let saved: Vec<ModelVersion> = (0..4)
            .map(|_| registry.save(&model, mape(None), &schema, "", "t").unwrap())
            .collect();

        let listed: Vec<ModelVersion> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|m| m.version)
            .collect();
        let expected: Vec<ModelVersion> = saved.into_iter().rev().collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_get_best_filters_absent_metric() {
        let (registry, _) = registry();
        let (model, schema, _) = fitted();
        let mut ids = Vec::new();
        for value in [Some(0.30), Some(0.10), None, Some(0.20)] {
            ids.push(registry.save(&model, mape(value), &schema, "", "t").unwrap());
        }

        let best = registry.get_best(metric_names::MAPE, true).unwrap().unwrap();
        assert_eq!(best.version(), &ids[1]);
        assert_eq!(best.metadata.metric(metric_names::MAPE), Some(0.10));

        let worst = registry.get_best(metric_names::MAPE, false).unwrap().unwrap();
        assert_eq!(worst.version(), &ids[0]);

        assert!(registry.get_best("r2", true).unwrap().is_none());
    }

    #[test]
    fn test_get_best_on_empty_registry() {
        let (registry, _) = registry();
        assert!(registry.get_best(metric_names::MAPE, true).unwrap().is_none());
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (registry, _) = registry();
        let (model, schema, _) = fitted();
        let version = registry.save(&model, mape(None), &schema, "", "t").unwrap();

        assert!(registry.delete(&version).unwrap());
        assert!(!registry.delete(&version).unwrap());
        assert!(registry.load(&version).is_none());
        assert!(registry.metadata(&version).is_none());
    }

    #[test]
    fn test_corrupt_metadata_is_skipped() {
        let (registry, store) = registry();
        let (model, schema, _) = fitted();
        let good = registry.save(&model, mape(Some(1.0)), &schema, "", "t").unwrap();
        store
            .write("v_20200101_000000_000000", METADATA_FILE, b"{not json")
            .unwrap();
        store
            .write("v_20200101_000000_000001", MODEL_FILE, b"{}")
            .unwrap();

        let listed = registry.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, good);
    }

    #[test]
    fn test_missing_or_corrupt_artifact_loads_as_none() {
        let (registry, store) = registry();
        let (model, schema, _) = fitted();
        let version = registry.save(&model, mape(Some(1.0)), &schema, "", "t").unwrap();
        store
            .write(version.as_str(), MODEL_FILE, b"garbage")
            .unwrap();

        assert!(registry.load(&version).is_none());
        assert!(registry.load_registered(&version).is_none());
        assert!(registry.load(&ModelVersion::new("v_missing")).is_none());
    }

    #[test]
    fn test_get_best_reports_unloadable_top_version() {
        let (registry, store) = registry();
        let (model, schema, _) = fitted();
        registry.save(&model, mape(Some(5.0)), &schema, "", "t").unwrap();
        let best = registry.save(&model, mape(Some(1.0)), &schema, "", "t").unwrap();
        store.write(best.as_str(), MODEL_FILE, b"garbage").unwrap();

        let err = match registry.get_best(metric_names::MAPE, true) {
            Err(e) => e,
            Ok(found) => panic!("expected an error, got {:?}", found.map(|m| m.metadata.version)),
        };
        match err {
            RegistryError::ArtifactUnavailable { version } => assert_eq!(version, best.as_str()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_or_mismatched_schema_rejected() {
        let (registry, store) = registry();
        let (model, schema, _) = fitted();

        let empty = FeatureSchema::from_columns(Vec::new());
        let err = registry.save(&model, mape(None), &empty, "", "t").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));

        let narrow = FeatureSchema::from_columns(schema.columns()[..2].to_vec());
        let err = registry.save(&model, mape(None), &narrow, "", "t").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
        assert_eq!(store.unit_count(), 0);
    }

    /// Accepts writes but never reports the artifact as present.
    struct UnverifiableStore {
        inner: InMemoryArtifactStore,
    }

    impl ArtifactStore for UnverifiableStore {
        fn write(&self, unit: &str, name: &str, bytes: &[u8]) -> io::Result<()> {
            self.inner.write(unit, name, bytes)
        }
        fn read(&self, unit: &str, name: &str) -> io::Result<Option<Vec<u8>>> {
            self.inner.read(unit, name)
        }
        fn exists(&self, unit: &str, name: &str) -> io::Result<bool> {
            if name == MODEL_FILE {
                return Ok(false);
            }
            self.inner.exists(unit, name)
        }
        fn list_units(&self) -> io::Result<Vec<String>> {
            self.inner.list_units()
        }
        fn remove_unit(&self, unit: &str) -> io::Result<bool> {
            self.inner.remove_unit(unit)
        }
        fn describe(&self) -> String {
            "unverifiable".to_string()
        }
    }

    #[test]
    fn test_failed_verification_leaves_nothing_behind() {
        let store = Arc::new(UnverifiableStore {
            inner: InMemoryArtifactStore::new(),
        });
        let registry = ModelRegistry::new(store.clone());
        let (model, schema, _) = fitted();

        let err = registry.save(&model, mape(Some(1.0)), &schema, "", "t").unwrap_err();
        assert!(matches!(err, RegistryError::Persistence { .. }));
        assert_eq!(store.inner.unit_count(), 0);
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_estimate_single_record() {
        let (registry, _) = registry();
        let (model, schema, _) = fitted();
        let version = registry.save(&model, mape(Some(1.0)), &schema, "", "t").unwrap();
        let registered = registry.load_registered(&version).unwrap();

        let record = SyntheticMarket::new(99).generate(1).remove(0);
        let estimate = registered.estimate(&record).unwrap();
        assert!(estimate.is_finite());
        assert!(estimate > 0.0);
    }
}
