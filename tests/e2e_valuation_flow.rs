use propval::application::ml::backtest::{BacktestOptions, BacktestRunner};
use propval::application::ml::gradient_boosting::Hyperparameters;
use propval::application::ml::pipeline::{PipelineConfig, TrainingPipeline};
use propval::application::ml::registry::ModelRegistry;
use propval::application::ml::synthetic::SyntheticMarket;
use propval::application::ml::trainer::TrainerConfig;
use propval::domain::valuation::model_metadata::metric_names;
use propval::domain::valuation::record_table::RecordTable;
use propval::infrastructure::{CsvTableSource, FileSystemStore};
use std::sync::Arc;

fn untuned_config() -> PipelineConfig {
    PipelineConfig {
        test_size: 0.2,
        trainer: TrainerConfig {
            tune: false,
            seed: 42,
            ..Default::default()
        },
        author: "e2e".to_string(),
        description: "end-to-end".to_string(),
    }
}

#[test]
fn test_train_register_and_select_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("transactions.csv");
    let records = SyntheticMarket::new(42).generate(1000);
    CsvTableSource::write(&csv_path, &RecordTable::from_records(&records)).unwrap();

    let table = CsvTableSource::read(&csv_path).unwrap();
    let registry = ModelRegistry::new(Arc::new(FileSystemStore::new(dir.path().join("models"))));
    let outcome = TrainingPipeline::new(&registry, untuned_config())
        .run(&table)
        .unwrap();

    assert_eq!(outcome.n_test, 200);
    assert_eq!(outcome.n_validation + outcome.n_train, 800);
    assert!(outcome.evaluation.mape.is_finite());
    assert!(outcome.evaluation.mape > 0.0);
    assert!(outcome.evaluation.r2 <= 1.0);
    assert_eq!(outcome.hyperparameters, Hyperparameters::default());

    let best = registry
        .get_best(metric_names::MAPE, true)
        .unwrap()
        .expect("registered model should be selectable");
    assert_eq!(best.version(), &outcome.version);
    assert!(dir
        .path()
        .join("models")
        .join(outcome.version.as_str())
        .join("model.json")
        .exists());

    // Fresh market data scored against the persisted schema.
    let fresh = RecordTable::from_records(&SyntheticMarket::new(7).generate(300));
    let report = BacktestRunner::new(&registry, BacktestOptions::default())
        .run(&fresh)
        .unwrap();
    assert_eq!(report.version, outcome.version);
    assert!(report.schema_verified);
    assert!(report.added_columns.is_empty());
    assert!(report.evaluation.mape.is_finite());
    assert_eq!(report.registered_mape, Some(outcome.evaluation.mape));
}

#[test]
fn test_registry_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let table = RecordTable::from_records(&SyntheticMarket::new(1).generate(300));
    let mut config = untuned_config();
    config.trainer.fixed = Hyperparameters {
        n_estimators: 30,
        ..Default::default()
    };

    let version = {
        let registry = ModelRegistry::new(Arc::new(FileSystemStore::new(dir.path())));
        TrainingPipeline::new(&registry, config)
            .run(&table)
            .unwrap()
            .version
    };

    // A second registry over the same directory sees the same version.
    let reopened = ModelRegistry::new(Arc::new(FileSystemStore::new(dir.path())));
    let listed = reopened.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, version);

    let registered = reopened.load_registered(&version).unwrap();
    let record = SyntheticMarket::new(2).generate(1).remove(0);
    assert!(registered.estimate(&record).unwrap() > 0.0);
}
