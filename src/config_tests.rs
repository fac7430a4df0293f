use crate::config::Config;
use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

// Global lock to prevent race conditions when modifying environment variables in tests
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn get_env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

const VARS: &[&str] = &[
    "MODEL_REGISTRY_DIR",
    "MODEL_AUTHOR",
    "TRAINING_SEED",
    "TRAINING_TEST_SIZE",
    "TRAINING_CV_FOLDS",
    "TRAINING_EARLY_STOPPING_ROUNDS",
    "LOG_LEVEL",
];

fn clear_vars() {
    for var in VARS {
        unsafe { env::remove_var(var) };
    }
}

#[test]
fn test_config_defaults() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();

    let config = Config::from_env().unwrap();

    assert_eq!(config.registry.directory, PathBuf::from("data/models"));
    assert_eq!(config.training.seed, 42);
    assert!((config.training.test_size - 0.2).abs() < f64::EPSILON);
    assert_eq!(config.training.cv_folds, 3);
    assert_eq!(config.training.early_stopping_rounds, None);
    assert_eq!(config.observability.default_filter, "info");
}

#[test]
fn test_config_from_env_vars() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe {
        env::set_var("MODEL_REGISTRY_DIR", "/tmp/avm-models");
        env::set_var("MODEL_AUTHOR", "valuation-team");
        env::set_var("TRAINING_SEED", "7");
        env::set_var("TRAINING_TEST_SIZE", "0.25");
        env::set_var("TRAINING_CV_FOLDS", "5");
        env::set_var("TRAINING_EARLY_STOPPING_ROUNDS", "20");
    }

    let config = Config::from_env().unwrap();

    assert_eq!(config.registry.directory, PathBuf::from("/tmp/avm-models"));
    assert_eq!(config.registry.author, "valuation-team");
    assert_eq!(config.training.seed, 7);
    assert!((config.training.test_size - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.training.cv_folds, 5);
    assert_eq!(config.training.early_stopping_rounds, Some(20));

    // Cleanup
    clear_vars();
}

#[test]
fn test_unparseable_values_fall_back_to_defaults() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe {
        env::set_var("TRAINING_SEED", "forty-two");
        env::set_var("TRAINING_EARLY_STOPPING_ROUNDS", "0");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.training.seed, 42);
    assert_eq!(config.training.early_stopping_rounds, None);

    clear_vars();
}

#[test]
fn test_out_of_range_test_size_is_rejected() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe { env::set_var("TRAINING_TEST_SIZE", "1.5") };

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("TRAINING_TEST_SIZE"));

    clear_vars();
}

#[test]
fn test_single_fold_is_rejected() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe { env::set_var("TRAINING_CV_FOLDS", "1") };

    assert!(Config::from_env().is_err());

    clear_vars();
}
