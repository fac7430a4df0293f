// AVM lifecycle: features, training, registry, backtesting
pub mod ml;
