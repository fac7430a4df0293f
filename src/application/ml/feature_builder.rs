//! Record table → feature matrix transformation.
//!
//! Column layout is fixed: numeric fields, boolean fields (0/1), then one-hot
//! indicator columns per categorical field. Every categorical field drops its
//! baseline category (the first of the sorted vocabulary), so N categories
//! yield N-1 columns.
//!
//! # Imputation and train/serve skew
//!
//! Missing numeric and boolean cells are imputed with a median. When fitting,
//! that median is computed over the batch being fitted, so the encoding of a
//! row depends on which other rows were in the batch. The fitted medians are
//! stored in the [`FeatureSchema`]; later encodes choose explicitly between
//! those stored medians and fresh batch medians with [`ImputationPolicy`].
//! Only [`ImputationPolicy::TrainingMedians`] makes the encoding of a row
//! independent of its batch.

use crate::domain::errors::FeatureError;
use crate::domain::valuation::feature_matrix::FeatureMatrix;
use crate::domain::valuation::feature_schema::{FeatureEncoding, FeatureSchema};
use crate::domain::valuation::record_table::RecordTable;
use crate::domain::valuation::transaction::{
    BOOLEAN_FIELDS, CATEGORICAL_FIELDS, NUMERIC_FIELDS, TARGET_FIELD, TransactionRecord,
    required_fields,
};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Where imputation medians come from when encoding against an existing schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImputationPolicy {
    /// Medians persisted with the schema at training time.
    #[default]
    TrainingMedians,
    /// Medians of the batch being encoded.
    BatchMedians,
}

/// Output of fitting a new schema on a batch.
#[derive(Debug, Clone)]
pub struct FittedFeatures {
    pub matrix: FeatureMatrix,
    pub targets: Vec<f64>,
    pub schema: FeatureSchema,
    /// Rows dropped for lack of a target price.
    pub skipped_rows: usize,
}

/// Output of encoding a batch against an existing schema.
#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    pub matrix: FeatureMatrix,
    pub targets: Vec<f64>,
    pub skipped_rows: usize,
    /// Schema columns the batch could not produce, filled with 0.
    pub added_columns: Vec<String>,
    /// Batch columns the schema does not know, dropped.
    pub dropped_columns: Vec<String>,
    /// Categorical cells whose value is outside the stored vocabulary.
    pub unseen_categories: usize,
    /// False when the schema carried no vocabulary and the batch's own
    /// categories had to be used before reindexing.
    pub used_stored_vocabulary: bool,
}

/// Typed view of a record table, restricted to rows that survive target filtering.
struct ParsedBatch {
    /// NUMERIC_FIELDS then BOOLEAN_FIELDS (as 0/1).
    continuous: Vec<(&'static str, Vec<Option<f64>>)>,
    categorical: Vec<(&'static str, Vec<Option<String>>)>,
    targets: Vec<f64>,
    n_rows: usize,
    skipped: usize,
}

pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Fits a new schema (vocabulary + medians) on `table` and encodes it.
    pub fn fit(table: &RecordTable) -> Result<FittedFeatures, FeatureError> {
        let batch = Self::parse(table, true)?;
        let encoding = FeatureEncoding {
            vocabulary: Self::vocabulary(&batch),
            medians: Self::batch_medians(&batch),
        };
        let (matrix, _) = Self::encode(&batch, &encoding, &encoding.medians)?;
        let schema = FeatureSchema::new(matrix.columns().to_vec(), encoding);

        debug!(
            "FeatureBuilder: fitted {} columns on {} rows",
            schema.len(),
            matrix.n_rows()
        );

        Ok(FittedFeatures {
            matrix,
            targets: batch.targets,
            schema,
            skipped_rows: batch.skipped,
        })
    }

    /// Encodes `table` so that its columns match `schema` exactly.
    pub fn transform(
        table: &RecordTable,
        schema: &FeatureSchema,
        policy: ImputationPolicy,
    ) -> Result<EncodedFeatures, FeatureError> {
        let batch = Self::parse(table, true)?;
        let (matrix, unseen, used_stored_vocabulary) =
            Self::encode_against(&batch, schema, policy)?;
        let aligned = matrix.reindex(schema.columns());

        if !aligned.added.is_empty() || !aligned.dropped.is_empty() {
            warn!(
                "FeatureBuilder: reconciled columns against schema (added {:?}, dropped {:?})",
                aligned.added, aligned.dropped
            );
        }

        Ok(EncodedFeatures {
            matrix: aligned.matrix,
            targets: batch.targets,
            skipped_rows: batch.skipped,
            added_columns: aligned.added,
            dropped_columns: aligned.dropped,
            unseen_categories: unseen,
            used_stored_vocabulary,
        })
    }

    /// Encodes records for inference. Target prices are ignored.
    pub fn encode_records(
        records: &[TransactionRecord],
        schema: &FeatureSchema,
    ) -> Result<FeatureMatrix, FeatureError> {
        let table = RecordTable::from_records(records);
        let batch = Self::parse(&table, false)?;
        let (matrix, _, _) =
            Self::encode_against(&batch, schema, ImputationPolicy::TrainingMedians)?;
        Ok(matrix.reindex(schema.columns()).matrix)
    }

    fn encode_against(
        batch: &ParsedBatch,
        schema: &FeatureSchema,
        policy: ImputationPolicy,
    ) -> Result<(FeatureMatrix, usize, bool), FeatureError> {
        let batch_medians = Self::batch_medians(batch);

        match schema.encoding() {
            Some(encoding) => {
                let medians = match policy {
                    ImputationPolicy::BatchMedians => batch_medians,
                    ImputationPolicy::TrainingMedians => {
                        let mut medians = encoding.medians.clone();
                        for (field, median) in batch_medians {
                            medians.entry(field).or_insert_with_key(|f| {
                                warn!("FeatureBuilder: no stored median for {}, using batch median", f);
                                median
                            });
                        }
                        medians
                    }
                };
                let (matrix, unseen) = Self::encode(batch, encoding, &medians)?;
                if unseen > 0 {
                    warn!(
                        "FeatureBuilder: {} categorical values outside the stored vocabulary encoded as baseline",
                        unseen
                    );
                }
                Ok((matrix, unseen, true))
            }
            None => {
                warn!("FeatureBuilder: schema has no stored vocabulary; encoding with batch categories");
                let encoding = FeatureEncoding {
                    vocabulary: Self::vocabulary(batch),
                    medians: batch_medians,
                };
                let (matrix, _) = Self::encode(batch, &encoding, &encoding.medians)?;
                Ok((matrix, 0, false))
            }
        }
    }

    fn parse(table: &RecordTable, with_targets: bool) -> Result<ParsedBatch, FeatureError> {
        let required: Vec<&str> = if with_targets {
            required_fields().collect()
        } else {
            required_fields().filter(|f| *f != TARGET_FIELD).collect()
        };
        let missing = table.missing_fields(required);
        if !missing.is_empty() {
            return Err(FeatureError::Schema { missing });
        }

        // Header presence was checked above.
        let index = |field: &str| table.column_index(field).unwrap_or_default();

        let mut kept = Vec::with_capacity(table.len());
        let mut targets = Vec::new();
        for row in 0..table.len() {
            if !with_targets {
                kept.push(row);
                continue;
            }
            if let Some(raw) = table.cell(row, index(TARGET_FIELD)) {
                targets.push(parse_number(raw, TARGET_FIELD, row)?);
                kept.push(row);
            }
        }

        let skipped = table.len() - kept.len();
        if skipped > 0 {
            warn!("FeatureBuilder: skipped {} rows without a {}", skipped, TARGET_FIELD);
        }
        if with_targets && kept.is_empty() {
            return Err(FeatureError::NoTargets);
        }

        let mut continuous = Vec::with_capacity(NUMERIC_FIELDS.len() + BOOLEAN_FIELDS.len());
        for &field in NUMERIC_FIELDS {
            let col = index(field);
            let values = kept
                .iter()
                .map(|&row| {
                    table
                        .cell(row, col)
                        .map(|raw| parse_number(raw, field, row))
                        .transpose()
                })
                .collect::<Result<Vec<_>, _>>()?;
            continuous.push((field, values));
        }
        for &field in BOOLEAN_FIELDS {
            let col = index(field);
            let values = kept
                .iter()
                .map(|&row| {
                    table
                        .cell(row, col)
                        .map(|raw| parse_flag(raw, field, row))
                        .transpose()
                })
                .collect::<Result<Vec<_>, _>>()?;
            continuous.push((field, values));
        }

        let categorical = CATEGORICAL_FIELDS
            .iter()
            .map(|&field| {
                let col = index(field);
                let values = kept
                    .iter()
                    .map(|&row| table.cell(row, col).map(str::to_string))
                    .collect();
                (field, values)
            })
            .collect();

        Ok(ParsedBatch {
            continuous,
            categorical,
            targets,
            n_rows: kept.len(),
            skipped,
        })
    }

    fn vocabulary(batch: &ParsedBatch) -> BTreeMap<String, Vec<String>> {
        batch
            .categorical
            .iter()
            .map(|(field, values)| {
                let categories: BTreeSet<&String> = values.iter().flatten().collect();
                (
                    field.to_string(),
                    categories.into_iter().cloned().collect(),
                )
            })
            .collect()
    }

    fn batch_medians(batch: &ParsedBatch) -> BTreeMap<String, f64> {
        batch
            .continuous
            .iter()
            .map(|(field, values)| {
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                let median = if present.is_empty() {
                    warn!("FeatureBuilder: {} has no values in batch, imputing 0", field);
                    0.0
                } else {
                    Data::new(present).median()
                };
                (field.to_string(), median)
            })
            .collect()
    }

    fn encode(
        batch: &ParsedBatch,
        encoding: &FeatureEncoding,
        medians: &BTreeMap<String, f64>,
    ) -> Result<(FeatureMatrix, usize), FeatureError> {
        let mut columns: Vec<String> = batch
            .continuous
            .iter()
            .map(|(field, _)| field.to_string())
            .collect();
        for (field, _) in &batch.categorical {
            for category in encoding.indicator_categories(field) {
                columns.push(format!("{}_{}", field, category));
            }
        }

        let fills: Vec<f64> = batch
            .continuous
            .iter()
            .map(|(field, _)| medians.get(*field).copied().unwrap_or(0.0))
            .collect();

        let mut unseen = 0;
        let mut rows = Vec::with_capacity(batch.n_rows);
        for i in 0..batch.n_rows {
            let mut row = Vec::with_capacity(columns.len());
            for ((_, values), fill) in batch.continuous.iter().zip(&fills) {
                row.push(values[i].unwrap_or(*fill));
            }
            for (field, values) in &batch.categorical {
                let indicators = encoding.indicator_categories(field);
                let value = values[i].as_deref();
                let known = value.is_none()
                    || encoding
                        .vocabulary
                        .get(*field)
                        .is_some_and(|v| v.iter().any(|c| Some(c.as_str()) == value));
                if !known {
                    unseen += 1;
                }
                row.extend(
                    indicators
                        .iter()
                        .map(|c| if Some(c.as_str()) == value { 1.0 } else { 0.0 }),
                );
            }
            rows.push(row);
        }

        Ok((FeatureMatrix::new(columns, rows)?, unseen))
    }
}

fn parse_number(raw: &str, field: &str, row: usize) -> Result<f64, FeatureError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FeatureError::InvalidValue {
            field: field.to_string(),
            row,
            value: raw.to_string(),
        })
}

fn parse_flag(raw: &str, field: &str, row: usize) -> Result<f64, FeatureError> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(1.0),
        "false" | "0" | "no" | "n" => Ok(0.0),
        _ => Err(FeatureError::InvalidValue {
            field: field.to_string(),
            row,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(zone: &str, area: Option<f64>, price: Option<f64>) -> TransactionRecord {
        TransactionRecord {
            area_sqm: area,
            rooms: Some(3.0),
            bathrooms: Some(1.0),
            floor: Some(1.0),
            building_age: Some(20.0),
            has_elevator: Some(true),
            has_balcony: None,
            has_garage: Some(false),
            has_garden: Some(false),
            zone: Some(zone.to_string()),
            condition: Some("good".to_string()),
            energy_class: Some("C".to_string()),
            cadastral_category: Some("A/2".to_string()),
            price,
            sale_date: None,
        }
    }

    fn table(records: &[TransactionRecord]) -> RecordTable {
        RecordTable::from_records(records)
    }

    #[test]
    fn test_fit_column_layout() {
        let fitted = FeatureBuilder::fit(&table(&[
            record("sud", Some(50.0), Some(100_000.0)),
            record("centro", Some(80.0), Some(200_000.0)),
            record("nord", Some(65.0), Some(150_000.0)),
        ]))
        .unwrap();

        let cols = fitted.schema.columns();
        assert_eq!(&cols[..5], NUMERIC_FIELDS);
        assert_eq!(&cols[5..9], BOOLEAN_FIELDS);
        // centro is the baseline (first sorted), so only nord/sud get columns;
        // single-category fields contribute nothing.
        assert_eq!(&cols[9..], ["zone_nord".to_string(), "zone_sud".to_string()]);
        assert_eq!(fitted.targets, vec![100_000.0, 200_000.0, 150_000.0]);

        let zone_sud = fitted.matrix.column("zone_sud").unwrap();
        let zone_nord = fitted.matrix.column("zone_nord").unwrap();
        assert_eq!(zone_sud, vec![1.0, 0.0, 0.0]);
        assert_eq!(zone_nord, vec![0.0, 0.0, 1.0]);
        assert_eq!(fitted.matrix.column("has_elevator").unwrap(), vec![1.0; 3]);
    }

    #[test]
    fn test_missing_values_imputed_with_batch_median() {
        let fitted = FeatureBuilder::fit(&table(&[
            record("a", Some(10.0), Some(1.0)),
            record("a", None, Some(1.0)),
            record("a", Some(30.0), Some(1.0)),
            record("a", Some(100.0), Some(1.0)),
        ]))
        .unwrap();

        // median of {10, 30, 100}
        let area = fitted.matrix.column("area_sqm").unwrap();
        assert_eq!(area[0], 10.0);
        assert_relative_eq!(area[1], 30.0, epsilon = 1e-6);
        assert_eq!(area[3], 100.0);
        // has_balcony is entirely missing: imputed 0 and recorded as such
        let medians = &fitted.schema.encoding().unwrap().medians;
        assert_eq!(medians["has_balcony"], 0.0);
        assert_relative_eq!(medians["area_sqm"], 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rows_without_target_are_skipped() {
        let fitted = FeatureBuilder::fit(&table(&[
            record("a", Some(10.0), Some(5.0)),
            record("a", Some(20.0), None),
        ]))
        .unwrap();
        assert_eq!(fitted.skipped_rows, 1);
        assert_eq!(fitted.matrix.n_rows(), 1);

        let err = FeatureBuilder::fit(&table(&[record("a", Some(1.0), None)]));
        assert!(matches!(err, Err(FeatureError::NoTargets)));
    }

    #[test]
    fn test_missing_required_field_is_schema_error() {
        let table = RecordTable::new(
            vec!["area_sqm".to_string(), "price".to_string()],
            vec![vec!["50".to_string(), "100000".to_string()]],
        );
        match FeatureBuilder::fit(&table) {
            Err(FeatureError::Schema { missing }) => {
                assert!(missing.contains(&"zone".to_string()));
                assert!(missing.contains(&"has_garden".to_string()));
                assert!(!missing.contains(&"price".to_string()));
            }
            other => panic!("expected schema error, got {:?}", other.map(|f| f.schema)),
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = table(&[record("a", Some(10.0), Some(5.0))]);
        let t = RecordTable::new(
            base.headers().to_vec(),
            vec![
                base.headers()
                    .iter()
                    .map(|h| match h.as_str() {
                        "has_garage" => "maybe".to_string(),
                        "zone" => "a".to_string(),
                        _ => "1".to_string(),
                    })
                    .collect(),
            ],
        );
        let err = FeatureBuilder::fit(&t).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidValue { ref field, .. } if field == "has_garage"));
    }

    #[test]
    fn test_transform_reuses_stored_vocabulary() {
        let train = FeatureBuilder::fit(&table(&[
            record("centro", Some(50.0), Some(1.0)),
            record("nord", Some(60.0), Some(2.0)),
            record("sud", Some(70.0), Some(3.0)),
        ]))
        .unwrap();

        // Fresh batch only sees "sud" and an unknown "est".
        let fresh = table(&[
            record("sud", Some(55.0), Some(4.0)),
            record("est", Some(65.0), Some(5.0)),
        ]);
        let encoded =
            FeatureBuilder::transform(&fresh, &train.schema, ImputationPolicy::TrainingMedians)
                .unwrap();

        assert_eq!(encoded.matrix.columns(), train.schema.columns());
        assert!(encoded.used_stored_vocabulary);
        assert!(encoded.added_columns.is_empty());
        assert!(encoded.dropped_columns.is_empty());
        assert_eq!(encoded.unseen_categories, 1);
        assert_eq!(encoded.matrix.column("zone_sud").unwrap(), vec![1.0, 0.0]);
        assert_eq!(encoded.matrix.column("zone_nord").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_training_medians_make_encoding_batch_independent() {
        let train = FeatureBuilder::fit(&table(&[
            record("a", Some(100.0), Some(1.0)),
            record("a", Some(100.0), Some(1.0)),
            record("a", Some(100.0), Some(1.0)),
        ]))
        .unwrap();

        let fresh = table(&[
            record("a", None, Some(1.0)),
            record("a", Some(10.0), Some(1.0)),
        ]);

        let stored =
            FeatureBuilder::transform(&fresh, &train.schema, ImputationPolicy::TrainingMedians)
                .unwrap();
        let batch =
            FeatureBuilder::transform(&fresh, &train.schema, ImputationPolicy::BatchMedians)
                .unwrap();

        assert_eq!(stored.matrix.column("area_sqm").unwrap(), vec![100.0, 10.0]);
        assert_eq!(batch.matrix.column("area_sqm").unwrap(), vec![10.0, 10.0]);
    }

    #[test]
    fn test_transform_without_vocabulary_reindexes_batch_columns() {
        let train = FeatureBuilder::fit(&table(&[
            record("centro", Some(50.0), Some(1.0)),
            record("nord", Some(60.0), Some(2.0)),
        ]))
        .unwrap();
        let columns_only = FeatureSchema::from_columns(train.schema.columns().to_vec());

        let fresh = table(&[
            record("centro", Some(55.0), Some(4.0)),
            record("sud", Some(65.0), Some(5.0)),
        ]);
        let encoded =
            FeatureBuilder::transform(&fresh, &columns_only, ImputationPolicy::TrainingMedians)
                .unwrap();

        assert!(!encoded.used_stored_vocabulary);
        assert_eq!(encoded.matrix.columns(), columns_only.columns());
        assert_eq!(encoded.added_columns, vec!["zone_nord".to_string()]);
        assert_eq!(encoded.dropped_columns, vec!["zone_sud".to_string()]);
        assert_eq!(encoded.matrix.column("zone_nord").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_encode_records_ignores_missing_price() {
        let train = FeatureBuilder::fit(&table(&[
            record("centro", Some(50.0), Some(1.0)),
            record("nord", Some(60.0), Some(2.0)),
        ]))
        .unwrap();

        let matrix =
            FeatureBuilder::encode_records(&[record("nord", None, None)], &train.schema).unwrap();
        assert_eq!(matrix.n_rows(), 1);
        assert_relative_eq!(matrix.column("area_sqm").unwrap()[0], 55.0, epsilon = 1e-6);
        assert_eq!(matrix.column("zone_nord").unwrap(), vec![1.0]);
    }
}
