use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Numeric input fields, passed through unchanged.
/// This order is part of every feature schema produced by the builder.
pub const NUMERIC_FIELDS: &[&str] = &["area_sqm", "rooms", "bathrooms", "floor", "building_age"];

/// Amenity flags, encoded as 0/1.
pub const BOOLEAN_FIELDS: &[&str] = &["has_elevator", "has_balcony", "has_garage", "has_garden"];

/// Categorical fields, one-hot encoded against a fixed vocabulary.
pub const CATEGORICAL_FIELDS: &[&str] = &["zone", "condition", "energy_class", "cadastral_category"];

/// Sale price, the regression target.
pub const TARGET_FIELD: &str = "price";

pub const SALE_DATE_FIELD: &str = "sale_date";

/// All fields a record table must carry for feature building.
pub fn required_fields() -> impl Iterator<Item = &'static str> {
    NUMERIC_FIELDS
        .iter()
        .chain(BOOLEAN_FIELDS)
        .chain(CATEGORICAL_FIELDS)
        .copied()
        .chain(std::iter::once(TARGET_FIELD))
}

/// One historical sale.
///
/// Optional fields model cells that were empty in the source data; the
/// feature builder imputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub area_sqm: Option<f64>,
    pub rooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub floor: Option<f64>,
    pub building_age: Option<f64>,
    pub has_elevator: Option<bool>,
    pub has_balcony: Option<bool>,
    pub has_garage: Option<bool>,
    pub has_garden: Option<bool>,
    pub zone: Option<String>,
    pub condition: Option<String>,
    pub energy_class: Option<String>,
    pub cadastral_category: Option<String>,
    pub price: Option<f64>,
    pub sale_date: Option<NaiveDate>,
}

impl TransactionRecord {
    pub fn numeric(&self, field: &str) -> Option<f64> {
        match field {
            "area_sqm" => self.area_sqm,
            "rooms" => self.rooms,
            "bathrooms" => self.bathrooms,
            "floor" => self.floor,
            "building_age" => self.building_age,
            TARGET_FIELD => self.price,
            _ => None,
        }
    }

    pub fn boolean(&self, field: &str) -> Option<bool> {
        match field {
            "has_elevator" => self.has_elevator,
            "has_balcony" => self.has_balcony,
            "has_garage" => self.has_garage,
            "has_garden" => self.has_garden,
            _ => None,
        }
    }

    pub fn categorical(&self, field: &str) -> Option<&str> {
        match field {
            "zone" => self.zone.as_deref(),
            "condition" => self.condition.as_deref(),
            "energy_class" => self.energy_class.as_deref(),
            "cadastral_category" => self.cadastral_category.as_deref(),
            _ => None,
        }
    }
}
