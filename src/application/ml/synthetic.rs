//! Seeded generator of plausible transaction records.
//!
//! Prices follow a simple hedonic model (price per sqm by zone, adjusted
//! for condition, energy class, floor, age and amenities) with
//! multiplicative noise. Some feature cells are left empty so imputation
//! gets exercised.

use crate::domain::valuation::transaction::TransactionRecord;
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Zone name and base price per square metre.
const ZONES: &[(&str, f64)] = &[
    ("centro", 4_200.0),
    ("semicentro", 3_100.0),
    ("periferia", 2_200.0),
    ("collina", 3_600.0),
    ("mare", 3_900.0),
];

const CONDITIONS: &[(&str, f64)] = &[
    ("da_ristrutturare", 0.75),
    ("buono", 1.0),
    ("ristrutturato", 1.12),
    ("nuovo", 1.25),
];

const ENERGY_CLASSES: &[(&str, f64)] = &[
    ("A", 1.10),
    ("B", 1.05),
    ("C", 1.0),
    ("D", 0.97),
    ("E", 0.94),
    ("F", 0.92),
    ("G", 0.90),
];

const CADASTRAL_CATEGORIES: &[(&str, f64)] = &[("A/2", 1.0), ("A/3", 0.9), ("A/7", 1.15)];

#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    seed: u64,
    /// Probability that an optional feature cell is left empty.
    missing_rate: f64,
    /// Half-width of the uniform multiplicative price noise.
    noise: f64,
}

impl SyntheticMarket {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            missing_rate: 0.03,
            noise: 0.08,
        }
    }

    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.clamp(0.0, 0.9);
        self
    }

    /// `n` records; the same seed always yields the same records.
    pub fn generate(&self, n: usize) -> Vec<TransactionRecord> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..n).map(|_| self.record(&mut rng)).collect()
    }

    fn record(&self, rng: &mut StdRng) -> TransactionRecord {
        let (zone, zone_price) = pick(rng, ZONES);
        let (condition, condition_factor) = pick(rng, CONDITIONS);
        let (energy_class, energy_factor) = pick(rng, ENERGY_CLASSES);
        let (category, category_factor) = pick(rng, CADASTRAL_CATEGORIES);

        let area: f64 = rng.random_range(35.0..220.0_f64).round();
        let rooms = (area / 28.0).round().clamp(1.0, 8.0);
        let bathrooms = if area > 110.0 { 2.0 } else { 1.0 };
        let floor = f64::from(rng.random_range(0..9_u8));
        let building_age = f64::from(rng.random_range(0..90_u8));

        let has_elevator = floor >= 2.0 && rng.random_bool(0.8);
        let has_balcony = rng.random_bool(0.6);
        let has_garage = rng.random_bool(0.35);
        let has_garden = floor == 0.0 && rng.random_bool(0.5);

        let mut price = area * zone_price * condition_factor * energy_factor * category_factor;
        price *= 1.0 - (building_age / 90.0) * 0.15;
        if floor >= 3.0 && !has_elevator {
            price *= 0.9;
        }
        if has_garage {
            price += 18_000.0;
        }
        if has_garden {
            price *= 1.06;
        }
        if has_balcony {
            price *= 1.02;
        }
        let noise = if self.noise > 0.0 {
            rng.random_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        price = (price * (1.0 + noise)).round();

        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default();
        let sale_date = start.checked_add_days(Days::new(rng.random_range(0..2_000)));

        TransactionRecord {
            area_sqm: Some(area),
            rooms: Some(rooms),
            bathrooms: self.maybe(rng, bathrooms),
            floor: self.maybe(rng, floor),
            building_age: self.maybe(rng, building_age),
            has_elevator: self.maybe(rng, has_elevator),
            has_balcony: self.maybe(rng, has_balcony),
            has_garage: Some(has_garage),
            has_garden: Some(has_garden),
            zone: Some(zone.to_string()),
            condition: self.maybe(rng, condition.to_string()),
            energy_class: self.maybe(rng, energy_class.to_string()),
            cadastral_category: Some(category.to_string()),
            price: Some(price),
            sale_date,
        }
    }

    fn maybe<T>(&self, rng: &mut StdRng, value: T) -> Option<T> {
        if self.missing_rate > 0.0 && rng.random_bool(self.missing_rate) {
            None
        } else {
            Some(value)
        }
    }
}

fn pick(rng: &mut StdRng, choices: &[(&'static str, f64)]) -> (&'static str, f64) {
    choices[rng.random_range(0..choices.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_records() {
        let a = SyntheticMarket::new(42).generate(50);
        let b = SyntheticMarket::new(42).generate(50);
        let c = SyntheticMarket::new(43).generate(50);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_every_record_has_a_positive_price() {
        let records = SyntheticMarket::new(1).with_missing_rate(0.2).generate(300);
        assert_eq!(records.len(), 300);
        assert!(records.iter().all(|r| r.price.is_some_and(|p| p > 0.0)));
        assert!(records.iter().all(|r| r.zone.is_some() && r.area_sqm.is_some()));
        assert!(records.iter().any(|r| r.building_age.is_none()));
    }

    #[test]
    fn test_no_missing_cells_when_disabled() {
        let records = SyntheticMarket::new(5).with_missing_rate(0.0).generate(100);
        assert!(records.iter().all(|r| r.floor.is_some()
            && r.condition.is_some()
            && r.has_elevator.is_some()));
    }

    #[test]
    fn test_larger_homes_cost_more_on_average() {
        let records = SyntheticMarket::new(11).with_noise(0.0).generate(500);
        let mean = |small: bool| {
            let prices: Vec<f64> = records
                .iter()
                .filter(|r| (r.area_sqm.unwrap_or(0.0) < 100.0) == small)
                .filter_map(|r| r.price)
                .collect();
            prices.iter().sum::<f64>() / prices.len() as f64
        };
        assert!(mean(false) > mean(true));
    }
}
