//! Per-city summary scores and dataset-wide extrema.
//!
//! Everything here is a pure function of its input.

use crate::error::{DashboardError, Result};
use crate::types::{City, Indicator, IndicatorTable, ScoreFamily};
use crate::util::{average, median};
use std::collections::BTreeMap;

/// Sum of values over count.
///
/// An empty slice yields 0 rather than an error: a city without indicators
/// renders as an empty bar instead of aborting the view.
pub fn arithmetic_mean(indicators: &[Indicator]) -> f64 {
    let values: Vec<f64> = indicators.iter().map(|i| i.value).collect();
    average(&values)
}

/// `(∏(v + 1))^(1/n) - 1`.
///
/// Shifting by one keeps a single zero from collapsing the product, while an
/// all-zero input still maps to exactly 0. Values at or below -1 are outside
/// the domain.
pub fn pseudo_geometric_mean(indicators: &[Indicator]) -> Result<f64> {
    if indicators.is_empty() {
        return Ok(0.0);
    }
    let mut product = 1.0;
    for ind in indicators {
        let shifted = ind.value + 1.0;
        if !(shifted > 0.0) {
            return Err(DashboardError::Domain {
                code: ind.code.clone(),
                value: ind.value,
            });
        }
        product *= shifted;
    }
    Ok(product.powf(1.0 / indicators.len() as f64) - 1.0)
}

pub fn median_of(indicators: &[Indicator]) -> f64 {
    median(indicators.iter().map(|i| i.value).collect())
}

/// Summary score of one city for a family.
///
/// Median prefers the figure shipped with the table and only computes one
/// when the cell was absent.
pub fn city_score(city: &City, family: ScoreFamily) -> Result<f64> {
    match family {
        ScoreFamily::Arithmetic => Ok(arithmetic_mean(&city.indicators)),
        ScoreFamily::Geometric => pseudo_geometric_mean(&city.indicators),
        ScoreFamily::Median => Ok(city
            .reported
            .get(&ScoreFamily::Median)
            .copied()
            .unwrap_or_else(|| median_of(&city.indicators))),
    }
}

/// Largest indicator value in the whole table; 0 for an empty table.
pub fn max_across_cities(table: &IndicatorTable) -> f64 {
    table
        .cities()
        .iter()
        .flat_map(|c| c.indicators.iter().map(|i| i.value))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub min: f64,
    pub max: f64,
}

impl Extrema {
    fn seed(v: f64) -> Self {
        Self { min: v, max: v }
    }

    fn widen(&mut self, v: f64) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    /// Position of `v` between min and max in `0..=1`; 0 when the range is flat.
    pub fn fraction(&self, v: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON || !range.is_finite() {
            return 0.0;
        }
        ((v - self.min) / range).clamp(0.0, 1.0)
    }
}

/// Min and max of every indicator code across all cities, in one pass.
pub fn per_variable_extrema(table: &IndicatorTable) -> BTreeMap<String, Extrema> {
    let mut out: BTreeMap<String, Extrema> = BTreeMap::new();
    for city in table.cities() {
        for ind in &city.indicators {
            out.entry(ind.code.clone())
                .and_modify(|e| e.widen(ind.value))
                .or_insert_with(|| Extrema::seed(ind.value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CityId, GeoPoint};

    fn inds(values: &[f64]) -> Vec<Indicator> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Indicator::new(format!("c{i}"), *v))
            .collect()
    }

    fn city(values: &[f64]) -> City {
        City {
            id: CityId(0),
            name: "X".into(),
            location: GeoPoint { lat: 0.0, lng: 0.0 },
            indicators: inds(values),
            reported: BTreeMap::new(),
        }
    }

    #[test]
    fn arithmetic_mean_ignores_order_and_defaults_to_zero() {
        let a = arithmetic_mean(&inds(&[0.2, 0.9, 0.4, 1.1]));
        let b = arithmetic_mean(&inds(&[1.1, 0.4, 0.9, 0.2]));
        assert!((a - b).abs() < 1e-12);
        assert!((a - 0.65).abs() < 1e-12);
        assert_eq!(arithmetic_mean(&[]), 0.0);
    }

    #[test]
    fn geometric_mean_of_zeros_is_zero() {
        assert_eq!(pseudo_geometric_mean(&inds(&[0.0, 0.0])).unwrap(), 0.0);
        assert_eq!(pseudo_geometric_mean(&inds(&[0.0; 11])).unwrap(), 0.0);
    }

    #[test]
    fn geometric_mean_shifts_by_one() {
        let g = pseudo_geometric_mean(&inds(&[3.0, 3.0])).unwrap();
        assert!((g - 3.0).abs() < 1e-12);
        // a zero does not collapse the result
        let g = pseudo_geometric_mean(&inds(&[0.0, 3.0])).unwrap();
        assert!((g - 1.0).abs() < 1e-12);
    }

    #[test]
    fn geometric_mean_rejects_values_at_or_below_minus_one() {
        let err = pseudo_geometric_mean(&inds(&[0.5, -1.0])).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Domain { code, value } if code == "c1" && value == -1.0
        ));
        // slightly negative is still inside the domain
        assert!(pseudo_geometric_mean(&inds(&[-0.5, 0.5])).is_ok());
    }

    #[test]
    fn median_prefers_reported_value() {
        let mut c = city(&[0.1, 0.2, 0.9]);
        assert_eq!(city_score(&c, ScoreFamily::Median).unwrap(), 0.2);
        c.reported.insert(ScoreFamily::Median, 0.55);
        assert_eq!(city_score(&c, ScoreFamily::Median).unwrap(), 0.55);
    }

    #[test]
    fn extrema_span_all_cities() {
        let mut a = city(&[0.1, 1.2]);
        a.name = "A".into();
        let mut b = city(&[0.4, 0.3]);
        b.name = "B".into();
        let table = IndicatorTable::from_cities(vec![a, b]).unwrap();
        let ext = per_variable_extrema(&table);
        assert_eq!(ext["c0"], Extrema { min: 0.1, max: 0.4 });
        assert_eq!(ext["c1"], Extrema { min: 0.3, max: 1.2 });
        assert_eq!(max_across_cities(&table), 1.2);
        assert_eq!(max_across_cities(&IndicatorTable::default()), 0.0);
    }

    #[test]
    fn fraction_handles_flat_range() {
        let e = Extrema { min: 0.5, max: 0.5 };
        assert_eq!(e.fraction(0.5), 0.0);
        let e = Extrema { min: 0.0, max: 2.0 };
        assert_eq!(e.fraction(0.5), 0.25);
    }
}
