use crate::error::{DashboardError, DataLoadError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Zero-based index into the fixed city ordering of an [`IndicatorTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CityId(pub usize);

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub code: String,
    pub description: String,
    /// Normalized, relative to the other cities. May exceed 1.
    pub value: f64,
    pub raw_display_value: String,
}

impl Indicator {
    pub fn new(code: impl Into<String>, value: f64) -> Self {
        let code = code.into();
        Self {
            description: code.clone(),
            raw_display_value: value.to_string(),
            code,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub location: GeoPoint,
    pub indicators: Vec<Indicator>,
    /// Summary scores shipped with the table (`score$...` columns).
    pub reported: BTreeMap<ScoreFamily, f64>,
}

/// Which aggregation produced a per-city summary score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFamily {
    Arithmetic,
    Median,
    Geometric,
}

impl ScoreFamily {
    pub const ALL: [ScoreFamily; 3] = [
        ScoreFamily::Arithmetic,
        ScoreFamily::Median,
        ScoreFamily::Geometric,
    ];

    pub const COLUMN_PREFIX: &'static str = "score$";

    pub fn tag(self) -> &'static str {
        match self {
            ScoreFamily::Arithmetic => "arithmetic",
            ScoreFamily::Median => "median",
            ScoreFamily::Geometric => "geometric",
        }
    }

    pub fn column(self) -> String {
        format!("{}{}", Self::COLUMN_PREFIX, self.tag())
    }
}

impl fmt::Display for ScoreFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ScoreFamily {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let tag = tag.strip_prefix(Self::COLUMN_PREFIX).unwrap_or(tag);
        ScoreFamily::ALL
            .into_iter()
            .find(|f| f.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| DashboardError::UnknownScoreFamily(s.to_string()))
    }
}

/// Immutable, validated set of cities. Every city carries the same indicator
/// codes in the same order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorTable {
    cities: Vec<City>,
    codes: Vec<String>,
}

impl IndicatorTable {
    pub fn from_cities(mut cities: Vec<City>) -> Result<Self, DataLoadError> {
        let codes: Vec<String> = match cities.first() {
            Some(first) => first.indicators.iter().map(|i| i.code.clone()).collect(),
            None => Vec::new(),
        };
        for (idx, code) in codes.iter().enumerate() {
            if codes[..idx].contains(code) {
                return Err(DataLoadError::DuplicateCode(code.clone()));
            }
        }
        for (idx, city) in cities.iter_mut().enumerate() {
            let same = city.indicators.len() == codes.len()
                && city.indicators.iter().zip(&codes).all(|(i, c)| &i.code == c);
            if !same {
                return Err(DataLoadError::CodeMismatch {
                    city: city.name.clone(),
                });
            }
            city.id = CityId(idx);
        }
        Ok(Self { cities, codes })
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn city(&self, id: CityId) -> Option<&City> {
        self.cities.get(id.0)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

/// What every view displays. Owned by the selection store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub city: Option<CityId>,
    pub family: ScoreFamily,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            city: None,
            family: ScoreFamily::Arithmetic,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: String,
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Score")]
    #[tabled(rename = "Score")]
    pub score: String,
    #[serde(rename = "ReportedScore")]
    #[tabled(rename = "ReportedScore")]
    pub reported_score: String,
    #[serde(rename = "Standing")]
    #[tabled(rename = "Standing")]
    pub standing: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub family: ScoreFamily,
    pub total_cities: usize,
    pub ranked_cities: usize,
    pub total_indicators: usize,
    pub mean_score: Option<f64>,
    pub top_city: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str, codes: &[&str]) -> City {
        City {
            id: CityId(99),
            name: name.to_string(),
            location: GeoPoint { lat: 0.0, lng: 0.0 },
            indicators: codes.iter().map(|c| Indicator::new(*c, 0.5)).collect(),
            reported: BTreeMap::new(),
        }
    }

    #[test]
    fn family_parses_tags_and_columns() {
        assert_eq!("median".parse::<ScoreFamily>().unwrap(), ScoreFamily::Median);
        assert_eq!(
            "score$geometric".parse::<ScoreFamily>().unwrap(),
            ScoreFamily::Geometric
        );
        assert!(matches!(
            "harmonic".parse::<ScoreFamily>(),
            Err(DashboardError::UnknownScoreFamily(name)) if name == "harmonic"
        ));
    }

    #[test]
    fn table_reassigns_ids_in_order() {
        let cities = vec![city("A", &["x", "y"]), city("B", &["x", "y"])];
        let table = IndicatorTable::from_cities(cities).unwrap();
        assert_eq!(table.cities()[1].id, CityId(1));
        assert_eq!(table.codes(), ["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn table_rejects_mismatched_codes() {
        let err = IndicatorTable::from_cities(vec![city("A", &["x", "y"]), city("B", &["y", "x"])])
            .unwrap_err();
        assert!(matches!(err, DataLoadError::CodeMismatch { city } if city == "B"));
    }

    #[test]
    fn table_rejects_duplicate_codes() {
        let err = IndicatorTable::from_cities(vec![city("A", &["x", "x"])]).unwrap_err();
        assert!(matches!(err, DataLoadError::DuplicateCode(code) if code == "x"));
    }
}
