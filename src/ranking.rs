//! Cross-city ordering and the per-family / per-indicator statistics every
//! view scales against.

use crate::aggregate::{city_score, max_across_cities, Extrema};
use crate::error::Result;
use crate::types::{CityId, IndicatorTable, ScoreFamily};
use crate::util::{average, descending};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCity {
    pub city: CityId,
    pub name: String,
    pub score: f64,
    /// 1 = highest score.
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unranked {
    pub city: CityId,
    pub name: String,
    pub reason: String,
}

/// Cities ordered by descending score for one family. Cities whose score
/// could not be computed are listed separately and take no part in the
/// ordering or the mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub family: ScoreFamily,
    pub entries: Vec<RankedCity>,
    pub unavailable: Vec<Unranked>,
}

/// Sort descending (stable, so ties keep table order) and give each entry the
/// 1-based position of the first occurrence of its value. Equal scores share
/// a rank and the next distinct score takes its own position.
fn rank_descending(mut scores: Vec<(CityId, f64)>) -> Vec<(CityId, f64, u32)> {
    scores.sort_by(|a, b| descending(a.1, b.1));
    let mut out = Vec::with_capacity(scores.len());
    let mut first_pos = 0usize;
    for (pos, (id, score)) in scores.iter().enumerate() {
        if pos == 0 || *score != scores[pos - 1].1 {
            first_pos = pos;
        }
        out.push((*id, *score, first_pos as u32 + 1));
    }
    out
}

pub fn rank_cities(table: &IndicatorTable, family: ScoreFamily) -> Ranking {
    let mut scores = Vec::with_capacity(table.len());
    let mut unavailable = Vec::new();
    for city in table.cities() {
        match city_score(city, family) {
            Ok(score) => scores.push((city.id, score)),
            Err(err) => {
                warn!(
                    city = %city.name,
                    %family,
                    error = %err,
                    "score unavailable, city left unranked"
                );
                unavailable.push(Unranked {
                    city: city.id,
                    name: city.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    let entries = rank_descending(scores)
        .into_iter()
        .map(|(id, score, rank)| RankedCity {
            city: id,
            name: table.city(id).map(|c| c.name.clone()).unwrap_or_default(),
            score,
            rank,
        })
        .collect();
    Ranking {
        family,
        entries,
        unavailable,
    }
}

/// Rank by a family name coming from a UI control.
pub fn rank_cities_by_name(table: &IndicatorTable, family: &str) -> Result<Ranking> {
    Ok(rank_cities(table, family.parse()?))
}

impl Ranking {
    pub fn entry(&self, city: CityId) -> Option<&RankedCity> {
        self.entries.iter().find(|e| e.city == city)
    }

    pub fn rank_of(&self, city: CityId) -> Option<u32> {
        self.entry(city).map(|e| e.rank)
    }

    pub fn is_unavailable(&self, city: CityId) -> bool {
        self.unavailable.iter().any(|u| u.city == city)
    }

    /// Mean over exactly the ranked cities.
    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let scores: Vec<f64> = self.entries.iter().map(|e| e.score).collect();
        Some(average(&scores))
    }

    pub fn extrema(&self) -> Option<Extrema> {
        // entries are sorted descending
        let max = self.entries.first()?.score;
        let min = self.entries.last()?.score;
        Some(Extrema { min, max })
    }

    pub fn relative_standing(&self, city: CityId) -> Standing {
        match (self.entry(city), self.mean()) {
            (Some(entry), Some(mean)) => relative_standing(entry.score, mean),
            _ => Standing::NoAverage,
        }
    }
}

/// Signed whole-percent distance from the mean, or the sentinel when there
/// is no usable mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Percent(i64),
    NoAverage,
}

pub fn relative_standing(score: f64, mean: f64) -> Standing {
    if mean == 0.0 || !mean.is_finite() || !score.is_finite() {
        return Standing::NoAverage;
    }
    // halves round toward positive infinity: -12.5 becomes -12
    let percent = ((score / mean) - 1.0) * 100.0;
    Standing::Percent((percent + 0.5).floor() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandingLabel {
    pub direction: Direction,
    pub magnitude: u64,
}

pub fn format_standing(percentage: i64) -> StandingLabel {
    let direction = match percentage {
        0 => Direction::None,
        p if p > 0 => Direction::Above,
        _ => Direction::Below,
    };
    StandingLabel {
        direction,
        magnitude: percentage.unsigned_abs(),
    }
}

impl Standing {
    pub fn label(self) -> StandingLabel {
        match self {
            Standing::Percent(p) => format_standing(p),
            Standing::NoAverage => StandingLabel {
                direction: Direction::None,
                magnitude: 0,
            },
        }
    }
}

impl fmt::Display for StandingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Above => write!(f, "▲{}% above average", self.magnitude),
            Direction::Below => write!(f, "▼{}% below average", self.magnitude),
            Direction::None => f.write_str("No average standing available"),
        }
    }
}

/// Min, max, mean and per-city rank of one series of values.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    /// Indexed by `CityId`; `None` for cities outside the series.
    pub rank_of: Vec<Option<u32>>,
}

impl SeriesStats {
    fn from_ranked(ranked: &[(CityId, f64, u32)], city_count: usize) -> Option<Self> {
        let (_, max, _) = *ranked.first()?;
        let (_, min, _) = *ranked.last()?;
        let values: Vec<f64> = ranked.iter().map(|r| r.1).collect();
        let mut rank_of = vec![None; city_count];
        for (id, _, rank) in ranked {
            rank_of[id.0] = Some(*rank);
        }
        Some(Self {
            min,
            max,
            average: average(&values),
            rank_of,
        })
    }

    pub fn extrema(&self) -> Extrema {
        Extrema {
            min: self.min,
            max: self.max,
        }
    }

    pub fn rank(&self, city: CityId) -> Option<u32> {
        self.rank_of.get(city.0).copied().flatten()
    }
}

/// Everything derived from one table. Built in one go and replaced
/// wholesale when the table changes; never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedStats {
    rankings: BTreeMap<ScoreFamily, Ranking>,
    families: BTreeMap<ScoreFamily, SeriesStats>,
    indicators: BTreeMap<String, SeriesStats>,
    absolute_max: f64,
    city_count: usize,
}

impl DerivedStats {
    pub fn compute(table: &IndicatorTable) -> Self {
        let mut rankings = BTreeMap::new();
        let mut families = BTreeMap::new();
        for family in ScoreFamily::ALL {
            let ranking = rank_cities(table, family);
            let ranked: Vec<_> = ranking
                .entries
                .iter()
                .map(|e| (e.city, e.score, e.rank))
                .collect();
            if let Some(stats) = SeriesStats::from_ranked(&ranked, table.len()) {
                families.insert(family, stats);
            }
            rankings.insert(family, ranking);
        }

        let mut indicators = BTreeMap::new();
        for (col, code) in table.codes().iter().enumerate() {
            let values = table
                .cities()
                .iter()
                .map(|c| (c.id, c.indicators[col].value))
                .collect();
            if let Some(stats) = SeriesStats::from_ranked(&rank_descending(values), table.len()) {
                indicators.insert(code.clone(), stats);
            }
        }

        debug!(
            cities = table.len(),
            indicators = indicators.len(),
            "derived statistics computed"
        );
        Self {
            rankings,
            families,
            indicators,
            absolute_max: max_across_cities(table),
            city_count: table.len(),
        }
    }

    pub fn ranking(&self, family: ScoreFamily) -> Option<&Ranking> {
        self.rankings.get(&family)
    }

    pub fn family(&self, family: ScoreFamily) -> Option<&SeriesStats> {
        self.families.get(&family)
    }

    pub fn indicator(&self, code: &str) -> Option<&SeriesStats> {
        self.indicators.get(code)
    }

    pub fn absolute_max(&self) -> f64 {
        self.absolute_max
    }

    pub fn city_count(&self) -> usize {
        self.city_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{City, GeoPoint, Indicator};
    use pretty_assertions::assert_eq;

    fn table(rows: &[(&str, &[f64])]) -> IndicatorTable {
        let cities = rows
            .iter()
            .enumerate()
            .map(|(i, (name, values))| City {
                id: CityId(i),
                name: name.to_string(),
                location: GeoPoint { lat: 0.0, lng: 0.0 },
                indicators: values
                    .iter()
                    .enumerate()
                    .map(|(j, v)| Indicator::new(format!("c{j}"), *v))
                    .collect(),
                reported: Default::default(),
            })
            .collect();
        IndicatorTable::from_cities(cities).unwrap()
    }

    fn ranks(r: &Ranking) -> Vec<(&str, u32)> {
        r.entries.iter().map(|e| (e.name.as_str(), e.rank)).collect()
    }

    #[test]
    fn ties_share_rank_and_higher_score_ranks_first() {
        let t = table(&[("A", &[10.0]), ("B", &[10.0]), ("C", &[20.0])]);
        let r = rank_cities(&t, ScoreFamily::Arithmetic);
        assert_eq!(ranks(&r), vec![("C", 1), ("A", 2), ("B", 2)]);
    }

    #[test]
    fn rank_after_tie_is_its_position() {
        let t = table(&[("A", &[5.0]), ("B", &[5.0]), ("C", &[3.0]), ("D", &[1.0])]);
        let r = rank_cities(&t, ScoreFamily::Arithmetic);
        assert_eq!(ranks(&r), vec![("A", 1), ("B", 1), ("C", 3), ("D", 4)]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let t = table(&[("A", &[0.3, 0.9]), ("B", &[0.6, 0.6]), ("C", &[0.1, 0.2])]);
        for family in ScoreFamily::ALL {
            assert_eq!(rank_cities(&t, family), rank_cities(&t, family));
        }
    }

    #[test]
    fn domain_error_leaves_city_unranked() {
        let t = table(&[("A", &[0.5, 0.5]), ("Bad", &[-1.5, 0.5]), ("C", &[0.1, 0.1])]);
        let r = rank_cities(&t, ScoreFamily::Geometric);
        assert_eq!(ranks(&r), vec![("A", 1), ("C", 2)]);
        assert!(r.is_unavailable(CityId(1)));
        assert_eq!(r.relative_standing(CityId(1)), Standing::NoAverage);
        // the arithmetic family still ranks it
        assert_eq!(rank_cities(&t, ScoreFamily::Arithmetic).entries.len(), 3);
    }

    #[test]
    fn unknown_family_name_is_rejected() {
        let t = table(&[("A", &[1.0])]);
        assert!(rank_cities_by_name(&t, "geometric").is_ok());
        assert!(matches!(
            rank_cities_by_name(&t, "mode"),
            Err(crate::error::DashboardError::UnknownScoreFamily(_))
        ));
    }

    #[test]
    fn standing_against_mean_of_ranked_cities() {
        let t = table(&[("A", &[0.6]), ("B", &[0.4]), ("C", &[0.5])]);
        let r = rank_cities(&t, ScoreFamily::Arithmetic);
        assert_eq!(r.relative_standing(CityId(0)), Standing::Percent(20));
        assert_eq!(r.relative_standing(CityId(1)), Standing::Percent(-20));
        assert_eq!(r.relative_standing(CityId(2)), Standing::Percent(0));
    }

    #[test]
    fn standing_without_cities_is_sentinel() {
        let r = rank_cities(&IndicatorTable::default(), ScoreFamily::Arithmetic);
        assert_eq!(r.mean(), None);
        assert_eq!(r.relative_standing(CityId(0)), Standing::NoAverage);
        assert_eq!(relative_standing(1.0, 0.0), Standing::NoAverage);
    }

    #[test]
    fn standing_halves_round_up() {
        assert_eq!(relative_standing(9.0, 8.0), Standing::Percent(13));
        assert_eq!(relative_standing(7.0, 8.0), Standing::Percent(-12));
        assert_eq!(
            relative_standing(7.0, 8.0).label().to_string(),
            "▼12% below average"
        );
    }

    #[test]
    fn standing_labels() {
        assert_eq!(format_standing(12).to_string(), "▲12% above average");
        assert_eq!(format_standing(-7).to_string(), "▼7% below average");
        assert_eq!(format_standing(0).direction, Direction::None);
        assert_eq!(
            Standing::NoAverage.label().to_string(),
            "No average standing available"
        );
    }

    #[test]
    fn derived_stats_cover_families_and_indicators() {
        let t = table(&[("A", &[0.2, 1.2]), ("B", &[0.4, 0.0]), ("C", &[0.4, 0.3])]);
        let stats = DerivedStats::compute(&t);
        let c0 = stats.indicator("c0").unwrap();
        assert_eq!((c0.min, c0.max), (0.2, 0.4));
        assert_eq!(c0.rank_of, vec![Some(3), Some(1), Some(1)]);
        assert!((c0.average - (1.0 / 3.0)).abs() < 1e-12);
        assert_eq!(stats.absolute_max(), 1.2);
        let arith = stats.family(ScoreFamily::Arithmetic).unwrap();
        assert_eq!(arith.rank(CityId(0)), Some(1));
        assert_eq!(stats.ranking(ScoreFamily::Median).unwrap().entries.len(), 3);
    }
}
