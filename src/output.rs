use crate::error::ExportError;
use crate::types::{RankingRow, ScoreFamily, SummaryStats};
use crate::util::format_number;
use crate::views::Snapshot;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Markdown rendering of the first `max_rows` rows.
pub fn render_table_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table_rows(rows, max_rows));
}

/// The ranked chart as flat rows: ranked cities in rank order, then the
/// cities that could not be scored.
pub fn ranking_rows(snapshot: &Snapshot, family: ScoreFamily) -> Vec<RankingRow> {
    let Some(ranking) = snapshot.stats.ranking(family) else {
        return Vec::new();
    };
    let reported = |id| {
        snapshot
            .table
            .city(id)
            .and_then(|c| c.reported.get(&family))
            .map(|v| format_number(*v, 2))
            .unwrap_or_default()
    };
    let ranked = ranking.entries.iter().map(|e| RankingRow {
        rank: e.rank.to_string(),
        city: e.name.clone(),
        score: format_number(e.score, 2),
        reported_score: reported(e.city),
        standing: ranking.relative_standing(e.city).label().to_string(),
    });
    let unranked = ranking.unavailable.iter().map(|u| RankingRow {
        rank: "-".to_string(),
        city: u.name.clone(),
        score: String::new(),
        reported_score: reported(u.city),
        standing: u.reason.clone(),
    });
    ranked.chain(unranked).collect()
}

pub fn summary(snapshot: &Snapshot, family: ScoreFamily) -> SummaryStats {
    let ranking = snapshot.stats.ranking(family);
    SummaryStats {
        generated_at: chrono::Utc::now(),
        family,
        total_cities: snapshot.table.len(),
        ranked_cities: ranking.map_or(0, |r| r.entries.len()),
        total_indicators: snapshot.table.codes().len(),
        mean_score: ranking.and_then(|r| r.mean()),
        top_city: ranking.and_then(|r| r.entries.first()).map(|e| e.name.clone()),
    }
}
