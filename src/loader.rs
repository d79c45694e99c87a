use crate::config::DashboardConfig;
use crate::error::DataLoadError;
use crate::types::{City, CityId, GeoPoint, Indicator, IndicatorTable, ScoreFamily};
use crate::util::parse_f64_safe;
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Dataset bundled into the binary, used when no service is reachable.
pub const BUNDLED_CSV: &str = include_str!("../data/sdsn_cleaned.csv");

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub indicator_columns: usize,
    pub summary_columns: Vec<ScoreFamily>,
    pub ignored_columns: Vec<String>,
    pub negative_values: usize,
    pub missing_summaries: usize,
}

enum Column {
    Name,
    Lat,
    Lng,
    Summary(ScoreFamily),
    Indicator { code: String, description: String },
    Ignored,
}

fn classify(header: &str) -> Column {
    let h = header.trim();
    match h {
        "name" => return Column::Name,
        "lat" => return Column::Lat,
        "lng" => return Column::Lng,
        _ => {}
    }
    if let Some(tag) = h.strip_prefix(ScoreFamily::COLUMN_PREFIX) {
        return match tag.parse::<ScoreFamily>() {
            Ok(family) => Column::Summary(family),
            Err(_) => Column::Ignored,
        };
    }
    // Indicator headers are `CODE|Description`.
    match h.split_once('|') {
        Some((code, description)) => Column::Indicator {
            code: code.trim().to_string(),
            description: description.trim().to_string(),
        },
        None => Column::Indicator {
            code: h.to_string(),
            description: h.to_string(),
        },
    }
}

/// Parse the delimited-text indicator table.
///
/// Column consistency is checked up front: every row must have exactly the
/// header's field count and every indicator and coordinate cell must parse.
/// The first problem aborts the load.
pub fn parse_table(text: &str) -> Result<(IndicatorTable, LoadReport), DataLoadError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    let columns: Vec<Column> = headers.iter().map(classify).collect();

    let find = |want: fn(&Column) -> bool, name: &'static str| {
        columns
            .iter()
            .position(want)
            .ok_or(DataLoadError::MissingColumn(name))
    };
    let name_col = find(|c| matches!(c, Column::Name), "name")?;
    let lat_col = find(|c| matches!(c, Column::Lat), "lat")?;
    let lng_col = find(|c| matches!(c, Column::Lng), "lng")?;

    let mut report = LoadReport::default();
    for (header, column) in headers.iter().zip(&columns) {
        match column {
            Column::Indicator { .. } => report.indicator_columns += 1,
            Column::Summary(family) => report.summary_columns.push(*family),
            Column::Ignored => {
                warn!(column = header, "ignoring unrecognised summary column");
                report.ignored_columns.push(header.to_string());
            }
            _ => {}
        }
    }
    if report.indicator_columns == 0 {
        return Err(DataLoadError::NoIndicators);
    }

    let mut cities = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        let row = idx + 1;
        report.total_rows += 1;
        if record.len() != headers.len() {
            return Err(DataLoadError::InconsistentRow {
                row,
                expected: headers.len(),
                found: record.len(),
            });
        }
        let number = |col: usize| {
            parse_f64_safe(record.get(col)).ok_or_else(|| DataLoadError::InvalidValue {
                row,
                column: headers[col].to_string(),
                text: record[col].to_string(),
            })
        };

        let location = GeoPoint {
            lat: number(lat_col)?,
            lng: number(lng_col)?,
        };
        let mut indicators = Vec::with_capacity(report.indicator_columns);
        let mut reported = BTreeMap::new();
        for (col, column) in columns.iter().enumerate() {
            match column {
                Column::Indicator { code, description } => {
                    let value = number(col)?;
                    if value < 0.0 {
                        report.negative_values += 1;
                        warn!(row, code = %code, value, "negative indicator value");
                    }
                    indicators.push(Indicator {
                        code: code.clone(),
                        description: description.clone(),
                        value,
                        raw_display_value: record[col].to_string(),
                    });
                }
                Column::Summary(family) => match parse_f64_safe(record.get(col)) {
                    Some(v) => {
                        reported.insert(*family, v);
                    }
                    None => report.missing_summaries += 1,
                },
                _ => {}
            }
        }
        cities.push(City {
            id: CityId(idx),
            name: record[name_col].to_string(),
            location,
            indicators,
            reported,
        });
    }

    let table = IndicatorTable::from_cities(cities)?;
    debug!(?report, "parsed indicator table");
    Ok((table, report))
}

/// Anything that can hand over the raw indicator table text.
#[async_trait]
pub trait TableSource: Send + Sync {
    fn describe(&self) -> String;
    async fn fetch_raw(&self) -> Result<String, DataLoadError>;
}

#[async_trait]
impl TableSource for Box<dyn TableSource> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn fetch_raw(&self) -> Result<String, DataLoadError> {
        (**self).fetch_raw().await
    }
}

pub struct FileSource {
    pub path: PathBuf,
}

#[async_trait]
impl TableSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_raw(&self) -> Result<String, DataLoadError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DataLoadError::Io {
                path: self.describe(),
                source,
            })
    }
}

pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TableSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch_raw(&self) -> Result<String, DataLoadError> {
        let http = |source| DataLoadError::Http {
            url: self.url.clone(),
            source,
        };
        let resp = self
            .client
            .post(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http)?;
        resp.text().await.map_err(http)
    }
}

pub struct BundledSource;

#[async_trait]
impl TableSource for BundledSource {
    fn describe(&self) -> String {
        "bundled dataset".to_string()
    }

    async fn fetch_raw(&self) -> Result<String, DataLoadError> {
        Ok(BUNDLED_CSV.to_string())
    }
}

/// Pick the source named by the config: a local file wins over the service.
pub fn source_for(config: &DashboardConfig) -> Box<dyn TableSource> {
    match &config.data_path {
        Some(path) => Box::new(FileSource { path: path.clone() }),
        None => Box::new(HttpSource::new(config.data_url())),
    }
}

/// Memoised fetch. Callers that arrive while the fetch is pending wait on
/// the same request; later callers get the cached table. A failed fetch is
/// not cached, so an explicit retry goes back to the source.
pub struct TableLoader<S> {
    source: S,
    cell: OnceCell<(Arc<IndicatorTable>, LoadReport)>,
}

impl<S: TableSource> TableLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    pub async fn table(&self) -> Result<Arc<IndicatorTable>, DataLoadError> {
        let (table, _) = self
            .cell
            .get_or_try_init(|| async {
                info!(source = %self.source.describe(), "fetching indicator table");
                let text = self.source.fetch_raw().await?;
                let (table, report) = parse_table(&text)?;
                info!(
                    cities = table.len(),
                    indicators = table.codes().len(),
                    "indicator table loaded"
                );
                Ok::<_, DataLoadError>((Arc::new(table), report))
            })
            .await?;
        Ok(Arc::clone(table))
    }

    pub fn report(&self) -> Option<&LoadReport> {
        self.cell.get().map(|(_, report)| report)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SMALL: &str = "\
name,lat,lng,score$arithmetic,score$median,score$bogus,PM|Fine particulate matter,Transit|Transit access
Alpha,47.5,-52.7,0.5,,1,0.25,0.75
Beta,44.6,-63.5,0.4,0.3,1,-0.5, 1.2 
";

    #[test]
    fn parses_meta_summary_and_indicator_columns() {
        let (table, report) = parse_table(SMALL).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.codes(), ["PM".to_string(), "Transit".to_string()]);
        let beta = &table.cities()[1];
        assert_eq!(beta.id, CityId(1));
        assert_eq!(beta.location, GeoPoint { lat: 44.6, lng: -63.5 });
        assert_eq!(beta.indicators[0].description, "Fine particulate matter");
        assert_eq!(beta.indicators[1].value, 1.2);
        assert_eq!(beta.indicators[1].raw_display_value, "1.2");
        assert_eq!(beta.reported.get(&ScoreFamily::Median), Some(&0.3));
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.negative_values, 1);
        assert_eq!(report.missing_summaries, 1);
        assert_eq!(report.ignored_columns, vec!["score$bogus".to_string()]);
    }

    #[test]
    fn decimal_comma_cell_fails_fast() {
        let err = parse_table("name,lat,lng,A|a\nAlpha,10,20,\"1,2\"\n").unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::InvalidValue { row: 1, ref column, ref text }
                if column == "A|a" && text == "1,2"
        ));
    }

    #[test]
    fn short_row_fails_fast() {
        let text = "name,lat,lng,A|a,B|b\nAlpha,1,2,0.1,0.2\nBeta,1,2,0.1\n";
        let err = parse_table(text).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::InconsistentRow { row: 2, expected: 5, found: 4 }
        ));
    }

    #[test]
    fn blank_indicator_cell_is_an_error() {
        let text = "name,lat,lng,A|a\nAlpha,1,2,\n";
        assert!(matches!(
            parse_table(text).unwrap_err(),
            DataLoadError::InvalidValue { row: 1, .. }
        ));
    }

    #[test]
    fn missing_meta_column_is_an_error() {
        let text = "name,lat,A|a\nAlpha,1,0.5\n";
        assert!(matches!(
            parse_table(text).unwrap_err(),
            DataLoadError::MissingColumn("lng")
        ));
    }

    #[test]
    fn duplicate_code_is_an_error() {
        let text = "name,lat,lng,A|first,A|second\nAlpha,1,2,0.1,0.2\n";
        assert!(matches!(
            parse_table(text).unwrap_err(),
            DataLoadError::DuplicateCode(code) if code == "A"
        ));
    }

    #[test]
    fn bundled_dataset_parses() {
        let (table, report) = parse_table(BUNDLED_CSV).unwrap();
        assert_eq!(table.len(), 18);
        assert_eq!(table.codes().len(), 11);
        assert_eq!(report.summary_columns, ScoreFamily::ALL.to_vec());
        assert_eq!(table.cities()[0].name, "St. John's");
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl TableSource for CountingSource {
        fn describe(&self) -> String {
            "counting".into()
        }

        async fn fetch_raw(&self) -> Result<String, DataLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(DataLoadError::NoIndicators);
            }
            Ok(SMALL.to_string())
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = TableLoader::new(CountingSource {
            calls: calls.clone(),
            fail: false,
        });
        let (a, b) = tokio::join!(loader.table(), loader.table());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        let c = loader.table().await.unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.report().map(|r| r.total_rows), Some(2));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = TableLoader::new(CountingSource {
            calls: calls.clone(),
            fail: true,
        });
        assert!(loader.table().await.is_err());
        assert!(!loader.is_loaded());
        assert!(loader.table().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn file_source_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        std::fs::write(&path, SMALL).unwrap();
        let loader = TableLoader::new(FileSource { path });
        assert_eq!(loader.table().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let loader = TableLoader::new(FileSource {
            path: PathBuf::from("/definitely/not/here.csv"),
        });
        assert!(matches!(
            loader.table().await.unwrap_err(),
            DataLoadError::Io { .. }
        ));
    }
}
