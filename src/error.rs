use thiserror::Error;

/// Failure to obtain or parse the indicator table. Fatal to the initial render.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),
    #[error("table has no indicator columns")]
    NoIndicators,
    #[error("indicator code {0:?} appears more than once")]
    DuplicateCode(String),
    #[error("row {row} has {found} fields, header has {expected}")]
    InconsistentRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}, column {column:?}: cannot parse {text:?} as a number")]
    InvalidValue {
        row: usize,
        column: String,
        text: String,
    },
    #[error("city {city:?} does not carry the same indicator codes as the first city")]
    CodeMismatch { city: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("unknown score family {0:?}")]
    UnknownScoreFamily(String),
    #[error("indicator {code} has value {value}, outside the geometric mean domain (> -1)")]
    Domain { code: String, value: f64 },
    #[error("nothing to aggregate: {0}")]
    EmptyInput(&'static str),
}

/// Failure writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
