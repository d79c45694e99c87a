//! Runtime settings. Everything has a default; a few values can be
//! overridden through environment variables.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Base URL of the service exposing `getData`.
    pub base_url: String,
    /// Local CSV to read instead of calling the service.
    pub data_path: Option<PathBuf>,
    pub transition: Duration,
    pub marker_radius: f64,
    /// Share of the window width given to the primary chart column.
    pub panel_width: f64,
    /// Share of the window height given to the ranked chart panel.
    pub panel_height: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_path: None,
            transition: Duration::from_millis(800),
            marker_radius: 15.0,
            panel_width: 0.40,
            panel_height: 0.40,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(url) = lookup("DASHBOARD_BASE_URL").filter(|u| !u.trim().is_empty()) {
            let url = url.trim();
            cfg.base_url = if url.ends_with('/') {
                url.to_string()
            } else {
                format!("{url}/")
            };
        }
        if let Some(path) = lookup("DASHBOARD_DATA_PATH").filter(|p| !p.trim().is_empty()) {
            cfg.data_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(ms) = lookup("DASHBOARD_TRANSITION_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => cfg.transition = Duration::from_millis(ms),
                Err(_) => warn!(value = %ms, "ignoring invalid DASHBOARD_TRANSITION_MS"),
            }
        }
        cfg
    }

    pub fn data_url(&self) -> String {
        format!("{}getData", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_apply_over_defaults() {
        let env: HashMap<&str, &str> = [
            ("DASHBOARD_BASE_URL", "https://example.org/api"),
            ("DASHBOARD_TRANSITION_MS", "250"),
        ]
        .into_iter()
        .collect();
        let cfg = DashboardConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.data_url(), "https://example.org/api/getData");
        assert_eq!(cfg.transition, Duration::from_millis(250));
        assert_eq!(cfg.data_path, None);
        assert_eq!(cfg.marker_radius, 15.0);
    }

    #[test]
    fn bad_duration_keeps_default() {
        let cfg = DashboardConfig::from_lookup(|k| {
            (k == "DASHBOARD_TRANSITION_MS").then(|| "soon".to_string())
        });
        assert_eq!(cfg.transition, Duration::from_millis(800));
    }
}
