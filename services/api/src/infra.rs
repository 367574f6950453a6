use crate::demo::demo_dataset;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lending_ops::config::DatasetConfig;
use lending_ops::repository::{ApplicationRepository, Dataset, DatasetError};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Option<Arc<PrometheusHandle>>,
    pub(crate) repository: Arc<dyn ApplicationRepository>,
}

impl AppState {
    pub(crate) fn new(repository: Arc<dyn ApplicationRepository>) -> Self {
        Self {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: None,
            repository,
        }
    }
}

/// Load the configured dataset, or the built-in demo portfolio when none is set.
pub(crate) fn load_dataset(config: &DatasetConfig) -> Result<Dataset, DatasetError> {
    match &config.path {
        Some(path) => Dataset::from_path(path),
        None => {
            info!("no dataset configured; serving demo portfolio");
            Ok(demo_dataset())
        }
    }
}

/// Installments fall overdue the day after their due date.
pub(crate) fn as_of_moment(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_reports_offending_input() {
        assert_eq!(
            parse_date(" 2024-02-29 "),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"))
        );
        let err = parse_date("29.02.2024").expect_err("wrong format");
        assert!(err.contains("29.02.2024"));
    }

    #[test]
    fn falls_back_to_demo_dataset() {
        let dataset = load_dataset(&DatasetConfig::default()).expect("demo loads");
        assert!(!dataset.applications.is_empty());
    }
}
