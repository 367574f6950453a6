//! Chart-ready aggregations over an already filtered application collection.
//!
//! Every aggregation places each input application in exactly one bucket, so bucket values
//! always add up to the number of applications passed in.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::directory::Directory;
use super::domain::{Application, FillialId, MerchantId};
use super::status::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityDimension {
    Fillial,
    Merchant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBucket {
    /// Absent when the merchant of an application's fillial is unknown.
    pub id: Option<u64>,
    pub label: String,
    pub value: usize,
}

const UNASSIGNED_LABEL: &str = "unassigned";

/// Count applications per fillial or merchant, largest first.
pub fn by_entity<'a, I>(
    applications: I,
    dimension: EntityDimension,
    directory: &Directory,
) -> Vec<EntityBucket>
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut counts: HashMap<Option<u64>, usize> = HashMap::new();
    for application in applications {
        let key = match dimension {
            EntityDimension::Fillial => Some(application.fillial_id.0),
            EntityDimension::Merchant => directory
                .merchant_of(application.fillial_id)
                .map(|merchant| merchant.0),
        };
        *counts.entry(key).or_default() += 1;
    }

    let mut buckets: Vec<EntityBucket> = counts
        .into_iter()
        .map(|(id, value)| {
            let label = match id {
                Some(raw) => {
                    let resolved = match dimension {
                        EntityDimension::Fillial => {
                            directory.fillial_label(FillialId(raw))
                        }
                        EntityDimension::Merchant => {
                            directory.merchant_label(MerchantId(raw))
                        }
                    };
                    resolved.unwrap_or_else(|| format!("#{raw}"))
                }
                None => UNASSIGNED_LABEL.to_string(),
            };
            EntityBucket { id, label, value }
        })
        .collect();

    buckets.sort_by_key(|bucket| (Reverse(bucket.value), bucket.id.is_none(), bucket.id));
    buckets
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDistribution {
    pub labels: Vec<String>,
    pub series: Vec<usize>,
}

/// Count applications per literal raw status, in first-seen order.
pub fn status_distribution<'a, I>(applications: I) -> StatusDistribution
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut positions: HashMap<&'a str, usize> = HashMap::new();
    let mut distribution = StatusDistribution::default();

    for application in applications {
        let status = application.raw_status.as_str();
        match positions.get(status) {
            Some(&index) => distribution.series[index] += 1,
            None => {
                positions.insert(status, distribution.labels.len());
                distribution.labels.push(status.to_string());
                distribution.series.push(1);
            }
        }
    }

    distribution
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    Week,
}

impl Granularity {
    pub fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Week => format!("{}-W{:02}", date.year(), week_of_year(date)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            other => Err(format!("unknown granularity '{other}' (expected day or week)")),
        }
    }
}

/// Week number counted from January 1st, with weeks starting on Monday as in ISO weeks.
pub fn week_of_year(date: NaiveDate) -> u32 {
    let offset = NaiveDate::from_ymd_opt(date.year(), 1, 1)
        .map(|jan_first| jan_first.weekday().num_days_from_monday())
        .unwrap_or(0);
    (date.ordinal0() + offset + 1).div_ceil(7)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub categories: Vec<String>,
    pub series: Vec<usize>,
}

/// Count applications per creation day or week, oldest bucket first. Empty buckets are omitted.
pub fn over_time<'a, I>(applications: I, granularity: Granularity) -> TimeSeries
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for application in applications {
        *buckets
            .entry(granularity.bucket_key(application.created_on()))
            .or_default() += 1;
    }

    let (categories, series) = buckets.into_iter().unzip();
    TimeSeries { categories, series }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub label: &'static str,
    pub count: usize,
    pub amount: i64,
}

/// Headline counts and principal per canonical category, in display order.
pub fn category_summary<'a, I>(applications: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut totals: HashMap<Category, (usize, i64)> = HashMap::new();
    for application in applications {
        let entry = totals.entry(application.category()).or_default();
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(application.principal());
    }

    Category::ordered()
        .into_iter()
        .map(|category| {
            let (count, amount) = totals.get(&category).copied().unwrap_or_default();
            CategoryCount {
                category,
                label: category.label(),
                count,
                amount,
            }
        })
        .collect()
}
