//! Compiles dashboard filter selections into a single application predicate.
//!
//! Hierarchical facets (region, merchant, agent) are resolved against the [`Directory`] once, at
//! compile time, into plain fillial id sets. The resulting [`CompiledFilter`] owns everything it
//! needs, so it can be shared across threads and evaluated per application without coordination.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::directory::Directory;
use super::domain::{AgentId, Application, FillialId, MerchantId};
use super::status::Category;
use super::EngineError;

/// Inclusive principal bounds. A missing application amount is compared as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

/// Inclusive creation date bounds; the end date covers the whole day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

/// Filter selections as submitted by the dashboard. Every facet is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub search: Option<String>,
    pub status: Option<Category>,
    pub paid: Option<bool>,
    pub payment_method: Option<String>,
    pub fillial_id: Option<FillialId>,
    pub region: Option<String>,
    pub merchant_id: Option<MerchantId>,
    pub agent_id: Option<AgentId>,
    pub expired_month: Option<u32>,
    pub amount: Option<AmountRange>,
    pub created: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq)]
enum Facet {
    Search(String),
    Status(Category),
    Paid(bool),
    PaymentMethod(String),
    Fillials(BTreeSet<FillialId>),
    ExpiredMonth(u32),
    Amount {
        min: Option<i64>,
        max: Option<i64>,
    },
    Created {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Nothing,
}

impl Facet {
    fn matches(&self, application: &Application) -> bool {
        match self {
            Facet::Search(needle) => [
                application.full_name.as_deref(),
                application.phone.as_deref(),
                application.passport.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle.as_str())),
            Facet::Status(category) => application.category() == *category,
            Facet::Paid(paid) => {
                application.category() != Category::Finished || application.paid == *paid
            }
            Facet::PaymentMethod(method) => {
                application.category() == Category::Finished
                    && application.paid
                    && application
                        .payment_method
                        .as_deref()
                        .map(|value| value.trim().to_lowercase() == *method)
                        .unwrap_or(false)
            }
            Facet::Fillials(ids) => ids.contains(&application.fillial_id),
            Facet::ExpiredMonth(months) => application.term_months == Some(*months),
            Facet::Amount { min, max } => {
                let amount = application.principal();
                min.map_or(true, |min| amount >= min) && max.map_or(true, |max| amount <= max)
            }
            Facet::Created { start, end } => {
                let created = application.created_on();
                start.map_or(true, |start| created >= start)
                    && end.map_or(true, |end| created <= end)
            }
            Facet::Nothing => false,
        }
    }
}

/// Conjunction of every facet present in a [`FilterSpec`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    facets: Vec<Facet>,
}

impl CompiledFilter {
    pub fn matches(&self, application: &Application) -> bool {
        self.facets.iter().all(|facet| facet.matches(application))
    }

    /// Matching applications in input order.
    pub fn apply<'a>(&self, applications: &'a [Application]) -> Vec<&'a Application> {
        applications
            .iter()
            .filter(|application| self.matches(application))
            .collect()
    }

    pub fn count(&self, applications: &[Application]) -> usize {
        applications
            .iter()
            .filter(|application| self.matches(application))
            .count()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.facets.is_empty()
    }
}

fn normalized_text(value: Option<&str>) -> Option<String> {
    value
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

fn validate_amount_range(range: &AmountRange) -> Result<(), EngineError> {
    for (field, bound) in [("amount.min", range.min), ("amount.max", range.max)] {
        if let Some(value) = bound {
            if value < 0 {
                return Err(EngineError::InvalidAmount { field, value });
            }
        }
    }

    if let (Some(min), Some(max)) = (range.min, range.max) {
        if min > max {
            return Err(EngineError::InvalidRange {
                field: "amount",
                start: min.to_string(),
                end: max.to_string(),
            });
        }
    }

    Ok(())
}

fn validate_date_range(range: &DateRange) -> Result<(), EngineError> {
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if end < start {
            return Err(EngineError::InvalidRange {
                field: "created",
                start: start.to_string(),
                end: end.to_string(),
            });
        }
    }
    Ok(())
}

/// Resolve `spec` against `directory` into a reusable predicate.
pub fn compile(spec: &FilterSpec, directory: &Directory) -> Result<CompiledFilter, EngineError> {
    let mut facets = Vec::new();

    if let Some(needle) = normalized_text(spec.search.as_deref()) {
        facets.push(Facet::Search(needle));
    }

    if let Some(category) = spec.status {
        facets.push(Facet::Status(category));
    }

    if let Some(paid) = spec.paid {
        facets.push(Facet::Paid(paid));
    }

    if let Some(method) = normalized_text(spec.payment_method.as_deref()) {
        facets.push(Facet::PaymentMethod(method));
    }

    if let Some(fillial_id) = spec.fillial_id {
        facets.push(Facet::Fillials(BTreeSet::from([fillial_id])));
    }

    if let Some(region) = normalized_text(spec.region.as_deref()) {
        let ids = directory.fillials_where(|fillial| fillial.region.trim().to_lowercase() == region);
        facets.push(Facet::Fillials(ids));
    }

    if let Some(merchant_id) = spec.merchant_id {
        let ids = directory.fillials_where(|fillial| fillial.merchant_id == merchant_id);
        facets.push(Facet::Fillials(ids));
    }

    if let Some(agent_id) = spec.agent_id {
        match directory.agent(agent_id) {
            Some(agent) => facets.push(Facet::Fillials(agent.fillial_ids.clone())),
            None => {
                debug!(agent_id = agent_id.0, "agent filter does not resolve; matching nothing");
                facets.push(Facet::Nothing);
            }
        }
    }

    if let Some(months) = spec.expired_month {
        facets.push(Facet::ExpiredMonth(months));
    }

    if let Some(range) = &spec.amount {
        validate_amount_range(range)?;
        if range.min.is_some() || range.max.is_some() {
            facets.push(Facet::Amount {
                min: range.min,
                max: range.max,
            });
        }
    }

    if let Some(range) = &spec.created {
        validate_date_range(range)?;
        if range.start.is_some() || range.end.is_some() {
            facets.push(Facet::Created {
                start: range.start,
                end: range.end,
            });
        }
    }

    debug!(facets = facets.len(), "compiled application filter");
    Ok(CompiledFilter { facets })
}
