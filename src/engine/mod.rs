//! Pure computations over loan applications.
//!
//! The evaluation date is always passed in as `as_of`; nothing here reads the wall clock or keeps
//! state between calls.

pub mod aggregate;
pub mod directory;
pub mod domain;
pub mod filter;
pub mod reconcile;
pub mod schedule;
pub mod status;

pub use aggregate::{
    by_entity, category_summary, over_time, status_distribution, CategoryCount, EntityBucket,
    EntityDimension, Granularity, StatusDistribution, TimeSeries,
};
pub use directory::Directory;
pub use domain::{
    Agent, AgentId, Application, ApplicationId, Fillial, FillialId, InstallmentStatus, Merchant,
    MerchantId, Payment, Product, ScheduleEntry,
};
pub use filter::{compile, AmountRange, CompiledFilter, DateRange, FilterSpec};
pub use reconcile::{
    application_debt, portfolio_overview, reconcile, DebtSummary, OverdueApplication,
    PortfolioOverview,
};
pub use schedule::{due_date, schedule};
pub use status::{classify, matching_rule, Category, StatusRule, STATUS_RULES};

/// Caller contract violations. Everything else the engine normalizes to an empty or default
/// result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{field} range is inverted: start {start} is after end {end}")]
    InvalidRange {
        field: &'static str,
        start: String,
        end: String,
    },
    #[error("{field} must not be negative (got {value})")]
    InvalidAmount { field: &'static str, value: i64 },
    #[error("term of {value} months is outside the supported calendar")]
    InvalidTerm { value: i64 },
}
