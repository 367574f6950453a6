use crate::infra::{as_of_moment, load_dataset};
use chrono::{Local, NaiveDate};
use clap::Args;
use lending_ops::config::{AppConfig, DatasetConfig};
use lending_ops::engine::{
    by_entity, category_summary, compile, over_time, portfolio_overview, schedule,
    status_distribution, AgentId, AmountRange, Category, DateRange, EntityDimension, FilterSpec,
    FillialId, Granularity, MerchantId,
};
use lending_ops::error::AppError;
use lending_ops::repository::ApplicationRepository;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Dataset JSON file or folder (defaults to APP_DATASET, then the demo portfolio)
    #[arg(long)]
    pub(crate) dataset: Option<PathBuf>,
    /// Time bucket for the applications timeline (day or week)
    #[arg(long, default_value_t = Granularity::Day)]
    pub(crate) granularity: Granularity,
    /// Evaluation date for debt figures (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Free-text search over client name, phone and passport
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// Canonical status category (confirmed, finished, rejected, limit, pending)
    #[arg(long)]
    pub(crate) status: Option<Category>,
    /// Only finished applications with this paid flag
    #[arg(long)]
    pub(crate) paid: Option<bool>,
    /// Payment method of paid, finished applications
    #[arg(long)]
    pub(crate) payment_method: Option<String>,
    #[arg(long)]
    pub(crate) fillial: Option<u64>,
    #[arg(long)]
    pub(crate) region: Option<String>,
    #[arg(long)]
    pub(crate) merchant: Option<u64>,
    #[arg(long)]
    pub(crate) agent: Option<u64>,
    /// Exact loan term in months
    #[arg(long)]
    pub(crate) expired_month: Option<u32>,
    #[arg(long)]
    pub(crate) min_amount: Option<i64>,
    #[arg(long)]
    pub(crate) max_amount: Option<i64>,
    /// First creation date to include (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Last creation date to include, whole day (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) to: Option<NaiveDate>,
}

impl ReportArgs {
    fn filter_spec(&self) -> FilterSpec {
        let amount = (self.min_amount.is_some() || self.max_amount.is_some()).then_some(
            AmountRange {
                min: self.min_amount,
                max: self.max_amount,
            },
        );
        let created = (self.from.is_some() || self.to.is_some()).then_some(DateRange {
            start: self.from,
            end: self.to,
        });

        FilterSpec {
            search: self.search.clone(),
            status: self.status,
            paid: self.paid,
            payment_method: self.payment_method.clone(),
            fillial_id: self.fillial.map(FillialId),
            region: self.region.clone(),
            merchant_id: self.merchant.map(MerchantId),
            agent_id: self.agent.map(AgentId),
            expired_month: self.expired_month,
            amount,
            created,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ScheduleArgs {
    /// Total amount to repay, in currency units
    #[arg(long)]
    pub(crate) total: i64,
    /// Loan term in months
    #[arg(long)]
    pub(crate) term: i64,
    /// Loan start date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start: NaiveDate,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let dataset_config = match &args.dataset {
        Some(path) => DatasetConfig {
            path: Some(path.clone()),
        },
        None => AppConfig::load()?.dataset,
    };
    let dataset = load_dataset(&dataset_config)?;
    let directory = dataset.directory()?;
    let applications = dataset.list()?;

    let filter = compile(&args.filter_spec(), &directory)?;
    let matched = filter.apply(&applications);
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    println!("Lending operations report (as of {as_of})");
    println!(
        "- {} of {} applications match the filter",
        matched.len(),
        applications.len()
    );

    println!("\nBy category");
    for entry in category_summary(matched.iter().copied()) {
        println!("  - {}: {} ({} principal)", entry.label, entry.count, entry.amount);
    }

    for (title, dimension) in [
        ("By fillial", EntityDimension::Fillial),
        ("By merchant", EntityDimension::Merchant),
    ] {
        println!("\n{title}");
        for bucket in by_entity(matched.iter().copied(), dimension, &directory) {
            println!("  - {}: {}", bucket.label, bucket.value);
        }
    }

    println!("\nRaw statuses");
    let distribution = status_distribution(matched.iter().copied());
    for (label, count) in distribution.labels.iter().zip(&distribution.series) {
        println!("  - {label}: {count}");
    }

    println!("\nApplications per {}", args.granularity);
    let timeline = over_time(matched.iter().copied(), args.granularity);
    for (bucket, count) in timeline.categories.iter().zip(&timeline.series) {
        println!("  - {bucket}: {count}");
    }

    let overview = portfolio_overview(matched.iter().copied(), as_of_moment(as_of))?;
    println!("\nPortfolio debt");
    println!(
        "- scheduled {} | paid {} | remaining {} | overdue {}",
        overview.total_amount, overview.paid_amount, overview.remaining_debt, overview.overdue_amount
    );
    println!(
        "- {} of {} applications have overdue installments",
        overview.applications_overdue, overview.applications
    );
    for entry in &overview.most_overdue {
        println!(
            "  - application #{}: {} overdue, {} day(s) past due",
            entry.application_id.0, entry.overdue_amount, entry.days_past_due
        );
    }

    Ok(())
}

pub(crate) fn run_schedule(args: ScheduleArgs) -> Result<(), AppError> {
    let entries = schedule(args.total, args.term, args.start)?;
    if entries.is_empty() {
        println!("No installments: term must be at least one month");
        return Ok(());
    }

    println!(
        "Repayment schedule for {} over {} month(s) from {}",
        args.total, args.term, args.start
    );
    for entry in &entries {
        println!(
            "- #{:>2} | due {} | {}",
            entry.month_number, entry.due_date, entry.expected_amount
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filter_spec_from_flags() {
        let args = ReportArgs {
            merchant: Some(10),
            min_amount: Some(1_000),
            to: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..ReportArgs::default()
        };

        let spec = args.filter_spec();
        assert_eq!(spec.merchant_id, Some(MerchantId(10)));
        assert_eq!(
            spec.amount,
            Some(AmountRange {
                min: Some(1_000),
                max: None
            })
        );
        assert_eq!(spec.created.and_then(|range| range.end), args.to);
        assert!(spec.agent_id.is_none());
    }

    #[test]
    fn report_runs_against_demo_data() {
        let args = ReportArgs {
            dataset: None,
            as_of: NaiveDate::from_ymd_opt(2024, 6, 1),
            granularity: Granularity::Week,
            ..ReportArgs::default()
        };
        // Demo data is used when neither the flag nor APP_DATASET is set.
        std::env::remove_var("APP_DATASET");
        run_report(args).expect("report renders");
    }
}
