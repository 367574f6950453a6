//! Allocation of received payments against a repayment schedule.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::domain::{Application, ApplicationId, InstallmentStatus, Payment, ScheduleEntry};
use super::schedule::schedule;
use super::EngineError;

/// Schedule with per-installment settlement state and the derived debt figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSummary {
    pub schedule: Vec<ScheduleEntry>,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub remaining_debt: i64,
    pub overdue_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_payment_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_payment_date: Option<NaiveDate>,
    /// Money received beyond the schedule total.
    #[serde(default)]
    pub unallocated_amount: i64,
}

impl DebtSummary {
    pub fn overdue_installments(&self) -> usize {
        self.schedule
            .iter()
            .filter(|entry| entry.status == InstallmentStatus::Overdue)
            .count()
    }

    pub fn max_days_past_due(&self) -> i64 {
        self.schedule
            .iter()
            .map(|entry| entry.days_past_due)
            .max()
            .unwrap_or(0)
    }
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Allocate `payments` oldest-first onto `schedule` and classify every installment as of `as_of`.
pub fn reconcile(
    schedule: &[ScheduleEntry],
    payments: &[Payment],
    as_of: NaiveDateTime,
) -> Result<DebtSummary, EngineError> {
    if let Some(payment) = payments.iter().find(|payment| payment.amount < 0) {
        return Err(EngineError::InvalidAmount {
            field: "payment.amount",
            value: payment.amount,
        });
    }
    if let Some(entry) = schedule.iter().find(|entry| entry.expected_amount < 0) {
        return Err(EngineError::InvalidAmount {
            field: "expected_amount",
            value: entry.expected_amount,
        });
    }

    let mut entries: Vec<ScheduleEntry> = schedule
        .iter()
        .cloned()
        .map(|mut entry| {
            entry.paid_amount = 0;
            entry.settled_at = None;
            entry
        })
        .collect();
    entries.sort_by_key(|entry| entry.month_number);

    let mut ordered: Vec<&Payment> = payments
        .iter()
        .filter(|payment| payment.is_settled())
        .collect();
    ordered.sort_by_key(|payment| payment.occurred_at);

    let mut cursor = 0;
    let mut unallocated = 0i64;
    for payment in ordered {
        let mut available = payment.amount;
        while available > 0 {
            while cursor < entries.len()
                && entries[cursor].paid_amount >= entries[cursor].expected_amount
            {
                cursor += 1;
            }
            let Some(entry) = entries.get_mut(cursor) else {
                break;
            };

            let applied = available.min(entry.expected_amount - entry.paid_amount);
            entry.paid_amount += applied;
            available -= applied;
            if entry.paid_amount >= entry.expected_amount {
                entry.settled_at = Some(payment.occurred_at);
                cursor += 1;
            }
        }
        unallocated = unallocated.saturating_add(available);
    }

    let mut total_amount = 0i64;
    let mut paid_amount = 0i64;
    let mut overdue_amount = 0i64;

    for entry in &mut entries {
        let due = start_of(entry.due_date);
        if entry.paid_amount >= entry.expected_amount {
            entry.status = InstallmentStatus::Completed;
            entry.days_past_due = 0;
        } else if due < as_of {
            entry.status = InstallmentStatus::Overdue;
            entry.days_past_due = (as_of - due).num_days();
            overdue_amount = overdue_amount.saturating_add(entry.outstanding());
        } else {
            entry.status = InstallmentStatus::Pending;
            entry.days_past_due = 0;
        }

        total_amount = total_amount.saturating_add(entry.expected_amount);
        paid_amount = paid_amount.saturating_add(entry.paid_amount.min(entry.expected_amount));
    }

    let next = entries
        .iter()
        .find(|entry| entry.status == InstallmentStatus::Overdue)
        .or_else(|| {
            entries
                .iter()
                .find(|entry| entry.status == InstallmentStatus::Pending)
        });

    let summary = DebtSummary {
        next_payment_amount: next.map(ScheduleEntry::outstanding),
        next_payment_date: next.map(|entry| entry.due_date),
        total_amount,
        paid_amount,
        remaining_debt: (total_amount - paid_amount).max(0),
        overdue_amount,
        unallocated_amount: unallocated,
        schedule: entries,
    };

    trace!(
        total = summary.total_amount,
        paid = summary.paid_amount,
        overdue = summary.overdue_amount,
        "reconciled schedule"
    );

    Ok(summary)
}

/// Build the application's schedule from its creation date and reconcile its own payments.
pub fn application_debt(
    application: &Application,
    as_of: NaiveDateTime,
) -> Result<DebtSummary, EngineError> {
    let term = application.term_months.map(i64::from).unwrap_or(0);
    let entries = schedule(application.repayable_total(), term, application.created_on())?;
    reconcile(&entries, &application.payments, as_of)
}

/// Debt position across a collection of applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub applications: usize,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub remaining_debt: i64,
    pub overdue_amount: i64,
    pub applications_overdue: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub most_overdue: Vec<OverdueApplication>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueApplication {
    pub application_id: ApplicationId,
    pub overdue_amount: i64,
    pub days_past_due: i64,
}

const MOST_OVERDUE_LIMIT: usize = 5;

/// Reconcile each application independently and fold the results.
pub fn portfolio_overview<'a, I>(
    applications: I,
    as_of: NaiveDateTime,
) -> Result<PortfolioOverview, EngineError>
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut overview = PortfolioOverview::default();
    let mut overdue = Vec::new();

    for application in applications {
        let summary = application_debt(application, as_of)?;
        overview.applications += 1;
        overview.total_amount = overview.total_amount.saturating_add(summary.total_amount);
        overview.paid_amount = overview.paid_amount.saturating_add(summary.paid_amount);
        overview.remaining_debt = overview
            .remaining_debt
            .saturating_add(summary.remaining_debt);
        overview.overdue_amount = overview
            .overdue_amount
            .saturating_add(summary.overdue_amount);

        if summary.overdue_installments() > 0 {
            overview.applications_overdue += 1;
            overdue.push(OverdueApplication {
                application_id: application.id,
                overdue_amount: summary.overdue_amount,
                days_past_due: summary.max_days_past_due(),
            });
        }
    }

    overdue.sort_by(|a, b| {
        b.days_past_due
            .cmp(&a.days_past_due)
            .then(b.overdue_amount.cmp(&a.overdue_amount))
            .then(a.application_id.cmp(&b.application_id))
    });
    overdue.truncate(MOST_OVERDUE_LIMIT);
    overview.most_overdue = overdue;

    Ok(overview)
}
