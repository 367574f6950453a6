use chrono::{Months, NaiveDate};

use super::domain::{InstallmentStatus, ScheduleEntry};
use super::EngineError;

/// Due date of installment `month_number`, counted in calendar months from `start`.
///
/// Always offset from `start` rather than from the previous due date, so a loan opened on the
/// 31st falls due on the last day of short months and returns to the 31st afterwards.
pub fn due_date(start: NaiveDate, month_number: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(month_number))
}

/// Split `total` into `term_months` equal monthly installments starting one month after
/// `start_date`. The final installment absorbs the rounding remainder.
///
/// A non-positive term yields an empty schedule.
pub fn schedule(
    total: i64,
    term_months: i64,
    start_date: NaiveDate,
) -> Result<Vec<ScheduleEntry>, EngineError> {
    if total < 0 {
        return Err(EngineError::InvalidAmount {
            field: "total",
            value: total,
        });
    }

    if term_months <= 0 {
        return Ok(Vec::new());
    }

    let term = u32::try_from(term_months).map_err(|_| EngineError::InvalidTerm {
        value: term_months,
    })?;
    let base = total / term_months;
    let last = total - base * (term_months - 1);

    (1..=term)
        .map(|month_number| {
            let due_date =
                due_date(start_date, month_number).ok_or(EngineError::InvalidTerm {
                    value: term_months,
                })?;
            Ok(ScheduleEntry {
                month_number,
                due_date,
                expected_amount: if month_number == term { last } else { base },
                paid_amount: 0,
                status: InstallmentStatus::Pending,
                days_past_due: 0,
                settled_at: None,
            })
        })
        .collect()
}
