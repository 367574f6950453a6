use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::status::{classify, Category};

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

/// Identifier wrapper for merchant branches (fillials).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FillialId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MerchantId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

/// Line item financed by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: i64,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl Product {
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(i64::from(self.count))
    }
}

/// Money actually received against an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: i64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub occurred_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Payment {
    /// Transfers reported as failed never count toward the schedule.
    pub fn is_settled(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => {
                let status = status.trim().to_ascii_uppercase();
                !matches!(
                    status.as_str(),
                    "FAILED" | "CANCELED" | "CANCELLED" | "REJECTED" | "DECLINED"
                )
            }
            None => true,
        }
    }
}

/// A loan application as supplied by the application repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub raw_status: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub payment_amount: Option<i64>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub term_months: Option<u32>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: NaiveDateTime,
    pub fillial_id: FillialId,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Application {
    pub fn category(&self) -> Category {
        classify(&self.raw_status)
    }

    /// Principal, with a missing amount counted as zero.
    pub fn principal(&self) -> i64 {
        self.amount.unwrap_or(0)
    }

    /// Total the client owes over the whole term.
    pub fn repayable_total(&self) -> i64 {
        self.payment_amount.or(self.amount).unwrap_or(0)
    }

    pub fn products_total(&self) -> i64 {
        self.products
            .iter()
            .map(Product::line_total)
            .fold(0i64, i64::saturating_add)
    }

    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date()
    }
}

/// Merchant branch where applications are originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fillial {
    pub id: FillialId,
    pub region: String,
    pub merchant_id: MerchantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
}

/// Field agent whose authority covers the listed fillials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fillial_ids: BTreeSet<FillialId>,
}

/// Settlement state of a single monthly installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    Completed,
    Overdue,
}

impl InstallmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Overdue => "Overdue",
        }
    }
}

/// One monthly obligation derived from a loan's total and term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub month_number: u32,
    pub due_date: NaiveDate,
    pub expected_amount: i64,
    #[serde(default)]
    pub paid_amount: i64,
    #[serde(default = "default_installment_status")]
    pub status: InstallmentStatus,
    #[serde(default)]
    pub days_past_due: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<NaiveDateTime>,
}

fn default_installment_status() -> InstallmentStatus {
    InstallmentStatus::Pending
}

impl ScheduleEntry {
    pub fn outstanding(&self) -> i64 {
        (self.expected_amount - self.paid_amount).max(0)
    }
}

/// Lenient timestamp parsing for repository exports: RFC 3339, naive date-times and bare dates.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer};

    pub(crate) fn parse(value: &str) -> Option<NaiveDateTime> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(dt.naive_utc());
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(dt);
            }
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("failed to parse '{raw}' as a timestamp"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repayable_total_prefers_payment_amount() {
        let mut application: Application = serde_json::from_value(json!({
            "id": 1,
            "raw_status": "FINISHED",
            "amount": 900,
            "payment_amount": 1200,
            "created_at": "2024-03-01",
            "fillial_id": 3,
        }))
        .expect("application parses");
        assert_eq!(application.repayable_total(), 1200);

        application.payment_amount = None;
        assert_eq!(application.repayable_total(), 900);

        application.amount = None;
        assert_eq!(application.repayable_total(), 0);
        assert_eq!(application.principal(), 0);
    }

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        let rfc = timestamp::parse("2024-05-10T08:30:00.000Z").expect("rfc3339 parses");
        let naive = timestamp::parse("2024-05-10 08:30:00").expect("naive parses");
        assert_eq!(rfc, naive);
        assert!(timestamp::parse("   ").is_none());
        assert!(timestamp::parse("10/05/2024").is_none());
    }

    #[test]
    fn failed_payments_are_not_settled() {
        let occurred_at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("valid");
        let mut payment = Payment {
            amount: 10,
            occurred_at,
            status: Some("failed".to_string()),
        };
        assert!(!payment.is_settled());
        payment.status = Some("SUCCESS".to_string());
        assert!(payment.is_settled());
        payment.status = None;
        assert!(payment.is_settled());
    }

    #[test]
    fn products_total_multiplies_counts() {
        let application: Application = serde_json::from_value(json!({
            "id": 2,
            "raw_status": "NEW",
            "created_at": "2024-03-01T10:00:00",
            "fillial_id": 1,
            "products": [
                { "name": "Phone", "price": 450, "count": 2 },
                { "name": "Case", "price": 20 }
            ]
        }))
        .expect("application parses");
        assert_eq!(application.products_total(), 920);
        assert_eq!(application.category(), Category::Pending);
    }
}
