use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

pub const STATUS_UNPAID: &str = "unpaid";
pub const STATUS_PAID: &str = "paid";
/// Roster projection status for students with no bill in the requested period.
pub const STATUS_NO_BILL: &str = "no bill";

/// One student's billing obligation for one period. Amount is the student's fee
/// at generation time and is never re-synced afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub student_id: Uuid,
    pub period: String,
    pub amount_cents: i32,
    pub status: String,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-student row of the roster billing view: student identity joined with the
/// bill status for one period, or [`STATUS_NO_BILL`] when none exists yet.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentBillStatus {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_class: String,
    pub fee_cents: i32,
    pub bill_id: Option<Uuid>,
    pub status: String,
    pub period: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid billing period `{0}`, expected YYYY-MM")]
pub struct InvalidPeriod(String);

/// The month a bill is generated for, in the canonical `YYYY-MM` form.
///
/// This is the single period representation used everywhere: parsed and rendered
/// as the ISO year-month string, stored as TEXT. Chronological order equals
/// lexicographic order on the canonical string, so `ORDER BY period` in SQL and
/// `Ord` here agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

impl BillingPeriod {
    /// The period the given instant falls in, by UTC calendar month.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingPeriod {
    type Err = InvalidPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.split_once('-').ok_or_else(|| InvalidPeriod(s.to_string()))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(InvalidPeriod(s.to_string()));
        }
        let year: i32 = year.parse().map_err(|_| InvalidPeriod(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| InvalidPeriod(s.to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(InvalidPeriod(s.to_string()));
        }
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for BillingPeriod {
    type Error = InvalidPeriod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingPeriod> for String {
    fn from(period: BillingPeriod) -> Self {
        period.to_string()
    }
}
