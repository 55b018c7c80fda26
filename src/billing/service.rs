use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::models::{Bill, BillingPeriod, StudentBillStatus, STATUS_NO_BILL, STATUS_PAID};

/// Owns the billing lifecycle rule: every enrolled student owes exactly one bill
/// per billing period, with an amount equal to their fee at generation time.
#[derive(Clone)]
pub struct BillingService {
    pool: PgPool,
}

impl BillingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the missing bills for `period` and returns how many were created.
    ///
    /// Idempotent: the `(student_id, period)` unique constraint is the guard, so
    /// re-running for an already-billed period creates nothing, and two passes
    /// racing each other cannot produce duplicates. A failure on one student is
    /// logged and that student is skipped for this run; a later pass picks them
    /// up again.
    pub async fn generate_for_period(&self, period: &BillingPeriod) -> AppResult<u64> {
        let students = sqlx::query_as::<_, (Uuid, String, i32)>(
            "SELECT id, student_name, fee_cents FROM students",
        )
        .fetch_all(&self.pool)
        .await?;

        let period = period.to_string();
        let mut created = 0u64;
        for (student_id, student_name, fee_cents) in students {
            let result = sqlx::query(
                "INSERT INTO bills (id, student_id, period, amount_cents, status) \
                 VALUES ($1, $2, $3, $4, 'unpaid') \
                 ON CONFLICT (student_id, period) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(&period)
            .bind(fee_cents)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) if done.rows_affected() > 0 => {
                    created += 1;
                    debug!(%student_id, student = %student_name, %period, "bill created");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        ?err,
                        %student_id,
                        %period,
                        "failed to create bill, skipping student for this run"
                    );
                }
            }
        }

        Ok(created)
    }

    /// Transitions a bill from unpaid to paid and stamps the payment time.
    ///
    /// The conditional UPDATE is the lock: a concurrent duplicate call finds no
    /// unpaid row to transition, so the first payment timestamp is never
    /// overwritten.
    pub async fn mark_paid(&self, bill_id: Uuid) -> AppResult<Bill> {
        let updated = sqlx::query_as::<_, Bill>(
            "UPDATE bills SET status = 'paid', last_paid_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'unpaid' \
             RETURNING *",
        )
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(bill) = updated {
            return Ok(bill);
        }

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM bills WHERE id = $1")
            .bind(bill_id)
            .fetch_optional(&self.pool)
            .await?;
        match status.as_deref() {
            None => Err(AppError::NotFound),
            Some(STATUS_PAID) => Err(AppError::BadRequest("bill is already paid".into())),
            Some(other) => Err(AppError::Message(format!("bill in unexpected status `{other}`"))),
        }
    }

    /// Manually opens a bill for one student and period, amount taken from the
    /// student's current fee.
    pub async fn create_bill(&self, student_id: Uuid, period: &BillingPeriod) -> AppResult<Bill> {
        let fee_cents: Option<i32> = sqlx::query_scalar("SELECT fee_cents FROM students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(fee_cents) = fee_cents else {
            return Err(AppError::NotFound);
        };

        let result = sqlx::query_as::<_, Bill>(
            "INSERT INTO bills (id, student_id, period, amount_cents, status) \
             VALUES ($1, $2, $3, $4, 'unpaid') \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(period.to_string())
        .bind(fee_cents)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(bill) => Ok(bill),
            Err(err) => {
                if let sqlx::Error::Database(db_err) = &err {
                    if db_err.constraint() == Some("bills_student_id_period_key") {
                        return Err(AppError::Conflict(format!(
                            "bill already exists for period {period}"
                        )));
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Read-only projection: every student joined with their bill status for
    /// `period`, or "no bill" when none exists yet.
    pub async fn roster_status(&self, period: &BillingPeriod) -> AppResult<Vec<StudentBillStatus>> {
        let rows = sqlx::query_as::<_, StudentBillStatus>(
            "SELECT s.id AS student_id, s.student_name, s.student_class, s.fee_cents, \
                    b.id AS bill_id, COALESCE(b.status, $2) AS status, $1 AS period \
             FROM students s \
             LEFT JOIN bills b ON b.student_id = s.id AND b.period = $1 \
             ORDER BY s.student_name ASC",
        )
        .bind(period.to_string())
        .bind(STATUS_NO_BILL)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All bills for one student, newest period first.
    pub async fn bills_for_student(&self, student_id: Uuid) -> AppResult<Vec<Bill>> {
        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound);
        }

        let bills = sqlx::query_as::<_, Bill>(
            "SELECT * FROM bills WHERE student_id = $1 ORDER BY period DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bills)
    }
}
