use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

use super::models::{Bill, BillingPeriod, StudentBillStatus};
use super::service::BillingService;

pub async fn generate_bills(
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<GenerateResponse>> {
    let period = BillingPeriod::from_datetime(Utc::now());
    let created = BillingService::new(pool).generate_for_period(&period).await?;
    Ok(Json(GenerateResponse {
        period: period.to_string(),
        created,
    }))
}

pub async fn pay_bill(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Bill>> {
    let bill = BillingService::new(pool).mark_paid(id).await?;
    Ok(Json(bill))
}

pub async fn list_roster_status(
    Extension(pool): Extension<PgPool>,
    Query(query): Query<RosterQuery>,
) -> AppResult<Json<Vec<StudentBillStatus>>> {
    let period = query
        .period
        .unwrap_or_else(|| BillingPeriod::from_datetime(Utc::now()));
    let rows = BillingService::new(pool).roster_status(&period).await?;
    Ok(Json(rows))
}

pub async fn student_bills(
    Extension(pool): Extension<PgPool>,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<Vec<Bill>>> {
    let bills = BillingService::new(pool).bills_for_student(student_id).await?;
    Ok(Json(bills))
}

pub async fn create_bill(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<NewBill>,
) -> AppResult<(StatusCode, Json<Bill>)> {
    let period = payload
        .period
        .unwrap_or_else(|| BillingPeriod::from_datetime(Utc::now()));
    let bill = BillingService::new(pool)
        .create_bill(payload.student_id, &period)
        .await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub period: String,
    pub created: u64,
}

#[derive(Debug, Deserialize)]
pub struct RosterQuery {
    #[serde(default)]
    pub period: Option<BillingPeriod>,
}

#[derive(Debug, Deserialize)]
pub struct NewBill {
    pub student_id: Uuid,
    #[serde(default)]
    pub period: Option<BillingPeriod>,
}
