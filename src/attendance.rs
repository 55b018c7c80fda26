use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::students::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

/// One status entry for one student on one calendar day. Records are written
/// once and never updated; re-marking a day is rejected.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub status: String,
    pub course: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendance {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

pub async fn mark(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<MarkAttendance>,
) -> AppResult<(StatusCode, Json<AttendanceRecord>)> {
    ensure_student_exists(&pool, payload.student_id).await?;

    let result = sqlx::query_as::<_, AttendanceRecord>(
        "INSERT INTO attendance (id, student_id, date, status, course, remarks) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.student_id)
    .bind(payload.date)
    .bind(payload.status.as_str())
    .bind(&payload.course)
    .bind(&payload.remarks)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(record) => Ok((StatusCode::CREATED, Json(record))),
        Err(err) => Err(map_duplicate(err, payload.student_id, payload.date)),
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkEntry {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMarkAttendance {
    pub student_class: String,
    pub date: NaiveDate,
    pub records: Vec<BulkEntry>,
}

#[derive(Debug, Serialize)]
pub struct BulkMarkResponse {
    pub marked: usize,
}

/// Marks a whole class for one day in a single transaction; any already-marked
/// student aborts the batch (rejected, not merged).
pub async fn mark_bulk(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<BulkMarkAttendance>,
) -> AppResult<(StatusCode, Json<BulkMarkResponse>)> {
    if payload.records.is_empty() {
        return Err(AppError::BadRequest("records must not be empty".into()));
    }

    let ids: Vec<Uuid> = payload.records.iter().map(|entry| entry.student_id).collect();
    let known: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM students WHERE id = ANY($1) AND student_class = $2",
    )
    .bind(&ids)
    .bind(&payload.student_class)
    .fetch_one(&pool)
    .await?;
    if known as usize != ids.len() {
        return Err(AppError::BadRequest(
            "some students not found in this class".into(),
        ));
    }

    let mut tx = pool.begin().await?;
    for entry in &payload.records {
        let result = sqlx::query(
            "INSERT INTO attendance (id, student_id, date, status, course, remarks) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.student_id)
        .bind(payload.date)
        .bind(entry.status.as_str())
        .bind(&entry.course)
        .bind(&entry.remarks)
        .execute(&mut tx)
        .await;
        if let Err(err) = result {
            // dropping the transaction rolls the whole batch back
            return Err(map_duplicate(err, entry.student_id, payload.date));
        }
    }
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(BulkMarkResponse {
            marked: payload.records.len(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

pub async fn student_history(
    Extension(pool): Extension<PgPool>,
    Path(student_id): Path<Uuid>,
    Query(range): Query<HistoryQuery>,
) -> AppResult<Json<Vec<AttendanceRecord>>> {
    ensure_student_exists(&pool, student_id).await?;

    let records = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance WHERE student_id = $1 \
         AND ($2::date IS NULL OR date >= $2) \
         AND ($3::date IS NULL OR date <= $3) \
         ORDER BY date DESC",
    )
    .bind(student_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&pool)
    .await?;
    Ok(Json(records))
}

#[derive(Debug, Serialize)]
pub struct AttendancePercentage {
    pub total_days: i64,
    pub present_days: i64,
    pub excused_days: i64,
    pub percentage: f64,
}

/// Present days over countable days (total minus excused), as a percentage.
/// Zero-safe: no records, or nothing but excused days, yields 0%.
pub async fn student_percentage(
    Extension(pool): Extension<PgPool>,
    Path(student_id): Path<Uuid>,
    Query(range): Query<HistoryQuery>,
) -> AppResult<Json<AttendancePercentage>> {
    ensure_student_exists(&pool, student_id).await?;

    let (total_days, present_days, excused_days): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(*) FILTER (WHERE status = 'present'), \
                COUNT(*) FILTER (WHERE status = 'excused') \
         FROM attendance WHERE student_id = $1 \
         AND ($2::date IS NULL OR date >= $2) \
         AND ($3::date IS NULL OR date <= $3)",
    )
    .bind(student_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(&pool)
    .await?;

    let countable = total_days - excused_days;
    let percentage = if countable > 0 {
        present_days as f64 / countable as f64 * 100.0
    } else {
        0.0
    };
    Ok(Json(AttendancePercentage {
        total_days,
        present_days,
        excused_days,
        percentage,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct ClassAttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub status: String,
    pub course: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassAttendanceSummary {
    pub date: NaiveDate,
    pub total_students: i64,
    pub records: Vec<ClassAttendanceRecord>,
}

pub async fn class_summary(
    Extension(pool): Extension<PgPool>,
    Path(student_class): Path<String>,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<ClassAttendanceSummary>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let total_students: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE student_class = $1")
            .bind(&student_class)
            .fetch_one(&pool)
            .await?;

    let records = sqlx::query_as::<_, ClassAttendanceRecord>(
        "SELECT a.id, a.student_id, s.student_name, a.status, a.course, a.remarks \
         FROM attendance a \
         JOIN students s ON s.id = a.student_id \
         WHERE s.student_class = $1 AND a.date = $2 \
         ORDER BY s.student_name ASC",
    )
    .bind(&student_class)
    .bind(date)
    .fetch_all(&pool)
    .await?;

    Ok(Json(ClassAttendanceSummary {
        date,
        total_students,
        records,
    }))
}

/// Students of a class with no `present` record on the given day.
pub async fn absent_students(
    Extension(pool): Extension<PgPool>,
    Path((student_class, date)): Path<(String, NaiveDate)>,
) -> AppResult<Json<Vec<Student>>> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT s.* FROM students s \
         WHERE s.student_class = $1 \
         AND NOT EXISTS (\
             SELECT 1 FROM attendance a \
             WHERE a.student_id = s.id AND a.date = $2 AND a.status = 'present'\
         ) \
         ORDER BY s.student_name ASC",
    )
    .bind(&student_class)
    .bind(date)
    .fetch_all(&pool)
    .await?;
    Ok(Json(students))
}

async fn ensure_student_exists(pool: &PgPool, student_id: Uuid) -> AppResult<()> {
    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM students WHERE id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

fn map_duplicate(err: sqlx::Error, student_id: Uuid, date: NaiveDate) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("attendance_student_id_date_key") {
            return AppError::Conflict(format!(
                "attendance already marked for student {student_id} on {date}"
            ));
        }
    }
    AppError::Db(err)
}
