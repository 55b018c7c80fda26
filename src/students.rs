use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One enrolled learner. `fee_cents` is the monthly fee billed for them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub student_name: String,
    pub student_phone: String,
    pub course: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub student_class: String,
    pub fee_cents: i32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StudentPayload {
    pub student_name: String,
    pub student_phone: String,
    pub course: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub student_class: String,
    pub fee_cents: i32,
}

impl StudentPayload {
    fn validate(&self) -> AppResult<()> {
        let required = [
            ("student_name", &self.student_name),
            ("student_phone", &self.student_phone),
            ("course", &self.course),
            ("guardian_name", &self.guardian_name),
            ("guardian_phone", &self.guardian_phone),
            ("student_class", &self.student_class),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{field} is required")));
            }
        }
        if self.fee_cents < 0 {
            return Err(AppError::BadRequest("fee_cents must be non-negative".into()));
        }
        Ok(())
    }
}

pub async fn create_student(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<StudentPayload>,
) -> AppResult<(StatusCode, Json<Student>)> {
    payload.validate()?;
    let student = sqlx::query_as::<_, Student>(
        "INSERT INTO students \
         (id, student_name, student_phone, course, guardian_name, guardian_phone, student_class, fee_cents) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.student_name.trim())
    .bind(payload.student_phone.trim())
    .bind(payload.course.trim())
    .bind(payload.guardian_name.trim())
    .bind(payload.guardian_phone.trim())
    .bind(payload.student_class.trim())
    .bind(payload.fee_cents)
    .fetch_one(&pool)
    .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn list_students(
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<Vec<Student>>> {
    let students =
        sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY registered_at DESC")
            .fetch_all(&pool)
            .await?;
    Ok(Json(students))
}

pub async fn get_student(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Student>> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    match student {
        Some(student) => Ok(Json(student)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_student(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StudentPayload>,
) -> AppResult<Json<Student>> {
    payload.validate()?;
    let student = sqlx::query_as::<_, Student>(
        "UPDATE students SET student_name = $2, student_phone = $3, course = $4, \
         guardian_name = $5, guardian_phone = $6, student_class = $7, fee_cents = $8 \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(payload.student_name.trim())
    .bind(payload.student_phone.trim())
    .bind(payload.course.trim())
    .bind(payload.guardian_name.trim())
    .bind(payload.guardian_phone.trim())
    .bind(payload.student_class.trim())
    .bind(payload.fee_cents)
    .fetch_optional(&pool)
    .await?;
    match student {
        Some(student) => Ok(Json(student)),
        None => Err(AppError::NotFound),
    }
}

/// Hard delete. Bills and attendance records reference students with
/// `ON DELETE CASCADE`, so no orphans survive the roster removal.
pub async fn delete_student(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let done = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    if done.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StudentCount {
    pub count: i64,
}

pub async fn count_students(
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<StudentCount>> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
        .fetch_one(&pool)
        .await?;
    Ok(Json(StudentCount { count }))
}

#[derive(Debug, Serialize)]
pub struct FeeTotal {
    pub total_cents: i64,
}

pub async fn fee_total(Extension(pool): Extension<PgPool>) -> AppResult<Json<FeeTotal>> {
    let total_cents: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(fee_cents), 0) FROM students")
        .fetch_one(&pool)
        .await?;
    Ok(Json(FeeTotal { total_cents }))
}

#[derive(Debug, FromRow, Serialize)]
pub struct CourseCount {
    pub course: String,
    pub students: i64,
}

pub async fn course_counts(
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<Vec<CourseCount>>> {
    let counts = sqlx::query_as::<_, CourseCount>(
        "SELECT course, COUNT(*) AS students FROM students GROUP BY course ORDER BY course ASC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(counts))
}

pub async fn list_classes(Extension(pool): Extension<PgPool>) -> AppResult<Json<Vec<String>>> {
    let classes: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT student_class FROM students ORDER BY student_class ASC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(classes))
}

pub async fn students_by_class(
    Extension(pool): Extension<PgPool>,
    Path(student_class): Path<String>,
) -> AppResult<Json<Vec<Student>>> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT * FROM students WHERE student_class = $1 ORDER BY student_name ASC",
    )
    .bind(student_class)
    .fetch_all(&pool)
    .await?;
    Ok(Json(students))
}
