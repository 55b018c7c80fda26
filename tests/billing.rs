use chrono::Utc;
use school_backend::billing::{BillingPeriod, BillingService};
use school_backend::error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_student(pool: &PgPool, name: &str, class: &str, fee_cents: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO students \
         (id, student_name, student_phone, course, guardian_name, guardian_phone, student_class, fee_cents) \
         VALUES ($1, $2, '0611111111', 'Mathematics', 'Guardian', '0622222222', $3, $4)",
    )
    .bind(id)
    .bind(name)
    .bind(class)
    .bind(fee_cents)
    .execute(pool)
    .await
    .unwrap();
    id
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn generation_is_idempotent(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    seed_student(&pool, "Ayaan", "1A", 50_000).await;
    seed_student(&pool, "Bilan", "1A", 60_000).await;

    let service = BillingService::new(pool.clone());
    let period: BillingPeriod = "2025-06".parse().unwrap();

    let first = service.generate_for_period(&period).await.unwrap();
    assert_eq!(first, 2);
    let second = service.generate_for_period(&period).await.unwrap();
    assert_eq!(second, 0);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn generation_copies_fee_into_unpaid_bill(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let student_id = seed_student(&pool, "Cawo", "2B", 500).await;

    let service = BillingService::new(pool.clone());
    let period: BillingPeriod = "2025-06".parse().unwrap();
    service.generate_for_period(&period).await.unwrap();

    let (amount, status, bill_period): (i32, String, String) = sqlx::query_as(
        "SELECT amount_cents, status, period FROM bills WHERE student_id = $1",
    )
    .bind(student_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(amount, 500);
    assert_eq!(status, "unpaid");
    assert_eq!(bill_period, "2025-06");

    // raising the fee later does not touch the already-generated bill
    sqlx::query("UPDATE students SET fee_cents = 900 WHERE id = $1")
        .bind(student_id)
        .execute(&pool)
        .await
        .unwrap();
    service.generate_for_period(&period).await.unwrap();
    let amount: i32 = sqlx::query_scalar("SELECT amount_cents FROM bills WHERE student_id = $1")
        .bind(student_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(amount, 500);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn concurrent_generation_creates_no_duplicates(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    for n in 0..5 {
        seed_student(&pool, &format!("Student {n}"), "3C", 40_000).await;
    }

    let period: BillingPeriod = "2025-07".parse().unwrap();
    let left = BillingService::new(pool.clone());
    let right = BillingService::new(pool.clone());
    let (a, b) = tokio::join!(
        left.generate_for_period(&period),
        right.generate_for_period(&period)
    );
    assert_eq!(a.unwrap() + b.unwrap(), 5);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills WHERE period = '2025-07'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 5);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn mark_paid_transitions_once(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    seed_student(&pool, "Deeqa", "1A", 45_000).await;
    let service = BillingService::new(pool.clone());
    let period: BillingPeriod = "2025-06".parse().unwrap();
    service.generate_for_period(&period).await.unwrap();

    let bill_id: Uuid = sqlx::query_scalar("SELECT id FROM bills")
        .fetch_one(&pool)
        .await
        .unwrap();

    let before = Utc::now();
    let paid = service.mark_paid(bill_id).await.unwrap();
    assert_eq!(paid.status, "paid");
    let first_paid_at = paid.last_paid_at.expect("payment timestamp set");
    assert!(first_paid_at >= before);

    let err = service.mark_paid(bill_id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");

    let unchanged: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar("SELECT last_paid_at FROM bills WHERE id = $1")
            .bind(bill_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(unchanged, Some(first_paid_at));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn mark_paid_missing_bill_is_not_found(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let err = BillingService::new(pool)
        .mark_paid(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound), "got {err:?}");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn manual_bill_creation_rejects_duplicate_period(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let student_id = seed_student(&pool, "Ededo", "2B", 30_000).await;
    let service = BillingService::new(pool.clone());
    let period: BillingPeriod = "2025-06".parse().unwrap();

    let bill = service.create_bill(student_id, &period).await.unwrap();
    assert_eq!(bill.amount_cents, 30_000);
    assert_eq!(bill.status, "unpaid");

    let err = service.create_bill(student_id, &period).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    let err = service
        .create_bill(Uuid::new_v4(), &period)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound), "got {err:?}");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn roster_status_covers_unbilled_students(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let billed = seed_student(&pool, "Farah", "1A", 20_000).await;
    let unbilled = seed_student(&pool, "Geesi", "1A", 25_000).await;

    let service = BillingService::new(pool.clone());
    let period: BillingPeriod = "2025-06".parse().unwrap();
    service.create_bill(billed, &period).await.unwrap();

    let roster = service.roster_status(&period).await.unwrap();
    assert_eq!(roster.len(), 2);

    let row = roster.iter().find(|r| r.student_id == billed).unwrap();
    assert_eq!(row.status, "unpaid");
    assert!(row.bill_id.is_some());
    assert_eq!(row.period, "2025-06");

    let row = roster.iter().find(|r| r.student_id == unbilled).unwrap();
    assert_eq!(row.status, "no bill");
    assert!(row.bill_id.is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn bills_for_student_sorted_and_checked(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let student_id = seed_student(&pool, "Hodan", "1A", 20_000).await;
    let service = BillingService::new(pool.clone());
    for raw in ["2025-04", "2025-06", "2025-05"] {
        let period: BillingPeriod = raw.parse().unwrap();
        service.create_bill(student_id, &period).await.unwrap();
    }

    let bills = service.bills_for_student(student_id).await.unwrap();
    let periods: Vec<&str> = bills.iter().map(|b| b.period.as_str()).collect();
    assert_eq!(periods, ["2025-06", "2025-05", "2025-04"]);

    let err = service
        .bills_for_student(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound), "got {err:?}");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn deleting_student_cascades_to_bills(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let student_id = seed_student(&pool, "Idil", "1A", 20_000).await;
    let service = BillingService::new(pool.clone());
    let period: BillingPeriod = "2025-06".parse().unwrap();
    service.create_bill(student_id, &period).await.unwrap();

    sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(student_id)
        .execute(&pool)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
