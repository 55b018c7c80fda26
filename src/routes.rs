use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{attendance, auth, billing, students};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_user))
        .route("/api/login", post(auth::login_user))
        .route("/api/logout", post(auth::logout_user))
        .route("/api/me", get(auth::current_user))
        .route(
            "/api/students",
            get(students::list_students).post(students::create_student),
        )
        .route("/api/students/count", get(students::count_students))
        .route("/api/students/fee-total", get(students::fee_total))
        .route("/api/students/course-counts", get(students::course_counts))
        .route("/api/students/classes", get(students::list_classes))
        .route(
            "/api/students/class/:student_class",
            get(students::students_by_class),
        )
        .route(
            "/api/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route(
            "/api/bills",
            get(billing::api::list_roster_status).post(billing::api::create_bill),
        )
        .route("/api/bills/generate", post(billing::api::generate_bills))
        .route(
            "/api/bills/student/:student_id",
            get(billing::api::student_bills),
        )
        .route("/api/bills/:id/pay", patch(billing::api::pay_bill))
        .route("/api/attendance", post(attendance::mark))
        .route("/api/attendance/bulk", post(attendance::mark_bulk))
        .route(
            "/api/attendance/student/:student_id",
            get(attendance::student_history),
        )
        .route(
            "/api/attendance/student/:student_id/percentage",
            get(attendance::student_percentage),
        )
        .route(
            "/api/attendance/class/:student_class",
            get(attendance::class_summary),
        )
        .route(
            "/api/attendance/absent/:student_class/:date",
            get(attendance::absent_students),
        )
}
