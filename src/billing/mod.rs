pub mod api;
pub mod models;
pub mod scheduler;
pub mod service;

pub use models::{Bill, BillingPeriod, StudentBillStatus};
pub use scheduler::{process_tick, spawn as spawn_billing_scheduler, BillingSchedulerHandle};
pub use service::BillingService;
