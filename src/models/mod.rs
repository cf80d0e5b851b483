pub mod billing_month;

pub use billing_month::BillingMonth;
