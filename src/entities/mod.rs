pub mod ingredient;
pub mod meter;
pub mod reading;
pub mod stock_transaction;
pub mod user;
