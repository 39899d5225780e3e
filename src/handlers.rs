pub mod cron;
pub mod stock;
pub mod sync;
pub mod webhooks;
