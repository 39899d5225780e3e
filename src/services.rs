pub mod catalog_sync_service;
pub mod leftover_service;
pub mod reconciliation;
pub mod scheduler_service;
pub mod sync_coordinator;
pub mod webhook_service;
