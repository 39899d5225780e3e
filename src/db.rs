pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod credential_repo;
pub use credential_repo::PosCredentialRepository;
pub mod sync_state_repo;
pub use sync_state_repo::SyncStateRepository;
pub mod webhook_repo;
pub use webhook_repo::WebhookEventRepository;
