pub mod client;
pub use client::{PosApi, PosClient, PosConnector};
pub mod error;
pub use error::PosError;
pub mod records;
