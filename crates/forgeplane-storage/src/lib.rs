pub mod convert;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{Result, StorageError};
pub use repositories::Database;
