#![forbid(unsafe_code)]

pub mod changes;
pub mod demo;
pub mod repository;
pub mod sqlite;

pub use changes::{Change, ChangeFeed};
pub use repository::{Storage, StorageError};
