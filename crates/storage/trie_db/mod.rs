#[cfg(feature = "redb")]
pub mod redb;
