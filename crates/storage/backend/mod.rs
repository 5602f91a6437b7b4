pub mod in_memory;
#[cfg(feature = "redb")]
pub mod redb;

pub use in_memory::InMemoryBackend;
#[cfg(feature = "redb")]
pub use redb::RedbBackend;
