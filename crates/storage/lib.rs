pub mod backend;
pub mod error;
mod state_backend;
mod trie_db;
mod world_state;

pub use backend::InMemoryBackend;
#[cfg(feature = "redb")]
pub use backend::RedbBackend;
pub use error::StoreError;
pub use state_backend::{AccountInfo, AccountUpdate, StateBackend, StateUpdate};
#[cfg(feature = "redb")]
pub use trie_db::redb::RedBTrie;
pub use world_state::WorldState;
