mod account;
mod block;
mod genesis;
mod receipt;
mod requests;
mod transaction;

pub use account::*;
pub use block::*;
pub use genesis::*;
pub use receipt::*;
pub use requests::*;
pub use transaction::*;
