//! Dual-mode cart: local guest persistence and the store that owns the
//! authoritative snapshot.

mod storage;
mod store;

pub use storage::{GuestCartStorage, JsonFileCartStorage, MemoryCartStorage, StorageError};
pub use store::{CartError, CartStore};
