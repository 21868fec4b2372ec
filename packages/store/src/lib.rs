pub mod kv;
pub mod session;

mod file_store;
pub use file_store::FileStore;

mod memory;
pub use memory::MemoryStore;

pub use kv::{KeyValueStore, StoreError};
pub use session::{SessionCache, SessionRecord};
