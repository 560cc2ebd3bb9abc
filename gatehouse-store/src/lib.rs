pub mod memory;
pub mod registry;
pub mod sql;

pub use memory::MemoryStore;
pub use registry::{StoreFactory, StoreRegistry};
pub use sql::SqlStore;
