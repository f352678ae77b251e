//! In-memory object stores shared by the inventory manager

pub mod block_store;
pub mod mempool;

pub use block_store::BlockStore;
pub use mempool::MemoryPool;
