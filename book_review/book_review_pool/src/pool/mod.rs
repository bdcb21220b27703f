//! Resource pooling and efficient reuse of expensive resources.
//!
//! - `config`: capacity and acquire timeout
//! - `manager`: the callbacks a pool uses to create, reset and close resources
//! - `resource`: the pool itself and the lease handle it gives out
//! - `stats`: cumulative counters and point-in-time status

pub mod config;
pub mod manager;
pub mod resource;
pub mod stats;

pub use config::ResourcePoolConfig;
pub use manager::ResourceManager;
pub use resource::{ResourceHandle, ResourceId, ResourcePool};
pub use stats::{PoolStats, PoolStatus};
