//! Stock-moves API: domain types, the remote gateway, and the cache-aware
//! client built on top of it.

pub mod cached_client;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;
