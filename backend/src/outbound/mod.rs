//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **memory**: in-process store, directory, permission engine and cache
//! - **redis_cache**: Redis-backed to-do cache
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. They contain no business logic.

pub mod memory;
pub mod redis_cache;
