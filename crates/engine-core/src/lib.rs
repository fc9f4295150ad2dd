//! Shardfall rules engine core: terrain codec, intent schema catalog and
//! sanitizer, placement and progression validators, and the world mutation
//! coordinator. Everything here is synchronous and store-agnostic; the only
//! I/O seam is the [`store::WorldStore`] trait.

pub mod placement;
pub mod progression;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod terrain;
pub mod world;

pub use store::{MemoryStore, StoreError, WorldStore};
pub use world::{EngineError, RulesEngine};
