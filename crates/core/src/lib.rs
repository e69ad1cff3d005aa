//! `restock-core` — shared building blocks for the reorder engine.
//!
//! This crate contains **pure** primitives (identifiers, errors). No numerics,
//! no IO.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, RunId};
