//! Document storage for the bot.
//!
//! `DocumentStore` is the storage capability: keyed JSON documents grouped
//! in collections, with create-if-absent and atomic counter primitives.
//! `Collections` layers typed access to videos, request histories, bans and
//! reply intents on top of any store.

pub mod collections;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;

pub use collections::Collections;
pub use document::{Document, DocumentStore};
pub use error::{Result, StoreError};
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
