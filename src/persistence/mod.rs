//! The persistence adapter (C4): `redb`-backed CRUD over nodes, edges, and
//! tags, with JSON property round-trip.

pub mod error;
pub mod schema;
pub mod store;

pub use error::PersistenceError;
pub use schema::{EdgeRow, NodeRow};
pub use store::{PersistenceStatistics, PersistenceStore};
