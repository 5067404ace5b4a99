//! Position records and their durable store

pub mod store;

pub use store::{Position, PositionStore};
